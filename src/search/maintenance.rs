//! Usage-based eviction
//!
//! Only stale, rarely used, untagged, user-origin entries are ever removed.
//! Document entries, tagged entries and the `max_items` most recently used
//! entries are protected unconditionally.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::info;

use super::store::KnowledgeStore;
use crate::core::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    /// Entries before the pass
    pub total: usize,
    pub deleted: usize,
    /// True when the store was within bounds and nothing was examined
    pub skipped: bool,
}

impl EvictionReport {
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.deleted)
    }
}

pub struct Maintenance {
    store: Arc<KnowledgeStore>,
    pass: Mutex<()>,
}

impl Maintenance {
    pub fn new(store: Arc<KnowledgeStore>) -> Self {
        Self {
            store,
            pass: Mutex::new(()),
        }
    }

    /// Evict low-value entries when the store holds more than `max_items`
    pub fn optimize(&self, min_usage: i64, max_items: usize) -> StoreResult<EvictionReport> {
        let _pass = self.pass.lock().map_err(|_| StoreError::Poisoned)?;

        let (total, deleted) = self.store.evict_stale(min_usage, max_items)?;
        if total <= max_items {
            info!(total, max_items, "knowledge base within bounds, optimization skipped");
            return Ok(EvictionReport {
                total,
                deleted: 0,
                skipped: true,
            });
        }

        info!(total, deleted, min_usage, max_items, "knowledge base optimized");
        Ok(EvictionReport {
            total,
            deleted,
            skipped: false,
        })
    }
}
