//! YAML configuration for the knowledge base
//!
//! Every field has a default, so an absent file or a partial file is valid.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::topics::{KeywordGroup, Topics, DEFAULT_TOPICS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// SQLite file; relative paths resolve against the data directory
    pub database: Option<PathBuf>,
    /// Upper bound, in characters, for document chunks
    pub chunk_size: usize,
    pub retrieval: RetrievalConfig,
    pub maintenance: MaintenanceConfig,
    pub topics: TopicsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub primary_threshold: f32,
    pub fallback_threshold: f32,
    pub top_k: usize,
    pub document_boost: f32,
    pub keyword_boost: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub min_usage: i64,
    pub max_items: usize,
    /// Periodic eviction in the server; `None` means startup only
    pub interval_minutes: Option<u64>,
}

/// Optional replacements for the built-in topic tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    pub abbreviations: Option<BTreeMap<String, String>>,
    pub keyword_groups: Option<Vec<KeywordGroup>>,
    pub tag_groups: Option<Vec<KeywordGroup>>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            database: None,
            chunk_size: 2000,
            retrieval: RetrievalConfig::default(),
            maintenance: MaintenanceConfig::default(),
            topics: TopicsConfig::default(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            primary_threshold: 0.7,
            fallback_threshold: 0.4,
            top_k: 3,
            document_boost: 1.2,
            keyword_boost: 1.5,
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            min_usage: 5,
            max_items: 2000,
            interval_minutes: None,
        }
    }
}

impl RagConfig {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = if raw.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.retrieval;
        if !(0.0..=r.primary_threshold).contains(&r.fallback_threshold) {
            return Err(ConfigError::Invalid(format!(
                "fallback_threshold {} must be within 0..=primary_threshold ({})",
                r.fallback_threshold, r.primary_threshold
            )));
        }
        if r.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be at least 1".into()));
        }
        if self.maintenance.max_items == 0 {
            return Err(ConfigError::Invalid("max_items must be at least 1".into()));
        }
        Ok(())
    }

    /// Database path, resolved against the data directory
    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        match &self.database {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => data_dir.join(p),
            None => data_dir.join("knowledge.db"),
        }
    }

    /// Built-in tables with any configured overrides applied
    pub fn topics(&self) -> Topics {
        let t = &self.topics;
        let abbreviations = match &t.abbreviations {
            Some(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            None => DEFAULT_TOPICS.abbreviations().to_vec(),
        };
        let keyword_groups = t
            .keyword_groups
            .clone()
            .unwrap_or_else(|| DEFAULT_TOPICS.keyword_groups().to_vec());
        let tag_groups = t
            .tag_groups
            .clone()
            .unwrap_or_else(|| DEFAULT_TOPICS.tag_groups().to_vec());

        Topics::new(abbreviations, keyword_groups, tag_groups)
    }
}
