//! Error taxonomy for the knowledge base
//!
//! Storage failures surface to callers. Embedding failures never leave the
//! crate: they are logged and replaced with the zero vector (see
//! [`crate::search::embedding::embed_or_zero`]).

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the persisted knowledge table
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("entry {id} has a corrupt vector blob ({len} bytes)")]
    CorruptVector { id: i64, len: usize },

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("store was built with {stored}, current provider is {current}")]
    IncompatibleIndex { stored: String, current: String },

    #[error("knowledge store lock poisoned")]
    Poisoned,
}

/// Failures reported by an embedding provider
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EmbeddingError {
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),

    #[error("malformed embedding: expected {expected} values, got {actual}")]
    Malformed { expected: usize, actual: usize },

    #[error("invalid embedding input: {0}")]
    InvalidInput(String),
}

/// Failures while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
