//! knowledge-rag library
//!
//! Persisted knowledge base with hybrid retrieval for retrieval-augmented
//! assistants.
//!
//! # Modules
//!
//! - `core`: data model, errors, configuration and topic tables
//! - `search`: store, embeddings, chunking, retrieval, ingestion, eviction

pub mod core;
pub mod search;

// Re-exports for convenience
pub use core::config::RagConfig;
pub use core::entry::{KnowledgeEntry, ScoredEntry, Source};
pub use core::error::{ConfigError, EmbeddingError, StoreError};
pub use core::paths::DataPaths;
pub use core::topics::{KeywordGroup, Topics, DEFAULT_TOPICS};
pub use search::{
    assemble_context, DocumentKind, DocumentText, EvictionReport, IngestReport, IngestRequest,
    KnowledgeBase, SearchParams,
};
