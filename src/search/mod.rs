//! Retrieval core
//!
//! - `store`: SQLite-backed knowledge entries
//! - `embedding`: provider seam and the built-in harmonic embedder
//! - `chunker`: sentence-aware document chunking
//! - `retrieval`: hybrid scoring with threshold fallback
//! - `ingest`: entries from Q/A pairs and documents
//! - `maintenance`: usage-based eviction
//! - `context`: prompt context assembly
//! - `engine`: the [`KnowledgeBase`] facade tying it together

pub mod chunker;
pub mod context;
pub mod embedding;
pub mod engine;
pub mod ingest;
pub mod maintenance;
pub mod retrieval;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use context::assemble_context;
pub use embedding::{
    cosine_similarity, embed_or_zero, EmbeddingProvider, HarmonicEmbedder, EMBEDDING_DIM,
};
pub use engine::KnowledgeBase;
pub use ingest::{
    DocumentKind, DocumentText, IngestReport, IngestRequest, Ingestor, TagGenerator, TopicTagger,
};
pub use maintenance::{EvictionReport, Maintenance};
pub use retrieval::{Boosts, Retriever, SearchParams};
pub use store::{KnowledgeStore, NewEntry, StoreStats, TrainingStats};
