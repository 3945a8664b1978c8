//! Knowledge base - wires store, embedder, retrieval, ingestion and
//! maintenance together from one configuration

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use super::embedding::{EmbeddingProvider, HarmonicEmbedder};
use super::ingest::{DocumentText, IngestReport, IngestRequest, Ingestor, TopicTagger};
use super::maintenance::{EvictionReport, Maintenance};
use super::retrieval::{Boosts, Retriever, SearchParams};
use super::store::{KnowledgeStore, StoreStats, TrainingStats};
use crate::core::config::RagConfig;
use crate::core::entry::{KnowledgeEntry, ScoredEntry};
use crate::core::error::StoreResult;
use crate::core::paths::DataPaths;

pub struct KnowledgeBase {
    config: RagConfig,
    store: Arc<KnowledgeStore>,
    retriever: Retriever,
    ingestor: Ingestor,
    maintenance: Maintenance,
}

impl KnowledgeBase {
    /// Open the knowledge base in `paths`, reading `config.yaml` if present
    pub fn open(paths: &DataPaths) -> Result<Self> {
        let config = RagConfig::load(&paths.config)
            .with_context(|| format!("Failed to load config: {}", paths.config.display()))?;
        Self::open_with(config, &paths.root)
    }

    /// Open with an explicit configuration and the built-in embedder
    pub fn open_with(config: RagConfig, data_dir: &Path) -> Result<Self> {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HarmonicEmbedder::new());
        let db_path = config.database_path(data_dir);

        let store = KnowledgeStore::open(&db_path, provider.dimension())
            .with_context(|| format!("Failed to open knowledge store: {}", db_path.display()))?;
        store
            .bind_model(provider.model_id())
            .context("Knowledge store was built with a different embedding model")?;

        info!(db = %db_path.display(), model = provider.model_id(), "knowledge base opened");
        Ok(Self::with_parts(Arc::new(store), provider, config))
    }

    /// Assemble from an existing store and provider
    pub fn with_parts(
        store: Arc<KnowledgeStore>,
        provider: Arc<dyn EmbeddingProvider>,
        config: RagConfig,
    ) -> Self {
        let topics = Arc::new(config.topics());

        let retriever =
            Retriever::new(Arc::clone(&store), Arc::clone(&provider), Arc::clone(&topics))
                .with_boosts(Boosts::from(&config.retrieval));
        let ingestor = Ingestor::new(
            Arc::clone(&store),
            provider,
            Arc::new(TopicTagger::new(topics)),
            config.chunk_size,
        );
        let maintenance = Maintenance::new(Arc::clone(&store));

        Self {
            config,
            store,
            retriever,
            ingestor,
            maintenance,
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<KnowledgeStore> {
        &self.store
    }

    /// Search parameters from the configuration
    pub fn default_params(&self) -> SearchParams {
        SearchParams::from(&self.config.retrieval)
    }

    pub fn search(&self, query: &str, params: &SearchParams) -> StoreResult<Vec<ScoredEntry>> {
        self.retriever.search(query, params)
    }

    pub fn ingest(&self, request: &IngestRequest) -> StoreResult<IngestReport> {
        self.ingestor.ingest(request)
    }

    pub fn ingest_document(&self, doc: &DocumentText, auto_tag: bool) -> StoreResult<IngestReport> {
        self.ingestor.ingest_document(doc, auto_tag)
    }

    pub fn remember(&self, question: &str, answer: &str) -> StoreResult<IngestReport> {
        self.ingestor.remember(question, answer)
    }

    /// Eviction pass with the configured bounds
    pub fn optimize(&self) -> StoreResult<EvictionReport> {
        let m = &self.config.maintenance;
        self.maintenance.optimize(m.min_usage, m.max_items)
    }

    pub fn optimize_with(&self, min_usage: i64, max_items: usize) -> StoreResult<EvictionReport> {
        self.maintenance.optimize(min_usage, max_items)
    }

    pub fn stats(&self) -> StoreResult<StoreStats> {
        self.store.stats()
    }

    pub fn recent(&self, limit: usize) -> StoreResult<Vec<KnowledgeEntry>> {
        self.store.recent(limit)
    }

    pub fn training_stats(&self) -> StoreResult<TrainingStats> {
        self.store.training_stats()
    }
}
