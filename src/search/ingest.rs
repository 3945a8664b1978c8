//! Ingestion pipeline
//!
//! Question-bearing requests always go through the store's upsert, so a
//! question is stored once no matter how often it is taught. Pure context
//! is chunked and appended as-is; chunks are never deduplicated here.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::chunker::split_into_chunks;
use super::embedding::{embed_or_zero, EmbeddingProvider};
use super::store::{KnowledgeStore, NewEntry};
use crate::core::entry::Source;
use crate::core::error::StoreResult;
use crate::core::topics::Topics;

/// Assigns topic tags to a piece of text
pub trait TagGenerator: Send + Sync {
    fn tags_for(&self, text: &str) -> BTreeSet<String>;
}

/// Tags text with every tag group whose keywords occur in it
pub struct TopicTagger {
    topics: Arc<Topics>,
}

impl TopicTagger {
    pub fn new(topics: Arc<Topics>) -> Self {
        Self { topics }
    }
}

impl TagGenerator for TopicTagger {
    fn tags_for(&self, text: &str) -> BTreeSet<String> {
        let lower = text.to_lowercase();
        self.topics
            .tag_groups()
            .iter()
            .filter(|group| group.matches(&lower))
            .map(|group| group.name.clone())
            .collect()
    }
}

/// One unit of knowledge to store
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub context: Option<String>,
    pub source: Source,
    pub tags: BTreeSet<String>,
    /// Add generated topic tags on top of `tags`
    pub auto_tag: bool,
}

impl IngestRequest {
    /// Empty request; auto-tagging is on for documents only
    pub fn new(source: Source) -> Self {
        Self {
            question: None,
            answer: None,
            context: None,
            source,
            tags: BTreeSet::new(),
            auto_tag: source == Source::Document,
        }
    }

    pub fn question(mut self, question: impl Into<String>) -> Self {
        self.question = non_blank(question.into());
        self
    }

    pub fn answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = non_blank(answer.into());
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = non_blank(context.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let tag = tag.trim();
        if !tag.is_empty() && !tag.contains(',') {
            self.tags.insert(tag.to_string());
        }
        self
    }

    pub fn auto_tag(mut self, enabled: bool) -> Self {
        self.auto_tag = enabled;
        self
    }
}

fn non_blank(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// What an ingestion call changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// New rows
    pub inserted: usize,
    /// Existing question entries overwritten
    pub updated: usize,
    /// Context chunks among the new rows
    pub chunks: usize,
}

impl IngestReport {
    pub fn is_empty(&self) -> bool {
        self.inserted == 0 && self.updated == 0
    }
}

/// Declared type of a pre-extracted document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Txt,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Txt => "txt",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "txt" | "text" => Ok(DocumentKind::Txt),
            other => Err(format!("unsupported document type '{}'", other)),
        }
    }
}

/// Text extracted from a document by an external stage
#[derive(Debug, Clone)]
pub struct DocumentText {
    pub filename: String,
    pub kind: DocumentKind,
    pub text: String,
}

pub struct Ingestor {
    store: Arc<KnowledgeStore>,
    provider: Arc<dyn EmbeddingProvider>,
    tagger: Arc<dyn TagGenerator>,
    chunk_size: usize,
}

impl Ingestor {
    pub fn new(
        store: Arc<KnowledgeStore>,
        provider: Arc<dyn EmbeddingProvider>,
        tagger: Arc<dyn TagGenerator>,
        chunk_size: usize,
    ) -> Self {
        Self {
            store,
            provider,
            tagger,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn ingest(&self, request: &IngestRequest) -> StoreResult<IngestReport> {
        let mut report = IngestReport::default();

        let chunks = match &request.context {
            Some(context) if context.chars().count() <= self.chunk_size => {
                vec![context.trim().to_string()]
            }
            Some(context) => split_into_chunks(context, self.chunk_size),
            None => Vec::new(),
        };

        match (&request.question, chunks.len()) {
            (None, 0) => {
                warn!("ingest request has neither question nor context, nothing stored");
            }
            (Some(question), 0) => {
                self.upsert_question(request, question, None, &mut report)?;
            }
            (Some(question), 1) => {
                self.upsert_question(request, question, Some(&chunks[0]), &mut report)?;
            }
            (question, _) => {
                for chunk in &chunks {
                    let tags = self.tags_for(request, chunk);
                    let embedding = embed_or_zero(self.provider.as_ref(), chunk);
                    self.store
                        .insert_context_chunk(chunk, &tags, request.source, embedding)?;
                    report.inserted += 1;
                    report.chunks += 1;
                }
                if let Some(question) = question {
                    self.upsert_question(request, question, None, &mut report)?;
                }
            }
        }

        info!(
            source = %request.source,
            inserted = report.inserted,
            updated = report.updated,
            chunks = report.chunks,
            "ingested knowledge"
        );
        Ok(report)
    }

    /// Chunk a document's text into tagged `document` entries and record
    /// the file as processed
    pub fn ingest_document(&self, doc: &DocumentText, auto_tag: bool) -> StoreResult<IngestReport> {
        let request = IngestRequest::new(Source::Document)
            .context(doc.text.as_str())
            .auto_tag(auto_tag);
        if request.context.is_none() {
            warn!(file = %doc.filename, "document has no text, skipped");
            return Ok(IngestReport::default());
        }

        let report = self.ingest(&request)?;
        self.store
            .record_training_file(&doc.filename, doc.kind.as_str(), report.chunks)?;
        info!(file = %doc.filename, kind = %doc.kind, chunks = report.chunks, "processed document");
        Ok(report)
    }

    /// Store an assistant answer so the same question is served from memory
    pub fn remember(&self, question: &str, answer: &str) -> StoreResult<IngestReport> {
        self.ingest(&IngestRequest::new(Source::User).question(question).answer(answer))
    }

    fn upsert_question(
        &self,
        request: &IngestRequest,
        question: &str,
        context: Option<&str>,
        report: &mut IngestReport,
    ) -> StoreResult<()> {
        let embed_text = context.unwrap_or(question);
        let upserted = self.store.upsert_by_question(&NewEntry {
            question: Some(question.to_string()),
            answer: request.answer.clone(),
            context: context.map(String::from),
            embedding: embed_or_zero(self.provider.as_ref(), embed_text),
            source: request.source,
            tags: self.tags_for(request, embed_text),
        })?;

        if upserted.created {
            report.inserted += 1;
        } else {
            debug!(id = upserted.id, "question already known, entry updated");
            report.updated += 1;
        }
        Ok(())
    }

    fn tags_for(&self, request: &IngestRequest, text: &str) -> BTreeSet<String> {
        let mut tags = request.tags.clone();
        if request.auto_tag {
            tags.extend(self.tagger.tags_for(text));
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::topics::DEFAULT_TOPICS;
    use crate::search::testing::StubEmbedder;

    const DIM: usize = 4;

    fn setup(chunk_size: usize) -> (Arc<KnowledgeStore>, Ingestor) {
        let store = Arc::new(KnowledgeStore::open_in_memory(DIM).unwrap());
        let provider = Arc::new(StubEmbedder::new(DIM, &[("Q1", [1.0, 0.0, 0.0, 0.0])]));
        let tagger = Arc::new(TopicTagger::new(Arc::new(DEFAULT_TOPICS.clone())));
        let ingestor = Ingestor::new(Arc::clone(&store), provider, tagger, chunk_size);
        (store, ingestor)
    }

    #[test]
    fn test_dedupe_by_question() {
        let (store, ingestor) = setup(2000);
        let first = ingestor.remember("Q1", "A1").unwrap();
        assert_eq!(first, IngestReport { inserted: 1, updated: 0, chunks: 0 });

        let second = ingestor.remember("Q1", "A2").unwrap();
        assert_eq!(second, IngestReport { inserted: 0, updated: 1, chunks: 0 });

        assert_eq!(store.count().unwrap(), 1);
        let entry = store.find_by_question("Q1").unwrap().unwrap();
        assert_eq!(entry.answer.as_deref(), Some("A2"));
        assert_eq!(entry.usage_count, 2);
        assert_eq!(entry.source, Source::User);
        assert_eq!(entry.embedding, vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_short_context_with_question_is_one_entry() {
        let (store, ingestor) = setup(2000);
        let request = IngestRequest::new(Source::User)
            .question("Чем полезен магний?")
            .answer("Помогает уснуть")
            .context("Магний улучшает сон.");
        ingestor.ingest(&request).unwrap();
        ingestor.ingest(&request).unwrap();

        let entries = store.scan_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].context.as_deref(), Some("Магний улучшает сон."));
        assert_eq!(entries[0].usage_count, 2);
        assert!(entries[0].tags.is_empty());
    }

    #[test]
    fn test_long_context_is_chunked_and_never_deduped() {
        let (store, ingestor) = setup(40);
        let text = "Витамин С поддерживает иммунитет. Магний помогает уснуть. Омега-3 для сердца.";
        let request = IngestRequest::new(Source::Document).context(text);

        let report = ingestor.ingest(&request).unwrap();
        assert_eq!(report.chunks, 3);
        ingestor.ingest(&request).unwrap();
        assert_eq!(store.count().unwrap(), 6);

        let entries = store.scan_all().unwrap();
        assert!(entries.iter().all(|e| e.question.is_none() && e.source == Source::Document));
        assert!(entries[0].tags.contains("vitamins"));
        assert!(entries[1].tags.contains("sleep"));
    }

    #[test]
    fn test_long_context_with_question_keeps_question_entry() {
        let (store, ingestor) = setup(40);
        let request = IngestRequest::new(Source::User)
            .question("Q1")
            .answer("A1")
            .context("Первое длинное предложение здесь. Второе длинное предложение тут.");

        let report = ingestor.ingest(&request).unwrap();
        assert_eq!(report, IngestReport { inserted: 3, updated: 0, chunks: 2 });

        let entry = store.find_by_question("Q1").unwrap().unwrap();
        assert!(entry.context.is_none());
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_empty_request_is_noop() {
        let (store, ingestor) = setup(2000);
        let report = ingestor
            .ingest(&IngestRequest::new(Source::User).question("  ").context(""))
            .unwrap();
        assert!(report.is_empty());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_explicit_tags_and_auto_tag_toggle() {
        let (store, ingestor) = setup(2000);
        let request = IngestRequest::new(Source::Document)
            .context("Цинк и селен для иммунитета")
            .tag("manual")
            .tag("bad,tag")
            .auto_tag(false);
        ingestor.ingest(&request).unwrap();

        let entry = &store.scan_all().unwrap()[0];
        assert_eq!(entry.tags, BTreeSet::from(["manual".to_string()]));
    }

    #[test]
    fn test_ingest_document_records_training_file() {
        let (store, ingestor) = setup(30);
        let doc = DocumentText {
            filename: "guide.pdf".into(),
            kind: DocumentKind::Pdf,
            text: "Железо при анемии. Кальций для костей. Йод для щитовидной железы.".into(),
        };
        let report = ingestor.ingest_document(&doc, true).unwrap();
        assert_eq!(report.chunks, 3);

        let stats = store.training_stats().unwrap();
        assert_eq!(stats.files, 1);
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.recent[0].filename, "guide.pdf");
        assert_eq!(stats.recent[0].file_type, "pdf");

        let empty = DocumentText {
            filename: "blank.txt".into(),
            kind: DocumentKind::Txt,
            text: "  \n ".into(),
        };
        assert!(ingestor.ingest_document(&empty, true).unwrap().is_empty());
        assert_eq!(store.training_stats().unwrap().files, 1);
    }

    #[test]
    fn test_topic_tagger() {
        let tagger = TopicTagger::new(Arc::new(DEFAULT_TOPICS.clone()));
        let tags = tagger.tags_for("Бессонница и стресс: поможет МАГНИЙ");
        assert!(tags.contains("sleep"));
        assert!(tagger.tags_for("рецепт борща").is_empty());
    }

    #[test]
    fn test_document_kind_parsing() {
        assert_eq!("PDF".parse::<DocumentKind>().unwrap(), DocumentKind::Pdf);
        assert_eq!("txt".parse::<DocumentKind>().unwrap(), DocumentKind::Txt);
        assert!("docx".parse::<DocumentKind>().is_err());
    }
}
