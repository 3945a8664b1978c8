//! Hybrid retrieval: cosine similarity with source and topic-keyword boosts
//!
//! ```text
//! query → lower-case + abbreviation expansion → embed
//!       → scan all entries → skip empty / duplicate rows
//!       → score = cosine × source boost × keyword boost
//!       → rank (score desc, last_used desc)
//!       → primary threshold, else fallback threshold → top-k
//!       → bump usage of the returned entries
//! ```

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::embedding::{cosine_similarity, embed_or_zero, EmbeddingProvider};
use super::store::KnowledgeStore;
use crate::core::config::RetrievalConfig;
use crate::core::entry::{KnowledgeEntry, ScoredEntry, Source};
use crate::core::error::StoreResult;
use crate::core::topics::Topics;

/// Per-query thresholds and result size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    pub primary_threshold: f32,
    pub fallback_threshold: f32,
    pub top_k: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for SearchParams {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            primary_threshold: config.primary_threshold,
            fallback_threshold: config.fallback_threshold,
            top_k: config.top_k,
        }
    }
}

/// Multiplicative score boosts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boosts {
    pub document: f32,
    pub keyword: f32,
}

impl Default for Boosts {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for Boosts {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            document: config.document_boost,
            keyword: config.keyword_boost,
        }
    }
}

/// Retrieval engine over a shared knowledge store
pub struct Retriever {
    store: Arc<KnowledgeStore>,
    provider: Arc<dyn EmbeddingProvider>,
    topics: Arc<Topics>,
    boosts: Boosts,
}

impl Retriever {
    pub fn new(
        store: Arc<KnowledgeStore>,
        provider: Arc<dyn EmbeddingProvider>,
        topics: Arc<Topics>,
    ) -> Self {
        Self {
            store,
            provider,
            topics,
            boosts: Boosts::default(),
        }
    }

    pub fn with_boosts(mut self, boosts: Boosts) -> Self {
        self.boosts = boosts;
        self
    }

    /// Lower-case the query and append the full form of every abbreviation
    /// that appears as a standalone space-delimited token
    pub fn expand_abbreviations(&self, query: &str) -> String {
        let query_lower = query.to_lowercase();
        let padded = format!(" {} ", query_lower);
        let mut expanded = query_lower.clone();

        for (abbr, full) in self.topics.abbreviations() {
            if padded.contains(&format!(" {} ", abbr)) {
                expanded.push(' ');
                expanded.push_str(full);
            }
        }

        let expanded = expanded.trim().to_string();
        debug!(query, expanded = %expanded, "expanded query");
        expanded
    }

    /// Ranked, threshold-filtered top-k entries for `query`
    ///
    /// Every returned entry has its usage bumped exactly once; the returned
    /// copies already reflect the bump. An empty result means no stored
    /// knowledge cleared even the fallback threshold.
    pub fn search(&self, query: &str, params: &SearchParams) -> StoreResult<Vec<ScoredEntry>> {
        let expanded = self.expand_abbreviations(query);
        let query_vector = embed_or_zero(self.provider.as_ref(), &expanded);

        let entries = self.store.scan_all()?;
        let ranked = self.rank(&expanded, &query_vector, entries);
        let (mut results, fallback) = select_with_fallback(ranked, params);

        info!(
            results = results.len(),
            threshold = params.primary_threshold,
            min_threshold = params.fallback_threshold,
            fallback,
            "retrieved relevant entries"
        );

        if results.is_empty() {
            return Ok(results);
        }

        let ids: Vec<i64> = results.iter().map(|r| r.entry.id).collect();
        let (stamp, bumped) = self.store.bump_usage(&ids)?;
        for result in &mut results {
            result.entry.usage_count += 1;
            result.entry.last_used = result.entry.last_used.max(stamp);
        }
        info!(bumped, "updated usage counters");

        Ok(results)
    }

    /// Score and order candidates; no thresholds applied
    pub fn rank(
        &self,
        expanded_query: &str,
        query_vector: &[f32],
        entries: Vec<KnowledgeEntry>,
    ) -> Vec<ScoredEntry> {
        let query_lower = expanded_query.to_lowercase();
        let mut seen = HashSet::new();
        let mut scored = Vec::with_capacity(entries.len());

        for entry in entries {
            let text_lower = match entry.comparison_text() {
                Some(text) => text.to_lowercase(),
                None => {
                    warn!(id = entry.id, "skipping malformed entry without text");
                    continue;
                }
            };

            if !seen.insert(entry.dedup_key()) {
                debug!(id = entry.id, "skipping duplicate entry");
                continue;
            }

            let similarity = cosine_similarity(query_vector, &entry.embedding);
            let tags_lower = entry.tags_joined().to_lowercase();
            let keyword_group = self
                .matching_group(&query_lower, &text_lower, &tags_lower)
                .map(String::from);

            let source_boost = match entry.source {
                Source::Document => self.boosts.document,
                Source::User => 1.0,
            };
            let keyword_boost = if keyword_group.is_some() {
                self.boosts.keyword
            } else {
                1.0
            };

            scored.push(ScoredEntry {
                score: similarity * source_boost * keyword_boost,
                similarity,
                keyword_group,
                entry,
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.entry.last_used.cmp(&a.entry.last_used))
        });
        scored
    }

    /// First topic group whose keywords occur in both the query and the
    /// candidate's text or tags
    fn matching_group(
        &self,
        query_lower: &str,
        text_lower: &str,
        tags_lower: &str,
    ) -> Option<&str> {
        self.topics
            .keyword_groups()
            .iter()
            .find(|group| {
                group.matches(query_lower)
                    && (group.matches(text_lower) || group.matches(tags_lower))
            })
            .map(|group| group.name.as_str())
    }
}

/// Apply the primary threshold, falling back to the lower bound when the
/// primary pass is empty. Returns the selection and whether fallback fired.
pub fn select_with_fallback(
    ranked: Vec<ScoredEntry>,
    params: &SearchParams,
) -> (Vec<ScoredEntry>, bool) {
    let above = |threshold: f32| {
        ranked
            .iter()
            .filter(|r| r.score >= threshold)
            .take(params.top_k)
            .cloned()
            .collect::<Vec<_>>()
    };

    let primary = above(params.primary_threshold);
    if !primary.is_empty() || ranked.is_empty() {
        return (primary, false);
    }
    (above(params.fallback_threshold), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::topics::{KeywordGroup, DEFAULT_TOPICS};
    use crate::search::store::NewEntry;
    use crate::search::testing::StubEmbedder;
    use std::collections::BTreeSet;

    const DIM: usize = 4;

    fn setup(topics: Topics, vectors: &[(&str, [f32; DIM])]) -> (Arc<KnowledgeStore>, Retriever) {
        let store = Arc::new(KnowledgeStore::open_in_memory(DIM).unwrap());
        let provider = Arc::new(StubEmbedder::new(DIM, vectors));
        let retriever = Retriever::new(Arc::clone(&store), provider, Arc::new(topics));
        (store, retriever)
    }

    fn chunk(
        store: &KnowledgeStore,
        text: &str,
        source: Source,
        tags: &[&str],
        v: [f32; DIM],
    ) -> i64 {
        let tags: BTreeSet<String> = tags.iter().map(|t| t.to_string()).collect();
        store.insert_context_chunk(text, &tags, source, v.to_vec()).unwrap()
    }

    fn params(primary: f32, fallback: f32, top_k: usize) -> SearchParams {
        SearchParams {
            primary_threshold: primary,
            fallback_threshold: fallback,
            top_k,
        }
    }

    const QUERY_VEC: [f32; DIM] = [1.0, 0.0, 0.0, 0.0];
    const HALF_VEC: [f32; DIM] = [0.5, 0.866_025_4, 0.0, 0.0];

    #[test]
    fn test_fallback_threshold_returns_best_available() {
        let (store, retriever) = setup(Topics::empty(), &[("q", QUERY_VEC)]);
        let id = chunk(&store, "entry", Source::User, &[], HALF_VEC);

        let results = retriever.search("q", &params(0.7, 0.4, 3)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry.id, id);
        assert!((results[0].score - 0.5).abs() < 1e-4);
        assert_eq!(results[0].entry.usage_count, 2);
        assert_eq!(store.get(id).unwrap().unwrap().usage_count, 2);
    }

    #[test]
    fn test_fallback_threshold_can_still_be_empty() {
        let (store, retriever) = setup(Topics::empty(), &[("q", QUERY_VEC)]);
        let id = chunk(&store, "entry", Source::User, &[], HALF_VEC);

        let results = retriever.search("q", &params(0.7, 0.6, 3)).unwrap();
        assert!(results.is_empty());
        assert_eq!(store.get(id).unwrap().unwrap().usage_count, 1);
    }

    #[test]
    fn test_empty_store_returns_empty() {
        let (_store, retriever) = setup(Topics::empty(), &[("q", QUERY_VEC)]);
        assert!(retriever.search("q", &SearchParams::default()).unwrap().is_empty());
    }

    #[test]
    fn test_document_and_topic_boosts_rank_relevant_entry_first() {
        let query = "что помогает иммунитету";
        let (store, retriever) = setup(DEFAULT_TOPICS.clone(), &[(query, QUERY_VEC)]);

        let unrelated = chunk(
            &store,
            "рецепт борща со свеклой",
            Source::User,
            &[],
            [0.3, 0.0, 0.953_939_2, 0.0],
        );
        let relevant = chunk(
            &store,
            "Контекст про иммунитет и витамин С",
            Source::Document,
            &["immunity"],
            [0.75, 0.661_437_8, 0.0, 0.0],
        );

        let results = retriever.search(query, &params(0.2, 0.1, 3)).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].entry.id, relevant);
        assert_eq!(results[0].keyword_group.as_deref(), Some("immunity"));
        assert!((results[0].score - 0.75 * 1.2 * 1.5).abs() < 1e-3);
        assert_eq!(results[1].entry.id, unrelated);
        assert!(results[1].keyword_group.is_none());

        let results = retriever.search(query, &SearchParams::default()).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry.id, relevant);
    }

    #[test]
    fn test_keyword_boost_matches_tags_and_does_not_stack() {
        let topics = Topics::new(
            vec![],
            vec![
                KeywordGroup::new("sleep", &["сон"]),
                KeywordGroup::new("rest", &["отдых", "сон"]),
            ],
            vec![],
        );
        let (store, retriever) = setup(topics, &[("сон и отдых", QUERY_VEC)]);
        chunk(&store, "магний вечером", Source::User, &["сон"], HALF_VEC);

        let results = retriever.search("сон и отдых", &params(0.0, 0.0, 3)).unwrap();
        assert_eq!(results[0].keyword_group.as_deref(), Some("sleep"));
        assert!((results[0].score - 0.5 * 1.5).abs() < 1e-4);
    }

    #[test]
    fn test_duplicates_and_malformed_entries_are_skipped() {
        let (store, retriever) = setup(Topics::empty(), &[("q", QUERY_VEC)]);
        let first = chunk(&store, "same text", Source::Document, &[], QUERY_VEC);
        let dup = chunk(&store, "same text", Source::Document, &[], QUERY_VEC);
        let empty = store
            .insert(&NewEntry {
                question: None,
                answer: None,
                context: Some("   ".into()),
                embedding: QUERY_VEC.to_vec(),
                source: Source::User,
                tags: BTreeSet::new(),
            })
            .unwrap();

        let results = retriever.search("q", &params(0.7, 0.4, 3)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry.id, first);
        assert_eq!(store.get(dup).unwrap().unwrap().usage_count, 1);
        assert_eq!(store.get(empty).unwrap().unwrap().usage_count, 1);
    }

    #[test]
    fn test_ties_prefer_recently_used() {
        let (store, retriever) = setup(Topics::empty(), &[("q", QUERY_VEC)]);
        let older = chunk(&store, "first", Source::User, &[], HALF_VEC);
        let newer = chunk(&store, "second", Source::User, &[], HALF_VEC);
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.bump_usage(&[older]).unwrap();

        let results = retriever.search("q", &params(0.4, 0.1, 2)).unwrap();
        let ids: Vec<i64> = results.iter().map(|r| r.entry.id).collect();
        assert_eq!(ids, vec![older, newer]);
    }

    #[test]
    fn test_top_k_truncates() {
        let (store, retriever) = setup(Topics::empty(), &[("q", QUERY_VEC)]);
        for i in 0..5 {
            chunk(&store, &format!("entry {}", i), Source::User, &[], QUERY_VEC);
        }
        assert_eq!(retriever.search("q", &params(0.7, 0.4, 3)).unwrap().len(), 3);
    }

    #[test]
    fn test_unembeddable_query_still_searches() {
        let (store, retriever) = setup(Topics::empty(), &[]);
        chunk(&store, "entry", Source::User, &[], HALF_VEC);
        // zero query vector → similarity 0 for everything
        let results = retriever.search("", &params(0.7, 0.0, 3)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].similarity, 0.0);
    }

    #[test]
    fn test_abbreviation_expansion() {
        let (_store, retriever) = setup(DEFAULT_TOPICS.clone(), &[]);
        assert_eq!(
            retriever.expand_abbreviations("Что пить при проблемах с ЖКТ"),
            "что пить при проблемах с жкт желудочно-кишечный тракт"
        );
        assert_eq!(
            retriever.expand_abbreviations("бад от стресса"),
            "бад от стресса биологически активная добавка"
        );
        assert_eq!(retriever.expand_abbreviations("какой бад?"), "какой бад?");
        assert_eq!(retriever.expand_abbreviations("жкт"), "жкт желудочно-кишечный тракт");
    }
}
