//! Knowledge store on SQLite
//!
//! Entries and their embeddings live in one table; embeddings are BLOBs of
//! little-endian f32 values and similarity is computed in Rust. The
//! connection sits behind a mutex so one store can be shared through `Arc`
//! by concurrent handlers. Every mutating operation is a single transaction.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, warn};

use crate::core::entry::{join_tags, split_tags, KnowledgeEntry, Source};
use crate::core::error::{StoreError, StoreResult};

/// Entries used more often than this count as popular in [`StoreStats`]
pub const POPULAR_USAGE: i64 = 5;

const ENTRY_COLUMNS: &str =
    "id, question, answer, context, embedding, last_used, usage_count, source, tags";

/// Fields of an entry before the store assigns its id
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub context: Option<String>,
    pub embedding: Vec<f32>,
    pub source: Source,
    pub tags: BTreeSet<String>,
}

/// Outcome of [`KnowledgeStore::upsert_by_question`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub id: i64,
    pub created: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub documents: usize,
    pub user: usize,
    pub popular: usize,
    pub top_questions: Vec<(String, i64)>,
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingFile {
    pub filename: String,
    pub file_type: String,
    pub processed_at: DateTime<Utc>,
    pub chunks_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingStats {
    pub files: usize,
    pub chunks: usize,
    pub recent: Vec<TrainingFile>,
}

/// Durable table of knowledge entries
pub struct KnowledgeStore {
    conn: Mutex<Connection>,
    dimension: usize,
}

impl KnowledgeStore {
    /// Open or create the store at `db_path` for vectors of `dimension`
    pub fn open(db_path: &Path, dimension: usize) -> StoreResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        Self::with_connection(conn, dimension)
    }

    /// Open in-memory store (for testing)
    pub fn open_in_memory(dimension: usize) -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, dimension)
    }

    fn with_connection(conn: Connection, dimension: usize) -> StoreResult<Self> {
        let store = Self {
            conn: Mutex::new(conn),
            dimension,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        self.lock()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS knowledge_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question TEXT,
                answer TEXT,
                context TEXT,
                embedding BLOB NOT NULL,
                last_used INTEGER NOT NULL,  -- unix millis
                usage_count INTEGER NOT NULL DEFAULT 1 CHECK (usage_count >= 1),
                source TEXT NOT NULL CHECK (source IN ('user', 'document')),
                tags TEXT NOT NULL DEFAULT ''  -- comma-joined
            );

            -- One entry per distinct question
            CREATE UNIQUE INDEX IF NOT EXISTS idx_entries_question
                ON knowledge_entries(question) WHERE question IS NOT NULL;
            CREATE INDEX IF NOT EXISTS idx_entries_last_used ON knowledge_entries(last_used);

            CREATE TABLE IF NOT EXISTS training_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                file_type TEXT NOT NULL,
                processed_at INTEGER NOT NULL,
                chunks_count INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT
            );
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Record the embedding model on first use; refuse a different one later
    pub fn bind_model(&self, model_id: &str) -> StoreResult<()> {
        let current = format!("{}/{}", model_id, self.dimension);
        match self.get_meta("embedding_model")? {
            Some(stored) if stored != current => {
                Err(StoreError::IncompatibleIndex { stored, current })
            }
            Some(_) => Ok(()),
            None => self.set_meta("embedding_model", &current),
        }
    }

    fn check_dimension(&self, embedding: &[f32]) -> StoreResult<()> {
        if embedding.len() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }

    /// Insert a new row and return its id
    pub fn insert(&self, entry: &NewEntry) -> StoreResult<i64> {
        self.check_dimension(&entry.embedding)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO knowledge_entries
                (question, answer, context, embedding, last_used, usage_count, source, tags)
            VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)
            "#,
            params![
                entry.question,
                entry.answer,
                entry.context,
                encode_vector(&entry.embedding),
                now_millis(),
                entry.source.as_str(),
                join_tags(&entry.tags),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    /// Always inserts a new question-less row
    pub fn insert_context_chunk(
        &self,
        context: &str,
        tags: &BTreeSet<String>,
        source: Source,
        embedding: Vec<f32>,
    ) -> StoreResult<i64> {
        let id = self.insert(&NewEntry {
            question: None,
            answer: None,
            context: Some(context.to_string()),
            embedding,
            source,
            tags: tags.clone(),
        })?;
        debug!(id, chars = context.chars().count(), "inserted context chunk");
        Ok(id)
    }

    pub fn find_by_question(&self, question: &str) -> StoreResult<Option<KnowledgeEntry>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM knowledge_entries WHERE question = ?1", ENTRY_COLUMNS),
                params![question],
                read_row,
            )
            .optional()?;
        raw.map(RawRow::decode).transpose()
    }

    pub fn get(&self, id: i64) -> StoreResult<Option<KnowledgeEntry>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM knowledge_entries WHERE id = ?1", ENTRY_COLUMNS),
                params![id],
                read_row,
            )
            .optional()?;
        raw.map(RawRow::decode).transpose()
    }

    /// Overwrite the entry for `entry.question`, or create it with usage 1
    ///
    /// A single `INSERT … ON CONFLICT DO UPDATE` statement, so concurrent
    /// upserts of one question never create two rows or lose an increment.
    /// An existing entry keeps its `source`.
    pub fn upsert_by_question(&self, entry: &NewEntry) -> StoreResult<Upserted> {
        self.check_dimension(&entry.embedding)?;
        let question = match entry.question.as_deref() {
            Some(q) => q,
            None => {
                let id = self.insert(entry)?;
                return Ok(Upserted { id, created: true });
            }
        };

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let (id, usage_count): (i64, i64) = tx.query_row(
            r#"
            INSERT INTO knowledge_entries
                (question, answer, context, embedding, last_used, usage_count, source, tags)
            VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)
            ON CONFLICT(question) WHERE question IS NOT NULL DO UPDATE SET
                answer = excluded.answer,
                context = excluded.context,
                embedding = excluded.embedding,
                tags = excluded.tags,
                usage_count = knowledge_entries.usage_count + 1,
                last_used = MAX(knowledge_entries.last_used, excluded.last_used)
            RETURNING id, usage_count
            "#,
            params![
                question,
                entry.answer,
                entry.context,
                encode_vector(&entry.embedding),
                now_millis(),
                entry.source.as_str(),
                join_tags(&entry.tags),
            ],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        tx.commit()?;

        let created = usage_count == 1;
        debug!(id, created, "upserted question entry");
        Ok(Upserted { id, created })
    }

    /// Committed snapshot of every entry
    pub fn scan_all(&self) -> StoreResult<Vec<KnowledgeEntry>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM knowledge_entries ORDER BY id", ENTRY_COLUMNS))?;
        let rows = stmt.query_map([], read_row)?;
        decode_rows(rows)
    }

    /// Increment usage and refresh `last_used`, one atomic statement per id
    ///
    /// Returns the timestamp written and how many rows were touched.
    pub fn bump_usage(&self, ids: &[i64]) -> StoreResult<(DateTime<Utc>, usize)> {
        let now = now_millis();
        let mut conn = self.lock()?;
        let mut updated = 0;
        for id in ids {
            let tx = conn.transaction()?;
            updated += tx.execute(
                r#"
                UPDATE knowledge_entries
                SET usage_count = usage_count + 1,
                    last_used = MAX(last_used, ?1)
                WHERE id = ?2
                "#,
                params![now, id],
            )?;
            tx.commit()?;
        }
        Ok((millis_to_datetime(now), updated))
    }

    /// Delete every entry matching `predicate` in one transaction
    pub fn delete_where<F>(&self, predicate: F) -> StoreResult<usize>
    where
        F: Fn(&KnowledgeEntry) -> bool,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let doomed: Vec<i64> = {
            let mut stmt = tx.prepare(&format!("SELECT {} FROM knowledge_entries", ENTRY_COLUMNS))?;
            let rows = stmt.query_map([], read_row)?;
            decode_rows(rows)?
                .into_iter()
                .filter(|entry| predicate(entry))
                .map(|entry| entry.id)
                .collect()
        };

        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM knowledge_entries WHERE id = ?1")?;
            for id in &doomed {
                deleted += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    /// Evict stale entries once the table holds more than `max_items`
    ///
    /// Deletes user-origin, untagged entries used fewer than `min_usage`
    /// times that are not among the `max_items` most recently used. The
    /// count, the protected slice and the delete share one immediate
    /// transaction, so an entry committed concurrently is either counted
    /// and ranked or not touched at all. Returns `(total, deleted)`.
    pub fn evict_stale(&self, min_usage: i64, max_items: usize) -> StoreResult<(usize, usize)> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let total: i64 =
            tx.query_row("SELECT COUNT(*) FROM knowledge_entries", [], |row| row.get(0))?;
        let total = total as usize;
        if total <= max_items {
            return Ok((total, 0));
        }

        let deleted = tx.execute(
            r#"
            DELETE FROM knowledge_entries
            WHERE usage_count < ?1
              AND source = 'user'
              AND tags = ''
              AND id NOT IN (
                  SELECT id FROM knowledge_entries
                  ORDER BY last_used DESC, id DESC
                  LIMIT ?2
              )
            "#,
            params![min_usage, max_items as i64],
        )?;
        tx.commit()?;
        Ok((total, deleted))
    }

    pub fn count(&self) -> StoreResult<usize> {
        let conn = self.lock()?;
        let n: i64 =
            conn.query_row("SELECT COUNT(*) FROM knowledge_entries", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Most recently used entries first
    pub fn recent(&self, limit: usize) -> StoreResult<Vec<KnowledgeEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM knowledge_entries ORDER BY last_used DESC, id DESC LIMIT ?1",
            ENTRY_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit as i64], read_row)?;
        decode_rows(rows)
    }

    /// Ids of the `limit` most recently used entries
    pub fn most_recent_ids(&self, limit: usize) -> StoreResult<BTreeSet<i64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id FROM knowledge_entries ORDER BY last_used DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| row.get(0))?;

        let mut ids = BTreeSet::new();
        for row in rows {
            ids.insert(row?);
        }
        Ok(ids)
    }

    pub fn stats(&self) -> StoreResult<StoreStats> {
        let conn = self.lock()?;
        let (total, documents, popular, last_used): (i64, i64, i64, Option<i64>) = conn.query_row(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(source = 'document'), 0),
                   COALESCE(SUM(usage_count > ?1), 0),
                   MAX(last_used)
            FROM knowledge_entries
            "#,
            params![POPULAR_USAGE],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        let mut stmt = conn.prepare(
            r#"
            SELECT question, usage_count FROM knowledge_entries
            WHERE question IS NOT NULL
            ORDER BY usage_count DESC, last_used DESC
            LIMIT 5
            "#,
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut top_questions = Vec::new();
        for row in rows {
            top_questions.push(row?);
        }

        Ok(StoreStats {
            total: total as usize,
            documents: documents as usize,
            user: (total - documents) as usize,
            popular: popular as usize,
            top_questions,
            last_used: last_used.map(millis_to_datetime),
        })
    }

    pub fn record_training_file(
        &self,
        filename: &str,
        file_type: &str,
        chunks_count: usize,
    ) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO training_files (filename, file_type, processed_at, chunks_count)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![filename, file_type, now_millis(), chunks_count as i64],
        )?;
        Ok(())
    }

    pub fn training_stats(&self) -> StoreResult<TrainingStats> {
        let conn = self.lock()?;
        let (files, chunks): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(chunks_count), 0) FROM training_files",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stmt = conn.prepare(
            r#"
            SELECT filename, file_type, processed_at, chunks_count FROM training_files
            ORDER BY processed_at DESC, id DESC
            LIMIT 5
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TrainingFile {
                filename: row.get(0)?,
                file_type: row.get(1)?,
                processed_at: millis_to_datetime(row.get(2)?),
                chunks_count: row.get::<_, i64>(3)? as usize,
            })
        })?;
        let mut recent = Vec::new();
        for row in rows {
            recent.push(row?);
        }

        Ok(TrainingStats {
            files: files as usize,
            chunks: chunks as usize,
            recent,
        })
    }

    pub fn set_meta(&self, key: &str, value: &str) -> StoreResult<()> {
        self.lock()?.execute(
            "INSERT INTO index_meta (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .lock()?
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

/// Row as read from SQLite, vector still encoded
struct RawRow {
    entry: KnowledgeEntry,
    blob: Vec<u8>,
}

impl RawRow {
    fn decode(mut self) -> StoreResult<KnowledgeEntry> {
        self.entry.embedding = decode_vector(&self.blob).ok_or(StoreError::CorruptVector {
            id: self.entry.id,
            len: self.blob.len(),
        })?;
        Ok(self.entry)
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    let source: String = row.get(7)?;
    let source = source
        .parse::<Source>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, e.into()))?;
    let tags: String = row.get(8)?;

    Ok(RawRow {
        entry: KnowledgeEntry {
            id: row.get(0)?,
            question: row.get(1)?,
            answer: row.get(2)?,
            context: row.get(3)?,
            embedding: Vec::new(),
            last_used: millis_to_datetime(row.get(5)?),
            usage_count: row.get(6)?,
            source,
            tags: split_tags(&tags),
        },
        blob: row.get(4)?,
    })
}

/// Decode rows, skipping entries whose vector blob is corrupt
fn decode_rows<I>(rows: I) -> StoreResult<Vec<KnowledgeEntry>>
where
    I: Iterator<Item = rusqlite::Result<RawRow>>,
{
    let mut entries = Vec::new();
    for row in rows {
        match row?.decode() {
            Ok(entry) => entries.push(entry),
            Err(StoreError::CorruptVector { id, len }) => {
                warn!(id, len, "skipping entry with corrupt vector");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(entries)
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Encode a vector as little-endian f32 bytes
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for &val in vector {
        blob.extend_from_slice(&val.to_le_bytes());
    }
    blob
}

/// Decode little-endian f32 bytes; `None` if the length is not a multiple of 4
pub fn decode_vector(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const DIM: usize = 4;

    fn question_entry(question: &str, answer: &str) -> NewEntry {
        NewEntry {
            question: Some(question.to_string()),
            answer: Some(answer.to_string()),
            context: None,
            embedding: vec![0.5; DIM],
            source: Source::User,
            tags: BTreeSet::new(),
        }
    }

    fn tags(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_vector_round_trip_is_bit_exact() {
        let vector = vec![1.0, -0.0, f32::MIN_POSITIVE, 3.402_823_5e38, -1.5e-42, 0.1];
        let recovered = decode_vector(&encode_vector(&vector)).unwrap();
        let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&vector), bits(&recovered));
    }

    #[test]
    fn test_corrupt_blob_rejected() {
        assert!(decode_vector(&[0, 0, 128]).is_none());
        assert_eq!(decode_vector(&[]), Some(vec![]));
    }

    #[test]
    fn test_upsert_dedupes_by_question() -> StoreResult<()> {
        let store = KnowledgeStore::open_in_memory(DIM)?;

        let first = store.upsert_by_question(&question_entry("Q1", "A1"))?;
        assert!(first.created);
        let second = store.upsert_by_question(&question_entry("Q1", "A2"))?;
        assert!(!second.created);
        assert_eq!(first.id, second.id);

        assert_eq!(store.count()?, 1);
        let entry = store.find_by_question("Q1")?.unwrap();
        assert_eq!(entry.answer.as_deref(), Some("A2"));
        assert_eq!(entry.usage_count, 2);
        Ok(())
    }

    #[test]
    fn test_context_chunks_are_never_deduped() -> StoreResult<()> {
        let store = KnowledgeStore::open_in_memory(DIM)?;
        let t = tags(&["sleep"]);
        let text = "Магний помогает уснуть.";
        store.insert_context_chunk(text, &t, Source::Document, vec![1.0; DIM])?;
        store.insert_context_chunk(text, &t, Source::Document, vec![1.0; DIM])?;

        let all = store.scan_all()?;
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|e| e.question.is_none() && e.tags == t));
        assert_eq!(all[0].embedding, vec![1.0; DIM]);
        Ok(())
    }

    #[test]
    fn test_dimension_mismatch() -> StoreResult<()> {
        let store = KnowledgeStore::open_in_memory(DIM)?;
        let err = store
            .insert_context_chunk("x", &BTreeSet::new(), Source::User, vec![1.0; 3])
            .unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { expected: 4, actual: 3 }));
        Ok(())
    }

    #[test]
    fn test_bump_usage_increments_and_refreshes() -> StoreResult<()> {
        let store = KnowledgeStore::open_in_memory(DIM)?;
        let none = BTreeSet::new();
        let id = store.insert_context_chunk("text", &none, Source::User, vec![1.0; DIM])?;
        let before = store.get(id)?.unwrap();

        let (_, updated) = store.bump_usage(&[id, 9999])?;
        assert_eq!(updated, 1);

        let after = store.get(id)?.unwrap();
        assert_eq!(after.usage_count, before.usage_count + 1);
        assert!(after.last_used >= before.last_used);
        Ok(())
    }

    #[test]
    fn test_concurrent_bumps_never_lose_increments() -> StoreResult<()> {
        let dir = tempfile::tempdir()?;
        let store = Arc::new(KnowledgeStore::open(&dir.path().join("kb.db"), DIM)?);
        let none = BTreeSet::new();
        let id = store.insert_context_chunk("shared", &none, Source::User, vec![1.0; DIM])?;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store.bump_usage(&[id]).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get(id)?.unwrap().usage_count, 1 + 8 * 25);
        Ok(())
    }

    #[test]
    fn test_delete_where_counts() -> StoreResult<()> {
        let store = KnowledgeStore::open_in_memory(DIM)?;
        for i in 0..5 {
            let source = if i % 2 == 0 { Source::User } else { Source::Document };
            let text = format!("chunk {}", i);
            store.insert_context_chunk(&text, &BTreeSet::new(), source, vec![1.0; DIM])?;
        }

        let deleted = store.delete_where(|e| e.source == Source::User)?;
        assert_eq!(deleted, 3);
        assert_eq!(store.count()?, 2);
        Ok(())
    }

    #[test]
    fn test_reopen_file_store_persists() -> StoreResult<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/kb.db");
        {
            let store = KnowledgeStore::open(&path, DIM)?;
            store.bind_model("test-model")?;
            store.upsert_by_question(&question_entry("Q", "A"))?;
        }

        let store = KnowledgeStore::open(&path, DIM)?;
        store.bind_model("test-model")?;
        assert_eq!(store.count()?, 1);
        assert!(matches!(
            store.bind_model("other-model"),
            Err(StoreError::IncompatibleIndex { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_stats_and_training_files() -> StoreResult<()> {
        let store = KnowledgeStore::open_in_memory(DIM)?;
        store.upsert_by_question(&question_entry("Что полезно для сна?", "Магний"))?;
        store.insert_context_chunk("doc", &BTreeSet::new(), Source::Document, vec![1.0; DIM])?;
        store.record_training_file("guide.pdf", "pdf", 12)?;
        store.record_training_file("notes.txt", "txt", 3)?;

        let stats = store.stats()?;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.user, 1);
        assert_eq!(stats.popular, 0);
        assert_eq!(stats.top_questions, vec![("Что полезно для сна?".to_string(), 1)]);

        let training = store.training_stats()?;
        assert_eq!(training.files, 2);
        assert_eq!(training.chunks, 15);
        assert_eq!(training.recent.len(), 2);
        Ok(())
    }

    #[test]
    fn test_recent_orders_by_last_used() -> StoreResult<()> {
        let store = KnowledgeStore::open_in_memory(DIM)?;
        let a = store.insert_context_chunk("a", &BTreeSet::new(), Source::User, vec![1.0; DIM])?;
        let b = store.insert_context_chunk("b", &BTreeSet::new(), Source::User, vec![1.0; DIM])?;
        std::thread::sleep(Duration::from_millis(5));
        store.bump_usage(&[a])?;

        let recent = store.recent(2)?;
        assert_eq!(recent[0].id, a);
        assert_eq!(recent[1].id, b);
        assert_eq!(store.most_recent_ids(1)?, BTreeSet::from([a]));
        Ok(())
    }

    #[test]
    fn test_corrupt_vector_rows_are_skipped() -> StoreResult<()> {
        let store = KnowledgeStore::open_in_memory(DIM)?;
        let none = BTreeSet::new();
        let good = store.insert_context_chunk("good", &none, Source::User, vec![1.0; DIM])?;
        let bad = store.insert_context_chunk("bad", &none, Source::User, vec![1.0; DIM])?;
        store.lock()?.execute(
            "UPDATE knowledge_entries SET embedding = x'000102' WHERE id = ?1",
            params![bad],
        )?;

        let ids: Vec<i64> = store.scan_all()?.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![good]);
        assert_eq!(store.recent(10)?.len(), 1);
        assert!(matches!(store.get(bad), Err(StoreError::CorruptVector { .. })));
        Ok(())
    }

    #[test]
    fn test_concurrent_upserts_keep_one_row() -> StoreResult<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("kb.db");
        // two connections on one file, so SQLite itself arbitrates
        let stores = [
            Arc::new(KnowledgeStore::open(&path, DIM)?),
            Arc::new(KnowledgeStore::open(&path, DIM)?),
        ];

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&stores[i % 2]);
                std::thread::spawn(move || {
                    for n in 0..10 {
                        store
                            .upsert_by_question(&question_entry("Q", &format!("A{}-{}", i, n)))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let all = stores[0].scan_all()?;
        assert_eq!(all.len(), 1);
        // first upsert creates the row with usage 1, each later one adds 1
        assert_eq!(all[0].usage_count, 1 + (8 * 10 - 1));
        assert!(all[0].answer.as_deref().unwrap().starts_with('A'));
        Ok(())
    }

    #[test]
    fn test_evict_stale_protects_most_recent() -> StoreResult<()> {
        let store = KnowledgeStore::open_in_memory(DIM)?;
        for i in 0..3 {
            let text = format!("old {}", i);
            store.insert_context_chunk(&text, &BTreeSet::new(), Source::User, vec![1.0; DIM])?;
        }
        // committed after any earlier look at the table
        let fresh = store.upsert_by_question(&question_entry("fresh", "fresh answer"))?.id;

        let (total, deleted) = store.evict_stale(5, 1)?;
        assert_eq!((total, deleted), (4, 3));
        assert!(store.get(fresh)?.is_some());

        assert_eq!(store.evict_stale(5, 1)?, (1, 0));
        Ok(())
    }
}
