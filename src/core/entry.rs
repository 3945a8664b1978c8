use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance of a knowledge entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Derived from a conversation turn or the assistant's own answer
    User,
    /// Derived from an ingested document chunk
    Document,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "document" => Ok(Self::Document),
            other => Err(format!("unknown source '{}'", other)),
        }
    }
}

/// One stored unit of retrievable knowledge
///
/// Entries derived from a Q/A exchange carry `question` (and usually
/// `answer`); entries derived from document chunks carry only `context`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: i64,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub context: Option<String>,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub last_used: DateTime<Utc>,
    pub usage_count: i64,
    pub source: Source,
    pub tags: BTreeSet<String>,
}

impl KnowledgeEntry {
    /// Text the entry is compared against: context, else question, else answer
    pub fn comparison_text(&self) -> Option<&str> {
        [&self.context, &self.question, &self.answer]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .find(|text| !text.trim().is_empty())
    }

    /// Identity used to suppress duplicate rows at retrieval time
    pub fn dedup_key(&self) -> (String, String, String) {
        (
            self.question.clone().unwrap_or_default(),
            self.answer.clone().unwrap_or_default(),
            self.context.clone().unwrap_or_default(),
        )
    }

    pub fn tags_joined(&self) -> String {
        join_tags(&self.tags)
    }
}

/// A retrieval hit with its adjusted score
#[derive(Debug, Clone, Serialize)]
pub struct ScoredEntry {
    pub entry: KnowledgeEntry,
    /// `similarity × source boost × keyword boost`
    pub score: f32,
    /// Raw cosine similarity
    pub similarity: f32,
    /// Topic group that triggered the keyword boost, if any
    pub keyword_group: Option<String>,
}

/// Serialize tags as the comma-joined column value
pub fn join_tags(tags: &BTreeSet<String>) -> String {
    tags.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

/// Parse the comma-joined column value back into a tag set
pub fn split_tags(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}
