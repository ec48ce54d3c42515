//! Domain types shared by the indexer, the retrievers and the service layer.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Parsed body of a knowledge-base file.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentBody {
    /// Markdown-like prose; markup is stripped before chunking.
    Markdown(String),
    /// Structured entry (JSON); stringified before chunking.
    Structured(SourceValue),
    /// Anything else, taken verbatim.
    Plain(String),
}

/// Shape of a structured document before stringification.
///
/// Objects keep their key order so that "all leaf values" concatenation is
/// stable across runs.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    Text(String),
    Object(Vec<(String, SourceValue)>),
    List(Vec<SourceValue>),
}

impl SourceValue {
    /// Mirrors JSON truthiness: empty strings and empty containers count as absent.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Object(fields) => fields.is_empty(),
            Self::List(items) => items.is_empty(),
        }
    }

    pub fn field(&self, key: &str) -> Option<&SourceValue> {
        match self {
            Self::Object(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for SourceValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Text(String::new()),
            Value::Bool(b) => Self::Text(b.to_string()),
            Value::Number(n) => Self::Text(n.to_string()),
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

/// A source unit of knowledge, immutable once loaded.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub body: DocumentBody,
    pub category: Option<String>,
    pub language: Option<String>,
}

impl Document {
    pub fn markdown(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self { path: path.into(), body: DocumentBody::Markdown(text.into()), category: None, language: None }
    }

    pub fn plain(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self { path: path.into(), body: DocumentBody::Plain(text.into()), category: None, language: None }
    }

    pub fn structured(path: impl Into<PathBuf>, value: SourceValue) -> Self {
        Self { path: path.into(), body: DocumentBody::Structured(value), category: None, language: None }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn path_string(&self) -> String {
        self.path.to_string_lossy().to_string()
    }
}

/// A contiguous, size-bounded slice of a document's cleaned text.
///
/// `overlap` counts the leading characters shared with the previous chunk of
/// the same document (0 for the first chunk).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub overlap: usize,
    pub source_path: String,
}

/// One persisted metadata record; element `i` describes vector `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub file_path: String,
    pub chunk_text: String,
}

impl From<&Chunk> for ChunkRecord {
    fn from(chunk: &Chunk) -> Self {
        Self { file_path: chunk.source_path.clone(), chunk_text: chunk.text.clone() }
    }
}

/// A ranked search result. `score` is cosine similarity; higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub score: f32,
    pub chunk_text: String,
    pub file_path: String,
}

/// Result of a search that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Hits(Vec<Hit>),
    /// Nothing valid was found; callers answer with a fallback instead of failing.
    NothingFound,
}

impl SearchOutcome {
    pub fn from_hits(hits: Vec<Hit>) -> Self {
        if hits.is_empty() { Self::NothingFound } else { Self::Hits(hits) }
    }

    pub fn hits(&self) -> &[Hit] {
        match self {
            Self::Hits(hits) => hits,
            Self::NothingFound => &[],
        }
    }

    pub fn is_nothing_found(&self) -> bool {
        matches!(self, Self::NothingFound)
    }
}

/// One entry of the knowledge-base catalog (documents, not chunks).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub file_path: String,
    pub category: String,
    pub language: String,
    pub product_area: String,
    pub requires_auth: bool,
    pub last_reviewed: String,
}
