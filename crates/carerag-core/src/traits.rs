use crate::error::Result;
use crate::types::{Document, SearchOutcome};

/// Maps text to fixed-dimension, L2-normalized vectors.
///
/// The same implementation (same `model_id`) must be used at build and query
/// time; `dim` is what the retriever checks against a persisted index.
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Which storage strategy backs a retriever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Persisted,
    Memory,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Persisted => f.write_str("persisted"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

/// Shared surface of the persisted-index and in-memory strategies.
pub trait Retriever: Send + Sync {
    fn backend(&self) -> Backend;
    /// Number of chunk records currently searchable.
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool { self.len() == 0 }
    /// Chunks, embeds and stores a document; returns how many chunks were added.
    fn add(&self, document: &Document) -> Result<usize>;
    fn search(&self, query: &str, top_k: usize) -> Result<SearchOutcome>;
}
