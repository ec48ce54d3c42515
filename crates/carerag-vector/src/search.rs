use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use carerag_core::config::Settings;
use carerag_core::error::{Error, Result};
use carerag_core::traits::{Backend, Embedder, Retriever};
use carerag_core::types::{ChunkRecord, Document, SearchOutcome};

use crate::flat::FlatIndex;
use crate::metadata::load_records;
use crate::ranking::{collect_hits, embed_query, validate_query, SearchOptions};

/// Read-only retriever over a flat index and its metadata, both loaded once
/// at startup.
pub struct PersistedRetriever {
    index: FlatIndex,
    records: Vec<ChunkRecord>,
    embedder: Arc<dyn Embedder>,
    options: SearchOptions,
}

impl std::fmt::Debug for PersistedRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedRetriever")
            .field("vectors", &self.index.len())
            .field("dim", &self.index.dim())
            .field("model", &self.embedder.model_id())
            .finish()
    }
}

impl PersistedRetriever {
    pub fn open(settings: &Settings, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Self::open_paths(
            &settings.index_path(),
            &settings.metadata_path(),
            embedder,
            SearchOptions::from_settings(&settings.retriever),
        )
    }

    pub fn open_paths(
        index_path: &Path,
        metadata_path: &Path,
        embedder: Arc<dyn Embedder>,
        options: SearchOptions,
    ) -> Result<Self> {
        let index = FlatIndex::load(index_path)?;
        check_dimension(&index, embedder.as_ref())?;
        let records = load_records(metadata_path)?;
        let retriever = Self::from_parts(index, records, embedder, options)?;
        info!(
            index = %index_path.display(),
            vectors = retriever.index.len(),
            dim = retriever.index.dim(),
            "persisted index loaded"
        );
        Ok(retriever)
    }

    /// Pairs an in-memory index with its records, applying the same startup
    /// checks as [`open`](Self::open).
    pub fn from_parts(
        index: FlatIndex,
        records: Vec<ChunkRecord>,
        embedder: Arc<dyn Embedder>,
        options: SearchOptions,
    ) -> Result<Self> {
        check_dimension(&index, embedder.as_ref())?;
        if index.len() != records.len() {
            return Err(Error::CountMismatch { vectors: index.len(), records: records.len() });
        }
        Ok(Self { index, records, embedder, options })
    }
}

fn check_dimension(index: &FlatIndex, embedder: &dyn Embedder) -> Result<()> {
    if index.dim() != embedder.dim() {
        return Err(Error::DimensionMismatch {
            index: index.dim(),
            model: embedder.dim(),
            model_id: embedder.model_id().to_string(),
        });
    }
    Ok(())
}

impl Retriever for PersistedRetriever {
    fn backend(&self) -> Backend { Backend::Persisted }

    fn len(&self) -> usize { self.records.len() }

    fn add(&self, _document: &Document) -> Result<usize> {
        Err(Error::ReadOnly)
    }

    fn search(&self, query: &str, top_k: usize) -> Result<SearchOutcome> {
        validate_query(query, top_k)?;
        let Some(vector) = embed_query(self.embedder.as_ref(), query)? else {
            return Ok(SearchOutcome::NothingFound);
        };
        let ranked = self.index.search(&vector, self.index.len());
        let outcome = collect_hits(ranked, &self.records, top_k, self.options);
        debug!(top_k, hits = outcome.hits().len(), "persisted search");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carerag_embed::HashEmbedder;

    fn embedder() -> Arc<dyn Embedder> {
        Arc::new(HashEmbedder::new(64))
    }

    #[test]
    fn positions_past_the_metadata_are_skipped() {
        let embedder = embedder();
        let texts = ["overdraft fees explained".to_string(), "overdraft limit increase".to_string()];
        let mut index = FlatIndex::new(64);
        for v in embedder.embed_batch(&texts).unwrap() {
            index.push(&v).unwrap();
        }
        // bypasses the startup count check on purpose
        let retriever = PersistedRetriever {
            index,
            records: vec![ChunkRecord { file_path: "fees.md".into(), chunk_text: texts[0].clone() }],
            embedder,
            options: SearchOptions::default(),
        };
        let outcome = retriever.search("overdraft limit increase", 2).unwrap();
        assert_eq!(outcome.hits().len(), 1);
        assert_eq!(outcome.hits()[0].file_path, "fees.md");
    }

    #[test]
    fn add_is_rejected() {
        let retriever =
            PersistedRetriever::from_parts(FlatIndex::new(64), Vec::new(), embedder(), SearchOptions::default()).unwrap();
        let err = retriever.add(&Document::plain("x.md", "text")).unwrap_err();
        assert!(matches!(err, Error::ReadOnly));
        assert!(err.is_fatal());
    }

    #[test]
    fn count_mismatch_is_detected() {
        let mut index = FlatIndex::new(64);
        index.push(&[0.0; 64]).unwrap();
        let err = PersistedRetriever::from_parts(index, Vec::new(), embedder(), SearchOptions::default()).unwrap_err();
        assert!(matches!(err, Error::CountMismatch { vectors: 1, records: 0 }));
    }
}
