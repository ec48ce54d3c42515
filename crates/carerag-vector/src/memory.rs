use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

use carerag_core::chunker::Chunker;
use carerag_core::config::Settings;
use carerag_core::data_processor::{DataProcessor, LoadReport};
use carerag_core::error::{Error, Result};
use carerag_core::traits::{Backend, Embedder, Retriever};
use carerag_core::types::{ChunkRecord, Document, SearchOutcome};

use crate::flat::FlatIndex;
use crate::ranking::{collect_hits, embed_query, validate_query, SearchOptions};

#[derive(Debug)]
struct State {
    index: FlatIndex,
    records: Vec<ChunkRecord>,
}

/// Session-scoped retriever: documents are chunked and embedded as they are
/// added, nothing is persisted. Scores are cosine similarity against the
/// whole matrix.
pub struct MemoryStore {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    options: SearchOptions,
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new(chunker: Chunker, embedder: Arc<dyn Embedder>, options: SearchOptions) -> Self {
        let state = State { index: FlatIndex::new(embedder.dim()), records: Vec::new() };
        Self { chunker, embedder, options, state: RwLock::new(state) }
    }

    pub fn from_settings(settings: &Settings, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Ok(Self::new(
            Chunker::from_settings(&settings.chunking)?,
            embedder,
            SearchOptions::from_settings(&settings.retriever),
        ))
    }

    /// Adds every loadable document under `root`; unreadable files end up
    /// in the returned report's `skipped`.
    pub fn load_directory(&self, processor: &DataProcessor, root: &Path) -> Result<LoadReport> {
        let report = processor.process_directory(root)?;
        let mut chunks = 0;
        for document in &report.documents {
            chunks += self.add(document)?;
        }
        info!(root = %root.display(), documents = report.documents.len(), chunks, "memory store loaded");
        Ok(report)
    }
}

fn poisoned() -> Error {
    Error::Operation("memory store lock poisoned".into())
}

impl Retriever for MemoryStore {
    fn backend(&self) -> Backend { Backend::Memory }

    fn len(&self) -> usize {
        // a poisoned lock still holds every record pushed before the panic
        let state = self.state.read().unwrap_or_else(|poison| {
            warn!("memory store lock poisoned; reporting the last stored state");
            PoisonError::into_inner(poison)
        });
        state.records.len()
    }

    fn add(&self, document: &Document) -> Result<usize> {
        let chunks = self.chunker.chunk_document(document);
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embedder
            .embed_batch(&texts)
            .map_err(|e| Error::Embedding(format!("{}: {e:#}", document.path_string())))?;
        if vectors.len() != chunks.len() {
            return Err(Error::Embedding(format!(
                "{}: {} chunks produced {} vectors",
                document.path_string(),
                chunks.len(),
                vectors.len()
            )));
        }

        let mut state = self.state.write().map_err(|_| poisoned())?;
        // reject the whole batch before pushing any row
        if let Some(bad) = vectors.iter().find(|v| v.len() != state.index.dim()) {
            return Err(Error::Embedding(format!(
                "{}: vector has dimension {}, store expects {}",
                document.path_string(),
                bad.len(),
                state.index.dim()
            )));
        }
        for (chunk, vector) in chunks.iter().zip(&vectors) {
            state.index.push(vector)?;
            state.records.push(ChunkRecord::from(chunk));
        }
        debug!(path = %document.path_string(), chunks = chunks.len(), "document added");
        Ok(chunks.len())
    }

    fn search(&self, query: &str, top_k: usize) -> Result<SearchOutcome> {
        validate_query(query, top_k)?;
        {
            let state = self.state.read().map_err(|_| poisoned())?;
            if state.records.is_empty() {
                return Ok(SearchOutcome::NothingFound);
            }
        }
        let Some(vector) = embed_query(self.embedder.as_ref(), query)? else {
            return Ok(SearchOutcome::NothingFound);
        };
        let state = self.state.read().map_err(|_| poisoned())?;
        let ranked = state.index.search_cosine(&vector, state.index.len());
        Ok(collect_hits(ranked, &state.records, top_k, self.options))
    }
}
