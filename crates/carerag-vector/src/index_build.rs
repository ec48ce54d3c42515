use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use carerag_core::chunker::Chunker;
use carerag_core::config::Settings;
use carerag_core::data_processor::DataProcessor;
use carerag_core::error::{Error, Result};
use carerag_core::traits::Embedder;
use carerag_core::types::ChunkRecord;

use crate::flat::FlatIndex;
use crate::metadata::save_records;

/// Summary of one offline build.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub files: usize,
    pub chunks: usize,
    pub dim: usize,
    /// Files that could not be read or parsed, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
    /// Documents that loaded but produced no chunk.
    pub empty_documents: Vec<PathBuf>,
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// Offline indexer: knowledge base in, flat index plus metadata out.
pub struct IndexBuilder {
    processor: DataProcessor,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    index_path: PathBuf,
    metadata_path: PathBuf,
    show_progress: bool,
    limit: Option<usize>,
}

impl IndexBuilder {
    pub fn new(
        processor: DataProcessor,
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
        index_path: impl Into<PathBuf>,
        metadata_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            processor,
            chunker,
            embedder,
            index_path: index_path.into(),
            metadata_path: metadata_path.into(),
            show_progress: false,
            limit: None,
        }
    }

    pub fn from_settings(settings: &Settings, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Ok(Self::new(
            DataProcessor::from_settings(settings),
            Chunker::from_settings(&settings.chunking)?,
            embedder,
            settings.index_path(),
            settings.metadata_path(),
        )
        .show_progress(settings.index.show_progress))
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Index at most `limit` source files (sorted order).
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Loads, chunks and embeds every document under `root`, then writes the
    /// index and metadata. Existing artifacts are replaced only on success.
    pub fn build(&self, root: &Path) -> Result<BuildReport> {
        let loaded = self.processor.process_directory_limited(root, self.limit.unwrap_or(usize::MAX))?;
        let dim = self.embedder.dim();
        info!(
            root = %root.display(),
            documents = loaded.documents.len(),
            model = self.embedder.model_id(),
            dim,
            "building index"
        );

        let pb = if self.show_progress {
            let pb = ProgressBar::new(loaded.documents.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut index = FlatIndex::new(dim);
        let mut records: Vec<ChunkRecord> = Vec::new();
        let mut report = BuildReport { dim, skipped: loaded.skipped, ..Default::default() };

        for document in &loaded.documents {
            pb.set_message(document.path_string());
            let chunks = self.chunker.chunk_document(document);
            if chunks.is_empty() {
                report.empty_documents.push(document.path.clone());
                pb.inc(1);
                continue;
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
            for (chunk, vector) in chunks.iter().zip(&vectors) {
                index
                    .push(vector)
                    .map_err(|e| Error::Embedding(format!("{}: {e}", document.path_string())))?;
                records.push(ChunkRecord::from(chunk));
            }
            report.files += 1;
            pb.inc(1);
        }
        pb.finish_and_clear();

        for (path, reason) in &report.skipped {
            warn!(path = %path.display(), reason = %reason, "skipped during build");
        }
        if records.is_empty() {
            return Err(Error::EmptyCorpus(root.to_path_buf()));
        }
        if index.len() != records.len() {
            return Err(Error::CountMismatch { vectors: index.len(), records: records.len() });
        }

        index.save(&self.index_path)?;
        save_records(&records, &self.metadata_path)?;

        report.chunks = records.len();
        report.index_path = self.index_path.clone();
        report.metadata_path = self.metadata_path.clone();
        info!(
            files = report.files,
            chunks = report.chunks,
            skipped = report.skipped.len(),
            empty = report.empty_documents.len(),
            index = %report.index_path.display(),
            metadata = %report.metadata_path.display(),
            "index written"
        );
        Ok(report)
    }
}
