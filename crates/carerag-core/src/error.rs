use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification used by callers to decide whether to stop, skip or retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Stale or mismatched artifacts, bad settings. Never tolerated.
    Configuration,
    /// The corpus as a whole produced nothing indexable.
    Content,
    /// A single source file; the batch continues without it.
    Item,
    /// A single query failed; the process keeps serving.
    Runtime,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(
        "Embedding dimension mismatch: index has dimension {index}, model '{model_id}' produces {model}. Rebuild the index with the configured model."
    )]
    DimensionMismatch { index: usize, model: usize, model_id: String },

    #[error(
        "Index is stale or partial: {vectors} vectors but {records} metadata records. Rebuild the index."
    )]
    CountMismatch { vectors: usize, records: usize },

    #[error("No chunks were generated from {0}; make sure it contains non-empty .md or .json files")]
    EmptyCorpus(PathBuf),

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Corrupt index file {path}: {message}")]
    CorruptIndex { path: PathBuf, message: String },

    #[error("The persisted index is read-only; rebuild it to add documents")]
    ReadOnly,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_)
            | Self::NotFound(_)
            | Self::DimensionMismatch { .. }
            | Self::CountMismatch { .. }
            | Self::CorruptIndex { .. }
            | Self::ReadOnly => ErrorKind::Configuration,
            Self::EmptyCorpus(_) => ErrorKind::Content,
            Self::Parse { .. } => ErrorKind::Item,
            Self::InvalidQuery(_) | Self::Embedding(_) | Self::Io { .. } | Self::Operation(_) => {
                ErrorKind::Runtime
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Configuration | ErrorKind::Content)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
