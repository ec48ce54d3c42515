//! Flat vector index, its offline builder and the two retriever strategies.

use std::sync::Arc;

use carerag_core::config::Settings;
use carerag_core::data_processor::DataProcessor;
use carerag_core::error::Result;
use carerag_core::traits::{Backend, Embedder, Retriever};

pub mod flat;
pub mod index_build;
pub mod memory;
pub mod metadata;
mod ranking;
pub mod search;

pub use flat::FlatIndex;
pub use index_build::{BuildReport, IndexBuilder};
pub use memory::MemoryStore;
pub use ranking::SearchOptions;
pub use search::PersistedRetriever;

/// Opens the strategy named by `retriever.backend`.
///
/// `persisted` loads the built index and fails on a stale one; `memory`
/// chunks and embeds the knowledge base into a fresh [`MemoryStore`].
pub fn open_retriever(settings: &Settings, embedder: Arc<dyn Embedder>) -> Result<Arc<dyn Retriever>> {
    match settings.retriever.backend {
        Backend::Persisted => Ok(Arc::new(PersistedRetriever::open(settings, embedder)?)),
        Backend::Memory => {
            let store = MemoryStore::from_settings(settings, embedder)?;
            store.load_directory(&DataProcessor::from_settings(settings), &settings.kb_root())?;
            Ok(Arc::new(store))
        }
    }
}
