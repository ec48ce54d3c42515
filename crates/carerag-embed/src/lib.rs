//! Embedding wrapper: one configured model identifier, used identically at
//! index-build time and query time.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use carerag_core::config::{expand_path, EmbeddingSettings};
use carerag_core::traits::Embedder;

mod bert;
mod device;
mod hashing;
mod pool;
mod tokenize;

pub use bert::SentenceEncoder;
pub use device::select_device;
pub use hashing::HashEmbedder;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_batch;

/// Builds the embedder named by `settings.model`.
///
/// `hash` / `hash:<dim>` selects [`HashEmbedder`]; any other identifier is a
/// BERT-family checkpoint resolved to a local model directory.
pub fn load_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if let Some(hashing) = HashEmbedder::from_model_id(&settings.model) {
        info!(model = %settings.model, "using hashing encoder");
        return Ok(Arc::new(hashing));
    }
    let model_dir = resolve_model_dir(settings)?;
    Ok(Arc::new(SentenceEncoder::load(&settings.model, &model_dir, settings.max_len, settings.batch_size)?))
}

/// Configured `model_dir`, then `APP_MODEL_DIR`, then `models/<model name>`.
fn resolve_model_dir(settings: &EmbeddingSettings) -> Result<PathBuf> {
    if let Some(dir) = &settings.model_dir {
        let p = expand_path(dir);
        if p.exists() { return Ok(p); }
        return Err(anyhow!("embedding.model_dir {} does not exist", p.display()));
    }
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") {
        let p = PathBuf::from(&dir);
        if p.exists() { info!(dir = %p.display(), "using APP_MODEL_DIR"); return Ok(p); }
    }
    let name = settings.model.rsplit('/').next().unwrap_or(&settings.model);
    for candidate in [Path::new("models").join(name), Path::new("../models").join(name)] {
        if candidate.exists() { return Ok(candidate); }
    }
    Err(anyhow!(
        "Could not locate model directory for '{}'; set embedding.model_dir or APP_MODEL_DIR",
        settings.model
    ))
}
