use anyhow::Result;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use carerag_core::traits::Embedder;

/// Deterministic feature-hashing encoder.
///
/// Lower-cased alphanumeric words are hashed into `dim` signed buckets and the
/// result is L2-normalized, so texts sharing words score higher. It needs no
/// model files, which makes it the encoder of choice for tests and offline
/// smoke runs. Selected with the model identifier `hash` or `hash:<dim>`.
pub struct HashEmbedder {
    dim: usize,
    model_id: String,
}

impl HashEmbedder {
    pub const DEFAULT_DIM: usize = 1024;

    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, model_id: format!("hash:{dim}") }
    }

    /// Parses `hash` / `hash:<dim>`; `None` for any other identifier.
    pub fn from_model_id(model_id: &str) -> Option<Self> {
        let rest = model_id.strip_prefix("hash")?;
        if rest.is_empty() {
            return Some(Self::new(Self::DEFAULT_DIM));
        }
        rest.strip_prefix(':')?.parse().ok().map(Self::new)
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        // text without any word maps to the zero vector
        if norm > 0.0 {
            for x in &mut v { *x /= norm; }
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str { &self.model_id }
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_identifiers() {
        assert_eq!(HashEmbedder::from_model_id("hash").map(|e| e.dim()), Some(1024));
        assert_eq!(HashEmbedder::from_model_id("hash:64").map(|e| e.dim()), Some(64));
        assert!(HashEmbedder::from_model_id("hash:abc").is_none());
        assert!(HashEmbedder::from_model_id("hashed").is_none());
        assert!(HashEmbedder::from_model_id("sentence-transformers/all-MiniLM-L6-v2").is_none());
    }

    #[test]
    fn case_and_punctuation_do_not_matter() {
        let e = HashEmbedder::new(256);
        let a = e.embed_one("Interest RATE?").unwrap();
        let b = e.embed_one("interest, rate").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn wordless_text_is_the_zero_vector() {
        let e = HashEmbedder::new(8);
        assert!(e.embed_one("  ?! ").unwrap().iter().all(|x| *x == 0.0));
    }
}
