use tracing::{debug, warn};

use carerag_core::config::RetrieverSettings;
use carerag_core::error::{Error, Result};
use carerag_core::traits::Embedder;
use carerag_core::types::{ChunkRecord, Hit, SearchOutcome};

/// Post-search filtering shared by both retriever strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SearchOptions {
    /// Hits scoring below this are dropped.
    pub min_score: Option<f32>,
    /// Break score ties by `(file_path, position)` instead of index order.
    pub deterministic_ties: bool,
}

impl SearchOptions {
    pub fn from_settings(settings: &RetrieverSettings) -> Self {
        Self { min_score: settings.min_score, deterministic_ties: settings.deterministic_ties }
    }
}

pub(crate) fn validate_query(query: &str, top_k: usize) -> Result<()> {
    if query.trim().is_empty() {
        return Err(Error::InvalidQuery("query is empty".into()));
    }
    if top_k == 0 {
        return Err(Error::InvalidQuery("k must be at least 1".into()));
    }
    Ok(())
}

/// Embeds the query; `None` when it maps to the zero vector (no words the
/// model can represent), which cannot be ranked against anything.
pub(crate) fn embed_query(embedder: &dyn Embedder, query: &str) -> Result<Option<Vec<f32>>> {
    let vector = embedder.embed_one(query).map_err(|e| Error::Embedding(format!("{e:#}")))?;
    if vector.len() != embedder.dim() {
        return Err(Error::Embedding(format!(
            "query vector has dimension {}, model '{}' declares {}",
            vector.len(),
            embedder.model_id(),
            embedder.dim()
        )));
    }
    if vector.iter().all(|x| *x == 0.0) {
        debug!(query, "query embeds to the zero vector");
        return Ok(None);
    }
    Ok(Some(vector))
}

/// Turns ranked `(position, score)` pairs into at most `top_k` hits.
///
/// Positions without a metadata record and records with blank text are
/// skipped; an empty result becomes [`SearchOutcome::NothingFound`].
pub(crate) fn collect_hits(
    ranked: Vec<(usize, f32)>,
    records: &[ChunkRecord],
    top_k: usize,
    options: SearchOptions,
) -> SearchOutcome {
    let mut candidates: Vec<(usize, f32, &ChunkRecord)> = Vec::with_capacity(ranked.len());
    for (position, score) in ranked {
        let Some(record) = records.get(position) else {
            warn!(position, records = records.len(), "index returned a position without metadata; skipping");
            continue;
        };
        if record.chunk_text.trim().is_empty() {
            debug!(position, "skipping blank chunk");
            continue;
        }
        if options.min_score.is_some_and(|floor| score < floor) {
            continue;
        }
        candidates.push((position, score, record));
    }

    if options.deterministic_ties {
        candidates.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| a.2.file_path.cmp(&b.2.file_path))
                .then_with(|| a.0.cmp(&b.0))
        });
    }

    let hits = candidates
        .into_iter()
        .take(top_k)
        .map(|(_, score, record)| Hit {
            score,
            chunk_text: record.chunk_text.clone(),
            file_path: record.file_path.clone(),
        })
        .collect();
    SearchOutcome::from_hits(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, text: &str) -> ChunkRecord {
        ChunkRecord { file_path: path.into(), chunk_text: text.into() }
    }

    #[test]
    fn blank_and_dangling_positions_are_skipped() {
        let records = vec![record("a.md", "alpha"), record("b.md", "   ")];
        let out = collect_hits(vec![(7, 0.9), (1, 0.8), (0, 0.5)], &records, 3, SearchOptions::default());
        assert_eq!(out.hits().len(), 1);
        assert_eq!(out.hits()[0].chunk_text, "alpha");
    }

    #[test]
    fn everything_dropped_is_nothing_found() {
        let records = vec![record("a.md", "alpha")];
        let options = SearchOptions { min_score: Some(0.95), ..Default::default() };
        assert!(collect_hits(vec![(0, 0.5)], &records, 3, options).is_nothing_found());
        assert!(collect_hits(Vec::new(), &records, 3, SearchOptions::default()).is_nothing_found());
    }

    #[test]
    fn ties_follow_index_order_unless_deterministic() {
        let records = vec![record("z.md", "zulu"), record("a.md", "alpha"), record("m.md", "mike")];
        let ranked = vec![(2, 0.9), (0, 0.7), (1, 0.7)];

        let default = collect_hits(ranked.clone(), &records, 3, SearchOptions::default());
        let order: Vec<&str> = default.hits().iter().map(|h| h.file_path.as_str()).collect();
        assert_eq!(order, vec!["m.md", "z.md", "a.md"]);

        let options = SearchOptions { deterministic_ties: true, ..Default::default() };
        let sorted = collect_hits(ranked, &records, 3, options);
        let order: Vec<&str> = sorted.hits().iter().map(|h| h.file_path.as_str()).collect();
        assert_eq!(order, vec!["m.md", "a.md", "z.md"]);
    }

    #[test]
    fn blank_query_and_zero_k_are_invalid() {
        assert!(matches!(validate_query("  ", 3), Err(Error::InvalidQuery(_))));
        assert!(matches!(validate_query("fees", 0), Err(Error::InvalidQuery(_))));
        assert!(validate_query("fees", 1).is_ok());
    }

    #[test]
    fn wordless_query_has_no_vector() {
        let embedder = carerag_embed::HashEmbedder::new(32);
        assert!(embed_query(&embedder, "?!").unwrap().is_none());
        assert_eq!(embed_query(&embedder, "fees").unwrap().map(|v| v.len()), Some(32));
    }
}
