//! Long-lived query service and the JSON contract spoken at its boundary:
//! `{query, k}` in, `{result, hits}` or `{error}` out.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use carerag_core::config::Settings;
use carerag_core::traits::{Backend, Retriever};
use carerag_core::types::{Hit, SearchOutcome};
use carerag_embed::load_embedder;
use carerag_vector::open_retriever;

pub const DEFAULT_K: usize = 3;

/// Message returned when a query matched nothing usable.
pub const NOTHING_FOUND: &str = "No relevant content found";

fn default_k() -> usize { DEFAULT_K }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default = "default_k")]
    pub k: usize,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>, k: usize) -> Self {
        Self { query: query.into(), k }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryResponse {
    Success { result: String, hits: Vec<Hit> },
    Failure { error: String },
}

impl QueryResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure { error: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub backend: Backend,
    pub model: String,
    pub docs: usize,
}

/// Owns one retriever for the lifetime of the process. Construct once at
/// startup and share by reference; there is no reload path.
pub struct KnowledgeService {
    retriever: Arc<dyn Retriever>,
    model_id: String,
}

impl KnowledgeService {
    /// Loads the configured embedder and opens the configured retriever.
    /// Stale or mismatched artifacts fail here, before any query is served.
    pub fn initialize(settings: &Settings) -> Result<Self> {
        let embedder = load_embedder(&settings.embedding).context("loading embedding model")?;
        let model_id = embedder.model_id().to_string();
        let retriever = open_retriever(settings, embedder)
            .with_context(|| format!("opening {} retriever", settings.retriever.backend))?;
        let service = Self { retriever, model_id };
        let status = service.status();
        info!(backend = %status.backend, model = %status.model, docs = status.docs, "knowledge service ready");
        Ok(service)
    }

    pub fn from_retriever(retriever: Arc<dyn Retriever>, model_id: impl Into<String>) -> Self {
        Self { retriever, model_id: model_id.into() }
    }

    pub fn status(&self) -> Status {
        Status { backend: self.retriever.backend(), model: self.model_id.clone(), docs: self.retriever.len() }
    }

    /// Runs one request; every failure becomes an `{error}` payload.
    pub fn query(&self, request: &QueryRequest) -> QueryResponse {
        match self.retriever.search(&request.query, request.k) {
            Ok(SearchOutcome::Hits(hits)) => {
                debug!(k = request.k, hits = hits.len(), "query answered");
                QueryResponse::Success { result: format_hits(&hits), hits }
            }
            Ok(SearchOutcome::NothingFound) => {
                debug!(k = request.k, "nothing found");
                QueryResponse::failure(NOTHING_FOUND)
            }
            Err(e) => {
                warn!(error = %e, "query failed");
                QueryResponse::failure(e.to_string())
            }
        }
    }

    /// Parses one JSON request and returns the JSON response text.
    pub fn handle_json(&self, input: &str) -> String {
        let response = match serde_json::from_str::<QueryRequest>(input) {
            Ok(request) => self.query(&request),
            Err(e) => QueryResponse::failure(format!("Invalid request: {e}")),
        };
        serde_json::to_string(&response)
            .unwrap_or_else(|e| format!(r#"{{"error":"failed to encode response: {}"}}"#, e.to_string().replace('"', "'")))
    }
}

/// One line per hit: `[0.873] chunk text`.
pub fn format_hits(hits: &[Hit]) -> String {
    hits.iter()
        .map(|h| format!("[{:.3}] {}", h.score, h.chunk_text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use carerag_core::traits::Embedder;
    use carerag_core::types::Document;
    use carerag_embed::HashEmbedder;
    use carerag_vector::MemoryStore;
    use serde_json::{json, Value};

    fn service_with(docs: &[(&str, &str)]) -> KnowledgeService {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(2048));
        let store = MemoryStore::from_settings(&Settings::default(), embedder).unwrap();
        for (path, text) in docs {
            store.add(&Document::plain(*path, *text)).unwrap();
        }
        KnowledgeService::from_retriever(Arc::new(store), "hash:2048")
    }

    fn bank() -> KnowledgeService {
        service_with(&[
            ("savings.md", "Savings account interest is 5% annually."),
            ("loans.md", "Loan repayment is due monthly."),
        ])
    }

    #[test]
    fn interest_question_hits_savings_first() {
        let response = bank().query(&QueryRequest::new("What is the interest rate?", 3));
        let QueryResponse::Success { result, hits } = response else { panic!("expected hits") };
        assert_eq!(hits[0].file_path, "savings.md");
        assert!(hits[0].score > hits[1].score);
        assert!(result.starts_with('['));
        assert_eq!(result.lines().count(), hits.len());
    }

    #[test]
    fn json_contract_defaults_k_and_reports_hits() {
        let out: Value = serde_json::from_str(&bank().handle_json(r#"{"query": "loan repayment"}"#)).unwrap();
        let hits = out["hits"].as_array().unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0]["file_path"], "loans.md");
        assert!(hits[0]["score"].is_number());
        assert!(out["result"].as_str().unwrap().contains("Loan repayment is due monthly."));
        assert!(out.get("error").is_none());
    }

    #[test]
    fn failures_become_error_payloads() {
        let service = bank();
        for input in ["not json", r#"{"k": 2}"#, r#"{"query": "fees", "k": -1}"#, r#"{"query": "   "}"#, r#"{"query": "fees", "k": 0}"#] {
            let out: Value = serde_json::from_str(&service.handle_json(input)).unwrap();
            assert!(out["error"].is_string(), "{input} -> {out}");
            assert!(out.get("hits").is_none());
        }
    }

    #[test]
    fn empty_store_answers_nothing_found() {
        let service = service_with(&[]);
        assert_eq!(
            service.query(&QueryRequest::new("overdraft fee", 3)),
            QueryResponse::Failure { error: NOTHING_FOUND.into() }
        );
        let out: Value = serde_json::from_str(&service.handle_json(r#"{"query": "overdraft fee"}"#)).unwrap();
        assert_eq!(out, json!({ "error": NOTHING_FOUND }));
    }

    #[test]
    fn punctuation_only_query_answers_nothing_found() {
        let out: Value = serde_json::from_str(&bank().handle_json(r#"{"query": "?!"}"#)).unwrap();
        assert_eq!(out, json!({ "error": NOTHING_FOUND }));
    }

    #[test]
    fn status_counts_loaded_chunks() {
        let status = bank().status();
        assert_eq!(status.backend, Backend::Memory);
        assert_eq!(status.docs, 2);
        assert_eq!(status.model, "hash:2048");
    }

    #[test]
    fn hits_render_one_per_line_with_three_decimals() {
        let hits = vec![
            Hit { score: 0.87345, chunk_text: "  first chunk \n".into(), file_path: "a.md".into() },
            Hit { score: 0.5, chunk_text: "second".into(), file_path: "b.md".into() },
        ];
        assert_eq!(format_hits(&hits), "[0.873] first chunk\n[0.500] second");
    }
}
