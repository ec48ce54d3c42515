use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use carerag_core::config::Settings;
use carerag_core::error::Error;
use carerag_core::traits::Backend;
use carerag_embed::load_embedder;
use carerag_service::{KnowledgeService, QueryRequest, QueryResponse};
use carerag_vector::IndexBuilder;

fn kb() -> (TempDir, Settings) {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("accounts")).unwrap();
    fs::write(tmp.path().join("accounts/savings.md"), "Savings account interest is 5% annually.").unwrap();
    fs::write(tmp.path().join("loans.json"), r#"{"title": "Loans", "answer": "Loan repayment is due monthly."}"#).unwrap();

    let mut settings = Settings::default();
    settings.knowledge_base.root = tmp.path().to_string_lossy().into_owned();
    settings.embedding.model = "hash:1024".into();
    settings.index.show_progress = false;
    (tmp, settings)
}

fn build(settings: &Settings) {
    let embedder = load_embedder(&settings.embedding).unwrap();
    IndexBuilder::from_settings(settings, embedder).unwrap().build(&settings.kb_root()).unwrap();
}

#[test]
fn initialized_service_answers_from_the_persisted_index() {
    let (_tmp, settings) = kb();
    build(&settings);

    let service = KnowledgeService::initialize(&settings).expect("initialize");
    let status = service.status();
    assert_eq!(status.backend, Backend::Persisted);
    assert_eq!(status.docs, 2);

    match service.query(&QueryRequest::new("What is the interest rate?", 3)) {
        QueryResponse::Success { hits, .. } => {
            assert!(hits[0].file_path.ends_with("savings.md"));
            assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn stale_index_stops_initialization() {
    let (_tmp, mut settings) = kb();
    build(&settings);
    settings.embedding.model = "hash:256".into();

    let err = KnowledgeService::initialize(&settings).err().expect("mismatch must fail");
    let core = err.downcast_ref::<Error>().expect("core error");
    assert!(matches!(core, Error::DimensionMismatch { index: 1024, model: 256, .. }));
}

#[test]
fn memory_backend_needs_no_build() {
    let (_tmp, mut settings) = kb();
    settings.retriever.backend = Backend::Memory;
    let service = Arc::new(KnowledgeService::initialize(&settings).expect("initialize"));
    assert_eq!(service.status().backend, Backend::Memory);
    let out = service.handle_json(r#"{"query": "loan repayment", "k": 1}"#);
    assert!(out.contains("Loan repayment is due monthly."), "{out}");
}
