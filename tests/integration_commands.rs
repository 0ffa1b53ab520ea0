#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Command entry points: argument checks and the status report

mod common;

use common::{EMBEDDING_MODEL, LLM_MODEL, config_for, mock_ollama};
use localrag::RagError;
use localrag::commands::{OllamaStatus, StoreStatus, collect_status, run_ingest, run_query};
use localrag::config::OllamaConfig;
use std::fs;
use tempfile::TempDir;

const DIMENSION: usize = 384;

#[tokio::test(flavor = "multi_thread")]
async fn ingest_with_missing_root_creates_no_store() {
    let server = mock_ollama(DIMENSION).await;
    let home = TempDir::new().expect("should create config dir");
    let config = config_for(&server, home.path(), DIMENSION);
    let db_path = config.vector_database_path();

    let error = run_ingest(&config, vec![home.path().join("missing")], &db_path)
        .await
        .expect_err("root does not exist");

    assert!(matches!(
        error.downcast_ref::<RagError>(),
        Some(RagError::Config(_))
    ));
    assert!(!db_path.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn query_for_zero_chunks_is_a_configuration_error() {
    let server = mock_ollama(DIMENSION).await;
    let home = TempDir::new().expect("should create config dir");
    let config = config_for(&server, home.path(), DIMENSION);
    let db_path = config.vector_database_path();

    let error = run_query(&config, "anything", &db_path, 0, false)
        .await
        .expect_err("k must be positive");

    assert!(matches!(
        error.downcast_ref::<RagError>(),
        Some(RagError::Config(_))
    ));
    assert!(!db_path.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn status_describes_an_ingested_store() {
    let server = mock_ollama(DIMENSION).await;
    let docs = TempDir::new().expect("should create docs dir");
    let home = TempDir::new().expect("should create config dir");
    fs::write(docs.path().join("dummy.md"), "adam green, bob blue").expect("should write");

    let config = config_for(&server, home.path(), DIMENSION);
    let db_path = config.vector_database_path();
    let ingested = run_ingest(&config, vec![docs.path().to_path_buf()], &db_path)
        .await
        .expect("ingest succeeds");

    let report = collect_status(&config, &db_path).await;

    assert_eq!(report.ollama, OllamaStatus::Ready);
    assert_eq!(report.embedding_model, EMBEDDING_MODEL);
    assert_eq!(report.llm_model, LLM_MODEL);
    assert_eq!(report.db_path, db_path);
    assert_eq!(
        report.store,
        StoreStatus::Ready {
            dimension: Some(DIMENSION),
            chunks: Some(ingested.chunks_ingested),
            fragments: Some(1),
            indexed: Some(false),
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn status_before_ingest_reports_empty_store() {
    let server = mock_ollama(DIMENSION).await;
    let home = TempDir::new().expect("should create config dir");
    let config = config_for(&server, home.path(), DIMENSION);

    let report = collect_status(&config, &config.vector_database_path()).await;

    assert_eq!(report.ollama, OllamaStatus::Ready);
    assert!(matches!(report.store, StoreStatus::Empty(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn status_reports_unreachable_ollama() {
    let home = TempDir::new().expect("should create config dir");
    let server = mock_ollama(DIMENSION).await;
    let mut config = config_for(&server, home.path(), DIMENSION);
    config.ollama = OllamaConfig {
        host: "127.0.0.1".to_string(),
        // Reserved port, nothing listens here
        port: 9,
        timeout_seconds: 2,
        ..config.ollama
    };

    let report = collect_status(&config, &config.vector_database_path()).await;

    assert!(matches!(report.ollama, OllamaStatus::Unreachable(_)));
    assert_eq!(report.llm_model, LLM_MODEL);
}
