use super::*;
use crate::config::EmbeddingProviderKind;
use serde_json::json;
use serial_test::serial;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_DIMENSION: u32 = 8;

fn test_config(temp_dir: &TempDir, embed_server: &str) -> Config {
    let url = Url::parse(embed_server).expect("server uri should parse");

    let mut config = Config::default();
    config.data_dir = temp_dir.path().join("data");
    config.store.local.path = temp_dir.path().join("chroma_db");
    config.embedding.provider = EmbeddingProviderKind::Ollama;
    config.embedding.dimension = TEST_DIMENSION;
    config.ollama.host = url.host_str().expect("host").to_string();
    config.ollama.port = url.port().expect("port");
    config
}

fn write_documents(temp_dir: &TempDir) {
    let data_dir = temp_dir.path().join("data");
    std::fs::create_dir_all(&data_dir).expect("should create data dir");
    std::fs::write(
        data_dir.join("renewal.txt"),
        "Renewal of an identity card requires the original card and a filled form.",
    )
    .expect("should write doc");
    std::fs::write(
        data_dir.join("fees.txt"),
        "The fee schedule depends on the processing tier selected by the applicant.",
    )
    .expect("should write doc");
}

async fn mock_embeddings(server: &MockServer) {
    let vector: Vec<f32> = (0..TEST_DIMENSION).map(|i| i as f32 * 0.1).collect();

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": vector,
            "embeddings": [vector, vector]
        })))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn ingestion_populates_the_collection() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let server = MockServer::start().await;
    mock_embeddings(&server).await;
    write_documents(&temp_dir);

    let config = test_config(&temp_dir, &server.uri());
    let mut ingestor = Ingestor::new(config).await.expect("should build ingestor");

    let report = ingestor.run().await.expect("ingestion should succeed");

    assert_eq!(report.documents, 2);
    assert_eq!(report.chunks, 2);
    assert_eq!(report.embeddings, 2);
    assert_eq!(
        ingestor.collection_count().await.expect("should count"),
        2
    );
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn rerun_grows_the_collection_without_dedup() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let server = MockServer::start().await;
    mock_embeddings(&server).await;
    write_documents(&temp_dir);

    let config = test_config(&temp_dir, &server.uri());

    let mut ingestor = Ingestor::new(config.clone())
        .await
        .expect("should build ingestor");
    ingestor.run().await.expect("first run should succeed");

    // Unchanged directory: the run must succeed again, and the count grows
    // because nothing is deduplicated
    let mut ingestor = Ingestor::new(config).await.expect("should rebuild ingestor");
    ingestor.run().await.expect("second run should succeed");

    assert_eq!(
        ingestor.collection_count().await.expect("should count"),
        4
    );
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn ingestion_records_the_embedding_model() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let server = MockServer::start().await;
    mock_embeddings(&server).await;
    write_documents(&temp_dir);

    let config = test_config(&temp_dir, &server.uri());
    let mut ingestor = Ingestor::new(config.clone())
        .await
        .expect("should build ingestor");
    ingestor.run().await.expect("ingestion should succeed");

    let store = crate::store::open_store(&config).await.expect("should open");
    let manifest = store
        .manifest()
        .await
        .expect("should read manifest")
        .expect("manifest should exist");
    assert_eq!(manifest.embedding_model, "nomic-embed-text:latest");
    assert_eq!(manifest.dimension, TEST_DIMENSION);
}

#[tokio::test]
#[serial]
async fn missing_directory_aborts_the_run() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let server = MockServer::start().await;
    mock_embeddings(&server).await;
    // No data directory written

    let config = test_config(&temp_dir, &server.uri());
    let mut ingestor = Ingestor::new(config).await.expect("should build ingestor");

    let result = ingestor.run().await;
    assert!(matches!(result, Err(SopError::DataLoad(_))));
    assert_eq!(
        ingestor.collection_count().await.expect("should count"),
        0
    );
}

#[tokio::test]
#[serial]
async fn missing_hosted_credential_fails_before_any_io() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    // SAFETY: tests mutating process environment are serialized
    unsafe { std::env::remove_var(crate::config::settings::GOOGLE_API_KEY_VAR) };

    let mut config = Config::default();
    config.data_dir = temp_dir.path().join("data");
    config.store.local.path = temp_dir.path().join("chroma_db");
    // Hosted provider selected, no credential in the environment

    let result = Ingestor::new(config.clone()).await;
    assert!(matches!(result, Err(SopError::Config(_))));

    // Failed fast: the store directory was never created
    assert!(!config.store.local.path.exists());
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn embedding_failure_aborts_the_run() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let server = MockServer::start().await;
    write_documents(&temp_dir);

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = test_config(&temp_dir, &server.uri());
    let mut ingestor = Ingestor::new(config).await.expect("should build ingestor");

    let result = ingestor.run().await;
    assert!(matches!(result, Err(SopError::Embedding(_))));
    assert_eq!(
        ingestor.collection_count().await.expect("should count"),
        0
    );
}
