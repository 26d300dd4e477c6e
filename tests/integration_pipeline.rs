#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! Writer-then-reader pipeline test: ingestion populates the collection,
//! the chat engine answers from it. All network endpoints are mocked.

use serde_json::json;
use serial_test::serial;
use sop_assistant::chat::{ChatEngine, Role, Session};
use sop_assistant::config::{Config, EmbeddingProviderKind};
use sop_assistant::ingest::Ingestor;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DIMENSION: u32 = 8;

fn pipeline_config(temp_dir: &TempDir, server_uri: &str) -> Config {
    let url = Url::parse(server_uri).expect("server uri should parse");

    let mut config = Config::default();
    config.data_dir = temp_dir.path().join("data");
    config.store.local.path = temp_dir.path().join("chroma_db");
    config.embedding.provider = EmbeddingProviderKind::Ollama;
    config.embedding.dimension = DIMENSION;
    config.ollama.host = url.host_str().expect("host").to_string();
    config.ollama.port = url.port().expect("port");
    config.gemini.base_url = Some(server_uri.to_string());
    config
}

fn write_sop_documents(temp_dir: &TempDir) {
    let data_dir = temp_dir.path().join("data");
    std::fs::create_dir_all(&data_dir).expect("should create data dir");
    std::fs::write(
        data_dir.join("cnic_renewal.txt"),
        "Renewal of a national identity card requires the expired card, a filled \
         application form, and biometric verification at the counter.",
    )
    .expect("should write doc");
    std::fs::write(
        data_dir.join("fees.md"),
        "# Fees\n\nThe standard renewal fee applies for normal processing. Urgent \
         processing carries a higher fee.",
    )
    .expect("should write doc");
}

async fn mount_pipeline_mocks(server: &MockServer) {
    let vector: Vec<f32> = (0..DIMENSION).map(|i| (i as f32).mul_add(0.1, 0.05)).collect();

    // Local embedding server, used by both pipelines
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": vector,
            "embeddings": [vector, vector]
        })))
        .mount(server)
        .await;

    // Generation model probe and reply
    Mock::given(method("GET"))
        .and(path("/v1beta/models/gemini-2.5-flash"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "models/gemini-2.5-flash"
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"text": "- Renewal requires the expired card, a filled form, and biometric verification."}]
                }
            }]
        })))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn ingestion_then_chat_shares_one_collection() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let server = MockServer::start().await;
    mount_pipeline_mocks(&server).await;
    write_sop_documents(&temp_dir);

    // SAFETY: tests mutating process environment are serialized
    unsafe { std::env::set_var("GOOGLE_API_KEY", "test-key") };

    let config = pipeline_config(&temp_dir, &server.uri());

    // Writer process: ingest the folder
    let mut ingestor = Ingestor::new(config.clone())
        .await
        .expect("ingestor should build");
    let report = ingestor.run().await.expect("ingestion should succeed");
    assert_eq!(report.documents, 2);
    assert!(report.embeddings > 0);

    // Reader process: answer a turn grounded in the same collection
    let engine = ChatEngine::new(&config).await.expect("engine should build");
    assert_eq!(engine.active_model(), "models/gemini-2.5-flash");

    let mut session = Session::new();
    let reply = engine
        .ask(&mut session, "What do I need to renew my identity card?")
        .await
        .expect("turn should succeed");

    assert!(reply.contains("biometric verification"));
    assert_eq!(session.len(), 3);
    assert_eq!(session.turns()[2].role, Role::Assistant);

    // Reset never touches the persistent collection
    session.reset();
    assert_eq!(session.len(), 1);
    assert_eq!(engine.collection_count().await.expect("should count"), 2);

    // SAFETY: tests mutating process environment are serialized
    unsafe { std::env::remove_var("GOOGLE_API_KEY") };
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn chat_before_ingestion_instructs_the_operator() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let server = MockServer::start().await;
    mount_pipeline_mocks(&server).await;

    // SAFETY: tests mutating process environment are serialized
    unsafe { std::env::set_var("GOOGLE_API_KEY", "test-key") };

    let config = pipeline_config(&temp_dir, &server.uri());

    let error = ChatEngine::new(&config)
        .await
        .err()
        .expect("engine must refuse without ingestion");
    assert!(error.to_string().contains("ingest"));

    // SAFETY: tests mutating process environment are serialized
    unsafe { std::env::remove_var("GOOGLE_API_KEY") };
}
