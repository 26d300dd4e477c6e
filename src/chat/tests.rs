use super::*;
use crate::store::lance::LanceStore;
use crate::store::{ChunkMetadata, CollectionManifest, EmbeddingRecord, SearchResult, VectorStore};
use serde_json::json;
use serial_test::serial;
use tempfile::TempDir;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_DIMENSION: u32 = 8;

mod session_state {
    use super::*;

    #[test]
    fn new_session_holds_only_the_greeting() {
        let session = Session::new();
        assert_eq!(session.len(), 1);
        assert_eq!(session.turns()[0].role, Role::Assistant);
        assert_eq!(session.turns()[0].content, GREETING);
    }

    #[test]
    fn turns_accumulate_in_order() {
        let mut session = Session::new();
        session.push_user("What is the renewal fee?");
        session.push_assistant("- See schedule A.");

        assert_eq!(session.len(), 3);
        assert_eq!(session.turns()[1].role, Role::User);
        assert_eq!(session.turns()[2].role, Role::Assistant);
    }

    #[test]
    fn reset_replaces_any_history_with_one_greeting() {
        let mut session = Session::new();
        for i in 0..25 {
            session.push_user(format!("question {}", i));
            session.push_assistant(format!("answer {}", i));
        }
        assert_eq!(session.len(), 51);

        session.reset();

        assert_eq!(session.len(), 1);
        assert_eq!(session.turns()[0].role, Role::Assistant);
        assert_eq!(session.turns()[0].content, RESET_GREETING);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut session = Session::new();
        session.reset();
        session.reset();

        assert_eq!(session.len(), 1);
        assert_eq!(session.turns()[0].content, RESET_GREETING);
    }
}

mod prompt_assembly {
    use super::*;
    use crate::chat::prompt::{SYSTEM_PROMPT, build_messages, build_system_instruction};
    use crate::gemini::MessageRole;

    fn search_result(doc: &str, page: Option<u32>, content: &str) -> SearchResult {
        SearchResult {
            metadata: ChunkMetadata {
                doc_title: doc.to_string(),
                source_path: format!("./data/{}.pdf", doc),
                page_number: page,
                content: content.to_string(),
                token_count: content.split_whitespace().count() as u32,
                chunk_index: 0,
                created_at: "2024-01-01T00:00:00Z".to_string(),
            },
            similarity_score: 0.9,
            distance: 0.1,
        }
    }

    #[test]
    fn instruction_without_context_is_the_bare_prompt() {
        assert_eq!(build_system_instruction(&[]), SYSTEM_PROMPT);
    }

    #[test]
    fn instruction_includes_every_retrieved_chunk() {
        let results = vec![
            search_result("cnic_renewal", Some(3), "The renewal fee is listed in schedule A."),
            search_result("smart_card", None, "Smart cards embed a secure chip."),
        ];

        let instruction = build_system_instruction(&results);

        assert!(instruction.starts_with(SYSTEM_PROMPT));
        assert!(instruction.contains("cnic_renewal, page 3"));
        assert!(instruction.contains("The renewal fee is listed in schedule A."));
        assert!(instruction.contains("[smart_card]"));
        assert!(instruction.contains("Smart cards embed a secure chip."));
    }

    #[test]
    fn messages_mirror_the_session_in_order() {
        let mut session = Session::new();
        session.push_user("What is the renewal fee?");

        let messages = build_messages(&session);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::Model);
        assert_eq!(messages[0].text, GREETING);
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(messages[1].text, "What is the renewal fee?");
    }
}

fn engine_config(temp_dir: &TempDir, server_uri: &str) -> crate::config::Config {
    let mut config = crate::config::Config::default();
    config.store.local.path = temp_dir.path().join("chroma_db");
    config.embedding.dimension = TEST_DIMENSION;
    config.gemini.base_url = Some(server_uri.to_string());
    config
}

fn seeded_record(seed: f32, content: &str) -> EmbeddingRecord {
    let vector: Vec<f32> = (0..TEST_DIMENSION)
        .map(|i| (i as f32).mul_add(0.01, seed))
        .collect();

    EmbeddingRecord {
        id: Uuid::new_v4().to_string(),
        vector,
        metadata: ChunkMetadata {
            doc_title: "cnic_renewal".to_string(),
            source_path: "./data/cnic_renewal.pdf".to_string(),
            page_number: Some(1),
            content: content.to_string(),
            token_count: content.split_whitespace().count() as u32,
            chunk_index: 0,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        },
    }
}

async fn seed_collection(config: &crate::config::Config) {
    let mut store = LanceStore::open(config).await.expect("should open store");
    store
        .upsert(vec![
            seeded_record(0.0, "The renewal fee is listed in schedule A."),
            seeded_record(0.4, "Biometric verification happens at the counter."),
        ])
        .await
        .expect("should seed records");
    store
        .write_manifest(&CollectionManifest {
            embedding_model: "models/text-embedding-004".to_string(),
            dimension: TEST_DIMENSION,
        })
        .await
        .expect("should write manifest");
}

async fn mock_model_probe(server: &MockServer, model: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/v1beta/models/{}", model)))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "name": format!("models/{}", model)
        })))
        .mount(server)
        .await;
}

async fn mock_embed(server: &MockServer) {
    let vector: Vec<f32> = (0..TEST_DIMENSION).map(|i| i as f32 * 0.01).collect();

    Mock::given(method("POST"))
        .and(path("/v1beta/models/text-embedding-004:embedContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": {"values": vector}
        })))
        .mount(server)
        .await;
}

fn set_google_key() {
    // SAFETY: tests mutating process environment are serialized
    unsafe { std::env::set_var(crate::config::settings::GOOGLE_API_KEY_VAR, "test-key") };
}

fn clear_google_key() {
    // SAFETY: tests mutating process environment are serialized
    unsafe { std::env::remove_var(crate::config::settings::GOOGLE_API_KEY_VAR) };
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn engine_answers_a_turn_from_the_collection() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let server = MockServer::start().await;
    set_google_key();

    mock_model_probe(&server, "gemini-2.5-flash", 200).await;
    mock_embed(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"text": "- The renewal fee is listed in schedule A."}]
                }
            }]
        })))
        .mount(&server)
        .await;

    let config = engine_config(&temp_dir, &server.uri());
    seed_collection(&config).await;

    let engine = ChatEngine::new(&config).await.expect("engine should build");
    assert_eq!(engine.active_model(), "models/gemini-2.5-flash");

    let mut session = Session::new();
    let reply = engine
        .ask(&mut session, "What is the renewal fee?")
        .await
        .expect("turn should succeed");

    assert!(reply.contains("schedule A"));
    assert_eq!(session.len(), 3);
    assert_eq!(session.turns()[1].role, Role::User);
    assert_eq!(session.turns()[2].content, reply);

    clear_google_key();
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn engine_falls_back_to_secondary_model() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let server = MockServer::start().await;
    set_google_key();

    mock_model_probe(&server, "gemini-2.5-flash", 404).await;
    mock_model_probe(&server, "gemini-2.0-flash-exp", 200).await;
    mock_embed(&server).await;

    let config = engine_config(&temp_dir, &server.uri());
    seed_collection(&config).await;

    let engine = ChatEngine::new(&config).await.expect("engine should build");
    assert_eq!(engine.active_model(), "models/gemini-2.0-flash-exp");

    clear_google_key();
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn engine_reports_config_error_when_no_model_resolves() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let server = MockServer::start().await;
    set_google_key();

    mock_model_probe(&server, "gemini-2.5-flash", 404).await;
    mock_model_probe(&server, "gemini-2.0-flash-exp", 404).await;

    let config = engine_config(&temp_dir, &server.uri());
    seed_collection(&config).await;

    let result = ChatEngine::new(&config).await;
    assert!(matches!(result, Err(SopError::Config(_))));

    clear_google_key();
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn engine_refuses_to_serve_without_ingestion() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let server = MockServer::start().await;
    set_google_key();

    mock_model_probe(&server, "gemini-2.5-flash", 200).await;

    let config = engine_config(&temp_dir, &server.uri());
    // No ingestion has happened

    let result = ChatEngine::new(&config).await;
    let error = result.err().expect("engine must refuse to build");
    assert!(matches!(error, SopError::Store(_)));
    assert!(error.to_string().contains("ingest"));

    clear_google_key();
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn failed_turn_leaves_the_session_usable() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let server = MockServer::start().await;
    set_google_key();

    mock_model_probe(&server, "gemini-2.5-flash", 200).await;
    mock_embed(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = engine_config(&temp_dir, &server.uri());
    seed_collection(&config).await;

    let engine = ChatEngine::new(&config).await.expect("engine should build");
    let mut session = Session::new();

    let result = engine.ask(&mut session, "What is the renewal fee?").await;
    assert!(matches!(result, Err(SopError::Generation(_))));

    // The question stays in the transcript, no assistant turn was added,
    // and the session still accepts a reset
    assert_eq!(session.len(), 2);
    assert_eq!(session.turns()[1].role, Role::User);
    session.reset();
    assert_eq!(session.len(), 1);

    clear_google_key();
}
