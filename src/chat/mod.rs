// Query/chat pipeline
// Embed the question, retrieve top-k chunks, ground the model's reply in
// them; one turn at a time, errors recovered at the turn boundary

pub mod prompt;
pub mod repl;
pub mod session;

#[cfg(test)]
mod tests;

use tracing::{debug, info};

use crate::config::Config;
use crate::embeddings::EmbeddingClient;
use crate::gemini::GeminiClient;
use crate::store::{self, VectorStore};
use crate::{Result, SopError};

pub use session::{GREETING, RESET_GREETING, Role, Session, Turn};

/// Number of nearest chunks retrieved per question.
pub const RETRIEVAL_TOP_K: usize = 5;

/// Query-side engine, constructed once per process and passed by reference
/// into each turn handler.
pub struct ChatEngine {
    llm: GeminiClient,
    model: String,
    embedder: EmbeddingClient,
    store: Box<dyn VectorStore>,
    backend: String,
    top_k: usize,
}

impl ChatEngine {
    /// Initialize every client this process will need: credentials first,
    /// then generation-model resolution (preferred, then fallback), then the
    /// collection itself. An absent or empty collection refuses to serve.
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        let api_key = Config::google_api_key().map_err(|e| SopError::Config(e.to_string()))?;
        let llm = GeminiClient::new(&config.gemini, api_key);
        let model = llm.resolve_model(&config.gemini)?;

        let embedder = EmbeddingClient::from_config(config)?;
        let store = store::open_store_for_query(config, embedder.model_id()).await?;

        info!(
            "Chat engine ready: model {}, collection '{}'",
            model,
            store.collection_name()
        );

        Ok(Self {
            llm,
            model,
            embedder,
            store,
            backend: config.store.backend.to_string(),
            top_k: RETRIEVAL_TOP_K,
        })
    }

    /// The generation model actually in use (preferred or fallback).
    #[inline]
    pub fn active_model(&self) -> &str {
        &self.model
    }

    /// Human-readable knowledge-base description for the status banner.
    #[inline]
    pub fn knowledge_base(&self) -> String {
        format!(
            "{} - {} ({})",
            self.backend,
            self.store.collection_name(),
            self.store.location()
        )
    }

    /// Total chunks available for retrieval.
    #[inline]
    pub async fn collection_count(&self) -> Result<u64> {
        self.store.count().await
    }

    /// Handle one user turn: the question joins the history, the reply is
    /// grounded in the top-k retrieved chunks. On failure the question stays
    /// in the transcript, the error is returned for display, and the session
    /// remains usable; the turn is not retried.
    #[inline]
    pub async fn ask(&self, session: &mut Session, question: &str) -> Result<String> {
        session.push_user(question);

        let reply = self.answer(session, question).await?;
        session.push_assistant(reply.clone());

        Ok(reply)
    }

    async fn answer(&self, session: &Session, question: &str) -> Result<String> {
        let query_vector = self
            .embedder
            .embed(question)
            .map_err(|e| SopError::Generation(e.to_string()))?;

        let results = self
            .store
            .search(&query_vector, self.top_k)
            .await
            .map_err(|e| SopError::Generation(e.to_string()))?;

        debug!(
            "Retrieved {} chunks for question ({} chars)",
            results.len(),
            question.len()
        );

        let system_instruction = prompt::build_system_instruction(&results);
        let messages = prompt::build_messages(session);

        self.llm
            .generate(&self.model, &system_instruction, &messages)
            .map_err(|e| SopError::Generation(format!("{:#}", e)))
    }
}
