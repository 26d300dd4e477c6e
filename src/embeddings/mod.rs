// Embedding generation module
// One client per provider; selection is a configuration choice, and the
// same provider must be used at ingestion time and query time

pub mod chunking;
pub mod ollama;

use tracing::debug;

use crate::config::{Config, EmbeddingProviderKind};
use crate::gemini::GeminiClient;
use crate::{Result, SopError};

use ollama::OllamaClient;

/// Embedding provider selected by configuration.
pub enum EmbeddingClient {
    Gemini { client: GeminiClient, model: String },
    Ollama(OllamaClient),
}

impl EmbeddingClient {
    /// Construct the configured provider. Credential lookup happens here,
    /// before any filesystem or network I/O.
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.embedding.provider {
            EmbeddingProviderKind::Gemini => {
                let api_key =
                    Config::google_api_key().map_err(|e| SopError::Config(e.to_string()))?;
                debug!(
                    "Using hosted embedding model {}",
                    config.gemini.embedding_model
                );
                Ok(Self::Gemini {
                    client: GeminiClient::new(&config.gemini, api_key),
                    model: config.gemini.embedding_model.clone(),
                })
            }
            EmbeddingProviderKind::Ollama => {
                let client =
                    OllamaClient::new(&config.ollama).map_err(|e| SopError::Config(e.to_string()))?;
                debug!("Using local embedding model {}", client.model());
                Ok(Self::Ollama(client))
            }
        }
    }

    /// Identifier of the model producing the vectors. Persisted with the
    /// collection so a later mismatch can be detected.
    #[inline]
    pub fn model_id(&self) -> &str {
        match self {
            Self::Gemini { model, .. } => model,
            Self::Ollama(client) => client.model(),
        }
    }

    #[inline]
    pub fn provider(&self) -> EmbeddingProviderKind {
        match self {
            Self::Gemini { .. } => EmbeddingProviderKind::Gemini,
            Self::Ollama(_) => EmbeddingProviderKind::Ollama,
        }
    }

    /// Embed one text.
    #[inline]
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match self {
            Self::Gemini { client, model } => client
                .embed(model, text)
                .map_err(|e| SopError::Embedding(format!("{:#}", e))),
            Self::Ollama(client) => client
                .generate_embedding(text)
                .map_err(|e| SopError::Embedding(format!("{:#}", e))),
        }
    }

    /// Embed many texts, preserving order.
    #[inline]
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self {
            Self::Gemini { client, model } => client
                .embed_batch(model, texts)
                .map_err(|e| SopError::Embedding(format!("{:#}", e))),
            Self::Ollama(client) => client
                .generate_embeddings_batch(texts)
                .map_err(|e| SopError::Embedding(format!("{:#}", e))),
        }
    }

    /// Reachability probe used by the status report.
    #[inline]
    pub fn health_check(&self) -> anyhow::Result<()> {
        match self {
            Self::Gemini { client, model } => client.get_model(model),
            Self::Ollama(client) => client.health_check(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn hosted_provider_requires_credential() {
        // SAFETY: tests mutating process environment are serialized
        unsafe { std::env::remove_var(crate::config::settings::GOOGLE_API_KEY_VAR) };

        let config = Config::default();
        let result = EmbeddingClient::from_config(&config);
        assert!(matches!(result, Err(SopError::Config(_))));
    }

    #[test]
    #[serial]
    fn local_provider_needs_no_credential() {
        let mut config = Config::default();
        config.embedding.provider = EmbeddingProviderKind::Ollama;

        let client = EmbeddingClient::from_config(&config).expect("should build without key");
        assert_eq!(client.model_id(), "nomic-embed-text:latest");
        assert_eq!(client.provider(), EmbeddingProviderKind::Ollama);
    }
}
