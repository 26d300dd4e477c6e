
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::SopError;
use crate::config::GeminiConfig;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Client for the Google Generative Language REST API. Covers text
/// generation, model lookup, and text embeddings.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    agent: ureq::Agent,
}

/// One turn of model input, in API terms.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub text: String,
}

/// Roles the generateContent API understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Model,
}

impl MessageRole {
    fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

impl GeminiClient {
    #[inline]
    pub fn new(config: &GeminiConfig, api_key: String) -> Self {
        let base_url = build_base_url(config.base_url.as_deref());

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Self {
            base_url,
            api_key,
            agent,
        }
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    /// Check that a model identifier resolves on the API.
    #[inline]
    pub fn get_model(&self, model: &str) -> Result<()> {
        let url = format!("{}/v1beta/{}", self.base_url, model);
        debug!("Probing model availability at {}", url);

        self.agent
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .call()
            .map(|_| ())
            .with_context(|| format!("Model '{}' is not available", model))
    }

    /// Resolve the generation model with a two-tier fallback: the preferred
    /// model if it resolves, otherwise the fallback model. Both failing is a
    /// configuration error.
    #[inline]
    pub fn resolve_model(&self, config: &GeminiConfig) -> crate::Result<String> {
        match self.get_model(&config.model) {
            Ok(()) => {
                info!("Using generation model {}", config.model);
                Ok(config.model.clone())
            }
            Err(e) => {
                warn!(
                    "Preferred model {} unavailable ({}), trying fallback {}",
                    config.model, e, config.fallback_model
                );
                match self.get_model(&config.fallback_model) {
                    Ok(()) => {
                        info!("Using fallback generation model {}", config.fallback_model);
                        Ok(config.fallback_model.clone())
                    }
                    Err(fallback_err) => Err(SopError::Config(format!(
                        "Neither generation model is available: {} ({}), {} ({})",
                        config.model, e, config.fallback_model, fallback_err
                    ))),
                }
            }
        }
    }

    /// Generate one reply from a system instruction and an ordered list of
    /// conversation messages.
    #[inline]
    pub fn generate(
        &self,
        model: &str,
        system_instruction: &str,
        messages: &[Message],
    ) -> Result<String> {
        if messages.is_empty() {
            return Err(anyhow::anyhow!("No messages to send"));
        }

        let contents: Vec<Content> = messages
            .iter()
            .map(|message| Content {
                role: message.role.as_str().to_string(),
                parts: vec![Part {
                    text: message.text.clone(),
                }],
            })
            .collect();

        let request = GenerateRequest {
            system_instruction: Some(SystemInstruction {
                parts: vec![Part {
                    text: system_instruction.to_string(),
                }],
            }),
            contents,
        };

        let url = format!("{}/v1beta/{}:generateContent", self.base_url, model);
        debug!(
            "Requesting generation from {} ({} messages)",
            model,
            messages.len()
        );

        let response_text = self
            .post_json(&url, &serde_json::to_string(&request)?)
            .context("Generation request failed")?;

        let response: GenerateResponse = serde_json::from_str(&response_text)
            .context("Failed to parse generation response")?;

        let mut output = String::new();
        if let Some(candidate) = response.candidates.and_then(|mut list| list.pop()) {
            if let Some(content) = candidate.content {
                for part in content.parts {
                    if let Some(text) = part.text {
                        output.push_str(&text);
                    }
                }
            }
        }

        if output.trim().is_empty() {
            return Err(anyhow::anyhow!("Generation response contained no text"));
        }

        debug!("Received {} chars of generated text", output.len());
        Ok(output)
    }

    /// Generate an embedding vector for a single text.
    #[inline]
    pub fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: model.to_string(),
            content: EmbedContent {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
        };

        let url = format!("{}/v1beta/{}:embedContent", self.base_url, model);
        let response_text = self
            .post_json(&url, &serde_json::to_string(&request)?)
            .context("Embedding request failed")?;

        let response: EmbedResponse =
            serde_json::from_str(&response_text).context("Failed to parse embedding response")?;

        debug!(
            "Generated embedding with {} dimensions",
            response.embedding.values.len()
        );
        Ok(response.embedding.values)
    }

    /// Generate embedding vectors for multiple texts in one request.
    #[inline]
    pub fn embed_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let requests: Vec<EmbedRequest> = texts
            .iter()
            .map(|text| EmbedRequest {
                model: model.to_string(),
                content: EmbedContent {
                    parts: vec![Part { text: text.clone() }],
                },
            })
            .collect();

        let request = BatchEmbedRequest { requests };

        let url = format!("{}/v1beta/{}:batchEmbedContents", self.base_url, model);
        let response_text = self
            .post_json(&url, &serde_json::to_string(&request)?)
            .context("Batch embedding request failed")?;

        let response: BatchEmbedResponse = serde_json::from_str(&response_text)
            .context("Failed to parse batch embedding response")?;

        if response.embeddings.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            ));
        }

        Ok(response
            .embeddings
            .into_iter()
            .map(|embedding| embedding.values)
            .collect())
    }

    fn post_json(&self, url: &str, body: &str) -> Result<String> {
        self.agent
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .send(body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| match e {
                ureq::Error::StatusCode(status) => anyhow::anyhow!("HTTP {}", status),
                other => anyhow::anyhow!("Transport error: {}", other),
            })
    }
}

fn build_base_url(base_url: Option<&str>) -> String {
    let base = base_url
        .unwrap_or(DEFAULT_GEMINI_BASE_URL)
        .trim()
        .trim_end_matches('/');
    if base.is_empty() {
        DEFAULT_GEMINI_BASE_URL.to_string()
    } else {
        base.to_string()
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}
