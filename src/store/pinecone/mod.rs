
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use super::{ChunkMetadata, CollectionManifest, EmbeddingRecord, SearchResult, VectorStore};
use crate::config::Config;
use crate::{Result, SopError};

const DEFAULT_CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Cloud vector store backed by a Pinecone serverless index
pub struct PineconeStore {
    agent: ureq::Agent,
    api_key: String,
    index: String,
    /// Data-plane endpoint resolved from the control plane at open time.
    host: String,
    dimension: usize,
}

#[derive(Debug, Deserialize)]
struct DescribeIndexResponse {
    dimension: usize,
    host: String,
}

#[derive(Debug, Serialize)]
struct UpsertRequest {
    vectors: Vec<UpsertVector>,
    namespace: String,
}

#[derive(Debug, Serialize)]
struct UpsertVector {
    id: String,
    values: Vec<f32>,
    metadata: Value,
}

#[derive(Debug, Serialize)]
struct QueryRequest {
    vector: Vec<f32>,
    #[serde(rename = "topK")]
    top_k: usize,
    #[serde(rename = "includeMetadata")]
    include_metadata: bool,
    namespace: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    score: f32,
    metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct IndexStatsResponse {
    #[serde(rename = "totalVectorCount", default)]
    total_vector_count: u64,
}

impl PineconeStore {
    /// Resolve the index on the control plane and validate its dimension
    /// against the configured embedding dimension.
    #[inline]
    pub fn open(config: &Config) -> Result<Self> {
        let api_key = Config::pinecone_api_key().map_err(|e| SopError::Config(e.to_string()))?;

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        let control_plane = config
            .store
            .pinecone
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_CONTROL_PLANE_URL)
            .trim_end_matches('/')
            .to_string();

        let index = config.store.pinecone.index.clone();
        let describe_url = format!("{}/indexes/{}", control_plane, index);
        debug!("Describing Pinecone index at {}", describe_url);

        let response_text = agent
            .get(&describe_url)
            .header("Api-Key", &api_key)
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| {
                SopError::Store(format!("Failed to describe index '{}': {}", index, e))
            })?;

        let described: DescribeIndexResponse = serde_json::from_str(&response_text)
            .map_err(|e| SopError::Store(format!("Failed to parse index description: {}", e)))?;

        let configured = config.embedding.dimension as usize;
        if described.dimension != configured {
            return Err(SopError::Store(format!(
                "Index '{}' holds {}-dimensional vectors, but {} is configured.",
                index, described.dimension, configured
            )));
        }

        let host = if described.host.contains("://") {
            described.host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", described.host.trim_end_matches('/'))
        };

        info!("Connected to Pinecone index '{}' at {}", index, host);

        Ok(Self {
            agent,
            api_key,
            index,
            host,
            dimension: described.dimension,
        })
    }

    fn post_json(&self, path: &str, body: &str) -> Result<String> {
        let url = format!("{}{}", self.host, path);

        self.agent
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .send(body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| match e {
                ureq::Error::StatusCode(status) => {
                    SopError::Store(format!("Pinecone request to {} failed: HTTP {}", path, status))
                }
                other => SopError::Store(format!("Pinecone request to {} failed: {}", path, other)),
            })
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn upsert(&mut self, records: Vec<EmbeddingRecord>) -> Result<()> {
        if records.is_empty() {
            debug!("No embeddings to store");
            return Ok(());
        }

        for record in &records {
            if record.vector.len() != self.dimension {
                return Err(SopError::Store(format!(
                    "Embedding dimension mismatch: got {}, index '{}' expects {}",
                    record.vector.len(),
                    self.index,
                    self.dimension
                )));
            }
        }

        debug!("Upserting batch of {} vectors", records.len());

        let vectors = records
            .into_iter()
            .map(|record| UpsertVector {
                id: record.id,
                values: record.vector,
                metadata: metadata_to_value(&record.metadata),
            })
            .collect();

        let request = UpsertRequest {
            vectors,
            namespace: String::new(),
        };

        let body = serde_json::to_string(&request)
            .map_err(|e| SopError::Store(format!("Failed to serialize upsert request: {}", e)))?;
        self.post_json("/vectors/upsert", &body)?;

        Ok(())
    }

    async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        debug!("Querying index '{}' with topK {}", self.index, limit);

        let request = QueryRequest {
            vector: query_vector.to_vec(),
            top_k: limit,
            include_metadata: true,
            namespace: String::new(),
        };

        let body = serde_json::to_string(&request)
            .map_err(|e| SopError::Store(format!("Failed to serialize query request: {}", e)))?;
        let response_text = self.post_json("/query", &body)?;

        let response: QueryResponse = serde_json::from_str(&response_text)
            .map_err(|e| SopError::Store(format!("Failed to parse query response: {}", e)))?;

        let results = response
            .matches
            .into_iter()
            .map(|m| {
                let metadata = metadata_from_value(m.metadata.as_ref());
                SearchResult {
                    metadata,
                    similarity_score: m.score,
                    distance: 1.0 - m.score,
                }
            })
            .collect();

        Ok(results)
    }

    async fn count(&self) -> Result<u64> {
        let response_text = self.post_json("/describe_index_stats", "{}")?;

        let stats: IndexStatsResponse = serde_json::from_str(&response_text)
            .map_err(|e| SopError::Store(format!("Failed to parse index stats: {}", e)))?;

        Ok(stats.total_vector_count)
    }

    async fn manifest(&self) -> Result<Option<CollectionManifest>> {
        // The index carries no provenance document; the dimension was
        // validated against the control plane at open time
        Ok(None)
    }

    async fn write_manifest(&mut self, manifest: &CollectionManifest) -> Result<()> {
        debug!(
            "Index '{}' carries no manifest; skipping record of model {}",
            self.index, manifest.embedding_model
        );
        Ok(())
    }

    fn collection_name(&self) -> &str {
        &self.index
    }

    fn location(&self) -> String {
        self.host.clone()
    }
}

fn metadata_to_value(metadata: &ChunkMetadata) -> Value {
    let mut map = Map::new();
    map.insert("doc_title".to_string(), json!(metadata.doc_title));
    map.insert("source_path".to_string(), json!(metadata.source_path));
    if let Some(page) = metadata.page_number {
        map.insert("page_number".to_string(), json!(page));
    }
    map.insert("content".to_string(), json!(metadata.content));
    map.insert("token_count".to_string(), json!(metadata.token_count));
    map.insert("chunk_index".to_string(), json!(metadata.chunk_index));
    map.insert("created_at".to_string(), json!(metadata.created_at));
    Value::Object(map)
}

fn metadata_from_value(value: Option<&Value>) -> ChunkMetadata {
    let get_str = |key: &str| -> String {
        value
            .and_then(|v| v.get(key))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let get_u32 = |key: &str| -> u32 {
        value
            .and_then(|v| v.get(key))
            .and_then(Value::as_u64)
            .unwrap_or_default() as u32
    };

    ChunkMetadata {
        doc_title: get_str("doc_title"),
        source_path: get_str("source_path"),
        page_number: value
            .and_then(|v| v.get("page_number"))
            .and_then(Value::as_u64)
            .map(|p| p as u32),
        content: get_str("content"),
        token_count: get_u32("token_count"),
        chunk_index: get_u32("chunk_index"),
        created_at: get_str("created_at"),
    }
}
