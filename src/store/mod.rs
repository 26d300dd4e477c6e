// Vector store module
// One collection of embedded chunks behind a backend selected by
// configuration; ingestion writes it, chat reads it

pub mod lance;
pub mod pinecone;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Config, StoreBackendKind};
use crate::{Result, SopError};

/// Embedding record stored in the collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Opaque identifier assigned at ingestion time
    pub id: String,
    /// The vector embedding
    pub vector: Vec<f32>,
    /// Metadata about the chunk this embedding represents
    pub metadata: ChunkMetadata,
}

/// Metadata for a chunk stored alongside its embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// Title of the source document
    pub doc_title: String,
    /// Path of the source file at ingestion time
    pub source_path: String,
    /// 1-based page the chunk came from, when known
    pub page_number: Option<u32>,
    /// The actual text content of the chunk
    pub content: String,
    /// Token count of the chunk
    pub token_count: u32,
    /// Index of this chunk within the document (for ordering)
    pub chunk_index: u32,
    /// Timestamp when this embedding was created
    pub created_at: String,
}

/// Search result from vector similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub metadata: ChunkMetadata,
    pub similarity_score: f32,
    pub distance: f32,
}

/// Provenance persisted with the collection so that ingestion-time and
/// query-time embedding models can be compared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionManifest {
    pub embedding_model: String,
    pub dimension: u32,
}

/// A named persistent collection of embedded chunks.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Additive upsert. Re-ingesting identical content duplicates it; the
    /// store does not deduplicate.
    async fn upsert(&mut self, records: Vec<EmbeddingRecord>) -> Result<()>;

    /// Top-k nearest neighbors of `query_vector`.
    async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// Number of stored chunks.
    async fn count(&self) -> Result<u64>;

    /// Ingestion provenance, when the backend can persist it.
    async fn manifest(&self) -> Result<Option<CollectionManifest>>;

    /// Record ingestion provenance.
    async fn write_manifest(&mut self, manifest: &CollectionManifest) -> Result<()>;

    fn collection_name(&self) -> &str;

    /// Human-readable location for status displays.
    fn location(&self) -> String;
}

/// Open (get-or-create) the configured backend for ingestion.
#[inline]
pub async fn open_store(config: &Config) -> Result<Box<dyn VectorStore>> {
    match config.store.backend {
        StoreBackendKind::Local => Ok(Box::new(lance::LanceStore::open(config).await?)),
        StoreBackendKind::Pinecone => Ok(Box::new(pinecone::PineconeStore::open(config)?)),
    }
}

/// Open the configured backend for querying.
///
/// An absent or empty collection refuses to serve and instructs the
/// operator to run ingestion; a manifest recorded under a different
/// embedding model or dimension does the same, since vectors from
/// mismatched models make nearest-neighbor results meaningless.
#[inline]
pub async fn open_store_for_query(
    config: &Config,
    embedding_model: &str,
) -> Result<Box<dyn VectorStore>> {
    let store = open_store(config).await?;

    let count = store.count().await?;
    if count == 0 {
        return Err(SopError::Store(format!(
            "Collection '{}' is empty or missing. Run `sop-assistant ingest` first.",
            store.collection_name()
        )));
    }

    if let Some(manifest) = store.manifest().await? {
        if manifest.embedding_model != embedding_model {
            return Err(SopError::Store(format!(
                "Collection '{}' was ingested with embedding model '{}', but '{}' is configured. \
                 Re-run ingestion or restore the original model.",
                store.collection_name(),
                manifest.embedding_model,
                embedding_model
            )));
        }
        if manifest.dimension != config.embedding.dimension {
            return Err(SopError::Store(format!(
                "Collection '{}' holds {}-dimensional vectors, but {} is configured.",
                store.collection_name(),
                manifest.dimension,
                config.embedding.dimension
            )));
        }
    }

    debug!(
        "Opened collection '{}' with {} chunks",
        store.collection_name(),
        count
    );

    Ok(store)
}
