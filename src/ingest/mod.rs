// Ingestion pipeline
// Directory scan -> chunk -> embed -> upsert into the shared collection

#[cfg(test)]
mod tests;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::documents::{self, Document};
use crate::embeddings::EmbeddingClient;
use crate::embeddings::chunking::{ContentChunk, chunk_document};
use crate::store::{self, ChunkMetadata, CollectionManifest, EmbeddingRecord, VectorStore};
use crate::{Result, SopError};

const INGEST_BATCH_SIZE: usize = 32;

/// Counters reported at the end of an ingestion run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IngestReport {
    pub documents: usize,
    pub pages: usize,
    pub chunks: usize,
    pub embeddings: usize,
}

/// One-shot ingestion run over the configured document directory.
///
/// The upsert is additive: re-running against an unchanged directory
/// re-embeds and re-adds everything, and nothing is deduplicated.
pub struct Ingestor {
    config: Config,
    embedder: EmbeddingClient,
    store: Box<dyn VectorStore>,
    batch_size: usize,
}

impl Ingestor {
    /// Construct the embedding client and open the collection. Credentials
    /// are checked first, before any filesystem or network I/O.
    #[inline]
    pub async fn new(config: Config) -> Result<Self> {
        let embedder = EmbeddingClient::from_config(&config)?;
        let store = store::open_store(&config).await?;

        Ok(Self {
            config,
            embedder,
            store,
            batch_size: INGEST_BATCH_SIZE,
        })
    }

    /// Build an ingestor from already-constructed parts.
    #[inline]
    pub fn with_parts(
        config: Config,
        embedder: EmbeddingClient,
        store: Box<dyn VectorStore>,
    ) -> Self {
        Self {
            config,
            embedder,
            store,
            batch_size: INGEST_BATCH_SIZE,
        }
    }

    /// Run the whole pipeline to completion. Any failure aborts the run;
    /// there is no per-document isolation and no partial-success policy.
    #[inline]
    pub async fn run(&mut self) -> Result<IngestReport> {
        let documents = documents::load_directory(&self.config.data_dir)?;

        info!(
            "Ingesting {} documents into collection '{}'",
            documents.len(),
            self.store.collection_name()
        );

        let mut report = IngestReport {
            documents: documents.len(),
            ..IngestReport::default()
        };

        let mut chunks: Vec<ContentChunk> = Vec::new();
        let mut sources: Vec<String> = Vec::new();
        for document in &documents {
            report.pages += document.pages.len();
            let document_chunks = chunk_document(document, &self.config.chunking)?;
            debug!(
                "Document '{}' produced {} chunks",
                document.title,
                document_chunks.len()
            );
            sources.extend(
                std::iter::repeat_n(source_path(document), document_chunks.len()),
            );
            chunks.extend(document_chunks);
        }

        if chunks.is_empty() {
            return Err(SopError::DataLoad(format!(
                "Documents in {} produced no embeddable text",
                self.config.data_dir.display()
            )));
        }

        report.chunks = chunks.len();

        let progress = ProgressBar::new(chunks.len() as u64);
        progress.set_style(
            ProgressStyle::with_template(
                "{spinner} [{bar:40}] {pos}/{len} chunks ({elapsed})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        for (chunk_batch, source_batch) in chunks
            .chunks(self.batch_size)
            .zip(sources.chunks(self.batch_size))
        {
            let texts: Vec<String> = chunk_batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts)?;

            let records: Vec<EmbeddingRecord> = chunk_batch
                .iter()
                .zip(source_batch.iter())
                .zip(vectors)
                .map(|((chunk, source), vector)| EmbeddingRecord {
                    id: Uuid::new_v4().to_string(),
                    vector,
                    metadata: ChunkMetadata {
                        doc_title: chunk.doc_title.clone(),
                        source_path: source.clone(),
                        page_number: Some(chunk.page_number as u32),
                        content: chunk.content.clone(),
                        token_count: chunk.token_count as u32,
                        chunk_index: chunk.chunk_index as u32,
                        created_at: Utc::now().to_rfc3339(),
                    },
                })
                .collect();

            let stored = records.len();
            self.store.upsert(records).await?;

            report.embeddings += stored;
            progress.inc(stored as u64);
        }

        progress.finish_and_clear();

        self.store
            .write_manifest(&CollectionManifest {
                embedding_model: self.embedder.model_id().to_string(),
                dimension: self.config.embedding.dimension,
            })
            .await?;

        info!(
            "Ingestion complete: {} documents, {} pages, {} chunks, {} embeddings",
            report.documents, report.pages, report.chunks, report.embeddings
        );

        Ok(report)
    }

    /// Total chunks currently stored in the collection.
    #[inline]
    pub async fn collection_count(&self) -> Result<u64> {
        self.store.count().await
    }
}

fn source_path(document: &Document) -> String {
    document.path.display().to_string()
}
