
use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use tracing::{debug, info};

use super::{ChunkMetadata, CollectionManifest, EmbeddingRecord, SearchResult, VectorStore};
use crate::config::Config;
use crate::{Result, SopError};

const MANIFEST_FILE: &str = "manifest.json";

/// Local vector store backed by LanceDB
pub struct LanceStore {
    connection: Connection,
    db_path: PathBuf,
    collection: String,
    dimension: usize,
}

impl LanceStore {
    /// Open (get-or-create) the collection at the configured local path.
    #[inline]
    pub async fn open(config: &Config) -> Result<Self> {
        let db_path = config.store.local.path.clone();
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(&db_path).map_err(|e| {
            SopError::Store(format!("Failed to create vector store directory: {}", e))
        })?;

        let db_path = db_path.canonicalize().map_err(|e| {
            SopError::Store(format!("Failed to resolve vector store path: {}", e))
        })?;

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| SopError::Store(format!("Failed to connect to LanceDB: {}", e)))?;

        let mut store = Self {
            connection,
            db_path,
            collection: config.store.local.collection.clone(),
            dimension: config.embedding.dimension as usize,
        };

        store.initialize_table().await?;

        info!(
            "Vector store initialized at {} (collection '{}')",
            store.db_path.display(),
            store.collection
        );
        Ok(store)
    }

    /// Create the collection table if absent; otherwise adopt the vector
    /// dimension of the existing table.
    async fn initialize_table(&mut self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| SopError::Store(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.collection) {
            let dim = self.detect_existing_vector_dimension().await?;
            debug!("Collection '{}' exists with dimension {}", self.collection, dim);
            self.dimension = dim;
            return Ok(());
        }

        info!(
            "Creating collection '{}' with {} dimensions",
            self.collection, self.dimension
        );

        let schema = self.create_schema(self.dimension);
        self.connection
            .create_empty_table(&self.collection, schema)
            .execute()
            .await
            .map_err(|e| SopError::Store(format!("Failed to create collection: {}", e)))?;

        Ok(())
    }

    /// Detect vector dimension from the existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let table = self
            .connection
            .open_table(&self.collection)
            .execute()
            .await
            .map_err(|e| SopError::Store(format!("Failed to open existing collection: {}", e)))?;

        let schema = table
            .schema()
            .await
            .map_err(|e| SopError::Store(format!("Failed to get collection schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(SopError::Store(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(&self, vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("doc_title", DataType::Utf8, false),
            Field::new("source_path", DataType::Utf8, false),
            Field::new("page_number", DataType::UInt32, true),
            Field::new("content", DataType::Utf8, false),
            Field::new("token_count", DataType::UInt32, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    /// Create a RecordBatch from embedding records
    fn create_record_batch(&self, records: &[EmbeddingRecord]) -> Result<RecordBatch> {
        let len = records.len();
        let vector_dim = self.dimension;

        let mut ids = Vec::with_capacity(len);
        let mut doc_titles = Vec::with_capacity(len);
        let mut source_paths = Vec::with_capacity(len);
        let mut page_numbers = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut token_counts = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            doc_titles.push(record.metadata.doc_title.as_str());
            source_paths.push(record.metadata.source_path.as_str());
            page_numbers.push(record.metadata.page_number);
            contents.push(record.metadata.content.as_str());
            token_counts.push(record.metadata.token_count);
            chunk_indices.push(record.metadata.chunk_index);
            created_ats.push(record.metadata.created_at.as_str());
        }

        let schema = self.create_schema(vector_dim);

        let mut flat_values = Vec::with_capacity(len * vector_dim);
        for record in records {
            flat_values.extend_from_slice(&record.vector);
        }
        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| SopError::Store(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn arrow::array::Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(doc_titles)),
            Arc::new(StringArray::from(source_paths)),
            Arc::new(UInt32Array::from(page_numbers)),
            Arc::new(StringArray::from(contents)),
            Arc::new(UInt32Array::from(token_counts)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| SopError::Store(format!("Failed to create record batch: {}", e)))
    }

    /// Parse a single record batch from search results
    fn parse_search_batch(&self, batch: &RecordBatch) -> Result<Vec<SearchResult>> {
        let mut search_results = Vec::new();
        let num_rows = batch.num_rows();

        let doc_titles = string_column(batch, "doc_title")?;
        let source_paths = string_column(batch, "source_path")?;
        let contents = string_column(batch, "content")?;
        let created_ats = string_column(batch, "created_at")?;
        let page_numbers = u32_column(batch, "page_number")?;
        let token_counts = u32_column(batch, "token_count")?;
        let chunk_indices = u32_column(batch, "chunk_index")?;

        let distances = batch
            .column_by_name("_distance")
            .map(|col| col.as_any().downcast_ref::<Float32Array>());

        for row in 0..num_rows {
            let metadata = ChunkMetadata {
                doc_title: doc_titles.value(row).to_string(),
                source_path: source_paths.value(row).to_string(),
                page_number: if page_numbers.is_null(row) {
                    None
                } else {
                    Some(page_numbers.value(row))
                },
                content: contents.value(row).to_string(),
                token_count: token_counts.value(row),
                chunk_index: chunk_indices.value(row),
                created_at: created_ats.value(row).to_string(),
            };

            let distance = distances
                .flatten()
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            // Convert distance to similarity score (higher is better)
            let similarity_score = 1.0 - distance;

            search_results.push(SearchResult {
                metadata,
                similarity_score,
                distance,
            });
        }

        debug!("Parsed {} search results", search_results.len());
        Ok(search_results)
    }

    fn manifest_path(&self) -> PathBuf {
        self.db_path.join(format!("{}.{}", self.collection, MANIFEST_FILE))
    }
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn upsert(&mut self, records: Vec<EmbeddingRecord>) -> Result<()> {
        if records.is_empty() {
            debug!("No embeddings to store");
            return Ok(());
        }

        // A vector of the wrong width is a hard failure, never a silent
        // re-shape of the collection
        for record in &records {
            if record.vector.len() != self.dimension {
                return Err(SopError::Store(format!(
                    "Embedding dimension mismatch: got {}, collection '{}' expects {}",
                    record.vector.len(),
                    self.collection,
                    self.dimension
                )));
            }
        }

        debug!("Storing batch of {} embeddings", records.len());

        let record_batch = self.create_record_batch(&records)?;

        let table = self
            .connection
            .open_table(&self.collection)
            .execute()
            .await
            .map_err(|e| SopError::Store(format!("Failed to open collection: {}", e)))?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| SopError::Store(format!("Failed to insert embeddings: {}", e)))?;

        info!("Successfully stored {} embeddings", records.len());
        Ok(())
    }

    async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        debug!("Searching for similar vectors with limit: {}", limit);

        let table = self
            .connection
            .open_table(&self.collection)
            .execute()
            .await
            .map_err(|e| SopError::Store(format!("Failed to open collection: {}", e)))?;

        let query = table
            .vector_search(query_vector)
            .map_err(|e| SopError::Store(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(limit);

        let mut results = query
            .execute()
            .await
            .map_err(|e| SopError::Store(format!("Failed to execute search: {}", e)))?;

        let mut search_results = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| SopError::Store(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(self.parse_search_batch(&batch)?);
        }

        Ok(search_results)
    }

    async fn count(&self) -> Result<u64> {
        let table = self
            .connection
            .open_table(&self.collection)
            .execute()
            .await
            .map_err(|e| SopError::Store(format!("Failed to open collection: {}", e)))?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| SopError::Store(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    async fn manifest(&self) -> Result<Option<CollectionManifest>> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| SopError::Store(format!("Failed to read collection manifest: {}", e)))?;
        let manifest = serde_json::from_str(&content)
            .map_err(|e| SopError::Store(format!("Failed to parse collection manifest: {}", e)))?;

        Ok(Some(manifest))
    }

    async fn write_manifest(&mut self, manifest: &CollectionManifest) -> Result<()> {
        let content = serde_json::to_string_pretty(manifest)
            .map_err(|e| SopError::Store(format!("Failed to serialize manifest: {}", e)))?;

        std::fs::write(self.manifest_path(), content)
            .map_err(|e| SopError::Store(format!("Failed to write collection manifest: {}", e)))?;

        debug!(
            "Recorded manifest for '{}' (model {}, {} dims)",
            self.collection, manifest.embedding_model, manifest.dimension
        );
        Ok(())
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }

    fn location(&self) -> String {
        self.db_path.display().to_string()
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| SopError::Store(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| SopError::Store(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| SopError::Store(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| SopError::Store(format!("Invalid {} column type", name)))
}
