
use super::{ChunkRecord, IndexState, Neighbor};
use crate::embeddings::ensure_dimension;
use crate::{RagError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::index::Index;
use lancedb::index::vector::IvfPqIndexBuilder;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::table::OptimizeAction;
use lancedb::{Connection, DistanceType, Table};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the chunk table
pub const TABLE_NAME: &str = "chunks";

/// IVF-PQ training needs at least this many rows; smaller tables are scanned
pub const MIN_ROWS_FOR_INDEX: usize = 256;

/// Candidates re-ranked by exact distance per requested neighbor on indexed search
const REFINE_FACTOR: u32 = 10;

/// Columns forming the upsert key
const KEY_COLUMNS: [&str; 2] = ["document_id", "text"];

/// Chunk table with nearest-neighbor search, stored in LanceDB.
///
/// Every row is unique on `(document_id, text)`; writing an existing key
/// replaces its vector. The vector width is fixed per table and checked on
/// every write and query.
pub struct VectorStore {
    connection: Connection,
    path: PathBuf,
    table_name: String,
    vector_dimension: Option<usize>,
}

impl VectorStore {
    /// Open (or create) the LanceDB directory at `path`.
    ///
    /// No table is touched yet; call [`Self::ensure_schema`] before writing
    /// or [`Self::open_schema`] before querying.
    #[inline]
    pub async fn connect(path: &Path) -> Result<Self> {
        debug!("Initializing LanceDB at path: {:?}", path);

        std::fs::create_dir_all(path).map_err(|e| {
            RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = path.to_string_lossy();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            path: path.to_path_buf(),
            table_name: TABLE_NAME.to_string(),
            vector_dimension: None,
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Vector width of the table, once a schema is established
    #[inline]
    pub fn embedding_dimension(&self) -> Option<usize> {
        self.vector_dimension
    }

    /// Create the chunk table if it is absent. Idempotent.
    ///
    /// An existing table with a different vector width is rejected rather
    /// than recreated, since that would silently discard its rows.
    #[inline]
    pub async fn ensure_schema(&mut self, embedding_dim: usize) -> Result<()> {
        if let Some(existing) = self.detect_existing_vector_dimension().await? {
            ensure_width(existing, embedding_dim)?;
            debug!("Chunk table already exists with {} dimensions", existing);
            self.vector_dimension = Some(existing);
            return Ok(());
        }

        info!("Creating chunk table with {} dimensions", embedding_dim);
        self.connection
            .create_empty_table(&self.table_name, Self::create_schema(embedding_dim))
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?;

        self.vector_dimension = Some(embedding_dim);
        Ok(())
    }

    /// Attach to an existing chunk table; fails when nothing has been ingested yet
    #[inline]
    pub async fn open_schema(&mut self, embedding_dim: usize) -> Result<()> {
        let existing = self.detect_existing_vector_dimension().await?.ok_or_else(|| {
            RagError::Database(format!(
                "Chunk table not initialized in {}; run an ingest first",
                self.path.display()
            ))
        })?;

        ensure_width(existing, embedding_dim)?;
        self.vector_dimension = Some(existing);
        Ok(())
    }

    /// Vector width of an existing table, `None` when the table is absent
    async fn detect_existing_vector_dimension(&self) -> Result<Option<usize>> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        if !table_names.contains(&self.table_name) {
            return Ok(None);
        }

        let table = self.open_table().await?;
        let schema = table
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(Some(*size as usize));
                }
            }
        }

        Err(RagError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("document_id", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
        ]))
    }

    fn require_dimension(&self) -> Result<usize> {
        self.vector_dimension.ok_or_else(|| {
            RagError::Database("Chunk table schema has not been initialized".to_string())
        })
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))
    }

    /// Insert a chunk, or replace the vector of the row with the same key
    #[inline]
    pub async fn upsert(&self, document_id: &str, text: &str, vector: &[f32]) -> Result<()> {
        self.upsert_batch(&[ChunkRecord {
            document_id: document_id.to_string(),
            text: text.to_string(),
            vector: vector.to_vec(),
        }])
        .await
    }

    /// Upsert several chunks in one merge.
    ///
    /// When the batch repeats a key, the last occurrence wins.
    #[inline]
    pub async fn upsert_batch(&self, records: &[ChunkRecord]) -> Result<()> {
        if records.is_empty() {
            debug!("No chunks to store");
            return Ok(());
        }

        let vector_dim = self.require_dimension()?;
        for record in records {
            ensure_dimension(&record.vector, vector_dim)?;
        }

        let records = last_per_key(records);
        let record_batch = Self::create_record_batch(vector_dim, &records)?;

        let table = self.open_table().await?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let mut merge = table.merge_insert(&KEY_COLUMNS);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| RagError::Database(format!("Failed to upsert chunks: {}", e)))?;

        debug!("Upserted {} chunks", records.len());
        Ok(())
    }

    fn create_record_batch(vector_dim: usize, records: &[&ChunkRecord]) -> Result<RecordBatch> {
        let len = records.len();

        let mut document_ids = Vec::with_capacity(len);
        let mut texts = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);

        for record in records {
            document_ids.push(record.document_id.as_str());
            texts.push(record.text.as_str());
            flat_values.extend_from_slice(&record.vector);
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    RagError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(document_ids)),
            Arc::new(StringArray::from(texts)),
            Arc::new(vector_array),
        ];

        RecordBatch::try_new(Self::create_schema(vector_dim), arrays)
            .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Drop any index on the vector column, compact the table and build a
    /// fresh index.
    ///
    /// Called once per ingestion run. Tables smaller than
    /// [`MIN_ROWS_FOR_INDEX`] are compacted but left without an index.
    #[inline]
    pub async fn rebuild_index(&self) -> Result<IndexState> {
        let table = self.open_table().await?;

        let indices = table
            .list_indices()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list indices: {}", e)))?;

        for index in indices
            .iter()
            .filter(|index| index.columns.iter().any(|column| column == "vector"))
        {
            debug!("Dropping vector index {}", index.name);
            table
                .drop_index(&index.name)
                .await
                .map_err(|e| RagError::Database(format!("Failed to drop index: {}", e)))?;
        }

        Self::optimize(&table).await?;

        let rows = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;

        if rows < MIN_ROWS_FOR_INDEX {
            info!(
                "Skipping vector index: {} rows is below the {} needed for training",
                rows, MIN_ROWS_FOR_INDEX
            );
            return Ok(IndexState::SkippedTooFewRows(rows));
        }

        table
            .create_index(
                &["vector"],
                Index::IvfPq(IvfPqIndexBuilder::default().distance_type(DistanceType::L2)),
            )
            .replace(true)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to create vector index: {}", e)))?;

        info!("Vector index rebuilt over {} rows", rows);
        Ok(IndexState::Built)
    }

    /// Merge the small fragments left by upserts and clean up old versions
    async fn optimize(table: &Table) -> Result<()> {
        debug!("Optimizing chunk table");

        let stats = table
            .optimize(OptimizeAction::All)
            .await
            .map_err(|e| RagError::Database(format!("Failed to optimize table: {}", e)))?;

        if let Some(compaction) = stats.compaction {
            debug!(
                "Compacted {} fragments into {}",
                compaction.fragments_removed, compaction.fragments_added
            );
        }
        info!("Vector database optimization completed");
        Ok(())
    }

    /// Number of data fragments backing the chunk table
    #[inline]
    pub async fn fragment_count(&self) -> Result<usize> {
        let table = self.open_table().await?;
        let stats = table
            .stats()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read table statistics: {}", e)))?;
        Ok(stats.fragment_stats.num_fragments)
    }

    /// Whether an index currently covers the vector column
    #[inline]
    pub async fn has_vector_index(&self) -> Result<bool> {
        let table = self.open_table().await?;
        let indices = table
            .list_indices()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list indices: {}", e)))?;

        Ok(indices
            .iter()
            .any(|index| index.columns.iter().any(|column| column == "vector")))
    }

    /// Up to `k` chunks closest to `query_vector`, nearest first.
    ///
    /// When an index is present its candidates are re-ranked on the stored
    /// vectors, so reported distances are exact L2. Equal distances are ordered by `(document_id, text)` so repeated
    /// queries return the same sequence.
    #[inline]
    pub async fn nearest_neighbors(&self, query_vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let vector_dim = self.require_dimension()?;
        ensure_dimension(query_vector, vector_dim)?;

        if k == 0 {
            return Ok(Vec::new());
        }

        debug!("Searching for {} nearest neighbors", k);

        let table = self.open_table().await?;
        let results = table
            .vector_search(query_vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::L2)
            .refine_factor(REFINE_FACTOR)
            .limit(k)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let mut neighbors = Self::parse_search_results_stream(results).await?;
        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.document_id.cmp(&b.document_id))
                .then_with(|| a.text.cmp(&b.text))
        });
        neighbors.truncate(k);

        Ok(neighbors)
    }

    async fn parse_search_results_stream(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<Neighbor>> {
        let mut neighbors = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            let document_ids = string_column(&batch, "document_id")?;
            let texts = string_column(&batch, "text")?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|col| col.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| RagError::Database("Missing _distance column".to_string()))?;

            for row in 0..batch.num_rows() {
                neighbors.push(Neighbor {
                    document_id: document_ids.value(row).to_string(),
                    text: texts.value(row).to_string(),
                    distance: distances.value(row),
                });
            }
        }

        debug!("Parsed {} search results from stream", neighbors.len());
        Ok(neighbors)
    }

    /// All stored chunks of one document
    #[inline]
    pub async fn chunks_for_document(&self, document_id: &str) -> Result<Vec<ChunkRecord>> {
        let table = self.open_table().await?;
        let mut results = table
            .query()
            .only_if(document_filter(document_id))
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to query chunks: {}", e)))?;

        let mut records = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            let document_ids = string_column(&batch, "document_id")?;
            let texts = string_column(&batch, "text")?;
            let vectors = batch
                .column_by_name("vector")
                .and_then(|col| col.as_any().downcast_ref::<FixedSizeListArray>())
                .ok_or_else(|| RagError::Database("Missing vector column".to_string()))?;

            for row in 0..batch.num_rows() {
                let vector = vectors.value(row);
                let values = vector
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .ok_or_else(|| RagError::Database("Invalid vector column type".to_string()))?;

                records.push(ChunkRecord {
                    document_id: document_ids.value(row).to_string(),
                    text: texts.value(row).to_string(),
                    vector: values.values().to_vec(),
                });
            }
        }

        Ok(records)
    }

    /// Total number of stored chunks
    #[inline]
    pub async fn count_chunks(&self) -> Result<usize> {
        let table = self.open_table().await?;
        table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))
    }

    /// Number of stored chunks for one document
    #[inline]
    pub async fn count_chunks_for_document(&self, document_id: &str) -> Result<usize> {
        let table = self.open_table().await?;
        table
            .count_rows(Some(document_filter(document_id)))
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))
    }
}

fn ensure_width(existing: usize, requested: usize) -> Result<()> {
    if existing == requested {
        Ok(())
    } else {
        Err(RagError::DimensionMismatch {
            expected: existing,
            actual: requested,
        })
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

fn document_filter(document_id: &str) -> String {
    format!("document_id = '{}'", document_id.replace('\'', "''"))
}

/// Keep only the last record for each `(document_id, text)` key, preserving order
fn last_per_key(records: &[ChunkRecord]) -> Vec<&ChunkRecord> {
    let mut seen = HashSet::new();
    let mut kept: Vec<&ChunkRecord> = records
        .iter()
        .rev()
        .filter(|record| seen.insert((record.document_id.as_str(), record.text.as_str())))
        .collect();
    kept.reverse();
    kept
}
