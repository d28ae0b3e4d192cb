use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use arrow_array::{
    types::Float32Type, Array, FixedSizeListArray, Float32Array, RecordBatch,
    RecordBatchIterator, StringArray, UInt64Array,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    connect,
    query::{ExecutableQuery, QueryBase},
    Connection, DistanceType, Table,
};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use crate::{
    error::AppError,
    storage::types::{text_chunk::TextChunk, Metadata},
};

use super::{check_dimensions, ensure_present, EmbeddedChunk, ScoredChunk, StoreEngine, VectorStore};

const CHUNK_TABLE: &str = "chunks";
const VECTOR_COLUMN: &str = "vector";
const DISTANCE_COLUMN: &str = "_distance";

/// LanceDB table of chunks searched by euclidean distance.
pub struct LanceVectorStore {
    name: String,
    dir: PathBuf,
    db: OnceCell<Connection>,
    write_lock: Mutex<()>,
}

fn chunk_schema(dimension: i32) -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("chunk_id", DataType::Utf8, false),
        Field::new("document_id", DataType::Utf8, false),
        Field::new("position", DataType::UInt64, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension,
            ),
            true,
        ),
    ]))
}

/// Lance reports squared L2, so take the root before mapping into `(0, 1]`.
fn distance_to_similarity(squared_distance: f32) -> f32 {
    if !squared_distance.is_finite() {
        return 0.0;
    }
    1.0 / (1.0 + squared_distance.max(0.0).sqrt())
}

fn to_record_batch(chunks: Vec<EmbeddedChunk>, dimension: usize) -> Result<RecordBatch, AppError> {
    let dimension = i32::try_from(dimension)
        .map_err(|_| AppError::Validation(format!("embedding dimension {dimension} too large")))?;

    let mut chunk_ids = Vec::with_capacity(chunks.len());
    let mut document_ids = Vec::with_capacity(chunks.len());
    let mut positions = Vec::with_capacity(chunks.len());
    let mut texts = Vec::with_capacity(chunks.len());
    let mut metadata = Vec::with_capacity(chunks.len());
    let mut vectors = Vec::with_capacity(chunks.len());

    for EmbeddedChunk { chunk, embedding } in chunks {
        chunk_ids.push(chunk.id);
        document_ids.push(chunk.document_id);
        positions.push(chunk.index as u64);
        texts.push(chunk.text);
        metadata.push(serde_json::to_string(&chunk.metadata)?);
        vectors.push(Some(embedding.into_iter().map(Some).collect::<Vec<_>>()));
    }

    Ok(RecordBatch::try_new(
        chunk_schema(dimension),
        vec![
            Arc::new(StringArray::from(chunk_ids)),
            Arc::new(StringArray::from(document_ids)),
            Arc::new(UInt64Array::from(positions)),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(metadata)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
                vectors, dimension,
            )),
        ],
    )?)
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T, AppError> {
    batch
        .column_by_name(name)
        .and_then(|column| column.as_any().downcast_ref::<T>())
        .ok_or_else(|| AppError::InternalError(format!("lance result is missing column {name}")))
}

fn scored_chunks(batch: &RecordBatch) -> Result<Vec<ScoredChunk>, AppError> {
    let chunk_ids = column::<StringArray>(batch, "chunk_id")?;
    let document_ids = column::<StringArray>(batch, "document_id")?;
    let positions = column::<UInt64Array>(batch, "position")?;
    let texts = column::<StringArray>(batch, "text")?;
    let metadata = column::<StringArray>(batch, "metadata")?;
    let distances = column::<Float32Array>(batch, DISTANCE_COLUMN)?;

    (0..batch.num_rows())
        .map(|row| {
            let metadata: Metadata = serde_json::from_str(metadata.value(row))?;
            Ok(ScoredChunk {
                chunk: TextChunk {
                    id: chunk_ids.value(row).to_string(),
                    document_id: document_ids.value(row).to_string(),
                    index: usize::try_from(positions.value(row)).unwrap_or(usize::MAX),
                    text: texts.value(row).to_string(),
                    metadata,
                },
                score: distance_to_similarity(distances.value(row)),
            })
        })
        .collect()
}

impl LanceVectorStore {
    pub fn new(name: &str, dir: &Path) -> Self {
        Self {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            db: OnceCell::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Connects on first use. Callers make sure the directory exists first.
    async fn connection(&self) -> Result<&Connection, AppError> {
        self.db
            .get_or_try_init(|| async {
                let db = connect(self.dir.to_string_lossy().as_ref()).execute().await?;
                info!(store = %self.name, path = %self.dir.display(), "Opened LanceDB store");
                Ok::<_, AppError>(db)
            })
            .await
    }

    async fn open_table(&self) -> Result<Option<Table>, AppError> {
        let db = self.connection().await?;
        let names = db.table_names().execute().await?;
        if !names.iter().any(|name| name == CHUNK_TABLE) {
            return Ok(None);
        }
        Ok(Some(db.open_table(CHUNK_TABLE).execute().await?))
    }

    async fn stored_dimension(table: &Table) -> Result<Option<usize>, AppError> {
        let schema = table.schema().await?;
        Ok(schema
            .field_with_name(VECTOR_COLUMN)
            .ok()
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            }))
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn engine(&self) -> StoreEngine {
        StoreEngine::Lance
    }

    fn location(&self) -> &Path {
        &self.dir
    }

    async fn add(&self, chunks: Vec<EmbeddedChunk>) -> Result<usize, AppError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.dir).await?;

        let table = self.open_table().await?;
        let stored = match &table {
            Some(table) => Self::stored_dimension(table).await?,
            None => None,
        };
        let Some(dimension) = check_dimensions(&self.name, stored, &chunks)? else {
            return Ok(0);
        };

        let added = chunks.len();
        let batch = to_record_batch(chunks, dimension)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));

        match table {
            Some(table) => {
                table.add(reader).execute().await?;
            }
            None => {
                self.connection()
                    .await?
                    .create_table(CHUNK_TABLE, reader)
                    .execute()
                    .await?;
            }
        }

        debug!(store = %self.name, added, "Appended rows to lance table");
        Ok(added)
    }

    async fn similarity_search(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, AppError> {
        ensure_present(&self.name, &self.dir).await?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let Some(table) = self.open_table().await? else {
            return Ok(Vec::new());
        };

        let batches: Vec<RecordBatch> = table
            .vector_search(embedding.to_vec())?
            .column(VECTOR_COLUMN)
            .distance_type(DistanceType::L2)
            .limit(k)
            .execute()
            .await?
            .try_collect()
            .await?;

        let mut hits = Vec::new();
        for batch in &batches {
            hits.extend(scored_chunks(batch)?);
        }
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize, AppError> {
        ensure_present(&self.name, &self.dir).await?;
        match self.open_table().await? {
            Some(table) => Ok(table.count_rows(None).await?),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::vector_store::test_support::embedded;

    #[test]
    fn test_distance_to_similarity_is_bounded() {
        assert!((distance_to_similarity(0.0) - 1.0).abs() < 1e-6);
        // squared distance 4 is euclidean 2
        assert!((distance_to_similarity(4.0) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(distance_to_similarity(f32::INFINITY), 0.0);
    }

    #[tokio::test]
    async fn test_search_on_missing_directory_is_store_not_found() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("absent");
        let store = LanceVectorStore::new("secondary", &dir);

        let result = store.similarity_search(&[1.0], 6).await;
        assert!(matches!(result, Err(AppError::StoreNotFound(_))));
        assert!(matches!(store.count().await, Err(AppError::StoreNotFound(_))));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_existing_empty_directory_searches_empty() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = LanceVectorStore::new("secondary", tmp.path());

        assert!(store.similarity_search(&[1.0], 6).await.expect("search").is_empty());
        assert_eq!(store.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn test_appends_across_writes_and_ranks_by_distance() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("lance_store");
        let store = LanceVectorStore::new("secondary", &dir);

        store
            .add(vec![embedded("10-K risk factors", vec![0.0, 1.0])])
            .await
            .expect("first add");
        store
            .add(vec![embedded("SOX 302 certification", vec![1.0, 0.0])])
            .await
            .expect("second add");
        assert_eq!(store.count().await.expect("count"), 2);

        let hits = store.similarity_search(&[1.0, 0.0], 2).await.expect("search");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.text, "SOX 302 certification");
        assert_eq!(hits[0].chunk.metadata.get("source").map(String::as_str), Some("test.txt"));
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!(hits[1].score < hits[0].score);
    }

    #[tokio::test]
    async fn test_rejects_dimension_mismatch_against_existing_rows() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = LanceVectorStore::new("secondary", tmp.path());
        store
            .add(vec![embedded("a", vec![1.0, 0.0])])
            .await
            .expect("add");

        let result = store.add(vec![embedded("b", vec![1.0])]).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(store.count().await.expect("count"), 1);
    }
}
