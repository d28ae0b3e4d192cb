use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surrealdb::{
    engine::any::{connect, Any},
    Surreal,
};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use crate::{
    error::AppError,
    storage::types::{text_chunk::TextChunk, Metadata},
};

use super::{check_dimensions, ensure_present, EmbeddedChunk, ScoredChunk, StoreEngine, VectorStore};

const NAMESPACE: &str = "audit_rag";
const CHUNK_TABLE: &str = "chunk";
const EMBEDDING_INDEX: &str = "idx_chunk_embedding";
const HNSW_EF: usize = 40;

/// Embedded SurrealDB on the SurrealKV engine, one database per store.
pub struct SurrealVectorStore {
    name: String,
    dir: PathBuf,
    db: OnceCell<Surreal<Any>>,
    write_lock: Mutex<()>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChunkRecord {
    chunk_id: String,
    document_id: String,
    position: usize,
    text: String,
    metadata: Metadata,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ScoredRecord {
    chunk_id: String,
    document_id: String,
    position: usize,
    text: String,
    metadata: Metadata,
    score: f64,
}

impl From<EmbeddedChunk> for ChunkRecord {
    fn from(embedded: EmbeddedChunk) -> Self {
        let EmbeddedChunk { chunk, embedding } = embedded;
        Self {
            chunk_id: chunk.id,
            document_id: chunk.document_id,
            position: chunk.index,
            text: chunk.text,
            metadata: chunk.metadata,
            embedding,
        }
    }
}

impl From<ScoredRecord> for ScoredChunk {
    #[allow(clippy::cast_possible_truncation)]
    fn from(record: ScoredRecord) -> Self {
        Self {
            chunk: TextChunk {
                id: record.chunk_id,
                document_id: record.document_id,
                index: record.position,
                text: record.text,
                metadata: record.metadata,
            },
            score: record.score as f32,
        }
    }
}

impl SurrealVectorStore {
    pub fn new(name: &str, dir: &Path) -> Self {
        Self {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            db: OnceCell::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Connects on first use. Callers make sure the directory exists first.
    async fn client(&self) -> Result<&Surreal<Any>, AppError> {
        self.db
            .get_or_try_init(|| async {
                let db = connect(format!("surrealkv://{}", self.dir.display())).await?;
                db.use_ns(NAMESPACE).use_db(self.name.as_str()).await?;
                info!(store = %self.name, path = %self.dir.display(), "Opened SurrealDB store");
                Ok::<_, AppError>(db)
            })
            .await
    }

    async fn stored_dimension(&self, db: &Surreal<Any>) -> Result<Option<usize>, AppError> {
        let dimensions: Vec<usize> = db
            .query("SELECT VALUE array::len(embedding) FROM type::table($table) LIMIT 1")
            .bind(("table", CHUNK_TABLE))
            .await?
            .take(0)?;
        Ok(dimensions.into_iter().next())
    }

    async fn define_index(&self, db: &Surreal<Any>, dimension: usize) -> Result<(), AppError> {
        db.query(format!(
            "DEFINE INDEX IF NOT EXISTS {EMBEDDING_INDEX} ON TABLE {CHUNK_TABLE} \
             FIELDS embedding HNSW DIMENSION {dimension} DIST COSINE;"
        ))
        .await?
        .check()?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for SurrealVectorStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn engine(&self) -> StoreEngine {
        StoreEngine::Surreal
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
        let db = self.client().await?;

        let stored = self.stored_dimension(db).await?;
        if let Some(dimension) = check_dimensions(&self.name, stored, &chunks)? {
            self.define_index(db, dimension).await?;
        }

        let added = chunks.len();
        let records: Vec<ChunkRecord> = chunks.into_iter().map(ChunkRecord::from).collect();
        db.query(format!("INSERT INTO {CHUNK_TABLE} $records"))
            .bind(("records", records))
            .await?
            .check()?;

        debug!(store = %self.name, added, "Inserted chunk records");
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

        let db = self.client().await?;
        // No records means no index to search yet.
        let Some(dimension) = self.stored_dimension(db).await? else {
            return Ok(Vec::new());
        };
        if dimension != embedding.len() {
            return Err(AppError::Validation(format!(
                "{} store holds {dimension}-dimensional embeddings, query has {}",
                self.name,
                embedding.len()
            )));
        }

        let query = format!(
            "SELECT chunk_id, document_id, position, text, metadata, \
             vector::similarity::cosine(embedding, $embedding) AS score \
             FROM {CHUNK_TABLE} WHERE embedding <|{k},{HNSW_EF}|> $embedding \
             ORDER BY score DESC"
        );
        let records: Vec<ScoredRecord> = db
            .query(query)
            .bind(("embedding", embedding.to_vec()))
            .await?
            .take(0)?;

        Ok(records.into_iter().map(ScoredChunk::from).collect())
    }

    async fn count(&self) -> Result<usize, AppError> {
        #[derive(Debug, Deserialize)]
        struct CountResult {
            count: usize,
        }

        ensure_present(&self.name, &self.dir).await?;
        let db = self.client().await?;
        let result: Option<CountResult> = db
            .query("SELECT count() AS count FROM type::table($table) GROUP ALL")
            .bind(("table", CHUNK_TABLE))
            .await?
            .take(0)?;

        Ok(result.map_or(0, |r| r.count))
    }
}
