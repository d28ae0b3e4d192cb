//! On-disk embedding indexes.
//!
//! Two engines persist the same chunk records and score similarity differently:
//!
//! * [`SurrealVectorStore`] is an embedded SurrealDB (SurrealKV engine) with an
//!   HNSW index, ranked by cosine similarity.
//! * [`LanceVectorStore`] is a LanceDB table, ranked by euclidean distance
//!   mapped to `1 / (1 + d)`.
//!
//! Both report [`AppError::StoreNotFound`] when their directory is missing on
//! search, and create it on the first write. Connections are opened lazily so
//! a missing store is never created by a read.

mod lance;
mod surreal;

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{error::AppError, storage::types::text_chunk::TextChunk};

pub use lance::LanceVectorStore;
pub use surreal::SurrealVectorStore;

/// A chunk together with its embedding, as persisted by a store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: TextChunk,
    pub embedding: Vec<f32>,
}

/// A search hit with its store-local similarity (higher is better).
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreEngine {
    Surreal,
    Lance,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    fn name(&self) -> &str;

    fn engine(&self) -> StoreEngine;

    fn location(&self) -> &Path;

    /// Appends chunks, creating the store on disk if absent. Returns how many were added.
    async fn add(&self, chunks: Vec<EmbeddedChunk>) -> Result<usize, AppError>;

    /// Top `k` chunks by this engine's similarity, best first.
    async fn similarity_search(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, AppError>;

    /// Number of stored chunks. Fails with `StoreNotFound` when absent.
    async fn count(&self) -> Result<usize, AppError>;

    async fn exists(&self) -> Result<bool, AppError> {
        Ok(tokio::fs::try_exists(self.location()).await?)
    }
}

pub fn open_store(engine: StoreEngine, name: &str, dir: &Path) -> Arc<dyn VectorStore> {
    match engine {
        StoreEngine::Surreal => Arc::new(SurrealVectorStore::new(name, dir)),
        StoreEngine::Lance => Arc::new(LanceVectorStore::new(name, dir)),
    }
}

async fn ensure_present(name: &str, dir: &Path) -> Result<(), AppError> {
    if tokio::fs::try_exists(dir).await? {
        Ok(())
    } else {
        Err(AppError::StoreNotFound(format!(
            "{name} store directory not found at {}",
            dir.display()
        )))
    }
}

/// Checks that a batch agrees with itself and with what the store already holds.
fn check_dimensions(
    name: &str,
    expected: Option<usize>,
    chunks: &[EmbeddedChunk],
) -> Result<Option<usize>, AppError> {
    let mut dimension = expected;
    for embedded in chunks {
        let len = embedded.embedding.len();
        match dimension {
            Some(expected) if expected != len => {
                return Err(AppError::Validation(format!(
                    "{name} store holds {expected}-dimensional embeddings, got {len}"
                )));
            }
            Some(_) => {}
            None => dimension = Some(len),
        }
    }
    Ok(dimension)
}
