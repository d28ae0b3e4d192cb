use std::sync::Arc;

use async_trait::async_trait;
use common::{error::AppError, storage::vector_store::VectorStore};
use tracing::debug;

use crate::RetrievedChunk;

/// A query already embedded once for every retriever taking part.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalQuery<'a> {
    pub text: &'a str,
    pub embedding: &'a [f32],
}

#[async_trait]
pub trait Retriever: Send + Sync {
    fn name(&self) -> &str;

    /// Returns at most `k` chunks ordered best first.
    async fn retrieve(
        &self,
        query: &RetrievalQuery<'_>,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, AppError>;
}

/// Adapts a persisted vector store; ranking follows the store engine's similarity.
pub struct VectorStoreRetriever {
    store: Arc<dyn VectorStore>,
}

impl VectorStoreRetriever {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Retriever for VectorStoreRetriever {
    fn name(&self) -> &str {
        self.store.name()
    }

    async fn retrieve(
        &self,
        query: &RetrievalQuery<'_>,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, AppError> {
        let hits = self.store.similarity_search(query.embedding, k).await?;
        debug!(
            store = self.store.name(),
            engine = ?self.store.engine(),
            hits = hits.len(),
            "Vector store search finished"
        );
        Ok(hits.into_iter().map(RetrievedChunk::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use common::storage::{
        types::{document::Document, text_chunk::TextChunk},
        vector_store::{open_store, EmbeddedChunk, StoreEngine},
    };

    use super::*;

    #[tokio::test]
    async fn test_store_retriever_returns_ranked_hits() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = open_store(StoreEngine::Lance, "secondary", tmp.path());
        let doc = Document::from_source("SOX".into(), "sox.txt");
        store
            .add(vec![
                EmbeddedChunk {
                    chunk: TextChunk::new(&doc, 0, "far".into()),
                    embedding: vec![0.0, 1.0],
                },
                EmbeddedChunk {
                    chunk: TextChunk::new(&doc, 1, "near".into()),
                    embedding: vec![1.0, 0.0],
                },
            ])
            .await
            .expect("add");

        let retriever = VectorStoreRetriever::new(store);
        let query = RetrievalQuery {
            text: "near",
            embedding: &[1.0, 0.0],
        };
        let hits = retriever.retrieve(&query, 6).await.expect("retrieve");

        assert_eq!(retriever.name(), "secondary");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.text, "near");
    }

    #[tokio::test]
    async fn test_missing_store_is_reported() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = open_store(StoreEngine::Surreal, "primary", &tmp.path().join("missing"));
        let retriever = VectorStoreRetriever::new(store);
        let query = RetrievalQuery {
            text: "q",
            embedding: &[1.0],
        };

        assert!(matches!(
            retriever.retrieve(&query, 6).await,
            Err(AppError::StoreNotFound(_))
        ));
    }
}
