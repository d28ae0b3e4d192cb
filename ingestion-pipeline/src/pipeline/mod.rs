
use std::{sync::Arc, time::Instant};

use common::{
    error::AppError,
    storage::{
        types::{document::Document, text_chunk::TextChunk},
        vector_store::{EmbeddedChunk, VectorStore},
    },
    utils::embedding::EmbeddingProvider,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::chunker::ChunkingConfig;

/// Source tag attached to text pushed through the external update path.
pub const EXTERNAL_UPDATE_SOURCE: &str = "mock_SEC_update";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
}

/// Chunks, embeds, and writes documents into the vector stores.
///
/// Regular ingestion writes every chunk to both stores; external updates
/// only reach the secondary store.
pub struct IngestionPipeline {
    embedding_provider: Arc<EmbeddingProvider>,
    primary: Arc<dyn VectorStore>,
    secondary: Arc<dyn VectorStore>,
    chunking: ChunkingConfig,
}

impl IngestionPipeline {
    pub fn new(
        embedding_provider: Arc<EmbeddingProvider>,
        primary: Arc<dyn VectorStore>,
        secondary: Arc<dyn VectorStore>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            embedding_provider,
            primary,
            secondary,
            chunking,
        }
    }

    pub fn chunking(&self) -> ChunkingConfig {
        self.chunking
    }

    #[tracing::instrument(skip_all, fields(documents = documents.len()))]
    pub async fn ingest_documents(&self, documents: Vec<Document>) -> Result<IngestReport, AppError> {
        if documents.is_empty() {
            return Err(AppError::Validation("no documents to ingest".into()));
        }
        let started = Instant::now();

        let chunks = self.split_all(&documents)?;
        let embedded = self.embed_chunks(chunks).await?;
        let chunk_count = embedded.len();

        // The secondary write follows the primary one; a failure in between
        // leaves the primary store ahead until the next ingestion.
        self.primary.add(embedded.clone()).await?;
        self.secondary.add(embedded).await?;

        info!(
            documents = documents.len(),
            chunks = chunk_count,
            primary = self.primary.name(),
            secondary = self.secondary.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Ingested documents into both stores"
        );

        Ok(IngestReport {
            documents: documents.len(),
            chunks: chunk_count,
        })
    }

    /// Adds externally supplied text to the secondary store only.
    #[tracing::instrument(skip_all, fields(chars = text.chars().count()))]
    pub async fn ingest_external_update(&self, text: &str) -> Result<usize, AppError> {
        if text.trim().is_empty() {
            return Err(AppError::Validation("update text is empty".into()));
        }

        let document = Document::from_source(text.to_string(), EXTERNAL_UPDATE_SOURCE);
        let chunks = self.chunking.split_document(&document);
        let embedded = self.embed_chunks(chunks).await?;
        let added = self.secondary.add(embedded).await?;

        info!(
            added_chunks = added,
            store = self.secondary.name(),
            "Applied external update"
        );
        Ok(added)
    }

    fn split_all(&self, documents: &[Document]) -> Result<Vec<TextChunk>, AppError> {
        let mut chunks = Vec::new();
        for document in documents {
            if document.text.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "document {} contains no text",
                    document.source().unwrap_or(&document.id)
                )));
            }
            let split = self.chunking.split_document(document);
            debug!(
                document_id = %document.id,
                source = document.source().unwrap_or("unknown"),
                chunks = split.len(),
                "Split document"
            );
            chunks.extend(split);
        }
        Ok(chunks)
    }

    async fn embed_chunks(&self, chunks: Vec<TextChunk>) -> Result<Vec<EmbeddedChunk>, AppError> {
        let texts = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.embedding_provider.embed_batch(texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(AppError::InternalError(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        Ok(chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
            .collect())
    }
}
