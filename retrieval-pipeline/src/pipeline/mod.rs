
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{cache::QueryCache, memory_log::AuditMemoryLog, types::Metadata},
};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::{
    answer_retrieval::{Answer, AnswerSynthesizer},
    fusion::FusionRetriever,
    RetrievedChunk,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    Cache,
    Chain,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub source: AnswerSource,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Metadata>>,
}

/// The expensive half of answering: retrieval and synthesis.
#[async_trait]
pub trait QueryServices: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, AppError>;

    async fn synthesize(
        &self,
        query: &str,
        chunks: &[RetrievedChunk],
    ) -> Result<Answer, AppError>;
}

pub struct DefaultQueryServices {
    retriever: FusionRetriever,
    synthesizer: AnswerSynthesizer,
}

impl DefaultQueryServices {
    pub fn new(retriever: FusionRetriever, synthesizer: AnswerSynthesizer) -> Self {
        Self {
            retriever,
            synthesizer,
        }
    }
}

#[async_trait]
impl QueryServices for DefaultQueryServices {
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, AppError> {
        self.retriever.retrieve(query).await
    }

    async fn synthesize(
        &self,
        query: &str,
        chunks: &[RetrievedChunk],
    ) -> Result<Answer, AppError> {
        self.synthesizer.synthesize(query, chunks).await
    }
}

/// Cache lookup, then retrieval and synthesis on a miss, then cache and
/// memory log writes.
pub struct QueryPipeline {
    cache: Arc<dyn QueryCache>,
    services: Arc<dyn QueryServices>,
    memory: Arc<AuditMemoryLog>,
    cache_ttl: Duration,
}

impl QueryPipeline {
    pub fn new(
        cache: Arc<dyn QueryCache>,
        services: Arc<dyn QueryServices>,
        memory: Arc<AuditMemoryLog>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            services,
            memory,
            cache_ttl,
        }
    }

    /// Answers `raw_query` after trimming surrounding whitespace. The trimmed
    /// text is the exact cache key.
    #[instrument(skip_all)]
    pub async fn answer(&self, raw_query: &str) -> Result<QueryOutcome, AppError> {
        let query = raw_query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("query must not be empty".into()));
        }

        if let Some(answer) = self.cache.get(query).await? {
            info!("Answer served from cache");
            return Ok(QueryOutcome {
                source: AnswerSource::Cache,
                answer,
                sources: None,
            });
        }

        let chunks = self.services.retrieve(query).await?;
        let answer = self.services.synthesize(query, &chunks).await?;

        self.cache.put(query, &answer.content, self.cache_ttl).await?;
        if let Some(id) = self.memory.record(query).await? {
            debug!(%id, "Query added to memory log");
        }

        info!(
            chunks = chunks.len(),
            sources = answer.sources.len(),
            "Answer generated"
        );
        Ok(QueryOutcome {
            source: AnswerSource::Chain,
            answer: answer.content,
            sources: Some(answer.sources),
        })
    }
}
