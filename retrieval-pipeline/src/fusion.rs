use std::{sync::Arc, time::Instant};

use common::{
    error::AppError,
    storage::vector_store::VectorStore,
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};
use futures::future::try_join_all;
use tracing::{info, instrument};

use crate::{
    retriever::{RetrievalQuery, Retriever, VectorStoreRetriever},
    scoring::{weighted_rank_fusion, RankedList, RrfConfig},
    RetrievedChunk,
};

/// A retriever taking part in fusion together with its static weight.
#[derive(Clone)]
pub struct WeightedRetriever {
    pub retriever: Arc<dyn Retriever>,
    pub weight: f32,
}

/// Queries every retriever with one shared embedding and fuses their rankings.
///
/// Any retriever failing fails the whole retrieval; there is no fallback to
/// the remaining sources.
pub struct FusionRetriever {
    sources: Vec<WeightedRetriever>,
    embedding_provider: Arc<EmbeddingProvider>,
    top_k: usize,
    rrf: RrfConfig,
}

impl FusionRetriever {
    pub fn new(
        sources: Vec<WeightedRetriever>,
        embedding_provider: Arc<EmbeddingProvider>,
        top_k: usize,
    ) -> Self {
        Self {
            sources,
            embedding_provider,
            top_k,
            rrf: RrfConfig::default(),
        }
    }

    /// Primary store first, so it wins ties.
    pub fn from_stores(
        config: &AppConfig,
        primary: Arc<dyn VectorStore>,
        secondary: Arc<dyn VectorStore>,
        embedding_provider: Arc<EmbeddingProvider>,
    ) -> Self {
        Self::new(
            vec![
                WeightedRetriever {
                    retriever: Arc::new(VectorStoreRetriever::new(primary)),
                    weight: config.primary_weight,
                },
                WeightedRetriever {
                    retriever: Arc::new(VectorStoreRetriever::new(secondary)),
                    weight: config.secondary_weight,
                },
            ],
            embedding_provider,
            config.retrieval_top_k,
        )
    }

    pub const fn top_k(&self) -> usize {
        self.top_k
    }

    #[instrument(skip_all, fields(top_k = self.top_k, sources = self.sources.len()))]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, AppError> {
        let started = Instant::now();
        let embedding = self.embedding_provider.embed(query).await?;
        let retrieval_query = RetrievalQuery {
            text: query,
            embedding: &embedding,
        };

        let ranked = try_join_all(self.sources.iter().map(|source| async {
            let hits = source
                .retriever
                .retrieve(&retrieval_query, self.top_k)
                .await?;
            Ok::<_, AppError>(RankedList {
                weight: source.weight,
                hits,
            })
        }))
        .await?;

        let per_source: Vec<usize> = ranked.iter().map(|list| list.hits.len()).collect();
        let fused = weighted_rank_fusion(ranked, self.rrf);

        info!(
            ?per_source,
            fused = fused.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fusion retrieval finished"
        );
        Ok(fused)
    }
}
