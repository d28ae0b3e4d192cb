use std::sync::Arc;

use common::{
    error::AppError,
    storage::{
        cache::cache_from_config,
        memory_log::AuditMemoryLog,
        vector_store::{open_store, StoreEngine, VectorStore},
    },
    utils::{config::AppConfig, embedding::EmbeddingProvider, llm_client::LlmClients},
};
use ingestion_pipeline::{ChunkingConfig, IngestionPipeline};
use retrieval_pipeline::{
    answer_retrieval::{chat_model_from_clients, AnswerSynthesizer, ChatModel},
    DefaultQueryServices, FusionRetriever, QueryPipeline,
};
use tracing::info;

pub const PRIMARY_STORE_NAME: &str = "primary";
pub const SECONDARY_STORE_NAME: &str = "secondary";

/// Process-scoped services shared by every handler.
#[derive(Clone)]
pub struct ApiState {
    pub config: AppConfig,
    pub ingestion: Arc<IngestionPipeline>,
    pub query: Arc<QueryPipeline>,
    pub memory: Arc<AuditMemoryLog>,
    pub primary: Arc<dyn VectorStore>,
    pub secondary: Arc<dyn VectorStore>,
}

impl ApiState {
    pub async fn new(config: &AppConfig) -> Result<Self, AppError> {
        let clients = LlmClients::from_config(config);
        info!(llm_provider = ?clients.provider(), "Language model clients configured");
        let embedding_provider = Arc::new(EmbeddingProvider::from_config(config, &clients));
        let chat_model = chat_model_from_clients(config, &clients);
        Self::build(config, embedding_provider, chat_model).await
    }

    /// Wires stores, cache, memory log and pipelines around the given providers.
    pub async fn build(
        config: &AppConfig,
        embedding_provider: Arc<EmbeddingProvider>,
        chat_model: Arc<dyn ChatModel>,
    ) -> Result<Self, AppError> {
        config.validate()?;

        let primary = open_store(
            StoreEngine::Surreal,
            PRIMARY_STORE_NAME,
            &config.primary_store_path(),
        );
        let secondary = open_store(
            StoreEngine::Lance,
            SECONDARY_STORE_NAME,
            &config.secondary_store_path(),
        );

        let ingestion = Arc::new(IngestionPipeline::new(
            Arc::clone(&embedding_provider),
            Arc::clone(&primary),
            Arc::clone(&secondary),
            ChunkingConfig::from_config(config)?,
        ));

        let cache = cache_from_config(config).await?;
        let memory = Arc::new(AuditMemoryLog::open(&config.memory_log_file()).await?);

        let retriever = FusionRetriever::from_stores(
            config,
            Arc::clone(&primary),
            Arc::clone(&secondary),
            Arc::clone(&embedding_provider),
        );
        let top_k = retriever.top_k();
        let services = Arc::new(DefaultQueryServices::new(
            retriever,
            AnswerSynthesizer::new(chat_model),
        ));
        let query = Arc::new(QueryPipeline::new(
            cache,
            services,
            Arc::clone(&memory),
            config.cache_ttl(),
        ));

        let chunking = ingestion.chunking();
        info!(
            primary = %primary.location().display(),
            secondary = %secondary.location().display(),
            memory_log = %memory.path().display(),
            embedding_backend = embedding_provider.backend_label(),
            embedding_dimension = embedding_provider.dimension(),
            chunk_window = chunking.window(),
            chunk_overlap = chunking.overlap(),
            top_k,
            "Application state initialized"
        );

        Ok(Self {
            config: config.clone(),
            ingestion,
            query,
            memory,
            primary,
            secondary,
        })
    }
}
