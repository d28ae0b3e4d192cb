use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Store not found: {0}")]
    StoreNotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("Vector table error: {0}")]
    VectorTable(#[from] lancedb::Error),
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),
    #[error("Upstream service error: {0}")]
    Upstream(String),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Errors worth another attempt against an external service.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Upstream(_) | Self::Cache(_) | Self::Io(_) => true,
            Self::OpenAI(err) => !matches!(err, OpenAIError::InvalidArgument(_)),
            _ => false,
        }
    }

    /// Whether the failure originated in an external collaborator
    /// (embedding provider, language model, cache backend).
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::OpenAI(_) | Self::Cache(_))
    }
}
