use std::{path::PathBuf, time::Duration};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::{error::AppError, utils::embedding::EmbeddingBackend, utils::retry::RetryPolicy};

/// Longest cache lifetime accepted, one year.
pub const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Clone, Copy, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Azure,
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default)]
    pub llm_provider: LlmProvider,
    #[serde(default = "default_azure_api_version")]
    pub azure_api_version: String,
    #[serde(default)]
    pub azure_chat_deployment: Option<String>,
    #[serde(default)]
    pub azure_embedding_deployment: Option<String>,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default)]
    pub embedding_backend: EmbeddingBackend,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub primary_store_dir: Option<String>,
    #[serde(default)]
    pub secondary_store_dir: Option<String>,
    #[serde(default)]
    pub memory_log_path: Option<String>,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,
    #[serde(default = "default_primary_weight")]
    pub primary_weight: f32,
    #[serde(default = "default_secondary_weight")]
    pub secondary_weight: f32,
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
    #[serde(default = "default_upstream_max_attempts")]
    pub upstream_max_attempts: usize,
    #[serde(default = "default_ingest_max_body_bytes")]
    pub ingest_max_body_bytes: usize,
    #[serde(default = "default_ingest_max_files")]
    pub ingest_max_files: usize,
    #[serde(default = "default_update_max_text_bytes")]
    pub update_max_text_bytes: usize,
    #[serde(default = "default_http_host")]
    pub http_host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_azure_api_version() -> String {
    "2024-02-15-preview".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}

const fn default_embedding_dimensions() -> u32 {
    1536
}

fn default_data_dir() -> String {
    "./data".to_string()
}

const fn default_cache_ttl_secs() -> u64 {
    3600
}

const fn default_chunk_size() -> usize {
    1000
}

const fn default_chunk_overlap() -> usize {
    200
}

const fn default_retrieval_top_k() -> usize {
    6
}

const fn default_primary_weight() -> f32 {
    0.6
}

const fn default_secondary_weight() -> f32 {
    0.4
}

const fn default_upstream_timeout_secs() -> u64 {
    60
}

const fn default_upstream_max_attempts() -> usize {
    3
}

const fn default_ingest_max_body_bytes() -> usize {
    20 * 1024 * 1024
}

const fn default_ingest_max_files() -> usize {
    16
}

const fn default_update_max_text_bytes() -> usize {
    1024 * 1024
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_http_port() -> u16 {
    8000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: default_base_url(),
            llm_provider: LlmProvider::default(),
            azure_api_version: default_azure_api_version(),
            azure_chat_deployment: None,
            azure_embedding_deployment: None,
            chat_model: default_chat_model(),
            embedding_backend: EmbeddingBackend::default(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            data_dir: default_data_dir(),
            primary_store_dir: None,
            secondary_store_dir: None,
            memory_log_path: None,
            redis_url: None,
            cache_ttl_secs: default_cache_ttl_secs(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            retrieval_top_k: default_retrieval_top_k(),
            primary_weight: default_primary_weight(),
            secondary_weight: default_secondary_weight(),
            upstream_timeout_secs: default_upstream_timeout_secs(),
            upstream_max_attempts: default_upstream_max_attempts(),
            ingest_max_body_bytes: default_ingest_max_body_bytes(),
            ingest_max_files: default_ingest_max_files(),
            update_max_text_bytes: default_update_max_text_bytes(),
            http_host: default_http_host(),
            http_port: default_http_port(),
        }
    }
}

impl AppConfig {
    pub fn primary_store_path(&self) -> PathBuf {
        self.primary_store_dir.as_ref().map_or_else(
            || PathBuf::from(&self.data_dir).join("surreal_store"),
            PathBuf::from,
        )
    }

    pub fn secondary_store_path(&self) -> PathBuf {
        self.secondary_store_dir.as_ref().map_or_else(
            || PathBuf::from(&self.data_dir).join("lance_store"),
            PathBuf::from,
        )
    }

    pub fn memory_log_file(&self) -> PathBuf {
        self.memory_log_path.as_ref().map_or_else(
            || PathBuf::from(&self.data_dir).join("sox_memory.json"),
            PathBuf::from,
        )
    }

    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(self.upstream_timeout_secs),
            max_attempts: self.upstream_max_attempts,
            ..RetryPolicy::default()
        }
    }

    /// Rejects combinations the pipelines cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.chunk_size == 0 {
            return Err(AppError::Validation("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Validation(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.retrieval_top_k == 0 {
            return Err(AppError::Validation(
                "retrieval_top_k must be positive".into(),
            ));
        }
        for (label, weight) in [
            ("primary_weight", self.primary_weight),
            ("secondary_weight", self.secondary_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(AppError::Validation(format!(
                    "{label} must be a finite, non-negative number"
                )));
            }
        }
        if self.cache_ttl_secs == 0 || self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(AppError::Validation(format!(
                "cache_ttl_secs must be between 1 and {MAX_CACHE_TTL_SECS}"
            )));
        }
        if self.upstream_max_attempts == 0 {
            return Err(AppError::Validation(
                "upstream_max_attempts must be at least 1".into(),
            ));
        }
        if self.embedding_dimensions == 0 {
            return Err(AppError::Validation(
                "embedding_dimensions must be positive".into(),
            ));
        }
        Ok(())
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
