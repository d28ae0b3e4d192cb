use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::Arc,
};

use anyhow::anyhow;
use async_openai::{
    config::{AzureConfig, Config, OpenAIConfig},
    types::CreateEmbeddingRequestArgs,
    Client,
};
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::AppError,
    utils::{config::AppConfig, llm_client::LlmClients, retry::RetryPolicy},
};

/// Upper bound on inputs per embeddings request.
const EMBEDDING_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    OpenAI,
    Hashed,
}

impl std::str::FromStr for EmbeddingBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" | "azure" => Ok(Self::OpenAI),
            "hashed" => Ok(Self::Hashed),
            other => Err(anyhow!(
                "unknown embedding backend '{other}'. Expected 'openai' or 'hashed'."
            )),
        }
    }
}

#[derive(Clone)]
pub struct EmbeddingProvider {
    inner: EmbeddingInner,
    retry: RetryPolicy,
}

#[derive(Clone)]
enum EmbeddingInner {
    OpenAI {
        client: Arc<Client<OpenAIConfig>>,
        model: String,
        dimensions: u32,
    },
    Azure {
        client: Arc<Client<AzureConfig>>,
        model: String,
        dimensions: u32,
    },
    Hashed {
        dimension: usize,
    },
}

impl EmbeddingProvider {
    pub fn from_config(config: &AppConfig, clients: &LlmClients) -> Self {
        let retry = config.retry_policy();
        let inner = match (config.embedding_backend, clients) {
            (EmbeddingBackend::Hashed, _) => EmbeddingInner::Hashed {
                dimension: (config.embedding_dimensions as usize).max(1),
            },
            (EmbeddingBackend::OpenAI, LlmClients::OpenAI(client)) => EmbeddingInner::OpenAI {
                client: client.clone(),
                model: config.embedding_model.clone(),
                dimensions: config.embedding_dimensions,
            },
            (EmbeddingBackend::OpenAI, LlmClients::Azure { embeddings, .. }) => {
                EmbeddingInner::Azure {
                    client: embeddings.clone(),
                    model: config.embedding_model.clone(),
                    dimensions: config.embedding_dimensions,
                }
            }
        };
        Self { inner, retry }
    }

    pub fn new_hashed(dimension: usize) -> Self {
        Self {
            inner: EmbeddingInner::Hashed {
                dimension: dimension.max(1),
            },
            retry: RetryPolicy::default(),
        }
    }

    pub fn backend_label(&self) -> &'static str {
        match self.inner {
            EmbeddingInner::Hashed { .. } => "hashed",
            EmbeddingInner::OpenAI { .. } => "openai",
            EmbeddingInner::Azure { .. } => "azure",
        }
    }

    pub fn dimension(&self) -> usize {
        match &self.inner {
            EmbeddingInner::Hashed { dimension } => *dimension,
            EmbeddingInner::OpenAI { dimensions, .. } | EmbeddingInner::Azure { dimensions, .. } => {
                *dimensions as usize
            }
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        self.embed_batch(vec![text.to_owned()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Upstream("No embedding data received".into()))
    }

    /// Embeds `texts` in order, splitting into provider-sized requests.
    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, AppError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if let EmbeddingInner::Hashed { dimension } = &self.inner {
            return Ok(texts
                .iter()
                .map(|text| hashed_embedding(text, *dimension))
                .collect());
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBEDDING_BATCH_SIZE) {
            let vectors = self
                .retry
                .run("embedding", || self.request(batch.to_vec()))
                .await?;
            if vectors.len() != batch.len() {
                return Err(AppError::Upstream(format!(
                    "embedding provider returned {} vectors for {} inputs",
                    vectors.len(),
                    batch.len()
                )));
            }
            embeddings.extend(vectors);
        }

        debug!(
            count = embeddings.len(),
            backend = self.backend_label(),
            "Generated embeddings"
        );

        Ok(embeddings)
    }

    async fn request(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, AppError> {
        match &self.inner {
            EmbeddingInner::OpenAI {
                client,
                model,
                dimensions,
            } => request_embeddings(client, model, *dimensions, input).await,
            EmbeddingInner::Azure {
                client,
                model,
                dimensions,
            } => request_embeddings(client, model, *dimensions, input).await,
            EmbeddingInner::Hashed { dimension } => Ok(input
                .iter()
                .map(|text| hashed_embedding(text, *dimension))
                .collect()),
        }
    }
}

async fn request_embeddings<C: Config>(
    client: &Client<C>,
    model: &str,
    dimensions: u32,
    input: Vec<String>,
) -> Result<Vec<Vec<f32>>, AppError> {
    let request = CreateEmbeddingRequestArgs::default()
        .model(model)
        .input(input)
        .dimensions(dimensions)
        .build()?;

    let response = client.embeddings().create(request).await?;

    let mut data = response.data;
    data.sort_by_key(|item| item.index);
    Ok(data.into_iter().map(|item| item.embedding).collect())
}

// Helper functions for hashed embeddings
fn hashed_embedding(text: &str, dimension: usize) -> Vec<f32> {
    let dim = dimension.max(1);
    let mut vector = vec![0.0f32; dim];
    if text.is_empty() {
        return vector;
    }

    let mut token_count = 0f32;
    for token in tokens(text) {
        token_count += 1.0;
        let idx = bucket(&token, dim);
        if let Some(slot) = vector.get_mut(idx) {
            *slot += 1.0;
        }
    }

    if token_count == 0.0 {
        return vector;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }

    vector
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
}

fn bucket(token: &str, dimension: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() as usize) % dimension
}
