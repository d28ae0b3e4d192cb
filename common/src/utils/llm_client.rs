use std::sync::Arc;

use async_openai::{
    config::{AzureConfig, OpenAIConfig},
    Client,
};

use super::config::{AppConfig, LlmProvider};

/// OpenAI-compatible clients shared by the embedding provider and the chat model.
///
/// Azure binds the deployment into the client, so chat and embeddings need
/// separate clients there.
#[derive(Clone)]
pub enum LlmClients {
    OpenAI(Arc<Client<OpenAIConfig>>),
    Azure {
        chat: Arc<Client<AzureConfig>>,
        embeddings: Arc<Client<AzureConfig>>,
    },
}

impl LlmClients {
    pub fn from_config(config: &AppConfig) -> Self {
        match config.llm_provider {
            LlmProvider::OpenAI => Self::OpenAI(Arc::new(Client::with_config(
                OpenAIConfig::new()
                    .with_api_key(&config.openai_api_key)
                    .with_api_base(&config.openai_base_url),
            ))),
            LlmProvider::Azure => {
                let chat_deployment = config
                    .azure_chat_deployment
                    .clone()
                    .unwrap_or_else(|| config.chat_model.clone());
                let embedding_deployment = config
                    .azure_embedding_deployment
                    .clone()
                    .unwrap_or_else(|| config.embedding_model.clone());
                Self::Azure {
                    chat: Arc::new(Client::with_config(azure_config(config, &chat_deployment))),
                    embeddings: Arc::new(Client::with_config(azure_config(
                        config,
                        &embedding_deployment,
                    ))),
                }
            }
        }
    }

    pub const fn provider(&self) -> LlmProvider {
        match self {
            Self::OpenAI(_) => LlmProvider::OpenAI,
            Self::Azure { .. } => LlmProvider::Azure,
        }
    }
}

fn azure_config(config: &AppConfig, deployment: &str) -> AzureConfig {
    AzureConfig::new()
        .with_api_base(&config.openai_base_url)
        .with_api_key(&config.openai_api_key)
        .with_api_version(&config.azure_api_version)
        .with_deployment_id(deployment)
}
