use std::sync::Arc;

use async_openai::{
    config::Config,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
    Client,
};
use async_trait::async_trait;
use common::{
    error::AppError,
    storage::types::Metadata,
    utils::{config::AppConfig, llm_client::LlmClients, retry::RetryPolicy},
};
use tracing::{debug, instrument};

use crate::RetrievedChunk;

pub const SYSTEM_PROMPT: &str = "You are an assistant for financial audit and compliance questions. \
Answer the question using only the provided context passages. \
If the context does not contain the answer, say that you don't know instead of guessing.";

/// Separator placed between chunk texts in the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AppError>;
}

/// Chat completions against an OpenAI-compatible endpoint, temperature 0.
pub struct OpenAIChatModel<C: Config> {
    client: Arc<Client<C>>,
    model: String,
    retry: RetryPolicy,
}

impl<C: Config> OpenAIChatModel<C> {
    pub fn new(client: Arc<Client<C>>, model: &str, retry: RetryPolicy) -> Self {
        Self {
            client,
            model: model.to_string(),
            retry,
        }
    }
}

#[async_trait]
impl<C: Config + 'static> ChatModel for OpenAIChatModel<C> {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AppError> {
        let request = create_chat_request(&self.model, system, user)?;
        let response = self
            .retry
            .run("chat_completion", || {
                let client = self.client.clone();
                let request = request.clone();
                async move { Ok(client.chat().create(request).await?) }
            })
            .await?;
        process_llm_response(response)
    }
}

pub fn chat_model_from_clients(config: &AppConfig, clients: &LlmClients) -> Arc<dyn ChatModel> {
    let retry = config.retry_policy();
    match clients {
        LlmClients::OpenAI(client) => Arc::new(OpenAIChatModel::new(
            client.clone(),
            &config.chat_model,
            retry,
        )),
        LlmClients::Azure { chat, .. } => Arc::new(OpenAIChatModel::new(
            chat.clone(),
            &config.chat_model,
            retry,
        )),
    }
}

pub fn create_chat_request(
    model: &str,
    system: &str,
    user_message: &str,
) -> Result<CreateChatCompletionRequest, OpenAIError> {
    CreateChatCompletionRequestArgs::default()
        .model(model)
        .temperature(0.0)
        .messages([
            ChatCompletionRequestSystemMessage::from(system).into(),
            ChatCompletionRequestUserMessage::from(user_message).into(),
        ])
        .build()
}

pub fn process_llm_response(response: CreateChatCompletionResponse) -> Result<String, AppError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AppError::Upstream("No content found in LLM response".into()))
}

/// Concatenates chunk texts in the given order. No length limit is applied.
pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|retrieved| retrieved.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

pub fn create_user_message(context: &str, query: &str) -> String {
    format!(
        r"
        Context Information:
        ==================
        {context}

        User Question:
        ==================
        {query}
        "
    )
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub content: String,
    /// Metadata of every chunk given to the model, in context order.
    pub sources: Vec<Metadata>,
}

/// "Stuff" synthesis: all retrieved chunks go into a single prompt.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    model: Arc<dyn ChatModel>,
}

impl AnswerSynthesizer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    #[instrument(skip_all, fields(chunks = chunks.len()))]
    pub async fn synthesize(
        &self,
        query: &str,
        chunks: &[RetrievedChunk],
    ) -> Result<Answer, AppError> {
        let context = build_context(chunks);
        let user_message = create_user_message(&context, query);
        debug!(context_chars = context.chars().count(), "Requesting answer");

        let content = self.model.complete(SYSTEM_PROMPT, &user_message).await?;

        Ok(Answer {
            content,
            sources: chunks
                .iter()
                .map(|retrieved| retrieved.chunk.metadata.clone())
                .collect(),
        })
    }
}
