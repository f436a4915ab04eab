use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::message::{Role, Turn};

/// Role of a message in a model request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One entry of the ordered message list sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        match turn.role() {
            Role::User => ChatMessage::user(turn.text()),
            Role::Assistant => ChatMessage::assistant(turn.text()),
        }
    }
}

/// The model could not produce a usable reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelInvocationError {
    #[error("Model request failed: {0}")]
    Request(String),
    #[error("Model returned no usable content")]
    EmptyResponse,
}

impl From<OpenAIError> for ModelInvocationError {
    fn from(err: OpenAIError) -> Self {
        ModelInvocationError::Request(err.to_string())
    }
}

/// Black-box access to a chat model: ordered messages in, generated text out.
///
/// Transport, authentication, retries and timeouts all belong to the implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String, ModelInvocationError>;
}

/// A `ModelGateway` for any OpenAI-compatible chat completions API (OpenAI, Gemini's
/// compatibility layer, a local Ollama server).
pub struct OpenAICompatibleGateway {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleGateway {
    /// Creates a new gateway.
    ///
    /// # Arguments
    ///
    /// * `config` - API key and base URL of the service.
    /// * `model` - The model identifier to request completions from (e.g., "llama3").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }

    fn to_request_messages(
        messages: &[ChatMessage],
    ) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
        messages
            .iter()
            .map(|msg| -> Result<ChatCompletionRequestMessage, OpenAIError> {
                Ok(match msg.role {
                    ChatRole::System => ChatCompletionRequestSystemMessageArgs::default()
                        .content(msg.content.clone())
                        .build()?
                        .into(),
                    ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
                        .content(msg.content.clone())
                        .build()?
                        .into(),
                    ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                        .content(msg.content.clone())
                        .build()?
                        .into(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl ModelGateway for OpenAICompatibleGateway {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String, ModelInvocationError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(Self::to_request_messages(messages)?)
            .build()?;

        debug!(model = %self.model, messages = messages.len(), "Sending chat completion request");
        let response: CreateChatCompletionResponse = self.client.chat().create(request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ModelInvocationError::EmptyResponse)
    }
}
