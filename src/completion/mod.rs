//! Abstractions for answer generation via chat completion providers.
//!
//! The completion provider is optional; when none is configured the answer
//! composer falls back to deterministic extractive answers. The OpenAI-backed
//! client mirrors the embedding adapter by issuing HTTP requests directly to
//! the provider.

use crate::config::{CompletionProvider, get_config};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Generation temperature; kept low so answers stay close to the context.
const TEMPERATURE: f64 = 0.2;

/// Errors surfaced while attempting answer generation.
#[derive(Debug, Error)]
pub enum CompletionClientError {
    /// Provider was explicitly disabled or unreachable.
    #[error("Completion provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Role of one message in a completion conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instruction framing for the generator.
    System,
    /// Caller-authored turn.
    User,
    /// Generator-authored turn.
    Assistant,
}

/// One ordered message passed to the completion provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Build an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Interface implemented by completion backends.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate text from an ordered message sequence.
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, CompletionClientError>;
}

/// Build a completion client based on configuration, when one is enabled.
pub fn get_completion_client() -> Option<Box<dyn CompletionClient + Send + Sync>> {
    let config = get_config();
    match config.completion_provider {
        CompletionProvider::None => None,
        CompletionProvider::OpenAI => Some(Box::new(OpenAiCompletionClient::from_config())),
    }
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiCompletionClient {
    pub(crate) http: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) model: String,
}

impl OpenAiCompletionClient {
    /// Build a client from the loaded configuration.
    pub fn from_config() -> Self {
        let config = get_config();
        let http = Client::builder()
            .user_agent("askdocs/completions")
            .build()
            .expect("Failed to construct reqwest::Client for completions");
        Self {
            http,
            base_url: config.openai_base_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.chat_model.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, CompletionClientError> {
        let payload = json!({
            "model": self.model,
            "messages": messages,
            "temperature": TEMPERATURE,
        });

        let mut request = self.http.post(self.endpoint()).json(&payload);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|error| {
            CompletionClientError::ProviderUnavailable(format!(
                "failed to reach completion provider at {}: {error}",
                self.base_url
            ))
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(CompletionClientError::ProviderUnavailable(format!(
                "completion endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionClientError::GenerationFailed(format!(
                "completion provider returned {status}: {body}"
            )));
        }

        let body: CompletionResponse = response.json().await.map_err(|error| {
            CompletionClientError::InvalidResponse(format!(
                "failed to decode completion response: {error}"
            ))
        })?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CompletionClientError::InvalidResponse("no choices returned".into()))?;

        Ok(choice.message.content.trim().to_string())
    }
}
