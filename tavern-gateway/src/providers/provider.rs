//! Provider trait for abstracting completion endpoints.

use serde::{Deserialize, Serialize};
use tavern_core::{GenerationSettings, Message, MessageRole};

/// Message as it travels on the wire: role and content only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: MessageRole,
    pub content: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// One completion request. Serializes to the JSON request body; the
/// credential travels in the authorization header instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    #[serde(skip)]
    pub credential: String,
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub context_window: u32,
    pub repetition_penalty: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub top_p: f64,
}

impl CompletionRequest {
    /// Build a request carrying the full transcript.
    pub fn new(
        transcript: &[Message],
        settings: &GenerationSettings,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            credential: credential.into(),
            model: settings.model_id.clone(),
            messages: transcript.iter().map(WireMessage::from).collect(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            context_window: settings.context_window,
            repetition_penalty: settings.repetition_penalty,
            frequency_penalty: settings.frequency_penalty,
            presence_penalty: settings.presence_penalty,
            top_p: settings.top_p,
        }
    }
}

/// Token usage reported by the endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A well-formed completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Non-empty assistant content of the first choice.
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<ProviderUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Provider error types
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },
    #[error("No content in response")]
    NoContent,
    #[error("Credential cannot be sent as a header")]
    InvalidCredential,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
}

impl ProviderError {
    /// Transport failures versus responses that arrived but were unusable.
    pub fn is_malformed_response(&self) -> bool {
        matches!(
            self,
            ProviderError::NoContent
                | ProviderError::InvalidFormat(_)
                | ProviderError::Serialization(_)
        )
    }
}

/// A remote completion endpoint.
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name
    fn name(&self) -> &str;

    /// Issue exactly one request and return the first choice's content.
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError>;
}
