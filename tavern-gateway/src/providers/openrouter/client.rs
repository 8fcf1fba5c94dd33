//! OpenRouter API client with OpenAI-compatible format.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::providers::provider::{
    CompletionProvider, CompletionRequest, CompletionResponse, ProviderError, ProviderUsage,
};
use crate::providers::query_dump::QueryDump;

/// Default API base.
pub const DEFAULT_BASE_URL: &str = tavern_core::config::DEFAULT_BASE_URL;

/// OpenRouter API client
#[derive(Clone)]
pub struct OpenRouterClient {
    http_client: reqwest::Client,
    base_url: String,
    http_referer: Option<String>,
    app_name: Option<String>,
    dump_queries: bool,
}

/// OpenAI-compatible chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

/// Choice in the response
#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Usage information
#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl OpenRouterClient {
    /// Create a new OpenRouter client
    pub fn new(
        base_url: Option<String>,
        http_referer: Option<String>,
        app_name: Option<String>,
    ) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let base_url = base_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            http_referer,
            app_name,
            dump_queries: false,
        })
    }

    /// Enable or disable debug query logging
    pub fn with_dump_queries(mut self, enabled: bool) -> Self {
        self.dump_queries = enabled;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Build request headers with the bearer credential and optional attribution
    fn build_headers(&self, credential: &str) -> Result<HeaderMap, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = format!("Bearer {}", credential);
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|_| ProviderError::InvalidCredential)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        // Optional headers for OpenRouter rankings
        if let Some(ref referer) = self.http_referer
            && let Ok(value) = HeaderValue::from_str(referer)
        {
            headers.insert("HTTP-Referer", value);
        }
        if let Some(ref app_name) = self.app_name
            && let Ok(value) = HeaderValue::from_str(app_name)
        {
            headers.insert("X-Title", value);
        }

        Ok(headers)
    }

    /// Extract the first choice's content, or fail as malformed.
    fn convert_response(response: ChatCompletionsResponse) -> Result<CompletionResponse, ProviderError> {
        let choice = response.choices.into_iter().next().ok_or(ProviderError::NoContent)?;
        let content = choice
            .message
            .and_then(|m| m.content)
            .filter(|text| !text.is_empty())
            .ok_or(ProviderError::NoContent)?;

        Ok(CompletionResponse {
            id: response.id,
            model: response.model,
            content,
            usage: response.usage.map(|u| ProviderUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
            finish_reason: choice.finish_reason,
        })
    }
}

#[async_trait::async_trait]
impl CompletionProvider for OpenRouterClient {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let headers = self.build_headers(&request.credential)?;

        let dump = if self.dump_queries
            && let Ok(val) = serde_json::to_value(request)
        {
            QueryDump::request(self.name(), &request.model, &val).await
        } else {
            None
        };

        debug!(
            "POST {} (model: {}, {} messages)",
            self.completions_url(),
            request.model,
            request.messages.len()
        );

        let response = self
            .http_client
            .post(self.completions_url())
            .headers(headers)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // The body is kept for the log only.
            let error_text = response.text().await.unwrap_or_default();
            warn!("Completion endpoint returned {}", status);
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: preview(&error_text).to_string(),
            });
        }

        let response_text = response.text().await?;

        if let Some(dump) = &dump
            && let Ok(val) = serde_json::from_str::<Value>(&response_text)
        {
            dump.response(&val).await;
        }

        let completions_response: ChatCompletionsResponse = serde_json::from_str(&response_text)
            .map_err(|e| {
                ProviderError::InvalidFormat(format!(
                    "Failed to parse completion response: {e}\nBody preview: {}",
                    preview(&response_text)
                ))
            })?;

        Self::convert_response(completions_response)
    }
}

fn preview(text: &str) -> &str {
    if text.len() > 500 {
        &text[..text.floor_char_boundary(500)]
    } else {
        text
    }
}
