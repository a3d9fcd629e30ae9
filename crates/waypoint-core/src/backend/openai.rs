//! OpenAI-compatible chat completions backend.
//!
//! Posts to `<endpoint>` (typically `https://api.openai.com/v1/chat/completions`)
//! with `response_format: {"type": "json_object"}` when JSON mode is requested.
//! Any server speaking the same wire format works.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::trait_def::ChatBackend;
use super::types::{BackendError, ChatMessage, ChatRequest};
use crate::error::{EXCERPT_CHARS, truncate_chars};

/// Connection settings for [`OpenAiChatBackend`].
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Upper bound on establishing a connection. The overall wait is
    /// bounded by the invoker, not here.
    pub connect_timeout: Duration,
}

impl OpenAiConfig {
    pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ENDPOINT, None)
    }
}

/// HTTP backend for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiChatBackend {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl std::fmt::Debug for OpenAiChatBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatBackend")
            .field("endpoint", &self.config.endpoint)
            .field("api_key", &self.config.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl OpenAiChatBackend {
    pub fn new(config: OpenAiConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn headers(&self) -> Result<HeaderMap, BackendError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| BackendError::Config(format!("api key is not a valid header: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
}

fn request_body(request: &ChatRequest) -> WireRequest<'_> {
    WireRequest {
        model: &request.model,
        messages: &request.messages,
        temperature: request.temperature,
        response_format: request
            .json_mode
            .then_some(ResponseFormat { kind: "json_object" }),
    }
}

/// A non-success response, keeping at most [`EXCERPT_CHARS`] of its body.
fn status_error(status: u16, body: &str) -> BackendError {
    BackendError::Status {
        status,
        body: truncate_chars(body, EXCERPT_CHARS),
    }
}

/// Pull the first choice's content out of a response body.
///
/// A response with no choices, or a `null` content, yields `None`.
fn extract_content(body: &str) -> Result<Option<String>, BackendError> {
    let parsed: WireResponse =
        serde_json::from_str(body).map_err(|e| BackendError::Decode(e.to_string()))?;
    Ok(parsed.choices.into_iter().next().and_then(|c| c.message.content))
}

#[async_trait]
impl ChatBackend for OpenAiChatBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<Option<String>, BackendError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .headers(self.headers()?)
            .json(&request_body(request))
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        debug!(status = status.as_u16(), body_len = body.len(), "chat completion response");

        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }
        extract_content(&body)
    }
}
