//! Anthropic messages API backend.
//!
//! Anthropic takes the system prompt as a top-level field rather than as a
//! message, so system entries are lifted out of the conversation before the
//! request is sent.

use super::sse::{self, SseAction, SseEvent};
use super::{ApiErrorDetail, Provider, check_request, check_status, elapsed_ms, request_body};
use crate::llm::{GenerationParameters, GenerationResult, Message, Role, Usage};
use crate::{Error, Result, TextStream};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::debug;

/// Registry name of the Anthropic adapter.
pub const ANTHROPIC: &str = "anthropic";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// The messages API requires `max_tokens`; this is used when the caller
/// leaves it unset.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

const MODELS: [&str; 3] = [
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
];

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<&'a [String]>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, PartialEq, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    content: Vec<ApiResponseBlock>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiStreamEvent {
    ContentBlockDelta {
        delta: ApiDelta,
    },
    MessageStop,
    Error {
        error: ApiErrorDetail,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating an Anthropic backend.
#[derive(Debug, Clone)]
pub struct AnthropicProviderBuilder {
    api_key: String,
    base_url: String,
    max_tokens: u32,
}

impl AnthropicProviderBuilder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Point at a different API root (e.g. a proxy).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `max_tokens` sent when the request parameters leave it unset.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn build(self) -> Result<AnthropicProvider> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config("anthropic api key is empty".into()));
        }
        let mut key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| Error::Config("anthropic api key contains invalid characters".into()))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", key);
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to build http client: {e}")))?;
        let endpoint = format!("{}/messages", self.base_url.trim_end_matches('/'));
        debug!(provider = ANTHROPIC, endpoint = %endpoint, "initialized provider");

        Ok(AnthropicProvider {
            client,
            endpoint,
            max_tokens: self.max_tokens,
        })
    }
}

/// Anthropic API backend.
pub struct AnthropicProvider {
    client: reqwest::Client,
    endpoint: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    pub fn builder(api_key: impl Into<String>) -> AnthropicProviderBuilder {
        AnthropicProviderBuilder::new(api_key)
    }

    /// Create a backend against the public endpoint with default settings.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder(api_key).build()
    }

    fn build_request<'a>(
        &self,
        messages: &'a [Message],
        model: &'a str,
        parameters: &'a GenerationParameters,
        stream: bool,
    ) -> ApiRequest<'a> {
        let (system, messages) = split_system(messages);
        ApiRequest {
            model,
            max_tokens: parameters.max_tokens.unwrap_or(self.max_tokens),
            messages,
            system,
            temperature: parameters.temperature,
            top_p: parameters.top_p,
            stop_sequences: parameters.stop_sequences.as_deref(),
            stream,
        }
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::upstream(ANTHROPIC, e))?;
        check_status(ANTHROPIC, response).await
    }
}

impl std::fmt::Display for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "anthropic({}, max_tokens={})", self.endpoint, self.max_tokens)
    }
}

/// Lift system entries out of the conversation. Their contents are joined
/// with newlines in order; an empty join means no system prompt.
fn split_system(messages: &[Message]) -> (Option<String>, Vec<ApiMessage<'_>>) {
    let system = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let rest = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| ApiMessage {
            role: m.role.as_str(),
            content: &m.content,
        })
        .collect();

    ((!system.is_empty()).then_some(system), rest)
}

fn normalize(raw: ApiResponse, requested_model: &str, elapsed_ms: f64) -> GenerationResult {
    let text = raw
        .content
        .into_iter()
        .filter_map(|block| match block {
            ApiResponseBlock::Text { text } => Some(text),
            ApiResponseBlock::Unknown => None,
        })
        .collect::<String>();
    let usage = raw.usage.map_or_else(Usage::default, |u| {
        Usage::new(u.input_tokens, u.output_tokens)
    });

    GenerationResult {
        text,
        usage,
        model: raw.model.unwrap_or_else(|| requested_model.to_string()),
        provider: ANTHROPIC.to_string(),
        elapsed_ms,
    }
}

fn stream_event(event: &SseEvent) -> Result<SseAction> {
    let data = event.data.trim();
    if data.is_empty() {
        return Ok(SseAction::Skip);
    }
    let parsed: ApiStreamEvent = serde_json::from_str(data)
        .map_err(|e| Error::upstream(ANTHROPIC, format!("invalid stream event: {e}")))?;
    match parsed {
        ApiStreamEvent::ContentBlockDelta {
            delta: ApiDelta::TextDelta { text },
        } => Ok(SseAction::Emit(text)),
        ApiStreamEvent::MessageStop => Ok(SseAction::Done),
        ApiStreamEvent::Error { error } => Err(Error::upstream(ANTHROPIC, error.message)),
        ApiStreamEvent::ContentBlockDelta { .. } | ApiStreamEvent::Other => Ok(SseAction::Skip),
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        ANTHROPIC
    }

    fn list_models(&self) -> Vec<String> {
        MODELS.iter().map(ToString::to_string).collect()
    }

    async fn generate(
        &self,
        messages: &[Message],
        model: &str,
        parameters: &GenerationParameters,
    ) -> Result<GenerationResult> {
        check_request(ANTHROPIC, messages, model)?;
        let body = request_body(
            ANTHROPIC,
            &self.build_request(messages, model, parameters, false),
            &parameters.extra,
        )?;

        debug!(
            provider = ANTHROPIC,
            model,
            messages = messages.len(),
            "sending completion request"
        );
        let started = Instant::now();
        let response = self.post(&body).await?;
        let raw: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream(ANTHROPIC, format!("invalid response: {e}")))?;
        let result = normalize(raw, model, elapsed_ms(started));

        debug!(
            provider = ANTHROPIC,
            model = %result.model,
            tokens = result.usage.total_tokens,
            elapsed_ms = result.elapsed_ms,
            "received completion"
        );
        Ok(result)
    }

    async fn stream_generate(
        &self,
        messages: &[Message],
        model: &str,
        parameters: &GenerationParameters,
    ) -> Result<TextStream> {
        check_request(ANTHROPIC, messages, model)?;
        let body = request_body(
            ANTHROPIC,
            &self.build_request(messages, model, parameters, true),
            &parameters.extra,
        )?;

        debug!(
            provider = ANTHROPIC,
            model,
            messages = messages.len(),
            "opening completion stream"
        );
        let response = self.post(&body).await?;
        Ok(sse::text_stream(ANTHROPIC, response.bytes_stream(), stream_event))
    }
}
