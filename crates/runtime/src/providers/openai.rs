//! OpenAI chat completions backend.
//!
//! System prompts travel inline as ordinary `system` messages.

use super::sse::{self, SseAction, SseEvent};
use super::{ApiErrorDetail, Provider, check_request, check_status, elapsed_ms, request_body};
use crate::llm::{GenerationParameters, GenerationResult, Message, Usage};
use crate::{Error, Result, TextStream};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::debug;

/// Registry name of the OpenAI adapter.
pub const OPENAI: &str = "openai";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const MODELS: [&str; 4] = ["gpt-4", "gpt-4-turbo", "gpt-3.5-turbo", "gpt-3.5-turbo-16k"];

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiStreamChunk {
    #[serde(default)]
    choices: Vec<ApiStreamChoice>,
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiStreamChoice {
    #[serde(default)]
    delta: ApiDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ApiDelta {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI API backend.
pub struct OpenAiProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl OpenAiProvider {
    /// Create a backend against the public OpenAI endpoint.
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a backend against an OpenAI-compatible base URL
    /// (e.g. `http://localhost:8000/v1`).
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Config("openai api key is empty".into()));
        }
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| Error::Config("openai api key contains invalid characters".into()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to build http client: {e}")))?;
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        debug!(provider = OPENAI, endpoint = %endpoint, "initialized provider");

        Ok(Self { client, endpoint })
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::upstream(OPENAI, e))?;
        check_status(OPENAI, response).await
    }
}

impl std::fmt::Display for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "openai({})", self.endpoint)
    }
}

fn build_request<'a>(
    messages: &'a [Message],
    model: &'a str,
    parameters: &'a GenerationParameters,
    stream: bool,
) -> ApiRequest<'a> {
    ApiRequest {
        model,
        messages: messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect(),
        max_tokens: parameters.max_tokens,
        temperature: parameters.temperature,
        top_p: parameters.top_p,
        stop: parameters.stop_sequences.as_deref(),
        stream,
    }
}

fn normalize(raw: ApiResponse, requested_model: &str, elapsed_ms: f64) -> Result<GenerationResult> {
    let choice = raw
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::upstream(OPENAI, "response contained no choices"))?;
    let usage = raw.usage.map_or_else(Usage::default, |u| {
        Usage::new(u.prompt_tokens, u.completion_tokens)
    });

    Ok(GenerationResult {
        text: choice.message.content.unwrap_or_default(),
        usage,
        model: raw.model.unwrap_or_else(|| requested_model.to_string()),
        provider: OPENAI.to_string(),
        elapsed_ms,
    })
}

fn stream_event(event: &SseEvent) -> Result<SseAction> {
    let data = event.data.trim();
    if data == "[DONE]" {
        return Ok(SseAction::Done);
    }
    if data.is_empty() {
        return Ok(SseAction::Skip);
    }
    let chunk: ApiStreamChunk = serde_json::from_str(data)
        .map_err(|e| Error::upstream(OPENAI, format!("invalid stream chunk: {e}")))?;
    if let Some(error) = chunk.error {
        return Err(Error::upstream(OPENAI, error.message));
    }
    let text: String = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.content)
        .collect();
    Ok(SseAction::Emit(text))
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        OPENAI
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
        check_request(OPENAI, messages, model)?;
        let body = request_body(
            OPENAI,
            &build_request(messages, model, parameters, false),
            &parameters.extra,
        )?;

        debug!(provider = OPENAI, model, messages = messages.len(), "sending completion request");
        let started = Instant::now();
        let response = self.post(&body).await?;
        let raw: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream(OPENAI, format!("invalid response: {e}")))?;
        let result = normalize(raw, model, elapsed_ms(started))?;

        debug!(
            provider = OPENAI,
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
        check_request(OPENAI, messages, model)?;
        let body = request_body(
            OPENAI,
            &build_request(messages, model, parameters, true),
            &parameters.extra,
        )?;

        debug!(provider = OPENAI, model, messages = messages.len(), "opening completion stream");
        let response = self.post(&body).await?;
        Ok(sse::text_stream(OPENAI, response.bytes_stream(), stream_event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn body(messages: &[Message], params: &GenerationParameters, stream: bool) -> Value {
        request_body(
            OPENAI,
            &build_request(messages, "gpt-4", params, stream),
            &params.extra,
        )
        .unwrap()
    }

    #[test]
    fn system_messages_stay_inline() {
        let messages = vec![
            Message::system("A"),
            Message::user("B"),
            Message::assistant("C"),
            Message::user("D"),
        ];
        let body = body(&messages, &GenerationParameters::default(), false);
        assert_eq!(
            body,
            json!({
                "model": "gpt-4",
                "messages": [
                    {"role": "system", "content": "A"},
                    {"role": "user", "content": "B"},
                    {"role": "assistant", "content": "C"},
                    {"role": "user", "content": "D"},
                ],
            })
        );
    }

    #[test]
    fn parameters_map_to_wire_names() {
        let params = GenerationParameters {
            max_tokens: Some(128),
            temperature: Some(0.5),
            stop_sequences: Some(vec!["END".into()]),
            ..Default::default()
        }
        .with_extra("seed", 7);
        let body = body(&[Message::user("hi")], &params, true);
        assert_eq!(body["max_tokens"], 128);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["stop"], json!(["END"]));
        assert_eq!(body["seed"], 7);
        assert_eq!(body["stream"], true);
        assert!(body.get("top_p").is_none());
    }

    #[test]
    fn normalize_uses_vendor_breakdown() {
        let raw: ApiResponse = serde_json::from_value(json!({
            "model": "gpt-4-0613",
            "choices": [{"message": {"role": "assistant", "content": "Hello!"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }))
        .unwrap();
        let result = normalize(raw, "gpt-4", 42.0).unwrap();
        assert_eq!(result.text, "Hello!");
        assert_eq!(result.model, "gpt-4-0613");
        assert_eq!(result.provider, "openai");
        assert_eq!(result.usage, Usage::new(12, 3));
        assert_eq!(
            result.usage.total_tokens,
            result.usage.input_tokens + result.usage.output_tokens
        );
        assert_eq!(result.elapsed_ms, 42.0);
    }

    #[test]
    fn normalize_fills_gaps() {
        let raw: ApiResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": null}}]
        }))
        .unwrap();
        let result = normalize(raw, "gpt-3.5-turbo", 1.0).unwrap();
        assert_eq!(result.text, "");
        assert_eq!(result.model, "gpt-3.5-turbo");
        assert_eq!(result.usage, Usage::default());

        let empty: ApiResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            normalize(empty, "gpt-4", 1.0),
            Err(Error::Upstream { .. })
        ));
    }

    fn event(data: &str) -> SseEvent {
        SseEvent {
            event: None,
            data: data.to_string(),
        }
    }

    #[test]
    fn stream_events() {
        assert_eq!(
            stream_event(&event(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#)).unwrap(),
            SseAction::Emit("Hel".into())
        );
        assert_eq!(
            stream_event(&event(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#)).unwrap(),
            SseAction::Emit(String::new())
        );
        assert_eq!(stream_event(&event("[DONE]")).unwrap(), SseAction::Done);
        assert!(matches!(
            stream_event(&event(r#"{"error":{"message":"overloaded"}}"#)),
            Err(Error::Upstream { message, .. }) if message == "overloaded"
        ));
    }

    #[test]
    fn rejects_unusable_keys() {
        assert!(matches!(OpenAiProvider::new("  "), Err(Error::Config(_))));
        assert!(matches!(
            OpenAiProvider::new("sk-bad\nkey"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn base_url_override() {
        let p = OpenAiProvider::with_base_url("sk-test", "http://localhost:8000/v1/").unwrap();
        assert_eq!(p.endpoint, "http://localhost:8000/v1/chat/completions");
        assert_eq!(p.list_models()[0], "gpt-4");
    }

    fn provider_for(server: &mockito::ServerGuard) -> OpenAiProvider {
        OpenAiProvider::with_base_url("sk-test", &format!("{}/v1", server.url())).unwrap()
    }

    #[tokio::test]
    async fn generate_over_http() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4",
                "messages": [
                    {"role": "system", "content": "S"},
                    {"role": "user", "content": "hi"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "model": "gpt-4-0613",
                    "choices": [{"message": {"role": "assistant", "content": "Hello"}}],
                    "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 99}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let messages = [Message::system("S"), Message::user("hi")];
        let result = provider_for(&server)
            .generate(&messages, "gpt-4", &GenerationParameters::default())
            .await
            .unwrap();
        mock.assert_async().await;

        assert_eq!(result.text, "Hello");
        assert_eq!(result.model, "gpt-4-0613");
        assert_eq!(result.provider, OPENAI);
        assert_eq!(result.usage, Usage::new(3, 2));
        assert_eq!(result.usage.total_tokens, 5);
        assert!(result.elapsed_ms >= 0.0);
    }

    #[tokio::test]
    async fn http_failure_carries_vendor_message() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_body(r#"{"error":{"message":"rate limited","type":"requests"}}"#)
            .create_async()
            .await;

        let err = provider_for(&server)
            .generate(&[Message::user("hi")], "gpt-4", &GenerationParameters::default())
            .await
            .unwrap_err();
        match err {
            Error::Upstream { provider, message } => {
                assert_eq!(provider, OPENAI);
                assert_eq!(message, "429 Too Many Requests: rate limited");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_over_http() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({"model": "gpt-4", "stream": true})))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let stream = provider_for(&server)
            .stream_generate(&[Message::user("hi")], "gpt-4", &GenerationParameters::default())
            .await
            .unwrap();
        assert_eq!(stream.collect_text().await.unwrap(), "Hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn stream_open_failure_is_upstream() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let err = provider_for(&server)
            .stream_generate(&[Message::user("hi")], "gpt-4", &GenerationParameters::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::Upstream { message, .. } if message == "500 Internal Server Error: internal error"
        ));
    }
}
