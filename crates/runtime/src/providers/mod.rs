//! LLM provider adapters.
//!
//! Each adapter translates the uniform message/parameter contract into one
//! vendor's chat API and normalizes the reply into a [`GenerationResult`].

mod anthropic;
#[cfg(test)]
pub(crate) mod mock;
mod openai;
mod sse;

pub use anthropic::{ANTHROPIC, AnthropicProvider, AnthropicProviderBuilder, DEFAULT_MAX_TOKENS};
pub use openai::{OPENAI, OpenAiProvider};

use crate::llm::{GenerationParameters, GenerationResult, Message};
use crate::{Error, Result, TextStream};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Capability set every vendor adapter exposes.
///
/// An adapter owns one HTTP client handle created at construction and is
/// shared across concurrent requests; it never retries on its own.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registry key for this adapter (e.g. "openai").
    fn name(&self) -> &str;

    /// Curated model identifiers, in preference order. Never queried from
    /// the vendor.
    fn list_models(&self) -> Vec<String>;

    /// Run a single-shot completion.
    async fn generate(
        &self,
        messages: &[Message],
        model: &str,
        parameters: &GenerationParameters,
    ) -> Result<GenerationResult>;

    /// Start a streamed completion. Dropping or closing the returned stream
    /// releases the vendor connection.
    async fn stream_generate(
        &self,
        messages: &[Message],
        model: &str,
        parameters: &GenerationParameters,
    ) -> Result<TextStream>;
}

/// Reject requests no vendor could serve before any network I/O.
fn check_request(provider: &str, messages: &[Message], model: &str) -> Result<()> {
    if messages.is_empty() {
        return Err(Error::EmptyInput);
    }
    if model.trim().is_empty() {
        return Err(Error::NoModelAvailable(provider.to_string()));
    }
    Ok(())
}

/// Serialize the typed vendor request and lay it over the caller's extra
/// parameters. Typed fields win on key collisions.
fn request_body(
    provider: &str,
    typed: &impl Serialize,
    extra: &Map<String, Value>,
) -> Result<Value> {
    let typed = serde_json::to_value(typed)
        .map_err(|e| Error::upstream(provider, format!("failed to encode request: {e}")))?;
    let mut body = extra.clone();
    if let Value::Object(fields) = typed {
        body.extend(fields);
    }
    Ok(Value::Object(body))
}

/// Error payload shape shared by both vendors: `{"error": {"message": ...}}`.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub message: String,
}

/// Turn a non-success response into an upstream error, preferring the
/// vendor's own message over the raw body.
async fn check_status(provider: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.text().await {
        Ok(body) => error_message(&body),
        Err(e) => format!("failed to read error body: {e}"),
    };
    Err(Error::upstream(provider, format!("{status}: {message}")))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

fn elapsed_ms(started: std::time::Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Typed {
        model: &'static str,
        max_tokens: u32,
    }

    #[test]
    fn typed_fields_override_extra() {
        let mut extra = Map::new();
        extra.insert("max_tokens".into(), json!(1));
        extra.insert("seed".into(), json!(42));
        let body = request_body(
            "openai",
            &Typed {
                model: "gpt-4",
                max_tokens: 256,
            },
            &extra,
        )
        .unwrap();
        assert_eq!(body, json!({"model": "gpt-4", "max_tokens": 256, "seed": 42}));
    }

    #[test]
    fn error_message_prefers_vendor_message() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        assert_eq!(error_message(body), "invalid x-api-key");
        assert_eq!(error_message("  upstream timeout \n"), "upstream timeout");
    }

    #[test]
    fn empty_requests_rejected() {
        assert!(matches!(
            check_request("openai", &[], "gpt-4"),
            Err(Error::EmptyInput)
        ));
        assert!(matches!(
            check_request("openai", &[Message::user("hi")], " "),
            Err(Error::NoModelAvailable(p)) if p == "openai"
        ));
        assert!(check_request("openai", &[Message::user("hi")], "gpt-4").is_ok());
    }
}
