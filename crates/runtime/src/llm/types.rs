//! Core LLM types (provider-agnostic).
//!
//! These types represent the uniform contract every provider adapter speaks.
//! Vendor wire shapes belong in the adapter modules.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a message with a role and text content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Tuning values passed through to the vendor call.
///
/// Each adapter maps the typed fields onto its own wire names and ignores
/// the ones its vendor has no equivalent for. `extra` is flattened into the
/// vendor request body untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling cutoff.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Sequences that stop generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,

    /// Vendor-specific knobs forwarded verbatim.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl GenerationParameters {
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Add a vendor-specific value that is passed through unchanged.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Token usage for one completion.
///
/// `total_tokens` is always `input_tokens + output_tokens`; construct through
/// [`Usage::new`] so the two cannot disagree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    /// Vendors report 32-bit counts, so the sum cannot overflow.
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        let (input_tokens, output_tokens) = (u64::from(input_tokens), u64::from(output_tokens));
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// The normalized output of a single-shot generation, identical in shape
/// for every vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Generated text.
    pub text: String,
    /// Token usage reported by the vendor.
    pub usage: Usage,
    /// Model that served the request, as reported by the vendor.
    pub model: String,
    /// Provider name (e.g. "openai", "anthropic").
    pub provider: String,
    /// Wall-clock time spent on the vendor call, in milliseconds.
    pub elapsed_ms: f64,
}

/// Coarse hint used to pick a default model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    #[default]
    General,
    Complex,
    Fast,
    Creative,
}

impl TaskType {
    /// Every task hint, in table order.
    pub const ALL: [TaskType; 4] = [Self::General, Self::Complex, Self::Fast, Self::Creative];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Complex => "complex",
            Self::Fast => "fast",
            Self::Creative => "creative",
        }
    }

    /// Parse a task hint, treating anything unrecognized as `General`.
    pub fn parse_lossy(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(Self::General),
            "complex" => Ok(Self::Complex),
            "fast" => Ok(Self::Fast),
            "creative" => Ok(Self::Creative),
            other => Err(format!("unknown task type: {other}")),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_total_is_sum() {
        let usage = Usage::new(100, 50);
        assert_eq!(usage.total_tokens, 150);
        let large = Usage::new(u32::MAX, 1);
        assert_eq!(large.total_tokens, u64::from(u32::MAX) + 1);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn task_type_parsing() {
        assert_eq!(TaskType::parse_lossy("Complex"), TaskType::Complex);
        assert_eq!(TaskType::parse_lossy(" fast "), TaskType::Fast);
        assert_eq!(TaskType::parse_lossy("unknown-task"), TaskType::General);
        assert!("nope".parse::<TaskType>().is_err());
    }

    #[test]
    fn parameters_skip_unset_fields() {
        let params = GenerationParameters::default()
            .with_max_tokens(64)
            .with_extra("seed", 7);
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["max_tokens"], 64);
        assert_eq!(json["extra"]["seed"], 7);
        assert!(json.get("temperature").is_none());
    }
}
