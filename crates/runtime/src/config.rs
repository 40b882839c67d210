//! Provider credentials.
//!
//! Credentials come from a config file section, from the environment, or
//! both; a file entry wins over the environment for the same provider.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "env:";

/// Credentials for one vendor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Literal key, or `env:VAR` to read it from the environment when the
    /// adapter is constructed.
    pub api_key: String,

    /// Override for the vendor API root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// The usable key, with any `env:` reference resolved.
    pub fn resolve_key(&self) -> Result<String> {
        match self.api_key.strip_prefix(ENV_PREFIX) {
            Some(var) => {
                let var = var.trim();
                std::env::var(var)
                    .map_err(|_| Error::Config(format!("environment variable {var} is not set")))
            }
            None => Ok(self.api_key.clone()),
        }
    }
}

/// Which vendors to construct, and with what credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai: Option<Credentials>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic: Option<Credentials>,
}

impl ProvidersConfig {
    /// Read credentials from `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` and the
    /// matching `*_BASE_URL` variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str, url: &str| {
            lookup(key)
                .filter(|k| !k.trim().is_empty())
                .map(|api_key| Credentials {
                    api_key,
                    base_url: lookup(url).filter(|u| !u.trim().is_empty()),
                })
        };
        Self {
            openai: read("OPENAI_API_KEY", "OPENAI_BASE_URL"),
            anthropic: read("ANTHROPIC_API_KEY", "ANTHROPIC_BASE_URL"),
        }
    }

    /// Fill providers missing from `self` with those from `fallback`.
    pub fn or(self, fallback: Self) -> Self {
        Self {
            openai: self.openai.or(fallback.openai),
            anthropic: self.anthropic.or(fallback.anthropic),
        }
    }

    /// File entries first, then the environment.
    pub fn with_env(self) -> Self {
        self.or(Self::from_env())
    }

    /// Whether no provider is configured at all.
    pub fn is_empty(&self) -> bool {
        self.openai.is_none() && self.anthropic.is_none()
    }
}
