//! Configuration loading from conduit.toml.

use runtime::{GenerationParameters, ProvidersConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default config file, looked up in the working directory.
pub const CONFIG_FILE: &str = "conduit.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Vendor credentials. Environment variables fill in missing entries.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Default generation parameters for every request.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Usage ledger location.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[generation]` section.
#[derive(Debug, Default, Deserialize)]
pub struct GenerationConfig {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

impl GenerationConfig {
    pub fn parameters(&self) -> GenerationParameters {
        GenerationParameters {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            ..Default::default()
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    /// Path of the SQLite usage ledger.
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load an explicitly named file, or `conduit.toml` if it exists, or
    /// fall back to defaults. Environment credentials are merged in last.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None if Path::new(CONFIG_FILE).exists() => Self::load(CONFIG_FILE)?,
            None => Self::default(),
        };
        config.providers = config.providers.with_env();
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),
}
