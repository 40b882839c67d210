//! The set of usable provider adapters, keyed by name.

use crate::config::{Credentials, ProvidersConfig};
use crate::providers::{ANTHROPIC, AnthropicProvider, OPENAI, OpenAiProvider, Provider};
use crate::Result;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Registered adapters in insertion order.
///
/// Built once at startup and never mutated afterwards, so a shared
/// `Arc<ProviderRegistry>` can be read from any number of tasks.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// A registry with no providers. Every auto-routed request against it
    /// fails with `NoProviderAvailable`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Construct every configured adapter, OpenAI first then Anthropic.
    ///
    /// A provider whose credentials are missing is skipped. A provider whose
    /// construction fails is logged and skipped without affecting the
    /// others. An empty result is not an error.
    pub fn from_config(config: &ProvidersConfig) -> Self {
        let mut providers: Vec<Arc<dyn Provider>> = Vec::new();

        if let Some(creds) = &config.openai {
            match build_openai(creds) {
                Ok(p) => {
                    info!(provider = OPENAI, "provider initialized");
                    providers.push(Arc::new(p));
                }
                Err(e) => warn!(provider = OPENAI, error = %e, "failed to initialize provider"),
            }
        }

        if let Some(creds) = &config.anthropic {
            match build_anthropic(creds) {
                Ok(p) => {
                    info!(provider = ANTHROPIC, "provider initialized");
                    providers.push(Arc::new(p));
                }
                Err(e) => warn!(provider = ANTHROPIC, error = %e, "failed to initialize provider"),
            }
        }

        if providers.is_empty() {
            warn!("no LLM providers configured; completions will be unavailable");
        }

        Self { providers }
    }

    /// Build from already-constructed adapters. Later duplicates of a name
    /// are dropped.
    pub fn from_providers(list: impl IntoIterator<Item = Arc<dyn Provider>>) -> Self {
        let mut registry = Self::empty();
        for provider in list {
            if registry.contains(provider.name()) {
                warn!(provider = provider.name(), "duplicate provider ignored");
                continue;
            }
            registry.providers.push(provider);
        }
        registry
    }

    /// Look up a provider by exact name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.iter().any(|p| p.name() == name)
    }

    /// Registered names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Curated models of one provider, or `None` if it is not registered.
    pub fn models(&self, name: &str) -> Option<Vec<String>> {
        self.get(name).map(|p| p.list_models())
    }

    /// `(provider, models)` for every registered provider.
    pub fn all_models(&self) -> Vec<(String, Vec<String>)> {
        self.providers
            .iter()
            .map(|p| (p.name().to_string(), p.list_models()))
            .collect()
    }

    pub(crate) fn first(&self) -> Option<&Arc<dyn Provider>> {
        self.providers.first()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

fn build_openai(creds: &Credentials) -> Result<OpenAiProvider> {
    let key = creds.resolve_key()?;
    match &creds.base_url {
        Some(url) => OpenAiProvider::with_base_url(&key, url),
        None => OpenAiProvider::new(&key),
    }
}

fn build_anthropic(creds: &Credentials) -> Result<AnthropicProvider> {
    let mut builder = AnthropicProvider::builder(creds.resolve_key()?);
    if let Some(url) = &creds.base_url {
        builder = builder.base_url(url);
    }
    builder.build()
}
