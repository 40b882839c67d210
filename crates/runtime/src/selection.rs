//! Default provider and model selection.
//!
//! Model recommendations are static data. Extending them means adding rows
//! to [`RECOMMENDATIONS`], never new branches.

use crate::llm::TaskType;
use crate::providers::{ANTHROPIC, OPENAI, Provider};
use crate::registry::ProviderRegistry;
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// `(provider, task, model)` rows. Tasks missing for a provider use the
/// `General` row.
pub const RECOMMENDATIONS: &[(&str, TaskType, &str)] = &[
    (OPENAI, TaskType::General, "gpt-3.5-turbo"),
    (OPENAI, TaskType::Complex, "gpt-4"),
    (OPENAI, TaskType::Fast, "gpt-3.5-turbo"),
    (OPENAI, TaskType::Creative, "gpt-4"),
    (ANTHROPIC, TaskType::General, "claude-3-sonnet-20240229"),
    (ANTHROPIC, TaskType::Complex, "claude-3-opus-20240229"),
    (ANTHROPIC, TaskType::Fast, "claude-3-haiku-20240307"),
    (ANTHROPIC, TaskType::Creative, "claude-3-opus-20240229"),
];

/// The table's model for `provider` and `task`, if it has one.
pub fn curated_model(provider: &str, task: TaskType) -> Option<&'static str> {
    let lookup = |task| {
        RECOMMENDATIONS
            .iter()
            .find(|(p, t, _)| *p == provider && *t == task)
            .map(|(_, _, model)| *model)
    };
    lookup(task).or_else(|| lookup(TaskType::General))
}

/// A provider adapter and the model to call it with.
#[derive(Clone)]
pub struct Resolution {
    pub provider: Arc<dyn Provider>,
    pub model: String,
}

impl Resolution {
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish()
    }
}

impl ProviderRegistry {
    /// The first registered provider, if any.
    pub fn default_provider(&self) -> Option<String> {
        self.first().map(|p| p.name().to_string())
    }

    /// The model to use for `task` on `provider`.
    ///
    /// The table's pick is used only if the adapter actually lists it;
    /// otherwise the adapter's first model. `None` if the provider is not
    /// registered or lists no models.
    pub fn recommended_model(&self, provider: &str, task: TaskType) -> Option<String> {
        let models = self.models(provider)?;
        recommend(provider, task, &models)
    }

    /// Fill in whatever the caller left out.
    ///
    /// Blank names count as absent. The adapter is looked up before any model
    /// is picked, so an explicit but unregistered provider fails with
    /// `UnknownProvider` even when no model was given, never with
    /// `NoModelAvailable`.
    pub fn resolve(
        &self,
        provider: Option<&str>,
        model: Option<&str>,
        task: TaskType,
    ) -> Result<Resolution> {
        let name = match provider.map(str::trim).filter(|p| !p.is_empty()) {
            Some(name) => name.to_string(),
            None => self.default_provider().ok_or(Error::NoProviderAvailable)?,
        };
        let adapter = self
            .get(&name)
            .ok_or_else(|| Error::UnknownProvider(name.clone()))?;

        let model = match model.map(str::trim).filter(|m| !m.is_empty()) {
            Some(model) => model.to_string(),
            None => recommend(&name, task, &adapter.list_models())
                .ok_or_else(|| Error::NoModelAvailable(name.clone()))?,
        };

        debug!(provider = %name, model = %model, task = %task, "resolved route");
        Ok(Resolution {
            provider: adapter,
            model,
        })
    }
}

fn recommend(provider: &str, task: TaskType, models: &[String]) -> Option<String> {
    curated_model(provider, task)
        .filter(|m| models.iter().any(|listed| listed == m))
        .map(str::to_string)
        .or_else(|| models.first().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockProvider;

    fn registry(providers: Vec<MockProvider>) -> ProviderRegistry {
        ProviderRegistry::from_providers(
            providers
                .into_iter()
                .map(|p| Arc::new(p) as Arc<dyn Provider>),
        )
    }

    fn vendors() -> ProviderRegistry {
        registry(vec![
            MockProvider::new(
                OPENAI,
                &["gpt-4", "gpt-4-turbo", "gpt-3.5-turbo", "gpt-3.5-turbo-16k"],
            ),
            MockProvider::new(
                ANTHROPIC,
                &[
                    "claude-3-opus-20240229",
                    "claude-3-sonnet-20240229",
                    "claude-3-haiku-20240307",
                ],
            ),
        ])
    }

    #[test]
    fn recommendations() {
        let r = vendors();
        assert_eq!(
            r.recommended_model("openai", TaskType::Complex).as_deref(),
            Some("gpt-4")
        );
        assert_eq!(
            r.recommended_model("anthropic", TaskType::Fast).as_deref(),
            Some("claude-3-haiku-20240307")
        );
        assert_eq!(
            r.recommended_model("openai", TaskType::parse_lossy("unknown-task"))
                .as_deref(),
            Some("gpt-3.5-turbo")
        );
        assert_eq!(r.recommended_model("mistral", TaskType::General), None);
    }

    #[test]
    fn every_curated_model_is_listed() {
        let r = vendors();
        for (provider, _, model) in RECOMMENDATIONS {
            let models = r.models(provider).unwrap();
            assert!(models.iter().any(|m| m == model), "{provider}/{model}");
        }
    }

    #[test]
    fn every_task_resolves_to_a_listed_model() {
        let r = vendors();
        for provider in [OPENAI, ANTHROPIC] {
            let models = r.models(provider).unwrap();
            for task in TaskType::ALL {
                let res = r.resolve(Some(provider), None, task).unwrap();
                assert!(models.contains(&res.model), "{provider}/{task}");
            }
        }
    }

    #[test]
    fn unlisted_recommendation_falls_back_to_first_model() {
        let r = registry(vec![MockProvider::new(OPENAI, &["gpt-4o", "gpt-4o-mini"])]);
        assert_eq!(
            r.recommended_model(OPENAI, TaskType::General).as_deref(),
            Some("gpt-4o")
        );
        let r = registry(vec![MockProvider::new("local", &["llama3"])]);
        assert_eq!(
            r.recommended_model("local", TaskType::Creative).as_deref(),
            Some("llama3")
        );
    }

    #[test]
    fn resolve_is_deterministic() {
        let r = vendors();
        let first = r.resolve(None, None, TaskType::General).unwrap();
        for _ in 0..10 {
            let again = r.resolve(None, None, TaskType::General).unwrap();
            assert_eq!(again.provider_name(), first.provider_name());
            assert_eq!(again.model, first.model);
        }
        assert_eq!(first.provider_name(), "openai");
        assert_eq!(first.model, "gpt-3.5-turbo");
    }

    #[test]
    fn explicit_choices_are_kept() {
        let r = vendors();
        let res = r
            .resolve(Some("anthropic"), Some("claude-3-opus-20240229"), TaskType::Fast)
            .unwrap();
        assert_eq!(res.provider_name(), "anthropic");
        assert_eq!(res.model, "claude-3-opus-20240229");

        let res = r.resolve(Some(" "), Some(""), TaskType::Complex).unwrap();
        assert_eq!(res.provider_name(), "openai");
        assert_eq!(res.model, "gpt-4");
    }

    #[test]
    fn resolution_failures() {
        assert!(matches!(
            ProviderRegistry::empty().resolve(None, None, TaskType::General),
            Err(Error::NoProviderAvailable)
        ));
        assert!(matches!(
            vendors().resolve(Some("mistral"), None, TaskType::General),
            Err(Error::UnknownProvider(p)) if p == "mistral"
        ));
        assert!(matches!(
            vendors().resolve(Some("mistral"), Some("large"), TaskType::General),
            Err(Error::UnknownProvider(_))
        ));
        let no_models = registry(vec![MockProvider::new("bare", &[])]);
        assert!(matches!(
            no_models.resolve(None, None, TaskType::General),
            Err(Error::NoModelAvailable(p)) if p == "bare"
        ));
    }
}
