use thiserror::Error;

/// Errors raised while routing and executing a completion.
#[derive(Debug, Error)]
pub enum Error {
    /// The caller named a provider that is not in the registry.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// No provider could be auto-selected because the registry is empty.
    #[error("no LLM providers are available")]
    NoProviderAvailable,

    /// The resolved provider has no usable model.
    #[error("no models available for provider '{0}'")]
    NoModelAvailable(String),

    /// The vendor call failed. Never retried by the runtime.
    #[error("{provider} error: {message}")]
    Upstream { provider: String, message: String },

    /// The caller supplied an empty message or user turn.
    #[error("empty input: a non-empty user message is required")]
    EmptyInput,

    /// Adapter construction or credential resolution failed.
    #[error("config error: {0}")]
    Config(String),
}

/// Coarse class of an [`Error`], for dispatchers that map errors to a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request itself is wrong (bad provider name, empty input).
    Client,
    /// The service cannot serve any request right now.
    Unavailable,
    /// Misconfiguration on our side.
    Internal,
    /// The vendor failed; pass through to the caller.
    Upstream,
}

impl Error {
    /// Build an upstream error for `provider` from any displayable cause.
    pub fn upstream(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::Upstream {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownProvider(_) | Self::EmptyInput => ErrorCategory::Client,
            Self::NoProviderAvailable => ErrorCategory::Unavailable,
            Self::NoModelAvailable(_) | Self::Config(_) => ErrorCategory::Internal,
            Self::Upstream { .. } => ErrorCategory::Upstream,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_carries_vendor_name() {
        let err = Error::upstream("anthropic", "429 Too Many Requests: slow down");
        assert_eq!(
            err.to_string(),
            "anthropic error: 429 Too Many Requests: slow down"
        );
        assert_eq!(err.category(), ErrorCategory::Upstream);
    }

    #[test]
    fn categories() {
        assert_eq!(
            Error::UnknownProvider("x".into()).category(),
            ErrorCategory::Client
        );
        assert_eq!(Error::EmptyInput.category(), ErrorCategory::Client);
        assert_eq!(
            Error::NoProviderAvailable.category(),
            ErrorCategory::Unavailable
        );
        assert_eq!(
            Error::NoModelAvailable("openai".into()).category(),
            ErrorCategory::Internal
        );
    }
}
