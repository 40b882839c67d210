//! Usage ledger types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One completed vendor call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub elapsed_ms: f64,
}

impl UsageRecord {
    /// A record stamped now. `total_tokens` is derived from the two counts.
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        input_tokens: u64,
        output_tokens: u64,
        elapsed_ms: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            provider: provider.into(),
            model: model.into(),
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
            elapsed_ms,
        }
    }
}

/// Totals for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub provider: String,
    pub requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Totals across the whole ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_requests: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    /// Sorted by provider name.
    pub by_provider: Vec<ProviderUsage>,
}

impl UsageSummary {
    pub(crate) fn from_providers(by_provider: Vec<ProviderUsage>) -> Self {
        Self {
            total_requests: by_provider.iter().map(|p| p.requests).sum(),
            total_input_tokens: by_provider.iter().map(|p| p.input_tokens).sum(),
            total_output_tokens: by_provider.iter().map(|p| p.output_tokens).sum(),
            by_provider,
        }
    }
}
