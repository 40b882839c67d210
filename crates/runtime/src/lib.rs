//! Conduit runtime: LLM provider abstraction and routing.
//!
//! This crate lets callers ask for a completion without knowing which vendor
//! serves it. It hides the differences between vendor chat APIs behind one
//! adapter contract and picks a provider and model when the caller leaves
//! them out.
//!
//! # Overview
//!
//! - **Provider**: a trait every vendor adapter implements (OpenAI,
//!   Anthropic). Adapters normalize replies into a [`GenerationResult`].
//! - **ProviderRegistry**: the adapters that initialized successfully, in a
//!   fixed order. One bad credential never takes down the others.
//! - **Selection**: static provider → task → model recommendations.
//! - **Orchestrator**: builds the message list and dispatches to the
//!   resolved adapter, either to completion or as a [`TextStream`].
//!
//! # Example
//!
//! ```ignore
//! use runtime::{CompletionRequest, Orchestrator, ProviderRegistry, ProvidersConfig};
//!
//! # async fn example() -> runtime::Result<()> {
//! let registry = ProviderRegistry::from_config(&ProvidersConfig::from_env());
//! let orchestrator = Orchestrator::new(registry);
//!
//! let reply = orchestrator
//!     .generate(CompletionRequest::new("Hello!").system_prompt("Be brief."))
//!     .await?;
//! println!("{} ({} tokens)", reply.text, reply.usage.total_tokens);
//! # Ok(())
//! # }
//! ```

pub mod config;
mod error;
pub mod llm;
mod orchestrator;
pub mod prompts;
pub mod providers;
mod registry;
mod selection;
mod stream;

// Core types (provider-agnostic)
pub use llm::{GenerationParameters, GenerationResult, Message, Role, TaskType, Usage};

// Configuration
pub use config::{Credentials, ProvidersConfig};

// Routing
pub use orchestrator::{Completion, CompletionRequest, Orchestrator, build_messages};
pub use registry::ProviderRegistry;
pub use selection::{RECOMMENDATIONS, Resolution, curated_model};

// Adapters
pub use providers::{ANTHROPIC, OPENAI, Provider};

// Streaming
pub use stream::TextStream;

// Error types
pub use error::{Error, ErrorCategory, Result};
