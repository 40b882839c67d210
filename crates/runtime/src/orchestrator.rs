//! Request assembly and dispatch.
//!
//! The orchestrator never talks to a vendor itself: it builds the message
//! list, asks the registry for a route, and hands the call to the adapter.
//! Adapter failures come back unchanged; there is no retry and no fallback
//! to another provider.

use crate::llm::{GenerationParameters, GenerationResult, Message, TaskType};
use crate::registry::ProviderRegistry;
use crate::selection::Resolution;
use crate::{Error, Result, TextStream};
use std::sync::Arc;
use tracing::{debug, info};

/// One completion request. Everything but the user message is optional.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    user_message: String,
    provider: Option<String>,
    model: Option<String>,
    history: Vec<Message>,
    system_prompt: Option<String>,
    parameters: GenerationParameters,
    task: TaskType,
}

impl CompletionRequest {
    pub fn new(user_message: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            ..Default::default()
        }
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Prior turns, sent in the given order.
    pub fn history(mut self, history: impl IntoIterator<Item = Message>) -> Self {
        self.history = history.into_iter().collect();
        self
    }

    pub fn system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn parameters(mut self, parameters: GenerationParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Hint used only when no model is given.
    pub fn task(mut self, task: TaskType) -> Self {
        self.task = task;
        self
    }

    /// The full message list: system prompt, then history, then the new
    /// user turn.
    pub fn messages(&self) -> Vec<Message> {
        build_messages(
            self.system_prompt.as_deref(),
            &self.history,
            &self.user_message,
        )
    }
}

/// What [`Orchestrator::complete`] hands back.
#[derive(Debug)]
pub enum Completion {
    Full(GenerationResult),
    Stream(TextStream),
}

/// Routes completion requests through a shared registry. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
}

impl Orchestrator {
    pub fn new(registry: impl Into<Arc<ProviderRegistry>>) -> Self {
        Self {
            registry: registry.into(),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// The route a request with these choices would take.
    pub fn resolve(&self, provider: Option<&str>, model: Option<&str>) -> Result<Resolution> {
        self.registry.resolve(provider, model, TaskType::General)
    }

    /// Run a request, either to completion or as a stream.
    pub async fn complete(&self, request: CompletionRequest, stream: bool) -> Result<Completion> {
        if stream {
            self.stream(request).await.map(Completion::Stream)
        } else {
            self.generate(request).await.map(Completion::Full)
        }
    }

    pub async fn generate(&self, request: CompletionRequest) -> Result<GenerationResult> {
        let (route, messages) = self.prepare(&request)?;
        let result = route
            .provider
            .generate(&messages, &route.model, &request.parameters)
            .await?;
        info!(
            provider = %result.provider,
            model = %result.model,
            input_tokens = result.usage.input_tokens,
            output_tokens = result.usage.output_tokens,
            elapsed_ms = result.elapsed_ms,
            "completion finished"
        );
        Ok(result)
    }

    pub async fn stream(&self, request: CompletionRequest) -> Result<TextStream> {
        let (route, messages) = self.prepare(&request)?;
        let stream = route
            .provider
            .stream_generate(&messages, &route.model, &request.parameters)
            .await?;
        info!(provider = route.provider_name(), model = %route.model, "completion stream opened");
        Ok(stream)
    }

    fn prepare(&self, request: &CompletionRequest) -> Result<(Resolution, Vec<Message>)> {
        if request.user_message.trim().is_empty() {
            return Err(Error::EmptyInput);
        }
        let route = self.registry.resolve(
            request.provider.as_deref(),
            request.model.as_deref(),
            request.task,
        )?;
        let messages = request.messages();
        debug!(
            provider = route.provider_name(),
            model = %route.model,
            messages = messages.len(),
            "dispatching completion"
        );
        Ok((route, messages))
    }
}

/// Assemble `[system] ++ history ++ [user]`. A blank system prompt is
/// treated as absent.
pub fn build_messages(
    system_prompt: Option<&str>,
    history: &[Message],
    user: &str,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    if let Some(system) = system_prompt.filter(|s| !s.trim().is_empty()) {
        messages.push(Message::system(system));
    }
    messages.extend_from_slice(history);
    messages.push(Message::user(user));
    messages
}
