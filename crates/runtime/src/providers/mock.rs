//! Scripted provider for exercising routing and orchestration without I/O.

use super::Provider;
use crate::llm::{GenerationParameters, GenerationResult, Message, Usage};
use crate::{Error, Result, TextStream};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// One recorded call: the model asked for and the messages sent.
pub(crate) type Call = (String, Vec<Message>);

pub(crate) struct MockProvider {
    name: String,
    models: Vec<String>,
    fragments: Vec<String>,
    usage: Usage,
    fail_with: Option<String>,
    calls: Arc<Mutex<Vec<Call>>>,
    closed: Arc<AtomicBool>,
}

impl MockProvider {
    pub fn new(name: &str, models: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            models: models.iter().map(ToString::to_string).collect(),
            fragments: vec!["Hel".into(), "lo".into(), "!".into()],
            usage: Usage::new(10, 3),
            fail_with: None,
            calls: Arc::default(),
            closed: Arc::default(),
        }
    }

    pub fn with_fragments(mut self, fragments: &[&str]) -> Self {
        self.fragments = fragments.iter().map(ToString::to_string).collect();
        self
    }

    /// Every call fails with an upstream error carrying `message`.
    pub fn failing(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<Call>>> {
        Arc::clone(&self.calls)
    }

    /// Set once a stream handed out by this provider has been released.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    fn record(&self, messages: &[Message], model: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((model.to_string(), messages.to_vec()));
        match &self.fail_with {
            Some(message) => Err(Error::upstream(&self.name, message)),
            None => Ok(()),
        }
    }
}

struct SetOnDrop(Arc<AtomicBool>);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_models(&self) -> Vec<String> {
        self.models.clone()
    }

    async fn generate(
        &self,
        messages: &[Message],
        model: &str,
        _parameters: &GenerationParameters,
    ) -> Result<GenerationResult> {
        self.record(messages, model)?;
        Ok(GenerationResult {
            text: self.fragments.concat(),
            usage: self.usage,
            model: model.to_string(),
            provider: self.name.clone(),
            elapsed_ms: 1.0,
        })
    }

    async fn stream_generate(
        &self,
        messages: &[Message],
        model: &str,
        _parameters: &GenerationParameters,
    ) -> Result<TextStream> {
        self.record(messages, model)?;
        let fragments = self.fragments.clone();
        let guard = SetOnDrop(Arc::clone(&self.closed));
        let stream = async_stream::stream! {
            let _guard = guard;
            for fragment in fragments {
                yield Ok::<_, Error>(fragment);
            }
        };
        Ok(TextStream::new(self.name.clone(), stream))
    }
}
