//! Chat backends.
//!
//! Agents talk to an [`LlmProvider`]; [`create_provider`] picks the
//! implementation named in the configuration. Azure AI Inference exposes
//! an `OpenAI`-compatible surface, so both names map to the same client
//! and differ only in `base_url`.

use std::sync::Arc;

use async_trait::async_trait;

use super::config::AgentConfig;
use super::message::{ChatRequest, ChatResponse};
use super::providers::OpenAiProvider;
use crate::error::AgentError;

/// A chat-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Sends one request and waits for the full completion.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiRequest`] when the backend rejects or
    /// cannot be reached.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError>;
}

/// Builds the backend named by `config.provider`.
///
/// The returned handle is shared: the filter agent keeps a clone for the
/// pricing loop while the analyzer uses it for extraction and reporting.
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedProvider`] for anything other than
/// `openai` or `azure`.
pub fn create_provider(config: &AgentConfig) -> Result<Arc<dyn LlmProvider>, AgentError> {
    match config.provider.as_str() {
        "openai" | "azure" => Ok(Arc::new(OpenAiProvider::new(config))),
        other => Err(AgentError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}
