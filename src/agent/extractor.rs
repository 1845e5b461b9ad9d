//! Extractor agent: template in, billable resources out.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::config::AgentConfig;
use super::json::array_span;
use super::prompt::build_extractor_prompt;
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::Resource;
use crate::error::AgentError;

/// Agent that lists the billable resources of a deployment template.
pub struct ExtractorAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl ExtractorAgent {
    /// Creates an extractor with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.extractor_model.clone(),
            max_tokens: config.extractor_max_tokens,
            system_prompt,
        }
    }

    /// Extracts resources from `template`.
    ///
    /// Unparsable model output yields an empty list, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the provider call fails.
    pub async fn extract(
        &self,
        provider: &dyn LlmProvider,
        template: &str,
    ) -> Result<Vec<Resource>, AgentError> {
        let response = self
            .execute(provider, &build_extractor_prompt(template))
            .await?;

        match Self::parse_resources(&response.content) {
            Ok(resources) => {
                debug!(count = resources.len(), "extracted resources");
                Ok(resources)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    truncated = response.truncated(),
                    "could not parse extracted resources; continuing with none"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Parses the model's response into resources.
    fn parse_resources(content: &str) -> Result<Vec<Resource>, AgentError> {
        let content = if content.trim().is_empty() { "[]" } else { content };
        let json_str = array_span(content)?;

        serde_json::from_str::<Vec<Resource>>(json_str).map_err(|e| AgentError::ResponseParse {
            message: format!("Failed to parse resource list: {e}"),
            content: content.to_string(),
        })
    }
}

#[async_trait]
impl Agent for ExtractorAgent {
    fn name(&self) -> &'static str {
        "extractor"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.1
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
