//! Filter agent: proposes pricing tool filters for one resource.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::config::AgentConfig;
use super::json::object_span;
use super::prompt::build_filter_prompt;
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::Filter;
use crate::error::{AgentError, PricingError};
use crate::pricing::{FilterSynthesizer, SynthesisRequest};

/// Agent that synthesizes a pricing filter from a resource and the tool's
/// schema.
pub struct FilterAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    provider: Arc<dyn LlmProvider>,
}

impl FilterAgent {
    /// Creates a filter agent bound to `provider`.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            model: config.filter_model.clone(),
            max_tokens: config.filter_max_tokens,
            system_prompt,
            provider,
        }
    }

    /// Parses the model's response into a JSON object.
    fn parse_object(content: &str) -> Result<serde_json::Value, AgentError> {
        let json_str = object_span(content)?;
        let value: serde_json::Value =
            serde_json::from_str(json_str).map_err(|e| AgentError::ResponseParse {
                message: format!("Failed to parse filter: {e}"),
                content: content.to_string(),
            })?;
        if value.is_object() {
            Ok(value)
        } else {
            Err(AgentError::ResponseParse {
                message: "filter is not a JSON object".to_string(),
                content: content.to_string(),
            })
        }
    }
}

#[async_trait]
impl Agent for FilterAgent {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn temperature(&self) -> f32 {
        0.2
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[async_trait]
impl FilterSynthesizer for FilterAgent {
    async fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<Filter, PricingError> {
        let feedback = request.feedback.map(|f| f.message());
        let user_msg = build_filter_prompt(
            request.resource,
            &request.schema_description(),
            feedback.as_deref(),
            request.permit_wide_fields,
        );

        let response = self.execute(self.provider.as_ref(), &user_msg).await?;
        let value = Self::parse_object(&response.content)?;
        debug!(wide = request.permit_wide_fields, filter = %value, "synthesized filter");
        request.validate(&value)
    }
}
