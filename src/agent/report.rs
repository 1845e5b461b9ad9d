//! Report agent: turns a cost estimate into an HTML report.

use async_trait::async_trait;

use super::config::AgentConfig;
use super::prompt::build_report_prompt;
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::CostEstimate;
use crate::error::AgentError;

/// Returned when the model produced no report.
pub const EMPTY_REPORT: &str = "No cost estimate could be generated.";

/// Agent that writes the human-readable cost report.
pub struct ReportAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl ReportAgent {
    /// Creates a report agent with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.report_model.clone(),
            max_tokens: config.report_max_tokens,
            system_prompt,
        }
    }

    /// Generates the HTML report for `estimate`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the provider call fails.
    pub async fn generate(
        &self,
        provider: &dyn LlmProvider,
        estimate: &CostEstimate,
    ) -> Result<String, AgentError> {
        let response = self
            .execute(provider, &build_report_prompt(estimate))
            .await?;
        Ok(Self::clean_html(&response.content))
    }

    /// Strips code fences and literal `\n` escapes from the model output.
    fn clean_html(content: &str) -> String {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return EMPTY_REPORT.to_string();
        }

        let unfenced = trimmed
            .strip_prefix("```html")
            .or_else(|| trimmed.strip_prefix("```"))
            .map_or(trimmed, |body| {
                body.strip_suffix("```").unwrap_or(body).trim()
            });

        unfenced.replace("\\n", "")
    }
}

#[async_trait]
impl Agent for ReportAgent {
    fn name(&self) -> &'static str {
        "report"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.7
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
