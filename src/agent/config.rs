//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AgentError;
use crate::pricing::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RESTRICTED_FIELD, ResolutionPolicy};

/// Default chat model.
const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Default extractor max tokens.
const DEFAULT_EXTRACTOR_MAX_TOKENS: u32 = 2000;
/// Default filter synthesis max tokens. Filters are small JSON objects.
const DEFAULT_FILTER_MAX_TOKENS: u32 = 400;
/// Default report max tokens.
const DEFAULT_REPORT_MAX_TOKENS: u32 = 2000;
/// Default pricing tool endpoint.
pub const DEFAULT_MCP_URL: &str = "http://localhost:8000/retail-prices/mcp";
/// Default pricing tool name.
pub const DEFAULT_PRICING_TOOL: &str = "get_retail_prices";

/// Configuration for the agent system.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (Azure AI Inference, proxies, local servers).
    pub base_url: Option<String>,
    /// Model for resource extraction.
    pub extractor_model: String,
    /// Model for filter synthesis.
    pub filter_model: String,
    /// Model for the cost report.
    pub report_model: String,
    /// Maximum tokens for extraction responses.
    pub extractor_max_tokens: u32,
    /// Maximum tokens for filter responses.
    pub filter_max_tokens: u32,
    /// Maximum tokens for report responses.
    pub report_max_tokens: u32,
    /// Pricing tool MCP endpoint.
    pub mcp_url: String,
    /// Name of the pricing tool on the MCP server.
    pub pricing_tool: String,
    /// Pricing tool invocations per resource.
    pub max_filter_attempts: usize,
    /// Deadline for each external call. `None` waits indefinitely.
    pub call_timeout: Option<Duration>,
    /// Directory containing prompt template files.
    ///
    /// Missing files fall back to compiled-in defaults.
    pub prompt_dir: Option<PathBuf>,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }

    /// Resolution policy for the pricing core.
    #[must_use]
    pub fn resolution_policy(&self) -> ResolutionPolicy {
        let policy = ResolutionPolicy {
            max_attempts: self.max_filter_attempts,
            call_timeout: None,
            restricted_fields: vec![DEFAULT_RESTRICTED_FIELD.to_string()],
        };
        match self.call_timeout {
            Some(timeout) => policy.with_call_timeout(timeout),
            None => policy,
        }
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    extractor_model: Option<String>,
    filter_model: Option<String>,
    report_model: Option<String>,
    extractor_max_tokens: Option<u32>,
    filter_max_tokens: Option<u32>,
    report_max_tokens: Option<u32>,
    mcp_url: Option<String>,
    pricing_tool: Option<String>,
    max_filter_attempts: Option<usize>,
    call_timeout: Option<Duration>,
    prompt_dir: Option<PathBuf>,
}

/// First non-empty value among `names`.
fn env_any(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = env_any(&["COSTLENS_PROVIDER"]);
        }
        if self.api_key.is_none() {
            self.api_key = env_any(&[
                "COSTLENS_API_KEY",
                "AZURE_INFERENCE_API_KEY",
                "OPENAI_API_KEY",
            ]);
        }
        if self.base_url.is_none() {
            self.base_url = env_any(&[
                "COSTLENS_BASE_URL",
                "AZURE_INFERENCE_ENDPOINT",
                "OPENAI_BASE_URL",
            ]);
        }
        if self.model.is_none() {
            self.model = env_any(&["COSTLENS_MODEL", "AZURE_INFERENCE_MODEL_NAME"]);
        }
        if self.extractor_model.is_none() {
            self.extractor_model = env_any(&["COSTLENS_EXTRACTOR_MODEL"]);
        }
        if self.filter_model.is_none() {
            self.filter_model = env_any(&["COSTLENS_FILTER_MODEL"]);
        }
        if self.report_model.is_none() {
            self.report_model = env_any(&["COSTLENS_REPORT_MODEL"]);
        }
        if self.mcp_url.is_none() {
            self.mcp_url = env_any(&["COSTLENS_MCP_URL", "MCP_URL"]);
        }
        if self.pricing_tool.is_none() {
            self.pricing_tool = env_any(&["COSTLENS_PRICING_TOOL"]);
        }
        if self.max_filter_attempts.is_none() {
            self.max_filter_attempts = env_any(&["COSTLENS_FILTER_ATTEMPTS", "MCP_FILTER_ATTEMPTS"])
                .and_then(|v| v.trim().parse().ok());
        }
        if self.call_timeout.is_none() {
            self.call_timeout = env_any(&["COSTLENS_CALL_TIMEOUT_SECS"])
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_secs);
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = env_any(&["COSTLENS_PROMPT_DIR"]).map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model used by every agent without its own override.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the extractor model.
    #[must_use]
    pub fn extractor_model(mut self, model: impl Into<String>) -> Self {
        self.extractor_model = Some(model.into());
        self
    }

    /// Sets the filter synthesis model.
    #[must_use]
    pub fn filter_model(mut self, model: impl Into<String>) -> Self {
        self.filter_model = Some(model.into());
        self
    }

    /// Sets the report model.
    #[must_use]
    pub fn report_model(mut self, model: impl Into<String>) -> Self {
        self.report_model = Some(model.into());
        self
    }

    /// Sets the extractor max tokens.
    #[must_use]
    pub const fn extractor_max_tokens(mut self, n: u32) -> Self {
        self.extractor_max_tokens = Some(n);
        self
    }

    /// Sets the filter max tokens.
    #[must_use]
    pub const fn filter_max_tokens(mut self, n: u32) -> Self {
        self.filter_max_tokens = Some(n);
        self
    }

    /// Sets the report max tokens.
    #[must_use]
    pub const fn report_max_tokens(mut self, n: u32) -> Self {
        self.report_max_tokens = Some(n);
        self
    }

    /// Sets the pricing tool endpoint.
    #[must_use]
    pub fn mcp_url(mut self, url: impl Into<String>) -> Self {
        self.mcp_url = Some(url.into());
        self
    }

    /// Sets the pricing tool name.
    #[must_use]
    pub fn pricing_tool(mut self, name: impl Into<String>) -> Self {
        self.pricing_tool = Some(name.into());
        self
    }

    /// Sets the pricing tool invocations per resource.
    #[must_use]
    pub const fn max_filter_attempts(mut self, n: usize) -> Self {
        self.max_filter_attempts = Some(n);
        self
    }

    /// Sets the per-call deadline.
    #[must_use]
    pub const fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Pricing server URL and tool name as resolved so far, with defaults.
    ///
    /// Needs no API key, so schema discovery can run without LLM
    /// credentials.
    #[must_use]
    pub fn pricing_target(&self) -> (String, String) {
        (
            self.mcp_url
                .clone()
                .unwrap_or_else(|| DEFAULT_MCP_URL.to_string()),
            self.pricing_tool
                .clone()
                .unwrap_or_else(|| DEFAULT_PRICING_TOOL.to_string()),
        )
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set, or
    /// [`AgentError::InvalidConfig`] for an attempt budget of zero or a
    /// zero call timeout.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;

        let max_filter_attempts = self.max_filter_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_filter_attempts == 0 {
            return Err(AgentError::InvalidConfig {
                message: "filter attempts must be at least 1".to_string(),
            });
        }
        if self.call_timeout.is_some_and(|t| t.is_zero()) {
            return Err(AgentError::InvalidConfig {
                message: "call timeout must be greater than zero".to_string(),
            });
        }

        let model = self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            extractor_model: self.extractor_model.unwrap_or_else(|| model.clone()),
            filter_model: self.filter_model.unwrap_or_else(|| model.clone()),
            report_model: self.report_model.unwrap_or(model),
            extractor_max_tokens: self
                .extractor_max_tokens
                .unwrap_or(DEFAULT_EXTRACTOR_MAX_TOKENS),
            filter_max_tokens: self.filter_max_tokens.unwrap_or(DEFAULT_FILTER_MAX_TOKENS),
            report_max_tokens: self.report_max_tokens.unwrap_or(DEFAULT_REPORT_MAX_TOKENS),
            mcp_url: self.mcp_url.unwrap_or_else(|| DEFAULT_MCP_URL.to_string()),
            pricing_tool: self
                .pricing_tool
                .unwrap_or_else(|| DEFAULT_PRICING_TOOL.to_string()),
            max_filter_attempts,
            call_timeout: self.call_timeout,
            prompt_dir: self.prompt_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = AgentConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.extractor_model, DEFAULT_MODEL);
        assert_eq!(config.filter_max_tokens, 400);
        assert_eq!(config.mcp_url, DEFAULT_MCP_URL);
        assert_eq!(config.pricing_tool, "get_retail_prices");
        assert_eq!(config.max_filter_attempts, 3);
        assert!(config.call_timeout.is_none());
    }

    #[test]
    fn test_builder_missing_api_key() {
        let result = AgentConfig::builder().build();
        assert!(matches!(result, Err(AgentError::ApiKeyMissing)));
    }

    #[test]
    fn test_model_fallback_and_overrides() {
        let config = AgentConfig::builder()
            .api_key("key")
            .model("gpt-4o")
            .report_model("o4-mini")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.extractor_model, "gpt-4o");
        assert_eq!(config.filter_model, "gpt-4o");
        assert_eq!(config.report_model, "o4-mini");
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let result = AgentConfig::builder()
            .api_key("key")
            .max_filter_attempts(0)
            .build();
        assert!(matches!(result, Err(AgentError::InvalidConfig { .. })));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = AgentConfig::builder()
            .api_key("key")
            .call_timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(AgentError::InvalidConfig { .. })));
    }

    #[test]
    fn test_resolution_policy() {
        let config = AgentConfig::builder()
            .api_key("key")
            .max_filter_attempts(5)
            .call_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| unreachable!());
        let policy = config.resolution_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.call_timeout, Some(Duration::from_secs(30)));
        assert_eq!(policy.restricted_fields, vec!["skuName".to_string()]);
    }

    #[test]
    fn test_pricing_target_without_api_key() {
        let (url, tool) = AgentConfig::builder().pricing_target();
        assert_eq!(url, DEFAULT_MCP_URL);
        assert_eq!(tool, DEFAULT_PRICING_TOOL);

        let (url, tool) = AgentConfig::builder()
            .mcp_url("http://pricing:9000/mcp")
            .pricing_tool("lookup")
            .pricing_target();
        assert_eq!(url, "http://pricing:9000/mcp");
        assert_eq!(tool, "lookup");
    }
}
