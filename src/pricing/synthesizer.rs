//! Filter synthesis capability.

use async_trait::async_trait;

use crate::core::{Filter, ParameterSchema, Resource};
use crate::error::PricingError;

/// Feedback about earlier attempts that matched nothing.
#[derive(Debug, Clone, Copy)]
pub struct Feedback<'a> {
    /// Every filter tried so far for this resource, oldest first.
    pub rejected: &'a [Filter],
}

impl Feedback<'_> {
    /// Renders the feedback message appended to the synthesis prompt.
    #[must_use]
    pub fn message(&self) -> String {
        let tried: Vec<serde_json::Value> = self
            .rejected
            .iter()
            .map(|f| serde_json::Value::Object(f.to_json_object()))
            .collect();
        let tried = serde_json::to_string_pretty(&tried).unwrap_or_else(|_| "[]".to_string());
        format!(
            "The previous filter returned zero results from the pricing tool. \
             Create a different filter for this resource. Less is more! \
             Previous filters that returned zero results:\n{tried}"
        )
    }
}

/// Everything a synthesizer needs for one attempt.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    /// Resource to price.
    pub resource: &'a Resource,
    /// Tool schema the filter must conform to.
    pub schema: &'a ParameterSchema,
    /// Earlier empty-result filters; `None` on the first attempt.
    pub feedback: Option<Feedback<'a>>,
    /// Whether restricted (identifying) fields may be used.
    pub permit_wide_fields: bool,
}

impl SynthesisRequest<'_> {
    /// Schema text for this attempt, with restricted fields hidden in
    /// narrow mode.
    #[must_use]
    pub fn schema_description(&self) -> String {
        self.schema.describe(self.permit_wide_fields)
    }

    /// Validates a generated JSON value against this attempt's rules.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Synthesis`] when the value is not a valid
    /// filter for the schema.
    pub fn validate(&self, value: &serde_json::Value) -> Result<Filter, PricingError> {
        self.schema.validate_filter(value, self.permit_wide_fields)
    }
}

/// Produces a candidate filter for one resource.
#[async_trait]
pub trait FilterSynthesizer: Send + Sync {
    /// Synthesizes one filter.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Synthesis`] if generation fails or its
    /// output is not a valid filter for the schema.
    async fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<Filter, PricingError>;
}
