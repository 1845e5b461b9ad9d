//! Monthly cost roll-up.

use serde::Serialize;

use super::resource::{ResourcePricing, SENTINEL_CURRENCY};

/// Hours in an average month, used to turn hourly prices into monthly cost.
pub const HOURS_PER_MONTH: f64 = 730.0;

/// Aggregated cost estimate handed to the report generator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    /// Priced resources, in extraction order.
    pub resources: Vec<ResourcePricing>,
    /// Total monthly cost.
    pub total_cost: f64,
    /// Currency of the total.
    pub currency: String,
    /// Same as `total_cost`; kept for report consumers that expect it.
    pub monthly_cost: f64,
}

impl CostEstimate {
    /// Rolls up monthly cost as `retailPrice * 730` per resource.
    ///
    /// The retail price is treated as hourly regardless of its unit of
    /// measure; sentinel pricing contributes nothing. The currency is the
    /// last resource's currency code.
    #[must_use]
    pub fn from_resources(resources: Vec<ResourcePricing>) -> Self {
        let total_cost: f64 = resources
            .iter()
            .map(|r| r.pricing.retail_price * HOURS_PER_MONTH)
            .sum();
        let currency = resources.last().map_or_else(
            || SENTINEL_CURRENCY.to_string(),
            |r| r.pricing.currency_code.clone(),
        );

        Self {
            resources,
            total_cost,
            currency,
            monthly_cost: total_cost,
        }
    }

    /// Number of resources that carry sentinel pricing.
    #[must_use]
    pub fn unpriced_count(&self) -> usize {
        self.resources.iter().filter(|r| r.is_no_info()).count()
    }
}
