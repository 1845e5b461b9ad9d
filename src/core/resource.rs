//! Billable resources and their resolved pricing.
//!
//! [`Resource`] is what the extraction step produces; [`ResourcePricing`]
//! is what the pricing core hands back, one per input resource.

use serde::{Deserialize, Deserializer, Serialize};

/// Currency used for sentinel pricing.
pub const SENTINEL_CURRENCY: &str = "USD";

/// Unit of measure used for sentinel pricing.
pub const SENTINEL_UNIT: &str = "N/A";

/// A billable cloud resource extracted from a deployment template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Provider resource type (e.g. `Microsoft.Compute/virtualMachines`).
    #[serde(default, deserialize_with = "lenient_string")]
    pub resource_type: String,
    /// SKU or tier (e.g. `Standard_D2s_v3`).
    #[serde(default, deserialize_with = "lenient_string")]
    pub sku: String,
    /// Capacity or size (e.g. `2 vCPUs, 8 GiB`).
    #[serde(default, deserialize_with = "lenient_string")]
    pub capacity: String,
    /// ARM region name (e.g. `eastus`).
    #[serde(default, deserialize_with = "lenient_string")]
    pub arm_region_name: String,
}

impl Resource {
    /// Creates a resource from its four descriptive fields.
    pub fn new(
        resource_type: impl Into<String>,
        sku: impl Into<String>,
        capacity: impl Into<String>,
        arm_region_name: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            sku: sku.into(),
            capacity: capacity.into(),
            arm_region_name: arm_region_name.into(),
        }
    }
}

/// Accepts strings, numbers and booleans; `null` becomes an empty string.
///
/// Extraction output is model-generated, so `"capacity": 2` is as likely
/// as `"capacity": "2"`.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(String::new()),
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a scalar resource field, got {other}"
        ))),
    }
}

/// One price record as returned by the pricing tool.
///
/// Only the four fields the estimate needs are kept; the remote record
/// carries many more, which are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    /// Retail price per unit of measure.
    #[serde(default)]
    pub retail_price: f64,
    /// Unit price per unit of measure.
    #[serde(default)]
    pub unit_price: f64,
    /// ISO currency code.
    #[serde(default = "default_currency")]
    pub currency_code: String,
    /// Unit of measure (e.g. `1 Hour`).
    #[serde(default)]
    pub unit_of_measure: String,
}

fn default_currency() -> String {
    SENTINEL_CURRENCY.to_string()
}

/// The raw result set of one pricing tool call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingResult {
    /// Matching price records, possibly empty.
    #[serde(default, alias = "Items", alias = "items")]
    pub data: Vec<PriceRecord>,
}

impl PricingResult {
    /// Creates a result from a list of records.
    #[must_use]
    pub const fn new(data: Vec<PriceRecord>) -> Self {
        Self { data }
    }

    /// Returns `true` when the call matched nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the record used for pricing.
    ///
    /// Multi-record responses are accepted but only the first record is
    /// used.
    #[must_use]
    pub fn first(&self) -> Option<&PriceRecord> {
        self.data.first()
    }
}

/// Pricing attached to a resource: a real record, or the "no information"
/// sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    /// Set only on sentinel pricing.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_info: bool,
    /// Retail price per unit of measure.
    pub retail_price: f64,
    /// Unit price per unit of measure.
    pub unit_price: f64,
    /// ISO currency code.
    pub currency_code: String,
    /// Unit of measure.
    pub unit_of_measure: String,
}

impl Pricing {
    /// The sentinel used whenever no price could be determined.
    #[must_use]
    pub fn no_info() -> Self {
        Self {
            no_info: true,
            retail_price: 0.0,
            unit_price: 0.0,
            currency_code: SENTINEL_CURRENCY.to_string(),
            unit_of_measure: SENTINEL_UNIT.to_string(),
        }
    }
}

impl From<&PriceRecord> for Pricing {
    fn from(record: &PriceRecord) -> Self {
        Self {
            no_info: false,
            retail_price: record.retail_price,
            unit_price: record.unit_price,
            currency_code: record.currency_code.clone(),
            unit_of_measure: record.unit_of_measure.clone(),
        }
    }
}

/// A resource with its resolved pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePricing {
    /// The priced resource.
    #[serde(flatten)]
    pub resource: Resource,
    /// Resolved pricing or the sentinel.
    pub pricing: Pricing,
}

impl ResourcePricing {
    /// Attaches the first record of `result`, or the sentinel when empty.
    #[must_use]
    pub fn from_result(resource: Resource, result: &PricingResult) -> Self {
        let pricing = result.first().map_or_else(Pricing::no_info, Pricing::from);
        Self { resource, pricing }
    }

    /// Attaches sentinel pricing.
    #[must_use]
    pub fn no_info(resource: Resource) -> Self {
        Self {
            resource,
            pricing: Pricing::no_info(),
        }
    }

    /// Returns `true` when no price was found.
    #[must_use]
    pub const fn is_no_info(&self) -> bool {
        self.pricing.no_info
    }
}
