//! Domain types shared by the pricing core, the agents and the CLI.

pub mod estimate;
pub mod filter;
pub mod resource;
pub mod schema;

pub use estimate::{CostEstimate, HOURS_PER_MONTH};
pub use filter::{FieldName, Filter, FilterValue};
pub use resource::{PriceRecord, Pricing, PricingResult, Resource, ResourcePricing};
pub use schema::{ParameterSchema, SchemaField, ValueKind};
