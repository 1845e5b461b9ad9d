//! Pricing filters.
//!
//! A [`Filter`] maps schema field names to scalar values. Filters can only
//! be built through [`ParameterSchema::validate_filter`], so every filter in
//! circulation is non-empty and uses declared fields only.
//!
//! [`ParameterSchema::validate_filter`]: super::ParameterSchema::validate_filter

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A field name declared by the pricing tool's parameter schema.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldName(String);

impl FieldName {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the field name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A scalar filter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Boolean value.
    Bool(bool),
    /// Numeric value (integer or float, preserved as given).
    Number(serde_json::Number),
    /// String value.
    String(String),
}

impl FilterValue {
    /// Converts a JSON scalar; returns `None` for null, arrays and objects.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => Some(Self::Number(n.clone())),
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }

    /// Converts back to a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::String(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Kind label used in validation messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
        }
    }
}

/// A validated, non-empty pricing filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Filter {
    fields: BTreeMap<FieldName, FilterValue>,
}

impl Filter {
    /// Built only by schema validation, which guarantees `fields` is non-empty.
    pub(crate) const fn from_validated(fields: BTreeMap<FieldName, FilterValue>) -> Self {
        Self { fields }
    }

    /// Number of fields in the filter (always at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always `false`; present for API symmetry with [`Filter::len`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Looks up a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.fields
            .iter()
            .find(|(name, _)| name.as_str() == field)
            .map(|(_, value)| value)
    }

    /// Returns `true` if the filter sets `field`.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Iterates fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldName, &FilterValue)> {
        self.fields.iter()
    }

    /// Renders the filter as a JSON object for the tool call.
    #[must_use]
    pub fn to_json_object(&self) -> serde_json::Map<String, serde_json::Value> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.to_json()))
            .collect()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::Value::Object(self.to_json_object());
        write!(f, "{json}")
    }
}
