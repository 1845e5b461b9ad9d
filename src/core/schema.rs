//! Parameter schema of the remote pricing tool.
//!
//! The schema is discovered when a session is established, parsed once
//! into typed fields, and then used for two things: describing the
//! accepted fields to the filter synthesizer, and validating whatever the
//! synthesizer produces before it reaches the tool.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use super::filter::{FieldName, Filter, FilterValue};
use crate::error::PricingError;

/// Declared type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// JSON string.
    String,
    /// Any JSON number.
    Number,
    /// Whole JSON number.
    Integer,
    /// JSON boolean.
    Boolean,
    /// No (or an unrecognized) type declaration; any scalar is accepted.
    Any,
}

impl ValueKind {
    fn parse(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("string") => Self::String,
            Some("number") => Self::Number,
            Some("integer") => Self::Integer,
            Some("boolean") => Self::Boolean,
            _ => Self::Any,
        }
    }

    fn accepts(self, value: &FilterValue) -> bool {
        match (self, value) {
            (Self::Any, _)
            | (Self::String, FilterValue::String(_))
            | (Self::Number, FilterValue::Number(_))
            | (Self::Boolean, FilterValue::Bool(_)) => true,
            (Self::Integer, FilterValue::Number(n)) => n.is_i64() || n.is_u64(),
            _ => false,
        }
    }
}

/// One accepted filter field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    /// Field name.
    pub name: FieldName,
    /// Declared value type.
    pub kind: ValueKind,
    /// Human-readable description, when the schema has one.
    pub description: Option<String>,
}

/// The pricing tool's input schema.
#[derive(Debug, Clone)]
pub struct ParameterSchema {
    fields: BTreeMap<String, SchemaField>,
    restricted: BTreeSet<String>,
    raw: Map<String, Value>,
}

impl ParameterSchema {
    /// Parses a JSON Schema object describing the tool's input.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Session`] if `value` is not an object or
    /// declares no properties.
    pub fn from_json(value: &Value) -> Result<Self, PricingError> {
        let raw = value
            .as_object()
            .ok_or_else(|| PricingError::session("tool input schema is not a JSON object"))?;

        let properties = raw
            .get("properties")
            .and_then(Value::as_object)
            .filter(|props| !props.is_empty())
            .ok_or_else(|| PricingError::session("tool input schema declares no properties"))?;

        let fields = properties
            .iter()
            .map(|(name, spec)| {
                let field = SchemaField {
                    name: FieldName::new(name.clone()),
                    kind: ValueKind::parse(spec.get("type")),
                    description: spec
                        .get("description")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                };
                (name.clone(), field)
            })
            .collect();

        Ok(Self {
            fields,
            restricted: BTreeSet::new(),
            raw: raw.clone(),
        })
    }

    /// Marks fields excluded from narrow (first-attempt) synthesis.
    ///
    /// Names not declared by the schema are ignored.
    #[must_use]
    pub fn with_restricted_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.restricted = names
            .into_iter()
            .map(|n| n.as_ref().to_string())
            .filter(|n| self.fields.contains_key(n))
            .collect();
        self
    }

    /// Declared fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = &SchemaField> {
        self.fields.values()
    }

    /// Looks up a declared field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.get(name)
    }

    /// Returns `true` if `name` is excluded from narrow synthesis.
    #[must_use]
    pub fn is_restricted(&self, name: &str) -> bool {
        self.restricted.contains(name)
    }

    /// Renders the schema for the synthesizer.
    ///
    /// When `permit_wide_fields` is `false`, restricted fields are removed
    /// from `properties` (and `required`) so they are not candidates.
    #[must_use]
    pub fn describe(&self, permit_wide_fields: bool) -> String {
        let mut raw = self.raw.clone();
        if !permit_wide_fields && !self.restricted.is_empty() {
            if let Some(Value::Object(props)) = raw.get_mut("properties") {
                props.retain(|name, _| !self.is_restricted(name));
            }
            if let Some(Value::Array(required)) = raw.get_mut("required") {
                required.retain(|v| v.as_str().is_none_or(|n| !self.is_restricted(n)));
            }
        }
        serde_json::to_string_pretty(&Value::Object(raw)).unwrap_or_else(|_| "{}".to_string())
    }

    /// Validates a generated JSON object and turns it into a [`Filter`].
    ///
    /// Null values are dropped, since the tool ignores them anyway.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Synthesis`] if `value` is not an object, has
    /// no usable fields, names an undeclared or (in narrow mode) restricted
    /// field, or carries a value of the wrong type.
    pub fn validate_filter(
        &self,
        value: &Value,
        permit_wide_fields: bool,
    ) -> Result<Filter, PricingError> {
        let object = value
            .as_object()
            .ok_or_else(|| PricingError::synthesis(format!("filter is not a JSON object: {value}")))?;

        let mut fields = BTreeMap::new();
        for (name, raw) in object {
            if raw.is_null() {
                continue;
            }
            let field = self
                .field(name)
                .ok_or_else(|| PricingError::synthesis(format!("unknown filter field `{name}`")))?;
            if !permit_wide_fields && self.is_restricted(name) {
                return Err(PricingError::synthesis(format!(
                    "filter field `{name}` is not permitted on this attempt"
                )));
            }
            let scalar = FilterValue::from_json(raw).ok_or_else(|| {
                PricingError::synthesis(format!("filter field `{name}` must be a scalar"))
            })?;
            if !field.kind.accepts(&scalar) {
                return Err(PricingError::synthesis(format!(
                    "filter field `{name}` expects {:?}, got {}",
                    field.kind,
                    scalar.kind()
                )));
            }
            fields.insert(field.name.clone(), scalar);
        }

        if fields.is_empty() {
            return Err(PricingError::synthesis(
                "filter must contain at least one field",
            ));
        }

        Ok(Filter::from_validated(fields))
    }
}
