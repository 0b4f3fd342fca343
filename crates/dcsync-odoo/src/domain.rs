//! Odoo search domains: a list of `[field, operator, value]` triples that are
//! ANDed together.

use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Domain {
    conditions: Vec<(String, &'static str, Value)>,
}

impl Domain {
    /// The empty domain, which matches every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an arbitrary `[field, operator, value]` condition.
    #[must_use]
    pub fn with(mut self, field: &str, operator: &'static str, value: impl Into<Value>) -> Self {
        self.conditions
            .push((field.to_string(), operator, value.into()));
        self
    }

    #[must_use]
    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, "=", value)
    }

    #[must_use]
    pub fn ne(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, "!=", value)
    }

    #[must_use]
    pub fn is_in(self, field: &str, values: Vec<Value>) -> Self {
        self.with(field, "in", Value::Array(values))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Iterates the conditions as `(field, operator, value)`.
    pub fn conditions(&self) -> impl Iterator<Item = (&str, &'static str, &Value)> {
        self.conditions
            .iter()
            .map(|(field, op, value)| (field.as_str(), *op, value))
    }

    /// The wire form sent as the first positional argument of `search`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Array(
            self.conditions
                .iter()
                .map(|(field, op, value)| {
                    Value::Array(vec![
                        Value::from(field.as_str()),
                        Value::from(*op),
                        value.clone(),
                    ])
                })
                .collect(),
        )
    }
}
