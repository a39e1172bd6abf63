//! Engine-level filter expressions.
//!
//! A filter set maps a payload field either to a bare value (equality) or to a
//! single-operator object such as `{"in": ["fact", "preference"]}`. Only
//! equality and set-membership are supported; anything else is rejected.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::VectorStoreError;

/// Filter set as handed over by the memory engine.
pub type Filters = BTreeMap<String, Value>;

/// A supported filter operator with its operand.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(Value),
    In(Vec<Value>),
}

/// One parsed `field -> operator` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub field: String,
    pub op: FilterOp,
}

impl FilterCondition {
    /// Parse one filter entry, rejecting unsupported operators.
    pub fn parse(field: &str, value: &Value) -> Result<Self, VectorStoreError> {
        if field.is_empty() {
            return Err(VectorStoreError::validation("filter field must not be empty"));
        }
        if field.starts_with('$') {
            return Err(VectorStoreError::validation(format!(
                "filter field '{field}' must not start with '$'"
            )));
        }

        let op = match value {
            Value::Object(obj) => parse_operator(field, obj)?,
            other => FilterOp::Eq(other.clone()),
        };

        Ok(Self {
            field: field.to_string(),
            op,
        })
    }

    /// Evaluate the condition against a flat payload.
    pub fn matches(&self, payload: &Map<String, Value>) -> bool {
        let actual = payload.get(&self.field);
        match &self.op {
            FilterOp::Eq(expected) => value_matches_eq(actual, expected),
            FilterOp::In(options) => options.iter().any(|o| value_matches_eq(actual, o)),
        }
    }
}

fn parse_operator(field: &str, obj: &Map<String, Value>) -> Result<FilterOp, VectorStoreError> {
    let mut entries = obj.iter();
    let (Some((op, operand)), None) = (entries.next(), entries.next()) else {
        return Err(VectorStoreError::validation(format!(
            "filter on '{field}' must contain exactly one operator"
        )));
    };

    match op.as_str() {
        "eq" => Ok(FilterOp::Eq(operand.clone())),
        "in" => match operand {
            Value::Array(items) => Ok(FilterOp::In(items.clone())),
            _ => Err(VectorStoreError::validation(format!(
                "operator 'in' on '{field}' requires an array"
            ))),
        },
        other => Err(VectorStoreError::validation(format!(
            "unsupported filter operator '{other}' on '{field}'"
        ))),
    }
}

/// Parse a whole filter set. Conditions come out in field order.
pub fn parse_filters(filters: &Filters) -> Result<Vec<FilterCondition>, VectorStoreError> {
    filters
        .iter()
        .map(|(field, value)| FilterCondition::parse(field, value))
        .collect()
}

/// Document-store equality: a missing field equals `null`, an array field
/// matches when any element equals the operand, numbers compare by value.
pub fn value_matches_eq(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None | Some(Value::Null) => expected.is_null(),
        Some(Value::Array(items)) => {
            values_equal(&Value::Array(items.clone()), expected)
                || items.iter().any(|item| values_equal(item, expected))
        }
        Some(value) => values_equal(value, expected),
    }
}

pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}
