//! Index query model
//!
//! A small query AST shared between the collector and the index engine.
//! The collector treats the plan query as opaque except for two
//! operations it performs itself: wrapping it into a boolean
//! `must AND NOT must_not` conjunction, and building typed range queries
//! for sorted-pagination exclusion filters.
//!
//! Matching is strict: no type coercion, missing fields never match,
//! null values never match a range.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A query over the documents of one shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    /// Matches every document.
    MatchAll,
    /// Exact equality on one field, no coercion.
    Term { field: String, value: Value },
    /// Typed range over one field.
    Range(RangeQuery),
    /// Boolean conjunction: all of `must`, none of `must_not`.
    Bool {
        must: Vec<Query>,
        must_not: Vec<Query>,
    },
}

/// A range over one field with optional open bounds.
///
/// Both bounds absent means "field has a non-null value".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeQuery {
    pub field: String,
    pub lower: Option<Value>,
    pub upper: Option<Value>,
    pub include_lower: bool,
    pub include_upper: bool,
}

/// Builds a range query for a typed column.
pub fn range_query(
    field: impl Into<String>,
    lower: Option<Value>,
    upper: Option<Value>,
    include_lower: bool,
    include_upper: bool,
) -> RangeQuery {
    RangeQuery {
        field: field.into(),
        lower,
        upper,
        include_lower,
        include_upper,
    }
}

impl Query {
    /// Wraps queries into a boolean conjunction.
    pub fn bool(must: Vec<Query>, must_not: Vec<Query>) -> Query {
        Query::Bool { must, must_not }
    }

    /// Checks whether a document matches this query.
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Query::MatchAll => true,
            Query::Term { field, value } => match document.get(field) {
                Some(actual) if !actual.is_null() => actual == value,
                _ => false,
            },
            Query::Range(range) => range.matches(document),
            Query::Bool { must, must_not } => {
                must.iter().all(|q| q.matches(document))
                    && !must_not.iter().any(|q| q.matches(document))
            }
        }
    }
}

impl RangeQuery {
    /// Checks whether a document's field value falls inside the range.
    pub fn matches(&self, document: &Value) -> bool {
        let actual = match document.get(&self.field) {
            Some(v) if !v.is_null() => v,
            _ => return false,
        };
        if let Some(lower) = &self.lower {
            let ord = compare_values(actual, lower);
            let ok = if self.include_lower {
                ord != Ordering::Less
            } else {
                ord == Ordering::Greater
            };
            if !ok {
                return false;
            }
        }
        if let Some(upper) = &self.upper {
            let ord = compare_values(actual, upper);
            let ok = if self.include_upper {
                ord != Ordering::Greater
            } else {
                ord == Ordering::Less
            };
            if !ok {
                return false;
            }
        }
        true
    }
}

/// Total order over values for range matching and sort-key comparison.
///
/// Ordering rules:
/// - null < bool < number < string < array < object
/// - For same types, natural ordering
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let type_order = |v: &Value| -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    };

    let a_type = type_order(a);
    let b_type = type_order(b);
    if a_type != b_type {
        return a_type.cmp(&b_type);
    }

    match (a, b) {
        (Value::Bool(a_b), Value::Bool(b_b)) => a_b.cmp(b_b),
        (Value::Number(a_n), Value::Number(b_n)) => {
            if let (Some(ai), Some(bi)) = (a_n.as_i64(), b_n.as_i64()) {
                return ai.cmp(&bi);
            }
            let a_f = a_n.as_f64().unwrap_or(0.0);
            let b_f = b_n.as_f64().unwrap_or(0.0);
            a_f.partial_cmp(&b_f).unwrap_or(Ordering::Equal)
        }
        (Value::String(a_s), Value::String(b_s)) => a_s.cmp(b_s),
        _ => Ordering::Equal,
    }
}
