//! Filter types for building WHERE clauses.
//!
//! A [`Filter`] is backend-neutral: SQL backends render it to their dialect,
//! and [`Filter::matches`] evaluates it in-process (used by
//! [`MemoryStore`](crate::storage::MemoryStore)).

use std::cmp::Ordering;

use crate::value::{Key, NULL, Row, Value};

/// A complete filter over the attributes of one entity type.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// No filter (always true).
    #[default]
    None,

    /// Equals comparison.
    Equals(String, Value),
    /// Not equals comparison.
    NotEquals(String, Value),

    /// Less than comparison.
    Lt(String, Value),
    /// Less than or equal comparison.
    Lte(String, Value),
    /// Greater than comparison.
    Gt(String, Value),
    /// Greater than or equal comparison.
    Gte(String, Value),

    /// In a list of values.
    In(String, Vec<Value>),
    /// Not in a list of values.
    NotIn(String, Vec<Value>),

    /// Is null check.
    IsNull(String),
    /// Is not null check.
    IsNotNull(String),

    /// Logical AND of multiple filters.
    And(Vec<Filter>),
    /// Logical OR of multiple filters.
    Or(Vec<Filter>),
    /// Logical NOT of a filter.
    Not(Box<Filter>),
}

impl Filter {
    /// Create an empty filter (matches everything).
    pub fn none() -> Self {
        Self::None
    }

    /// Check if this filter is empty.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Equality filter.
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals(field.into(), value.into())
    }

    /// Membership filter.
    pub fn is_in(field: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        Self::In(field.into(), values.into_iter().collect())
    }

    /// Create an AND filter from multiple filters, dropping empty ones.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        let filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.into_iter().next().unwrap_or(Self::None),
            _ => Self::And(filters),
        }
    }

    /// Create an OR filter from multiple filters, dropping empty ones.
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        let filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.into_iter().next().unwrap_or(Self::None),
            _ => Self::Or(filters),
        }
    }

    /// Create a NOT filter.
    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        if filter.is_none() {
            return Self::None;
        }
        Self::Not(Box::new(filter))
    }

    /// Combine with another filter using AND.
    pub fn and_then(self, other: Filter) -> Self {
        match (self, other) {
            (Self::None, f) | (f, Self::None) => f,
            (Self::And(mut a), Self::And(b)) => {
                a.extend(b);
                Self::And(a)
            }
            (Self::And(mut a), f) => {
                a.push(f);
                Self::And(a)
            }
            (f, Self::And(mut b)) => {
                b.insert(0, f);
                Self::And(b)
            }
            (a, b) => Self::And(vec![a, b]),
        }
    }

    /// Evaluate this filter against a row.
    ///
    /// A missing attribute behaves like `NULL`. `In` never matches `NULL`,
    /// mirroring SQL.
    pub fn matches(&self, row: &Row) -> bool {
        let get = |field: &str| attribute(row, field);
        match self {
            Self::None => true,
            Self::Equals(field, value) => values_equal(get(field), value),
            Self::NotEquals(field, value) => !values_equal(get(field), value),
            Self::Lt(field, value) => compare(get(field), value) == Some(Ordering::Less),
            Self::Lte(field, value) => matches!(
                compare(get(field), value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::Gt(field, value) => compare(get(field), value) == Some(Ordering::Greater),
            Self::Gte(field, value) => matches!(
                compare(get(field), value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::In(field, values) => match get(field).key() {
                Some(key) => values.iter().any(|v| v.key().as_ref() == Some(&key)),
                None => false,
            },
            Self::NotIn(field, values) => match get(field).key() {
                Some(key) => !values.iter().any(|v| v.key().as_ref() == Some(&key)),
                None => false,
            },
            Self::IsNull(field) => get(field).is_null(),
            Self::IsNotNull(field) => !get(field).is_null(),
            Self::And(filters) => filters.iter().all(|f| f.matches(row)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(row)),
            Self::Not(filter) => !filter.matches(row),
        }
    }
}

fn attribute<'r>(row: &'r Row, name: &str) -> &'r Value {
    row.get(name).unwrap_or(&NULL)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.key(), b.key()) {
        (Some(a), Some(b)) => a == b,
        (None, None) => true,
        _ => false,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Collect the distinct non-null keys of `field` across rows, keeping the
/// order in which they first appear.
pub fn distinct_keys<'a>(rows: impl IntoIterator<Item = &'a Row>, field: &str) -> Vec<Value> {
    let mut seen: indexmap::IndexSet<Key> = indexmap::IndexSet::new();
    for row in rows {
        if let Some(key) = row.get(field).and_then(Value::key) {
            seen.insert(key);
        }
    }
    seen.iter().map(Value::from).collect()
}
