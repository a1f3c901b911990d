//! Conversions between weft values and SQLite storage classes.

use rusqlite::types::{Value as SqlValue, ValueRef};
use weft_query::{AttributeType, Value};

use crate::error::{SqliteError, SqliteResult};

/// Convert a weft value to an SQLite parameter.
pub fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Json(j) => SqlValue::Text(j.to_string()),
    }
}

/// Encode a value list as one JSON array parameter, for `json_each`.
///
/// Elements decode in `json_each` to the same storage class [`to_sql`]
/// binds: booleans become `1`/`0` and JSON values are passed as their text.
pub fn to_sql_array<'a>(values: impl IntoIterator<Item = &'a Value>) -> SqlValue {
    let elements: Vec<serde_json::Value> = values
        .into_iter()
        .map(|value| match value {
            Value::Json(j) => serde_json::Value::String(j.to_string()),
            other => other.to_json(),
        })
        .collect();
    SqlValue::Text(serde_json::Value::Array(elements).to_string())
}

/// Convert a stored value back, using the declared attribute type when the
/// column has one.
///
/// `Boolean` columns come back as [`Value::Bool`] and `Json` columns are
/// parsed; undeclared columns map storage classes directly.
pub fn from_sql(value: ValueRef<'_>, declared: Option<AttributeType>) -> SqliteResult<Value> {
    let value = match (value, declared) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Integer(i), Some(AttributeType::Boolean)) => Value::Bool(i != 0),
        (ValueRef::Integer(i), Some(AttributeType::Real)) => Value::Float(i as f64),
        (ValueRef::Integer(i), _) => Value::Int(i),
        (ValueRef::Real(f), _) => Value::Float(f),
        (ValueRef::Text(bytes), Some(AttributeType::Json)) => {
            let json = serde_json::from_slice(bytes)
                .map_err(|e| SqliteError::type_conversion(format!("invalid JSON: {e}")))?;
            Value::Json(json)
        }
        (ValueRef::Text(bytes), _) => Value::String(
            std::str::from_utf8(bytes)
                .map_err(|e| SqliteError::type_conversion(format!("invalid UTF-8: {e}")))?
                .to_string(),
        ),
        (ValueRef::Blob(_), _) => {
            return Err(SqliteError::type_conversion("BLOB columns are not supported"));
        }
    };
    Ok(value)
}

/// Column type used in generated DDL.
pub fn sql_type(ty: AttributeType) -> &'static str {
    match ty {
        AttributeType::Integer | AttributeType::Boolean => "INTEGER",
        AttributeType::Real => "REAL",
        AttributeType::Text | AttributeType::Json => "TEXT",
    }
}
