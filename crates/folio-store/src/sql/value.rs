//! Conversion between API JSON values and SQLite storage values
//!
//! Storage encodings: timestamps are INTEGER milliseconds since the epoch,
//! booleans are 0/1, JSON fields are serialized text.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use folio_core::errors::{ExError, ExErrorKind};
use folio_core::model::schema::{FieldDef, FieldType};
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Number, Value};

use crate::errors::Result;

fn mismatch(field: &FieldDef, value: &Value) -> ExError {
    ExError::new(ExErrorKind::Validation)
        .with_field(field.name)
        .with_message(format!(
            "expected {} for '{}', got {}",
            field.ty.describe(),
            field.name,
            value
        ))
}

/// Encode an API value for binding against `field`'s column
///
/// # Errors
///
/// Validation error when the value does not fit the field type.
pub fn to_sql(field: &FieldDef, value: &Value) -> Result<SqlValue> {
    let encoded = match (field.ty, value) {
        (_, Value::Null) => SqlValue::Null,
        (FieldType::Text, Value::String(s)) => SqlValue::Text(s.clone()),
        (FieldType::Int, Value::Number(n)) => {
            SqlValue::Integer(n.as_i64().ok_or_else(|| mismatch(field, value))?)
        }
        (FieldType::Bool, Value::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        (FieldType::DateTime, Value::String(s)) => {
            let parsed = DateTime::parse_from_rfc3339(s).map_err(|_| mismatch(field, value))?;
            SqlValue::Integer(parsed.timestamp_millis())
        }
        (FieldType::Json, v) => SqlValue::Text(serde_json::to_string(v)?),
        _ => return Err(mismatch(field, value)),
    };
    Ok(encoded)
}

/// Render a stored timestamp the way records expose it
pub fn millis_to_rfc3339(millis: i64) -> Result<String> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .ok_or_else(|| {
            ExError::new(ExErrorKind::Serialization)
                .with_message(format!("stored timestamp {} is out of range", millis))
        })
}

/// Current time as stored, in milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Decode a stored column value into its API representation
///
/// # Errors
///
/// Serialization error when the stored value does not match the field type.
pub fn from_sql(field: &FieldDef, value: ValueRef<'_>) -> Result<Value> {
    let corrupt = || {
        ExError::new(ExErrorKind::Serialization)
            .with_field(field.name)
            .with_message(format!(
                "stored value of '{}' is not a {}",
                field.name,
                field.ty.describe()
            ))
    };

    let decoded = match (field.ty, value) {
        (_, ValueRef::Null) => Value::Null,
        (FieldType::Text, ValueRef::Text(bytes)) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
        (FieldType::Int, ValueRef::Integer(i)) => Value::Number(i.into()),
        (FieldType::Bool, ValueRef::Integer(i)) => Value::Bool(i != 0),
        (FieldType::DateTime, ValueRef::Integer(ms)) => Value::String(millis_to_rfc3339(ms)?),
        (FieldType::Json, ValueRef::Text(bytes)) => serde_json::from_slice(bytes)?,
        _ => return Err(corrupt()),
    };
    Ok(decoded)
}

/// Decode an aggregate result column whose type SQLite decides
pub fn number_from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Bind a raw JSON number (aggregate comparisons) without a field type
pub fn number_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        _ => SqlValue::Null,
    }
}
