//! Conversion between serde values and SQLite values, per storage type.

use crate::error::{Error, Result};
use crate::schema::Column;
use crate::types::StorageType;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use serde_json::{Number, Value};
use uuid::Uuid;

const NANOS_PER_SEC: i64 = 1_000_000_000;

pub(crate) fn encode(column: &Column, value: &Value) -> Result<SqlValue> {
    encode_storage(column.storage, value)
        .map_err(|msg| Error::Conversion(format!("Column '{}': {msg}", column.name)))
}

pub(crate) fn decode(column: &Column, value: &SqlValue) -> Result<Value> {
    decode_storage(column.storage, value)
        .map_err(|msg| Error::Conversion(format!("Column '{}': {msg}", column.name)))
}

fn encode_storage(storage: StorageType, value: &Value) -> std::result::Result<SqlValue, String> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }
    match storage {
        StorageType::Binary16 => {
            let text = value
                .as_str()
                .ok_or_else(|| format!("expected a UUID string, got {value}"))?;
            let id = Uuid::parse_str(text).map_err(|e| format!("invalid UUID '{text}': {e}"))?;
            Ok(SqlValue::Blob(id.as_bytes().to_vec()))
        }
        StorageType::Text | StorageType::VarChar => value
            .as_str()
            .map(|s| SqlValue::Text(s.to_string()))
            .ok_or_else(|| format!("expected a string, got {value}")),
        StorageType::Boolean => value
            .as_bool()
            .map(|b| SqlValue::Integer(i64::from(b)))
            .ok_or_else(|| format!("expected a boolean, got {value}")),
        StorageType::Integer => {
            let n = value
                .as_i64()
                .ok_or_else(|| format!("expected an integer, got {value}"))?;
            i32::try_from(n).map_err(|_| format!("{n} does not fit in 32 bits"))?;
            Ok(SqlValue::Integer(n))
        }
        StorageType::BigInt => value
            .as_i64()
            .map(SqlValue::Integer)
            .ok_or_else(|| format!("expected a 64-bit integer, got {value}")),
        StorageType::Double | StorageType::Float => value
            .as_f64()
            .map(SqlValue::Real)
            .ok_or_else(|| format!("expected a number, got {value}")),
        StorageType::Timestamp => match value {
            Value::String(text) => {
                let ts = DateTime::parse_from_rfc3339(text)
                    .map_err(|e| format!("invalid timestamp '{text}': {e}"))?;
                ts.timestamp_nanos_opt()
                    .map(SqlValue::Integer)
                    .ok_or_else(|| format!("timestamp '{text}' is outside the years 1677 to 2262"))
            }
            Value::Number(n) => n
                .as_i64()
                .map(SqlValue::Integer)
                .ok_or_else(|| format!("expected epoch nanoseconds, got {n}")),
            other => Err(format!("expected a timestamp, got {other}")),
        },
    }
}

fn decode_storage(storage: StorageType, value: &SqlValue) -> std::result::Result<Value, String> {
    match (storage, value) {
        (_, SqlValue::Null) => Ok(Value::Null),
        (StorageType::Binary16, SqlValue::Blob(bytes)) => Uuid::from_slice(bytes)
            .map(|id| Value::String(id.to_string()))
            .map_err(|e| format!("stored identifier is not 16 bytes: {e}")),
        (StorageType::Text | StorageType::VarChar, SqlValue::Text(s)) => Ok(Value::String(s.clone())),
        (StorageType::Boolean, SqlValue::Integer(n)) => Ok(Value::Bool(*n != 0)),
        (StorageType::Integer | StorageType::BigInt, SqlValue::Integer(n)) => {
            Ok(Value::Number((*n).into()))
        }
        (StorageType::Double | StorageType::Float, SqlValue::Real(f)) => Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| format!("{f} is not a finite number")),
        (StorageType::Double | StorageType::Float, SqlValue::Integer(n)) => Number::from_f64(*n as f64)
            .map(Value::Number)
            .ok_or_else(|| format!("{n} is not a finite number")),
        (StorageType::Timestamp, SqlValue::Integer(nanos)) => {
            let secs = nanos.div_euclid(NANOS_PER_SEC);
            let sub = nanos.rem_euclid(NANOS_PER_SEC) as u32;
            DateTime::<Utc>::from_timestamp(secs, sub)
                .map(|ts| Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
                .ok_or_else(|| format!("{nanos} is out of the timestamp range"))
        }
        (storage, other) => Err(format!("stored {} does not match {storage}", sql_kind(other))),
    }
}

fn sql_kind(value: &SqlValue) -> &'static str {
    match value {
        SqlValue::Null => "null",
        SqlValue::Integer(_) => "integer",
        SqlValue::Real(_) => "real",
        SqlValue::Text(_) => "text",
        SqlValue::Blob(_) => "blob",
    }
}

/// Render a value as an SQL literal, for `DEFAULT` clauses.
pub(crate) fn sql_literal(column: &Column, value: &Value) -> Result<String> {
    Ok(match encode(column, value)? {
        SqlValue::Null => {
            return Err(Error::Schema(format!(
                "Column '{}' declares a null migration default",
                column.name
            )))
        }
        SqlValue::Integer(n) => n.to_string(),
        SqlValue::Real(f) => format!("{f:?}"),
        SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        SqlValue::Blob(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
            format!("X'{hex}'")
        }
    })
}

/// Loose JSON rendering of a raw SQL value, for raw dumps of unknown tables.
pub(crate) fn raw_json(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(n) => Value::Number(n.into()),
        SqlValue::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(bytes) => match Uuid::from_slice(&bytes) {
            Ok(id) => Value::String(id.to_string()),
            Err(_) => Value::String(bytes.iter().map(|b| format!("{b:02x}")).collect()),
        },
    }
}

/// Human-oriented rendering used in error messages.
pub(crate) fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
