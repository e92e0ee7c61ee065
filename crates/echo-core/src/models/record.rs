use std::collections::BTreeSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use thiserror::Error;

use crate::models::Metadata;

/// Flat key/value form every entity crosses the collaborator boundary in.
pub type Record = serde_json::Map<String, Value>;

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },
    #[error("invalid value for field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}

pub type ValidationResult<T> = Result<T, ValidationError>;

fn present<'a>(record: &'a Record, field: &'static str) -> Option<&'a Value> {
    record.get(field).filter(|value| !value.is_null())
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidField {
        field,
        reason: reason.into(),
    }
}

pub(crate) fn required<'a>(
    record: &'a Record,
    field: &'static str,
) -> ValidationResult<&'a Value> {
    present(record, field).ok_or(ValidationError::MissingField { field })
}

pub(crate) fn required_str(record: &Record, field: &'static str) -> ValidationResult<String> {
    as_string(required(record, field)?, field)
}

pub(crate) fn optional_str(record: &Record, field: &'static str) -> ValidationResult<Option<String>> {
    present(record, field)
        .map(|value| as_string(value, field))
        .transpose()
}

pub(crate) fn required_u64(record: &Record, field: &'static str) -> ValidationResult<u64> {
    as_u64(required(record, field)?, field)
}

pub(crate) fn optional_u64(record: &Record, field: &'static str) -> ValidationResult<Option<u64>> {
    present(record, field)
        .map(|value| as_u64(value, field))
        .transpose()
}

pub(crate) fn required_f64(record: &Record, field: &'static str) -> ValidationResult<f64> {
    as_f64(required(record, field)?, field)
}

pub(crate) fn optional_f64(record: &Record, field: &'static str) -> ValidationResult<Option<f64>> {
    present(record, field)
        .map(|value| as_f64(value, field))
        .transpose()
}

pub(crate) fn required_i64(record: &Record, field: &'static str) -> ValidationResult<i64> {
    as_i64(required(record, field)?, field)
}

pub(crate) fn optional_i64(record: &Record, field: &'static str) -> ValidationResult<Option<i64>> {
    present(record, field)
        .map(|value| as_i64(value, field))
        .transpose()
}

pub(crate) fn required_bool(record: &Record, field: &'static str) -> ValidationResult<bool> {
    match required(record, field)? {
        Value::Bool(flag) => Ok(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(invalid(field, "expected a boolean")),
        },
        _ => Err(invalid(field, "expected a boolean")),
    }
}

pub(crate) fn required_timestamp(
    record: &Record,
    field: &'static str,
) -> ValidationResult<SystemTime> {
    as_timestamp(required(record, field)?, field)
}

pub(crate) fn optional_timestamp(
    record: &Record,
    field: &'static str,
) -> ValidationResult<Option<SystemTime>> {
    present(record, field)
        .map(|value| as_timestamp(value, field))
        .transpose()
}

pub(crate) fn string_list(record: &Record, field: &'static str) -> ValidationResult<Vec<String>> {
    let Some(value) = present(record, field) else {
        return Ok(Vec::new());
    };
    let Value::Array(items) = value else {
        return Err(invalid(field, "expected a list of strings"));
    };
    items.iter().map(|item| as_string(item, field)).collect()
}

pub(crate) fn string_set(
    record: &Record,
    field: &'static str,
) -> ValidationResult<BTreeSet<String>> {
    Ok(string_list(record, field)?.into_iter().collect())
}

pub(crate) fn metadata(record: &Record, field: &'static str) -> ValidationResult<Metadata> {
    match present(record, field) {
        None => Ok(Metadata::new()),
        Some(Value::Object(map)) => Ok(map
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()),
        Some(_) => Err(invalid(field, "expected a key/value mapping")),
    }
}

pub(crate) fn metadata_value(metadata: &Metadata) -> Value {
    Value::Object(
        metadata
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    )
}

pub(crate) fn string_list_value<'a>(items: impl IntoIterator<Item = &'a String>) -> Value {
    Value::Array(items.into_iter().cloned().map(Value::String).collect())
}

/// Timestamps travel as integer nanoseconds since the unix epoch.
pub(crate) fn timestamp_value(value: SystemTime) -> Value {
    match unix_nanos(value) {
        Some(nanos) => Value::from(nanos),
        None => Value::Null,
    }
}

pub(crate) fn optional_timestamp_value(value: Option<SystemTime>) -> Value {
    value.map(timestamp_value).unwrap_or(Value::Null)
}

pub fn unix_nanos(value: SystemTime) -> Option<i64> {
    let duration = value.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(duration.as_nanos()).ok()
}

pub fn from_unix_nanos(value: i64) -> Option<SystemTime> {
    let nanos = u64::try_from(value).ok()?;
    Some(UNIX_EPOCH + Duration::from_nanos(nanos))
}

fn as_string(value: &Value, field: &'static str) -> ValidationResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(field, "expected a string"))
}

fn as_u64(value: &Value, field: &'static str) -> ValidationResult<u64> {
    value
        .as_u64()
        .ok_or_else(|| invalid(field, "expected a non-negative integer"))
}

fn as_i64(value: &Value, field: &'static str) -> ValidationResult<i64> {
    value
        .as_i64()
        .ok_or_else(|| invalid(field, "expected a signed integer"))
}

fn as_f64(value: &Value, field: &'static str) -> ValidationResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| invalid(field, "expected a number"))
}

fn as_timestamp(value: &Value, field: &'static str) -> ValidationResult<SystemTime> {
    value
        .as_i64()
        .and_then(from_unix_nanos)
        .ok_or_else(|| invalid(field, "expected unix nanoseconds"))
}
