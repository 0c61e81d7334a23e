//! Row-to-entity parsing helpers.
//!
//! Every repo converts `libsql::Row` (column-indexed) into typed entities.
//! Timestamps are written with [`to_db_timestamp`] and read back with
//! [`parse_datetime`], which also accepts `SQLite`'s `datetime('now')` form.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::DatabaseError;

/// Canonical TEXT form of a timestamp: RFC 3339, UTC, microseconds.
#[must_use]
pub fn to_db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a required TEXT column as `DateTime<Utc>`.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the string is neither RFC 3339 nor
/// `SQLite`'s `YYYY-MM-DD HH:MM:SS`.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| DatabaseError::Query(format!("Failed to parse datetime '{s}': {e}")))
}

/// Parse an optional TEXT column as `Option<DateTime<Utc>>`.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if a non-empty string cannot be parsed.
pub fn parse_optional_datetime(s: Option<&str>) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    match s {
        Some(s) if !s.is_empty() => Ok(Some(parse_datetime(s)?)),
        _ => Ok(None),
    }
}

/// Parse a TEXT column into a `snake_case` serde enum.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the string does not match any variant.
pub fn parse_enum<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, DatabaseError> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|e| DatabaseError::Query(format!("Failed to parse enum from '{s}': {e}")))
}

/// Read a nullable TEXT column. Returns `None` for both SQL NULL and empty string.
///
/// `row.get::<String>(idx)` on a NULL column returns an error, not `""`.
///
/// # Errors
///
/// Returns `DatabaseError` if the column read fails.
pub fn get_opt_string(row: &libsql::Row, idx: i32) -> Result<Option<String>, DatabaseError> {
    match row.get::<Option<String>>(idx)? {
        Some(s) if s.is_empty() => Ok(None),
        other => Ok(other),
    }
}

/// Read a non-negative INTEGER counter column.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the stored value is negative.
pub fn get_count(row: &libsql::Row, idx: i32) -> Result<u64, DatabaseError> {
    let value = row.get::<i64>(idx)?;
    u64::try_from(value)
        .map_err(|_| DatabaseError::Query(format!("negative counter {value} in column {idx}")))
}

/// Counters are stored as SQLite's signed 64-bit integers.
#[must_use]
pub fn count_param(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Decode a JSON object column.
///
/// # Errors
///
/// Returns `DatabaseError::Query` unless the column holds a JSON object.
pub fn parse_json_object(
    s: &str,
) -> Result<serde_json::Map<String, serde_json::Value>, DatabaseError> {
    match serde_json::from_str(s)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(DatabaseError::Query(format!(
            "expected JSON object payload, found {other}"
        ))),
    }
}
