//! Raw JSON → [`NormalizedRecord`].
//!
//! Every raw field is kept in `payload`. Only a missing or unreadable id or
//! occurrence time rejects a record, and only that record.

use chrono::{DateTime, SecondsFormat, Utc};
use relay_core::entities::NormalizedRecord;
use relay_core::errors::SyncError;
use serde_json::{Map, Value};

/// Parse an RFC 3339 string or an epoch-seconds number (integer or
/// fractional, or a string holding one).
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    s.parse::<i64>()
                        .ok()
                        .and_then(|secs| DateTime::from_timestamp(secs, 0))
                })
        }
        Value::Number(n) => n.as_i64().map_or_else(
            || n.as_f64().and_then(from_fractional_secs),
            |secs| DateTime::from_timestamp(secs, 0),
        ),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn from_fractional_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
}

/// Query-string form of a window bound.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    urlencoding::encode(&at.to_rfc3339_opts(SecondsFormat::Secs, true)).into_owned()
}

/// Where a source keeps the fields normalization needs.
#[derive(Debug, Clone, Copy)]
pub struct RecordShape {
    pub id: &'static str,
    pub occurred_at: &'static str,
    pub updated_at: Option<&'static str>,
}

impl RecordShape {
    /// # Errors
    ///
    /// Returns `SyncError::DataProcessing` when the record is not an object,
    /// lacks an id, or lacks a readable occurrence time.
    pub fn normalize(&self, raw: Value, tenant: &str) -> Result<NormalizedRecord, SyncError> {
        let Value::Object(payload) = raw else {
            return Err(SyncError::data_processing(None, "record is not a JSON object"));
        };

        let external_id = id_field(&payload, self.id).ok_or_else(|| {
            SyncError::data_processing(None, format!("missing id field '{}'", self.id))
        })?;

        let occurred_at = payload
            .get(self.occurred_at)
            .and_then(parse_timestamp)
            .ok_or_else(|| {
                SyncError::data_processing(
                    Some(&external_id),
                    format!("missing or unreadable '{}'", self.occurred_at),
                )
            })?;

        let updated_field = self
            .updated_at
            .and_then(|field| payload.get(field).map(|v| (field, v)));
        let updated_at_source = match updated_field {
            None | Some((_, Value::Null)) => None,
            Some((field, value)) => Some(parse_timestamp(value).ok_or_else(|| {
                SyncError::data_processing(Some(&external_id), format!("unreadable '{field}'"))
            })?),
        };

        NormalizedRecord::new(external_id, tenant, occurred_at, updated_at_source, payload)
    }

    /// Normalize each item independently.
    pub fn normalize_all(
        &self,
        items: Vec<Value>,
        tenant: &str,
    ) -> Vec<Result<NormalizedRecord, SyncError>> {
        items
            .into_iter()
            .map(|raw| self.normalize(raw, tenant))
            .collect()
    }
}

/// A string or numeric identifier at `field`, as a string.
pub fn id_field(payload: &Map<String, Value>, field: &str) -> Option<String> {
    match payload.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Remove and return the array at `field` from a page body.
pub fn take_array(body: &mut Value, field: &str) -> Result<Vec<Value>, SyncError> {
    match body.get_mut(field).map(Value::take) {
        Some(Value::Array(items)) => Ok(items),
        Some(Value::Null) | None => Err(decode_error(format!("page body has no '{field}' array"))),
        Some(_) => Err(decode_error(format!("'{field}' is not an array"))),
    }
}

pub fn decode_error(message: impl Into<String>) -> SyncError {
    SyncError::sync_operation("decode_page", message, false)
}

/// A cursor this adapter did not issue.
pub fn bad_cursor(cursor: &str) -> SyncError {
    SyncError::sync_operation("parse_cursor", format!("unrecognized page cursor '{cursor}'"), false)
}
