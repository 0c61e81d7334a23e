use chrono::{DateTime, NaiveDate, Utc};
use relay_core::enums::SyncType;
use relay_core::window::Window;
use serde::de::DeserializeOwned;

/// Parse a snake_case enum value using serde-deserialization.
pub fn parse_enum<T>(raw: &str, field: &str) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let normalized = raw.replace('-', "_");
    let json = format!("\"{normalized}\"");
    serde_json::from_str(&json).map_err(|error| anyhow::anyhow!("invalid {field} '{raw}': {error}"))
}

/// Parse a source name: the sync type or its config section name.
pub fn parse_source(raw: &str) -> anyhow::Result<SyncType> {
    raw.replace('-', "_")
        .parse::<SyncType>()
        .map_err(|_| {
            anyhow::anyhow!("invalid source '{raw}': expected one of forms, scheduling, calls")
        })
}

/// RFC 3339, or a bare `YYYY-MM-DD` meaning midnight UTC.
pub fn parse_instant(raw: &str, field: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
        .ok_or_else(|| anyhow::anyhow!("invalid {field} '{raw}': expected RFC 3339 or YYYY-MM-DD"))
}

pub fn parse_window(from: &str, to: &str) -> anyhow::Result<Window> {
    let start = parse_instant(from, "--from")?;
    let end = parse_instant(to, "--to")?;
    Ok(Window::new(start, end)?)
}
