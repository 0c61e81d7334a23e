//! Shared test utilities for relay-db unit tests.

use chrono::{DateTime, TimeZone, Utc};
use relay_core::entities::NormalizedRecord;
use relay_core::window::Window;
use serde_json::{Map, Value, json};

use crate::service::RelayService;

/// In-memory service.
pub async fn test_service() -> RelayService {
    RelayService::new_local(":memory:").await.unwrap()
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
}

pub fn window() -> Window {
    Window::new(at(1, 0), at(8, 0)).unwrap()
}

pub fn record(id: &str, updated: Option<DateTime<Utc>>, payload: Value) -> NormalizedRecord {
    let payload = match payload {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".into(), other);
            map
        }
    };
    NormalizedRecord::new(id, "acme", at(2, 9), updated, payload).unwrap()
}

pub fn simple(id: &str, updated: Option<DateTime<Utc>>) -> NormalizedRecord {
    record(id, updated, json!({ "id": id }))
}
