//! Call records adapter.
//!
//! `GET /calls?from=&to=&per_page=&page=` returns
//! `{"calls": [...], "meta": {"next_page": n | null}}`. The cursor is the
//! 1-based page number. Call records carry no update timestamp.

use async_trait::async_trait;
use relay_cache::CacheKey;
use relay_core::entities::NormalizedRecord;
use relay_core::enums::SyncType;
use relay_core::errors::SyncError;
use relay_core::window::Window;
use serde_json::Value;

use crate::adapter::{Page, PageCursor, RateLimitHint, SourceAdapter};
use crate::client::SourceClient;
use crate::normalize::{RecordShape, bad_cursor, format_timestamp, id_field, take_array};

const SHAPE: RecordShape = RecordShape {
    id: "id",
    occurred_at: "started_at",
    updated_at: None,
};

#[derive(Debug, Clone)]
pub struct CallsAdapter {
    client: SourceClient,
    tenant: String,
    page_size: u32,
}

impl CallsAdapter {
    #[must_use]
    pub fn new(client: SourceClient, tenant: &str, page_size: u32) -> Self {
        Self {
            client,
            tenant: tenant.to_string(),
            page_size: page_size.max(1),
        }
    }

    fn page_path(&self, window: &Window, page: u64) -> String {
        format!(
            "/calls?from={}&to={}&per_page={}&page={page}",
            format_timestamp(window.start()),
            format_timestamp(window.end()),
            self.page_size,
        )
    }

    fn parse_page(
        &self,
        mut body: Value,
        page: u64,
        rate_limit: Option<RateLimitHint>,
    ) -> Result<Page, SyncError> {
        let items = take_array(&mut body, "calls")?;
        // A source echoing the current page would loop forever.
        let next_cursor = body
            .pointer("/meta/next_page")
            .and_then(Value::as_u64)
            .filter(|next| *next > page)
            .map(|next| PageCursor::new(next.to_string()));

        Ok(Page {
            records: SHAPE.normalize_all(items, &self.tenant),
            next_cursor,
            rate_limit,
        })
    }
}

fn parse_page_number(cursor: Option<&PageCursor>) -> Result<u64, SyncError> {
    match cursor {
        None => Ok(1),
        Some(c) => c
            .as_str()
            .parse::<u64>()
            .ok()
            .filter(|page| *page >= 1)
            .ok_or_else(|| bad_cursor(c.as_str())),
    }
}

#[async_trait]
impl SourceAdapter for CallsAdapter {
    fn sync_type(&self) -> SyncType {
        SyncType::CallRecords
    }

    fn tenant(&self) -> &str {
        &self.tenant
    }

    async fn fetch(
        &self,
        window: &Window,
        cursor: Option<&PageCursor>,
    ) -> Result<Page, SyncError> {
        let page = parse_page_number(cursor)?;
        let (body, rate_limit) = self.client.get_json(&self.page_path(window, page)).await?;
        self.parse_page(body, page, rate_limit)
    }

    fn enrichment_key(&self, record: &NormalizedRecord) -> Option<CacheKey> {
        let user_id = id_field(&record.payload, "user_id")?;
        Some(
            CacheKey::builder("calls.get_user")
                .arg("base_url", self.client.base_url())
                .arg("user_id", user_id)
                .build(),
        )
    }

    fn enrichment_field(&self) -> &'static str {
        "user"
    }

    async fn enrich(&self, record: &NormalizedRecord) -> Result<Value, SyncError> {
        let Some(user_id) = id_field(&record.payload, "user_id") else {
            return Ok(Value::Null);
        };
        let path = format!("/users/{}", urlencoding::encode(&user_id));
        let (body, _) = self.client.get_json(&path).await?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use relay_config::SourceConfig;
    use serde_json::json;
    use std::time::Duration;

    const FIXTURE: &str = r#"{
        "calls": [
            {"id": 9001, "user_id": 42, "started_at": 1772359200,
             "duration": 312, "direction": "inbound"},
            {"id": 9002, "user_id": 42, "started_at": "2026-03-01T11:00:00Z",
             "duration": 45, "direction": "outbound"}
        ],
        "meta": {"current_page": 1, "next_page": 2, "per_page": 2}
    }"#;

    fn adapter() -> CallsAdapter {
        let config = SourceConfig {
            base_url: "https://calls.example.test/api".into(),
            api_key: "k".into(),
            page_size: 2,
            tenant: "default".into(),
        };
        CallsAdapter::new(SourceClient::new(&config, Duration::from_secs(5)), "acme", 2)
    }

    #[test]
    fn page_path_uses_page_number() {
        let window = Window::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap(),
        )
        .unwrap();
        assert_eq!(
            adapter().page_path(&window, 3),
            "/calls?from=2026-03-01T00%3A00%3A00Z&to=2026-03-02T00%3A00%3A00Z&per_page=2&page=3"
        );
    }

    #[test]
    fn parse_page_fixture() {
        let body: Value = serde_json::from_str(FIXTURE).unwrap();
        let page = adapter().parse_page(body, 1, None).unwrap();

        assert_eq!(page.next_cursor, Some(PageCursor::new("2")));
        let ids: Vec<_> = page
            .records
            .iter()
            .map(|r| r.as_ref().unwrap().external_id.clone())
            .collect();
        assert_eq!(ids, vec!["9001", "9002"]);
        assert!(
            page.records
                .iter()
                .all(|r| r.as_ref().unwrap().updated_at_source.is_none())
        );
    }

    #[test]
    fn stale_next_page_ends_pagination() {
        let body = json!({"calls": [], "meta": {"next_page": 2}});
        assert!(adapter().parse_page(body, 2, None).unwrap().is_last());
    }

    #[test]
    fn page_numbers_parse() {
        assert_eq!(parse_page_number(None).unwrap(), 1);
        assert_eq!(parse_page_number(Some(&PageCursor::new("4"))).unwrap(), 4);
        assert!(parse_page_number(Some(&PageCursor::new("0"))).is_err());
        assert!(parse_page_number(Some(&PageCursor::new("tok"))).is_err());
    }

    #[test]
    fn enrichment_keyed_per_user() {
        let body: Value = serde_json::from_str(FIXTURE).unwrap();
        let a = adapter();
        let page = a.parse_page(body, 1, None).unwrap();
        let keys: Vec<_> = page
            .records
            .iter()
            .map(|r| a.enrichment_key(r.as_ref().unwrap()))
            .collect();
        assert!(keys[0].is_some());
        assert_eq!(keys[0], keys[1]);
    }
}
