//! Scheduled events adapter.
//!
//! `GET /scheduled_events?min_start_time=&max_start_time=&count=&page_token=`
//! returns `{"collection": [...], "pagination": {"next_page_token": ...}}`.
//! The cursor is the opaque page token handed back by the source.

use async_trait::async_trait;
use relay_cache::CacheKey;
use relay_core::entities::NormalizedRecord;
use relay_core::enums::SyncType;
use relay_core::errors::SyncError;
use relay_core::window::Window;
use serde_json::Value;

use crate::adapter::{Page, PageCursor, RateLimitHint, SourceAdapter};
use crate::client::SourceClient;
use crate::normalize::{RecordShape, format_timestamp, id_field, take_array};

const SHAPE: RecordShape = RecordShape {
    id: "uuid",
    occurred_at: "start_time",
    updated_at: Some("updated_at"),
};

#[derive(Debug, Clone)]
pub struct ScheduledEventsAdapter {
    client: SourceClient,
    tenant: String,
    page_size: u32,
}

impl ScheduledEventsAdapter {
    #[must_use]
    pub fn new(client: SourceClient, tenant: &str, page_size: u32) -> Self {
        Self {
            client,
            tenant: tenant.to_string(),
            page_size: page_size.max(1),
        }
    }

    fn page_path(&self, window: &Window, cursor: Option<&PageCursor>) -> String {
        let mut path = format!(
            "/scheduled_events?min_start_time={}&max_start_time={}&count={}",
            format_timestamp(window.start()),
            format_timestamp(window.end()),
            self.page_size,
        );
        if let Some(token) = cursor {
            path.push_str("&page_token=");
            path.push_str(&urlencoding::encode(token.as_str()));
        }
        path
    }

    fn parse_page(
        &self,
        mut body: Value,
        rate_limit: Option<RateLimitHint>,
    ) -> Result<Page, SyncError> {
        let items = take_array(&mut body, "collection")?;
        let next_cursor = body
            .pointer("/pagination/next_page_token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(PageCursor::new);

        Ok(Page {
            records: SHAPE.normalize_all(items, &self.tenant),
            next_cursor,
            rate_limit,
        })
    }
}

/// Event types may be referenced by id or by resource URI; the id is the
/// last path segment either way.
fn event_type_id(record: &NormalizedRecord) -> Option<String> {
    let raw = id_field(&record.payload, "event_type")?;
    let id = raw.trim_end_matches('/').rsplit('/').next().unwrap_or(raw.as_str());
    (!id.is_empty()).then(|| id.to_string())
}

#[async_trait]
impl SourceAdapter for ScheduledEventsAdapter {
    fn sync_type(&self) -> SyncType {
        SyncType::ScheduledEvents
    }

    fn tenant(&self) -> &str {
        &self.tenant
    }

    async fn fetch(
        &self,
        window: &Window,
        cursor: Option<&PageCursor>,
    ) -> Result<Page, SyncError> {
        let (body, rate_limit) = self.client.get_json(&self.page_path(window, cursor)).await?;
        self.parse_page(body, rate_limit)
    }

    fn enrichment_key(&self, record: &NormalizedRecord) -> Option<CacheKey> {
        let event_type = event_type_id(record)?;
        Some(
            CacheKey::builder("scheduling.get_event_type")
                .arg("base_url", self.client.base_url())
                .arg("event_type", event_type)
                .build(),
        )
    }

    fn enrichment_field(&self) -> &'static str {
        "event_type_details"
    }

    async fn enrich(&self, record: &NormalizedRecord) -> Result<Value, SyncError> {
        let Some(event_type) = event_type_id(record) else {
            return Ok(Value::Null);
        };
        let path = format!("/event_types/{}", urlencoding::encode(&event_type));
        let (body, _) = self.client.get_json(&path).await?;
        Ok(body)
    }
}
