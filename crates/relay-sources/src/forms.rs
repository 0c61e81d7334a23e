//! Form submissions adapter.
//!
//! `GET /submissions?since=&until=&limit=&offset=` returns
//! `{"data": [...], "has_more": bool}`. The cursor is the offset of the next
//! page. Submissions carry `updated_at`, so edits are detected.

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
    occurred_at: "created_at",
    updated_at: Some("updated_at"),
};

#[derive(Debug, Clone)]
pub struct FormsAdapter {
    client: SourceClient,
    tenant: String,
    page_size: u32,
}

impl FormsAdapter {
    #[must_use]
    pub fn new(client: SourceClient, tenant: &str, page_size: u32) -> Self {
        Self {
            client,
            tenant: tenant.to_string(),
            page_size: page_size.max(1),
        }
    }

    fn page_path(&self, window: &Window, offset: u64) -> String {
        format!(
            "/submissions?since={}&until={}&limit={}&offset={offset}",
            format_timestamp(window.start()),
            format_timestamp(window.end()),
            self.page_size,
        )
    }

    fn parse_page(
        &self,
        mut body: Value,
        offset: u64,
        rate_limit: Option<RateLimitHint>,
    ) -> Result<Page, SyncError> {
        let items = take_array(&mut body, "data")?;
        let count = items.len() as u64;
        let has_more = body
            .get("has_more")
            .and_then(Value::as_bool)
            .unwrap_or(count >= u64::from(self.page_size));

        let next_cursor =
            (has_more && count > 0).then(|| PageCursor::new((offset + count).to_string()));

        Ok(Page {
            records: SHAPE.normalize_all(items, &self.tenant),
            next_cursor,
            rate_limit,
        })
    }
}

fn parse_offset(cursor: Option<&PageCursor>) -> Result<u64, SyncError> {
    cursor.map_or(Ok(0), |c| {
        c.as_str().parse::<u64>().map_err(|_| bad_cursor(c.as_str()))
    })
}

#[async_trait]
impl SourceAdapter for FormsAdapter {
    fn sync_type(&self) -> SyncType {
        SyncType::FormSubmissions
    }

    fn tenant(&self) -> &str {
        &self.tenant
    }

    async fn fetch(
        &self,
        window: &Window,
        cursor: Option<&PageCursor>,
    ) -> Result<Page, SyncError> {
        let offset = parse_offset(cursor)?;
        let (body, rate_limit) = self.client.get_json(&self.page_path(window, offset)).await?;
        self.parse_page(body, offset, rate_limit)
    }

    fn enrichment_key(&self, record: &NormalizedRecord) -> Option<CacheKey> {
        let form_id = id_field(&record.payload, "form_id")?;
        Some(
            CacheKey::builder("forms.get_form")
                .arg("base_url", self.client.base_url())
                .arg("form_id", form_id)
                .build(),
        )
    }

    fn enrichment_field(&self) -> &'static str {
        "form"
    }

    async fn enrich(&self, record: &NormalizedRecord) -> Result<Value, SyncError> {
        let Some(form_id) = id_field(&record.payload, "form_id") else {
            return Ok(Value::Null);
        };
        let path = format!("/forms/{}", urlencoding::encode(&form_id));
        let (body, _) = self.client.get_json(&path).await?;
        Ok(body)
    }
}
