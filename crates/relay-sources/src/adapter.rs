//! The adapter seam between the orchestrator and an external system.

use std::fmt;

use async_trait::async_trait;
use relay_cache::CacheKey;
use relay_core::entities::NormalizedRecord;
use relay_core::enums::SyncType;
use relay_core::errors::SyncError;
use relay_core::window::Window;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque position in a paginated result set. Only the adapter that issued
/// it knows how to read it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageCursor(String);

impl PageCursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rate-limit budget reported alongside a page, when the source sends one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitHint {
    pub remaining: Option<u64>,
    pub reset_after_secs: Option<u64>,
}

impl RateLimitHint {
    /// True when the source says the budget is spent.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self.remaining, Some(0))
    }
}

/// One page of a fetch.
///
/// Records that failed normalization stay in place as `Err` so the
/// orchestrator can count them as skipped without abandoning the page.
#[derive(Debug, Default)]
pub struct Page {
    pub records: Vec<Result<NormalizedRecord, SyncError>>,
    pub next_cursor: Option<PageCursor>,
    pub rate_limit: Option<RateLimitHint>,
}

impl Page {
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// A paginated, restartable view of one external record stream.
///
/// `fetch` with the same `(window, cursor)` must return the same page, so a
/// page can be retried after a transient failure without re-reading earlier
/// pages.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn sync_type(&self) -> SyncType;

    /// Tenant every produced record is scoped to.
    fn tenant(&self) -> &str;

    /// Fetch the page at `cursor` (`None` for the first page) of `window`.
    async fn fetch(&self, window: &Window, cursor: Option<&PageCursor>)
    -> Result<Page, SyncError>;

    /// Cache key for this record's lookup enrichment, if it has one.
    fn enrichment_key(&self, _record: &NormalizedRecord) -> Option<CacheKey> {
        None
    }

    /// Name the lookup is stored under in the record's `enrichment` map.
    fn enrichment_field(&self) -> &'static str {
        "enrichment"
    }

    /// Perform the lookup named by [`Self::enrichment_key`].
    async fn enrich(&self, _record: &NormalizedRecord) -> Result<Value, SyncError> {
        Ok(Value::Null)
    }
}
