//! Scripted adapter and fixtures shared by the orchestrator tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use relay_cache::CacheKey;
use relay_core::entities::NormalizedRecord;
use relay_core::enums::SyncType;
use relay_core::errors::SyncError;
use relay_core::window::Window;
use relay_db::service::RelayService;
use relay_sources::{Page, PageCursor, RateLimitHint, SourceAdapter};
use relay_sync::{EngineSettings, EnrichmentCache, RetryPolicy, SyncEngine};
use serde_json::{Value, json};

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
}

/// One week, which is one chunk under [`fast_settings`].
pub fn week() -> Window {
    Window::new(at(1, 0), at(8, 0)).unwrap()
}

/// Millisecond backoff and short timeouts so failure paths run quickly.
pub fn fast_settings() -> EngineSettings {
    EngineSettings {
        chunk: TimeDelta::days(7),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
        fetch_timeout: Duration::from_millis(200),
        store_timeout: Duration::from_secs(5),
        lease_wait: Duration::from_millis(50),
        enrichment_ttl: Duration::from_secs(60),
    }
}

pub async fn engine_with(settings: EngineSettings) -> SyncEngine {
    let store = RelayService::new_local(":memory:").await.unwrap();
    let cache = EnrichmentCache::new(Duration::from_secs(60));
    SyncEngine::new(Arc::new(store), Arc::new(cache), settings)
}

pub async fn engine() -> SyncEngine {
    engine_with(fast_settings()).await
}

pub fn rec(id: &str, updated_hour: Option<u32>, body: Value) -> NormalizedRecord {
    let Value::Object(payload) = body else {
        panic!("payload must be an object");
    };
    NormalizedRecord::new(id, "acme", at(2, 9), updated_hour.map(|h| at(2, h)), payload).unwrap()
}

pub fn ok(id: &str) -> Result<NormalizedRecord, SyncError> {
    Ok(rec(id, None, json!({ "id": id })))
}

/// What the adapter does on its next `fetch`.
pub enum Step {
    Page {
        records: Vec<Result<NormalizedRecord, SyncError>>,
        next: Option<&'static str>,
        rate_limit: Option<RateLimitHint>,
    },
    Fail(SyncError),
    Stall(Duration),
}

pub fn page(records: Vec<Result<NormalizedRecord, SyncError>>, next: Option<&'static str>) -> Step {
    Step::Page {
        records,
        next,
        rate_limit: None,
    }
}

/// Serves scripted steps in order; once the script runs out it returns an
/// empty last page.
pub struct ScriptedAdapter {
    sync_type: SyncType,
    tenant: String,
    steps: Mutex<VecDeque<Step>>,
    fetches: Mutex<Vec<(Window, Option<String>)>>,
    enrichment: Option<Result<Value, SyncError>>,
    lookups: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            sync_type: SyncType::CallRecords,
            tenant: "acme".into(),
            steps: Mutex::new(steps.into()),
            fetches: Mutex::new(Vec::new()),
            enrichment: None,
            lookups: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant: &str) -> Self {
        self.tenant = tenant.to_string();
        self
    }

    /// Enrich records that carry an `owner` field with `result`.
    #[must_use]
    pub fn with_enrichment(mut self, result: Result<Value, SyncError>) -> Self {
        self.enrichment = Some(result);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    pub fn fetched_cursors(&self) -> Vec<Option<String>> {
        self.fetches.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn fetched_windows(&self) -> Vec<Window> {
        self.fetches.lock().unwrap().iter().map(|(w, _)| *w).collect()
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn sync_type(&self) -> SyncType {
        self.sync_type
    }

    fn tenant(&self) -> &str {
        &self.tenant
    }

    async fn fetch(&self, window: &Window, cursor: Option<&PageCursor>) -> Result<Page, SyncError> {
        self.fetches
            .lock()
            .unwrap()
            .push((*window, cursor.map(|c| c.as_str().to_string())));
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            None => Ok(Page::default()),
            Some(Step::Page {
                records,
                next,
                rate_limit,
            }) => Ok(Page {
                records,
                next_cursor: next.map(PageCursor::new),
                rate_limit,
            }),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Stall(duration)) => {
                tokio::time::sleep(duration).await;
                Ok(Page::default())
            }
        }
    }

    fn enrichment_key(&self, record: &NormalizedRecord) -> Option<CacheKey> {
        self.enrichment.as_ref()?;
        let owner = record.payload.get("owner")?.as_str()?;
        Some(CacheKey::builder("scripted.get_owner").arg("owner", owner).build())
    }

    fn enrichment_field(&self) -> &'static str {
        "owner_details"
    }

    async fn enrich(&self, _record: &NormalizedRecord) -> Result<Value, SyncError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.enrichment.clone().unwrap_or(Ok(Value::Null))
    }
}
