//! The run loop.
//!
//! ```text
//! acquire lease → start_run → for chunk in window (ascending):
//!     for page in chunk:
//!         fetch (timeout, backoff on retryable errors)
//!         per record: enrich via cache → upsert (timeout, retry)
//!         merge page counters → checkpoint
//! → finish_run(success | partial | failed)
//! ```
//!
//! Page N+1 is never fetched before page N is fully applied. Counters cover
//! every record written, so they match the store even when a page is
//! abandoned part way. A page that cannot be fetched or applied is abandoned
//! together with the rest of its chunk; the run moves on to the next chunk.
//! A record that cannot be normalized or written is skipped on its own.
//! Authentication and authorization failures end the run at once.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use relay_core::entities::{NormalizedRecord, RunCounters, SyncRun};
use relay_core::enums::{RunStatus, UpsertOutcome};
use relay_core::errors::SyncError;
use relay_core::window::Window;
use relay_db::error::DatabaseError;
use relay_db::service::RelayService;
use relay_sources::{Page, PageCursor, RateLimitHint, SourceAdapter};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::EnrichmentCache;
use crate::backoff::sleep_or_cancel;
use crate::lease::LeaseRegistry;
use crate::settings::EngineSettings;

const CANCELLED_MESSAGE: &str = "cancelled before completion";

/// Drives sync runs. Cheap to clone; clones share the store, cache, and leases.
#[derive(Clone)]
pub struct SyncEngine {
    store: Arc<RelayService>,
    cache: Arc<EnrichmentCache>,
    leases: Arc<LeaseRegistry>,
    settings: EngineSettings,
}

/// Why a page fetch produced no page.
enum FetchFailure {
    Cancelled,
    Failed(SyncError),
}

/// Running tally for one run.
#[derive(Default)]
struct Progress {
    counters: RunCounters,
    api_calls: u64,
    pages_completed: u64,
    pages_abandoned: u64,
    last_error: Option<SyncError>,
    fatal: Option<SyncError>,
    cancelled: bool,
}

impl Progress {
    fn abandon(&mut self, error: SyncError) {
        self.pages_abandoned += 1;
        if error.is_fatal() {
            self.fatal = Some(error);
        } else {
            self.last_error = Some(error);
        }
    }

    fn outcome(&self) -> (RunStatus, Option<String>) {
        if let Some(fatal) = &self.fatal {
            return (RunStatus::Failed, Some(fatal.to_string()));
        }
        let last_error = self.last_error.as_ref().map(ToString::to_string);
        if self.cancelled {
            return (
                RunStatus::Partial,
                Some(last_error.unwrap_or_else(|| CANCELLED_MESSAGE.to_string())),
            );
        }
        match (self.pages_abandoned, self.pages_completed) {
            (0, _) => (RunStatus::Success, None),
            (_, 0) => (RunStatus::Failed, last_error),
            _ => (RunStatus::Partial, last_error),
        }
    }
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        store: Arc<RelayService>,
        cache: Arc<EnrichmentCache>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            cache,
            leases: Arc::new(LeaseRegistry::in_process()),
            settings,
        }
    }

    /// Use `leases` instead of a private in-process registry.
    #[must_use]
    pub fn with_leases(mut self, leases: Arc<LeaseRegistry>) -> Self {
        self.leases = leases;
        self
    }

    #[must_use]
    pub fn store(&self) -> &RelayService {
        &self.store
    }

    #[must_use]
    pub const fn cache(&self) -> &Arc<EnrichmentCache> {
        &self.cache
    }

    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Drop every cached lookup.
    pub fn clear_cache(&self) {
        let dropped = self.cache.len();
        self.cache.clear();
        tracing::info!(dropped, "enrichment cache cleared");
    }

    /// Sync `window` from `adapter` for the adapter's tenant.
    ///
    /// Returns the finished run; `partial` and `failed` runs are results, not
    /// errors.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if the window cannot be chunked, the lease is not
    /// acquired in time, or the run log cannot be written.
    pub async fn run(
        &self,
        adapter: &dyn SourceAdapter,
        window: Window,
        cancel: &CancellationToken,
    ) -> Result<SyncRun, SyncError> {
        let sync_type = adapter.sync_type();
        let tenant = adapter.tenant().to_string();
        let chunks = window.chunks(self.settings.chunk)?;

        let _lease = self
            .leases
            .acquire(sync_type, &tenant, self.settings.lease_wait)
            .await?;

        let (run, _recovered) = self
            .store_call("start_run", || self.store.start_run(sync_type, &tenant, window))
            .await?;

        let span = tracing::info_span!("sync_run", run_id = %run.id, %sync_type, tenant = %tenant);
        self.drive(adapter, &run, &chunks, cancel)
            .instrument(span)
            .await
    }

    /// Walk every chunk of a started run and finish it.
    async fn drive(
        &self,
        adapter: &dyn SourceAdapter,
        run: &SyncRun,
        chunks: &[Window],
        cancel: &CancellationToken,
    ) -> Result<SyncRun, SyncError> {
        tracing::info!(
            start = %run.window.start(),
            end = %run.window.end(),
            chunks = chunks.len(),
            "sync run started"
        );

        let mut progress = Progress::default();
        'chunks: for chunk in chunks {
            let mut cursor: Option<PageCursor> = None;
            loop {
                if cancel.is_cancelled() {
                    progress.cancelled = true;
                    break 'chunks;
                }

                let fetched = self
                    .fetch_with_retry(
                        adapter,
                        chunk,
                        cursor.as_ref(),
                        cancel,
                        &mut progress.api_calls,
                    )
                    .await;
                let page = match fetched {
                    Ok(page) => page,
                    Err(FetchFailure::Cancelled) => {
                        progress.cancelled = true;
                        break 'chunks;
                    }
                    Err(FetchFailure::Failed(e)) => {
                        tracing::warn!(
                            code = e.code(),
                            chunk_start = %chunk.start(),
                            error = %e,
                            "page abandoned"
                        );
                        let fatal = e.is_fatal();
                        progress.abandon(e);
                        if fatal {
                            break 'chunks;
                        }
                        continue 'chunks;
                    }
                };

                let Page {
                    records,
                    next_cursor,
                    rate_limit,
                } = page;

                let mut applied = RunCounters::default();
                let result = self
                    .apply_page(adapter, records, &mut applied, &mut progress.api_calls)
                    .await;
                progress.counters.merge(&applied);
                match result {
                    Ok(()) => progress.pages_completed += 1,
                    Err(e) => {
                        tracing::warn!(code = e.code(), error = %e, "page apply failed");
                        let fatal = e.is_fatal();
                        progress.abandon(e);
                        if fatal {
                            break 'chunks;
                        }
                        continue 'chunks;
                    }
                }

                let counters = progress.counters;
                let api_calls = progress.api_calls;
                if let Err(e) = self
                    .store_call("update_run_counters", || {
                        self.store.update_run_counters(&run.id, &counters, api_calls)
                    })
                    .await
                {
                    tracing::error!(error = %e, "run checkpoint failed, stopping");
                    progress.abandon(e);
                    break 'chunks;
                }

                if let Some(hint) = rate_limit.filter(RateLimitHint::is_exhausted) {
                    let pause = hint
                        .reset_after_secs
                        .map_or(self.settings.retry.base_delay, Duration::from_secs)
                        .min(self.settings.retry.max_delay);
                    tracing::info!(
                        pause_ms = pause.as_millis(),
                        "rate-limit budget spent, pausing"
                    );
                    if !sleep_or_cancel(pause, cancel).await {
                        progress.cancelled = true;
                        break 'chunks;
                    }
                }

                match next_cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
        }

        let (status, error_message) = progress.outcome();
        let counters = progress.counters;
        let api_calls = progress.api_calls;
        self.store_call("update_run_counters", || {
            self.store.update_run_counters(&run.id, &counters, api_calls)
        })
        .await?;
        let finished = self
            .store_call("finish_run", || {
                self.store.finish_run(&run.id, status, error_message.as_deref())
            })
            .await?;

        tracing::info!(
            status = %finished.status,
            fetched = counters.fetched,
            created = counters.created,
            updated = counters.updated,
            skipped = counters.skipped,
            api_calls,
            pages_completed = progress.pages_completed,
            pages_abandoned = progress.pages_abandoned,
            "sync run finished"
        );
        Ok(finished)
    }

    /// Fetch one page, retrying retryable failures with backoff.
    async fn fetch_with_retry(
        &self,
        adapter: &dyn SourceAdapter,
        window: &Window,
        cursor: Option<&PageCursor>,
        cancel: &CancellationToken,
        api_calls: &mut u64,
    ) -> Result<Page, FetchFailure> {
        let policy = self.settings.retry;
        let timeout = self.settings.fetch_timeout;
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(FetchFailure::Cancelled);
            }
            attempt += 1;
            *api_calls += 1;

            let result = tokio::select! {
                () = cancel.cancelled() => return Err(FetchFailure::Cancelled),
                result = tokio::time::timeout(timeout, adapter.fetch(window, cursor)) => {
                    result.unwrap_or_else(|_| {
                        Err(SyncError::network(format!(
                            "fetch timed out after {}s",
                            timeout.as_secs_f64()
                        )))
                    })
                }
            };

            match result {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && policy.should_retry(attempt) => {
                    let delay = policy.delay_for(attempt, e.retry_after());
                    tracing::warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        delay_ms = delay.as_millis(),
                        code = e.code(),
                        error = %e,
                        "fetch failed, backing off"
                    );
                    if !sleep_or_cancel(delay, cancel).await {
                        return Err(FetchFailure::Cancelled);
                    }
                }
                Err(e) => return Err(FetchFailure::Failed(e)),
            }
        }
    }

    /// Apply every record of one page, counting each into `counters` as it is
    /// written. Record-scoped failures are counted as skipped. A failure in
    /// the fetched page itself fails it before anything is written.
    async fn apply_page(
        &self,
        adapter: &dyn SourceAdapter,
        records: Vec<Result<NormalizedRecord, SyncError>>,
        counters: &mut RunCounters,
        api_calls: &mut u64,
    ) -> Result<(), SyncError> {
        if let Some(Err(e)) = records
            .iter()
            .find(|item| item.as_ref().is_err_and(|e| !e.is_record_scoped()))
        {
            return Err(e.clone());
        }

        let sync_type = adapter.sync_type();
        for item in records {
            let mut record = match item {
                Ok(record) => record,
                Err(e) => {
                    skip_record(&e);
                    counters.record(UpsertOutcome::Skipped);
                    continue;
                }
            };

            self.enrich(adapter, &mut record, api_calls).await?;

            let upsert = self
                .store_call_with(
                    "upsert_record",
                    |e| e.into_record_error(&record.external_id, "upsert_record"),
                    || self.store.upsert_record(sync_type, &record),
                )
                .await;
            match upsert {
                Ok(outcome) => counters.record(outcome),
                Err(e) if e.is_record_scoped() => {
                    skip_record(&e);
                    counters.record(UpsertOutcome::Skipped);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Attach the adapter's lookup enrichment, read through the cache.
    ///
    /// Only authentication and authorization failures propagate; any other
    /// lookup failure leaves the record unenriched.
    async fn enrich(
        &self,
        adapter: &dyn SourceAdapter,
        record: &mut NormalizedRecord,
        api_calls: &mut u64,
    ) -> Result<(), SyncError> {
        let Some(key) = adapter.enrichment_key(record) else {
            return Ok(());
        };

        let timeout = self.settings.fetch_timeout;
        let mut fetched = false;
        let lookup = {
            let record: &NormalizedRecord = record;
            self.cache
                .get_or_try_insert_with(key.clone(), Some(self.settings.enrichment_ttl), || {
                    fetched = true;
                    async move {
                        tokio::time::timeout(timeout, adapter.enrich(record))
                            .await
                            .unwrap_or_else(|_| {
                                Err(SyncError::network("enrichment lookup timed out"))
                            })
                    }
                })
                .await
        };
        if fetched {
            *api_calls += 1;
        }

        match lookup {
            Ok(Value::Null) => {}
            Ok(value) => {
                record
                    .enrichment
                    .insert(adapter.enrichment_field().to_string(), value);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    external_id = %record.external_id,
                    code = e.code(),
                    error = %e,
                    "enrichment lookup failed, applying record without it"
                );
            }
        }
        Ok(())
    }

    /// Run a store operation under the store timeout, retrying transient
    /// failures with the run's backoff policy.
    async fn store_call<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DatabaseError>>,
    {
        self.store_call_with(operation, |e| e.into_sync_error(operation), call)
            .await
    }

    /// [`Self::store_call`] with a caller-chosen classification of store
    /// errors.
    async fn store_call_with<T, C, F, Fut>(
        &self,
        operation: &str,
        classify: C,
        mut call: F,
    ) -> Result<T, SyncError>
    where
        C: Fn(DatabaseError) -> SyncError,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DatabaseError>>,
    {
        let policy = self.settings.retry;
        let timeout = self.settings.store_timeout;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match tokio::time::timeout(timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => classify(e),
                Err(_) => SyncError::network(format!(
                    "{operation} timed out after {}s",
                    timeout.as_secs_f64()
                )),
            };
            if !(error.is_retryable() && policy.should_retry(attempt)) {
                return Err(error);
            }
            let delay = policy.delay_for(attempt, None);
            tracing::warn!(
                operation,
                attempt,
                delay_ms = delay.as_millis(),
                error = %error,
                "store call failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn skip_record(error: &SyncError) {
    tracing::warn!(
        code = error.code(),
        context = %error.context(),
        error = %error,
        "record skipped"
    );
}
