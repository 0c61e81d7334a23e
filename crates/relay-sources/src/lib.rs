//! # relay-sources
//!
//! Source adapters for relay.
//!
//! Each adapter pulls one record stream over HTTP/JSON and translates it into
//! [`NormalizedRecord`](relay_core::entities::NormalizedRecord)s, one page at
//! a time:
//! - form submissions (offset pagination)
//! - scheduled events (opaque page-token pagination)
//! - call records (page-number pagination)
//!
//! Failures are translated into [`SyncError`](relay_core::errors::SyncError)
//! at the HTTP boundary so the orchestrator can branch on kind alone.

pub mod calls;
pub mod forms;
pub mod scheduling;

mod adapter;
mod client;
mod http;
mod normalize;

pub use adapter::{Page, PageCursor, RateLimitHint, SourceAdapter};
pub use client::SourceClient;
pub use normalize::parse_timestamp;

use std::sync::Arc;
use std::time::Duration;

use relay_config::SourceConfig;
use relay_core::enums::SyncType;

/// Build the HTTP adapter for `sync_type`, tagging records with `tenant`.
#[must_use]
pub fn adapter_for(
    sync_type: SyncType,
    config: &SourceConfig,
    tenant: &str,
    timeout: Duration,
) -> Arc<dyn SourceAdapter> {
    let client = SourceClient::new(config, timeout);
    match sync_type {
        SyncType::FormSubmissions => Arc::new(forms::FormsAdapter::new(
            client,
            tenant,
            config.page_size,
        )),
        SyncType::ScheduledEvents => Arc::new(scheduling::ScheduledEventsAdapter::new(
            client,
            tenant,
            config.page_size,
        )),
        SyncType::CallRecords => Arc::new(calls::CallsAdapter::new(
            client,
            tenant,
            config.page_size,
        )),
    }
}
