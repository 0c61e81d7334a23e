//! # relay-sync
//!
//! The sync orchestrator.
//!
//! [`SyncEngine::run`] drives one run for one `(sync_type, tenant, window)`:
//! it takes the pair's lease, records the run, walks the window chunk by chunk
//! and page by page, resolves enrichment through the shared cache, feeds the
//! dedup engine, and finishes the run as `success`, `partial`, or `failed`.

mod backoff;
mod engine;
mod lease;
mod settings;

pub use backoff::RetryPolicy;
pub use engine::SyncEngine;
pub use lease::{Lease, LeaseRegistry};
pub use settings::EngineSettings;

/// Shared enrichment cache type.
pub type EnrichmentCache = relay_cache::TtlCache<serde_json::Value>;
