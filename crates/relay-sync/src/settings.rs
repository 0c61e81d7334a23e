use std::time::Duration;

use chrono::TimeDelta;
use relay_config::SyncConfig;

use crate::backoff::RetryPolicy;

/// Orchestrator tuning resolved from [`SyncConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub chunk: TimeDelta,
    pub retry: RetryPolicy,
    pub fetch_timeout: Duration,
    pub store_timeout: Duration,
    pub lease_wait: Duration,
    pub enrichment_ttl: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

impl EngineSettings {
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            chunk: TimeDelta::days(i64::from(config.chunk_days.max(1))),
            retry: RetryPolicy::from_config(config),
            fetch_timeout: config.fetch_timeout(),
            store_timeout: config.store_timeout(),
            lease_wait: config.lease_wait(),
            enrichment_ttl: config.enrichment_ttl(),
        }
    }
}
