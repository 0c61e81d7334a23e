//! Orchestrator tuning: chunking, retry/backoff, timeouts, leases.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const fn default_chunk_days() -> u32 {
    7
}

const fn default_max_attempts() -> u32 {
    4
}

const fn default_base_delay_ms() -> u64 {
    500
}

const fn default_max_delay_ms() -> u64 {
    30_000
}

const fn default_fetch_timeout_secs() -> u64 {
    30
}

const fn default_store_timeout_secs() -> u64 {
    10
}

const fn default_lease_wait_secs() -> u64 {
    300
}

const fn default_enrichment_ttl_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Size of each date-range chunk a window is split into.
    #[serde(default = "default_chunk_days")]
    pub chunk_days: u32,

    /// Attempts per page, including the first call.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound for any single backoff sleep, including `Retry-After`.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,

    /// How long a run waits for another run on the same source and tenant.
    #[serde(default = "default_lease_wait_secs")]
    pub lease_wait_secs: u64,

    /// TTL for cached enrichment lookups.
    #[serde(default = "default_enrichment_ttl_secs")]
    pub enrichment_ttl_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chunk_days: default_chunk_days(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            store_timeout_secs: default_store_timeout_secs(),
            lease_wait_secs: default_lease_wait_secs(),
            enrichment_ttl_secs: default_enrichment_ttl_secs(),
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    #[must_use]
    pub const fn lease_wait(&self) -> Duration {
        Duration::from_secs(self.lease_wait_secs)
    }

    #[must_use]
    pub const fn enrichment_ttl(&self) -> Duration {
        Duration::from_secs(self.enrichment_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = SyncConfig::default();
        assert_eq!(config.chunk_days, 7);
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.base_delay(), Duration::from_millis(500));
        assert_eq!(config.max_delay(), Duration::from_secs(30));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(config.store_timeout(), Duration::from_secs(10));
    }
}
