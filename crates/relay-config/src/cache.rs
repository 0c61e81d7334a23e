//! TTL cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const fn default_ttl_secs() -> u64 {
    300
}

const fn default_sweep_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Expiration applied when a caller does not pass its own.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// How often the background sweeper purges expired entries.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
