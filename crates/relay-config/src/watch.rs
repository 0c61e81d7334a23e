//! Periodic runner settings for `rly watch`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const fn default_interval_secs() -> u64 {
    900
}

const fn default_lookback_days() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Window start when a source has no successful run yet.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            lookback_days: default_lookback_days(),
        }
    }
}

impl WatchConfig {
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
