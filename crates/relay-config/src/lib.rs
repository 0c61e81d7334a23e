//! # relay-config
//!
//! Layered configuration loading for relay using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`RELAY_*` prefix, `__` as separator)
//! 2. Project-level `.relay/config.toml`
//! 3. User-level `~/.config/relay/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `RELAY_SOURCES__CALLS__API_KEY` -> `sources.calls.api_key`,
//! `RELAY_SYNC__MAX_ATTEMPTS` -> `sync.max_attempts`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use relay_config::RelayConfig;
//!
//! let config = RelayConfig::load_with_dotenv().expect("config");
//! for sync_type in config.sources.configured() {
//!     println!("{sync_type} is ready");
//! }
//! ```

mod cache;
mod database;
mod error;
mod sources;
mod sync;
mod watch;

pub use cache::CacheConfig;
pub use database::DatabaseConfig;
pub use error::ConfigError;
pub use sources::{SourceConfig, SourcesConfig};
pub use sync::SyncConfig;
pub use watch::WatchConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use relay_core::enums::SyncType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

impl RelayConfig {
    /// Load configuration from all sources (TOML files + environment variables)
    /// and validate it.
    ///
    /// Does NOT call `dotenvy` -- use [`Self::load_with_dotenv`] for `.env` loading.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if extraction fails or a value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `.env` file support.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if extraction fails or a value is out of range.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        Self::load_dotenv_from_workspace();
        Self::load()
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment or layer providers on top.
    #[must_use]
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Layer 1: User-global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        // Layer 2: Project-local config
        let local_path = PathBuf::from(".relay/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        // Layer 3: Environment variables (highest priority)
        figment.merge(Env::prefixed("RELAY_").split("__"))
    }

    /// Reject values the orchestrator cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.chunk_days == 0 {
            return Err(invalid("sync.chunk_days", "must be at least 1"));
        }
        if self.sync.max_attempts == 0 {
            return Err(invalid("sync.max_attempts", "must be at least 1"));
        }
        if self.sync.base_delay_ms > self.sync.max_delay_ms {
            return Err(invalid(
                "sync.base_delay_ms",
                "must not exceed sync.max_delay_ms",
            ));
        }
        for sync_type in SyncType::ALL {
            if self.sources.get(sync_type).page_size == 0 {
                return Err(invalid(
                    &format!("sources.{}.page_size", source_section(sync_type)),
                    "must be at least 1",
                ));
            }
        }
        Ok(())
    }

    /// The source section for `sync_type`, failing if it lacks credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotConfigured`] if `base_url` or `api_key` is empty.
    pub fn source(&self, sync_type: SyncType) -> Result<&SourceConfig, ConfigError> {
        let source = self.sources.get(sync_type);
        if !source.is_configured() {
            return Err(ConfigError::NotConfigured {
                section: format!("sources.{}", source_section(sync_type)),
            });
        }
        Ok(source)
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("relay").join("config.toml"))
    }

    /// Load `.env` from the workspace root.
    ///
    /// Walks up from `CARGO_MANIFEST_DIR` (if available) or falls back to the
    /// current directory. Silently does nothing if no `.env` is found.
    fn load_dotenv_from_workspace() {
        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let mut dir = PathBuf::from(manifest_dir);
            // crate -> crates/ -> workspace root
            for _ in 0..3 {
                let env_path = dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                    return;
                }
                if !dir.pop() {
                    break;
                }
            }
        }

        let _ = dotenvy::dotenv();
    }
}

/// Config section name for a sync type (`sources.<name>`).
#[must_use]
pub const fn source_section(sync_type: SyncType) -> &'static str {
    match sync_type {
        SyncType::FormSubmissions => "forms",
        SyncType::ScheduledEvents => "scheduling",
        SyncType::CallRecords => "calls",
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
