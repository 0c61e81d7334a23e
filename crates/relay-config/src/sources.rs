//! Per-source API credentials and paging.

use relay_core::enums::SyncType;
use serde::{Deserialize, Serialize};

const fn default_page_size() -> u32 {
    100
}

fn default_tenant() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// API root, e.g. `https://api.example.com/v1`.
    #[serde(default)]
    pub base_url: String,

    /// Bearer credential. Supplied via `RELAY_SOURCES__<NAME>__API_KEY`.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Tenant tag applied to records when the caller does not name one.
    #[serde(default = "default_tenant")]
    pub tenant: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            page_size: default_page_size(),
            tenant: default_tenant(),
        }
    }
}

impl SourceConfig {
    /// Check if the source has the minimum fields needed to call its API.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.api_key.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub forms: SourceConfig,
    #[serde(default)]
    pub scheduling: SourceConfig,
    #[serde(default)]
    pub calls: SourceConfig,
}

impl SourcesConfig {
    #[must_use]
    pub const fn get(&self, sync_type: SyncType) -> &SourceConfig {
        match sync_type {
            SyncType::FormSubmissions => &self.forms,
            SyncType::ScheduledEvents => &self.scheduling,
            SyncType::CallRecords => &self.calls,
        }
    }

    /// Sync types whose source has credentials and a base URL.
    #[must_use]
    pub fn configured(&self) -> Vec<SyncType> {
        SyncType::ALL
            .into_iter()
            .filter(|sync_type| self.get(*sync_type).is_configured())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_not_configured() {
        let config = SourceConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.page_size, 100);
        assert_eq!(config.tenant, "default");
    }

    #[test]
    fn configured_requires_url_and_key() {
        let config = SourceConfig {
            base_url: "https://api.example.com".into(),
            ..Default::default()
        };
        assert!(!config.is_configured());

        let config = SourceConfig {
            api_key: "key".into(),
            ..config
        };
        assert!(config.is_configured());
    }

    #[test]
    fn configured_lists_only_ready_sources() {
        let sources = SourcesConfig {
            calls: SourceConfig {
                base_url: "https://calls.example.com".into(),
                api_key: "k".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(sources.configured(), vec![SyncType::CallRecords]);
    }
}
