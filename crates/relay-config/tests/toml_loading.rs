//! Integration tests for TOML configuration loading.
//!
//! Uses `figment::Jail` for sandboxed files and env vars.

use figment::{
    Figment, Jail,
    providers::{Format, Serialized, Toml},
};
use relay_config::RelayConfig;
use relay_core::enums::SyncType;

#[test]
fn loads_sources_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[sources.forms]
base_url = "https://forms.example.com/v1"
api_key = "forms-key"
page_size = 50
tenant = "acme"

[sources.calls]
base_url = "https://calls.example.com"
api_key = "calls-key"
"#,
        )?;

        let config: RelayConfig = Figment::from(Serialized::defaults(RelayConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        let forms = config.source(SyncType::FormSubmissions).expect("forms configured");
        assert_eq!(forms.base_url, "https://forms.example.com/v1");
        assert_eq!(forms.page_size, 50);
        assert_eq!(forms.tenant, "acme");

        let calls = config.source(SyncType::CallRecords).expect("calls configured");
        assert_eq!(calls.page_size, 100);
        assert_eq!(calls.tenant, "default");

        assert!(config.source(SyncType::ScheduledEvents).is_err());
        assert_eq!(
            config.sources.configured(),
            vec![SyncType::FormSubmissions, SyncType::CallRecords]
        );
        Ok(())
    });
}

#[test]
fn loads_sync_tuning_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r"
[sync]
chunk_days = 1
max_attempts = 6
base_delay_ms = 250
max_delay_ms = 8000

[cache]
default_ttl_secs = 30
",
        )?;

        let config: RelayConfig = Figment::from(Serialized::defaults(RelayConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.sync.chunk_days, 1);
        assert_eq!(config.sync.max_attempts, 6);
        assert_eq!(config.sync.base_delay_ms, 250);
        assert_eq!(config.sync.max_delay_ms, 8000);
        // Untouched fields keep their defaults
        assert_eq!(config.sync.fetch_timeout_secs, 30);
        assert_eq!(config.cache.default_ttl_secs, 30);
        assert_eq!(config.cache.sweep_interval_secs, 60);
        Ok(())
    });
}

#[test]
fn project_config_file_is_picked_up_by_load() {
    Jail::expect_with(|jail| {
        jail.create_dir(".relay")?;
        jail.create_file(
            ".relay/config.toml",
            r#"
[database]
path = "custom.db"

[watch]
interval_secs = 60
"#,
        )?;

        let config = RelayConfig::load().expect("config loads");
        assert_eq!(config.database.path, "custom.db");
        assert_eq!(config.watch.interval_secs, 60);
        Ok(())
    });
}

#[test]
fn load_rejects_invalid_project_config() {
    Jail::expect_with(|jail| {
        jail.create_dir(".relay")?;
        jail.create_file(
            ".relay/config.toml",
            r"
[sync]
max_attempts = 0
",
        )?;

        assert!(RelayConfig::load().is_err());
        Ok(())
    });
}
