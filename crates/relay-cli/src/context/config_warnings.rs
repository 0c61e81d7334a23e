use relay_config::{RelayConfig, source_section};
use relay_core::enums::SyncType;

/// Emit warnings for likely mistyped env var keys that silently fell back to defaults.
pub fn warn_unconfigured(config: &RelayConfig) {
    for warning in collect_unconfigured_warnings(config, std::env::vars()) {
        tracing::warn!("{warning}");
    }
}

fn collect_unconfigured_warnings<I>(config: &RelayConfig, env: I) -> Vec<String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let env_keys = env.into_iter().map(|(key, _)| key).collect::<Vec<_>>();

    let mut warnings = Vec::new();
    for sync_type in SyncType::ALL {
        if config.sources.get(sync_type).is_configured() {
            continue;
        }
        let section = source_section(sync_type).to_ascii_uppercase();
        let single = format!("RELAY_SOURCES_{section}");
        let double = format!("RELAY_SOURCES__{section}__");
        let mistyped = env_keys
            .iter()
            .any(|key| key.starts_with(&single) && !key.starts_with(&double));
        if mistyped {
            warnings.push(format!(
                "{sync_type} source appears unconfigured while {single}* env vars exist. \
                 Use double underscores (example: {double}API_KEY)."
            ));
        }
    }

    if config.sources.configured().is_empty() {
        warnings.push(
            concat!(
                "no source is configured; set sources.<name>.base_url and api_key ",
                "in .relay/config.toml or RELAY_SOURCES__<NAME>__* env vars"
            )
            .to_string(),
        );
    }

    warnings
}
