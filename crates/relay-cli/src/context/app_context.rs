use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use relay_cache::spawn_sweeper;
use relay_config::RelayConfig;
use relay_core::enums::SyncType;
use relay_db::service::RelayService;
use relay_sources::SourceAdapter;
use relay_sync::{EngineSettings, EnrichmentCache, LeaseRegistry, SyncEngine};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Shared application resources initialized once at startup.
pub struct AppContext {
    pub config: RelayConfig,
    pub engine: SyncEngine,
    sweeper_cancel: CancellationToken,
    sweeper: JoinHandle<()>,
}

impl AppContext {
    /// Open the store, start the cache sweeper, and build the engine.
    ///
    /// Run leases take a lock file per `(sync_type, tenant)` under
    /// `<database dir>/locks`, so separate `rly` processes sharing one
    /// database do not run the same pair concurrently.
    pub async fn init(config: RelayConfig) -> anyhow::Result<Self> {
        let db_path = PathBuf::from(&config.database.path);
        let data_dir = db_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let service = RelayService::new_local(&config.database.path)
            .await
            .with_context(|| format!("failed to open relay database at {}", db_path.display()))?;

        let cache = Arc::new(EnrichmentCache::new(config.cache.default_ttl()));
        let sweeper_cancel = CancellationToken::new();
        let sweeper = spawn_sweeper(
            Arc::clone(&cache),
            config.cache.sweep_interval(),
            sweeper_cancel.clone(),
        );

        let leases = LeaseRegistry::with_lock_dir(data_dir.join("locks"));
        let engine = SyncEngine::new(
            Arc::new(service),
            cache,
            EngineSettings::from_config(&config.sync),
        )
        .with_leases(Arc::new(leases));

        tracing::debug!(db = %db_path.display(), "relay context ready");
        Ok(Self {
            config,
            engine,
            sweeper_cancel,
            sweeper,
        })
    }

    /// Adapter for a configured source. `tenant` overrides the source's
    /// configured tenant.
    pub fn adapter(
        &self,
        sync_type: SyncType,
        tenant: Option<&str>,
    ) -> anyhow::Result<Arc<dyn SourceAdapter>> {
        let source = self.config.source(sync_type)?;
        let tenant = tenant.unwrap_or(source.tenant.as_str());
        if tenant.trim().is_empty() {
            anyhow::bail!("tenant for {sync_type} is empty");
        }
        Ok(relay_sources::adapter_for(
            sync_type,
            source,
            tenant,
            self.config.sync.fetch_timeout(),
        ))
    }

    pub fn store(&self) -> &RelayService {
        self.engine.store()
    }

    /// Stop the cache sweeper.
    pub async fn shutdown(self) {
        self.sweeper_cancel.cancel();
        let _ = self.sweeper.await;
        let stats = self.engine.cache().stats();
        tracing::debug!(hits = stats.hits, misses = stats.misses, "enrichment cache closed");
    }
}
