use std::sync::Arc;

use relay_core::entities::SyncRun;
use relay_core::enums::SyncType;
use relay_core::errors::ErrorPayload;
use relay_core::window::Window;
use relay_sources::SourceAdapter;
use relay_sync::SyncEngine;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::RunAllArgs;
use crate::commands::shared::parse::parse_window;
use crate::commands::shared::signal::cancel_on_ctrl_c;
use crate::context::AppContext;
use crate::output::output;

/// One source's result in a multi-source sync.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub sync_type: SyncType,
    pub tenant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<SyncRun>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

/// A run to start: the adapter and the window to pull through it.
pub struct Planned {
    pub adapter: Arc<dyn SourceAdapter>,
    pub window: Window,
}

/// Handle `rly run-all`.
pub async fn handle(
    args: &RunAllArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let window = parse_window(&args.from, &args.to)?;
    let sources = ctx.config.sources.configured();
    if sources.is_empty() {
        anyhow::bail!("no source is configured");
    }

    let planned = sources
        .into_iter()
        .map(|sync_type| -> anyhow::Result<Planned> {
            Ok(Planned {
                adapter: ctx.adapter(sync_type, None)?,
                window,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let cancel = cancel_on_ctrl_c();
    let reports = run_parallel(&ctx.engine, planned, &cancel).await;
    cancel.cancel();

    output(&reports, flags.format)
}

/// Run every planned source concurrently on one engine, so enrichment
/// lookups are shared through its cache. Reports come back in source order.
pub async fn run_parallel(
    engine: &SyncEngine,
    planned: Vec<Planned>,
    cancel: &CancellationToken,
) -> Vec<RunReport> {
    let mut tasks = JoinSet::new();
    for (index, Planned { adapter, window }) in planned.into_iter().enumerate() {
        let engine = engine.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let result = engine.run(adapter.as_ref(), window, &cancel).await;
            let report = match result {
                Ok(run) => RunReport {
                    sync_type: adapter.sync_type(),
                    tenant: adapter.tenant().to_string(),
                    run: Some(run),
                    error: None,
                },
                Err(error) => {
                    tracing::error!(
                        sync_type = %adapter.sync_type(),
                        tenant = adapter.tenant(),
                        %error,
                        "run could not complete"
                    );
                    RunReport {
                        sync_type: adapter.sync_type(),
                        tenant: adapter.tenant().to_string(),
                        run: None,
                        error: Some(error.payload()),
                    }
                }
            };
            (index, report)
        });
    }

    let mut reports = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(entry) => reports.push(entry),
            Err(error) => tracing::error!(%error, "sync task panicked"),
        }
    }
    reports.sort_by_key(|(index, _)| *index);
    reports.into_iter().map(|(_, report)| report).collect()
}
