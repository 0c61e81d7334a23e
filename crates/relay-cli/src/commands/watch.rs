use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use relay_core::window::Window;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::WatchArgs;
use crate::commands::run_all::{Planned, run_parallel};
use crate::commands::shared::signal::cancel_on_ctrl_c;
use crate::context::AppContext;
use crate::output::output;

/// Handle `rly watch`.
///
/// Each cycle syncs every configured source from where its last successful
/// run ended (or `watch.lookback_days` ago) up to now. Ctrl-C cancels the
/// cycle in flight and exits after it is recorded.
pub async fn handle(args: &WatchArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let sources = ctx.config.sources.configured();
    if sources.is_empty() {
        anyhow::bail!("no source is configured");
    }
    let interval = args
        .interval
        .map_or_else(|| ctx.config.watch.interval(), Duration::from_secs)
        .max(Duration::from_secs(1));
    let lookback = TimeDelta::days(i64::from(ctx.config.watch.lookback_days));

    let cancel = cancel_on_ctrl_c();
    let mut cycle = 0u64;
    loop {
        cycle += 1;
        if args.fresh_lookups {
            ctx.engine.clear_cache();
        }

        let now = Utc::now();
        let mut planned = Vec::new();
        for &sync_type in &sources {
            let adapter = ctx.adapter(sync_type, None)?;
            let last_end = ctx
                .store()
                .latest_successful_run(sync_type, adapter.tenant())
                .await?
                .map(|run| run.window.end());
            match next_window(last_end, now, lookback) {
                Some(window) => planned.push(Planned { adapter, window }),
                None => tracing::debug!(%sync_type, "already up to date"),
            }
        }

        tracing::info!(cycle, sources = planned.len(), "watch cycle started");
        let reports = run_parallel(&ctx.engine, planned, &cancel).await;
        output(&reports, flags.format)?;

        if args.once || cancel.is_cancelled() {
            break;
        }
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }

    tracing::info!(cycles = cycle, "watch stopped");
    Ok(())
}

/// `[last successful end | now - lookback, now)`, or `None` when there is
/// nothing new to pull.
fn next_window(
    last_end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    lookback: TimeDelta,
) -> Option<Window> {
    let start = last_end.unwrap_or(now - lookback);
    Window::new(start, now).ok()
}
