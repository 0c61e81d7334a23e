use clap::{Args, Subcommand};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Sync one source over a window.
    Run(RunArgs),
    /// Sync every configured source over a window, in parallel.
    #[command(name = "run-all")]
    RunAll(RunAllArgs),
    /// Keep every configured source synced on an interval until Ctrl-C.
    Watch(WatchArgs),
    /// Show past runs, newest first.
    History(HistoryArgs),
    /// Show stored records for a source.
    Records(RecordsArgs),
}

/// Arguments for `rly run`.
#[derive(Clone, Debug, Args)]
pub struct RunArgs {
    /// Source: form_submissions, scheduled_events, call_records (or forms, scheduling, calls).
    pub source: String,
    /// Tenant tag (defaults to the source's configured tenant).
    #[arg(long)]
    pub tenant: Option<String>,
    /// Window start, inclusive (RFC 3339 or YYYY-MM-DD).
    #[arg(long)]
    pub from: String,
    /// Window end, exclusive (RFC 3339 or YYYY-MM-DD).
    #[arg(long)]
    pub to: String,
}

/// Arguments for `rly run-all`.
#[derive(Clone, Debug, Args)]
pub struct RunAllArgs {
    #[arg(long)]
    pub from: String,
    #[arg(long)]
    pub to: String,
}

/// Arguments for `rly watch`.
#[derive(Clone, Debug, Args)]
pub struct WatchArgs {
    /// Seconds between cycles (overrides `watch.interval_secs`).
    #[arg(long)]
    pub interval: Option<u64>,
    /// Clear the enrichment cache before every cycle.
    #[arg(long)]
    pub fresh_lookups: bool,
    /// Run a single cycle and exit.
    #[arg(long)]
    pub once: bool,
}

/// Arguments for `rly history`.
#[derive(Clone, Debug, Args)]
pub struct HistoryArgs {
    #[arg(long)]
    pub source: Option<String>,
    #[arg(long)]
    pub tenant: Option<String>,
    /// running, success, partial, failed
    #[arg(long)]
    pub status: Option<String>,
}

/// Arguments for `rly records`.
#[derive(Clone, Debug, Args)]
pub struct RecordsArgs {
    pub source: String,
    #[arg(long)]
    pub tenant: Option<String>,
}
