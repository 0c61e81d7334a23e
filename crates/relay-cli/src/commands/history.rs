use relay_core::enums::RunStatus;
use relay_db::repos::RunFilter;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::HistoryArgs;
use crate::commands::shared::limit::effective_limit;
use crate::commands::shared::parse::{parse_enum, parse_source};
use crate::context::AppContext;
use crate::output::output;

/// Handle `rly history`.
pub async fn handle(
    args: &HistoryArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let filter = RunFilter {
        sync_type: args.source.as_deref().map(parse_source).transpose()?,
        tenant: args.tenant.clone(),
        status: args
            .status
            .as_deref()
            .map(|value| parse_enum::<RunStatus>(value, "status"))
            .transpose()?,
        limit: effective_limit(flags.limit, 20),
    };
    let runs = ctx.store().list_runs(&filter).await?;
    output(&runs, flags.format)
}
