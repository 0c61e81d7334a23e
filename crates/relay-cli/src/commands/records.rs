use crate::cli::GlobalFlags;
use crate::cli::root_commands::RecordsArgs;
use crate::commands::shared::limit::effective_limit;
use crate::commands::shared::parse::parse_source;
use crate::context::AppContext;
use crate::output::output;

/// Handle `rly records`.
pub async fn handle(
    args: &RecordsArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let sync_type = parse_source(&args.source)?;
    let tenant = args.tenant.as_deref();
    let records = ctx
        .store()
        .list_records(sync_type, tenant, effective_limit(flags.limit, 50))
        .await?;
    let total = ctx.store().count_records(sync_type, tenant).await?;
    tracing::info!(%sync_type, shown = records.len(), total, "records listed");
    output(&records, flags.format)
}
