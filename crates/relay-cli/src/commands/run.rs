use anyhow::Context;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::RunArgs;
use crate::commands::shared::parse::{parse_source, parse_window};
use crate::commands::shared::signal::cancel_on_ctrl_c;
use crate::context::AppContext;
use crate::output::output;

/// Handle `rly run`.
pub async fn handle(args: &RunArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let sync_type = parse_source(&args.source)?;
    let window = parse_window(&args.from, &args.to)?;
    let adapter = ctx.adapter(sync_type, args.tenant.as_deref())?;

    let cancel = cancel_on_ctrl_c();
    let run = ctx
        .engine
        .run(adapter.as_ref(), window, &cancel)
        .await
        .with_context(|| {
            format!(
                "{sync_type} run for tenant '{}' could not complete",
                adapter.tenant()
            )
        })?;
    cancel.cancel();

    output(&run, flags.format)
}
