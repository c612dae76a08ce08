//! `pyconflict cache info|clear|prune`

use tracing::info;

use pyconflict_core::PycResult;

use super::{CommandContext, ExitStatus};
use crate::output::report;
use crate::CacheAction;

pub fn execute(action: CacheAction, ctx: &CommandContext) -> PycResult<ExitStatus> {
    let cache = ctx.cache()?;

    match action {
        CacheAction::Info => {
            let stats = cache.stats()?;
            ctx.output.print(&report::cache_info_human(
                cache.path().as_str(),
                ctx.settings.cache_enabled,
                &stats,
            ));
        },
        CacheAction::Clear => {
            let removed = cache.clear()?;
            info!(removed, path = %cache.path(), "cache cleared");
            ctx.output.success(&format!("Removed {} cached responses", removed));
        },
        CacheAction::Prune => {
            let removed = cache.prune()?;
            info!(removed, path = %cache.path(), "cache pruned");
            ctx.output.success(&format!("Removed {} expired responses", removed));
        },
    }

    Ok(ExitStatus::Success)
}
