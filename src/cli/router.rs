//! Command routing

use crate::cli::args::Commands;
use crate::cli::commands::*;
use crate::cli::context::CommandContext;
use crate::grid::ResubmitOptions;
use anyhow::Result;

pub async fn execute_command(command: Commands, ctx: &CommandContext) -> Result<()> {
    match command {
        Commands::Submit { batch, dry_run } => run_submit(ctx, &batch, dry_run).await,
        Commands::Status {
            directory,
            update_sheet,
            merge_finished,
            kind,
            group,
            cleanup,
        } => {
            run_status(
                ctx,
                StatusParams {
                    directory,
                    update_sheet,
                    merge_finished,
                    kind,
                    group,
                    cleanup,
                },
            )
            .await
        }
        Commands::Resubmit {
            directory,
            maxmemory,
            siteblacklist,
            sitewhitelist,
            failed_only,
        } => {
            let options = ResubmitOptions {
                max_memory: maxmemory.or(ctx.config.grid.default_max_memory),
                site_blacklist: siteblacklist,
                site_whitelist: sitewhitelist,
            };
            run_resubmit(ctx, &directory, options, failed_only).await
        }
        Commands::Recover {
            task,
            overrides,
            dry_run,
        } => run_recover(ctx, &task, &overrides, dry_run).await,
        Commands::Merge {
            output_root,
            kind,
            group,
            copy_back,
            cleanup,
        } => run_merge(ctx, &output_root, kind, group, copy_back, cleanup).await,
        Commands::Clean { remote_dir, yes } => run_clean(ctx, &remote_dir, yes).await,
    }
}
