//! `resubmit`: resubmit the failed jobs of every task in a grid directory

use crate::cli::commands::status::find_task_dirs;
use crate::cli::context::CommandContext;
use crate::grid::{task_label, GridClient, ResubmitOptions, ResubmitOutcome};
use crate::status::RecoveryAction;
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
struct ResubmitTally {
    resubmitted: Vec<String>,
    nothing_to_do: Vec<String>,
    failed: Vec<String>,
}

/// Tasks whose status recommends a plain resubmission
async fn select_failed(grid: &GridClient, tasks: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut selected = Vec::new();
    for task in tasks {
        let label = task_label(&task);
        match grid.status(&task).await {
            Ok(report) => match report.recommended_action() {
                RecoveryAction::Resubmit => selected.push(task),
                action => tracing::info!("{}: {}, not resubmitting ({})", label, report.state, action),
            },
            Err(e) => tracing::error!("Status of {} unavailable: {}", label, e.developer_message()),
        }
    }
    selected
}

pub async fn run_resubmit(
    ctx: &CommandContext,
    directory: &Path,
    options: ResubmitOptions,
    failed_only: bool,
) -> Result<()> {
    let grid = ctx.grid()?;
    let mut tasks = find_task_dirs(&ctx.resolve(directory))?;
    if failed_only {
        tasks = select_failed(&grid, tasks).await;
    }
    if tasks.is_empty() {
        tracing::warn!("No tasks to resubmit under {}", directory.display());
        return Ok(());
    }

    let mut tally = ResubmitTally::default();
    for task in &tasks {
        ctx.interrupt.check()?;
        let label = task_label(task);
        match grid.resubmit(task, &options).await {
            Ok(ResubmitOutcome::Resubmitted) => {
                tracing::info!("Resubmitted failed jobs of {}", label);
                tally.resubmitted.push(label);
            }
            Ok(ResubmitOutcome::NothingToResubmit) => tally.nothing_to_do.push(label),
            Err(e) => {
                tracing::error!("Resubmission of {} failed: {}", label, e.user_message());
                tally.failed.push(label);
            }
        }
    }

    let body = format!(
        "{} tasks resubmitted, {} with nothing to resubmit, {} failed.\n{}",
        tally.resubmitted.len(),
        tally.nothing_to_do.len(),
        tally.failed.len(),
        tally.failed.join("\n")
    );
    println!("{}", body.trim_end());
    ctx.notify("Crab resubmission", &body).await;

    if !tally.failed.is_empty() {
        bail!(
            "{} of {} resubmissions failed",
            tally.failed.len(),
            tasks.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use crate::subprocess::SubprocessManager;

    #[tokio::test]
    async fn test_select_failed_keeps_transient_failures_only() {
        let (manager, mut mock) = SubprocessManager::mock();
        mock.expect_command("crab")
            .with_args(|args| args.last().is_some_and(|a| a.ends_with("crab_A")))
            .returns_stdout(r#"{"1": {"State": "failed", "Retries": 1}, "2": {"State": "finished"}}"#)
            .finish();
        mock.expect_command("crab")
            .with_args(|args| args.last().is_some_and(|a| a.ends_with("crab_B")))
            .returns_stdout(r#"{"1": {"State": "failed", "Error": [50660]}}"#)
            .finish();
        mock.expect_command("crab")
            .with_args(|args| args.last().is_some_and(|a| a.ends_with("crab_C")))
            .returns_stdout(r#"{"1": {"State": "running"}}"#)
            .finish();

        let grid = GridClient::new(manager, GridConfig::default()).unwrap();
        let selected = select_failed(
            &grid,
            vec![
                PathBuf::from("crab_A"),
                PathBuf::from("crab_B"),
                PathBuf::from("crab_C"),
            ],
        )
        .await;
        assert_eq!(selected, vec![PathBuf::from("crab_A")]);
    }
}
