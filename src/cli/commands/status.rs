//! `status`: poll, classify and act on every task of a grid directory

use crate::cli::context::CommandContext;
use crate::consolidate::{ConsolidateOptions, OutputConsolidator, OutputKind};
use crate::error::{CrabError, ErrorCode};
use crate::grid::{task_label, GridClient};
use crate::pool::run_bounded;
use crate::sheets::{GoogleSheetsClient, SheetUpdate, TaskSheetUpdater};
use crate::status::{StatusSummary, TaskReport, TaskState, TaskSummary};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Sheet entry for tasks whose output directory could not be found
const OUTPUT_NOT_FOUND: &str = "Not Found!";

#[derive(Debug, Clone)]
pub struct StatusParams {
    pub directory: PathBuf,
    pub update_sheet: bool,
    pub merge_finished: bool,
    pub kind: OutputKind,
    pub group: bool,
    pub cleanup: bool,
}

/// Task directories (`crab_*`) directly under `dir`, sorted by name
pub fn find_task_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(CrabError::config_with_code(
            ErrorCode::CONFIG_NOT_FOUND,
            format!("grid directory {} does not exist", dir.display()),
        )
        .into());
    }

    let pattern = format!(
        "{}/crab_*",
        glob::Pattern::escape(&dir.display().to_string())
    );
    let mut tasks: Vec<PathBuf> = glob::glob(&pattern)
        .with_context(|| format!("Invalid task directory pattern {pattern}"))?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|path| path.is_dir())
        .collect();
    tasks.sort();
    Ok(tasks)
}

fn create_progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░ ");
    pb.set_style(style);
    pb
}

/// Everything one task unit needs, shared read-only across the pool
struct TaskPoller<'a> {
    grid: GridClient,
    sheets: Option<TaskSheetUpdater>,
    consolidator: Option<OutputConsolidator>,
    options: ConsolidateOptions,
    ctx: &'a CommandContext,
}

impl TaskPoller<'_> {
    /// Classification for a task completes before anything acts on it
    async fn poll(&self, task_dir: PathBuf) -> Option<TaskSummary> {
        if self.ctx.interrupt.is_set() {
            return None;
        }
        let label = task_label(&task_dir);

        let report = match self.grid.status(&task_dir).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Status of {} unavailable: {}", label, e.developer_message());
                TaskReport::from_records(&[])
            }
        };
        let output_dir = self.grid.output_directory(&task_dir).await;
        tracing::info!("{}: {} ({})", label, report.state, report.recommended_action());

        if let Some(updater) = &self.sheets {
            let entry = output_dir.as_deref().unwrap_or(OUTPUT_NOT_FOUND);
            match updater.update(&label, report.state, entry, true).await {
                Ok(SheetUpdate::Skipped(reason)) => {
                    tracing::warn!("Sheet not updated for {}: {}", label, reason)
                }
                Ok(update) => tracing::debug!("Sheet update for {}: {:?}", label, update),
                Err(e) => tracing::error!(
                    "Sheet update for {} failed: {}",
                    label,
                    e.developer_message()
                ),
            }
        }

        if report.state == TaskState::Finished {
            if let (Some(consolidator), Some(root)) = (&self.consolidator, output_dir.as_deref()) {
                match consolidator.consolidate(root, self.options).await {
                    Ok(merged) => {
                        for group in &merged.groups {
                            tracing::info!(
                                "{}: merged {} files into {}",
                                label,
                                group.files,
                                group.output.display()
                            );
                        }
                    }
                    Err(e) => tracing::error!(
                        "Consolidation of {} failed: {}",
                        label,
                        e.developer_message()
                    ),
                }
            }
        }

        Some(TaskSummary::new(label, report, output_dir))
    }
}

pub async fn run_status(ctx: &CommandContext, params: StatusParams) -> Result<()> {
    let tasks = find_task_dirs(&ctx.resolve(&params.directory))?;
    if tasks.is_empty() {
        tracing::warn!("No crab_* task directories under {}", params.directory.display());
        return Ok(());
    }

    let sheets = if params.update_sheet {
        let client = GoogleSheetsClient::from_config(&ctx.config.sheets)?;
        Some(TaskSheetUpdater::new(
            Arc::new(client),
            ctx.config.sheets.rate_limit_backoff,
        ))
    } else {
        None
    };

    let poller = TaskPoller {
        grid: ctx.grid()?,
        sheets,
        consolidator: params.merge_finished.then(|| ctx.consolidator()),
        options: ConsolidateOptions {
            kind: params.kind,
            group_by_selection: params.group,
            copy_back: true,
            cleanup: params.cleanup,
        },
        ctx,
    };

    let total = tasks.len();
    tracing::info!("Polling {} tasks", total);
    let pb = create_progress_bar(total);
    let polled = run_bounded(tasks, ctx.config.pool.max_parallel, |task_dir| {
        let pb = &pb;
        let poller = &poller;
        async move {
            let summary = poller.poll(task_dir).await;
            pb.inc(1);
            summary
        }
    })
    .await;
    pb.finish_and_clear();

    let summary = StatusSummary::new(polled.into_iter().flatten().collect());
    let counts = &summary.counts;
    println!(
        "{} finished, {} processing, {} failed, {} unknown ({} tasks)",
        counts.finished,
        counts.processing,
        counts.failed,
        counts.unknown,
        counts.total()
    );

    match summary.write_to(&ctx.cache_dir()) {
        Ok(path) => tracing::info!("Status summary written to {}", path.display()),
        Err(e) => tracing::error!("Could not write status summary: {}", e.developer_message()),
    }
    ctx.notify("Crab status", &summary.message()).await;

    if summary.tasks.len() < total {
        tracing::warn!("Interrupted, {} tasks not polled", total - summary.tasks.len());
        return Err(CrabError::interrupted().into());
    }
    Ok(())
}
