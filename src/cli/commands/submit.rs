//! `submit`: render and submit a batch description

use crate::cli::context::CommandContext;
use crate::config::load_batch_description;
use crate::error::CrabError;
use crate::submit::{BatchReport, BatchSubmitter, SubmissionStatus};
use anyhow::{bail, Result};
use std::path::Path;

pub async fn run_submit(ctx: &CommandContext, batch_file: &Path, dry_run: bool) -> Result<()> {
    let batch = load_batch_description(batch_file)?;
    if batch.is_empty() {
        tracing::warn!("Batch description {} has no job entries", batch_file.display());
        return Ok(());
    }

    let submitter = BatchSubmitter::new(
        ctx.pipeline()?,
        ctx.templates()?,
        ctx.grid()?,
        ctx.archive_dir(),
        ctx.interrupt.clone(),
    );
    let report = submitter.submit(&batch, dry_run).await?;

    print_report(&report);
    ctx.notify("Crab submission", &summary_line(&report)).await;

    if report.interrupted() {
        return Err(CrabError::interrupted().into());
    }
    let failed = report.count(SubmissionStatus::Failed);
    if failed > 0 {
        bail!("{} of {} job entries failed", failed, report.outcomes.len());
    }
    if !dry_run {
        tracing::info!(
            "Track the tasks with `crab-pilot status` and resubmit failed jobs with `crab-pilot resubmit`"
        );
    }
    Ok(())
}

fn summary_line(report: &BatchReport) -> String {
    format!(
        "{} submitted, {} dry run, {} suspected failures, {} failed, {} not processed",
        report.count(SubmissionStatus::Submitted),
        report.count(SubmissionStatus::DryRun),
        report.count(SubmissionStatus::SuspectedFailure),
        report.count(SubmissionStatus::Failed),
        report.skipped
    )
}

fn print_report(report: &BatchReport) {
    println!();
    for outcome in &report.outcomes {
        match &outcome.error {
            Some(error) => println!("  {:<55} {}: {}", outcome.label(), outcome.status, error),
            None => println!("  {:<55} {}", outcome.label(), outcome.status),
        }
    }
    println!();
    println!("{}", summary_line(report));
    println!("Rendered templates archived in {}", report.archive_dir.display());
}
