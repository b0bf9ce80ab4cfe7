//! `recover`: build and submit a recovery task for the unfinished lumi
//! sections of a failed task

use crate::cli::context::CommandContext;
use crate::config::BatchDescription;
use crate::error::{CrabError, ErrorCode};
use crate::params::{ParamValue, ParameterMap};
use crate::status::parse_task_name;
use crate::submit::{BatchSubmitter, SubmissionStatus};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const NOT_FINISHED_LUMIS: &str = "notFinishedLumis.json";
const RECOVERY_SUFFIX: &str = "recovery";

/// Parse `KEY=VALUE`; the value is read as a YAML scalar so numbers and
/// booleans keep their type
fn parse_override(raw: &str) -> Result<(String, ParamValue)> {
    let (key, value) = raw.split_once('=').ok_or_else(|| {
        CrabError::config_with_code(
            ErrorCode::CONFIG_INVALID_VALUE,
            format!("override '{raw}' is not KEY=VALUE"),
        )
    })?;
    let value = serde_yaml::from_str::<serde_yaml::Value>(value)
        .ok()
        .and_then(|v| ParamValue::from_yaml(&v))
        .unwrap_or_else(|| ParamValue::Str(value.to_string()));
    Ok((key.trim().to_string(), value))
}

/// The lumi file written by `report --recovery=failed` under the task's
/// `results/` directory
fn find_not_finished_lumis(task_dir: &Path) -> Option<PathBuf> {
    WalkDir::new(task_dir.join("results"))
        .max_depth(2)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == NOT_FINISHED_LUMIS)
        .map(|entry| entry.into_path())
}

fn recovery_parameters(
    task_dir: &Path,
    lumi_mask: &Path,
    overrides: &[String],
) -> Result<ParameterMap> {
    let task = parse_task_name(&task_dir.display().to_string())?;
    let mut params = task
        .to_parameters()
        .with("LUMIMASK", lumi_mask.display().to_string())
        .with("REQUEST_SUFFIX", RECOVERY_SUFFIX);
    for raw in overrides {
        let (key, value) = parse_override(raw)?;
        params.insert(&key, value);
    }
    Ok(params)
}

pub async fn run_recover(
    ctx: &CommandContext,
    task_dir: &Path,
    overrides: &[String],
    dry_run: bool,
) -> Result<()> {
    let task_dir = ctx.resolve(task_dir);
    // Fail on a bad task name before asking the grid for anything
    parse_task_name(&task_dir.display().to_string())?;

    let grid = ctx.grid()?;
    grid.report_recovery(&task_dir).await?;

    let lumi_mask = find_not_finished_lumis(&task_dir).ok_or_else(|| {
        CrabError::io(
            format!("no {NOT_FINISHED_LUMIS} after the recovery report"),
            Some(task_dir.join("results")),
        )
    })?;
    let lumi_mask = std::path::absolute(&lumi_mask)
        .with_context(|| format!("Cannot resolve {}", lumi_mask.display()))?;
    tracing::info!("Recovering lumi sections listed in {}", lumi_mask.display());

    let params = recovery_parameters(&task_dir, &lumi_mask, overrides)?;
    let pipeline = ctx.pipeline()?.without("lumi_mask");
    pipeline.validate(&params.keys().collect::<Vec<_>>())?;

    let submitter = BatchSubmitter::new(
        pipeline,
        ctx.templates()?,
        grid,
        ctx.archive_dir(),
        ctx.interrupt.clone(),
    );
    let batch = BatchDescription {
        entries: vec![params],
    };
    let report = submitter.submit(&batch, dry_run).await?;

    let Some(outcome) = report.outcomes.first() else {
        return Err(CrabError::interrupted().into());
    };
    println!("{}: {}", outcome.label(), outcome.status);
    ctx.notify(
        "Crab recovery task",
        &format!("{}: {}", outcome.label(), outcome.status),
    )
    .await;

    match outcome.status {
        SubmissionStatus::Failed => bail!(
            "Recovery task for {} failed: {}",
            task_dir.display(),
            outcome.error.as_deref().unwrap_or("unknown error")
        ),
        _ => Ok(()),
    }
}
