//! Batch submission
//!
//! Each job entry of a batch description goes through the generator
//! pipeline, gets every template rendered (live copy plus archival copy from
//! one render), and is handed to the grid client once. Entries run one after
//! another because they share the live output paths.

use crate::app::runtime::InterruptFlag;
use crate::config::BatchDescription;
use crate::error::{CrabError, Result};
use crate::generators::GeneratorPipeline;
use crate::grid::GridClient;
use crate::params::ParameterMap;
use crate::template::{ArchiveRun, TemplateSet};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    DryRun,
    /// The grid client exited 0 but printed no success marker
    SuspectedFailure,
    Failed,
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Submitted => "submitted",
            Self::DryRun => "dry run",
            Self::SuspectedFailure => "suspected failure",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    /// Position of the entry in the batch description, from 0
    pub index: usize,
    pub request_name: Option<String>,
    pub status: SubmissionStatus,
    pub archived: Vec<PathBuf>,
    pub error: Option<String>,
    pub error_code: Option<u16>,
}

impl SubmissionOutcome {
    fn new(index: usize, status: SubmissionStatus) -> Self {
        Self {
            index,
            request_name: None,
            status,
            archived: Vec::new(),
            error: None,
            error_code: None,
        }
    }

    fn failed(mut self, error: &CrabError) -> Self {
        self.status = SubmissionStatus::Failed;
        self.error = Some(error.user_message());
        self.error_code = Some(error.code());
        self
    }

    /// Request name, or the entry position when derivation failed early
    pub fn label(&self) -> String {
        self.request_name
            .clone()
            .unwrap_or_else(|| format!("entry #{}", self.index + 1))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub archive_dir: PathBuf,
    pub outcomes: Vec<SubmissionOutcome>,
    /// Entries left unprocessed after an interrupt
    pub skipped: usize,
}

impl BatchReport {
    pub fn count(&self, status: SubmissionStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn interrupted(&self) -> bool {
        self.skipped > 0
    }

    /// True when no entry failed outright or looked suspicious
    pub fn all_clean(&self) -> bool {
        self.count(SubmissionStatus::Failed) == 0
            && self.count(SubmissionStatus::SuspectedFailure) == 0
    }
}

pub struct BatchSubmitter {
    pipeline: GeneratorPipeline,
    templates: TemplateSet,
    grid: GridClient,
    archive_root: PathBuf,
    interrupt: InterruptFlag,
}

impl BatchSubmitter {
    pub fn new(
        pipeline: GeneratorPipeline,
        templates: TemplateSet,
        grid: GridClient,
        archive_root: PathBuf,
        interrupt: InterruptFlag,
    ) -> Self {
        Self {
            pipeline,
            templates,
            grid,
            archive_root,
            interrupt,
        }
    }

    /// Process every entry of `batch`
    ///
    /// Only failing to create the archive directory is an error; each
    /// entry's own failure is recorded in its outcome.
    pub async fn submit(&self, batch: &BatchDescription, dry_run: bool) -> Result<BatchReport> {
        let archive = ArchiveRun::create(&self.archive_root)?;
        tracing::info!(
            "Processing {} job entries{}",
            batch.len(),
            if dry_run { " (dry run)" } else { "" }
        );

        let mut outcomes = Vec::with_capacity(batch.len());
        for (index, entry) in batch.entries.iter().enumerate() {
            if self.interrupt.is_set() {
                let skipped = batch.len() - index;
                tracing::warn!("Interrupted, {} job entries not submitted", skipped);
                return Ok(BatchReport {
                    archive_dir: archive.dir().to_path_buf(),
                    outcomes,
                    skipped,
                });
            }
            outcomes.push(self.submit_entry(index, entry.clone(), &archive, dry_run).await);
        }

        Ok(BatchReport {
            archive_dir: archive.dir().to_path_buf(),
            outcomes,
            skipped: 0,
        })
    }

    /// Derive, render, archive and submit one entry
    pub async fn submit_entry(
        &self,
        index: usize,
        entry: ParameterMap,
        archive: &ArchiveRun,
        dry_run: bool,
    ) -> SubmissionOutcome {
        let mut outcome = SubmissionOutcome::new(index, SubmissionStatus::Failed);

        let params = match self.pipeline.apply(entry) {
            Ok(params) => params,
            Err(e) => {
                tracing::error!("Job entry #{} skipped: {}", index + 1, e.user_message());
                return outcome.failed(&e);
            }
        };
        outcome.request_name = params.text("REQUEST_NAME");
        let label = outcome.label();

        for template in self.templates.iter() {
            let archive_path =
                archive.path_for(&template.source_name, outcome.request_name.as_deref());
            match template
                .document
                .render_to(&params, &template.live_path, Some(&archive_path))
            {
                Ok(rendered) => outcome.archived.extend(rendered.archive_path),
                Err(e) => {
                    tracing::error!("Rendering for {} failed: {}", label, e.user_message());
                    return outcome.failed(&e);
                }
            }
        }

        if dry_run {
            tracing::info!("Dry run: rendered {} without submitting", label);
            outcome.status = SubmissionStatus::DryRun;
            return outcome;
        }

        match self.grid.submit(self.templates.submit_path()).await {
            Ok(result) if result.confirmed => {
                tracing::info!("Submitted {}", label);
                outcome.status = SubmissionStatus::Submitted;
                outcome
            }
            Ok(result) => {
                result
                    .output
                    .log_failure(&format!("Submission of {label} printed no success marker"));
                outcome.status = SubmissionStatus::SuspectedFailure;
                outcome
            }
            Err(e) => {
                tracing::error!("Submission of {} failed: {}", label, e.user_message());
                outcome.failed(&e)
            }
        }
    }

    pub fn submit_path(&self) -> &Path {
        self.templates.submit_path()
    }
}
