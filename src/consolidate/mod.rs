//! Output consolidation: discover, group, merge, copy back, clean up
//!
//! Source files are deleted only through [`VerifiedGroup`], which can only be
//! built from a successful [`MergeResult`] and a [`CopyReceipt`] for the same
//! group in the same run.

pub mod grouping;
pub mod merge;

pub use grouping::{group_by_selection, selection_label, single_group, FileGroup, OutputKind};
pub use merge::{MergeResult, MergeTools};

use crate::app::runtime::InterruptFlag;
use crate::config::PilotConfig;
use crate::error::{CrabError, ErrorCode, Result};
use crate::pool::run_bounded;
use crate::storage::{join_remote, RemoteStorage};
use crate::subprocess::SubprocessManager;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy)]
pub struct ConsolidateOptions {
    pub kind: OutputKind,
    pub group_by_selection: bool,
    pub copy_back: bool,
    pub cleanup: bool,
}

/// Proof that a merged file reached its archive location
#[derive(Debug, Clone)]
pub struct CopyReceipt {
    pub destination: String,
}

/// A group whose merge and copy both succeeded in this run
#[derive(Debug)]
pub struct VerifiedGroup {
    group: FileGroup,
    destination: String,
}

impl VerifiedGroup {
    /// `None` unless the merge exited cleanly and a copy receipt exists
    pub fn verify(group: FileGroup, merge: &MergeResult, copy: Option<CopyReceipt>) -> Option<Self> {
        match copy {
            Some(receipt) if merge.success() => Some(Self {
                group,
                destination: receipt.destination,
            }),
            _ => None,
        }
    }

    pub fn label(&self) -> &str {
        &self.group.label
    }

    /// Remove every source file of the group
    ///
    /// Runs to completion once started; a failed removal is logged and the
    /// remaining files are still attempted. Returns the number removed.
    pub async fn delete_sources(self, storage: &RemoteStorage) -> usize {
        let mut deleted = 0;
        for file in &self.group.files {
            match storage.remove(&file.path).await {
                Ok(()) => deleted += 1,
                Err(e) => tracing::error!("Could not delete {}: {}", file.path, e.developer_message()),
            }
        }
        tracing::info!(
            "Deleted {}/{} source files of group {} (merged copy at {})",
            deleted,
            self.group.len(),
            self.group.label,
            self.destination
        );
        deleted
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupReport {
    pub label: String,
    pub files: usize,
    pub output: PathBuf,
    pub merged: bool,
    pub copied_to: Option<String>,
    pub deleted: usize,
    pub skipped: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsolidationReport {
    pub root: String,
    pub groups: Vec<GroupReport>,
}

impl ConsolidationReport {
    pub fn skipped(&self) -> impl Iterator<Item = &GroupReport> {
        self.groups.iter().filter(|g| g.skipped.is_some())
    }
}

#[derive(Clone)]
pub struct OutputConsolidator {
    storage: RemoteStorage,
    merge_tools: MergeTools,
    scratch_dir: PathBuf,
    archive_destination: Option<String>,
    max_parallel: usize,
    interrupt: InterruptFlag,
}

impl OutputConsolidator {
    pub fn new(subprocess: SubprocessManager, config: &PilotConfig, interrupt: InterruptFlag) -> Self {
        Self {
            storage: RemoteStorage::new(subprocess.clone(), config.storage.clone()),
            merge_tools: MergeTools::new(subprocess, config.merge.clone()),
            scratch_dir: config.paths.resolve(&config.merge.scratch_dir),
            archive_destination: config.merge.archive_destination.clone(),
            max_parallel: config.pool.max_parallel,
            interrupt,
        }
    }

    pub fn storage(&self) -> &RemoteStorage {
        &self.storage
    }

    pub async fn consolidate(
        &self,
        task_output_root: &str,
        options: ConsolidateOptions,
    ) -> Result<ConsolidationReport> {
        if options.cleanup && !options.copy_back {
            return Err(CrabError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                "cleanup requires copy-back: sources are only deleted after the merged file is archived",
            ));
        }

        let files: Vec<_> = self
            .storage
            .find(task_output_root, options.kind.find_pattern())
            .await?
            .into_iter()
            .filter(|f| options.kind.matches(f.file_name()))
            .collect();

        let mut report = ConsolidationReport {
            root: task_output_root.to_string(),
            groups: Vec::new(),
        };
        if files.is_empty() {
            tracing::warn!("No {} files found under {}", options.kind, task_output_root);
            return Ok(report);
        }

        let groups = if options.group_by_selection {
            group_by_selection(options.kind, files)?
        } else {
            vec![single_group(files)]
        };
        tracing::info!(
            "Consolidating {} group(s) of {} files under {}",
            groups.len(),
            options.kind,
            task_output_root
        );

        report.groups = run_bounded(groups, self.max_parallel, |group| {
            self.process_group(task_output_root, group, options)
        })
        .await;

        for skipped in report.skipped() {
            tracing::warn!(
                "Group {} skipped: {}",
                skipped.label,
                skipped.skipped.as_deref().unwrap_or_default()
            );
        }
        Ok(report)
    }

    async fn process_group(
        &self,
        task_output_root: &str,
        group: FileGroup,
        options: ConsolidateOptions,
    ) -> GroupReport {
        let output_name = merged_file_name(task_output_root, &group.label, options.kind);
        let mut report = GroupReport {
            label: group.label.clone(),
            files: group.len(),
            output: self.scratch_dir.join(&output_name),
            ..GroupReport::default()
        };

        if self.interrupt.is_set() {
            report.skipped = Some("interrupted before start".to_string());
            return report;
        }

        // The merge tool will not overwrite an existing output
        if let Err(e) = remove_scratch(&report.output) {
            tracing::error!("{}", e.developer_message());
            report.skipped = Some("stale merged file could not be removed".to_string());
            return report;
        }

        let merge = match self.merge_tools.merge(options.kind, &group, &report.output).await {
            Ok(merge) => merge,
            Err(e) => {
                tracing::error!("{}", e.developer_message());
                report.skipped = Some(format!("merge could not run: {e}"));
                return report;
            }
        };
        report.merged = merge.success();
        if !merge.success() {
            report.skipped = Some(format!(
                "merge exited with {:?}, sources kept",
                merge.exit_code
            ));
            return report;
        }

        if !options.copy_back {
            return report;
        }

        let destination_dir = self
            .archive_destination
            .as_deref()
            .unwrap_or(task_output_root);
        let destination = join_remote(destination_dir, &output_name);
        let receipt = match self.storage.copy_to(&report.output, &destination).await {
            Ok(_) => CopyReceipt { destination },
            Err(e) => {
                tracing::error!("{}", e.developer_message());
                report.skipped = Some("copy to archive failed, sources kept".to_string());
                return report;
            }
        };
        report.copied_to = Some(receipt.destination.clone());
        if let Err(e) = remove_scratch(&report.output) {
            tracing::warn!("{}", e.developer_message());
        }

        if !options.cleanup {
            return report;
        }

        match VerifiedGroup::verify(group, &merge, Some(receipt)) {
            Some(verified) => {
                report.deleted = verified.delete_sources(&self.storage).await;
            }
            None => {
                report.skipped = Some("merge or copy not verified, sources kept".to_string());
            }
        }
        report
    }
}

/// `merged_{task}_{label}_{kind}.root`, where `task` is built from the last
/// two components of the task output root
pub fn merged_file_name(task_output_root: &str, label: &str, kind: OutputKind) -> String {
    let mut components: Vec<&str> = task_output_root
        .split('/')
        .filter(|c| !c.is_empty())
        .collect();
    let keep = components.len().saturating_sub(2);
    let task: String = components
        .split_off(keep)
        .join("_")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if task.is_empty() {
        format!("merged_{label}_{kind}.root")
    } else {
        format!("merged_{task}_{label}_{kind}.root")
    }
}

fn remove_scratch(path: &std::path::Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CrabError::io("cannot remove merged scratch file", Some(path.to_path_buf()))
            .with_source(e)),
    }
}
