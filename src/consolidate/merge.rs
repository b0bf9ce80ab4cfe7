//! Merge tool invocation
//!
//! Histogram files merge with the parallel histogram tool
//! (`hadd -O -j N <out> @<manifest>`). Skim files carry provenance metadata
//! and go through the event-picking merge
//! (`edmCopyPickMerge inputFiles_load=<manifest> outputFile=<out>`).

use super::grouping::{FileGroup, OutputKind};
use crate::config::MergeConfig;
use crate::error::{CrabError, Result};
use crate::subprocess::{ProcessCommandBuilder, SubprocessManager};
use std::io::Write;
use std::path::Path;

/// Outcome of one merge invocation, consumed right away
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl MergeResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Clone)]
pub struct MergeTools {
    subprocess: SubprocessManager,
    config: MergeConfig,
}

impl MergeTools {
    pub fn new(subprocess: SubprocessManager, config: MergeConfig) -> Self {
        Self { subprocess, config }
    }

    /// Merge every file of `group` into `output`
    ///
    /// Only a failure to run the tool at all is an `Err`; a nonzero exit is
    /// reported through the returned [`MergeResult`].
    pub async fn merge(
        &self,
        kind: OutputKind,
        group: &FileGroup,
        output: &Path,
    ) -> Result<MergeResult> {
        let scratch = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(scratch).map_err(|e| {
            CrabError::io("cannot create merge directory", Some(scratch.into())).with_source(e)
        })?;

        // Input list for the merge tool, removed when dropped
        let mut manifest = tempfile::Builder::new()
            .prefix(&format!("{}_inputs_", group.label))
            .suffix(".txt")
            .tempfile_in(scratch)
            .map_err(|e| {
                CrabError::io("cannot create merge manifest", Some(scratch.into())).with_source(e)
            })?;
        let manifest_path = manifest.path().to_path_buf();
        let lines: Vec<&str> = group.files.iter().map(|f| f.url.as_str()).collect();
        let written = manifest.write_all(lines.join("\n").as_bytes());
        written.and_then(|_| manifest.flush()).map_err(|e| {
            CrabError::io("cannot write merge manifest", Some(manifest_path.clone())).with_source(e)
        })?;

        let output_arg = output.display().to_string();
        let manifest_arg = manifest_path.display().to_string();
        let command = match kind {
            OutputKind::Hist => ProcessCommandBuilder::new(&self.config.hist_program)
                .arg("-O")
                .arg("-j")
                .arg(self.config.hist_jobs.to_string())
                .arg(&output_arg)
                .arg(format!("@{manifest_arg}")),
            OutputKind::Skim => ProcessCommandBuilder::new(&self.config.skim_program)
                .arg(format!("inputFiles_load={manifest_arg}"))
                .arg(format!("outputFile={output_arg}")),
        }
        .build();

        tracing::info!(
            "Merging {} {} files of group {} into {}",
            group.len(),
            kind,
            group.label,
            output.display()
        );
        let result = self.subprocess.run_tool(command).await?;
        if !result.success() {
            result.log_failure(&format!("Failed to merge group {}", group.label));
        }

        Ok(MergeResult {
            exit_code: result.exit_code(),
            stdout: result.stdout,
            stderr: result.stderr,
        })
    }
}
