//! Grid submission client wrapper
//!
//! Every call goes through [`SubprocessManager`] and yields either a typed
//! outcome or a `CrabError::ExternalTool` carrying the command line, exit
//! code and both output streams.

use crate::config::GridConfig;
use crate::error::{CrabError, ErrorCode, Result};
use crate::status::TaskReport;
use crate::subprocess::{ProcessCommandBuilder, SubprocessManager, ToolOutput};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Exit code of `resubmit` when no job needs resubmission
pub const NOTHING_TO_RESUBMIT_EXIT: i32 = 192;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResubmitOptions {
    pub max_memory: Option<u32>,
    pub site_blacklist: Vec<String>,
    pub site_whitelist: Vec<String>,
}

impl ResubmitOptions {
    fn flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if let Some(memory) = self.max_memory {
            flags.push(format!("--maxmemory={memory}"));
        }
        if !self.site_blacklist.is_empty() {
            flags.push(format!("--siteblacklist={}", self.site_blacklist.join(",")));
        }
        if !self.site_whitelist.is_empty() {
            flags.push(format!("--sitewhitelist={}", self.site_whitelist.join(",")));
        }
        flags
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResubmitOutcome {
    Resubmitted,
    NothingToResubmit,
}

/// Result of a submit call that ran to completion
#[derive(Debug, Clone)]
pub struct SubmitResult {
    pub output: ToolOutput,
    /// A success marker was found in stdout or stderr
    pub confirmed: bool,
}

#[derive(Clone)]
pub struct GridClient {
    subprocess: SubprocessManager,
    config: GridConfig,
    output_dir_pattern: Regex,
    working_dir: Option<PathBuf>,
}

impl GridClient {
    pub fn new(subprocess: SubprocessManager, config: GridConfig) -> Result<Self> {
        let output_dir_pattern = Regex::new(&config.output_dir_pattern).map_err(|e| {
            CrabError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                format!("invalid grid.output_dir_pattern '{}'", config.output_dir_pattern),
            )
            .with_source(e)
        })?;
        Ok(Self {
            subprocess,
            config,
            output_dir_pattern,
            working_dir: None,
        })
    }

    /// Run every command from `dir`
    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    fn command(&self, subcommand: &str) -> ProcessCommandBuilder {
        ProcessCommandBuilder::new(&self.config.program)
            .arg(subcommand)
            .current_dir_opt(self.working_dir.as_deref())
            .timeout_opt(self.config.timeout)
    }

    fn has_success_marker(&self, output: &ToolOutput) -> bool {
        self.config
            .success_markers
            .iter()
            .any(|m| output.stdout.contains(m.as_str()) || output.stderr.contains(m.as_str()))
    }

    /// `submit <config>`
    ///
    /// A nonzero exit is an error. A zero exit without a success marker is
    /// returned unconfirmed; the client is known to exit 0 on partial
    /// failure.
    pub async fn submit(&self, config_file: &Path) -> Result<SubmitResult> {
        let command = self
            .command("submit")
            .arg(config_file.display().to_string())
            .build();
        let output = self
            .subprocess
            .run_checked(command, "Grid submission failed")
            .await?;
        let confirmed = self.has_success_marker(&output);
        Ok(SubmitResult { output, confirmed })
    }

    /// Raw `status --json <task>` output
    ///
    /// A failing status call is logged and its output still returned; the
    /// parser turns it into an unknown state.
    pub async fn status_output(&self, task_dir: &Path) -> Result<String> {
        let command = self
            .command("status")
            .arg("--json")
            .arg(task_dir.display().to_string())
            .build();
        let output = self.subprocess.run_tool(command).await?;
        if !output.success() {
            output.log_failure("Grabbing task status failed");
        }
        Ok(output.stdout)
    }

    pub async fn status(&self, task_dir: &Path) -> Result<TaskReport> {
        let raw = self.status_output(task_dir).await?;
        Ok(TaskReport::from_output(&raw))
    }

    pub async fn resubmit(
        &self,
        task_dir: &Path,
        options: &ResubmitOptions,
    ) -> Result<ResubmitOutcome> {
        let command = self
            .command("resubmit")
            .arg("-d")
            .arg(task_dir.display().to_string())
            .args(options.flags())
            .build();
        let output = self.subprocess.run_tool(command).await?;

        match output.exit_code() {
            Some(0) => Ok(ResubmitOutcome::Resubmitted),
            Some(NOTHING_TO_RESUBMIT_EXIT) => {
                tracing::warn!("No jobs to resubmit for task {}", task_label(task_dir));
                Ok(ResubmitOutcome::NothingToResubmit)
            }
            _ => {
                output.log_failure("Grid resubmission failed");
                Err(output.into_error(ErrorCode::EXEC_NONZERO_EXIT, "Grid resubmission failed"))
            }
        }
    }

    /// `report -d <task> --recovery=failed`, which writes the lumi sections
    /// still to process under `<task>/results/`
    pub async fn report_recovery(&self, task_dir: &Path) -> Result<ToolOutput> {
        let command = self
            .command("report")
            .arg("-d")
            .arg(task_dir.display().to_string())
            .arg("--recovery=failed")
            .build();
        self.subprocess
            .run_checked(command, "Grid recovery report failed")
            .await
    }

    /// Storage directory holding the task's output, from the dumped
    /// location of job 1
    pub async fn output_directory(&self, task_dir: &Path) -> Option<String> {
        let command = self
            .command("getoutput")
            .args(["--dump", "--jobids=1", "-d"])
            .arg(task_dir.display().to_string())
            .build();

        let output = match self.subprocess.run_tool(command).await {
            Ok(output) if output.success() => output,
            Ok(output) => {
                output.log_failure("Grabbing task output directory failed");
                return None;
            }
            Err(e) => {
                tracing::error!("Grabbing task output directory failed: {}", e);
                return None;
            }
        };

        let found = self
            .output_dir_pattern
            .find(&output.stdout)
            .map(|m| m.as_str().to_string());
        if found.is_none() {
            tracing::debug!("No output directory for task {}", task_label(task_dir));
        }
        found
    }
}

/// Last path component, used in log lines
pub fn task_label(task_dir: &Path) -> String {
    task_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| task_dir.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::TaskState;

    fn client() -> (GridClient, crate::subprocess::MockProcessRunner) {
        let (manager, mock) = SubprocessManager::mock();
        (GridClient::new(manager, GridConfig::default()).unwrap(), mock)
    }

    #[tokio::test]
    async fn test_submit_confirmed() {
        let (grid, mut mock) = client();
        mock.expect_command("crab")
            .with_args(|args| args[0] == "submit" && args[1] == "crab_cfg.py")
            .returns_stdout("Success: Your task has been delivered to the prod CRAB3 server.")
            .finish();

        let result = grid.submit(Path::new("crab_cfg.py")).await.unwrap();
        assert!(result.confirmed);
    }

    #[tokio::test]
    async fn test_submit_without_marker_is_unconfirmed() {
        let (grid, mut mock) = client();
        mock.expect_command("crab")
            .returns_stdout("Will use CRAB configuration file crab_cfg.py")
            .finish();

        let result = grid.submit(Path::new("crab_cfg.py")).await.unwrap();
        assert!(!result.confirmed);
    }

    #[tokio::test]
    async fn test_submit_nonzero_exit_is_error() {
        let (grid, mut mock) = client();
        mock.expect_command("crab")
            .returns_exit_code(1)
            .returns_stderr("Cannot find proxy")
            .finish();

        let err = grid.submit(Path::new("crab_cfg.py")).await.unwrap_err();
        assert_eq!(err.exit_code(), 5);
        match err {
            CrabError::ExternalTool { stderr, .. } => assert!(stderr.contains("proxy")),
            other => panic!("expected ExternalTool, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_parses_json() {
        let (grid, mut mock) = client();
        mock.expect_command("crab")
            .with_args(|args| args == ["status", "--json", "crab_A_2023C_v1_Muon0"])
            .returns_stdout(r#"{"1": {"State": "finished"}, "2": {"State": "finished"}}"#)
            .finish();

        let report = grid.status(Path::new("crab_A_2023C_v1_Muon0")).await.unwrap();
        assert_eq!(report.state, TaskState::Finished);
        assert_eq!(report.jobs, 2);
    }

    #[tokio::test]
    async fn test_failing_status_degrades_to_unknown() {
        let (grid, mut mock) = client();
        mock.expect_command("crab").returns_exit_code(1).finish();

        let report = grid.status(Path::new("crab_x")).await.unwrap();
        assert_eq!(report.state, TaskState::Unknown);
    }

    #[tokio::test]
    async fn test_resubmit_flags() {
        let (grid, mut mock) = client();
        mock.expect_command("crab").returns_success().finish();

        let options = ResubmitOptions {
            max_memory: Some(4000),
            site_blacklist: vec!["T2_US_A".to_string(), "T2_US_B".to_string()],
            site_whitelist: vec![],
        };
        let outcome = grid.resubmit(Path::new("crab_x"), &options).await.unwrap();
        assert_eq!(outcome, ResubmitOutcome::Resubmitted);

        let call = &mock.get_call_history()[0];
        assert_eq!(
            call.args,
            vec![
                "resubmit",
                "-d",
                "crab_x",
                "--maxmemory=4000",
                "--siteblacklist=T2_US_A,T2_US_B"
            ]
        );
    }

    #[tokio::test]
    async fn test_resubmit_nothing_to_do() {
        let (grid, mut mock) = client();
        mock.expect_command("crab").returns_exit_code(192).finish();

        let outcome = grid
            .resubmit(Path::new("crab_x"), &ResubmitOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome, ResubmitOutcome::NothingToResubmit);
    }

    #[tokio::test]
    async fn test_resubmit_other_failure() {
        let (grid, mut mock) = client();
        mock.expect_command("crab").returns_exit_code(3).finish();

        let err = grid
            .resubmit(Path::new("crab_x"), &ResubmitOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CrabError::ExternalTool { exit_code: Some(3), .. }));
    }

    #[tokio::test]
    async fn test_output_directory() {
        let (grid, mut mock) = client();
        mock.expect_command("crab")
            .with_args(|args| args == ["getoutput", "--dump", "--jobids=1", "-d", "crab_A"])
            .returns_stdout(
                "PFN: davs://cmseos.fnal.gov:9000/eos/uscms/store/group/lpclonglived/DisappTrks/Muon/crab_A/260101_101010/0000/hist_A_1.root",
            )
            .finish();

        let dir = grid.output_directory(Path::new("crab_A")).await;
        assert_eq!(
            dir.as_deref(),
            Some("/store/group/lpclonglived/DisappTrks/Muon/crab_A/")
        );
    }

    #[tokio::test]
    async fn test_output_directory_not_found() {
        let (grid, mut mock) = client();
        mock.expect_command("crab").returns_stdout("nothing here").finish();
        assert_eq!(grid.output_directory(Path::new("crab_A")).await, None);
    }

    #[test]
    fn test_invalid_output_pattern_rejected() {
        let (manager, _mock) = SubprocessManager::mock();
        let config = GridConfig {
            output_dir_pattern: "([".to_string(),
            ..GridConfig::default()
        };
        assert!(GridClient::new(manager, config).is_err());
    }
}
