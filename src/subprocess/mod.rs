//! Subprocess layer for every external tool crab-pilot drives
//!
//! The grid client, the storage client, the merge tools and `sendmail` are
//! all reached through [`SubprocessManager`], so tests swap in
//! [`MockProcessRunner`] and never spawn real binaries.

pub mod builder;
pub mod error;
pub mod mock;
pub mod runner;


pub use builder::ProcessCommandBuilder;
pub use error::ProcessError;
pub use mock::{MockCommandConfig, MockProcessRunner};
pub use runner::{ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner, TokioProcessRunner};

use crate::error::{CrabError, ErrorCode};
use std::sync::Arc;

/// Captured result of one external tool invocation
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub command: String,
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Turn this output into an `ExternalTool` error with full context
    pub fn into_error(self, code: u16, message: impl Into<String>) -> CrabError {
        CrabError::external_tool(
            code,
            message,
            self.command,
            self.status.code(),
            self.stdout,
            self.stderr,
        )
    }

    /// Log command, exit code and both streams at error level
    pub fn log_failure(&self, what: &str) {
        tracing::error!(
            "{}\nCommand: {}\nReturn code: {:?}\n----- stdout -----\n{}\n----- stderr -----\n{}",
            what,
            self.command,
            self.status.code(),
            self.stdout.trim(),
            self.stderr.trim()
        );
    }
}

#[derive(Clone)]
pub struct SubprocessManager {
    runner: Arc<dyn ProcessRunner>,
}

impl SubprocessManager {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    pub fn production() -> Self {
        Self::new(Arc::new(TokioProcessRunner))
    }

    pub fn mock() -> (Self, MockProcessRunner) {
        let mock = MockProcessRunner::new();
        let runner = Arc::new(mock.clone()) as Arc<dyn ProcessRunner>;
        (Self::new(runner), mock)
    }

    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        Arc::clone(&self.runner)
    }

    /// Run a tool and capture its output whatever the exit code
    ///
    /// Only a failure to run at all (missing binary, timeout) is an error.
    pub async fn run_tool(&self, command: ProcessCommand) -> Result<ToolOutput, CrabError> {
        let display = command.display();
        let output = self
            .runner
            .run(command)
            .await
            .map_err(|e| e.into_tool_error(&display))?;

        Ok(ToolOutput {
            command: display,
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    /// Run a tool and treat any non-success exit as an `ExternalTool` error
    pub async fn run_checked(
        &self,
        command: ProcessCommand,
        what: &str,
    ) -> Result<ToolOutput, CrabError> {
        let output = self.run_tool(command).await?;
        if output.success() {
            Ok(output)
        } else {
            output.log_failure(what);
            Err(output.into_error(ErrorCode::EXEC_NONZERO_EXIT, what))
        }
    }
}
