//! Job status parsing and task classification
//!
//! Records are rebuilt from the grid client's output on every poll and
//! reduced to one [`TaskState`] per task. A [`TaskReport`] keeps the extra
//! detail needed to pick what to do next with the task.

pub mod classifier;
pub mod parser;
pub mod summary;
pub mod task_name;

pub use classifier::{classify, MAX_RETRIES, UNRECOVERABLE_EXIT_CODES};
pub use parser::parse_status;
pub use summary::{StatusCounts, StatusSummary, TaskSummary};
pub use task_name::{parse_task_name, TaskName};

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Idle,
    Running,
    Transferring,
    Finished,
    Failed,
    Purged,
    Unknown,
    Invalid,
}

impl JobState {
    /// Map a state string reported by the grid client
    ///
    /// Scheduler-side waiting states count as idle. Anything unrecognised is
    /// `Unknown` so it surfaces for a manual look.
    pub fn from_reported(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "idle" | "unsubmitted" | "cooloff" | "held" | "toretry" => Self::Idle,
            "running" => Self::Running,
            "transferring" | "transferred" => Self::Transferring,
            "finished" => Self::Finished,
            "failed" => Self::Failed,
            "purged" => Self::Purged,
            "invalid" => Self::Invalid,
            other => {
                tracing::debug!("Unrecognised job state '{}'", other);
                Self::Unknown
            }
        }
    }

    /// Purged, unknown and invalid say nothing about progress
    pub fn is_indeterminate(self) -> bool {
        matches!(self, Self::Purged | Self::Unknown | Self::Invalid)
    }
}

/// One job as seen in one poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRecord {
    pub job_id: String,
    pub state: JobState,
    pub retry_count: u32,
    pub error_codes: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JobRecord {
    /// Stand-in record when the output held no per-job data
    pub fn placeholder(state: JobState, message: impl Into<String>) -> Self {
        Self {
            job_id: "-".to_string(),
            state,
            retry_count: 0,
            error_codes: Vec::new(),
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TaskState {
    Finished,
    Processing,
    Failed,
    Unknown,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Finished => "Finished",
            Self::Processing => "Processing",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// What to do with a task after a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    Consolidate,
    Wait,
    Resubmit,
    RecoveryTask,
    Escalate,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Consolidate => "consolidate",
            Self::Wait => "wait",
            Self::Resubmit => "resubmit",
            Self::RecoveryTask => "recovery task",
            Self::Escalate => "escalate",
        };
        f.write_str(s)
    }
}

/// Classification of one task plus the failure detail behind it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub state: TaskState,
    pub jobs: usize,
    pub failed_jobs: Vec<String>,
    pub unrecoverable_jobs: Vec<String>,
    pub too_many_retries_jobs: Vec<String>,
}

impl TaskReport {
    pub fn from_records(records: &[JobRecord]) -> Self {
        let ids = |pred: fn(&JobRecord) -> bool| -> Vec<String> {
            records
                .iter()
                .filter(|r| pred(r))
                .map(|r| r.job_id.clone())
                .collect()
        };
        Self {
            state: classify(records),
            jobs: records.len(),
            failed_jobs: ids(|r| r.state == JobState::Failed),
            unrecoverable_jobs: ids(JobRecord::has_unrecoverable_error),
            too_many_retries_jobs: ids(JobRecord::has_too_many_retries),
        }
    }

    /// Parse raw status output and classify it
    pub fn from_output(raw: &str) -> Self {
        Self::from_records(&parse_status(raw))
    }

    pub fn recommended_action(&self) -> RecoveryAction {
        match self.state {
            TaskState::Finished => RecoveryAction::Consolidate,
            TaskState::Processing => RecoveryAction::Wait,
            TaskState::Unknown => RecoveryAction::Escalate,
            TaskState::Failed if !self.unrecoverable_jobs.is_empty() => {
                RecoveryAction::RecoveryTask
            }
            TaskState::Failed if !self.too_many_retries_jobs.is_empty() => {
                RecoveryAction::Escalate
            }
            TaskState::Failed => RecoveryAction::Resubmit,
        }
    }
}
