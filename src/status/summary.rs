use super::{RecoveryAction, TaskReport, TaskState};
use crate::error::{CrabError, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub task: String,
    pub state: TaskState,
    pub output_directory: Option<String>,
    pub action: RecoveryAction,
    pub report: TaskReport,
}

impl TaskSummary {
    pub fn new(task: impl Into<String>, report: TaskReport, output_directory: Option<String>) -> Self {
        Self {
            task: task.into(),
            state: report.state,
            action: report.recommended_action(),
            output_directory,
            report,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub finished: usize,
    pub processing: usize,
    pub failed: usize,
    pub unknown: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.finished + self.processing + self.failed + self.unknown
    }
}

/// Outcome of one status run
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub generated_at: DateTime<Local>,
    pub counts: StatusCounts,
    pub tasks: Vec<TaskSummary>,
}

impl StatusSummary {
    pub fn new(tasks: Vec<TaskSummary>) -> Self {
        let mut counts = StatusCounts::default();
        for task in &tasks {
            match task.state {
                TaskState::Finished => counts.finished += 1,
                TaskState::Processing => counts.processing += 1,
                TaskState::Failed => counts.failed += 1,
                TaskState::Unknown => counts.unknown += 1,
            }
        }
        Self {
            generated_at: Local::now(),
            counts,
            tasks,
        }
    }

    /// Body for the email and push notifications
    pub fn message(&self) -> String {
        let c = &self.counts;
        let mut body = format!(
            "The status of your crab tasks has been received. There are {} finished tasks, \
             {} tasks still running, {} tasks with failed jobs and {} tasks with an unknown status.",
            c.finished, c.processing, c.failed, c.unknown
        );
        if c.failed > 0 {
            body.push_str(
                " Resubmit to fix the failed jobs; if the number of failures stays the same \
                 over several resubmits, check the tasks manually.",
            );
        }
        if c.unknown > 0 {
            body.push_str(" Tasks with an unknown status need a manual check.");
        }
        body
    }

    /// Write `crab_summary_{timestamp}.json` into `cache_dir`
    pub fn write_to(&self, cache_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(cache_dir).map_err(|e| {
            CrabError::io("cannot create cache directory", Some(cache_dir.to_path_buf()))
                .with_source(e)
        })?;
        let path = cache_dir.join(format!(
            "crab_summary_{}.json",
            self.generated_at.format("%Y%m%d_%H%M%S")
        ));
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|e| {
            CrabError::io("cannot write status summary", Some(path.clone())).with_source(e)
        })?;
        tracing::info!("Status summary written to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn summary() -> StatusSummary {
        StatusSummary::new(vec![
            TaskSummary::new(
                "crab_A_2023C_v1_Muon0",
                TaskReport::from_output(r#"{"1": {"State": "finished"}}"#),
                Some("/store/group/lpclonglived/DisappTrks/A/B/".to_string()),
            ),
            TaskSummary::new(
                "crab_B_2023C_v1_Muon0",
                TaskReport::from_output(r#"{"1": {"State": "failed", "Error": [50660]}}"#),
                None,
            ),
            TaskSummary::new("crab_C_2023C_v1_Muon0", TaskReport::from_output("noise"), None),
        ])
    }

    #[test]
    fn test_counts() {
        let s = summary();
        assert_eq!(
            s.counts,
            StatusCounts {
                finished: 1,
                processing: 0,
                failed: 1,
                unknown: 1
            }
        );
        assert_eq!(s.counts.total(), 3);
        assert!(s.message().contains("1 finished tasks"));
        assert!(s.message().contains("manual check"));
    }

    #[test]
    fn test_write_summary_json() {
        let dir = TempDir::new().unwrap();
        let path = summary().write_to(&dir.path().join("cache")).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("crab_summary_") && name.ends_with(".json"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["tasks"][0]["state"], "Finished");
        assert_eq!(json["tasks"][0]["action"], "consolidate");
        assert_eq!(json["tasks"][1]["action"], "recovery_task");
        assert_eq!(json["counts"]["unknown"], 1);
    }
}
