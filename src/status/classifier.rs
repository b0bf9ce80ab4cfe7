use super::{JobRecord, JobState, TaskState};

/// Exit codes for jobs that ran out of resources; retrying the same job is
/// futile
pub const UNRECOVERABLE_EXIT_CODES: [i64; 3] = [50660, 50661, 50662];

/// Jobs retried more often than this are not retried again automatically
pub const MAX_RETRIES: u32 = 5;

impl JobRecord {
    pub fn has_unrecoverable_error(&self) -> bool {
        self.error_codes
            .first()
            .is_some_and(|code| UNRECOVERABLE_EXIT_CODES.contains(code))
    }

    pub fn has_too_many_retries(&self) -> bool {
        self.retry_count > MAX_RETRIES
    }

    pub fn is_unrecoverable(&self) -> bool {
        self.has_unrecoverable_error() || self.has_too_many_retries()
    }
}

/// Reduce one poll's job records to a task state
///
/// First match wins:
/// 1. every job finished
/// 2. any failed job, recoverable or not
/// 3. any job purged, unknown or invalid
/// 4. otherwise still processing
///
/// Whether a failure is recoverable does not change the state; it is kept on
/// [`super::TaskReport`] for choosing the recovery action. An empty record
/// set carries no information and is `Unknown`.
pub fn classify(records: &[JobRecord]) -> TaskState {
    if records.is_empty() {
        return TaskState::Unknown;
    }

    if records.iter().all(|r| r.state == JobState::Finished) {
        TaskState::Finished
    } else if records.iter().any(|r| r.state == JobState::Failed) {
        TaskState::Failed
    } else if records.iter().any(|r| r.state.is_indeterminate()) {
        TaskState::Unknown
    } else {
        TaskState::Processing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: u32, state: JobState, retries: u32, errors: &[i64]) -> JobRecord {
        JobRecord {
            job_id: id.to_string(),
            state,
            retry_count: retries,
            error_codes: errors.to_vec(),
            message: None,
        }
    }

    #[test]
    fn test_all_finished() {
        let records: Vec<_> = (1..=3).map(|i| job(i, JobState::Finished, 0, &[])).collect();
        assert_eq!(classify(&records), TaskState::Finished);
    }

    #[test]
    fn test_failed_beats_unknown() {
        let records = vec![
            job(1, JobState::Unknown, 0, &[]),
            job(2, JobState::Failed, 1, &[8021]),
            job(3, JobState::Purged, 0, &[]),
        ];
        assert_eq!(classify(&records), TaskState::Failed);
    }

    #[test]
    fn test_unrecoverable_failure() {
        let records = vec![
            job(1, JobState::Finished, 0, &[]),
            job(2, JobState::Failed, 0, &[50660, 8001]),
            job(3, JobState::Running, 0, &[]),
        ];
        assert_eq!(classify(&records), TaskState::Failed);
        assert!(records[1].has_unrecoverable_error());
    }

    #[test]
    fn test_only_first_error_code_counts() {
        assert!(!job(1, JobState::Failed, 0, &[8001, 50660]).has_unrecoverable_error());
    }

    #[test]
    fn test_retry_threshold_is_exclusive() {
        assert!(!job(1, JobState::Failed, MAX_RETRIES, &[]).has_too_many_retries());
        assert!(job(1, JobState::Failed, MAX_RETRIES + 1, &[]).has_too_many_retries());
    }

    #[test]
    fn test_indeterminate_states_are_unknown() {
        for state in [JobState::Purged, JobState::Unknown, JobState::Invalid] {
            let records = vec![job(1, JobState::Finished, 0, &[]), job(2, state, 0, &[])];
            assert_eq!(classify(&records), TaskState::Unknown, "{state:?}");
        }
    }

    #[test]
    fn test_in_flight_jobs_are_processing() {
        let records = vec![
            job(1, JobState::Idle, 0, &[]),
            job(2, JobState::Running, 0, &[]),
            job(3, JobState::Transferring, 0, &[]),
            job(4, JobState::Finished, 0, &[]),
        ];
        assert_eq!(classify(&records), TaskState::Processing);
    }

    #[test]
    fn test_empty_is_unknown() {
        assert_eq!(classify(&[]), TaskState::Unknown);
    }
}
