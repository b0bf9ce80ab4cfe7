//! Grid client status output
//!
//! `status --json` prints a banner, then a JSON object keyed by job id:
//!
//! ```text
//! {"1": {"State": "finished", "Retries": 0},
//!  "2": {"State": "failed", "Retries": 3, "Error": [50660, "memory limit"]}}
//! ```
//!
//! Output without an object is either the scheduler's purge notice or noise.

use super::{JobRecord, JobState};
use crate::error::{CrabError, ErrorCode, Result};
use serde_json::{Map, Value};

pub const PURGED_NOTICE: &str = "Files are purged";

/// Parse raw status output into one record per job
///
/// Never fails: unusable output degrades to a single record in the
/// `purged`, `unknown` or `invalid` state.
pub fn parse_status(raw: &str) -> Vec<JobRecord> {
    let output = raw.trim();
    let Some(json) = json_span(output) else {
        if output.contains(PURGED_NOTICE) {
            return vec![JobRecord::placeholder(
                JobState::Purged,
                "Files purged from grid scheduler",
            )];
        }
        return vec![JobRecord::placeholder(JobState::Unknown, "No JSON found")];
    };

    match parse_jobs(json) {
        Ok(records) => records,
        Err(e) => {
            tracing::debug!("Unparsable status output: {}", e);
            vec![JobRecord::placeholder(JobState::Invalid, e.to_string())]
        }
    }
}

/// First `{` through last `}`
fn json_span(output: &str) -> Option<&str> {
    let start = output.find('{')?;
    let end = output.rfind('}')?;
    (end > start).then(|| &output[start..=end])
}

/// Strict parse of the JSON object
pub fn parse_jobs(json: &str) -> Result<Vec<JobRecord>> {
    let value: Value = serde_json::from_str(json).map_err(|e| {
        CrabError::parse_with_code(ErrorCode::PARSE_INVALID_JSON, "status JSON is malformed")
            .with_source(e)
    })?;
    let Value::Object(jobs) = value else {
        return Err(CrabError::parse_with_code(
            ErrorCode::PARSE_STATUS_OUTPUT,
            "status JSON is not an object keyed by job id",
        ));
    };

    let mut records: Vec<JobRecord> = jobs
        .into_iter()
        .map(|(job_id, fields)| job_record(job_id, &fields))
        .collect();
    records.sort_by(|a, b| job_order(&a.job_id).cmp(&job_order(&b.job_id)));
    Ok(records)
}

fn job_order(job_id: &str) -> (u64, &str) {
    (job_id.parse().unwrap_or(u64::MAX), job_id)
}

fn job_record(job_id: String, fields: &Value) -> JobRecord {
    let Value::Object(fields) = fields else {
        return JobRecord {
            job_id,
            state: JobState::Invalid,
            retry_count: 0,
            error_codes: Vec::new(),
            message: Some("job entry is not an object".to_string()),
        };
    };

    let state = field(fields, "state")
        .and_then(Value::as_str)
        .map(JobState::from_reported)
        .unwrap_or(JobState::Unknown);
    let retry_count = field(fields, "retries").map(retry_count).unwrap_or(0);
    let error_codes = field(fields, "error").map(error_codes).unwrap_or_default();

    JobRecord {
        job_id,
        state,
        retry_count,
        error_codes,
        message: None,
    }
}

/// Field lookup tolerant of `State`/`state`/`STATE`
fn field<'a>(fields: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    fields
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

fn retry_count(value: &Value) -> u32 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n.is_finite() && n > 0.0 => n.min(f64::from(u32::MAX)) as u32,
        _ => 0,
    }
}

fn error_codes(value: &Value) -> Vec<i64> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_after_banner() {
        let raw = r#"
Rucio client intialized for account dmyers
CRAB project directory:		/home/u/crab_A_2023C_v1_Muon0
{"1": {"State": "finished", "Retries": 0},
 "2": {"State": "running", "Retries": "2"},
 "10": {"State": "failed", "Retries": 1, "Error": [50660, "Job exceeded memory", {}]}}
Log file is /home/u/crab.log
"#;
        let records = parse_status(raw);
        let ids: Vec<_> = records.iter().map(|r| r.job_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "10"]);
        assert_eq!(records[0].state, JobState::Finished);
        assert_eq!(records[1].retry_count, 2);
        assert_eq!(records[2].state, JobState::Failed);
        assert_eq!(records[2].error_codes, vec![50660]);
    }

    #[test]
    fn test_purged_notice() {
        let records = parse_status("Task status unavailable: Files are purged from the schedd");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].state, JobState::Purged);
    }

    #[test]
    fn test_no_json_is_unknown() {
        let records = parse_status("Error contacting server");
        assert_eq!(records[0].state, JobState::Unknown);
        assert_eq!(parse_status("")[0].state, JobState::Unknown);
    }

    #[test]
    fn test_bad_json_is_invalid() {
        let records = parse_status("{ \"1\": {\"State\": } }");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].state, JobState::Invalid);
        assert!(records[0].message.is_some());
    }

    #[test]
    fn test_non_numeric_retries_coerced_to_zero() {
        let records = parse_status(
            r#"{"1": {"State": "idle", "Retries": "n/a"}, "2": {"State": "idle"}, "3": {"state": "idle", "retries": -4}}"#,
        );
        assert!(records.iter().all(|r| r.retry_count == 0));
    }

    #[test]
    fn test_case_tolerant_fields() {
        let records = parse_status(r#"{"7": {"STATE": "Transferring", "ERROR": ["50661"]}}"#);
        assert_eq!(records[0].state, JobState::Transferring);
        assert_eq!(records[0].error_codes, vec![50661]);
    }

    #[test]
    fn test_strict_parse_reports_error() {
        let err = parse_jobs("[1, 2]").unwrap_err();
        assert_eq!(err.code(), ErrorCode::PARSE_STATUS_OUTPUT);
        let err = parse_jobs("{").unwrap_err();
        assert_eq!(err.code(), ErrorCode::PARSE_INVALID_JSON);
    }
}
