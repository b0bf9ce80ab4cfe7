//! Batch descriptions: an ordered list of flat job entries in YAML
//!
//! Either a top-level sequence or a mapping with a `jobs` sequence is
//! accepted.

use crate::error::{CrabError, ErrorCode, Result};
use crate::params::ParameterMap;
use serde_yaml::Value;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct BatchDescription {
    pub entries: Vec<ParameterMap>,
}

impl BatchDescription {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn load_batch_description(path: &Path) -> Result<BatchDescription> {
    if !path.is_file() {
        return Err(CrabError::config_with_code(
            ErrorCode::CONFIG_NOT_FOUND,
            format!("Batch file {} does not exist", path.display()),
        ));
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| CrabError::from(e).with_context(path.display()))?;
    parse_batch_description(&content).map_err(|e| e.with_context(path.display()))
}

pub fn parse_batch_description(content: &str) -> Result<BatchDescription> {
    if content.trim().is_empty() {
        return Ok(BatchDescription::default());
    }
    let document: Value = serde_yaml::from_str(content)?;

    let items = match &document {
        Value::Sequence(items) => items,
        Value::Mapping(map) => match map.get("jobs") {
            Some(Value::Sequence(items)) => items,
            _ => {
                return Err(CrabError::config_with_code(
                    ErrorCode::CONFIG_INVALID_VALUE,
                    "Batch description must be a list of job entries or contain a 'jobs' list",
                ))
            }
        },
        Value::Null => return Ok(BatchDescription::default()),
        _ => {
            return Err(CrabError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                "Batch description must be a list of job entries",
            ))
        }
    };

    let entries = items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Mapping(mapping) => ParameterMap::from_yaml_mapping(mapping)
                .map_err(|e| e.with_context(format!("job entry {}", index + 1))),
            _ => Err(CrabError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                format!("Job entry {} is not a key/value mapping", index + 1),
            )),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(BatchDescription { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_level_list() {
        let batch = parse_batch_description(
            r#"
- year: 2023
  era: C
  era_version: 1
  dataset_version: 0
  selection: MuonTagSkim
- year: 2023
  era: D
  era_version: 2
  dataset_version: 1
  selection: [ZtoTauToEleProbeTrk, ZtoTauToEleProbeTrkWithFilter]
"#,
        )
        .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.entries[0].text("ERA").as_deref(), Some("C"));
        assert_eq!(batch.entries[1].strings("SELECTION").len(), 2);
    }

    #[test]
    fn test_jobs_key() {
        let batch = parse_batch_description("jobs:\n  - year: 2022\n    era: F\n").unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_empty_document() {
        assert!(parse_batch_description("").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_scalar_entries() {
        let err = parse_batch_description("- just a string\n").unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_INVALID_VALUE);
    }

    #[test]
    fn test_missing_file() {
        let err = load_batch_description(Path::new("/nonexistent/batch.yml")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
