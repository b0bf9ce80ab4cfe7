use super::{require_text, Generator};
use crate::error::Result;
use crate::params::ParameterMap;

pub const NAME: &str = "request_name";

/// Builds `{selections}_{year}{era}_v{era_version}_{dataset_type}{dataset_version}`
///
/// Multiple selections are joined with `_`. A `REQUEST_SUFFIX` entry is
/// appended as `_{suffix}`.
pub struct RequestNameGenerator;

impl Generator for RequestNameGenerator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn required_keys(&self) -> &'static [&'static str] {
        &[
            "SELECTION",
            "YEAR",
            "ERA",
            "ERA_VERSION",
            "DATASET_TYPE",
            "DATASET_VERSION",
        ]
    }

    fn provided_keys(&self) -> &'static [&'static str] {
        &["REQUEST_NAME"]
    }

    fn apply(&self, params: &ParameterMap) -> Result<ParameterMap> {
        let selections = params.strings("SELECTION").join("_");
        let year = require_text(params, NAME, "YEAR")?;
        let era = require_text(params, NAME, "ERA")?;
        let era_version = require_text(params, NAME, "ERA_VERSION")?;
        let dataset_type = require_text(params, NAME, "DATASET_TYPE")?;
        let dataset_version = require_text(params, NAME, "DATASET_VERSION")?;

        let mut request_name =
            format!("{selections}_{year}{era}_v{era_version}_{dataset_type}{dataset_version}");
        if let Some(suffix) = params.text("REQUEST_SUFFIX").filter(|s| !s.is_empty()) {
            request_name.push('_');
            request_name.push_str(&suffix);
        }

        Ok(ParameterMap::new().with("REQUEST_NAME", request_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> ParameterMap {
        ParameterMap::new()
            .with("SELECTION", "ZtoTauToEleProbeTrk")
            .with("YEAR", 2023i64)
            .with("ERA", "C")
            .with("ERA_VERSION", 1i64)
            .with("DATASET_TYPE", "Muon")
            .with("DATASET_VERSION", 0i64)
    }

    #[test]
    fn test_single_selection() {
        let additions = RequestNameGenerator.apply(&entry()).unwrap();
        assert_eq!(
            additions.text("REQUEST_NAME").as_deref(),
            Some("ZtoTauToEleProbeTrk_2023C_v1_Muon0")
        );
    }

    #[test]
    fn test_multiple_selections_joined() {
        let params = entry().with(
            "SELECTION",
            vec![
                "ZtoTauToEleProbeTrk".to_string(),
                "ZtoTauToEleProbeTrkWithFilter".to_string(),
            ],
        );
        let additions = RequestNameGenerator.apply(&params).unwrap();
        assert_eq!(
            additions.text("REQUEST_NAME").as_deref(),
            Some("ZtoTauToEleProbeTrk_ZtoTauToEleProbeTrkWithFilter_2023C_v1_Muon0")
        );
    }

    #[test]
    fn test_suffix_appended() {
        let params = entry().with("REQUEST_SUFFIX", "recovery");
        let additions = RequestNameGenerator.apply(&params).unwrap();
        assert_eq!(
            additions.text("REQUEST_NAME").as_deref(),
            Some("ZtoTauToEleProbeTrk_2023C_v1_Muon0_recovery")
        );
    }
}
