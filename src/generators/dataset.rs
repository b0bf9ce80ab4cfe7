use super::{require_text, Generator};
use crate::config::DatasetCatalog;
use crate::error::{CrabError, Result};
use crate::params::ParameterMap;
use std::sync::Arc;

pub const NAME: &str = "dataset";

/// Dataset type used by layer-count tasks, whose inputs are skim files
pub const NLAYERS_DATASET_TYPE: &str = "NLayers";

/// Resolves the input dataset from the selection and run period
pub struct DatasetGenerator {
    catalog: Arc<DatasetCatalog>,
}

impl DatasetGenerator {
    pub fn new(catalog: Arc<DatasetCatalog>) -> Self {
        Self { catalog }
    }

    fn dataset_type(&self, selections: &[String]) -> Result<String> {
        let mut resolved: Option<String> = None;
        for selection in selections {
            let dataset_type = self.catalog.dataset_type(selection)?;
            match &resolved {
                Some(existing) if *existing != dataset_type => {
                    return Err(CrabError::config_lookup(
                        format!(
                            "selections of one job entry disagree on dataset type ({existing} vs {dataset_type})"
                        ),
                        ["selections", selection.as_str()],
                    ));
                }
                Some(_) => {}
                None => resolved = Some(dataset_type),
            }
        }
        resolved.ok_or_else(|| CrabError::config_lookup("SELECTION is empty", ["SELECTION"]))
    }
}

impl Generator for DatasetGenerator {
    fn name(&self) -> &'static str {
        NAME
    }

    fn required_keys(&self) -> &'static [&'static str] {
        &["SELECTION", "YEAR", "ERA", "ERA_VERSION", "DATASET_VERSION"]
    }

    fn provided_keys(&self) -> &'static [&'static str] {
        &["DATASET_TYPE", "DATASET"]
    }

    fn apply(&self, params: &ParameterMap) -> Result<ParameterMap> {
        if params.flag("NLAYERS") {
            return Ok(ParameterMap::new().with("DATASET_TYPE", NLAYERS_DATASET_TYPE));
        }

        let dataset_type = self.dataset_type(&params.strings("SELECTION"))?;
        let year = require_text(params, NAME, "YEAR")?;
        let era = require_text(params, NAME, "ERA")?;
        let era_version = require_text(params, NAME, "ERA_VERSION")?;
        let dataset_version = require_text(params, NAME, "DATASET_VERSION")?;

        let dataset_key = format!("{dataset_type}{dataset_version}");
        let dataset = self
            .catalog
            .dataset(&year, &era, &era_version, &dataset_key)?;

        Ok(ParameterMap::new()
            .with("DATASET_TYPE", dataset_type)
            .with("DATASET", dataset))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{muon_entry, DATASETS, SELECTIONS};
    use super::*;

    fn generator() -> DatasetGenerator {
        DatasetGenerator::new(Arc::new(
            DatasetCatalog::from_strs(DATASETS, SELECTIONS).unwrap(),
        ))
    }

    #[test]
    fn test_resolves_dataset() {
        let additions = generator().apply(&muon_entry()).unwrap();
        assert_eq!(additions.text("DATASET_TYPE").as_deref(), Some("Muon"));
        assert_eq!(
            additions.text("DATASET").as_deref(),
            Some("/Muon0/Run2023C-22Sep2023_v1-v1/AOD")
        );
        assert_eq!(additions.len(), 2);
    }

    #[test]
    fn test_multi_selection_same_type() {
        let entry = muon_entry().with(
            "SELECTION",
            vec!["MuonTagSkim".to_string(), "MuonFiducial".to_string()],
        );
        let additions = generator().apply(&entry).unwrap();
        assert_eq!(additions.text("DATASET_TYPE").as_deref(), Some("Muon"));
    }

    #[test]
    fn test_multi_selection_conflicting_types() {
        let entry = muon_entry().with(
            "SELECTION",
            vec!["MuonTagSkim".to_string(), "ZtoTauToEleProbeTrk".to_string()],
        );
        let err = generator().apply(&entry).unwrap_err();
        assert!(matches!(err, CrabError::ConfigLookup { .. }));
    }

    #[test]
    fn test_missing_era_version_in_catalogue() {
        let entry = muon_entry().with("ERA_VERSION", 3i64);
        let err = generator().apply(&entry).unwrap_err();
        match err {
            CrabError::ConfigLookup { lookup_path, .. } => {
                assert_eq!(lookup_path, vec!["2023", "C", "v3"])
            }
            other => panic!("expected ConfigLookup, got {other:?}"),
        }
    }

    #[test]
    fn test_nlayers_skips_lookup() {
        let entry = muon_entry()
            .with("SELECTION", "NotInCatalogue")
            .with("NLAYERS", true);
        let additions = generator().apply(&entry).unwrap();
        assert_eq!(additions.text("DATASET_TYPE").as_deref(), Some("NLayers"));
        assert!(!additions.contains_key("DATASET"));
    }
}
