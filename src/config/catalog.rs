//! Static dataset and selection catalogues
//!
//! `datasets.toml` is keyed year → era → `v{era_version}` →
//! `{dataset_type}{dataset_version}`, each leaf table holding the dataset
//! path. Every year also carries a `lumiMask`. `selections.toml` maps a
//! selection name to its dataset type.

use crate::error::{CrabError, ErrorCode, Result};
use std::path::Path;
use toml::{Table, Value};

#[derive(Debug, Clone, Default)]
pub struct DatasetCatalog {
    datasets: Table,
    selections: Table,
}

impl DatasetCatalog {
    pub fn load(datasets_path: &Path, selections_path: &Path) -> Result<Self> {
        let datasets = read_table(datasets_path)?;
        let selections = read_table(selections_path)?;
        Ok(Self {
            datasets,
            selections,
        })
    }

    pub fn from_strs(datasets: &str, selections: &str) -> Result<Self> {
        Ok(Self {
            datasets: datasets.parse::<Table>()?,
            selections: selections.parse::<Table>()?,
        })
    }

    /// Dataset type (`Muon`, `EGamma`, ...) a selection runs on
    pub fn dataset_type(&self, selection: &str) -> Result<String> {
        self.selections
            .get(selection)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                CrabError::config_lookup(
                    format!("selection '{selection}' has no dataset type"),
                    ["selections", selection],
                )
            })
    }

    /// Dataset path for one year/era/version/type combination
    ///
    /// The leaf may be a plain string or a table, in which case its first
    /// value is taken.
    pub fn dataset(
        &self,
        year: &str,
        era: &str,
        era_version: &str,
        dataset_key: &str,
    ) -> Result<String> {
        let version_key = format!("v{era_version}");
        let path = [year, era, version_key.as_str(), dataset_key];

        let mut current: Option<&Value> = None;
        let mut table = &self.datasets;
        for (depth, key) in path.iter().enumerate() {
            let value = table.get(*key).ok_or_else(|| {
                CrabError::config_lookup(
                    format!("no entry '{key}' in the dataset catalogue"),
                    path[..=depth].iter().copied(),
                )
            })?;
            current = Some(value);
            if depth + 1 < path.len() {
                table = value.as_table().ok_or_else(|| {
                    CrabError::config_lookup(
                        format!("entry '{key}' is not a table"),
                        path[..=depth].iter().copied(),
                    )
                })?;
            }
        }

        let leaf = match current {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Table(t)) => t.values().next().and_then(Value::as_str).map(str::to_string),
            _ => None,
        };
        leaf.ok_or_else(|| {
            CrabError::config_lookup("dataset entry holds no dataset path", path.iter().copied())
        })
    }

    pub fn lumi_mask(&self, year: &str) -> Result<String> {
        self.datasets
            .get(year)
            .and_then(Value::as_table)
            .and_then(|t| t.get("lumiMask"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                CrabError::config_lookup(format!("year {year} has no lumiMask"), [year, "lumiMask"])
            })
    }
}

fn read_table(path: &Path) -> Result<Table> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CrabError::config_with_code(
            ErrorCode::CONFIG_NOT_FOUND,
            format!("cannot read catalogue {}", path.display()),
        )
        .with_source(e)
    })?;
    content
        .parse::<Table>()
        .map_err(|e| CrabError::from(e).with_context(path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATASETS: &str = r#"
[2023]
lumiMask = "Cert_Collisions2023_366442_370790_Golden.json"

[2023.C.v1.Muon0]
path = "/Muon0/Run2023C-22Sep2023_v1-v1/AOD"

[2023.C.v1.EGamma1]
path = "/EGamma1/Run2023C-22Sep2023_v1-v1/AOD"

[2022.D.v1]
Tau0 = "/Tau/Run2022D-27Jun2023-v2/AOD"
"#;

    const SELECTIONS: &str = r#"
MuonTagSkim = "Muon"
ZtoTauToEleProbeTrk = "EGamma"
TauTagSkim = "Tau"
"#;

    fn catalog() -> DatasetCatalog {
        DatasetCatalog::from_strs(DATASETS, SELECTIONS).unwrap()
    }

    #[test]
    fn test_dataset_type() {
        assert_eq!(catalog().dataset_type("MuonTagSkim").unwrap(), "Muon");
        let err = catalog().dataset_type("Unknown").unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_LOOKUP_FAILED);
    }

    #[test]
    fn test_dataset_lookup_table_and_string_leaf() {
        let catalog = catalog();
        assert_eq!(
            catalog.dataset("2023", "C", "1", "Muon0").unwrap(),
            "/Muon0/Run2023C-22Sep2023_v1-v1/AOD"
        );
        assert_eq!(
            catalog.dataset("2022", "D", "1", "Tau0").unwrap(),
            "/Tau/Run2022D-27Jun2023-v2/AOD"
        );
    }

    #[test]
    fn test_dataset_lookup_reports_failing_level() {
        let err = catalog().dataset("2023", "C", "2", "Muon0").unwrap_err();
        match err {
            CrabError::ConfigLookup { lookup_path, .. } => {
                assert_eq!(lookup_path, vec!["2023", "C", "v2"]);
            }
            other => panic!("expected ConfigLookup, got {other:?}"),
        }

        let err = catalog().dataset("2024", "C", "1", "Muon0").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_lumi_mask() {
        assert_eq!(
            catalog().lumi_mask("2023").unwrap(),
            "Cert_Collisions2023_366442_370790_Golden.json"
        );
        assert!(catalog().lumi_mask("2022").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = DatasetCatalog::load(
            Path::new("/nonexistent/datasets.toml"),
            Path::new("/nonexistent/selections.toml"),
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_NOT_FOUND);
    }
}
