//! Parameter derivation pipeline
//!
//! Each [`Generator`] declares the keys it needs and the keys it adds. The
//! pipeline checks declarations before running anything and stops at the
//! first generator whose inputs are missing.

use crate::config::{DatasetCatalog, PilotConfig};
use crate::error::{CrabError, ErrorCode, Result};
use crate::params::ParameterMap;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

pub mod dataset;
pub mod lumi_mask;
pub mod request_name;
pub mod skim_files;

pub use dataset::DatasetGenerator;
pub use lumi_mask::LumiMaskGenerator;
pub use request_name::RequestNameGenerator;
pub use skim_files::SkimFilesGenerator;

pub trait Generator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Keys that must be present before `apply` runs
    fn required_keys(&self) -> &'static [&'static str];

    /// Keys this generator may add
    fn provided_keys(&self) -> &'static [&'static str];

    /// Derive new entries from `params`; returns only the additions
    fn apply(&self, params: &ParameterMap) -> Result<ParameterMap>;
}

/// Shared read-only inputs for generator construction
#[derive(Clone)]
pub struct GeneratorContext {
    pub catalog: Arc<DatasetCatalog>,
    pub manifest_dir: PathBuf,
}

impl GeneratorContext {
    pub fn from_config(config: &PilotConfig) -> Result<Self> {
        let paths = &config.paths;
        let catalog = DatasetCatalog::load(
            &paths.resolve(&paths.datasets_file),
            &paths.resolve(&paths.selections_file),
        )?;
        Ok(Self {
            catalog: Arc::new(catalog),
            manifest_dir: paths.resolve(&paths.manifest_dir),
        })
    }
}

pub struct GeneratorPipeline {
    generators: Vec<Box<dyn Generator>>,
}

impl GeneratorPipeline {
    pub fn new(generators: Vec<Box<dyn Generator>>) -> Self {
        Self { generators }
    }

    /// Build the pipeline from configured names, keeping their order
    pub fn from_names<S: AsRef<str>>(names: &[S], context: &GeneratorContext) -> Result<Self> {
        let generators = names
            .iter()
            .map(|name| build_generator(name.as_ref(), context))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(generators))
    }

    /// Drop a generator by name
    pub fn without(mut self, name: &str) -> Self {
        self.generators.retain(|g| g.name() != name);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.generators.iter().map(|g| g.name()).collect()
    }

    /// Check declared dependencies against the keys a job entry starts with
    pub fn validate<S: AsRef<str>>(&self, initial_keys: &[S]) -> Result<()> {
        let mut available: BTreeSet<String> = initial_keys
            .iter()
            .map(|k| crate::params::normalize_key(k.as_ref()))
            .collect();

        for generator in &self.generators {
            let missing: Vec<String> = generator
                .required_keys()
                .iter()
                .filter(|key| !available.contains(**key))
                .map(|key| key.to_string())
                .collect();
            if !missing.is_empty() {
                return Err(CrabError::missing_parameter(generator.name(), missing));
            }
            available.extend(generator.provided_keys().iter().map(|k| k.to_string()));
        }
        Ok(())
    }

    /// Run every generator in order over `input`
    pub fn apply(&self, input: ParameterMap) -> Result<ParameterMap> {
        let mut params = input;
        for generator in &self.generators {
            let missing = params.missing(generator.required_keys());
            if !missing.is_empty() {
                return Err(CrabError::missing_parameter(
                    generator.name(),
                    missing.into_iter().map(str::to_string).collect(),
                ));
            }

            let additions = generator.apply(&params)?;
            tracing::debug!(
                "Generator {} added {:?}",
                generator.name(),
                additions.keys().collect::<Vec<_>>()
            );
            params.merge(additions);
        }
        Ok(params)
    }
}

fn build_generator(name: &str, context: &GeneratorContext) -> Result<Box<dyn Generator>> {
    let generator: Box<dyn Generator> = match name {
        dataset::NAME => Box::new(DatasetGenerator::new(Arc::clone(&context.catalog))),
        request_name::NAME => Box::new(RequestNameGenerator),
        lumi_mask::NAME => Box::new(LumiMaskGenerator::new(Arc::clone(&context.catalog))),
        skim_files::NAME => Box::new(SkimFilesGenerator::new(context.manifest_dir.clone())),
        other => {
            return Err(CrabError::config_with_code(
                ErrorCode::CONFIG_UNKNOWN_GENERATOR,
                format!("Unknown generator '{other}'"),
            ))
        }
    };
    Ok(generator)
}

/// Fetch a required key as text or report it missing for `generator`
pub(crate) fn require_text(params: &ParameterMap, generator: &str, key: &str) -> Result<String> {
    params
        .text(key)
        .ok_or_else(|| CrabError::missing_parameter(generator, vec![key.to_string()]))
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn default_names() -> Vec<String> {
        PilotConfig::default().generators
    }

    #[test]
    fn test_default_pipeline_derives_everything() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline =
            GeneratorPipeline::from_names(&default_names(), &context(dir.path().into())).unwrap();

        let params = pipeline.apply(muon_entry()).unwrap();
        assert_eq!(params.text("DATASET_TYPE").as_deref(), Some("Muon"));
        assert_eq!(
            params.text("DATASET").as_deref(),
            Some("/Muon0/Run2023C-22Sep2023_v1-v1/AOD")
        );
        assert_eq!(
            params.text("REQUEST_NAME").as_deref(),
            Some("MuonTagSkim_2023C_v1_Muon0")
        );
        assert_eq!(
            params.text("LUMIMASK").as_deref(),
            Some("Cert_Collisions2023_366442_370790_Golden.json")
        );
        assert!(!params.contains_key("SKIM_FILE"));
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline =
            GeneratorPipeline::from_names(&default_names(), &context(dir.path().into())).unwrap();

        let first = pipeline.apply(muon_entry()).unwrap();
        let second = pipeline.apply(muon_entry()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_key_names_generator() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline =
            GeneratorPipeline::from_names(&default_names(), &context(dir.path().into())).unwrap();

        let entry = ParameterMap::new()
            .with("SELECTION", "MuonTagSkim")
            .with("YEAR", 2023i64)
            .with("ERA", "C");
        match pipeline.apply(entry).unwrap_err() {
            CrabError::MissingParameter {
                generator, missing, ..
            } => {
                assert_eq!(generator, "dataset");
                assert_eq!(missing, vec!["ERA_VERSION", "DATASET_VERSION"]);
            }
            other => panic!("expected MissingParameter, got {other:?}"),
        }
    }

    #[test]
    fn test_order_matters_for_request_name() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline =
            GeneratorPipeline::from_names(&["request_name", "dataset"], &context(dir.path().into()))
                .unwrap();

        let err = pipeline.apply(muon_entry()).unwrap_err();
        assert!(err.to_string().contains("DATASET_TYPE"));

        let err = pipeline
            .validate(&["SELECTION", "YEAR", "ERA", "ERA_VERSION", "DATASET_VERSION"])
            .unwrap_err();
        assert!(matches!(err, CrabError::MissingParameter { ref generator, .. } if generator == "request_name"));
    }

    #[test]
    fn test_validate_default_order() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline =
            GeneratorPipeline::from_names(&default_names(), &context(dir.path().into())).unwrap();
        pipeline
            .validate(&["selection", "year", "era", "era version", "dataset version"])
            .unwrap();
    }

    #[test]
    fn test_unknown_generator_name() {
        let dir = tempfile::tempdir().unwrap();
        let err = GeneratorPipeline::from_names(&["dataset", "bogus"], &context(dir.path().into()))
            .err()
            .unwrap();
        assert_eq!(err.code(), ErrorCode::CONFIG_UNKNOWN_GENERATOR);
    }

    #[test]
    fn test_without_removes_generator() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = GeneratorPipeline::from_names(&default_names(), &context(dir.path().into()))
            .unwrap()
            .without("lumi_mask");
        assert_eq!(pipeline.names(), vec!["dataset", "request_name", "skim_files"]);
    }
}
