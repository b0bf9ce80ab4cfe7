use super::{require_text, Generator};
use crate::consolidate::grouping::{selection_label, OutputKind};
use crate::error::{CrabError, Result};
use crate::params::ParameterMap;
use std::path::PathBuf;

pub const NAME: &str = "skim_files";

/// Writes the input-file manifest for layer-count tasks
///
/// Only active when `NLAYERS` is set. `SKIM_LISTING` names a local file
/// listing remote skim files, one per line; the lines whose selection label
/// matches the entry's selections go into
/// `{manifest_dir}/{REQUEST_NAME}_skim_files.txt`.
pub struct SkimFilesGenerator {
    manifest_dir: PathBuf,
}

impl SkimFilesGenerator {
    pub fn new(manifest_dir: PathBuf) -> Self {
        Self { manifest_dir }
    }
}

impl Generator for SkimFilesGenerator {
    fn name(&self) -> &'static str {
        NAME
    }

    // Conditional on NLAYERS, checked in apply
    fn required_keys(&self) -> &'static [&'static str] {
        &[]
    }

    fn provided_keys(&self) -> &'static [&'static str] {
        &["SKIM_FILE"]
    }

    fn apply(&self, params: &ParameterMap) -> Result<ParameterMap> {
        if !params.flag("NLAYERS") {
            return Ok(ParameterMap::new());
        }

        let missing = params.missing(&["REQUEST_NAME", "SELECTION", "SKIM_LISTING"]);
        if !missing.is_empty() {
            return Err(CrabError::missing_parameter(
                NAME,
                missing.into_iter().map(str::to_string).collect(),
            ));
        }

        let request_name = require_text(params, NAME, "REQUEST_NAME")?;
        let selections = params.strings("SELECTION");
        let listing_path = PathBuf::from(require_text(params, NAME, "SKIM_LISTING")?);

        let listing = std::fs::read_to_string(&listing_path).map_err(|e| {
            CrabError::io("cannot read skim listing", Some(listing_path.clone())).with_source(e)
        })?;

        let matched: Vec<&str> = listing
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| {
                selection_label(OutputKind::Skim, line)
                    .map(|label| selections.iter().any(|s| *s == label))
                    .unwrap_or(false)
            })
            .collect();

        if matched.is_empty() {
            return Err(CrabError::config_lookup(
                format!(
                    "no skim files for selection {} in {}",
                    selections.join(","),
                    listing_path.display()
                ),
                ["SKIM_LISTING", selections.join(",").as_str()],
            ));
        }

        std::fs::create_dir_all(&self.manifest_dir).map_err(|e| {
            CrabError::io("cannot create manifest directory", Some(self.manifest_dir.clone()))
                .with_source(e)
        })?;
        let manifest = self
            .manifest_dir
            .join(format!("{request_name}_skim_files.txt"));
        std::fs::write(&manifest, matched.join("\n")).map_err(|e| {
            CrabError::io("cannot write skim manifest", Some(manifest.clone())).with_source(e)
        })?;

        tracing::info!(
            "Wrote {} skim files for {} to {}",
            matched.len(),
            request_name,
            manifest.display()
        );
        Ok(ParameterMap::new().with("SKIM_FILE", manifest.display().to_string()))
    }
}
