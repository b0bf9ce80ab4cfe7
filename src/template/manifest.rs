//! Template manifest
//!
//! ```yaml
//! templates:
//!   - input: crab_template.py
//!     output: crab_cfg.py
//!     submit: true
//!   - input: config_template.py
//!     output: config_cfg.py
//! ```
//!
//! `input` is relative to the template directory, `output` to the run
//! directory. Exactly one entry is the grid-client configuration handed to
//! the submit command.

use super::TemplateDocument;
use crate::error::{CrabError, ErrorCode, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TemplateEntry {
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(default)]
    pub submit: bool,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct TemplateManifest {
    #[serde(default)]
    pub templates: Vec<TemplateEntry>,
}

impl TemplateManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CrabError::config_with_code(
                ErrorCode::CONFIG_NOT_FOUND,
                format!("cannot read template manifest {}", path.display()),
            )
            .with_source(e)
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let manifest: Self = serde_yaml::from_str(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        if self.templates.is_empty() {
            return Err(CrabError::config_with_code(
                ErrorCode::TEMPLATE_MANIFEST_INVALID,
                "template manifest lists no templates",
            ));
        }
        let submit_count = self.templates.iter().filter(|t| t.submit).count();
        if submit_count != 1 {
            return Err(CrabError::config_with_code(
                ErrorCode::TEMPLATE_MANIFEST_INVALID,
                format!("template manifest needs exactly one submit entry, found {submit_count}"),
            ));
        }
        Ok(())
    }

    /// Load every listed template
    pub fn bind(&self, template_dir: &Path, run_dir: &Path) -> Result<TemplateSet> {
        let templates = self
            .templates
            .iter()
            .map(|entry| {
                Ok(BoundTemplate {
                    document: TemplateDocument::load(&template_dir.join(&entry.input))?,
                    source_name: entry.input.clone(),
                    live_path: run_dir.join(&entry.output),
                    submit: entry.submit,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        TemplateSet::new(templates)
    }
}

/// A template paired with where its live copy goes
#[derive(Debug, Clone)]
pub struct BoundTemplate {
    pub document: TemplateDocument,
    pub source_name: PathBuf,
    pub live_path: PathBuf,
    pub submit: bool,
}

/// Every template rendered for one job entry
#[derive(Debug, Clone)]
pub struct TemplateSet {
    templates: Vec<BoundTemplate>,
    submit_index: usize,
}

impl TemplateSet {
    pub fn new(templates: Vec<BoundTemplate>) -> Result<Self> {
        let mut submit = templates.iter().enumerate().filter(|(_, t)| t.submit);
        match (submit.next(), submit.next()) {
            (Some((submit_index, _)), None) => Ok(Self {
                submit_index,
                templates,
            }),
            _ => Err(CrabError::config_with_code(
                ErrorCode::TEMPLATE_MANIFEST_INVALID,
                "exactly one template must be marked for submission",
            )),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundTemplate> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Live path of the grid-client configuration
    pub fn submit_path(&self) -> &Path {
        &self.templates[self.submit_index].live_path
    }
}
