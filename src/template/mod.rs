//! `__TOKEN__` substitution
//!
//! A token whose name is a parameter key is replaced by the value's textual
//! form. Unknown tokens stay as they are so a partially filled document is
//! still readable and can be completed by a later pass.

pub mod archive;
pub mod manifest;

pub use archive::{archive_file_name, ArchiveRun};
pub use manifest::{BoundTemplate, TemplateManifest, TemplateSet};

use crate::error::{CrabError, Result};
use crate::params::ParameterMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"__([A-Z0-9_]+)__").unwrap());

/// Substitute every known token in `template`
pub fn render(template: &str, params: &ParameterMap) -> String {
    TOKEN
        .replace_all(template, |caps: &Captures| match params.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Token names in order of first appearance
pub fn tokens(template: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in TOKEN.captures_iter(template) {
        let name = caps[1].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// Template source text, never modified after loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDocument {
    source: String,
    path: Option<PathBuf>,
}

impl TemplateDocument {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            path: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            CrabError::template("cannot read template", Some(path.to_path_buf())).with_source(e)
        })?;
        Ok(Self {
            source,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn render(&self, params: &ParameterMap) -> String {
        render(&self.source, params)
    }

    /// Tokens with no value in `params`
    pub fn unresolved(&self, params: &ParameterMap) -> Vec<String> {
        tokens(&self.source)
            .into_iter()
            .filter(|t| !params.contains_key(t))
            .collect()
    }

    /// Render once and write the same text to the live and archival paths
    pub fn render_to(
        &self,
        params: &ParameterMap,
        live_path: &Path,
        archive_path: Option<&Path>,
    ) -> Result<RenderedTemplate> {
        let text = self.render(params);

        let unresolved = self.unresolved(params);
        if !unresolved.is_empty() {
            tracing::debug!(
                "Template {} keeps unresolved tokens: {}",
                self.path.as_deref().unwrap_or(Path::new("<inline>")).display(),
                unresolved.join(", ")
            );
        }

        write_text(live_path, &text)?;
        if let Some(archive_path) = archive_path {
            write_text(archive_path, &text)?;
        }

        Ok(RenderedTemplate {
            text,
            live_path: live_path.to_path_buf(),
            archive_path: archive_path.map(Path::to_path_buf),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RenderedTemplate {
    pub text: String,
    pub live_path: PathBuf,
    pub archive_path: Option<PathBuf>,
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            CrabError::template("cannot create output directory", Some(parent.to_path_buf()))
                .with_source(e)
        })?;
    }
    std::fs::write(path, text).map_err(|e| {
        CrabError::template("cannot write rendered template", Some(path.to_path_buf()))
            .with_source(e)
    })
}
