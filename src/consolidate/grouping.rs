//! Output file kinds and grouping by selection
//!
//! Task outputs follow the `{kind}_{selection}_{...}.root` naming convention
//! of the producing workflow; the selection label is the second
//! `_`-separated field of the file name.

use crate::error::{CrabError, ErrorCode, Result};
use crate::storage::RemoteFile;
use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

static HIST_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^hist.*\.root$").unwrap());
static SKIM_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^skim.*\.root$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Hist,
    Skim,
}

impl OutputKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Hist => "hist",
            Self::Skim => "skim",
        }
    }

    /// Name pattern handed to the storage client's `find`
    pub fn find_pattern(self) -> &'static str {
        match self {
            Self::Hist => "hist.*.root",
            Self::Skim => "skim.*.root",
        }
    }

    pub fn matches(self, file_name: &str) -> bool {
        match self {
            Self::Hist => HIST_PATTERN.is_match(file_name),
            Self::Skim => SKIM_PATTERN.is_match(file_name),
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Files to merge into one output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    pub label: String,
    pub files: Vec<RemoteFile>,
}

impl FileGroup {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Selection label of one output file
pub fn selection_label(kind: OutputKind, path: &str) -> Result<String> {
    let name = base_name(path);
    let mismatch = || {
        CrabError::file_grouping(
            ErrorCode::GROUPING_CONVENTION_MISMATCH,
            format!("file name does not follow {}_<selection>_<...>.root", kind.prefix()),
            Some(path.to_string()),
        )
    };

    let rest = name
        .strip_prefix(kind.prefix())
        .and_then(|r| r.strip_prefix('_'))
        .ok_or_else(mismatch)?;
    match rest.split_once('_') {
        Some((label, _)) if !label.is_empty() => Ok(label.to_string()),
        _ => Err(mismatch()),
    }
}

/// Bucket files by selection label, sorted by label
///
/// Fails when fewer than two files are given or when any file breaks the
/// naming convention.
pub fn group_by_selection(kind: OutputKind, files: Vec<RemoteFile>) -> Result<Vec<FileGroup>> {
    if files.len() < 2 {
        return Err(CrabError::file_grouping(
            ErrorCode::GROUPING_TOO_FEW_FILES,
            format!("grouping needs at least 2 files, got {}", files.len()),
            files.first().map(|f| f.path.clone()),
        ));
    }

    let mut buckets: BTreeMap<String, Vec<RemoteFile>> = BTreeMap::new();
    for file in files {
        let label = selection_label(kind, &file.path)?;
        buckets.entry(label).or_default().push(file);
    }

    Ok(buckets
        .into_iter()
        .map(|(label, files)| FileGroup { label, files })
        .collect())
}

/// The whole set as one group labelled `all`
pub fn single_group(files: Vec<RemoteFile>) -> FileGroup {
    FileGroup {
        label: "all".to_string(),
        files,
    }
}
