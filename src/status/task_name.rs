use crate::error::{CrabError, ErrorCode, Result};
use crate::generators::dataset::NLAYERS_DATASET_TYPE;
use crate::params::ParameterMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::Path;

static TASK_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^crab_(?P<selection>.*)_(?P<year>\d{4})(?P<era>[A-Z])_?(?:v(?P<version>\d))?_(?P<dataset>NLayers\d?|EGamma\d|Muon\d)",
    )
    .unwrap()
});

/// Fields encoded in a grid task directory name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskName {
    pub selection: String,
    pub year: String,
    pub era: String,
    pub era_version: Option<String>,
    /// Dataset label as written, e.g. `Muon0`
    pub dataset: String,
    pub dataset_type: String,
    pub dataset_version: Option<String>,
}

impl TaskName {
    pub fn is_nlayers(&self) -> bool {
        self.dataset_type == NLAYERS_DATASET_TYPE
    }

    /// Selections joined with `_` in the request name
    pub fn selections(&self) -> Vec<String> {
        self.selection.split('_').map(str::to_string).collect()
    }

    /// Batch-entry parameters that would have produced this task
    pub fn to_parameters(&self) -> ParameterMap {
        let selections = self.selections();
        let mut params = ParameterMap::new()
            .with("YEAR", self.year.as_str())
            .with("ERA", self.era.as_str())
            .with("NLAYERS", self.is_nlayers());
        if selections.len() == 1 {
            params.insert("SELECTION", self.selection.as_str());
        } else {
            params.insert("SELECTION", selections);
        }
        if let Some(version) = &self.era_version {
            params.insert("ERA_VERSION", version.as_str());
        }
        if let Some(version) = &self.dataset_version {
            params.insert("DATASET_VERSION", version.as_str());
        }
        params
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "crab_{}_{}{}", self.selection, self.year, self.era)?;
        if let Some(version) = &self.era_version {
            write!(f, "_v{version}")?;
        }
        write!(f, "_{}", self.dataset)
    }
}

/// Parse `crab_{selection}_{YYYY}{E}[_vN]_{dataset}`
///
/// Accepts a full task directory path; only the last component is used.
pub fn parse_task_name(task: &str) -> Result<TaskName> {
    let name = Path::new(task)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| task.to_string());

    let caps = TASK_NAME.captures(&name).ok_or_else(|| {
        CrabError::parse_with_code(
            ErrorCode::PARSE_TASK_NAME,
            format!("unable to parse task name '{name}'"),
        )
    })?;

    let dataset = caps["dataset"].to_string();
    let split = dataset
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(dataset.len());
    let (dataset_type, dataset_version) = dataset.split_at(split);

    Ok(TaskName {
        selection: caps["selection"].to_string(),
        year: caps["year"].to_string(),
        era: caps["era"].to_string(),
        era_version: caps.name("version").map(|m| m.as_str().to_string()),
        dataset_type: dataset_type.to_string(),
        dataset_version: (!dataset_version.is_empty()).then(|| dataset_version.to_string()),
        dataset,
    })
}
