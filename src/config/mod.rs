//! Configuration for crab-pilot
//!
//! A single [`PilotConfig`] is built once at startup (file, then environment
//! overrides) and handed to every component. Nothing below this module reads
//! environment variables.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod batch;
pub mod catalog;
pub mod loader;

pub use batch::{load_batch_description, parse_batch_description, BatchDescription};
pub use catalog::DatasetCatalog;
pub use loader::{ConfigLoader, CONFIG_FILE_NAME};

/// Directory for generated data when no explicit location is configured
pub fn default_data_dir() -> PathBuf {
    ProjectDirs::from("ch", "cern", "crab-pilot")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".crab-pilot"))
}

/// Directory for status summaries when no explicit location is configured
pub fn default_cache_dir() -> PathBuf {
    ProjectDirs::from("ch", "cern", "crab-pilot")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".crab-pilot").join("cache"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PilotConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub grid: GridConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub merge: MergeConfig,

    #[serde(default)]
    pub sheets: SheetsConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    /// Generator names in application order
    #[serde(default = "default_generators")]
    pub generators: Vec<String>,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            grid: GridConfig::default(),
            storage: StorageConfig::default(),
            merge: MergeConfig::default(),
            sheets: SheetsConfig::default(),
            notify: NotifyConfig::default(),
            pool: PoolConfig::default(),
            generators: default_generators(),
        }
    }
}

fn default_generators() -> Vec<String> {
    ["dataset", "request_name", "lumi_mask", "skim_files"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Local file locations
///
/// Relative paths are resolved against `root` (the directory holding the
/// configuration file, or the working directory).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default)]
    pub root: Option<PathBuf>,

    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,

    #[serde(default = "default_template_manifest")]
    pub template_manifest: PathBuf,

    #[serde(default = "default_datasets_file")]
    pub datasets_file: PathBuf,

    #[serde(default = "default_selections_file")]
    pub selections_file: PathBuf,

    /// Root of the timestamped archival copies of rendered templates
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Where skim-file manifests for layer-count tasks are written
    #[serde(default = "default_manifest_dir")]
    pub manifest_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: None,
            template_dir: default_template_dir(),
            template_manifest: default_template_manifest(),
            datasets_file: default_datasets_file(),
            selections_file: default_selections_file(),
            archive_dir: default_archive_dir(),
            cache_dir: default_cache_dir(),
            manifest_dir: default_manifest_dir(),
        }
    }
}

impl PathsConfig {
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_template_manifest() -> PathBuf {
    PathBuf::from("configs/templates.yml")
}

fn default_datasets_file() -> PathBuf {
    PathBuf::from("configs/datasets.toml")
}

fn default_selections_file() -> PathBuf {
    PathBuf::from("configs/selections.toml")
}

fn default_archive_dir() -> PathBuf {
    default_data_dir().join("generated")
}

fn default_manifest_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_grid_program")]
    pub program: String,

    /// Substrings of submit output that confirm the task was accepted
    #[serde(default = "default_success_markers")]
    pub success_markers: Vec<String>,

    /// Pattern locating the task output directory in `getoutput --dump` output
    #[serde(default = "default_output_dir_pattern")]
    pub output_dir_pattern: String,

    #[serde(default)]
    pub default_max_memory: Option<u32>,

    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            program: default_grid_program(),
            success_markers: default_success_markers(),
            output_dir_pattern: default_output_dir_pattern(),
            default_max_memory: None,
            timeout: None,
        }
    }
}

fn default_grid_program() -> String {
    "crab".to_string()
}

fn default_success_markers() -> Vec<String> {
    vec![
        "Success:".to_string(),
        "Task submitted successfully".to_string(),
    ]
}

fn default_output_dir_pattern() -> String {
    r"/store/group/lpclonglived/DisappTrks/[^/]+/[^/]+/".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_program")]
    pub program: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_copy_program")]
    pub copy_program: String,

    /// Depth bound for output discovery
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            program: default_storage_program(),
            endpoint: default_endpoint(),
            copy_program: default_copy_program(),
            max_depth: default_max_depth(),
        }
    }
}

fn default_storage_program() -> String {
    "eos".to_string()
}

fn default_endpoint() -> String {
    "root://cmseos.fnal.gov".to_string()
}

fn default_copy_program() -> String {
    "xrdcp".to_string()
}

fn default_max_depth() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default = "default_hist_program")]
    pub hist_program: String,

    #[serde(default = "default_hist_jobs")]
    pub hist_jobs: u32,

    #[serde(default = "default_skim_program")]
    pub skim_program: String,

    /// Local directory for merged outputs before copy-back
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Remote directory receiving merged files
    #[serde(default)]
    pub archive_destination: Option<String>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            hist_program: default_hist_program(),
            hist_jobs: default_hist_jobs(),
            skim_program: default_skim_program(),
            scratch_dir: default_scratch_dir(),
            archive_destination: None,
        }
    }
}

fn default_hist_program() -> String {
    "hadd".to_string()
}

fn default_hist_jobs() -> u32 {
    8
}

fn default_skim_program() -> String {
    "edmCopyPickMerge".to_string()
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,

    /// OAuth bearer token for the Sheets API
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Fixed wait before the single retry after a rate-limit response
    #[serde(default = "default_rate_limit_backoff", with = "humantime_serde")]
    pub rate_limit_backoff: Duration,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            access_token: None,
            api_base: default_api_base(),
            rate_limit_backoff: default_rate_limit_backoff(),
        }
    }
}

fn default_api_base() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}

fn default_rate_limit_backoff() -> Duration {
    Duration::from_secs(60)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub ntfy_url: Option<String>,

    #[serde(default)]
    pub email_to: Option<String>,

    #[serde(default = "default_email_from")]
    pub email_from: String,

    #[serde(default = "default_sendmail_program")]
    pub sendmail_program: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            ntfy_url: None,
            email_to: None,
            email_from: default_email_from(),
            sendmail_program: default_sendmail_program(),
        }
    }
}

fn default_email_from() -> String {
    "crab.pilot@localhost".to_string()
}

fn default_sendmail_program() -> String {
    "sendmail".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Upper bound on concurrently processed tasks or file groups
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
        }
    }
}

fn default_max_parallel() -> usize {
    4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_valid() {
        let config: PilotConfig = toml::from_str("").unwrap();
        assert_eq!(config.grid.program, "crab");
        assert_eq!(config.storage.endpoint, "root://cmseos.fnal.gov");
        assert_eq!(config.merge.hist_jobs, 8);
        assert_eq!(config.pool.max_parallel, 4);
        assert_eq!(config.sheets.rate_limit_backoff, Duration::from_secs(60));
        assert_eq!(
            config.generators,
            vec!["dataset", "request_name", "lumi_mask", "skim_files"]
        );
    }

    #[test]
    fn test_partial_sections() {
        let config: PilotConfig = toml::from_str(
            r#"
generators = ["dataset", "request_name"]

[grid]
program = "/opt/crab/bin/crab"
timeout = "10m"

[sheets]
rate_limit_backoff = "5s"

[pool]
max_parallel = 12
"#,
        )
        .unwrap();

        assert_eq!(config.grid.program, "/opt/crab/bin/crab");
        assert_eq!(config.grid.timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.grid.success_markers.len(), 2);
        assert_eq!(config.sheets.rate_limit_backoff, Duration::from_secs(5));
        assert_eq!(config.pool.max_parallel, 12);
        assert_eq!(config.generators.len(), 2);
    }

    #[test]
    fn test_paths_resolve_against_root() {
        let paths = PathsConfig {
            root: Some(PathBuf::from("/analysis")),
            ..PathsConfig::default()
        };
        assert_eq!(
            paths.resolve(Path::new("configs/datasets.toml")),
            PathBuf::from("/analysis/configs/datasets.toml")
        );
        assert_eq!(
            paths.resolve(Path::new("/abs/file")),
            PathBuf::from("/abs/file")
        );
    }
}
