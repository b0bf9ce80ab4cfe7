use super::PilotConfig;
use crate::error::{CrabError, ErrorCode, Result};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "crab-pilot.toml";

pub const ENV_SHEET_ID: &str = "CRAB_PILOT_SHEET_ID";
pub const ENV_SHEETS_TOKEN: &str = "CRAB_PILOT_SHEETS_TOKEN";
pub const ENV_EMAIL: &str = "CRAB_PILOT_EMAIL";
pub const ENV_NTFY_URL: &str = "CRAB_PILOT_NTFY_URL";
pub const ENV_MAX_PARALLEL: &str = "CRAB_PILOT_MAX_PARALLEL";

/// Builds the [`PilotConfig`] for one invocation
///
/// Lookup order: an explicit file (which must exist), then
/// `crab-pilot.toml` in the search directory, then built-in defaults.
/// Environment overrides are applied last.
pub struct ConfigLoader {
    explicit: Option<PathBuf>,
    search_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            explicit: None,
            search_dir: PathBuf::from("."),
        }
    }

    pub fn with_file(mut self, path: Option<PathBuf>) -> Self {
        self.explicit = path;
        self
    }

    pub fn search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dir = dir.into();
        self
    }

    pub fn load(&self) -> Result<PilotConfig> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Load using `env` for overrides instead of the process environment
    pub fn load_with_env<F>(&self, env: F) -> Result<PilotConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match self.config_file()? {
            Some(path) => {
                tracing::debug!("Loading configuration from {}", path.display());
                let mut config = read_config_file(&path)?;
                if config.paths.root.is_none() {
                    config.paths.root = path.parent().map(Path::to_path_buf);
                }
                config
            }
            None => {
                tracing::debug!("No configuration file found, using defaults");
                PilotConfig::default()
            }
        };

        merge_env_vars(&mut config, env)?;
        validate(&config)?;
        Ok(config)
    }

    fn config_file(&self) -> Result<Option<PathBuf>> {
        if let Some(path) = &self.explicit {
            if !path.is_file() {
                return Err(CrabError::config_with_code(
                    ErrorCode::CONFIG_NOT_FOUND,
                    format!("Configuration file {} does not exist", path.display()),
                ));
            }
            return Ok(Some(path.clone()));
        }

        let candidate = self.search_dir.join(CONFIG_FILE_NAME);
        Ok(candidate.is_file().then_some(candidate))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_config_file(path: &Path) -> Result<PilotConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CrabError::from(e).with_context(format!("reading {}", path.display()))
    })?;
    toml::from_str(&content)
        .map_err(|e| CrabError::from(e).with_context(path.display()))
}

/// Apply `CRAB_PILOT_*` overrides
pub fn merge_env_vars<F>(config: &mut PilotConfig, env: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(id) = env(ENV_SHEET_ID) {
        config.sheets.spreadsheet_id = Some(id);
    }
    if let Some(token) = env(ENV_SHEETS_TOKEN) {
        config.sheets.access_token = Some(token);
    }
    if let Some(email) = env(ENV_EMAIL) {
        config.notify.email_to = Some(email);
    }
    if let Some(url) = env(ENV_NTFY_URL) {
        config.notify.ntfy_url = Some(url);
    }
    if let Some(raw) = env(ENV_MAX_PARALLEL) {
        config.pool.max_parallel = raw.trim().parse().map_err(|_| {
            CrabError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                format!("{ENV_MAX_PARALLEL} must be a positive integer, got '{raw}'"),
            )
        })?;
    }
    Ok(())
}

fn validate(config: &PilotConfig) -> Result<()> {
    if config.pool.max_parallel == 0 {
        return Err(CrabError::config_with_code(
            ErrorCode::CONFIG_INVALID_VALUE,
            "pool.max_parallel must be at least 1",
        ));
    }
    if config.generators.is_empty() {
        return Err(CrabError::config_with_code(
            ErrorCode::CONFIG_INVALID_VALUE,
            "generators list is empty",
        ));
    }
    Regex::new(&config.grid.output_dir_pattern).map_err(|e| {
        CrabError::config_with_code(
            ErrorCode::CONFIG_INVALID_VALUE,
            "grid.output_dir_pattern is not a valid regular expression",
        )
        .with_source(e)
    })?;
    Ok(())
}
