//! Process-wide settings taken from the global command-line flags

use anyhow::{Context, Result};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Count of `-v` flags
    pub verbose: u8,
    /// Directory live templates are rendered into and grid commands run from
    pub run_dir: PathBuf,
    /// Second log destination, written without colours
    pub log_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn new(verbose: u8) -> Result<Self> {
        let run_dir = std::env::current_dir().context("Failed to get current directory")?;

        Ok(Self {
            verbose,
            run_dir,
            log_file: None,
        })
    }

    /// Relative directories are taken from the current directory
    pub fn with_run_dir(mut self, dir: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = dir {
            self.run_dir = std::path::absolute(&dir)
                .with_context(|| format!("Invalid run directory {}", dir.display()))?;
        }
        Ok(self)
    }

    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }

    /// Filter directive for the verbosity level
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            2 => "trace",
            _ => "trace,hyper=debug,reqwest=debug",
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            verbose: 0,
            run_dir: PathBuf::from("."),
            log_file: None,
        }
    }
}
