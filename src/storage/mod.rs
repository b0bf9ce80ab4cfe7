//! Remote storage client wrapper
//!
//! Drives the storage command-line client (`eos <endpoint> ...`) and the
//! copy tool (`xrdcp`) through the subprocess layer. Remote paths are plain
//! `/store/...` strings and are never touched through the local filesystem.

use crate::config::StorageConfig;
use crate::error::Result;
use crate::subprocess::{ProcessCommandBuilder, SubprocessManager, ToolOutput};
use std::path::Path;

/// A file found on remote storage
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RemoteFile {
    /// Storage path, e.g. `/store/group/.../hist_1.root`
    pub path: String,
    /// Full access URL, e.g. `root://host//store/group/.../hist_1.root`
    pub url: String,
}

impl RemoteFile {
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[derive(Clone)]
pub struct RemoteStorage {
    subprocess: SubprocessManager,
    config: StorageConfig,
}

impl RemoteStorage {
    pub fn new(subprocess: SubprocessManager, config: StorageConfig) -> Self {
        Self { subprocess, config }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Full access URL for a storage path
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn storage_command(&self) -> ProcessCommandBuilder {
        ProcessCommandBuilder::new(&self.config.program).arg(&self.config.endpoint)
    }

    /// Files under `dir` whose name matches `name_pattern`, at most
    /// `storage.max_depth` levels deep
    pub async fn find(&self, dir: &str, name_pattern: &str) -> Result<Vec<RemoteFile>> {
        let command = self
            .storage_command()
            .args(["find", "--xurl"])
            .arg("--maxdepth")
            .arg(self.config.max_depth.to_string())
            .arg("--name")
            .arg(name_pattern)
            .arg(dir)
            .build();

        let output = self
            .subprocess
            .run_checked(command, "Failed to find task output files")
            .await?;

        let mut files: Vec<RemoteFile> = output
            .stdout
            .lines()
            .filter_map(|line| self.parse_listing_line(line))
            .collect();
        files.sort();
        tracing::debug!("Found {} files matching {} under {}", files.len(), name_pattern, dir);
        Ok(files)
    }

    /// Accepts `root://host//store/...`, `path=/store/...` or a bare path
    fn parse_listing_line(&self, line: &str) -> Option<RemoteFile> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let line = line.strip_prefix("path=").unwrap_or(line);

        if let Some(rest) = line.strip_prefix("root://") {
            let path_start = rest.find("//")?;
            let path = rest[path_start + 1..].to_string();
            return Some(RemoteFile {
                path,
                url: line.to_string(),
            });
        }

        Some(RemoteFile {
            path: line.to_string(),
            url: self.url(line),
        })
    }

    async fn stat(&self, flag: &str, path: &str) -> Result<bool> {
        let command = self.storage_command().args(["stat", flag, path]).build();
        let output = self.subprocess.run_tool(command).await?;
        Ok(output.success())
    }

    pub async fn is_file(&self, path: &str) -> Result<bool> {
        self.stat("-f", path).await
    }

    pub async fn is_dir(&self, path: &str) -> Result<bool> {
        self.stat("-d", path).await
    }

    /// Entry names directly inside `dir`
    pub async fn list(&self, dir: &str) -> Result<Vec<String>> {
        let command = self.storage_command().args(["ls", dir]).build();
        let output = self
            .subprocess
            .run_checked(command, "Failed to list remote directory")
            .await?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn remove(&self, path: &str) -> Result<()> {
        let command = self.storage_command().args(["rm", path]).build();
        self.subprocess
            .run_checked(command, "Failed to remove remote file")
            .await
            .map(|_| ())
    }

    pub async fn remove_dir(&self, path: &str) -> Result<()> {
        let command = self.storage_command().args(["rm", "-r", path]).build();
        self.subprocess
            .run_checked(command, "Failed to remove remote directory")
            .await
            .map(|_| ())
    }

    /// Copy a local file to `remote_path` on this endpoint
    pub async fn copy_to(&self, local: &Path, remote_path: &str) -> Result<ToolOutput> {
        let command = ProcessCommandBuilder::new(&self.config.copy_program)
            .arg(local.display().to_string())
            .arg(self.url(remote_path))
            .build();
        let output = self
            .subprocess
            .run_checked(command, "Unable to copy file to remote storage")
            .await?;
        tracing::info!("Copied {} to {}", local.display(), remote_path);
        Ok(output)
    }
}

/// Join a remote directory and an entry name without doubling slashes
pub fn join_remote(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name.trim_start_matches('/'))
}
