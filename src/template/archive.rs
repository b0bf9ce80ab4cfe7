use crate::error::{CrabError, Result};
use chrono::Local;
use std::path::{Path, PathBuf};

/// One timestamped archive directory per submission run
#[derive(Debug, Clone)]
pub struct ArchiveRun {
    dir: PathBuf,
}

impl ArchiveRun {
    /// Create `{root}/{YYYYmmdd_HHMMSS}`, adding `_{n}` when that name is
    /// already taken
    pub fn create(root: &Path) -> Result<Self> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        Self::create_with_stamp(root, &stamp)
    }

    pub fn create_with_stamp(root: &Path, stamp: &str) -> Result<Self> {
        std::fs::create_dir_all(root).map_err(|e| {
            CrabError::io("cannot create archive root", Some(root.to_path_buf())).with_source(e)
        })?;

        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                stamp.to_string()
            } else {
                format!("{stamp}_{attempt}")
            };
            let candidate = root.join(name);
            match std::fs::create_dir(&candidate) {
                Ok(()) => {
                    tracing::debug!("Archiving rendered templates in {}", candidate.display());
                    return Ok(Self { dir: candidate });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => {
                    return Err(CrabError::io("cannot create archive directory", Some(candidate))
                        .with_source(e))
                }
            }
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Archive path for one rendered template, never one already written
    /// in this run; repeats get `_{n}` before the extension
    pub fn path_for(&self, template: &Path, request_name: Option<&str>) -> PathBuf {
        let name = archive_file_name(template, request_name);
        let candidate = self.dir.join(&name);
        if !candidate.exists() {
            return candidate;
        }

        let base = Path::new(&name);
        let stem = base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = base
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        (1u32..)
            .map(|n| self.dir.join(format!("{stem}_{n}{ext}")))
            .find(|path| !path.exists())
            .unwrap_or(candidate)
    }
}

/// `{template_stem}_{request_name}{ext}`
pub fn archive_file_name(template: &Path, request_name: Option<&str>) -> String {
    let stem = template
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "template".to_string());
    let ext = template
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!("{stem}_{}{ext}", request_name.unwrap_or("unnamed_request"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_archive_file_name() {
        assert_eq!(
            archive_file_name(Path::new("templates/crab_template.py"), Some("A_2023C_v1_Muon0")),
            "crab_template_A_2023C_v1_Muon0.py"
        );
        assert_eq!(
            archive_file_name(Path::new("Makefile"), None),
            "Makefile_unnamed_request"
        );
    }

    #[test]
    fn test_same_stamp_gets_distinct_directories() {
        let root = TempDir::new().unwrap();
        let first = ArchiveRun::create_with_stamp(root.path(), "20260101_120000").unwrap();
        let second = ArchiveRun::create_with_stamp(root.path(), "20260101_120000").unwrap();
        let third = ArchiveRun::create_with_stamp(root.path(), "20260101_120000").unwrap();

        assert!(first.dir().ends_with("20260101_120000"));
        assert!(second.dir().ends_with("20260101_120000_1"));
        assert!(third.dir().ends_with("20260101_120000_2"));
    }

    #[test]
    fn test_path_for() {
        let root = TempDir::new().unwrap();
        let run = ArchiveRun::create(root.path()).unwrap();
        let path = run.path_for(Path::new("config_cfg.py"), Some("R"));
        assert_eq!(path.parent(), Some(run.dir()));
        assert_eq!(path.file_name().unwrap(), "config_cfg_R.py");
    }

    #[test]
    fn test_repeated_request_name_keeps_every_copy() {
        let root = TempDir::new().unwrap();
        let run = ArchiveRun::create_with_stamp(root.path(), "20260101_120000").unwrap();
        let template = Path::new("templates/crab_template.py");

        let mut written = Vec::new();
        for body in ["first", "second", "third"] {
            let path = run.path_for(template, None);
            std::fs::write(&path, body).unwrap();
            written.push(path);
        }

        let names: Vec<_> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "crab_template_unnamed_request.py",
                "crab_template_unnamed_request_1.py",
                "crab_template_unnamed_request_2.py",
            ]
        );
        assert_eq!(std::fs::read_to_string(&written[0]).unwrap(), "first");
    }
}
