use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sarc_registry::validate_logical_name;

use crate::error::{AtStage, PipelineResult, StageFailure};
use crate::stage::Stage;

/// An ingest source and the name it will be vaulted under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceInfo {
    pub path: PathBuf,
    /// Logical name requested for the entry, before collision resolution.
    pub logical_name: String,
    /// Extension restored on egress, without the dot.
    pub ext: String,
    pub is_dir: bool,
}

impl SourceInfo {
    /// Inspect `path` and derive its logical name and extension.
    ///
    /// `name` overrides the derived logical name but not the extension.
    pub fn inspect(path: &Path, name: Option<&str>) -> PipelineResult<Self> {
        let label = path.display().to_string();
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StageFailure::Missing(path.to_path_buf())).at(Stage::Resolving, &label)
            }
            Err(e) => return Err(StageFailure::io(path, e)).at(Stage::Resolving, &label),
        };
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        let is_dir = meta.is_dir();
        let (stem, ext) = if is_dir {
            (file_name, "")
        } else {
            split_extension(file_name)
        };
        let logical_name = name.unwrap_or(stem).to_string();
        validate_logical_name(&logical_name).at(Stage::Resolving, &label)?;

        Ok(Self {
            path: path.to_path_buf(),
            logical_name,
            ext: ext.to_string(),
            is_dir,
        })
    }
}

/// Split a file name at its last `.` into stem and extension.
///
/// There is no extension when the dot is leading or trailing.
///
/// ```
/// use sarc_pipeline::split_extension;
///
/// assert_eq!(split_extension("notes.tar.gz"), ("notes.tar", "gz"));
/// assert_eq!(split_extension("README"), ("README", ""));
/// assert_eq!(split_extension(".bashrc"), (".bashrc", ""));
/// ```
pub fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, ext),
        _ => (file_name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn file_splits_at_last_dot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.final.pdf");
        fs::write(&path, b"%PDF").unwrap();
        let info = SourceInfo::inspect(&path, None).unwrap();
        assert_eq!(info.logical_name, "report.final");
        assert_eq!(info.ext, "pdf");
        assert!(!info.is_dir);
    }

    #[test]
    fn directory_keeps_whole_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photos.2024");
        fs::create_dir(&path).unwrap();
        let info = SourceInfo::inspect(&path, None).unwrap();
        assert_eq!(info.logical_name, "photos.2024");
        assert_eq!(info.ext, "");
        assert!(info.is_dir);
    }

    #[test]
    fn override_replaces_name_not_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        fs::write(&path, b"png").unwrap();
        let info = SourceInfo::inspect(&path, Some("passport")).unwrap();
        assert_eq!(info.logical_name, "passport");
        assert_eq!(info.ext, "png");
    }

    #[test]
    fn dotfile_needs_an_explicit_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, b"KEY=1").unwrap();
        let err = SourceInfo::inspect(&path, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidName);
        assert!(SourceInfo::inspect(&path, Some("env")).is_ok());
    }

    #[test]
    fn missing_source_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = SourceInfo::inspect(&dir.path().join("ghost.txt"), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.stage(), Some(Stage::Resolving));
    }

    #[test]
    fn trailing_dot_is_not_an_extension() {
        assert_eq!(split_extension("notes."), ("notes.", ""));
    }
}
