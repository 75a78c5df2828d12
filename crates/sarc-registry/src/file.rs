use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sarc_types::RegistryEntry;
use tracing::debug;

use crate::backend::RegistryBackend;
use crate::document;
use crate::error::{RegistryError, RegistryResult};

/// Registry backend persisting the document as a JSON file.
///
/// Writes follow write-to-temp-then-rename: the new document is written to a
/// temporary file in the same directory, flushed and synced, then renamed
/// over the old one.
#[derive(Clone, Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Backend for the document at `path`. Nothing is touched until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the registry document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl RegistryBackend for JsonFileBackend {
    fn load(&self) -> RegistryResult<BTreeMap<String, RegistryEntry>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no registry document yet");
                return Ok(BTreeMap::new());
            }
            Err(e) => {
                return Err(RegistryError::Corrupt {
                    location: self.location(),
                    reason: format!("unreadable: {e}"),
                })
            }
        };
        let entries = document::decode(&self.location(), &bytes)?;
        debug!(path = %self.path.display(), entries = entries.len(), "registry loaded");
        Ok(entries)
    }

    fn store(&self, entries: &BTreeMap<String, RegistryEntry>) -> RegistryResult<()> {
        let bytes = document::encode(entries)?;
        let parent = self.parent_dir();
        fs::create_dir_all(parent).map_err(|e| RegistryError::io(parent, e))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".registry-")
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(|e| RegistryError::io(parent, e))?;
        if let Err(e) = write_synced(tmp.as_file_mut(), &bytes) {
            return Err(RegistryError::io(tmp.path(), e));
        }
        tmp.persist(&self.path)
            .map_err(|e| RegistryError::io(&self.path, e.error))?;

        sync_dir(parent);
        debug!(path = %self.path.display(), entries = entries.len(), "registry persisted");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

fn write_synced(file: &mut fs::File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_all()
}

/// Best-effort fsync of a directory so the rename itself is durable.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = fs::File::open(dir) {
        if let Err(e) = handle.sync_all() {
            debug!(dir = %dir.display(), error = %e, "directory sync failed");
        }
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use sarc_types::CompressionMethod;

    fn sample() -> BTreeMap<String, RegistryEntry> {
        let mut entries = BTreeMap::new();
        entries.insert("docs".to_string(), RegistryEntry::directory(CompressionMethod::Gz));
        entries.insert("notes".to_string(), RegistryEntry::file("md", CompressionMethod::Zstd));
        entries
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("registry.json"));
        assert!(backend.load().unwrap().is_empty());
    }

    #[test]
    fn store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("registry.json"));
        backend.store(&sample()).unwrap();
        assert_eq!(backend.load().unwrap(), sample());
    }

    #[test]
    fn store_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("registry.json"));
        backend.store(&sample()).unwrap();
        backend.store(&BTreeMap::new()).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["registry.json".to_string()]);
    }

    #[test]
    fn corrupt_file_is_not_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, b"{\"docs\": {").unwrap();
        let backend = JsonFileBackend::new(&path);
        assert!(matches!(backend.load(), Err(RegistryError::Corrupt { .. })));
    }

    #[test]
    fn zero_length_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, b"").unwrap();
        let backend = JsonFileBackend::new(&path);
        assert!(matches!(backend.load(), Err(RegistryError::Corrupt { .. })));
    }

    #[test]
    fn document_is_readable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        JsonFileBackend::new(&path).store(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["docs"]["is_dir"], serde_json::Value::Bool(true));
        assert_eq!(value["notes"]["method"], serde_json::Value::String("zst".into()));
    }
}
