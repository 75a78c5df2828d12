use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

const RUN_PREFIX: &str = "run-";

/// Scratch directory for one pipeline run. Removed with everything in it on
/// drop, whichever way the run ends.
#[derive(Debug)]
pub struct Staging {
    dir: TempDir,
}

impl Staging {
    /// Create a fresh run directory under `root`.
    pub fn create(root: &Path) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix(RUN_PREFIX).tempdir_in(root)?;
        debug!(path = %dir.path().display(), "staging created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of an artifact inside this run directory.
    pub fn artifact(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove run directories left behind by runs that never finished.
    ///
    /// Only safe while holding the vault lock.
    pub fn sweep(root: &Path) -> usize {
        let Ok(entries) = fs::read_dir(root) else {
            return 0;
        };
        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(RUN_PREFIX) {
                continue;
            }
            match fs::remove_dir_all(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %entry.path().display(), error = %e, "stale staging not removed"),
            }
        }
        if removed > 0 {
            warn!(root = %root.display(), removed, "removed stale staging from an interrupted run");
        }
        removed
    }
}

/// Move a file, falling back to copy-then-rename across filesystems.
///
/// The fallback copies into a hidden sibling of `dst` first so `dst` never
/// holds a partial file.
pub fn move_file(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            let parent = match dst.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            let partial = tempfile::Builder::new()
                .prefix(".sarc-move-")
                .tempfile_in(parent)
                .map_err(|_| rename_err)?;
            fs::copy(src, partial.path())?;
            partial.as_file().sync_all()?;
            partial.persist(dst).map_err(|e| e.error)?;
            fs::remove_file(src)?;
            debug!(src = %src.display(), dst = %dst.display(), "moved by copy");
            Ok(())
        }
    }
}
