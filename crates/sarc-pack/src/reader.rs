use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};

use tar::{Archive, EntryType};
use tracing::debug;

use crate::error::{PackError, PackResult};

/// Prefix of the staging directory created next to the destination.
pub const STAGING_PREFIX: &str = ".sarc-unpack-";

/// Unpack `container` into a new directory at `destination`.
///
/// Every entry is validated with [`contained_path`] and extracted into a
/// staging directory beside `destination`. Only after the whole container
/// has been extracted is the staging directory renamed to `destination`. On
/// any failure the staging directory is removed and `destination` is never
/// created.
///
/// Only regular files and directories are accepted.
pub fn unpack(container: &Path, destination: &Path) -> PackResult<PathBuf> {
    if destination.symlink_metadata().is_ok() {
        return Err(PackError::DestinationExists(destination.to_path_buf()));
    }
    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| PackError::io(parent, e))?;

    let input = File::open(container).map_err(|e| PackError::io(container, e))?;
    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(parent)
        .map_err(|e| PackError::io(parent, e))?;

    let extracted = extract_all(container, BufReader::new(input), staging.path())?;

    if destination.symlink_metadata().is_ok() {
        return Err(PackError::DestinationExists(destination.to_path_buf()));
    }
    fs::rename(staging.path(), destination).map_err(|e| PackError::io(destination, e))?;
    debug!(
        container = %container.display(),
        destination = %destination.display(),
        entries = extracted,
        "unpacked"
    );
    Ok(destination.to_path_buf())
}

fn extract_all<R: io::Read>(container: &Path, input: R, root: &Path) -> PackResult<u64> {
    let mut archive = Archive::new(input);
    let mut extracted = 0;
    for entry in archive.entries().map_err(|e| PackError::io(container, e))? {
        let mut entry = entry.map_err(|e| PackError::io(container, e))?;
        let raw = entry
            .path()
            .map_err(|e| PackError::io(container, e))?
            .into_owned();
        let rel = contained_path(&raw)?;
        let kind = entry.header().entry_type();

        if kind == EntryType::XGlobalHeader {
            continue;
        }
        if rel.as_os_str().is_empty() {
            if kind.is_dir() {
                continue;
            }
            return Err(PackError::PathTraversal {
                entry: raw.display().to_string(),
            });
        }

        let target = root.join(&rel);
        match kind {
            EntryType::Directory => {
                fs::create_dir_all(&target).map_err(|e| PackError::io(&target, e))?;
            }
            EntryType::Regular => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| PackError::io(parent, e))?;
                }
                let mut out = File::create(&target).map_err(|e| PackError::io(&target, e))?;
                io::copy(&mut entry, &mut out).map_err(|e| PackError::io(&target, e))?;
                restore_mode(&target, entry.header().mode().unwrap_or(0o644))?;
            }
            other => {
                return Err(PackError::UnsupportedEntry {
                    entry: raw.display().to_string(),
                    kind: format!("{other:?}"),
                })
            }
        }
        extracted += 1;
    }
    Ok(extracted)
}

/// Validate a container entry name as a path strictly inside the root.
///
/// `.` segments are dropped. Any `..`, root, or drive-prefix segment fails
/// with [`PackError::PathTraversal`], even when the path would lexically
/// land back inside the root.
///
/// ```
/// use sarc_pack::contained_path;
/// use std::path::Path;
///
/// assert_eq!(contained_path(Path::new("./a/b.txt")).unwrap(), Path::new("a/b.txt"));
/// assert!(contained_path(Path::new("a/../../etc/passwd")).is_err());
/// assert!(contained_path(Path::new("/etc/passwd")).is_err());
/// ```
pub fn contained_path(raw: &Path) -> PackResult<PathBuf> {
    let mut out = PathBuf::new();
    for component in raw.components() {
        match component {
            Component::Normal(segment) => out.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(PackError::PathTraversal {
                    entry: raw.display().to_string(),
                })
            }
        }
    }
    Ok(out)
}

#[cfg(unix)]
fn restore_mode(path: &Path, mode: u32) -> PackResult<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if mode & 0o111 != 0 { 0o755 } else { 0o644 };
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| PackError::io(path, e))
}

#[cfg(not(unix))]
fn restore_mode(_path: &Path, _mode: u32) -> PackResult<()> {
    Ok(())
}
