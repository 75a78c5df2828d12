use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use tar::{Builder, HeaderMode};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{PackError, PackResult};

/// What [`pack`] wrote.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PackSummary {
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
}

/// Pack the tree under `dir` into a new container file at `dest`.
///
/// Entries are stored relative to `dir` in file-name order with normalised
/// metadata, so the same tree always produces the same bytes. Symbolic links
/// are skipped.
pub fn pack(dir: &Path, dest: &Path) -> PackResult<PackSummary> {
    if !dir.is_dir() {
        return Err(PackError::NotADirectory(dir.to_path_buf()));
    }
    let file = File::create(dest).map_err(|e| PackError::io(dest, e))?;
    let mut builder = Builder::new(BufWriter::new(file));
    builder.mode(HeaderMode::Deterministic);
    builder.follow_symlinks(false);

    let mut summary = PackSummary::default();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(walk_error)?;
        let path = entry.path();
        let Ok(rel) = path.strip_prefix(dir) else {
            continue;
        };
        let file_type = entry.file_type();
        if file_type.is_dir() {
            builder
                .append_dir(rel, path)
                .map_err(|e| PackError::io(path, e))?;
            summary.directories += 1;
        } else if file_type.is_file() {
            let mut source = File::open(path).map_err(|e| PackError::io(path, e))?;
            builder
                .append_file(rel, &mut source)
                .map_err(|e| PackError::io(path, e))?;
            summary.files += 1;
            summary.bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        } else {
            warn!(path = %path.display(), "skipping non-regular entry");
        }
    }

    let writer = builder.into_inner().map_err(|e| PackError::io(dest, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| PackError::io(dest, e.into_error()))?;
    file.sync_all().map_err(|e| PackError::io(dest, e))?;
    debug!(
        dir = %dir.display(),
        files = summary.files,
        directories = summary.directories,
        bytes = summary.bytes,
        "packed"
    );
    Ok(summary)
}

fn walk_error(err: walkdir::Error) -> PackError {
    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop"));
    PackError::io(path, source)
}
