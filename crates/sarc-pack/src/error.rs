use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("container entry {entry:?} escapes the destination root")]
    PathTraversal { entry: String },

    #[error("container entry {entry:?} has unsupported type {kind}")]
    UnsupportedEntry { entry: String, kind: String },

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("destination {0} already exists")]
    DestinationExists(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PackError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type PackResult<T> = Result<T, PackError>;
