use std::path::PathBuf;

use sarc_types::CompressionMethod;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{method} compression failed: {source}")]
    CompressionFailed {
        method: CompressionMethod,
        #[source]
        source: std::io::Error,
    },

    #[error("{method} decompression failed: {source}")]
    DecompressionFailed {
        method: CompressionMethod,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CodecError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type CodecResult<T> = Result<T, CodecError>;
