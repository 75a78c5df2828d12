use std::path::PathBuf;
use std::time::Duration;

/// Errors from registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The persisted document exists but cannot be read as a registry.
    #[error("corrupt registry document {location}: {reason}")]
    Corrupt { location: String, reason: String },

    /// Serialization of the in-memory map failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another process holds the registry lock.
    #[error("registry lock {path} is held by another process (waited {waited:?})")]
    Locked { path: PathBuf, waited: Duration },

    /// The logical name violates the naming rules.
    #[error(transparent)]
    InvalidName(#[from] sarc_types::TypeError),

    /// The requested entry does not exist.
    #[error("no registry entry named {0:?}")]
    NotFound(String),
}

impl RegistryError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
