use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unsupported compression method: {0:?} (expected one of gz, xz, zst)")]
    UnsupportedMethod(String),

    #[error("invalid logical name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },
}
