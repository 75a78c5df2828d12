use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("no key material for handle {handle}")]
    KeyNotFound { handle: String },

    #[error("key file {path} is unusable: {reason}")]
    InvalidKey { path: PathBuf, reason: String },

    #[error("not a sarc ciphertext: {0}")]
    InvalidHeader(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CryptoError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` when decryption could not find or validate key material.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::KeyNotFound { .. }
                | Self::InvalidKey { .. }
                | Self::InvalidHeader(_)
                | Self::AuthenticationFailed(_)
        )
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
