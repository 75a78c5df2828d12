use std::path::PathBuf;

use sarc_codec::CodecError;
use sarc_crypto::CryptoError;
use sarc_pack::PackError;
use sarc_registry::RegistryError;
use sarc_types::TypeError;
use thiserror::Error;

use crate::stage::Stage;

/// The closed set of failure classes an operator can act on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    UnsupportedMethod,
    AuthenticationFailure,
    PathTraversal,
    CorruptRegistry,
    InvalidName,
    Locked,
    Config,
    Io,
}

/// Underlying cause of a failed stage.
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Pack(#[from] PackError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("{} does not exist", .0.display())]
    Missing(PathBuf),

    #[error("{} already exists", .0.display())]
    OutputExists(PathBuf),

    #[error("name {0:?} is already taken")]
    NameTaken(String),

    #[error("{} is not in a recognised compressed format", .0.display())]
    UnknownFormat(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StageFailure {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors from pipeline operations.
///
/// Every stage failure names the stage and the object it was working on.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} {object:?} failed: {source}")]
    Stage {
        stage: Stage,
        object: String,
        #[source]
        source: StageFailure,
    },

    #[error("no vault entry named {0:?}")]
    UnknownEntry(String),

    #[error("invalid configuration {path}: {reason}")]
    Config { path: PathBuf, reason: String },
}

impl PipelineError {
    /// The stage that failed, if the error came from one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The object being processed when the error occurred.
    pub fn object(&self) -> Option<&str> {
        match self {
            Self::Stage { object, .. } => Some(object),
            Self::UnknownEntry(name) => Some(name),
            Self::Config { .. } => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        let source = match self {
            Self::UnknownEntry(_) => return ErrorKind::NotFound,
            Self::Config { .. } => return ErrorKind::Config,
            Self::Stage { source, .. } => source,
        };
        match source {
            StageFailure::Registry(RegistryError::Corrupt { .. }) => ErrorKind::CorruptRegistry,
            StageFailure::Registry(RegistryError::Locked { .. }) => ErrorKind::Locked,
            StageFailure::Registry(RegistryError::InvalidName(_)) => ErrorKind::InvalidName,
            StageFailure::Registry(RegistryError::NotFound(_)) => ErrorKind::NotFound,
            StageFailure::Registry(_) => ErrorKind::Io,
            StageFailure::Crypto(e) if e.is_authentication_failure() => {
                ErrorKind::AuthenticationFailure
            }
            StageFailure::Pack(PackError::PathTraversal { .. }) => ErrorKind::PathTraversal,
            StageFailure::Type(TypeError::UnsupportedMethod(_)) => ErrorKind::UnsupportedMethod,
            StageFailure::Type(TypeError::InvalidName { .. }) => ErrorKind::InvalidName,
            StageFailure::NameTaken(_) => ErrorKind::InvalidName,
            StageFailure::UnknownFormat(_) => ErrorKind::UnsupportedMethod,
            StageFailure::Missing(_) => ErrorKind::NotFound,
            StageFailure::Crypto(_)
            | StageFailure::Codec(_)
            | StageFailure::Pack(_)
            | StageFailure::OutputExists(_)
            | StageFailure::Io { .. } => ErrorKind::Io,
        }
    }
}

/// Attach a stage and object to a lower-level failure.
pub(crate) trait AtStage<T> {
    fn at(self, stage: Stage, object: &str) -> PipelineResult<T>;
}

impl<T, E: Into<StageFailure>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage, object: &str) -> PipelineResult<T> {
        self.map_err(|e| PipelineError::Stage {
            stage,
            object: object.to_string(),
            source: e.into(),
        })
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
