use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

/// A step of the ingest, egress, or open sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Opening,
    Reconciling,
    Resolving,
    Containerizing,
    Compressing,
    Encrypting,
    Registering,
    Decrypting,
    Decompressing,
    Extracting,
    Deregistering,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Reconciling => "reconciling",
            Self::Resolving => "resolving",
            Self::Containerizing => "containerizing",
            Self::Compressing => "compressing",
            Self::Encrypting => "encrypting",
            Self::Registering => "registering",
            Self::Decrypting => "decrypting",
            Self::Decompressing => "decompressing",
            Self::Extracting => "extracting",
            Self::Deregistering => "deregistering",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded result from a completed stage.
#[derive(Clone, Debug)]
pub struct StageResult {
    pub stage: Stage,
    /// Wall-clock time the stage took.
    pub elapsed: Duration,
    /// Bytes the stage produced, where that is meaningful.
    pub bytes: Option<u64>,
}

/// Times one stage and turns into a [`StageResult`].
pub(crate) struct StageTimer {
    stage: Stage,
    object: String,
    start: Instant,
}

impl StageTimer {
    pub(crate) fn start(stage: Stage, object: &str) -> Self {
        debug!(%stage, object, "stage started");
        Self {
            stage,
            object: object.to_string(),
            start: Instant::now(),
        }
    }

    pub(crate) fn finish(self, bytes: Option<u64>) -> StageResult {
        let elapsed = self.start.elapsed();
        debug!(stage = %self.stage, object = %self.object, ?elapsed, ?bytes, "stage finished");
        StageResult {
            stage: self.stage,
            elapsed,
            bytes,
        }
    }
}
