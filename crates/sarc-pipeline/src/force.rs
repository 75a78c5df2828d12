//! Single pipeline stages run by hand, for recovering from interrupted runs
//! or inspecting artifacts. These never read or write the registry.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use sarc_codec::{compress_file, decompress_file, sniff};
use sarc_crypto::KeyHandle;
use sarc_pack::{pack, unpack};
use sarc_registry::next_free_name;
use sarc_types::CompressionMethod;
use tracing::info;

use crate::error::{AtStage, PipelineResult, StageFailure};
use crate::source::split_extension;
use crate::stage::Stage;
use crate::staging::{move_file, Staging};
use crate::vault::Vault;

/// Suffix given to force-encrypted files.
pub const SEALED_SUFFIX: &str = "sarc";

/// A stage that can be run on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ForceStage {
    Containerize,
    Compress,
    Encrypt,
    Decrypt,
    Decompress,
    Extract,
}

impl ForceStage {
    pub const ALL: [Self; 6] = [
        Self::Containerize,
        Self::Compress,
        Self::Encrypt,
        Self::Decrypt,
        Self::Decompress,
        Self::Extract,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Containerize => "containerize",
            Self::Compress => "compress",
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
            Self::Decompress => "decompress",
            Self::Extract => "extract",
        }
    }

    /// The pipeline stage this corresponds to, for error reporting.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Containerize => Stage::Containerizing,
            Self::Compress => Stage::Compressing,
            Self::Encrypt => Stage::Encrypting,
            Self::Decrypt => Stage::Decrypting,
            Self::Decompress => Stage::Decompressing,
            Self::Extract => Stage::Extracting,
        }
    }
}

impl fmt::Display for ForceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForceStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown stage {s:?}"))
    }
}

/// What a forced stage produced.
#[derive(Clone, Debug)]
pub struct ForceOutcome {
    pub stage: ForceStage,
    pub input: PathBuf,
    pub output: PathBuf,
    /// Codec used by compress and decompress.
    pub method: Option<CompressionMethod>,
    /// Key used by encrypt and decrypt.
    pub key: Option<KeyHandle>,
}

impl Vault {
    /// Run one stage on `input`, writing to `output` or a free name in the
    /// out root.
    ///
    /// An explicit `output` that already exists is refused. `method` picks
    /// the codec for compress; decompress sniffs it from the input when not
    /// given.
    pub fn force(
        &self,
        stage: ForceStage,
        input: &Path,
        output: Option<&Path>,
        method: Option<CompressionMethod>,
    ) -> PipelineResult<ForceOutcome> {
        let label = input.display().to_string();
        let at = stage.stage();
        if input.symlink_metadata().is_err() {
            return Err(StageFailure::Missing(input.to_path_buf())).at(at, &label);
        }

        let method = match (stage, method) {
            (ForceStage::Compress, None) => Some(self.config().default_method),
            (ForceStage::Decompress, None) => match sniff(input).at(at, &label)? {
                Some(found) => Some(found),
                None => return Err(StageFailure::UnknownFormat(input.to_path_buf())).at(at, &label),
            },
            (ForceStage::Compress | ForceStage::Decompress, given) => given,
            _ => None,
        };

        let output = match output {
            Some(path) if path.symlink_metadata().is_ok() => {
                return Err(StageFailure::OutputExists(path.to_path_buf())).at(at, &label)
            }
            Some(path) => path.to_path_buf(),
            None => self.default_force_output(stage, input, method),
        };

        let staging = Staging::create(&self.layout().staging_dir())
            .map_err(|e| StageFailure::io(self.layout().staging_dir(), e))
            .at(at, &label)?;
        let artifact = staging.artifact("artifact");
        let mut key = None;
        match stage {
            ForceStage::Containerize => {
                pack(input, &artifact).at(at, &label)?;
            }
            ForceStage::Compress | ForceStage::Decompress => {
                let method = method.unwrap_or_default();
                if stage == ForceStage::Compress {
                    compress_file(input, &artifact, method).at(at, &label)?;
                } else {
                    decompress_file(input, &artifact, method).at(at, &label)?;
                }
            }
            ForceStage::Encrypt => {
                key = Some(self.cipher().encrypt(input, &artifact).at(at, &label)?);
            }
            ForceStage::Decrypt => {
                key = Some(self.cipher().decrypt(input, &artifact).at(at, &label)?);
            }
            ForceStage::Extract => {
                unpack(input, &output).at(at, &label)?;
            }
        }
        if stage != ForceStage::Extract {
            move_file(&artifact, &output)
                .map_err(|e| StageFailure::io(&output, e))
                .at(at, &label)?;
        }

        info!(%stage, input = %input.display(), output = %output.display(), "forced stage");
        Ok(ForceOutcome {
            stage,
            input: input.to_path_buf(),
            output,
            method,
            key,
        })
    }

    /// Free name in the out root for a forced stage's output.
    ///
    /// Suffix-adding stages append to the whole input name and suffix-removing
    /// stages strip one. A collision counter goes before the last extension,
    /// so a forced decrypt of `docs.tar.xz.sarc` next to an existing
    /// `docs.tar.xz` yields `docs.tar (1).xz`, which still sniffs and strips
    /// as `xz` on decompress.
    fn default_force_output(
        &self,
        stage: ForceStage,
        input: &Path,
        method: Option<CompressionMethod>,
    ) -> PathBuf {
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| stage.as_str().to_string());
        let (stem, ext) = split_extension(&file_name);
        let strip = |suffix: &str, fallback: &str| {
            if ext.eq_ignore_ascii_case(suffix) {
                stem.to_string()
            } else {
                format!("{file_name}.{fallback}")
            }
        };
        let wanted = match stage {
            ForceStage::Containerize => format!("{file_name}.tar"),
            ForceStage::Compress => format!("{file_name}.{}", method.unwrap_or_default()),
            ForceStage::Encrypt => format!("{file_name}.{SEALED_SUFFIX}"),
            ForceStage::Decrypt => strip(SEALED_SUFFIX, "dec"),
            ForceStage::Decompress => {
                let suffix = method.map(|m| m.as_str()).unwrap_or_default();
                strip(suffix, "out")
            }
            ForceStage::Extract => strip("tar", "d"),
        };
        free_sibling(&self.layout().out_dir(), &wanted)
    }
}

/// `dir/file_name`, or the next free ` (n)` variant of its stem.
fn free_sibling(dir: &Path, file_name: &str) -> PathBuf {
    let (stem, ext) = split_extension(file_name);
    let render = |candidate: &str| {
        if ext.is_empty() {
            candidate.to_string()
        } else {
            format!("{candidate}.{ext}")
        }
    };
    let taken = |candidate: &str| dir.join(render(candidate)).symlink_metadata().is_ok();
    if !taken(stem) {
        return dir.join(file_name);
    }
    dir.join(render(&next_free_name(stem, taken)))
}
