//! Vault configuration.
//!
//! Everything is optional. A vault root without `sarc.toml` uses
//! [`VaultConfig::default`] with the root filled in:
//!
//! ```toml
//! default_method = "xz"
//! lock_timeout_ms = 2000
//! auto_repair = false
//!
//! [layout]
//! import = "import"
//! vault = "vault"
//! out = "out"
//! keys = "keys"
//! staging = ".sarc-staging"
//! registry = "registry.json"
//! lock = ".sarc.lock"
//! ```
//!
//! Relative layout paths are resolved against the vault root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sarc_types::CompressionMethod;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AtStage, PipelineError, PipelineResult, StageFailure};
use crate::stage::Stage;

/// Where each part of a vault lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaultLayout {
    #[serde(skip)]
    root: PathBuf,
    /// Ingest sources.
    pub import: PathBuf,
    /// Encrypted vault objects.
    pub vault: PathBuf,
    /// Egress results.
    pub out: PathBuf,
    /// Key material, owned by the cipher.
    pub keys: PathBuf,
    /// Per-run scratch space. Must share a filesystem with `vault`.
    pub staging: PathBuf,
    /// The registry document.
    pub registry: PathBuf,
    /// Advisory lock file.
    pub lock: PathBuf,
}

impl Default for VaultLayout {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            import: "import".into(),
            vault: "vault".into(),
            out: "out".into(),
            keys: "keys".into(),
            staging: ".sarc-staging".into(),
            registry: "registry.json".into(),
            lock: ".sarc.lock".into(),
        }
    }
}

impl VaultLayout {
    /// The default layout under `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn import_dir(&self) -> PathBuf {
        self.root.join(&self.import)
    }

    pub fn vault_dir(&self) -> PathBuf {
        self.root.join(&self.vault)
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root.join(&self.out)
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.root.join(&self.keys)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(&self.staging)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.root.join(&self.registry)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(&self.lock)
    }

    /// Path of the vault object for a logical name.
    pub fn object_path(&self, name: &str) -> PathBuf {
        self.vault_dir().join(name)
    }

    /// Create every directory of the layout that does not exist yet.
    pub fn ensure(&self) -> PipelineResult<()> {
        for dir in [
            self.import_dir(),
            self.vault_dir(),
            self.out_dir(),
            self.keys_dir(),
            self.staging_dir(),
        ] {
            fs::create_dir_all(&dir)
                .map_err(|e| StageFailure::io(&dir, e))
                .at(Stage::Opening, &self.root.display().to_string())?;
        }
        Ok(())
    }
}

/// Top-level vault configuration, read from `sarc.toml`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaultConfig {
    /// Method offered first when ingesting.
    pub default_method: CompressionMethod,
    /// How long to wait for another `sarc` process to release the vault.
    pub lock_timeout_ms: u64,
    /// Remove dangling registry entries without asking.
    pub auto_repair: bool,
    pub layout: VaultLayout,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            default_method: CompressionMethod::Gz,
            lock_timeout_ms: 5000,
            auto_repair: false,
            layout: VaultLayout::default(),
        }
    }
}

impl VaultConfig {
    /// Name of the configuration file inside the vault root.
    pub const FILE_NAME: &'static str = "sarc.toml";

    /// The default configuration for a vault at `root`.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: VaultLayout::with_root(root),
            ..Default::default()
        }
    }

    /// Load `sarc.toml` from `root`, falling back to defaults if absent.
    pub fn load(root: &Path) -> PipelineResult<Self> {
        let path = root.join(Self::FILE_NAME);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(root = %root.display(), "no config file, using defaults");
                return Ok(Self::for_root(root));
            }
            Err(e) => {
                return Err(PipelineError::Config {
                    path,
                    reason: e.to_string(),
                })
            }
        };
        let mut config = Self::from_toml(&text).map_err(|reason| PipelineError::Config {
            path: path.clone(),
            reason,
        })?;
        config.layout.root = root.to_path_buf();
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Parse a configuration document. The layout root is left at `.`.
    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// Render the configuration as a `sarc.toml` document.
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| e.to_string())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}
