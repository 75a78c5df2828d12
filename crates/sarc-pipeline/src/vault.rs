use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sarc_codec::{compress_file, decompress_file};
use sarc_crypto::{Cipher, KeyHandle, KeyRing, StreamCipher};
use sarc_pack::{pack, unpack};
use sarc_registry::{
    next_free_name, resolve, ConflictChoice, JsonFileBackend, NameConflict, Registry,
    RegistryBackend, RegistryLock, Resolution, ResolvedName,
};
use sarc_types::{CompressionMethod, RegistryEntry};
use tracing::{info, warn};

use crate::config::{VaultConfig, VaultLayout};
use crate::error::{AtStage, PipelineError, PipelineResult, StageFailure};
use crate::reconcile::{list_storage, reconcile, DriftReport};
use crate::source::SourceInfo;
use crate::stage::{Stage, StageResult, StageTimer};
use crate::staging::{move_file, Staging};

/// Everything decided before an ingest writes anything.
#[derive(Clone, Debug)]
pub struct IngestPlan {
    pub source: SourceInfo,
    /// Drift found before the run.
    pub drift: DriftReport,
    pub resolution: Resolution,
    stages: Vec<StageResult>,
}

impl IngestPlan {
    /// The collision to put to the operator, if any.
    pub fn conflict(&self) -> Option<&NameConflict> {
        match &self.resolution {
            Resolution::Conflict(conflict) => Some(conflict),
            Resolution::Free(_) => None,
        }
    }
}

/// Result of a completed ingest.
#[derive(Clone, Debug)]
pub struct IngestReport {
    pub name: String,
    pub entry: RegistryEntry,
    /// `true` when an existing entry was overwritten.
    pub replaced: bool,
    pub key: KeyHandle,
    pub drift: DriftReport,
    pub stages: Vec<StageResult>,
    pub elapsed: Duration,
}

/// Result of a completed egress.
#[derive(Clone, Debug)]
pub struct EgressReport {
    pub name: String,
    pub entry: RegistryEntry,
    /// Where the restored file or directory was written.
    pub output: PathBuf,
    /// Drift found after the run.
    pub drift: DriftReport,
    pub stages: Vec<StageResult>,
    pub elapsed: Duration,
}

/// A vault opened for ingest and egress.
///
/// Holds the registry and, when opened from disk, the advisory lock for the
/// lifetime of the value. Every mutation of the registry happens here, after
/// the vault object it describes is in place.
pub struct Vault {
    config: VaultConfig,
    registry: Registry,
    cipher: Box<dyn Cipher>,
    _lock: Option<RegistryLock>,
}

impl Vault {
    /// Open the vault described by `config`, encrypting with `cipher`.
    ///
    /// Creates missing directories, takes the lock, removes staging left by
    /// interrupted runs, and loads the registry. Fails with
    /// [`ErrorKind::Locked`](crate::ErrorKind::Locked) if another process
    /// holds the vault, or
    /// [`ErrorKind::CorruptRegistry`](crate::ErrorKind::CorruptRegistry) if the
    /// document cannot be read.
    pub fn open(config: VaultConfig, cipher: Box<dyn Cipher>) -> PipelineResult<Self> {
        let layout = &config.layout;
        layout.ensure()?;
        let registry_path = layout.registry_path();
        let label = registry_path.display().to_string();

        let lock = RegistryLock::acquire(&layout.lock_path(), config.lock_timeout())
            .at(Stage::Opening, &label)?;
        Staging::sweep(&layout.staging_dir());
        let registry = Registry::load(Box::new(JsonFileBackend::new(&registry_path)))
            .at(Stage::Opening, &label)?;
        info!(root = %layout.root().display(), entries = registry.len(), "vault opened");

        Ok(Self {
            config,
            registry,
            cipher,
            _lock: Some(lock),
        })
    }

    /// Open with the default [`StreamCipher`] over the layout's keys root.
    pub fn open_local(config: VaultConfig) -> PipelineResult<Self> {
        let cipher = StreamCipher::new(KeyRing::new(config.layout.keys_dir()));
        Self::open(config, Box::new(cipher))
    }

    /// Build a vault over an arbitrary registry backend without locking.
    pub fn with_backend(
        config: VaultConfig,
        backend: Box<dyn RegistryBackend>,
        cipher: Box<dyn Cipher>,
    ) -> PipelineResult<Self> {
        config.layout.ensure()?;
        let label = backend.location();
        let registry = Registry::load(backend).at(Stage::Opening, &label)?;
        Ok(Self {
            config,
            registry,
            cipher,
            _lock: None,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn layout(&self) -> &VaultLayout {
        &self.config.layout
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registry entries in name order.
    pub fn list(&self) -> Vec<(String, RegistryEntry)> {
        self.registry
            .entries()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect()
    }

    /// Visible entries of the import root, sorted by name.
    pub fn import_listing(&self) -> PipelineResult<Vec<PathBuf>> {
        let dir = self.layout().import_dir();
        let label = dir.display().to_string();
        let entries = fs::read_dir(&dir)
            .map_err(|e| StageFailure::io(&dir, e))
            .at(Stage::Resolving, &label)?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| StageFailure::io(&dir, e))
                .at(Stage::Resolving, &label)?;
            if !entry.file_name().to_string_lossy().starts_with('.') {
                paths.push(entry.path());
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Resolve an operator-supplied source: relative paths are looked up in
    /// the import root first, then taken as given.
    pub fn locate_source(&self, source: &Path) -> PathBuf {
        if source.is_relative() {
            let imported = self.layout().import_dir().join(source);
            if imported.symlink_metadata().is_ok() {
                return imported;
            }
        }
        source.to_path_buf()
    }

    /// Compare the registry with the vault directory and log any drift.
    pub fn reconcile(&self) -> PipelineResult<DriftReport> {
        let dir = self.layout().vault_dir();
        let listing = list_storage(&dir)
            .map_err(|e| StageFailure::io(&dir, e))
            .at(Stage::Reconciling, &dir.display().to_string())?;
        let report = reconcile(&self.registry, &listing);
        report.log();
        Ok(report)
    }

    /// Remove registry entries whose vault object is gone.
    ///
    /// Orphaned objects are never touched. Returns the removed names.
    pub fn prune_dangling(&mut self) -> PipelineResult<Vec<String>> {
        let report = self.reconcile()?;
        let mut removed = Vec::with_capacity(report.dangling.len());
        for name in report.dangling {
            self.registry.remove(&name).at(Stage::Reconciling, &name)?;
            warn!(name = %name, "pruned dangling registry entry");
            removed.push(name);
        }
        Ok(removed)
    }

    /// Inspect the source, check for drift, and resolve the entry name.
    pub fn plan_ingest(&self, source: &Path, name: Option<&str>) -> PipelineResult<IngestPlan> {
        let mut stages = Vec::new();

        let timer = StageTimer::start(Stage::Reconciling, &source.display().to_string());
        let drift = self.reconcile()?;
        stages.push(timer.finish(None));

        let source = SourceInfo::inspect(source, name)?;
        let timer = StageTimer::start(Stage::Resolving, &source.logical_name);
        let resolution =
            resolve(&source.logical_name, &self.registry).at(Stage::Resolving, &source.logical_name)?;
        stages.push(timer.finish(None));

        Ok(IngestPlan {
            source,
            drift,
            resolution,
            stages,
        })
    }

    /// Plan, settle any collision with `decide`, and ingest.
    pub fn ingest_with(
        &mut self,
        source: &Path,
        name: Option<&str>,
        method: CompressionMethod,
        decide: impl FnOnce(&NameConflict) -> ConflictChoice,
    ) -> PipelineResult<IngestReport> {
        let plan = self.plan_ingest(source, name)?;
        let choice = plan.conflict().map(decide);
        self.ingest(plan, choice, method)
    }

    /// Run containerize, compress, and encrypt, then swap the result into
    /// the vault and record it.
    ///
    /// `choice` settles the plan's collision and is ignored when the name
    /// was free. On any failure the registry and the vault directory are
    /// left exactly as they were.
    pub fn ingest(
        &mut self,
        plan: IngestPlan,
        choice: Option<ConflictChoice>,
        method: CompressionMethod,
    ) -> PipelineResult<IngestReport> {
        let start = Instant::now();
        let IngestPlan {
            source,
            drift,
            resolution,
            mut stages,
        } = plan;
        let target = settle(resolution, choice)?;
        let name = target.name().to_string();
        if !target.replaces_existing() && self.registry.contains(&name) {
            return Err(StageFailure::NameTaken(name.clone())).at(Stage::Resolving, &name);
        }
        let object = self.layout().object_path(&name);
        if !target.replaces_existing() && object.symlink_metadata().is_ok() {
            // An orphan without a registry entry; only the operator may remove it.
            return Err(StageFailure::OutputExists(object)).at(Stage::Resolving, &name);
        }

        let staging = Staging::create(&self.layout().staging_dir())
            .map_err(|e| StageFailure::io(self.layout().staging_dir(), e))
            .at(Stage::Resolving, &name)?;

        let payload = if source.is_dir {
            let timer = StageTimer::start(Stage::Containerizing, &name);
            let container = staging.artifact("container.tar");
            let summary = pack(&source.path, &container).at(Stage::Containerizing, &name)?;
            stages.push(timer.finish(Some(summary.bytes)));
            container
        } else {
            source.path.clone()
        };

        let timer = StageTimer::start(Stage::Compressing, &name);
        let compressed = staging.artifact(&format!("payload.{method}"));
        let consumed = compress_file(&payload, &compressed, method).at(Stage::Compressing, &name)?;
        stages.push(timer.finish(Some(consumed)));

        let timer = StageTimer::start(Stage::Encrypting, &name);
        let sealed = staging.artifact("sealed");
        let key = self
            .cipher
            .encrypt(&compressed, &sealed)
            .at(Stage::Encrypting, &name)?;
        stages.push(timer.finish(file_len(&sealed)));

        let timer = StageTimer::start(Stage::Registering, &name);
        let entry = RegistryEntry {
            ext: if source.is_dir { String::new() } else { source.ext.clone() },
            method,
            is_dir: source.is_dir,
        };
        self.commit(&name, &entry, &sealed, &object, target.replaces_existing(), &staging)?;
        stages.push(timer.finish(None));

        info!(name = %name, %method, is_dir = entry.is_dir, "ingested");
        Ok(IngestReport {
            name,
            entry,
            replaced: target.replaces_existing(),
            key,
            drift,
            stages,
            elapsed: start.elapsed(),
        })
    }

    /// Put the sealed artifact in place, then write the registry entry.
    ///
    /// An object being replaced is parked in staging first and restored if
    /// anything after that fails. Without `replacing`, an object already at
    /// `object` is left alone and the commit fails.
    fn commit(
        &mut self,
        name: &str,
        entry: &RegistryEntry,
        sealed: &Path,
        object: &Path,
        replacing: bool,
        staging: &Staging,
    ) -> PipelineResult<()> {
        let exists = object.symlink_metadata().is_ok();
        if exists && !replacing {
            return Err(StageFailure::OutputExists(object.to_path_buf())).at(Stage::Registering, name);
        }
        let previous = if exists {
            let parked = staging.artifact("previous");
            fs::rename(object, &parked)
                .map_err(|e| StageFailure::io(object, e))
                .at(Stage::Registering, name)?;
            Some(parked)
        } else {
            None
        };

        let placed = move_file(sealed, object).map_err(|e| StageFailure::io(object, e));
        let recorded = placed.and_then(|()| {
            self.registry
                .put(name, entry.clone())
                .map(|_| ())
                .map_err(StageFailure::from)
        });
        if let Err(failure) = recorded {
            if let Err(e) = remove_if_present(object) {
                warn!(path = %object.display(), error = %e, "failed to remove new vault object");
            }
            if let Some(parked) = previous {
                if let Err(e) = fs::rename(&parked, object) {
                    warn!(path = %object.display(), error = %e, "failed to restore previous vault object");
                }
            }
            return Err(failure).at(Stage::Registering, name);
        }
        Ok(())
    }

    /// Restore an entry to the out root and remove it from the vault.
    ///
    /// The registry entry and vault object are only removed once the output
    /// is in place; a failure before that leaves both untouched. The output
    /// never overwrites an existing file: a taken name gets the next free
    /// ` (n)` counter.
    pub fn egress(&mut self, name: &str) -> PipelineResult<EgressReport> {
        let start = Instant::now();
        let mut stages = Vec::new();
        let entry = self
            .registry
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownEntry(name.to_string()))?;
        let object = self.layout().object_path(name);
        if !object.is_file() {
            return Err(StageFailure::Missing(object)).at(Stage::Decrypting, name);
        }

        let staging = Staging::create(&self.layout().staging_dir())
            .map_err(|e| StageFailure::io(self.layout().staging_dir(), e))
            .at(Stage::Decrypting, name)?;

        let timer = StageTimer::start(Stage::Decrypting, name);
        let decrypted = staging.artifact("decrypted");
        self.cipher
            .decrypt(&object, &decrypted)
            .at(Stage::Decrypting, name)?;
        stages.push(timer.finish(file_len(&decrypted)));

        let timer = StageTimer::start(Stage::Decompressing, name);
        let plain = staging.artifact("plain");
        let produced =
            decompress_file(&decrypted, &plain, entry.method).at(Stage::Decompressing, name)?;
        stages.push(timer.finish(Some(produced)));

        let timer = StageTimer::start(Stage::Extracting, name);
        let out_dir = self.layout().out_dir();
        fs::create_dir_all(&out_dir)
            .map_err(|e| StageFailure::io(&out_dir, e))
            .at(Stage::Extracting, name)?;
        let output = free_output_path(&out_dir, name, &entry);
        if entry.is_dir {
            unpack(&plain, &output).at(Stage::Extracting, name)?;
        } else {
            move_file(&plain, &output)
                .map_err(|e| StageFailure::io(&output, e))
                .at(Stage::Extracting, name)?;
        }
        stages.push(timer.finish(None));

        let timer = StageTimer::start(Stage::Deregistering, name);
        self.registry.remove(name).at(Stage::Deregistering, name)?;
        if let Err(e) = fs::remove_file(&object) {
            warn!(path = %object.display(), error = %e, "vault object not removed after egress");
        }
        stages.push(timer.finish(None));
        drop(staging);

        let drift = self.reconcile()?;
        info!(name, output = %output.display(), "egressed");
        Ok(EgressReport {
            name: name.to_string(),
            entry,
            output,
            drift,
            stages,
            elapsed: start.elapsed(),
        })
    }

    pub(crate) fn cipher(&self) -> &dyn Cipher {
        self.cipher.as_ref()
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("root", &self.config.layout.root())
            .field("registry", &self.registry)
            .field("locked", &self._lock.is_some())
            .finish()
    }
}

fn settle(resolution: Resolution, choice: Option<ConflictChoice>) -> PipelineResult<ResolvedName> {
    match resolution {
        Resolution::Free(resolved) => Ok(resolved),
        Resolution::Conflict(conflict) => match choice {
            Some(choice) => Ok(conflict.decide(choice)),
            None => {
                let name = conflict.requested.clone();
                Err(StageFailure::NameTaken(name.clone())).at(Stage::Resolving, &name)
            }
        },
    }
}

/// First path in `out_dir` for `name` that does not exist yet.
pub(crate) fn free_output_path(out_dir: &Path, name: &str, entry: &RegistryEntry) -> PathBuf {
    let taken = |candidate: &str| {
        out_dir
            .join(entry.restored_file_name(candidate))
            .symlink_metadata()
            .is_ok()
    };
    let chosen = if taken(name) {
        next_free_name(name, taken)
    } else {
        name.to_string()
    };
    out_dir.join(entry.restored_file_name(&chosen))
}

fn file_len(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().map(|m| m.len())
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
