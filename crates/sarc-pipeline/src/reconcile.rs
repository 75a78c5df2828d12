use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use sarc_registry::Registry;
use serde::Serialize;
use tracing::warn;

/// Divergence between the registry and the vault directory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    /// In the vault directory but not in the registry.
    pub orphaned: BTreeSet<String>,
    /// In the registry but not in the vault directory.
    pub dangling: BTreeSet<String>,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.orphaned.is_empty() && self.dangling.is_empty()
    }

    /// Emit one warning per drifted name.
    pub fn log(&self) {
        for name in &self.orphaned {
            warn!(name = %name, "orphaned vault object has no registry entry");
        }
        for name in &self.dangling {
            warn!(name = %name, "registry entry has no vault object");
        }
    }
}

/// Compare registry keys with a storage listing. Never mutates either side.
pub fn reconcile(registry: &Registry, listing: &BTreeSet<String>) -> DriftReport {
    let names = registry.names();
    DriftReport {
        orphaned: listing.difference(&names).cloned().collect(),
        dangling: names.difference(listing).cloned().collect(),
    }
}

/// Names of the objects in the vault directory.
///
/// Hidden entries are skipped since no logical name starts with a dot. A
/// missing directory lists as empty.
pub fn list_storage(vault_dir: &Path) -> io::Result<BTreeSet<String>> {
    let entries = match fs::read_dir(vault_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => return Err(e),
    };
    let mut names = BTreeSet::new();
    for entry in entries {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            names.insert(name);
        }
    }
    Ok(names)
}
