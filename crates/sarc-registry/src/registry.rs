use std::collections::{btree_map, BTreeMap, BTreeSet};

use sarc_types::RegistryEntry;
use tracing::info;

use crate::backend::RegistryBackend;
use crate::error::RegistryResult;
use crate::names::validate_logical_name;

/// Iterator over registry entries in name order.
pub type Entries<'a> = btree_map::Iter<'a, String, RegistryEntry>;

/// The mapping from logical entry names to their [`RegistryEntry`].
///
/// All mutation goes through [`Registry::put`] and [`Registry::remove`],
/// which persist the full document before updating the in-memory view. A
/// failed write leaves both the document and this value unchanged.
pub struct Registry {
    backend: Box<dyn RegistryBackend>,
    entries: BTreeMap<String, RegistryEntry>,
}

impl Registry {
    /// Load the registry from a backend.
    ///
    /// Fails with `RegistryError::Corrupt` if the persisted document is
    /// unreadable or malformed.
    pub fn load(backend: Box<dyn RegistryBackend>) -> RegistryResult<Self> {
        let entries = backend.load()?;
        Ok(Self { backend, entries })
    }

    /// Re-read the document, discarding the in-memory view.
    pub fn reload(&mut self) -> RegistryResult<()> {
        self.entries = self.backend.load()?;
        Ok(())
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    /// Returns `true` if `name` is a key.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// All entry names.
    pub fn names(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    /// Entries in name order.
    pub fn entries(&self) -> Entries<'_> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or fully replace an entry, then persist.
    ///
    /// Returns the entry that was replaced, if any.
    pub fn put(
        &mut self,
        name: &str,
        entry: RegistryEntry,
    ) -> RegistryResult<Option<RegistryEntry>> {
        validate_logical_name(name)?;
        let mut next = self.entries.clone();
        let previous = next.insert(name.to_string(), entry);
        self.backend.store(&next)?;
        self.entries = next;
        info!(name, replaced = previous.is_some(), "registry entry written");
        Ok(previous)
    }

    /// Delete an entry, then persist.
    ///
    /// Returns the removed entry, or `None` (without writing) if absent.
    pub fn remove(&mut self, name: &str) -> RegistryResult<Option<RegistryEntry>> {
        if !self.entries.contains_key(name) {
            return Ok(None);
        }
        let mut next = self.entries.clone();
        let removed = next.remove(name);
        self.backend.store(&next)?;
        self.entries = next;
        info!(name, "registry entry removed");
        Ok(removed)
    }

    /// Where the document lives, for diagnostics.
    pub fn location(&self) -> String {
        self.backend.location()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("location", &self.backend.location())
            .field("entries", &self.entries.len())
            .finish()
    }
}
