use std::collections::BTreeMap;

use sarc_types::RegistryEntry;

use crate::error::RegistryResult;

/// Persistence for the registry document.
///
/// All implementations must satisfy these invariants:
/// - `load` on a store that was never written returns an empty map.
/// - `load` on a document that exists but is unreadable or malformed returns
///   `RegistryError::Corrupt`; it never degrades to an empty map.
/// - `store` replaces the whole document. A reader observes either the old
///   document or the new one, never a mixture.
/// - All I/O errors are propagated, never silently ignored.
pub trait RegistryBackend: Send + Sync {
    /// Read the full mapping.
    fn load(&self) -> RegistryResult<BTreeMap<String, RegistryEntry>>;

    /// Replace the persisted mapping.
    fn store(&self, entries: &BTreeMap<String, RegistryEntry>) -> RegistryResult<()>;

    /// Where the document lives, for diagnostics.
    fn location(&self) -> String;
}

impl<T: RegistryBackend + ?Sized> RegistryBackend for std::sync::Arc<T> {
    fn load(&self) -> RegistryResult<BTreeMap<String, RegistryEntry>> {
        (**self).load()
    }

    fn store(&self, entries: &BTreeMap<String, RegistryEntry>) -> RegistryResult<()> {
        (**self).store(entries)
    }

    fn location(&self) -> String {
        (**self).location()
    }
}
