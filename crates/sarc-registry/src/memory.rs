use std::collections::BTreeMap;
use std::sync::RwLock;

use sarc_types::RegistryEntry;

use crate::backend::RegistryBackend;
use crate::document;
use crate::error::{RegistryError, RegistryResult};

/// In-memory registry backend.
///
/// Holds the encoded document rather than the map, so it rejects exactly
/// what [`JsonFileBackend`](crate::JsonFileBackend) rejects. Writes can be
/// made to fail on demand to exercise rollback paths.
pub struct InMemoryBackend {
    document: RwLock<Option<Vec<u8>>>,
    fail_writes: RwLock<bool>,
}

impl InMemoryBackend {
    /// Create a backend that has never been written.
    pub fn new() -> Self {
        Self {
            document: RwLock::new(None),
            fail_writes: RwLock::new(false),
        }
    }

    /// Create a backend whose persisted document is `bytes`.
    pub fn with_document(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            document: RwLock::new(Some(bytes.into())),
            fail_writes: RwLock::new(false),
        }
    }

    /// Make every subsequent `store` fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write().expect("lock poisoned") = fail;
    }

    /// The raw persisted document, if any.
    pub fn document(&self) -> Option<Vec<u8>> {
        self.document.read().expect("lock poisoned").clone()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBackend for InMemoryBackend {
    fn load(&self) -> RegistryResult<BTreeMap<String, RegistryEntry>> {
        match self.document.read().expect("lock poisoned").as_deref() {
            Some(bytes) => document::decode(&self.location(), bytes),
            None => Ok(BTreeMap::new()),
        }
    }

    fn store(&self, entries: &BTreeMap<String, RegistryEntry>) -> RegistryResult<()> {
        if *self.fail_writes.read().expect("lock poisoned") {
            return Err(RegistryError::io(
                self.location(),
                std::io::Error::new(std::io::ErrorKind::Other, "injected write failure"),
            ));
        }
        let bytes = document::encode(entries)?;
        *self.document.write().expect("lock poisoned") = Some(bytes);
        Ok(())
    }

    fn location(&self) -> String {
        "<memory>".into()
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let written = self.document.read().map(|d| d.is_some()).unwrap_or(false);
        f.debug_struct("InMemoryBackend")
            .field("written", &written)
            .finish()
    }
}
