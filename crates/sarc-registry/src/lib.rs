//! Durable entry registry for the secret archive.
//!
//! The registry maps a logical entry name to the [`RegistryEntry`] needed to
//! reverse the ingest pipeline. It is persisted as a single JSON document
//! that is rewritten in full after every mutation.
//!
//! # Storage Backends
//!
//! All backends implement the [`RegistryBackend`] trait:
//!
//! - [`JsonFileBackend`] -- the on-disk document, replaced atomically
//! - [`InMemoryBackend`] -- document held in memory for tests and embedding
//!
//! # Design Rules
//!
//! 1. A document that exists but cannot be parsed is [`RegistryError::Corrupt`],
//!    never an empty map.
//! 2. Writes go to a temporary file in the same directory and are renamed
//!    over the document, so a crash never leaves a half-written registry.
//! 3. The in-memory map only changes after the backend accepted the write.
//! 4. The registry never looks at the vault directory; drift detection lives
//!    in the pipeline's reconciler.

pub mod backend;
pub mod document;
pub mod error;
pub mod file;
pub mod lock;
pub mod memory;
pub mod names;
pub mod registry;
pub mod resolver;

pub use backend::RegistryBackend;
pub use error::{RegistryError, RegistryResult};
pub use file::JsonFileBackend;
pub use lock::RegistryLock;
pub use memory::InMemoryBackend;
pub use names::validate_logical_name;
pub use registry::{Entries, Registry};
pub use resolver::{next_free_name, resolve, ConflictChoice, NameConflict, Resolution, ResolvedName};
pub use sarc_types::{CompressionMethod, LogicalName, RegistryEntry};
