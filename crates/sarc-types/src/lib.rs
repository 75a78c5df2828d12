//! Foundation types for the secret archive (SARC).
//!
//! Every other SARC crate depends on `sarc-types`. The types here carry no
//! I/O: they describe what a vault entry *is*, not where it lives.
//!
//! # Key Types
//!
//! - [`CompressionMethod`]: closed set of codecs an entry may be stored with
//! - [`RegistryEntry`]: metadata needed to reverse the ingest pipeline
//! - [`LogicalName`]: operator-facing entry name parsed into `{base, counter}`

pub mod entry;
pub mod error;
pub mod method;
pub mod name;

pub use entry::RegistryEntry;
pub use error::TypeError;
pub use method::CompressionMethod;
pub use name::LogicalName;
