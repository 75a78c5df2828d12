//! Directory containers for the secret archive.
//!
//! A directory flows through the file-oriented compress and encrypt stages
//! as a single tar container. [`pack`] writes it deterministically;
//! [`unpack`] restores it, refusing any entry that would land outside the
//! destination.
//!
//! # Containment
//!
//! Extraction never trusts entry names. Each one passes [`contained_path`]
//! before anything is written, extraction happens in a sibling staging
//! directory, and the destination only appears once every entry succeeded.

pub mod error;
pub mod reader;
pub mod writer;

pub use error::{PackError, PackResult};
pub use reader::{contained_path, unpack, STAGING_PREFIX};
pub use writer::{pack, PackSummary};
