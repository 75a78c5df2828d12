//! Streaming compression for vault payloads.
//!
//! Every [`CompressionMethod`] is handled as a stream so payloads never have
//! to fit in memory. [`sniff`] recognises a payload by its magic bytes for
//! callers that do not have a registry entry to consult.

pub mod codec;
pub mod error;
pub mod sniff;

pub use codec::{compress, compress_file, decompress, decompress_file};
pub use error::{CodecError, CodecResult};
pub use sarc_types::CompressionMethod;
pub use sniff::{sniff, sniff_bytes};
