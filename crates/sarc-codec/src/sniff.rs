use std::fs::File;
use std::io::Read;
use std::path::Path;

use sarc_types::CompressionMethod;

use crate::error::{CodecError, CodecResult};

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];

/// Identify a compressed payload from its leading bytes.
pub fn sniff_bytes(head: &[u8]) -> Option<CompressionMethod> {
    if head.starts_with(XZ_MAGIC) {
        Some(CompressionMethod::Xz)
    } else if head.starts_with(ZSTD_MAGIC) {
        Some(CompressionMethod::Zstd)
    } else if head.starts_with(GZIP_MAGIC) {
        Some(CompressionMethod::Gz)
    } else {
        None
    }
}

/// Identify the codec of the file at `path`, or `None` if unrecognised.
pub fn sniff(path: &Path) -> CodecResult<Option<CompressionMethod>> {
    let file = File::open(path).map_err(|e| CodecError::io(path, e))?;
    let mut head = Vec::with_capacity(XZ_MAGIC.len());
    file.take(XZ_MAGIC.len() as u64)
        .read_to_end(&mut head)
        .map_err(|e| CodecError::io(path, e))?;
    Ok(sniff_bytes(&head))
}
