//! Encoding of the registry document.
//!
//! ```text
//! { "<logicalName>": { "ext": "<string>", "method": "<gz|xz|zst>", "is_dir": <bool> } }
//! ```
//!
//! Both backends go through these two functions so they agree on what
//! counts as corrupt.

use std::collections::BTreeMap;

use sarc_types::RegistryEntry;

use crate::error::{RegistryError, RegistryResult};
use crate::names::validate_logical_name;

/// Parse a registry document.
///
/// Empty or whitespace-only input is corrupt: a registry file that exists
/// always holds at least `{}`.
pub fn decode(location: &str, bytes: &[u8]) -> RegistryResult<BTreeMap<String, RegistryEntry>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(RegistryError::Corrupt {
            location: location.to_string(),
            reason: "document is empty".into(),
        });
    }
    let entries: BTreeMap<String, RegistryEntry> =
        serde_json::from_slice(bytes).map_err(|e| RegistryError::Corrupt {
            location: location.to_string(),
            reason: e.to_string(),
        })?;
    for name in entries.keys() {
        validate_logical_name(name).map_err(|e| RegistryError::Corrupt {
            location: location.to_string(),
            reason: e.to_string(),
        })?;
    }
    Ok(entries)
}

/// Render a registry document.
pub fn encode(entries: &BTreeMap<String, RegistryEntry>) -> RegistryResult<Vec<u8>> {
    let mut bytes =
        serde_json::to_vec_pretty(entries).map_err(|e| RegistryError::Serialization(e.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sarc_types::CompressionMethod;

    #[test]
    fn empty_object_is_valid() {
        assert!(decode("test", b"{}").unwrap().is_empty());
    }

    #[test]
    fn empty_bytes_are_corrupt() {
        let err = decode("test", b"  \n").unwrap_err();
        assert!(matches!(err, RegistryError::Corrupt { .. }));
    }

    #[test]
    fn truncated_document_is_corrupt() {
        let err = decode("test", br#"{"docs": {"ext": "", "method": "gz""#).unwrap_err();
        assert!(matches!(err, RegistryError::Corrupt { .. }));
    }

    #[test]
    fn legacy_string_values_are_corrupt() {
        // Extension-only documents carry no method and cannot be reversed.
        let err = decode("test", br#"{"notes": "txt"}"#).unwrap_err();
        assert!(matches!(err, RegistryError::Corrupt { .. }));
    }

    #[test]
    fn unknown_method_is_corrupt() {
        let err = decode("test", br#"{"a": {"ext": "", "method": "rar", "is_dir": false}}"#)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Corrupt { .. }));
    }

    #[test]
    fn invalid_key_is_corrupt() {
        let err = decode("test", br#"{"../x": {"ext": "", "method": "gz", "is_dir": false}}"#)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Corrupt { .. }));
    }

    #[test]
    fn encode_decode_preserves_entries() {
        let mut entries = BTreeMap::new();
        entries.insert("docs".to_string(), RegistryEntry::directory(CompressionMethod::Gz));
        entries.insert(
            "report (1)".to_string(),
            RegistryEntry::file("pdf", CompressionMethod::Xz),
        );
        let bytes = encode(&entries).unwrap();
        assert_eq!(decode("test", &bytes).unwrap(), entries);
    }
}
