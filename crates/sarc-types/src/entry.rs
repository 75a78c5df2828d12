use serde::{Deserialize, Serialize};

use crate::method::CompressionMethod;

/// Metadata needed to reverse the ingest pipeline for one vault entry.
///
/// Serialized field names match the registry document:
/// `{ "ext": "<string>", "method": "<gz|xz|zst>", "is_dir": <bool> }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryEntry {
    /// Original file extension without the leading dot (empty if none).
    pub ext: String,
    /// Codec the payload was compressed with.
    pub method: CompressionMethod,
    /// `true` when the payload is a packed directory container.
    pub is_dir: bool,
}

impl RegistryEntry {
    /// Entry for a single file ingested with the given extension.
    pub fn file(ext: impl Into<String>, method: CompressionMethod) -> Self {
        Self {
            ext: ext.into(),
            method,
            is_dir: false,
        }
    }

    /// Entry for a directory ingested as a container.
    pub fn directory(method: CompressionMethod) -> Self {
        Self {
            ext: String::new(),
            method,
            is_dir: true,
        }
    }

    /// The name the entry is restored under: `<name>.<ext>` or `<name>`.
    pub fn restored_file_name(&self, name: &str) -> String {
        if self.ext.is_empty() {
            name.to_string()
        } else {
            format!("{name}.{}", self.ext)
        }
    }

    /// Operator-facing description used in listings and conflict prompts.
    pub fn describe(&self) -> String {
        if self.is_dir {
            "directory".into()
        } else if self.ext.is_empty() {
            "no extension known".into()
        } else {
            format!(".{} file", self.ext)
        }
    }
}
