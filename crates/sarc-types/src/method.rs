use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Compression codec an entry is stored with.
///
/// The set is closed: the registry document stores the tag verbatim and any
/// other tag is rejected when the document is parsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CompressionMethod {
    /// gzip (DEFLATE).
    #[serde(rename = "gz")]
    Gz,
    /// xz (LZMA2).
    #[serde(rename = "xz")]
    Xz,
    /// Zstandard.
    #[serde(rename = "zst")]
    Zstd,
}

impl CompressionMethod {
    /// Every supported method, in menu order.
    pub const ALL: [Self; 3] = [Self::Gz, Self::Xz, Self::Zstd];

    /// The registry tag (and artifact extension) for this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gz => "gz",
            Self::Xz => "xz",
            Self::Zstd => "zst",
        }
    }

    /// Human-readable codec name for menus.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Gz => "gzip",
            Self::Xz => "xz / LZMA2",
            Self::Zstd => "Zstandard",
        }
    }
}

impl Default for CompressionMethod {
    fn default() -> Self {
        Self::Gz
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionMethod {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gz" | "gzip" => Ok(Self::Gz),
            "xz" => Ok(Self::Xz),
            "zst" | "zstd" => Ok(Self::Zstd),
            _ => Err(TypeError::UnsupportedMethod(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_tags() {
        assert_eq!("gz".parse::<CompressionMethod>().unwrap(), CompressionMethod::Gz);
        assert_eq!("XZ".parse::<CompressionMethod>().unwrap(), CompressionMethod::Xz);
        assert_eq!("zstd".parse::<CompressionMethod>().unwrap(), CompressionMethod::Zstd);
    }

    #[test]
    fn parse_unknown_tag() {
        let err = "bz2".parse::<CompressionMethod>().unwrap_err();
        assert_eq!(err, TypeError::UnsupportedMethod("bz2".into()));
    }

    #[test]
    fn serde_uses_registry_tags() {
        assert_eq!(serde_json::to_string(&CompressionMethod::Gz).unwrap(), "\"gz\"");
        assert_eq!(serde_json::to_string(&CompressionMethod::Zstd).unwrap(), "\"zst\"");
        let parsed: CompressionMethod = serde_json::from_str("\"xz\"").unwrap();
        assert_eq!(parsed, CompressionMethod::Xz);
    }

    #[test]
    fn serde_rejects_unknown_tag() {
        assert!(serde_json::from_str::<CompressionMethod>("\"lz4\"").is_err());
    }

    #[test]
    fn display_matches_tag() {
        for method in CompressionMethod::ALL {
            assert_eq!(method.to_string(), method.as_str());
        }
    }
}
