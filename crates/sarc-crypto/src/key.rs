use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Length of a secret key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of a key handle in hex characters.
pub const HANDLE_LEN: usize = 32;

const FINGERPRINT_CONTEXT: &str = "sarc 2026-01 key fingerprint";

/// A 256-bit symmetric key. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    /// Generate a fresh key from the operating system RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// The public fingerprint of this key.
    pub fn handle(&self) -> KeyHandle {
        let derived = blake3::derive_key(FINGERPRINT_CONTEXT, &self.0);
        KeyHandle(hex::encode(&derived[..HANDLE_LEN / 2]))
    }

    pub(crate) fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&self.0))
    }

    pub(crate) fn from_hex(text: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; KEY_LEN];
        hex::decode_to_slice(text.trim(), &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(<redacted>)")
    }
}

/// Opaque reference to key material held by a [`KeyRing`](crate::KeyRing).
///
/// A handle is the truncated BLAKE3 fingerprint of its key, rendered as
/// lowercase hex. It reveals nothing about the key itself.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyHandle(String);

impl KeyHandle {
    /// Parse a handle, accepting only `HANDLE_LEN` lowercase hex characters.
    pub fn parse(text: &str) -> Option<Self> {
        let valid = text.len() == HANDLE_LEN
            && text.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        valid.then(|| Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
