//! Encryption boundary for the secret archive.
//!
//! The pipeline only sees the [`Cipher`] trait: encrypt a file, decrypt a
//! file, succeed or fail. [`StreamCipher`] is the production implementation.
//! It generates a fresh key per ciphertext, stores it in a [`KeyRing`], and
//! records the [`KeyHandle`] in the ciphertext header so decryption can find
//! its key without the caller holding any key material.
//!
//! All primitives come from `chacha20poly1305` and `blake3`; nothing here
//! implements cryptography itself.

pub mod cipher;
pub mod error;
pub mod key;
pub mod keyring;
pub mod stream;

pub use cipher::Cipher;
pub use error::{CryptoError, CryptoResult};
pub use key::{KeyHandle, SecretKey};
pub use keyring::KeyRing;
pub use stream::StreamCipher;
