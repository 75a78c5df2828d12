use std::path::Path;

use crate::error::CryptoResult;
use crate::key::KeyHandle;

/// The encryption capability the pipeline depends on.
///
/// Implementations own their key material. Callers see only a
/// [`KeyHandle`] and success or failure.
pub trait Cipher: Send + Sync {
    /// Encrypt `src` into a new file at `dst` under a fresh key.
    fn encrypt(&self, src: &Path, dst: &Path) -> CryptoResult<KeyHandle>;

    /// Decrypt `src` into a new file at `dst`, returning the handle of the
    /// key that authenticated it.
    ///
    /// Fails with an error for which
    /// [`CryptoError::is_authentication_failure`](crate::CryptoError::is_authentication_failure)
    /// holds when no matching key exists or the ciphertext does not verify.
    fn decrypt(&self, src: &Path, dst: &Path) -> CryptoResult<KeyHandle>;
}

impl<T: Cipher + ?Sized> Cipher for std::sync::Arc<T> {
    fn encrypt(&self, src: &Path, dst: &Path) -> CryptoResult<KeyHandle> {
        (**self).encrypt(src, dst)
    }

    fn decrypt(&self, src: &Path, dst: &Path) -> CryptoResult<KeyHandle> {
        (**self).decrypt(src, dst)
    }
}
