use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::key::{KeyHandle, SecretKey};

const KEY_SUFFIX: &str = "key";

/// Key material stored as one hex file per key under the keys root.
///
/// Files are named `<handle>.key` and created with owner-only permissions
/// on unix.
#[derive(Clone, Debug)]
pub struct KeyRing {
    root: PathBuf,
}

impl KeyRing {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the key file for `handle`.
    pub fn path_for(&self, handle: &KeyHandle) -> PathBuf {
        self.root.join(format!("{handle}.{KEY_SUFFIX}"))
    }

    /// Generate and persist a fresh key.
    pub fn generate(&self) -> CryptoResult<(KeyHandle, SecretKey)> {
        fs::create_dir_all(&self.root).map_err(|e| CryptoError::io(&self.root, e))?;
        let key = SecretKey::generate();
        let handle = key.handle();
        let path = self.path_for(&handle);

        let mut file = open_private(&path).map_err(|e| CryptoError::io(&path, e))?;
        if let Err(e) = write_hex(&mut file, &key) {
            if let Err(cleanup) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %cleanup, "failed to remove partial key file");
            }
            return Err(CryptoError::io(&path, e));
        }
        debug!(handle = %handle, "key generated");
        Ok((handle, key))
    }

    /// Load the key for `handle`.
    ///
    /// A missing file is [`CryptoError::KeyNotFound`]; a file whose contents
    /// do not fingerprint to `handle` is [`CryptoError::InvalidKey`].
    pub fn load(&self, handle: &KeyHandle) -> CryptoResult<SecretKey> {
        let path = self.path_for(handle);
        let text = match fs::read_to_string(&path) {
            Ok(text) => Zeroizing::new(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CryptoError::KeyNotFound {
                    handle: handle.to_string(),
                })
            }
            Err(e) => return Err(CryptoError::io(&path, e)),
        };
        let key = SecretKey::from_hex(&text).map_err(|e| CryptoError::InvalidKey {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        if &key.handle() != handle {
            return Err(CryptoError::InvalidKey {
                path,
                reason: "fingerprint does not match file name".into(),
            });
        }
        Ok(key)
    }

    /// Returns `true` if key material for `handle` exists.
    pub fn contains(&self, handle: &KeyHandle) -> bool {
        self.path_for(handle).is_file()
    }

    /// Delete the key for `handle`. Absent keys are ignored.
    pub fn discard(&self, handle: &KeyHandle) {
        let path = self.path_for(handle);
        match fs::remove_file(&path) {
            Ok(()) => debug!(handle = %handle, "key discarded"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to discard key"),
        }
    }
}

fn write_hex(file: &mut fs::File, key: &SecretKey) -> io::Result<()> {
    let hex = key.to_hex();
    file.write_all(hex.as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_all()
}

#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<fs::File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}
