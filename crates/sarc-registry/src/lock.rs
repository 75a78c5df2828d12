//! Advisory lock around registry read-modify-write sequences.
//!
//! The registry document is rewritten in full on every mutation, so two
//! processes that load, modify and store interleaved would lose an update.
//! Holding a [`RegistryLock`] for the whole load..store window prevents that
//! between cooperating `sarc` processes.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::{RegistryError, RegistryResult};

/// Interval between lock attempts while another process holds it.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// An exclusive advisory lock on a lock file. Released on drop.
#[derive(Debug)]
pub struct RegistryLock {
    file: File,
    path: PathBuf,
}

impl RegistryLock {
    /// Acquire the lock, polling until `timeout` elapses.
    ///
    /// Fails with [`RegistryError::Locked`] if another process still holds
    /// the lock after `timeout`.
    pub fn acquire(path: &Path, timeout: Duration) -> RegistryResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| RegistryError::io(parent, e))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| RegistryError::io(path, e))?;

        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) if is_contended(&e) => {
                    if start.elapsed() >= timeout {
                        return Err(RegistryError::Locked {
                            path: path.to_path_buf(),
                            waited: start.elapsed(),
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(RegistryError::io(path, e)),
            }
        }

        debug!(path = %path.display(), "registry lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to release registry lock");
        }
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
