//! Bounded advisory file locking
//!
//! A `LockGuard` serializes access to a destination path between
//! processes. Acquisition polls `try_lock_exclusive` until a deadline so
//! that a stuck holder surfaces as `Error::LockTimeout` instead of a
//! silent hang. The lock file lives next to the guarded destination and
//! records the holder's PID for post-mortem inspection.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::{Error, Result};

/// Suffix appended to the guarded path to form the lock file path.
pub const LOCK_SUFFIX: &str = ".lock";

/// Interval between lock acquisition attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// An exclusive advisory lock held for the lifetime of the guard.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Acquire an exclusive lock guarding `destination`.
    ///
    /// The lock file is `<destination>.lock`. Returns
    /// `Error::LockTimeout` when the lock cannot be acquired within
    /// `timeout`.
    pub fn acquire(destination: &Path, timeout: Duration) -> Result<Self> {
        let lock_path = lock_path_for(destination);
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| Error::io(&lock_path, e))?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(_) if Instant::now() < deadline => {
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(_) => {
                    return Err(Error::LockTimeout {
                        path: lock_path,
                        timeout,
                    });
                }
            }
        }

        // Record the holder's PID, failures here are not fatal
        let _ = write!(file, "{}", std::process::id());
        tracing::debug!(path = %lock_path.display(), "Lock acquired");

        Ok(Self {
            file,
            path: lock_path,
        })
    }

    /// Path of the lock file itself.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.file.unlock().is_err() {
            tracing::warn!(path = %self.path.display(), "Failed to release lock");
        }
    }
}

/// Lock file path guarding the given destination.
pub fn lock_path_for(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());
    name.push_str(LOCK_SUFFIX);
    destination.with_file_name(name)
}
