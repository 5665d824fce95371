//! Cache directory configuration
//!
//! The cache location and expiration form an explicit value the caller
//! passes into [`crate::fetch`], so the library carries no process-wide
//! state.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// Environment variable overriding the cache directory.
pub const CACHE_ENV: &str = "STRATUM_CACHE_DIRECTORY";

/// How long a fetched repository stays fresh before `git fetch` runs again.
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(1200);

/// Timeout for the per-destination fetch lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Where and for how long remote repositories are cached.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Cache directory; resolved lazily when not set explicitly.
    pub directory: Option<PathBuf>,
    /// Seconds until a cached clone is refreshed.
    pub expiration: Duration,
    /// Bound on waiting for the per-destination fetch lock.
    pub lock_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: None,
            expiration: DEFAULT_EXPIRATION,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl CacheConfig {
    /// Configuration with an explicit cache directory.
    pub fn with_directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: Some(directory.into()),
            ..Self::default()
        }
    }

    /// Resolve the cache directory, creating it when missing.
    ///
    /// Resolution order: the `STRATUM_CACHE_DIRECTORY` environment
    /// variable, the configured directory, then `$XDG_CACHE_HOME/stratum`
    /// (or its platform equivalent).
    pub fn directory(&self) -> Result<PathBuf> {
        let dir = std::env::var_os(CACHE_ENV)
            .map(PathBuf::from)
            .or_else(|| self.directory.clone())
            .or_else(|| dirs::cache_dir().map(|d| d.join("stratum")))
            .unwrap_or_else(|| PathBuf::from(".stratum-cache"));
        if !dir.is_dir() {
            fs::create_dir_all(&dir).map_err(|e| Error::Cache {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(dir)
    }

    /// Destination directory inside the cache for the given url.
    pub fn destination(&self, url: &str) -> Result<PathBuf> {
        Ok(self.directory()?.join(url.replace('/', "_")))
    }

    /// Delete the whole cache directory if it exists.
    pub fn clean(&self) -> Result<()> {
        let dir = match std::env::var_os(CACHE_ENV)
            .map(PathBuf::from)
            .or_else(|| self.directory.clone())
            .or_else(|| dirs::cache_dir().map(|d| d.join("stratum")))
        {
            Some(dir) => dir,
            None => return Ok(()),
        };
        if dir.is_dir() {
            fs::remove_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
            tracing::debug!(path = %dir.display(), "Cache directory removed");
        }
        Ok(())
    }
}

/// True when the cached clone at `destination` is older than `expiration`.
pub(crate) fn expired(destination: &Path, expiration: Duration) -> bool {
    let fetch_head = destination.join(".git").join("FETCH_HEAD");
    match fetch_head.metadata().and_then(|m| m.modified()) {
        Ok(modified) => match modified.elapsed() {
            Ok(age) => age >= expiration,
            Err(_) => false,
        },
        // Missing FETCH_HEAD means the repository was never fetched
        Err(_) => true,
    }
}
