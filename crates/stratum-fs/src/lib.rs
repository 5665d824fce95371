//! Filesystem and remote-fetch collaborator for stratum
//!
//! Provides the operations the metadata tree needs from the outside
//! world: locked atomic file I/O, a cache directory configuration, and
//! fetching of remote git repositories into that cache.

pub mod cache;
pub mod error;
pub mod fetch;
pub mod io;
pub mod lock;

pub use cache::CacheConfig;
pub use error::{Error, Result};
pub use fetch::fetch;
pub use lock::LockGuard;
