//! Fetching remote repositories into the cache
//!
//! A remote tree is cloned once into a destination keyed by its url and
//! refreshed only when the cached copy has expired. The whole operation
//! runs under a destination-keyed [`LockGuard`], so concurrent callers
//! fetching the same url serialize: the second caller waits, then finds
//! the completed clone and returns it without restarting the fetch.

use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use git2::Repository;

use crate::cache::{self, CacheConfig};
use crate::{Error, LockGuard, Result};

/// Fetch a remote git repository into the cache and return its local path.
///
/// `git_ref` may be a branch, tag or commit; the remote default branch is
/// used when it is `None`. Transport and checkout failures surface as
/// `Error::Fetch`; failing to acquire the per-destination lock within the
/// configured timeout is `Error::LockTimeout`.
pub fn fetch(url: &str, git_ref: Option<&str>, config: &CacheConfig) -> Result<PathBuf> {
    let destination = config.destination(url)?;

    tracing::debug!(url, destination = %destination.display(), "Acquiring fetch lock");
    let _lock = LockGuard::acquire(&destination, config.lock_timeout)?;

    let repo = if destination.join(".git").is_dir() {
        Repository::open(&destination).map_err(|e| Error::fetch(url, e.message()))?
    } else {
        tracing::debug!(url, "Cloning repository");
        Repository::clone(url, &destination).map_err(|e| Error::fetch(url, e.message()))?
    };

    // Refresh only when the cached copy is too old
    if cache::expired(&destination, config.expiration) {
        tracing::debug!(url, "Refreshing cached repository");
        let mut remote = repo
            .find_remote("origin")
            .map_err(|e| Error::fetch(url, e.message()))?;
        remote
            .fetch(&[] as &[&str], None, None)
            .map_err(|e| Error::fetch(url, e.message()))?;
    }

    let reference = match git_ref {
        Some(reference) => reference.to_string(),
        None => default_branch(&repo).map_err(|e| Error::fetch(url, e.message()))?,
    };
    checkout(&repo, &reference).map_err(|e| Error::fetch(url, e.message()))?;

    Ok(destination)
}

/// Detect the default branch of the origin remote.
///
/// Falls back to the local HEAD shorthand when the remote HEAD reference
/// is not available (fresh clones always point HEAD at the default).
fn default_branch(repo: &Repository) -> std::result::Result<String, git2::Error> {
    if let Ok(head) = repo.find_reference("refs/remotes/origin/HEAD") {
        if let Some(target) = head.symbolic_target() {
            // The ref format is 'refs/remotes/origin/main'
            return Ok(target.rsplit('/').next().unwrap_or(target).to_string());
        }
    }
    let head = repo.head()?;
    Ok(head.shorthand().unwrap_or("HEAD").to_string())
}

/// Force-checkout a branch, tag or commit.
fn checkout(repo: &Repository, reference: &str) -> std::result::Result<(), git2::Error> {
    // Prefer the remote-tracking branch so a stale local branch never wins
    let object = repo
        .revparse_single(&format!("origin/{reference}"))
        .or_else(|_| repo.revparse_single(reference))?;
    let mut builder = CheckoutBuilder::new();
    builder.force();
    repo.checkout_tree(&object, Some(&mut builder))?;
    repo.set_head_detached(object.id())?;
    Ok(())
}

/// True when the path contains a git repository.
pub fn is_repository(path: &Path) -> bool {
    path.join(".git").is_dir()
}

/// HEAD commit hash of the repository containing `path`, if any.
pub fn head_commit(path: &Path) -> Option<String> {
    let repo = Repository::discover(path).ok()?;
    let head = repo.head().ok()?;
    head.peel_to_commit().ok().map(|c| c.id().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fetch_invalid_url_fails() {
        let temp = TempDir::new().unwrap();
        let config = CacheConfig::with_directory(temp.path());
        let result = fetch("/nonexistent/repository", None, &config);
        assert!(matches!(result, Err(Error::Fetch { .. })));
    }

    #[test]
    fn test_head_commit_outside_repository() {
        let temp = TempDir::new().unwrap();
        assert_eq!(head_commit(temp.path()), None);
    }

    #[test]
    fn test_fetch_local_repository() {
        // A local path works as a url for git, which keeps the test offline
        let origin = TempDir::new().unwrap();
        let repo = Repository::init(origin.path()).unwrap();
        let sig = git2::Signature::now("test", "test@example.com").unwrap();
        std::fs::write(origin.path().join("main.fmf"), "key: value\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("main.fmf")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();

        let cache = TempDir::new().unwrap();
        let config = CacheConfig::with_directory(cache.path());
        let url = origin.path().to_string_lossy().into_owned();
        let fetched = fetch(&url, None, &config).unwrap();
        assert!(fetched.join("main.fmf").is_file());

        // Second call is idempotent and observes the completed fetch
        let again = fetch(&url, None, &config).unwrap();
        assert_eq!(fetched, again);
    }
}
