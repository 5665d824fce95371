//! Tree identifiers
//!
//! A [`TreeId`] names a node across repositories: an optional git
//! `url` and `ref`, a `path` inside the repository (or an absolute
//! local path), and the node `name`. Remote trees are fetched into the
//! local cache before being grown.

use std::path::PathBuf;

use stratum_fs::CacheConfig;

use crate::node::Tree;
use crate::value::{Map, Value};
use crate::{Error, Result};

/// Identifier of one tree node, possibly in a remote repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeId {
    pub url: Option<String>,
    pub git_ref: Option<String>,
    pub path: Option<String>,
    pub name: String,
}

impl TreeId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            url: None,
            git_ref: None,
            path: None,
            name: name.into(),
        }
    }

    /// Build an identifier from a mapping with `url`, `ref`, `path`
    /// and `name` keys, all optional, all strings.
    pub fn from_map(map: &Map) -> Result<Self> {
        let field = |key: &str| -> Result<Option<String>> {
            match map.get(key) {
                None => Ok(None),
                Some(Value::String(value)) => Ok(Some(value.clone())),
                Some(other) => Err(Error::format(format!(
                    "Identifier key '{key}' must be a string, got {}.",
                    other.type_name()
                ))),
            }
        };
        Ok(Self {
            url: field("url")?,
            git_ref: field("ref")?,
            path: field("path")?,
            name: field("name")?.unwrap_or_else(|| "/".to_string()),
        })
    }
}

impl Tree {
    /// Build the tree an identifier points into, fetching the
    /// repository first when the identifier carries a url.
    ///
    /// The named node must exist in the resulting tree; look it up
    /// with [`Tree::find`] afterwards.
    pub fn from_reference(id: &TreeId, cache: &CacheConfig) -> Result<Self> {
        let root = match &id.url {
            Some(url) => {
                let repository = stratum_fs::fetch(url, id.git_ref.as_deref(), cache)?;
                match &id.path {
                    Some(path) => repository.join(path.trim_start_matches('/')),
                    None => repository,
                }
            }
            None => {
                let Some(path) = &id.path else {
                    return Err(Error::format(
                        "Identifier needs a url or a path to locate the tree.",
                    ));
                };
                let path = PathBuf::from(path);
                if !path.is_absolute() {
                    return Err(Error::format(format!(
                        "Relative path '{}' cannot be used without a url.",
                        path.display()
                    )));
                }
                path
            }
        };
        let tree = Tree::from_path(root)?;
        if tree.find(&id.name).is_none() {
            return Err(Error::ReferenceNotFound(id.name.clone()));
        }
        Ok(tree)
    }
}
