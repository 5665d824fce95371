//! Error types for stratum-tree

use std::path::PathBuf;

/// Result type for stratum-tree operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or using a metadata tree
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unable to find tree root for '{path}'")]
    RootNotFound { path: PathBuf },

    #[error("Metadata format error: {0}")]
    Format(String),

    #[error("Failed to read '{path}': {message}")]
    File { path: PathBuf, message: String },

    #[error("Merge failed: key '{key}' in {node}{detail}")]
    Merge {
        key: String,
        node: String,
        detail: String,
    },

    #[error("No tree node found for '{0}' reference")]
    ReferenceNotFound(String),

    #[error("Invalid filter: {0}")]
    Filter(String),

    #[error("Invalid schema: {0}")]
    Schema(String),

    #[error(transparent)]
    Context(#[from] stratum_context::ContextError),

    #[error(transparent)]
    Fs(#[from] stratum_fs::Error),
}

impl Error {
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    pub fn file(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::File {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn merge(key: impl Into<String>, node: impl Into<String>, detail: &str) -> Self {
        Self::Merge {
            key: key.into(),
            node: node.into(),
            detail: if detail.is_empty() {
                String::new()
            } else {
                format!(" ({detail})")
            },
        }
    }

    /// True for the undecidable-rule signal surfaced by `adjust` under
    /// the raise policy.
    pub fn is_cannot_decide(&self) -> bool {
        matches!(
            self,
            Self::Context(stratum_context::ContextError::CannotDecide(_))
        )
    }
}
