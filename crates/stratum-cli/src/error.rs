//! Error types for stratum-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from stratum-tree
    #[error(transparent)]
    Tree(#[from] stratum_tree::Error),

    /// Error from stratum-fs
    #[error(transparent)]
    Fs(#[from] stratum_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
