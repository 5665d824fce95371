//! Error types for stratum-context

/// Result type for stratum-context operations
pub type Result<T> = std::result::Result<T, ContextError>;

/// Errors that can occur while parsing or evaluating context rules
///
/// `CannotDecide` is not a failure in the usual sense: it is the third
/// state of the rule language, raised when the whole rule cannot be
/// decided against the current context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("Cannot decide: {0}")]
    CannotDecide(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Invalid context: {0}")]
    InvalidContext(String),
}

impl ContextError {
    pub(crate) fn undecided(message: impl Into<String>) -> Self {
        Self::CannotDecide(message.into())
    }

    pub(crate) fn invalid_rule(message: impl Into<String>) -> Self {
        Self::InvalidRule(message.into())
    }
}
