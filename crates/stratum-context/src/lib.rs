//! Context rule language and tri-valued evaluator
//!
//! A [`Context`] describes the runtime environment as a set of named
//! dimensions (`distro`, `arch`, ...), each holding one or more
//! [`ContextValue`]s. Rules such as `distro == centos-8 and arch != s390x`
//! are evaluated against it with three possible outcomes: true, false, or
//! "cannot decide" (a referenced dimension is missing or the operands are
//! incomparable). Undecidability is a valid steady state of the language,
//! surfaced as [`ContextError::CannotDecide`] and handled by the caller.

pub mod context;
pub mod error;
pub mod parser;
pub mod value;

pub use context::Context;
pub use error::{ContextError, Result};
pub use parser::{Expression, Operator, Rule, parse_rule};
pub use value::ContextValue;
