//! Hierarchical metadata tree
//!
//! A [`Tree`] is grown from nested directories of declarative YAML files
//! (or from an in-memory mapping), combined through top-down inheritance
//! with attribute-level merge operators (`key+`, `key+<`, `key-`,
//! `key-~`, `key~`), and optionally adjusted at load time by rules
//! evaluated against a [`stratum_context::Context`].
//!
//! ```no_run
//! use stratum_tree::Tree;
//! use stratum_context::Context;
//!
//! let mut tree = Tree::from_path(".")?;
//! let context = Context::new().with_dimension("distro", ["centos-8.4.0"]);
//! tree.adjust(&context, &Default::default())?;
//! for node in tree.root().climb(false) {
//!     println!("{}", node.name());
//! }
//! # Ok::<(), stratum_tree::Error>(())
//! ```

pub mod error;
pub mod filter;
pub mod merge;
pub mod node;
pub mod reference;
pub mod storage;
pub mod validate;
pub mod value;
pub mod yaml;

pub use error::{Error, Result};
pub use filter::filter;
pub use node::{AdjustOptions, Decision, Node, PruneOptions, Tree, TreeOptions, Undecided};
pub use reference::TreeId;
pub use validate::{SchemaStore, ValidationError, ValidationResult, validate};
pub use value::{Map, Value};

/// Suffix of metadata files.
pub const SUFFIX: &str = ".fmf";

/// The file holding a node's own data, processed before its siblings.
pub const MAIN: &str = "main.fmf";

/// Current metadata format version.
pub const VERSION: u32 = 1;

/// OS pseudo-directories never worth exploring.
pub const IGNORED_DIRECTORIES: [&str; 3] = ["/dev", "/proc", "/sys"];
