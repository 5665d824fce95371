//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Stratum - Explore and manage metadata trees
#[derive(Parser, Debug)]
#[command(name = "stratum")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Node selection shared by the exploration commands
#[derive(Args, Debug, Clone, Default)]
pub struct Select {
    /// Path to the metadata tree (any directory inside it)
    #[arg(short, long, default_value = ".")]
    pub path: PathBuf,

    /// Regular expression node names must match (repeatable)
    #[arg(short, long = "name")]
    pub names: Vec<String>,

    /// Attribute keys which must be present (repeatable)
    #[arg(short, long = "key")]
    pub keys: Vec<String>,

    /// Filter expressions, e.g. 'tier: 1 & tag: -slow' (repeatable)
    #[arg(short, long = "filter")]
    pub filters: Vec<String>,

    /// Consider all nodes, not just the selected ones
    #[arg(short, long)]
    pub whole: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List names of matching nodes
    ///
    /// Examples:
    ///   stratum ls                     # All selected nodes
    ///   stratum ls --key test          # Nodes defining a 'test' key
    ///   stratum ls --filter 'tier: 1'  # Tier-one nodes only
    Ls {
        #[command(flatten)]
        select: Select,
    },

    /// Show attributes of matching nodes
    ///
    /// With --key, node selection and displayed attributes are both
    /// restricted to the given keys.
    Show {
        #[command(flatten)]
        select: Select,

        /// Show node names only
        #[arg(short, long)]
        brief: bool,
    },

    /// Initialize a new metadata tree
    Init {
        /// Directory to become the tree root
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Remove cached remote trees
    Clean,
}
