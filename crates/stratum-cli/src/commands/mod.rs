//! Command implementations for stratum-cli

pub mod clean;
pub mod init;
pub mod ls;
pub mod show;

pub use clean::run_clean;
pub use init::run_init;
pub use ls::run_ls;
pub use show::run_show;

use stratum_tree::{Node, PruneOptions, Tree};

use crate::cli::Select;
use crate::error::Result;

/// Load the tree and collect the nodes the selection matches.
pub(crate) fn selected(select: &Select) -> Result<(Tree, Vec<String>)> {
    let tree = Tree::from_path(&select.path)?;
    let options = PruneOptions {
        whole: select.whole,
        keys: select.keys.clone(),
        names: select.names.clone(),
        filters: select.filters.clone(),
        ..Default::default()
    };
    let names = tree
        .root()
        .prune(&options)?
        .into_iter()
        .map(|node: &Node| node.name().to_string())
        .collect();
    Ok((tree, names))
}
