//! Initialize a new metadata tree

use std::path::Path;

use colored::Colorize;
use stratum_tree::Tree;

use crate::error::Result;

pub fn run_init(path: &Path) -> Result<()> {
    let root = Tree::init(path)?;
    println!(
        "{} metadata tree initialized at {}",
        "ok".green().bold(),
        root.display()
    );
    Ok(())
}
