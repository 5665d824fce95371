//! List names of matching nodes

use crate::cli::Select;
use crate::error::Result;

pub fn run_ls(select: &Select) -> Result<()> {
    let (_, names) = super::selected(select)?;
    for name in names {
        println!("{name}");
    }
    Ok(())
}
