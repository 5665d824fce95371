//! Show attributes of matching nodes

use colored::Colorize;

use crate::cli::Select;
use crate::error::Result;

pub fn run_show(select: &Select, brief: bool) -> Result<()> {
    let (tree, names) = super::selected(select)?;
    let mut first = true;
    for name in names {
        let Some(node) = tree.find(&name) else { continue };
        if brief {
            println!("{}", node.name().bold());
            continue;
        }
        if !first {
            println!();
        }
        first = false;
        println!("{}", node.name().bold());
        for (key, value) in node.data() {
            if !select.keys.is_empty() && !select.keys.contains(key) {
                continue;
            }
            println!("{}: {}", key.green(), value);
        }
    }
    Ok(())
}
