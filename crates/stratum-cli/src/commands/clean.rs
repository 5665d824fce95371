//! Remove cached remote trees

use colored::Colorize;
use stratum_fs::CacheConfig;

use crate::error::Result;

pub fn run_clean() -> Result<()> {
    let cache = CacheConfig::default();
    cache.clean()?;
    println!("{} cache directory removed", "ok".green().bold());
    Ok(())
}
