//! Stratum CLI
//!
//! The command-line interface for exploring metadata trees.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing if verbose
    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
        tracing::debug!("Verbose mode enabled");
    }

    match cli.command {
        Some(Commands::Ls { select }) => commands::run_ls(&select),
        Some(Commands::Show { select, brief }) => commands::run_show(&select, brief),
        Some(Commands::Init { path }) => commands::run_init(&path),
        Some(Commands::Clean) => commands::run_clean(),
        None => {
            println!("{} Metadata tree explorer", "stratum".green().bold());
            println!();
            println!("Run {} for available commands.", "stratum --help".cyan());
            Ok(())
        }
    }
}
