//! Lazytree CLI Binary
//!
//! Command-line interface for the lazy tree data layer.

use anyhow::Context;
use clap::Parser;
use lazytree::config::ConfigLoader;
use lazytree::logging::init_logging;
use lazytree::tooling::cli::{Cli, CliContext};
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(&cli) {
        eprintln!("Warning: {:#}", e);
    }

    let context = match CliContext::new(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error initializing session: {}", e);
            process::exit(1);
        }
    };

    match context.execute(&cli.command).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn setup_logging(cli: &Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(None),
    }
    .context("Failed to load logging configuration")?;
    init_logging(Some(&config.logging)).context("Failed to initialize logging")?;
    Ok(())
}
