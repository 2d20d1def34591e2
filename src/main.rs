//! steptree - run tree-structured BDD scenarios
//!
//! Loads YAML feature files, builds a step tree per scenario and walks it,
//! honouring conditional directives, execution flags and scenario
//! composition.

use std::path::PathBuf;

use clap::Parser;
use steptree::common::{config::Config, logging};
use steptree::{cli, commands};
use commands::Commands;

#[derive(Parser)]
#[command(name = "steptree", about = "Tree-structured BDD scenario runner")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init_cli(cli.verbose);

    let result = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let result = match result {
        Ok(config) => cli::dispatch(cli.command, &config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
