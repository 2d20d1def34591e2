//! CLI command definitions
//!
//! Defines the clap commands for the steptree CLI.

use clap::Subcommand;
use std::path::PathBuf;

use crate::common::config::OutputFormat;

#[derive(Subcommand)]
pub enum Commands {
    /// Run scenarios from feature files or directories
    Run {
        /// Feature files or directories to search for `.yaml`/`.yml` files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Tag filter, e.g. "@smoke and not @slow"
        #[arg(long, short)]
        tags: Option<String>,

        /// Report format (default from config: text)
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// Number of scenarios to run at once
        #[arg(long, short)]
        jobs: Option<usize>,

        /// Treat soft failures as a failed run
        #[arg(long)]
        strict: bool,
    },

    /// List the scenarios that would run
    #[command(alias = "ls")]
    List {
        /// Feature files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Tag filter
        #[arg(long, short)]
        tags: Option<String>,
    },

    /// Print each scenario's step tree without running it
    Tree {
        /// Feature files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Tag filter
        #[arg(long, short)]
        tags: Option<String>,
    },

    /// List the built-in step patterns
    Steps,
}
