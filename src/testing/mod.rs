//! Feature files and the scenario runner
//!
//! Reads YAML feature files into scenario descriptors and runs them
//! through the engine, several at a time.

mod config;
mod runner;

pub use config::*;
pub use runner::{
    discover, print_report, print_run, print_summary, run_paths, run_scenarios, RunSettings,
    RunSummary,
};
