//! CLI command handling
//!
//! Dispatches CLI commands to the engine and formats output.

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;

use crate::catalog::{FileScenarioCatalog, ScenarioDescriptor, StepRegistry};
use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::engine::Engine;
use crate::report::render_tree;
use crate::testing::{self, RunSettings};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Run {
            paths,
            tags,
            format,
            jobs,
            strict,
        } => {
            let mut settings = RunSettings::from_config(config);
            if tags.is_some() {
                settings.tags = tags;
            }
            if let Some(format) = format {
                settings.format = format;
            }
            if let Some(jobs) = jobs {
                if jobs == 0 {
                    return Err(Error::Config("--jobs must be at least 1".to_string()));
                }
                settings.jobs = jobs;
            }
            settings.strict |= strict;

            let summary = testing::run_paths(&paths, &settings).await?;
            testing::print_run(&summary, settings.format)?;

            if summary.is_success(settings.strict) {
                Ok(())
            } else {
                Err(Error::ScenariosFailed {
                    failed: summary.failures(settings.strict),
                    total: summary.total,
                })
            }
        }

        Commands::List { paths, tags } => {
            let scenarios = discover(&paths, tags, config)?;
            if scenarios.is_empty() {
                println!("No scenarios matched");
                return Ok(());
            }

            println!("Scenarios:");
            for scenario in &scenarios {
                print_scenario_line(scenario);
            }
            println!("\n{} scenario(s)", scenarios.len());
            Ok(())
        }

        Commands::Tree { paths, tags } => {
            let scenarios = discover(&paths, tags, config)?;
            let engine = Engine::new(
                Arc::new(StepRegistry::with_builtins()?),
                Arc::new(FileScenarioCatalog::new()),
            );

            for scenario in &scenarios {
                let tree = engine.build_tree(scenario)?;
                println!("{}", scenario.source.display().to_string().dimmed());
                print!("{}", render_tree(&tree));
                println!();
            }
            Ok(())
        }

        Commands::Steps => {
            let registry = StepRegistry::with_builtins()?;
            println!("Built-in steps:");
            for (pattern, description) in registry.patterns() {
                println!("  {}", pattern.cyan());
                println!("      {}", description.dimmed());
            }
            Ok(())
        }
    }
}

fn discover(paths: &[PathBuf], tags: Option<String>, config: &Config) -> Result<Vec<ScenarioDescriptor>> {
    let catalog = FileScenarioCatalog::new();
    let tags = tags.or_else(|| config.run.tags.clone());
    testing::discover(&catalog, paths, tags.as_deref())
}

fn print_scenario_line(scenario: &ScenarioDescriptor) {
    let tags: Vec<String> = scenario.tags.iter().map(|t| format!("@{}", t)).collect();
    if tags.is_empty() {
        println!("  {}", scenario.title());
    } else {
        println!("  {} {}", scenario.title(), tags.join(" ").dimmed());
    }
    println!("      {}", scenario.source.display().to_string().dimmed());
}
