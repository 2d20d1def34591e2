//! Scenario runner implementation
//!
//! Discovers scenarios in feature files, runs each on a blocking worker
//! thread and prints coloured or JSON reports. Trees are never shared
//! between workers; only the scenario catalog cache is.

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::catalog::{FileScenarioCatalog, ScenarioDescriptor, StepRegistry, TagFilter};
use crate::common::config::{Config, OutputFormat};
use crate::common::{Error, Result};
use crate::engine::{Engine, RunOptions, ScenarioSeverity, StepOutcome};
use crate::report::ScenarioReport;

/// Effective settings of one `run` invocation
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub tags: Option<String>,
    pub format: OutputFormat,
    pub jobs: usize,
    pub strict: bool,
    pub options: RunOptions,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tags: config.run.tags.clone(),
            format: config.output.format,
            jobs: config.run.jobs,
            strict: config.output.strict,
            options: RunOptions::from(&config.run),
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub soft_failed: usize,
    pub failed: usize,
    pub reports: Vec<ScenarioReport>,
}

impl RunSummary {
    pub fn from_reports(reports: Vec<ScenarioReport>) -> Self {
        let count = |severity: ScenarioSeverity| reports.iter().filter(|r| r.severity == severity).count();
        let passed = count(ScenarioSeverity::None);
        let soft_failed = count(ScenarioSeverity::SoftFail);
        let failed = count(ScenarioSeverity::HardFail);
        Self {
            total: reports.len(),
            passed,
            soft_failed,
            failed,
            reports,
        }
    }

    /// Whether the run counts as a success; `strict` fails on soft failures
    pub fn is_success(&self, strict: bool) -> bool {
        self.failed == 0 && (!strict || self.soft_failed == 0)
    }

    /// Scenarios that make the run unsuccessful
    pub fn failures(&self, strict: bool) -> usize {
        if strict {
            self.failed + self.soft_failed
        } else {
            self.failed
        }
    }
}

/// Scenarios under `paths` matching the tag filter
pub fn discover(
    catalog: &FileScenarioCatalog,
    paths: &[PathBuf],
    tags: Option<&str>,
) -> Result<Vec<ScenarioDescriptor>> {
    let filter = TagFilter::parse(tags.unwrap_or_default())?;
    catalog.select(&filter, paths)
}

/// Run scenarios with at most `jobs` in flight; reports keep input order
pub async fn run_scenarios(
    engine: Engine,
    scenarios: Vec<ScenarioDescriptor>,
    jobs: usize,
) -> Result<Vec<ScenarioReport>> {
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    let mut tasks = JoinSet::new();
    let total = scenarios.len();

    for (index, scenario) in scenarios.into_iter().enumerate() {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| Error::Internal(format!("Scenario queue closed: {}", e)))?;
        let engine = engine.clone();
        tasks.spawn_blocking(move || {
            let _permit = permit;
            (index, engine.run_scenario(&scenario))
        });
    }

    let mut slots: Vec<Option<ScenarioReport>> = (0..total).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (index, report) =
            joined.map_err(|e| Error::Internal(format!("Scenario worker failed: {}", e)))?;
        slots[index] = Some(report?);
    }
    Ok(slots.into_iter().flatten().collect())
}

/// Discover and run every matching scenario under `paths`
pub async fn run_paths(paths: &[PathBuf], settings: &RunSettings) -> Result<RunSummary> {
    let catalog = Arc::new(FileScenarioCatalog::new());
    let scenarios = discover(&catalog, paths, settings.tags.as_deref())?;
    tracing::info!(count = scenarios.len(), jobs = settings.jobs, "scenarios discovered");

    let engine = Engine::new(Arc::new(StepRegistry::with_builtins()?), catalog)
        .with_options(settings.options);
    let reports = run_scenarios(engine, scenarios, settings.jobs).await?;
    Ok(RunSummary::from_reports(reports))
}

/// Print one scenario report as a coloured tree
pub fn print_report(report: &ScenarioReport) {
    println!(
        "\n{} {}",
        "Running:".blue().bold(),
        report.scenario.white().bold()
    );
    println!("  {}", report.source.display().to_string().dimmed());

    for node in report.nodes.iter().skip(1) {
        let indent = "  ".repeat(node.depth);
        let text = node.text.as_str();
        match &node.outcome {
            Some(StepOutcome::Passed) => println!("{}{} {}", indent, "✓".green(), text),
            Some(StepOutcome::SoftFailed(message)) => {
                println!("{}{} {}", indent, "~".yellow(), text);
                println!("{}  {}", indent, message.yellow());
            }
            Some(StepOutcome::HardFailed(message)) => {
                println!("{}{} {}", indent, "✗".red(), text);
                println!("{}  {}", indent, message.red());
            }
            Some(StepOutcome::Skipped) => println!("{}{} {}", indent, "-".dimmed(), text.dimmed()),
            None => println!("{}  {}", indent, text),
        }
    }

    if !report.log.is_empty() {
        println!("\n  {}", "Log:".cyan());
        for line in &report.log {
            println!("    {}", line.dimmed());
        }
    }

    match report.severity {
        ScenarioSeverity::None => println!("\n{} {}", "✓".green().bold(), "Passed".green().bold()),
        ScenarioSeverity::SoftFail => {
            println!("\n{} {}", "~".yellow().bold(), "Soft failed".yellow().bold())
        }
        ScenarioSeverity::HardFail => println!("\n{} {}", "✗".red().bold(), "Failed".red().bold()),
    }
    println!(
        "  {}",
        format!("{} step(s) run, {} skipped", report.stats.run(), report.stats.skipped).dimmed()
    );
}

pub fn print_summary(summary: &RunSummary) {
    println!(
        "\n{} {} scenario(s): {} passed, {} soft-failed, {} failed",
        "Summary:".blue().bold(),
        summary.total,
        summary.passed.to_string().green(),
        summary.soft_failed.to_string().yellow(),
        summary.failed.to_string().red()
    );
}

/// Print a run in the configured format
pub fn print_run(summary: &RunSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            if summary.total == 0 {
                println!("{}", "No scenarios matched".yellow());
                return Ok(());
            }
            for report in &summary.reports {
                print_report(report);
            }
            print_summary(summary);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
    }
    Ok(())
}
