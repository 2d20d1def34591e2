//! Run/skip gating and severity escalation
//!
//! All per-scenario mutable state lives in [`ScenarioRunContext`], which the
//! walker threads through every call. Nothing here is global.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::tree::{ExecutionFlag, NodeId, StepNode, StepTree};

use super::severity::{ScenarioSeverity, StepOutcome};
use super::RunOptions;

/// Counters kept while a scenario runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub passed: usize,
    pub soft_failed: usize,
    pub hard_failed: usize,
    pub skipped: usize,
}

impl RunStats {
    /// Nodes that actually ran
    pub fn run(&self) -> usize {
        self.passed + self.soft_failed + self.hard_failed
    }
}

/// State of one scenario run
#[derive(Debug, Clone)]
pub struct ScenarioRunContext {
    scenario: String,
    base_dir: PathBuf,
    options: RunOptions,
    severity: ScenarioSeverity,
    complete: bool,
    stats: RunStats,
    log: Vec<String>,
}

impl ScenarioRunContext {
    pub fn new(scenario: impl Into<String>, options: RunOptions) -> Self {
        Self {
            scenario: scenario.into(),
            base_dir: PathBuf::from("."),
            options,
            severity: ScenarioSeverity::None,
            complete: false,
            stats: RunStats::default(),
            log: Vec::new(),
        }
    }

    /// Directory relative feature paths are resolved against
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn severity(&self) -> ScenarioSeverity {
        self.severity
    }

    /// Whether the scenario reached its early-exit state
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Put the scenario in its early-exit state
    ///
    /// Remaining nodes are still visited but only those whose flags allow it
    /// run.
    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn push_log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    /// Raise the severity; returns whether it changed
    pub fn escalate(&mut self, severity: ScenarioSeverity) -> bool {
        let escalated = self.severity.escalate(severity);
        let changed = escalated != self.severity;
        self.severity = escalated;
        changed
    }
}

/// Decide whether a node runs
///
/// `RUN_IF_SCENARIO_FAILED`, `..._SOFT_FAILED` and `..._HARD_FAILED` look at
/// the scenario severity. `RUN_IF_SCENARIO_PASSING` looks at the node's own
/// recorded outcome, so a node that has not failed runs even when the
/// scenario as a whole has soft-failed.
pub fn should_run(node: &StepNode, run: &ScenarioRunContext) -> bool {
    if node.parent().is_none() {
        return true;
    }
    if node.has_flag(ExecutionFlag::AlwaysRun) {
        return true;
    }
    if node.has_flag(ExecutionFlag::RunIfScenarioFailed) {
        return run.severity() != ScenarioSeverity::None;
    }
    if node.has_flag(ExecutionFlag::RunIfScenarioSoftFailed) {
        return run.severity() == ScenarioSeverity::SoftFail;
    }
    if node.has_flag(ExecutionFlag::RunIfScenarioHardFailed) {
        return run.severity() == ScenarioSeverity::HardFail;
    }
    if node.has_flag(ExecutionFlag::RunIfScenarioPassing) {
        return !node.is_soft_failed() && !node.is_hard_failed();
    }
    !run.is_complete()
}

/// Record a node's outcome and escalate the scenario severity
///
/// Every node that ran escalates the scenario, completed or not, unless it
/// carries `IGNORE_FAILURES`. Completion only gates which nodes run.
pub fn settle(tree: &mut StepTree, id: NodeId, outcome: StepOutcome, run: &mut ScenarioRunContext) {
    match outcome {
        StepOutcome::Passed => run.stats.passed += 1,
        StepOutcome::SoftFailed(_) => run.stats.soft_failed += 1,
        StepOutcome::HardFailed(_) => run.stats.hard_failed += 1,
        StepOutcome::Skipped => run.stats.skipped += 1,
    }

    let severity = outcome.severity();
    let ignored = tree.node(id).has_flag(ExecutionFlag::IgnoreFailures);
    if severity != ScenarioSeverity::None && !ignored {
        if run.escalate(severity) {
            tracing::info!(
                scenario = %run.scenario,
                node = %id,
                severity = %run.severity,
                "scenario severity escalated"
            );
        }
        if let Some(threshold) = run.options.stop_threshold() {
            if run.severity >= threshold {
                run.mark_complete();
            }
        }
    }

    tree.record_outcome(id, outcome);
}
