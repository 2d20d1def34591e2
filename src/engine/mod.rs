//! Scenario execution engine
//!
//! [`Engine`] is the top-level driver: it builds a [`StepTree`] for a
//! scenario, walks it with a [`TreeWalker`] and reports what happened.
//! Each call owns its tree and [`ScenarioRunContext`], so one engine can run
//! many scenarios on many threads at once.

pub mod composer;
pub mod conditional;
pub mod controller;
pub mod expression;
pub mod severity;
pub mod walker;

use std::path::Path;
use std::sync::Arc;

use crate::catalog::{ScenarioCatalog, ScenarioDescriptor, StepCatalog};
use crate::common::config::RunConfig;
use crate::common::Result;
use crate::report::ScenarioReport;
use crate::tree::StepTree;

pub use controller::{RunStats, ScenarioRunContext};
pub use expression::{DirectiveEvaluator, ExpressionEvaluator};
pub use severity::{ScenarioSeverity, StepOutcome};
pub use walker::TreeWalker;

/// When a scenario enters its complete state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub stop_on_hard_fail: bool,
    pub stop_on_soft_fail: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            stop_on_hard_fail: true,
            stop_on_soft_fail: false,
        }
    }
}

impl From<&RunConfig> for RunOptions {
    fn from(config: &RunConfig) -> Self {
        Self {
            stop_on_hard_fail: config.stop_on_hard_fail,
            stop_on_soft_fail: config.stop_on_soft_fail,
        }
    }
}

impl RunOptions {
    /// Lowest severity that completes the scenario, if any
    pub fn stop_threshold(&self) -> Option<ScenarioSeverity> {
        if self.stop_on_soft_fail {
            Some(ScenarioSeverity::SoftFail)
        } else if self.stop_on_hard_fail {
            Some(ScenarioSeverity::HardFail)
        } else {
            None
        }
    }
}

/// Builds and runs scenario trees
#[derive(Clone)]
pub struct Engine {
    steps: Arc<dyn StepCatalog>,
    expressions: Arc<dyn ExpressionEvaluator>,
    scenarios: Arc<dyn ScenarioCatalog>,
    options: RunOptions,
}

impl Engine {
    pub fn new(steps: Arc<dyn StepCatalog>, scenarios: Arc<dyn ScenarioCatalog>) -> Self {
        Self {
            steps,
            expressions: Arc::new(DirectiveEvaluator),
            scenarios,
            options: RunOptions::default(),
        }
    }

    pub fn with_expression_evaluator(mut self, expressions: Arc<dyn ExpressionEvaluator>) -> Self {
        self.expressions = expressions;
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> RunOptions {
        self.options
    }

    /// Walk `tree`; returns the final scenario severity
    pub fn run(&self, tree: &mut StepTree, run: &mut ScenarioRunContext) -> ScenarioSeverity {
        TreeWalker::new(
            self.steps.as_ref(),
            self.expressions.as_ref(),
            self.scenarios.as_ref(),
        )
        .walk(tree, run);
        run.severity()
    }

    /// Build the tree of a scenario without running it
    ///
    /// The root is a message node named after the scenario; example data of
    /// an outline is set on the root scope.
    pub fn build_tree(&self, descriptor: &ScenarioDescriptor) -> Result<StepTree> {
        let mut tree = StepTree::new(descriptor.title());
        let root = tree.root();
        tree.node_mut(root).tags = descriptor.tags.clone();
        if let Some(data) = &descriptor.example_data {
            let scope = tree.root_context();
            for (key, value) in data {
                tree.contexts_mut().set(scope, key, value);
            }
        }
        tree.graft_steps(root, &descriptor.steps)?;
        Ok(tree)
    }

    /// Build, run and report one scenario
    pub fn run_scenario(&self, descriptor: &ScenarioDescriptor) -> Result<ScenarioReport> {
        let mut tree = self.build_tree(descriptor)?;
        let base_dir = descriptor.source.parent().unwrap_or(Path::new("."));
        let mut run = ScenarioRunContext::new(descriptor.title(), self.options).with_base_dir(base_dir);

        tracing::info!(scenario = %run.scenario(), source = %descriptor.source.display(), "running scenario");
        let severity = self.run(&mut tree, &mut run);
        tracing::info!(
            scenario = %run.scenario(),
            severity = %severity,
            passed = run.stats().passed,
            skipped = run.stats().skipped,
            "scenario finished"
        );

        Ok(ScenarioReport::from_run(descriptor, &tree, &run))
    }
}
