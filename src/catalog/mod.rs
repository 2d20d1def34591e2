//! Step and scenario catalogs
//!
//! The engine consumes two lookups: a [`StepCatalog`] turning step text into
//! a runnable action, and a [`ScenarioCatalog`] answering composer queries.
//! Both are traits so embedders can bring their own; [`StepRegistry`] and
//! [`FileScenarioCatalog`] are the defaults used by the CLI.

pub mod scenarios;
pub mod steps;
pub mod tags;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::common::Result;
use crate::engine::ScenarioRunContext;
use crate::tree::{ContextId, ContextStore, StepSource};

pub use scenarios::FileScenarioCatalog;
pub use steps::StepRegistry;
pub use tags::TagFilter;

/// Resolves step text to an action
pub trait StepCatalog: Send + Sync {
    /// `None` when no definition matches; the walker reports it as an
    /// undefined step
    fn resolve(&self, text: &str) -> Option<ResolvedStep>;
}

/// Something a step runs
pub trait StepAction: Send + Sync {
    fn run(&self, args: &[String], cx: &mut ActionContext<'_>) -> Result<()>;
}

impl<F> StepAction for F
where
    F: Fn(&[String], &mut ActionContext<'_>) -> Result<()> + Send + Sync,
{
    fn run(&self, args: &[String], cx: &mut ActionContext<'_>) -> Result<()> {
        self(args, cx)
    }
}

/// A step matched against a catalog definition
#[derive(Clone)]
pub struct ResolvedStep {
    /// Pattern of the definition that matched
    pub pattern: String,
    /// Captured arguments, in order
    pub args: Vec<String>,
    pub action: Arc<dyn StepAction>,
}

impl ResolvedStep {
    pub fn run(&self, cx: &mut ActionContext<'_>) -> Result<()> {
        self.action.run(&self.args, cx)
    }
}

impl fmt::Debug for ResolvedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedStep")
            .field("pattern", &self.pattern)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// What an action may touch while it runs
pub struct ActionContext<'a> {
    pub(crate) contexts: &'a mut ContextStore,
    pub(crate) scope: ContextId,
    pub(crate) scenario_scope: ContextId,
    pub(crate) run: &'a mut ScenarioRunContext,
    pub(crate) table: &'a [Vec<String>],
}

impl<'a> ActionContext<'a> {
    pub fn new(
        contexts: &'a mut ContextStore,
        scope: ContextId,
        scenario_scope: ContextId,
        run: &'a mut ScenarioRunContext,
        table: &'a [Vec<String>],
    ) -> Self {
        Self {
            contexts,
            scope,
            scenario_scope,
            run,
            table,
        }
    }

    /// Value visible from the step's scope
    pub fn get(&self, key: &str) -> Option<&str> {
        self.contexts.get(self.scope, key)
    }

    /// Set a value visible to this step and its children
    pub fn set_local(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.contexts.set(self.scope, key, value);
    }

    /// Set a value visible to the whole scenario
    pub fn set_scenario(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.contexts.set(self.scenario_scope, key, value);
    }

    /// Record a line in the scenario log
    pub fn log(&mut self, line: impl Into<String>) {
        let line = line.into();
        tracing::info!(scenario = %self.run.scenario(), "{}", line);
        self.run.push_log(line);
    }

    /// Stop running ordinary steps for the rest of the scenario
    pub fn end_scenario(&mut self) {
        self.run.mark_complete();
    }

    /// Data table attached to the step
    pub fn table(&self) -> &[Vec<String>] {
        self.table
    }
}

/// Answers composer queries
pub trait ScenarioCatalog: Send + Sync {
    /// Scenarios in `feature_paths` whose tags match `tag_filter`
    fn find(&self, tag_filter: &str, feature_paths: &[PathBuf]) -> Result<Vec<ScenarioDescriptor>>;
}

/// One runnable scenario as loaded from a feature file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioDescriptor {
    pub name: String,
    /// `Scenario` or `Scenario Outline`
    pub keyword: String,
    pub tags: BTreeSet<String>,
    pub steps: Vec<StepSource>,
    /// Example row of an outline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example_data: Option<BTreeMap<String, String>>,
    /// Feature file the scenario came from
    pub source: PathBuf,
}

impl ScenarioDescriptor {
    /// `Keyword: name`, the text of the node a scenario is rooted at
    pub fn title(&self) -> String {
        format!("{}: {}", self.keyword, self.name)
    }
}
