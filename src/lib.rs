//! steptree - a tree-structured step execution engine for BDD scenarios
//!
//! Scenario steps are arranged into a tree by their nesting markers and
//! walked depth-first. Conditional directives gate or replace branches,
//! execution flags decide what still runs once a scenario has failed, and
//! composer directives graft other scenarios in as subtrees.

pub mod catalog;
pub mod cli;
pub mod commands;
pub mod common;
pub mod engine;
pub mod report;
pub mod testing;
pub mod tree;

// Re-export commonly used types for tests
pub use catalog::{FileScenarioCatalog, ScenarioCatalog, ScenarioDescriptor, StepCatalog, StepRegistry};
pub use common::{Error, Result};
pub use engine::{Engine, RunOptions, ScenarioRunContext, ScenarioSeverity, StepOutcome};
pub use report::ScenarioReport;
pub use tree::{NodeId, NodeKind, StepSource, StepTree};
