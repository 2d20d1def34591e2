//! Step tree: nodes, their structure and their data contexts
//!
//! The tree is built from a flat, nesting-annotated step list and then
//! mutated while it is walked: conditionals insert replacement siblings,
//! templates are swapped for their resolved copies and composer directives
//! graft whole scenarios as children.

pub mod context;
pub mod metadata;
pub mod node;
mod store;

use serde::Serialize;

pub use context::{ContextId, ContextStore};
pub use node::{ConditionalState, ExecutionFlag, NodeId, NodeKind, StepNode};
pub use store::StepTree;

use crate::common::Result;

/// One step of a flat step list, in encoded form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepSource {
    /// Visible text plus metadata, see [`metadata`]
    pub raw: String,
    /// Optional data table rows
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub table: Vec<Vec<String>>,
}

impl StepSource {
    /// Step from an already-encoded line
    pub fn encoded(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            table: Vec::new(),
        }
    }

    /// Step from an authored line (`>> text [[@tag !FLAG]]`)
    pub fn authored(line: &str) -> Result<Self> {
        Ok(Self::encoded(metadata::lex_authored(line)?))
    }

    pub fn with_table(mut self, table: Vec<Vec<String>>) -> Self {
        self.table = table;
        self
    }
}
