//! Per-scenario run reports
//!
//! Reports are plain serializable snapshots taken after a walk so sinks
//! (text printer, JSON output) never touch the live tree.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;

use crate::catalog::ScenarioDescriptor;
use crate::engine::{RunStats, ScenarioRunContext, ScenarioSeverity, StepOutcome};
use crate::tree::{ConditionalState, ExecutionFlag, NodeId, NodeKind, StepTree};

/// One node as it stood when the walk finished
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub id: NodeId,
    pub depth: usize,
    pub kind: NodeKind,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<StepOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<ConditionalState>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub bookmarks: BTreeSet<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<ExecutionFlag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_source: Option<NodeId>,
}

/// Result of running one scenario
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub source: PathBuf,
    pub tags: BTreeSet<String>,
    pub severity: ScenarioSeverity,
    pub complete: bool,
    pub stats: RunStats,
    pub nodes: Vec<NodeReport>,
    pub log: Vec<String>,
}

impl ScenarioReport {
    pub fn from_run(descriptor: &ScenarioDescriptor, tree: &StepTree, run: &ScenarioRunContext) -> Self {
        let nodes = with_depth(tree)
            .into_iter()
            .map(|(id, depth)| {
                let node = tree.node(id);
                NodeReport {
                    id,
                    depth,
                    kind: node.kind(),
                    text: node.text().to_string(),
                    outcome: node.outcome().cloned(),
                    states: node.conditional_states().iter().copied().collect(),
                    tags: node.tags().clone(),
                    bookmarks: node.bookmarks().clone(),
                    flags: node.flags().iter().copied().collect(),
                    template_source: node.template_source(),
                }
            })
            .collect();

        Self {
            scenario: run.scenario().to_string(),
            source: descriptor.source.clone(),
            tags: descriptor.tags.clone(),
            severity: run.severity(),
            complete: run.is_complete(),
            stats: run.stats(),
            nodes,
            log: run.log().to_vec(),
        }
    }

    pub fn passed(&self) -> bool {
        self.severity == ScenarioSeverity::None
    }

    /// First node whose text is `text`
    pub fn find(&self, text: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.text == text)
    }

    /// Nodes carrying a bookmark
    pub fn bookmarked(&self, bookmark: &str) -> impl Iterator<Item = &NodeReport> {
        let bookmark = bookmark.to_string();
        self.nodes
            .iter()
            .filter(move |n| n.bookmarks.contains(&bookmark))
    }
}

/// Attached nodes in walk order with their structural depth
fn with_depth(tree: &StepTree) -> Vec<(NodeId, usize)> {
    let mut order = Vec::new();
    let mut stack = vec![(tree.root(), 0)];
    while let Some((id, depth)) = stack.pop() {
        order.push((id, depth));
        for &child in tree.node(id).children().iter().rev() {
            stack.push((child, depth + 1));
        }
    }
    order
}

/// Render a tree's structure, one node per line
pub fn render_tree(tree: &StepTree) -> String {
    let mut out = String::new();
    for (id, depth) in with_depth(tree) {
        let node = tree.node(id);
        out.push_str(&"  ".repeat(depth));
        out.push_str(node.text());
        if node.kind() != NodeKind::AtomicStep {
            out.push_str(&format!(" ({})", node.kind()));
        }
        let markers: Vec<String> = node
            .tags()
            .iter()
            .map(|t| format!("@{}", t))
            .chain(node.bookmarks().iter().map(|b| format!("#{}", b)))
            .chain(node.flags().iter().map(|f| format!("!{}", f)))
            .collect();
        if !markers.is_empty() {
            out.push_str(&format!(" [{}]", markers.join(" ")));
        }
        out.push('\n');
    }
    out
}
