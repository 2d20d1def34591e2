//! Step node model

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::catalog::ResolvedStep;
use crate::engine::severity::StepOutcome;

use super::context::ContextId;

/// Opaque handle of a node inside a [`StepTree`](super::StepTree)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in its tree's arena
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a node is, decided once when the node is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Plain step resolved through the step catalog
    AtomicStep,
    /// IF / ELSE / ELSE-IF / THEN
    ConditionalDirective,
    /// `RUN SCENARIOS:` grafting matched scenarios as children
    ScenarioComposerDirective,
    /// Grouping or informational node that never fails
    MessageStep,
}

/// Prefix of a composer directive
pub const COMPOSER_PREFIX: &str = "RUN SCENARIOS:";

impl NodeKind {
    /// Classify step text
    ///
    /// Message nodes are never produced here; the engine creates those
    /// explicitly.
    pub fn classify(text: &str) -> Self {
        let text = text.trim_start();
        if is_directive(text) {
            Self::ConditionalDirective
        } else if text.starts_with(COMPOSER_PREFIX) {
            Self::ScenarioComposerDirective
        } else {
            Self::AtomicStep
        }
    }
}

/// Matches `^(IF:|ELSE:|ELSE-IF:|THEN:).*$`
pub fn is_directive(text: &str) -> bool {
    ["IF:", "ELSE:", "ELSE-IF:", "THEN:"]
        .iter()
        .any(|prefix| text.starts_with(prefix))
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtomicStep => write!(f, "step"),
            Self::ConditionalDirective => write!(f, "directive"),
            Self::ScenarioComposerDirective => write!(f, "composer"),
            Self::MessageStep => write!(f, "message"),
        }
    }
}

/// Execution-gating flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionFlag {
    AlwaysRun,
    RunIfScenarioFailed,
    RunIfScenarioSoftFailed,
    RunIfScenarioHardFailed,
    RunIfScenarioPassing,
    IgnoreFailures,
}

impl ExecutionFlag {
    pub const ALL: [ExecutionFlag; 6] = [
        Self::AlwaysRun,
        Self::RunIfScenarioFailed,
        Self::RunIfScenarioSoftFailed,
        Self::RunIfScenarioHardFailed,
        Self::RunIfScenarioPassing,
        Self::IgnoreFailures,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlwaysRun => "ALWAYS_RUN",
            Self::RunIfScenarioFailed => "RUN_IF_SCENARIO_FAILED",
            Self::RunIfScenarioSoftFailed => "RUN_IF_SCENARIO_SOFT_FAILED",
            Self::RunIfScenarioHardFailed => "RUN_IF_SCENARIO_HARD_FAILED",
            Self::RunIfScenarioPassing => "RUN_IF_SCENARIO_PASSING",
            Self::IgnoreFailures => "IGNORE_FAILURES",
        }
    }
}

impl fmt::Display for ExecutionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|flag| flag.as_str() == s)
            .ok_or_else(|| format!("unknown flag '{}'", s))
    }
}

/// Result of evaluating a conditional directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionalState {
    True,
    False,
    Skip,
    SkipChildren,
}

impl fmt::Display for ConditionalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "TRUE"),
            Self::False => write!(f, "FALSE"),
            Self::Skip => write!(f, "SKIP"),
            Self::SkipChildren => write!(f, "SKIP_CHILDREN"),
        }
    }
}

/// One step in the tree
///
/// Structure (`parent`, siblings, `children`) is only changed through
/// [`StepTree`](super::StepTree) so the children/sibling-chain invariant
/// holds; the rest is plain state read by reporting sinks.
#[derive(Debug, Clone)]
pub struct StepNode {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) text: String,
    pub(crate) raw: String,
    pub(crate) table: Vec<Vec<String>>,
    pub(crate) action: Option<ResolvedStep>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) previous: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) nesting_level: usize,
    pub(crate) tags: BTreeSet<String>,
    pub(crate) bookmarks: BTreeSet<String>,
    pub(crate) flags: BTreeSet<ExecutionFlag>,
    pub(crate) propagate_flags: bool,
    pub(crate) conditional_states: BTreeSet<ConditionalState>,
    pub(crate) context: ContextId,
    pub(crate) is_template: bool,
    pub(crate) template_source: Option<NodeId>,
    pub(crate) outcome: Option<StepOutcome>,
}

impl StepNode {
    pub(crate) fn new(id: NodeId, kind: NodeKind, text: String, context: ContextId) -> Self {
        let is_template = kind == NodeKind::AtomicStep && super::context::has_placeholder(&text);
        Self {
            id,
            kind,
            raw: text.clone(),
            text,
            table: Vec::new(),
            action: None,
            parent: None,
            previous: None,
            next: None,
            children: Vec::new(),
            nesting_level: 0,
            tags: BTreeSet::new(),
            bookmarks: BTreeSet::new(),
            flags: BTreeSet::new(),
            propagate_flags: false,
            conditional_states: BTreeSet::new(),
            context,
            is_template,
            template_source: None,
            outcome: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Visible text, after any rewriting
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Encoded text the node was built from
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Data table attached to the step
    pub fn table(&self) -> &[Vec<String>] {
        &self.table
    }

    /// Catalog entry the step resolved to, once it has run
    pub fn action(&self) -> Option<&ResolvedStep> {
        self.action.as_ref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn previous_sibling(&self) -> Option<NodeId> {
        self.previous
    }

    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn nesting_level(&self) -> usize {
        self.nesting_level
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn bookmarks(&self) -> &BTreeSet<String> {
        &self.bookmarks
    }

    pub fn flags(&self) -> &BTreeSet<ExecutionFlag> {
        &self.flags
    }

    pub fn has_flag(&self, flag: ExecutionFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Whether children adopted by this node inherit its flags
    pub fn propagates_flags(&self) -> bool {
        self.propagate_flags
    }

    pub fn conditional_states(&self) -> &BTreeSet<ConditionalState> {
        &self.conditional_states
    }

    pub fn has_state(&self, state: ConditionalState) -> bool {
        self.conditional_states.contains(&state)
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Whether the text still holds placeholders to resolve before running
    pub fn is_template(&self) -> bool {
        self.is_template
    }

    /// Template this node was rewritten from
    pub fn template_source(&self) -> Option<NodeId> {
        self.template_source
    }

    /// Outcome of the most recent visit
    pub fn outcome(&self) -> Option<&StepOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_soft_failed(&self) -> bool {
        matches!(self.outcome, Some(StepOutcome::SoftFailed(_)))
    }

    pub fn is_hard_failed(&self) -> bool {
        matches!(self.outcome, Some(StepOutcome::HardFailed(_)))
    }
}
