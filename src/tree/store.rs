//! Node arena and structural operations
//!
//! Nodes live in a `Vec` owned by the tree and refer to each other by
//! [`NodeId`]. Nothing is ever removed from the arena while the scenario
//! runs: a rewritten template is detached from the structure but keeps its
//! slot, so ids handed out earlier stay valid for reporting.

use crate::common::{Error, Result};
use crate::engine::severity::StepOutcome;

use super::context::{ContextId, ContextStore};
use super::metadata;
use super::node::{ConditionalState, NodeId, NodeKind, StepNode};
use super::StepSource;

/// A scenario's step tree and the data contexts of its nodes
#[derive(Debug, Clone)]
pub struct StepTree {
    nodes: Vec<StepNode>,
    contexts: ContextStore,
    root: NodeId,
}

impl StepTree {
    /// Create a tree holding only a root message node
    pub fn new(root_text: impl Into<String>) -> Self {
        let mut contexts = ContextStore::new();
        let context = contexts.root();
        let root = NodeId(0);
        let node = StepNode::new(root, NodeKind::MessageStep, root_text.into(), context);
        Self {
            nodes: vec![node],
            contexts,
            root,
        }
    }

    /// Chain a flat step list into a tree under a root named `name`
    pub fn from_steps(name: impl Into<String>, steps: &[StepSource]) -> Result<Self> {
        let mut tree = Self::new(name);
        let root = tree.root;
        tree.graft_steps(root, steps)?;
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &StepNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut StepNode {
        &mut self.nodes[id.0]
    }

    pub fn contexts(&self) -> &ContextStore {
        &self.contexts
    }

    pub fn contexts_mut(&mut self) -> &mut ContextStore {
        &mut self.contexts
    }

    /// Scope of the root node, shared by the whole scenario
    pub fn root_context(&self) -> ContextId {
        self.node(self.root).context
    }

    /// Create a detached node of a given kind
    ///
    /// The node gets a scope of its own until it is attached, at which point
    /// it is given an overlay under its new parent.
    pub fn create_node(&mut self, kind: NodeKind, text: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let context = self.contexts.root();
        self.nodes.push(StepNode::new(id, kind, text.into(), context));
        id
    }

    /// Create a detached node from an encoded step line
    pub fn create_step(&mut self, raw: &str) -> Result<NodeId> {
        let (text, meta) = metadata::decode(raw)?;
        let id = self.create_node(NodeKind::classify(&text), text);
        let node = self.node_mut(id);
        node.raw = raw.to_string();
        node.nesting_level = meta.nesting;
        node.tags = meta.tags;
        node.bookmarks = meta.bookmarks;
        node.flags = meta.flags;
        node.propagate_flags = meta.propagate_flags;
        Ok(id)
    }

    /// Attach `child` as the last child of `parent`
    ///
    /// Sets the parent link, gives the child a fresh overlay under the
    /// parent's scope and copies flags from a flag-propagating parent.
    /// Sibling links are left alone; see [`append_child`](Self::append_child).
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        let (parent_context, parent_level, propagated) = {
            let p = self.node(parent);
            let propagated = p.propagate_flags.then(|| p.flags.clone());
            (p.context, p.nesting_level, propagated)
        };
        let context = self.contexts.overlay(parent_context);

        self.node_mut(parent).children.push(child);
        let node = self.node_mut(child);
        node.parent = Some(parent);
        node.context = context;
        node.nesting_level = node.nesting_level.max(parent_level);
        if let Some(flags) = propagated {
            node.flags.extend(flags);
            node.propagate_flags = true;
        }
    }

    /// Attach `child` as the last child of `parent` and link it to the
    /// previous last child
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let previous = self.node(parent).children.last().copied();
        self.add_child(parent, child);
        if let Some(previous) = previous {
            self.pair_siblings(previous, child);
        }
    }

    /// Link `a.next = b` and `b.previous = a`, nothing else
    pub fn pair_siblings(&mut self, a: NodeId, b: NodeId) {
        self.node_mut(a).next = Some(b);
        self.node_mut(b).previous = Some(a);
    }

    /// Splice `new` in right after `existing`
    ///
    /// Both sibling links are rewired and, when `existing` has a parent,
    /// `new` is placed immediately after it in the parent's children with a
    /// fresh overlay under the parent's scope.
    pub fn insert_next_sibling(&mut self, existing: NodeId, new: NodeId) {
        let old_next = self.node(existing).next;
        self.pair_siblings(existing, new);
        match old_next {
            Some(next) => self.pair_siblings(new, next),
            None => self.node_mut(new).next = None,
        }

        match self.node(existing).parent {
            Some(parent) => {
                let (parent_context, parent_level, propagated) = {
                    let p = self.node(parent);
                    let propagated = p.propagate_flags.then(|| p.flags.clone());
                    (p.context, p.nesting_level, propagated)
                };
                let position = self
                    .node(parent)
                    .children
                    .iter()
                    .position(|&c| c == existing)
                    .map(|i| i + 1)
                    .unwrap_or(self.node(parent).children.len());
                let context = self.contexts.overlay(parent_context);

                self.node_mut(parent).children.insert(position, new);
                let node = self.node_mut(new);
                node.parent = Some(parent);
                node.context = context;
                node.nesting_level = node.nesting_level.max(parent_level);
                if let Some(flags) = propagated {
                    node.flags.extend(flags);
                    node.propagate_flags = true;
                }
            }
            None => {
                let existing_context = self.node(existing).context;
                let context = self.contexts.overlay(existing_context);
                self.node_mut(new).context = context;
            }
        }
    }

    /// Copy structure and inherited state from `from` onto `to`
    ///
    /// `to` takes over children, parent, siblings, nesting level, tags, flags
    /// and the context reference, and records `from` as its template. The
    /// structure itself still points at `from`; [`substitute`](Self::substitute)
    /// finishes the swap.
    pub fn copy_relationships(&mut self, from: NodeId, to: NodeId) {
        let source = self.node(from).clone();
        let target = self.node_mut(to);
        target.children = source.children;
        target.parent = source.parent;
        target.previous = source.previous;
        target.next = source.next;
        target.nesting_level = source.nesting_level;
        target.tags = source.tags;
        target.bookmarks = source.bookmarks;
        target.flags = source.flags;
        target.propagate_flags = source.propagate_flags;
        target.context = source.context;
        target.is_template = false;
        target.template_source = Some(from);
    }

    /// Replace a template node with a rewritten copy carrying `text`
    ///
    /// The template is detached from its parent's children and from the
    /// sibling chain, and its children are re-parented onto the copy. The
    /// returned id is the node the walk continues with.
    pub fn substitute(&mut self, from: NodeId, text: impl Into<String>) -> NodeId {
        let (kind, raw, table) = {
            let node = self.node(from);
            (node.kind, node.raw.clone(), node.table.clone())
        };
        let to = self.create_node(kind, text);
        {
            let node = self.node_mut(to);
            node.raw = raw;
            node.table = table;
        }
        self.copy_relationships(from, to);

        let copy = self.node(to).clone();
        if let Some(parent) = copy.parent {
            for slot in self.node_mut(parent).children.iter_mut() {
                if *slot == from {
                    *slot = to;
                }
            }
        }
        if let Some(previous) = copy.previous {
            self.node_mut(previous).next = Some(to);
        }
        if let Some(next) = copy.next {
            self.node_mut(next).previous = Some(to);
        }
        for child in &copy.children {
            self.node_mut(*child).parent = Some(to);
        }
        if self.root == from {
            self.root = to;
        }

        let template = self.node_mut(from);
        template.parent = None;
        template.previous = None;
        template.next = None;
        template.children.clear();
        to
    }

    /// Build nodes for `steps` and attach them below `parent`
    ///
    /// Steps without markers become children of `parent`, one level deeper
    /// than it; a step with more markers than the step before it becomes
    /// that step's child. Returns the ids of the new direct children.
    pub fn graft_steps(&mut self, parent: NodeId, steps: &[StepSource]) -> Result<Vec<NodeId>> {
        let base_level = self.node(parent).nesting_level + 1;
        let mut open: Vec<NodeId> = Vec::new();
        let mut top = Vec::new();

        for step in steps {
            let id = self.create_step(&step.raw)?;
            let level = base_level + self.node(id).nesting_level;
            {
                let node = self.node_mut(id);
                node.nesting_level = level;
                node.table = step.table.clone();
            }

            while let Some(&last) = open.last() {
                if self.node(last).nesting_level >= level {
                    open.pop();
                } else {
                    break;
                }
            }
            match open.last().copied() {
                Some(owner) => self.append_child(owner, id),
                None => {
                    self.append_child(parent, id);
                    top.push(id);
                }
            }
            open.push(id);
        }
        Ok(top)
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).children.first().copied()
    }

    /// Replace the visible text of a node in place
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        self.node_mut(id).text = text.into();
    }

    pub fn set_table(&mut self, id: NodeId, table: Vec<Vec<String>>) {
        self.node_mut(id).table = table;
    }

    /// Overwrite the conditional states of a node
    pub fn set_states(&mut self, id: NodeId, states: &[ConditionalState]) {
        let node = self.node_mut(id);
        node.conditional_states.clear();
        node.conditional_states.extend(states.iter().copied());
    }

    pub fn add_state(&mut self, id: NodeId, state: ConditionalState) {
        self.node_mut(id).conditional_states.insert(state);
    }

    pub fn record_outcome(&mut self, id: NodeId, outcome: StepOutcome) {
        self.node_mut(id).outcome = Some(outcome);
    }

    /// Nodes reachable from `id` in walk order (`id` first)
    pub fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            for &child in self.node(current).children.iter().rev() {
                stack.push(child);
            }
        }
        order
    }

    /// Check the structural invariants of every attached node
    ///
    /// - children order equals the sibling chain starting at the first child
    /// - every child points back at its parent
    /// - a child is never nested shallower than its parent
    /// - TRUE and FALSE are never both set
    pub fn validate(&self) -> Result<()> {
        for id in self.preorder(self.root) {
            let node = self.node(id);

            let mut chain = Vec::with_capacity(node.children.len());
            let mut cursor = node.children.first().copied();
            while let Some(current) = cursor {
                if chain.len() > node.children.len() {
                    return Err(Error::Internal(format!("sibling cycle below {}", id)));
                }
                chain.push(current);
                cursor = self.node(current).next;
            }
            if chain != node.children {
                return Err(Error::Internal(format!(
                    "children of {} are {:?} but the sibling chain is {:?}",
                    id, node.children, chain
                )));
            }
            if let Some(first) = node.children.first() {
                if self.node(*first).previous.is_some() {
                    return Err(Error::Internal(format!("first child of {} has a previous sibling", id)));
                }
            }

            for &child in &node.children {
                let c = self.node(child);
                if c.parent != Some(id) {
                    return Err(Error::Internal(format!("{} does not point back at {}", child, id)));
                }
                if c.nesting_level < node.nesting_level {
                    return Err(Error::Internal(format!(
                        "{} is nested shallower than its parent {}",
                        child, id
                    )));
                }
            }

            if node.has_state(ConditionalState::True) && node.has_state(ConditionalState::False) {
                return Err(Error::Internal(format!("{} is both TRUE and FALSE", id)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::node::ExecutionFlag;

    fn steps(lines: &[&str]) -> Vec<StepSource> {
        lines.iter().map(|l| StepSource::authored(l).unwrap()).collect()
    }

    fn texts(tree: &StepTree, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|id| tree.node(*id).text().to_string()).collect()
    }

    #[test]
    fn test_from_steps_builds_nesting() {
        let tree = StepTree::from_steps(
            "scenario",
            &steps(&["a", "> a1", ">> a1x", "> a2", "b", ">> b1"]),
        )
        .unwrap();
        tree.validate().unwrap();

        let root = tree.root();
        assert_eq!(texts(&tree, tree.node(root).children()), vec!["a", "b"]);
        let a = tree.node(root).children()[0];
        assert_eq!(texts(&tree, tree.node(a).children()), vec!["a1", "a2"]);
        let a1 = tree.node(a).children()[0];
        assert_eq!(texts(&tree, tree.node(a1).children()), vec!["a1x"]);
        let b = tree.node(root).children()[1];
        assert_eq!(texts(&tree, tree.node(b).children()), vec!["b1"]);

        assert_eq!(tree.node(root).nesting_level(), 0);
        assert_eq!(tree.node(a).nesting_level(), 1);
        assert_eq!(tree.node(a1).nesting_level(), 2);
    }

    #[test]
    fn test_add_child_creates_overlay() {
        let mut tree = StepTree::new("root");
        let root = tree.root();
        let root_ctx = tree.root_context();
        tree.contexts_mut().set(root_ctx, "shared", "1");

        let child = tree.create_node(NodeKind::AtomicStep, "child");
        tree.add_child(root, child);
        let child_ctx = tree.node(child).context();
        assert_ne!(child_ctx, root_ctx);
        assert_eq!(tree.contexts().parent(child_ctx), Some(root_ctx));
        assert_eq!(tree.contexts().get(child_ctx, "shared"), Some("1"));

        tree.contexts_mut().set(child_ctx, "mine", "2");
        assert_eq!(tree.contexts().get(root_ctx, "mine"), None);
    }

    #[test]
    fn test_add_child_propagates_flags() {
        let mut tree = StepTree::from_steps(
            "root",
            &steps(&["cleanup [[!ALWAYS_RUN !PROPAGATE]]", "> step one", ">> step two"]),
        )
        .unwrap();
        let cleanup = tree.first_child(tree.root()).unwrap();
        let one = tree.first_child(cleanup).unwrap();
        let two = tree.first_child(one).unwrap();
        assert!(tree.node(one).has_flag(ExecutionFlag::AlwaysRun));
        assert!(tree.node(two).has_flag(ExecutionFlag::AlwaysRun));

        let plain = tree.create_node(NodeKind::AtomicStep, "plain");
        let root = tree.root();
        tree.append_child(root, plain);
        assert!(tree.node(plain).flags().is_empty());
        tree.validate().unwrap();
    }

    #[test]
    fn test_insert_next_sibling_in_middle() {
        let mut tree = StepTree::from_steps("root", &steps(&["a", "c"])).unwrap();
        let root = tree.root();
        let a = tree.node(root).children()[0];
        let c = tree.node(root).children()[1];
        assert_eq!(tree.node(a).next_sibling(), Some(c));

        let b = tree.create_node(NodeKind::AtomicStep, "b");
        tree.insert_next_sibling(a, b);

        assert_eq!(tree.node(a).next_sibling(), Some(b));
        assert_eq!(tree.node(b).next_sibling(), Some(c));
        assert_eq!(tree.node(b).previous_sibling(), Some(a));
        assert_eq!(tree.node(c).previous_sibling(), Some(b));
        assert_eq!(tree.node(root).children(), &[a, b, c]);
        assert_eq!(tree.node(b).parent(), Some(root));
        assert_eq!(
            tree.contexts().parent(tree.node(b).context()),
            Some(tree.root_context())
        );
        tree.validate().unwrap();
    }

    #[test]
    fn test_insert_next_sibling_at_end() {
        let mut tree = StepTree::from_steps("root", &steps(&["a"])).unwrap();
        let root = tree.root();
        let a = tree.node(root).children()[0];
        let b = tree.create_node(NodeKind::AtomicStep, "b");
        tree.insert_next_sibling(a, b);

        assert_eq!(tree.node(a).next_sibling(), Some(b));
        assert_eq!(tree.node(b).next_sibling(), None);
        assert_eq!(tree.node(root).children(), &[a, b]);
        tree.validate().unwrap();
    }

    #[test]
    fn test_insert_next_to_parentless_node() {
        let mut tree = StepTree::new("root");
        let root = tree.root();
        let extra = tree.create_node(NodeKind::MessageStep, "extra");
        tree.insert_next_sibling(root, extra);
        assert_eq!(tree.node(root).next_sibling(), Some(extra));
        assert_eq!(tree.node(extra).parent(), None);
        assert_eq!(
            tree.contexts().parent(tree.node(extra).context()),
            Some(tree.root_context())
        );
    }

    #[test]
    fn test_copy_relationships() {
        let mut tree =
            StepTree::from_steps("root", &steps(&["a", "print <x> [[@t !IGNORE_FAILURES]]", "> kid", "c"]))
                .unwrap();
        let root = tree.root();
        let template = tree.node(root).children()[1];
        assert!(tree.node(template).is_template());

        let copy = tree.create_node(NodeKind::AtomicStep, "print 1");
        tree.copy_relationships(template, copy);
        let t = tree.node(template).clone();
        let n = tree.node(copy);
        assert_eq!(n.parent(), t.parent());
        assert_eq!(n.previous_sibling(), t.previous_sibling());
        assert_eq!(n.next_sibling(), t.next_sibling());
        assert_eq!(n.children(), t.children());
        assert_eq!(n.nesting_level(), t.nesting_level());
        assert_eq!(n.tags(), t.tags());
        assert_eq!(n.flags(), t.flags());
        assert_eq!(n.context(), t.context());
        assert!(!n.is_template());
        assert_eq!(n.template_source(), Some(template));
    }

    #[test]
    fn test_substitute_replaces_template() {
        let mut tree = StepTree::from_steps("root", &steps(&["a", "print <x>", "> kid", "c"])).unwrap();
        let root = tree.root();
        let a = tree.node(root).children()[0];
        let template = tree.node(root).children()[1];
        let c = tree.node(root).children()[2];
        let kid = tree.first_child(template).unwrap();

        let resolved = tree.substitute(template, "print 1");

        assert_eq!(tree.node(root).children(), &[a, resolved, c]);
        assert_eq!(tree.node(a).next_sibling(), Some(resolved));
        assert_eq!(tree.node(c).previous_sibling(), Some(resolved));
        assert_eq!(tree.node(kid).parent(), Some(resolved));
        assert_eq!(tree.node(resolved).text(), "print 1");
        assert_eq!(tree.node(resolved).template_source(), Some(template));
        assert_eq!(tree.node(template).parent(), None);
        assert!(tree.node(template).children().is_empty());
        tree.validate().unwrap();
    }

    #[test]
    fn test_validate_detects_broken_chain() {
        let mut tree = StepTree::from_steps("root", &steps(&["a", "b", "c"])).unwrap();
        let root = tree.root();
        let a = tree.node(root).children()[0];
        let c = tree.node(root).children()[2];
        tree.node_mut(a).next = Some(c);
        assert!(tree.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_true_and_false() {
        let mut tree = StepTree::from_steps("root", &steps(&["IF: true"])).unwrap();
        let node = tree.first_child(tree.root()).unwrap();
        tree.set_states(node, &[ConditionalState::True, ConditionalState::False]);
        assert!(tree.validate().is_err());
    }

    #[test]
    fn test_preorder_follows_children() {
        let tree = StepTree::from_steps("root", &steps(&["a", "> a1", "b"])).unwrap();
        let order = tree.preorder(tree.root());
        assert_eq!(texts(&tree, &order), vec!["root", "a", "a1", "b"]);
    }
}
