//! Depth-first tree walk
//!
//! Siblings are followed iteratively through their `next` links and
//! children are entered recursively, so depth only grows with nesting.
//! Links are re-read after every visit because a visit may insert a
//! replacement sibling, swap a template for its resolved copy or graft new
//! children.

use crate::catalog::{ActionContext, ScenarioCatalog, StepCatalog};
use crate::common::{Error, Result};
use crate::tree::{ConditionalState, NodeId, NodeKind, StepTree};

use super::composer::ScenarioComposer;
use super::conditional;
use super::controller::{settle, should_run, ScenarioRunContext};
use super::expression::ExpressionEvaluator;
use super::severity::StepOutcome;

/// Walks one scenario tree, running each node it is allowed to run
pub struct TreeWalker<'a> {
    steps: &'a dyn StepCatalog,
    expressions: &'a dyn ExpressionEvaluator,
    scenarios: &'a dyn ScenarioCatalog,
}

impl<'a> TreeWalker<'a> {
    pub fn new(
        steps: &'a dyn StepCatalog,
        expressions: &'a dyn ExpressionEvaluator,
        scenarios: &'a dyn ScenarioCatalog,
    ) -> Self {
        Self {
            steps,
            expressions,
            scenarios,
        }
    }

    /// Walk the whole tree from its root
    pub fn walk(&self, tree: &mut StepTree, run: &mut ScenarioRunContext) {
        let root = tree.root();
        self.walk_siblings(tree, root, run);
    }

    fn walk_siblings(&self, tree: &mut StepTree, first: NodeId, run: &mut ScenarioRunContext) {
        let mut cursor = Some(first);
        while let Some(id) = cursor {
            let visited = self.visit(tree, id, run);
            cursor = tree.node(visited).next_sibling();
        }
    }

    /// Visit one node and its subtree; returns the id the walk continues
    /// from, which differs from `id` when a template was replaced
    fn visit(&self, tree: &mut StepTree, id: NodeId, run: &mut ScenarioRunContext) -> NodeId {
        if !should_run(tree.node(id), run) {
            tracing::debug!(node = %id, text = tree.node(id).text(), "skipped");
            settle(tree, id, StepOutcome::Skipped, run);
            self.walk_children(tree, id, run);
            return id;
        }

        let id = if tree.node(id).is_template() {
            let node = tree.node(id);
            let text = tree.contexts().resolve_placeholders(node.context(), node.text());
            let resolved = tree.substitute(id, text);
            tracing::debug!(template = %id, node = %resolved, "template resolved");
            resolved
        } else {
            id
        };

        let kind = tree.node(id).kind();
        tracing::debug!(node = %id, kind = %kind, text = tree.node(id).text(), "running");
        let result = match kind {
            NodeKind::AtomicStep => self.execute_step(tree, id, run),
            NodeKind::ConditionalDirective => conditional::evaluate(tree, id, self.expressions),
            NodeKind::ScenarioComposerDirective => ScenarioComposer::new(self.scenarios)
                .compose(tree, id, run)
                .map(|_| ()),
            NodeKind::MessageStep => Ok(()),
        };

        let outcome = StepOutcome::from_result(result);
        if let Some(message) = outcome.message() {
            tracing::debug!(node = %id, "{}", message);
        }
        settle(tree, id, outcome, run);
        self.walk_children(tree, id, run);
        id
    }

    /// Walk the children of `id`; each child gates itself unless the node
    /// holds SKIP_CHILDREN
    fn walk_children(&self, tree: &mut StepTree, id: NodeId, run: &mut ScenarioRunContext) {
        let children = tree.node(id).children().to_vec();
        if tree.node(id).has_state(ConditionalState::SkipChildren) {
            for child in children {
                skip_subtree(tree, child, run);
            }
        } else if let Some(&first) = children.first() {
            self.walk_siblings(tree, first, run);
        }
    }

    fn execute_step(&self, tree: &mut StepTree, id: NodeId, run: &mut ScenarioRunContext) -> Result<()> {
        let text = tree.node(id).text().to_string();
        let step = self
            .steps
            .resolve(&text)
            .ok_or_else(|| Error::UndefinedStep(text.clone()))?;
        tree.node_mut(id).action = Some(step.clone());

        let scope = tree.node(id).context();
        let scenario_scope = tree.root_context();
        let table: Vec<Vec<String>> = tree
            .node(id)
            .table()
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| tree.contexts().resolve_placeholders(scope, cell))
                    .collect()
            })
            .collect();

        let mut cx = ActionContext::new(tree.contexts_mut(), scope, scenario_scope, run, &table);
        step.run(&mut cx)
    }
}

/// Record `id` and everything below it as skipped without running any of it
fn skip_subtree(tree: &mut StepTree, id: NodeId, run: &mut ScenarioRunContext) {
    for node in tree.preorder(id) {
        settle(tree, node, StepOutcome::Skipped, run);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ScenarioDescriptor, StepRegistry};
    use crate::engine::expression::DirectiveEvaluator;
    use crate::engine::severity::ScenarioSeverity;
    use crate::engine::RunOptions;
    use crate::tree::StepSource;
    use std::path::PathBuf;

    struct NoScenarios;

    impl ScenarioCatalog for NoScenarios {
        fn find(&self, _: &str, _: &[PathBuf]) -> Result<Vec<ScenarioDescriptor>> {
            Ok(Vec::new())
        }
    }

    fn run_lines(lines: &[&str], options: RunOptions) -> (StepTree, ScenarioRunContext) {
        let sources: Vec<_> = lines.iter().map(|l| StepSource::authored(l).unwrap()).collect();
        let mut tree = StepTree::from_steps("Scenario: test", &sources).unwrap();
        let mut run = ScenarioRunContext::new("test", options);
        let registry = StepRegistry::with_builtins().unwrap();
        TreeWalker::new(&registry, &DirectiveEvaluator, &NoScenarios).walk(&mut tree, &mut run);
        (tree, run)
    }

    fn outcome_of<'t>(tree: &'t StepTree, text: &str) -> Option<&'t StepOutcome> {
        tree.preorder(tree.root())
            .into_iter()
            .find(|id| tree.node(*id).text() == text)
            .and_then(|id| tree.node(id).outcome())
    }

    #[test]
    fn test_if_false_else_runs_else_branch() {
        let (tree, run) = run_lines(
            &[
                "print \"R\"",
                "IF: false",
                "> print \"X child\"",
                "ELSE:",
                "> print \"Y child\"",
            ],
            RunOptions::default(),
        );
        assert_eq!(run.log(), &["R".to_string(), "Y child".to_string()]);
        assert_eq!(outcome_of(&tree, "print \"X child\""), Some(&StepOutcome::Skipped));
        assert_eq!(outcome_of(&tree, "print \"Y child\""), Some(&StepOutcome::Passed));
        assert_eq!(run.severity(), ScenarioSeverity::None);
        tree.validate().unwrap();
    }

    #[test]
    fn test_then_replacement_runs_as_next_sibling() {
        let (tree, run) = run_lines(
            &["set \"n\" to \"3\"", "IF: ${n} == 3 THEN: print \"three\"", "print \"after\""],
            RunOptions::default(),
        );
        assert_eq!(run.log(), &["three".to_string(), "after".to_string()]);
        tree.validate().unwrap();
    }

    #[test]
    fn test_always_run_after_hard_failure() {
        let (tree, run) = run_lines(
            &[
                "fail \"boom\"",
                "print \"skipped\"",
                "print \"cleanup\" [[!ALWAYS_RUN]]",
                "print \"report\" [[!RUN_IF_SCENARIO_HARD_FAILED]]",
                "print \"soft only\" [[!RUN_IF_SCENARIO_SOFT_FAILED]]",
            ],
            RunOptions::default(),
        );
        assert_eq!(run.severity(), ScenarioSeverity::HardFail);
        assert!(run.is_complete());
        assert_eq!(run.log(), &["cleanup".to_string(), "report".to_string()]);
        assert_eq!(outcome_of(&tree, "print \"skipped\""), Some(&StepOutcome::Skipped));
    }

    #[test]
    fn test_skipped_parent_still_visits_children() {
        let (tree, run) = run_lines(
            &[
                "fail \"boom\"",
                "print \"parent\"",
                "> print \"child\" [[!ALWAYS_RUN]]",
                "> print \"sibling\"",
            ],
            RunOptions::default(),
        );
        assert_eq!(run.log(), &["child".to_string()]);
        assert_eq!(outcome_of(&tree, "print \"parent\""), Some(&StepOutcome::Skipped));
        assert_eq!(outcome_of(&tree, "print \"child\""), Some(&StepOutcome::Passed));
        assert_eq!(outcome_of(&tree, "print \"sibling\""), Some(&StepOutcome::Skipped));
    }

    #[test]
    fn test_cleanup_failure_after_soft_stop_escalates() {
        let (_, run) = run_lines(
            &["soft fail \"meh\"", "fail \"cleanup broke\" [[!ALWAYS_RUN]]"],
            RunOptions {
                stop_on_hard_fail: true,
                stop_on_soft_fail: true,
            },
        );
        assert!(run.is_complete());
        assert_eq!(run.severity(), ScenarioSeverity::HardFail);
    }

    #[test]
    fn test_cleanup_failure_after_end_scenario_escalates() {
        let (_, run) = run_lines(
            &["end scenario", "fail \"cleanup broke\" [[!ALWAYS_RUN]]"],
            RunOptions::default(),
        );
        assert!(run.is_complete());
        assert_eq!(run.severity(), ScenarioSeverity::HardFail);
        assert_eq!(run.stats().hard_failed, 1);
        assert_eq!(run.stats().run(), 3);
    }

    #[test]
    fn test_soft_failure_keeps_running() {
        let (_, run) = run_lines(
            &[
                "verify \"a\" equals \"b\"",
                "print \"still here\"",
                "print \"passing\" [[!RUN_IF_SCENARIO_PASSING]]",
            ],
            RunOptions::default(),
        );
        assert_eq!(run.severity(), ScenarioSeverity::SoftFail);
        assert!(!run.is_complete());
        assert_eq!(run.log(), &["still here".to_string(), "passing".to_string()]);
    }

    #[test]
    fn test_stop_on_soft_fail() {
        let (_, run) = run_lines(
            &["soft fail \"meh\"", "print \"not reached\""],
            RunOptions {
                stop_on_hard_fail: true,
                stop_on_soft_fail: true,
            },
        );
        assert!(run.is_complete());
        assert!(run.log().is_empty());
    }

    #[test]
    fn test_undefined_step_is_hard_failure() {
        let (tree, run) = run_lines(&["frobnicate the widget"], RunOptions::default());
        assert_eq!(run.severity(), ScenarioSeverity::HardFail);
        assert!(tree.node(tree.first_child(tree.root()).unwrap()).is_hard_failed());
    }

    #[test]
    fn test_ignore_failures() {
        let (_, run) = run_lines(
            &["fail \"tolerated\" [[!IGNORE_FAILURES]]", "print \"next\""],
            RunOptions::default(),
        );
        assert_eq!(run.severity(), ScenarioSeverity::None);
        assert_eq!(run.log(), &["next".to_string()]);
    }

    #[test]
    fn test_template_is_replaced_before_running() {
        let (tree, run) = run_lines(
            &["set \"who\" to \"ada\"", "print \"hi ${who}\"", "> print \"nested\""],
            RunOptions::default(),
        );
        assert_eq!(run.log(), &["hi ada".to_string(), "nested".to_string()]);

        let root = tree.root();
        let resolved = tree.node(root).children()[1];
        assert_eq!(tree.node(resolved).text(), "print \"hi ada\"");
        let template = tree.node(resolved).template_source().unwrap();
        assert!(tree.node(template).parent().is_none());
        assert!(!tree.node(root).children().contains(&template));
        assert!(tree.node(resolved).action().is_some());
        tree.validate().unwrap();
    }

    #[test]
    fn test_let_is_visible_to_children_only() {
        let (_, run) = run_lines(
            &[
                "let \"x\" be \"inner\"",
                "> print \"${x}\"",
                "print \"${x}\"",
            ],
            RunOptions::default(),
        );
        assert_eq!(run.log(), &["inner".to_string(), "${x}".to_string()]);
    }

    #[test]
    fn test_end_scenario_completes_without_failing() {
        let (_, run) = run_lines(
            &["end scenario", "print \"not reached\"", "print \"tidy\" [[!ALWAYS_RUN]]"],
            RunOptions::default(),
        );
        assert!(run.is_complete());
        assert_eq!(run.severity(), ScenarioSeverity::None);
        assert_eq!(run.log(), &["tidy".to_string()]);
    }

    #[test]
    fn test_propagated_flags_run_whole_cleanup_block() {
        let (_, run) = run_lines(
            &[
                "fail \"boom\"",
                "print \"cleanup\" [[!ALWAYS_RUN !PROPAGATE]]",
                "> print \"step one\"",
                ">> print \"step two\"",
            ],
            RunOptions::default(),
        );
        assert_eq!(
            run.log(),
            &["cleanup".to_string(), "step one".to_string(), "step two".to_string()]
        );
    }
}
