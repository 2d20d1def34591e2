//! Conditional directive state machine
//!
//! An `ELSE:`/`ELSE-IF:` node only ever looks at its immediately preceding
//! sibling. When that sibling did not end up FALSE the branch is bypassed;
//! otherwise the ELSE is rewritten into an equivalent IF and evaluated like
//! one. Evaluation either gates the node's children (`true`/`false`) or
//! produces a replacement step that is inserted as the next sibling.

use crate::common::Result;
use crate::tree::{ConditionalState, NodeId, NodeKind, StepTree};

use super::expression::ExpressionEvaluator;

const ELSE_IF: &str = "ELSE-IF:";
const ELSE: &str = "ELSE:";

/// Evaluate the conditional directive at `id`
///
/// On error the node is left with `SKIP_CHILDREN` so a broken directive
/// never runs its branch.
pub fn evaluate(tree: &mut StepTree, id: NodeId, evaluator: &dyn ExpressionEvaluator) -> Result<()> {
    let text = tree.node(id).text().trim().to_string();

    if let Some((rest, is_else_if)) = else_branch(&text) {
        let previous_false = tree
            .node(id)
            .previous_sibling()
            .map(|previous| tree.node(previous).has_state(ConditionalState::False))
            .unwrap_or(false);

        if !previous_false {
            tracing::debug!(node = %id, "branch bypassed, previous sibling was not FALSE");
            tree.set_states(id, &[ConditionalState::SkipChildren]);
            return Ok(());
        }

        if is_else_if {
            tree.set_text(id, format!("IF: {}", rest));
        } else if rest.is_empty() {
            tree.set_states(id, &[ConditionalState::True]);
            return Ok(());
        } else {
            tree.set_text(id, format!("IF: true THEN: {}", rest));
        }
    }

    let expression = tree.node(id).text().to_string();
    let scope = tree.node(id).context();
    let result = match evaluator.eval(&expression, tree.contexts(), scope) {
        Ok(result) => result,
        Err(e) => {
            tree.set_states(id, &[ConditionalState::SkipChildren]);
            return Err(e);
        }
    };

    match result.trim() {
        "false" => tree.set_states(id, &[ConditionalState::False, ConditionalState::SkipChildren]),
        "true" => tree.set_states(id, &[ConditionalState::True]),
        replacement => {
            tree.set_states(id, &[ConditionalState::SkipChildren]);
            let substitute = insert_replacement(tree, id, replacement);
            tracing::debug!(
                node = %id,
                replacement = %substitute,
                text = replacement,
                "directive expanded into a replacement step"
            );
        }
    }
    Ok(())
}

/// Body of an ELSE-family directive and whether it is an ELSE-IF
fn else_branch(text: &str) -> Option<(&str, bool)> {
    if let Some(rest) = text.strip_prefix(ELSE_IF) {
        Some((rest.trim(), true))
    } else {
        text.strip_prefix(ELSE).map(|rest| (rest.trim(), false))
    }
}

fn insert_replacement(tree: &mut StepTree, id: NodeId, text: &str) -> NodeId {
    let (level, tags, flags) = {
        let node = tree.node(id);
        (node.nesting_level(), node.tags().clone(), node.flags().clone())
    };
    let replacement = tree.create_node(NodeKind::classify(text), text);
    {
        let node = tree.node_mut(replacement);
        node.nesting_level = level;
        node.tags = tags;
        node.flags = flags;
    }
    tree.insert_next_sibling(id, replacement);
    tree.set_states(replacement, &[ConditionalState::True]);
    replacement
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::expression::DirectiveEvaluator;
    use crate::tree::StepSource;

    fn build(lines: &[&str]) -> (StepTree, Vec<NodeId>) {
        let sources: Vec<_> = lines.iter().map(|l| StepSource::authored(l).unwrap()).collect();
        let tree = StepTree::from_steps("root", &sources).unwrap();
        let top = tree.node(tree.root()).children().to_vec();
        (tree, top)
    }

    fn states(tree: &StepTree, id: NodeId) -> Vec<ConditionalState> {
        tree.node(id).conditional_states().iter().copied().collect()
    }

    #[test]
    fn test_if_true_and_false() {
        let (mut tree, ids) = build(&["IF: true", "IF: false"]);
        evaluate(&mut tree, ids[0], &DirectiveEvaluator).unwrap();
        evaluate(&mut tree, ids[1], &DirectiveEvaluator).unwrap();
        assert_eq!(states(&tree, ids[0]), vec![ConditionalState::True]);
        assert_eq!(
            states(&tree, ids[1]),
            vec![ConditionalState::False, ConditionalState::SkipChildren]
        );
    }

    #[test]
    fn test_reevaluation_is_idempotent() {
        let (mut tree, ids) = build(&["IF: ${n} > 1"]);
        let root_ctx = tree.root_context();
        tree.contexts_mut().set(root_ctx, "n", "5");
        evaluate(&mut tree, ids[0], &DirectiveEvaluator).unwrap();
        let first = states(&tree, ids[0]);
        evaluate(&mut tree, ids[0], &DirectiveEvaluator).unwrap();
        assert_eq!(states(&tree, ids[0]), first);
        assert_eq!(first, vec![ConditionalState::True]);
    }

    #[test]
    fn test_else_after_true_is_bypassed() {
        let (mut tree, ids) = build(&["IF: true", "ELSE: print \"no\"", "IF: true", "ELSE-IF: false"]);
        evaluate(&mut tree, ids[0], &DirectiveEvaluator).unwrap();
        evaluate(&mut tree, ids[1], &DirectiveEvaluator).unwrap();
        assert_eq!(states(&tree, ids[1]), vec![ConditionalState::SkipChildren]);
        assert_eq!(tree.node(ids[1]).text(), "ELSE: print \"no\"");
        assert_eq!(tree.node(ids[1]).next_sibling(), Some(ids[2]));

        evaluate(&mut tree, ids[2], &DirectiveEvaluator).unwrap();
        evaluate(&mut tree, ids[3], &DirectiveEvaluator).unwrap();
        assert_eq!(states(&tree, ids[3]), vec![ConditionalState::SkipChildren]);
        assert_eq!(tree.node(ids[3]).text(), "ELSE-IF: false");
    }

    #[test]
    fn test_else_without_evaluated_previous_is_bypassed() {
        let (mut tree, ids) = build(&["print \"x\"", "ELSE:"]);
        evaluate(&mut tree, ids[1], &DirectiveEvaluator).unwrap();
        assert_eq!(states(&tree, ids[1]), vec![ConditionalState::SkipChildren]);
    }

    #[test]
    fn test_bare_else_after_false_is_true() {
        let (mut tree, ids) = build(&["IF: false", "ELSE:"]);
        evaluate(&mut tree, ids[0], &DirectiveEvaluator).unwrap();
        evaluate(&mut tree, ids[1], &DirectiveEvaluator).unwrap();
        assert_eq!(states(&tree, ids[1]), vec![ConditionalState::True]);
    }

    #[test]
    fn test_else_with_step_behaves_like_if_true_then() {
        let (mut tree, ids) = build(&["IF: false", "ELSE: print \"fallback\""]);
        let (mut reference, ref_ids) = build(&["IF: true THEN: print \"fallback\""]);

        evaluate(&mut tree, ids[0], &DirectiveEvaluator).unwrap();
        evaluate(&mut tree, ids[1], &DirectiveEvaluator).unwrap();
        evaluate(&mut reference, ref_ids[0], &DirectiveEvaluator).unwrap();

        assert_eq!(tree.node(ids[1]).text(), "IF: true THEN: print \"fallback\"");
        assert_eq!(states(&tree, ids[1]), states(&reference, ref_ids[0]));
        assert_eq!(states(&tree, ids[1]), vec![ConditionalState::SkipChildren]);

        let inserted = tree.node(ids[1]).next_sibling().unwrap();
        let ref_inserted = reference.node(ref_ids[0]).next_sibling().unwrap();
        assert_eq!(tree.node(inserted).text(), reference.node(ref_inserted).text());
        assert_eq!(tree.node(inserted).text(), "print \"fallback\"");
        assert_eq!(states(&tree, inserted), vec![ConditionalState::True]);
        assert_eq!(tree.node(inserted).kind(), NodeKind::AtomicStep);
        tree.validate().unwrap();
    }

    #[test]
    fn test_else_if_behaves_like_if() {
        for (condition, expected) in [
            ("true", vec![ConditionalState::True]),
            ("false", vec![ConditionalState::False, ConditionalState::SkipChildren]),
        ] {
            let (mut tree, ids) = build(&["IF: false", format!("ELSE-IF: {}", condition).as_str()]);
            let (mut reference, ref_ids) = build(&[format!("IF: {}", condition).as_str()]);
            evaluate(&mut tree, ids[0], &DirectiveEvaluator).unwrap();
            evaluate(&mut tree, ids[1], &DirectiveEvaluator).unwrap();
            evaluate(&mut reference, ref_ids[0], &DirectiveEvaluator).unwrap();
            assert_eq!(states(&tree, ids[1]), expected);
            assert_eq!(states(&reference, ref_ids[0]), expected);
        }
    }

    #[test]
    fn test_chained_else_if() {
        let (mut tree, ids) = build(&["IF: false", "ELSE-IF: false", "ELSE-IF: true", "ELSE:"]);
        for id in &ids {
            evaluate(&mut tree, *id, &DirectiveEvaluator).unwrap();
        }
        assert!(tree.node(ids[1]).has_state(ConditionalState::False));
        assert_eq!(states(&tree, ids[2]), vec![ConditionalState::True]);
        assert_eq!(states(&tree, ids[3]), vec![ConditionalState::SkipChildren]);
    }

    #[test]
    fn test_replacement_inserted_before_next_sibling() {
        let (mut tree, ids) = build(&["IF: true THEN: print \"swap\" [[@t]]", "> child", "after"]);
        evaluate(&mut tree, ids[0], &DirectiveEvaluator).unwrap();
        let inserted = tree.node(ids[0]).next_sibling().unwrap();
        assert_eq!(tree.node(inserted).next_sibling(), Some(ids[1]));
        assert_eq!(tree.node(tree.root()).children(), &[ids[0], inserted, ids[1]]);
        assert!(tree.node(inserted).tags().contains("t"));
        assert!(tree.node(ids[0]).has_state(ConditionalState::SkipChildren));
        tree.validate().unwrap();
    }

    #[test]
    fn test_broken_directive_skips_children() {
        let (mut tree, ids) = build(&["IF: perhaps", "> child"]);
        let err = evaluate(&mut tree, ids[0], &DirectiveEvaluator).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidExpression { .. }));
        assert_eq!(states(&tree, ids[0]), vec![ConditionalState::SkipChildren]);
    }
}
