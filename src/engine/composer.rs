//! `RUN SCENARIOS:` directive expansion
//!
//! A composer node is expanded into one name node per matching scenario,
//! each carrying the scenario's steps as children. Lookups that fail or
//! match nothing leave a message node instead of failing the invoker.

use std::path::PathBuf;

use crate::catalog::scenarios::resolve_feature_path;
use crate::catalog::ScenarioCatalog;
use crate::common::{Error, Result};
use crate::tree::node::COMPOSER_PREFIX;
use crate::tree::{NodeId, NodeKind, StepTree};

use super::controller::ScenarioRunContext;

/// Composer directives may nest through the scenarios they pull in, but
/// not without bound
const MAX_COMPOSITION_DEPTH: usize = 16;

/// One `{tag filter, feature paths}` query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionRow {
    pub tag_filter: String,
    pub paths: Vec<String>,
}

/// Read the queries of a composer directive
///
/// Either inline, `RUN SCENARIOS: @smoke IN a.yaml, b.yaml`, or as a data
/// table of `[filter, paths]` rows. A header row starting with `tags` is
/// ignored.
pub fn parse_rows(text: &str, table: &[Vec<String>]) -> Result<Vec<CompositionRow>> {
    let inline = text
        .trim()
        .strip_prefix(COMPOSER_PREFIX)
        .ok_or_else(|| Error::UndefinedDirective(text.to_string()))?
        .trim();

    let mut rows = Vec::new();
    if !inline.is_empty() {
        let (filter, paths) = if let Some(paths) = inline.strip_prefix("IN ") {
            ("", paths)
        } else {
            inline
                .split_once(" IN ")
                .ok_or_else(|| Error::UndefinedDirective(text.to_string()))?
        };
        rows.push(CompositionRow {
            tag_filter: filter.trim().to_string(),
            paths: split_paths(paths),
        });
    }

    for (index, row) in table.iter().enumerate() {
        let first = row.first().map(|c| c.trim()).unwrap_or_default();
        if index == 0 && first.eq_ignore_ascii_case("tags") {
            continue;
        }
        match row.as_slice() {
            [filter, paths, ..] => rows.push(CompositionRow {
                tag_filter: filter.trim().to_string(),
                paths: split_paths(paths),
            }),
            _ => {
                return Err(Error::UndefinedDirective(format!(
                    "{} (table row {} needs a filter and paths)",
                    text,
                    index + 1
                )))
            }
        }
    }

    if rows.is_empty() {
        return Err(Error::UndefinedDirective(text.to_string()));
    }
    Ok(rows)
}

fn split_paths(paths: &str) -> Vec<String> {
    paths
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Grafts matching scenarios under composer nodes
pub struct ScenarioComposer<'a> {
    catalog: &'a dyn ScenarioCatalog,
}

impl<'a> ScenarioComposer<'a> {
    pub fn new(catalog: &'a dyn ScenarioCatalog) -> Self {
        Self { catalog }
    }

    /// Expand the composer node `id`; returns how many scenarios were grafted
    pub fn compose(&self, tree: &mut StepTree, id: NodeId, run: &ScenarioRunContext) -> Result<usize> {
        if composition_depth(tree, id) > MAX_COMPOSITION_DEPTH {
            return Err(Error::HardFailure(format!(
                "scenario composition nested deeper than {} levels",
                MAX_COMPOSITION_DEPTH
            )));
        }

        let (text, table) = {
            let node = tree.node(id);
            let scope = node.context();
            let contexts = tree.contexts();
            let text = contexts.resolve_placeholders(scope, node.text());
            let table: Vec<Vec<String>> = node
                .table()
                .iter()
                .map(|row| row.iter().map(|c| contexts.resolve_placeholders(scope, c)).collect())
                .collect();
            (text, table)
        };

        let mut grafted = 0;
        for row in parse_rows(&text, &table)? {
            let paths: Vec<PathBuf> = row
                .paths
                .iter()
                .map(|p| resolve_feature_path(run.base_dir(), p))
                .collect();

            let matches = match self.catalog.find(&row.tag_filter, &paths) {
                Ok(matches) => matches,
                Err(e) => {
                    tracing::warn!(node = %id, error = %e, "scenario lookup failed");
                    add_message(tree, id, e.to_string());
                    continue;
                }
            };
            if matches.is_empty() {
                let message = format!(
                    "No scenarios match '{}' in [{}]",
                    row.tag_filter,
                    row.paths.join(", ")
                );
                tracing::warn!(node = %id, "{}", message);
                add_message(tree, id, message);
                continue;
            }

            for descriptor in &matches {
                let name = add_message(tree, id, descriptor.title());
                tree.node_mut(name).tags = descriptor.tags.clone();
                if let Some(data) = &descriptor.example_data {
                    let scope = tree.node(name).context();
                    for (key, value) in data {
                        tree.contexts_mut().set(scope, key, value);
                    }
                }
                tree.graft_steps(name, &descriptor.steps)?;
                grafted += 1;
            }
            tracing::debug!(node = %id, filter = %row.tag_filter, count = matches.len(), "scenarios grafted");
        }
        Ok(grafted)
    }
}

/// Append a message node one level below `parent`
fn add_message(tree: &mut StepTree, parent: NodeId, text: String) -> NodeId {
    let level = tree.node(parent).nesting_level() + 1;
    let id = tree.create_node(NodeKind::MessageStep, text);
    tree.node_mut(id).nesting_level = level;
    tree.append_child(parent, id);
    id
}

fn composition_depth(tree: &StepTree, id: NodeId) -> usize {
    let mut depth = 0;
    let mut cursor = Some(id);
    while let Some(current) = cursor {
        if tree.node(current).kind() == NodeKind::ScenarioComposerDirective {
            depth += 1;
        }
        cursor = tree.node(current).parent();
    }
    depth
}
