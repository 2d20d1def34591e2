//! Hierarchical data context
//!
//! Every node owns a scope that overlays its parent's scope. Lookups walk up
//! the chain at read time, so values set on an ancestor later in the run are
//! still visible; writes only ever land in the scope they are made on.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Handle of a scope inside a [`ContextStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(usize);

#[derive(Debug, Clone, Default)]
struct Scope {
    parent: Option<ContextId>,
    values: BTreeMap<String, String>,
}

/// Arena of scopes owned by one step tree
#[derive(Debug, Clone, Default)]
pub struct ContextStore {
    scopes: Vec<Scope>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope with no parent
    pub fn root(&mut self) -> ContextId {
        self.push(None)
    }

    /// Create an empty scope layered over `parent`
    pub fn overlay(&mut self, parent: ContextId) -> ContextId {
        self.push(Some(parent))
    }

    fn push(&mut self, parent: Option<ContextId>) -> ContextId {
        self.scopes.push(Scope {
            parent,
            values: BTreeMap::new(),
        });
        ContextId(self.scopes.len() - 1)
    }

    pub fn parent(&self, id: ContextId) -> Option<ContextId> {
        self.scopes[id.0].parent
    }

    /// Look a key up in `id` and then its ancestors
    pub fn get(&self, id: ContextId, key: &str) -> Option<&str> {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let scope = &self.scopes[current.0];
            if let Some(value) = scope.values.get(key) {
                return Some(value);
            }
            cursor = scope.parent;
        }
        None
    }

    /// Set a key in this scope only
    pub fn set(&mut self, id: ContextId, key: impl Into<String>, value: impl Into<String>) {
        self.scopes[id.0].values.insert(key.into(), value.into());
    }

    /// Every key visible from `id`, nearest scope winning
    pub fn entries(&self, id: ContextId) -> BTreeMap<String, String> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            chain.push(current);
            cursor = self.scopes[current.0].parent;
        }
        let mut merged = BTreeMap::new();
        for scope in chain.into_iter().rev() {
            for (key, value) in &self.scopes[scope.0].values {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    /// Replace `${key}` and `<key>` placeholders with visible values
    ///
    /// Unknown placeholders are left untouched.
    pub fn resolve_placeholders(&self, id: ContextId, text: &str) -> String {
        placeholder_regex()
            .replace_all(text, |caps: &Captures<'_>| {
                let key = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                match self.get(id, key) {
                    Some(value) => value.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\{([^}\s]+)\}|<([A-Za-z_][A-Za-z0-9_.-]*)>")
            .unwrap_or_else(|e| panic!("placeholder pattern is valid: {e}"))
    })
}

/// Whether text contains anything that looks like a placeholder
pub fn has_placeholder(text: &str) -> bool {
    placeholder_regex().is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_reads_through_to_parent() {
        let mut store = ContextStore::new();
        let root = store.root();
        store.set(root, "user", "alice");
        let child = store.overlay(root);
        assert_eq!(store.get(child, "user"), Some("alice"));
    }

    #[test]
    fn test_writes_never_leak_upward() {
        let mut store = ContextStore::new();
        let root = store.root();
        let child = store.overlay(root);
        store.set(child, "local", "1");
        assert_eq!(store.get(child, "local"), Some("1"));
        assert_eq!(store.get(root, "local"), None);
    }

    #[test]
    fn test_overlay_shadows_parent() {
        let mut store = ContextStore::new();
        let root = store.root();
        store.set(root, "k", "outer");
        let child = store.overlay(root);
        store.set(child, "k", "inner");
        assert_eq!(store.get(child, "k"), Some("inner"));
        assert_eq!(store.get(root, "k"), Some("outer"));
        assert_eq!(store.entries(child).get("k").map(String::as_str), Some("inner"));
    }

    #[test]
    fn test_late_parent_writes_are_visible() {
        let mut store = ContextStore::new();
        let root = store.root();
        let child = store.overlay(root);
        store.set(root, "later", "yes");
        assert_eq!(store.get(child, "later"), Some("yes"));
    }

    #[test]
    fn test_resolve_placeholders() {
        let mut store = ContextStore::new();
        let root = store.root();
        store.set(root, "total", "12");
        store.set(root, "card", "visa");
        let text = store.resolve_placeholders(root, "pay ${total} by <card> <missing> ${nope}");
        assert_eq!(text, "pay 12 by visa <missing> ${nope}");
    }

    #[test]
    fn test_has_placeholder() {
        assert!(has_placeholder("print \"${x}\""));
        assert!(has_placeholder("pay with <card>"));
        assert!(!has_placeholder("IF: 1 < 2"));
        assert!(!has_placeholder("print \"plain\""));
    }
}
