//! The dynamic scope: the stack of schemas entered by the evaluator.
//!
//! Consulted for `$dynamicAnchor` lookup (outermost scope first) and for
//! cycle detection. The scope is strictly per validation call and never
//! shared.
use crate::schema::{Arena, SchemaId};

#[derive(Debug, Default)]
pub(crate) struct DynamicScope {
    entries: Vec<SchemaId>,
}

impl DynamicScope {
    pub(crate) fn new() -> DynamicScope {
        DynamicScope::default()
    }

    pub(crate) fn push(&mut self, id: SchemaId) {
        self.entries.push(id);
    }

    pub(crate) fn pop(&mut self) {
        self.entries.pop();
    }

    /// How many times `id` is already on the stack.
    pub(crate) fn occurrences(&self, id: SchemaId) -> usize {
        self.entries.iter().filter(|entry| **entry == id).count()
    }

    /// Find the first schema, walking from the outermost scope inwards, that
    /// declares `$dynamicAnchor: name`.
    pub(crate) fn lookup_dynamic_anchor(&self, arena: &Arena, name: &str) -> Option<SchemaId> {
        for id in &self.entries {
            if let Some(object) = arena.get(*id).object() {
                if let Some(target) = object.dynamic_anchors.get(name) {
                    return Some(*target);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::DynamicScope;
    use crate::schema::{parse_document, Arena};
    use crate::uri::DEFAULT_BASE_URI;
    use serde_json::json;

    #[test]
    fn occurrence_counting() {
        let mut arena = Arena::default();
        let parsed = parse_document(&mut arena, &json!({}), DEFAULT_BASE_URI.clone()).unwrap();
        let mut scope = DynamicScope::new();
        assert_eq!(scope.occurrences(parsed.root), 0);
        scope.push(parsed.root);
        scope.push(parsed.root);
        assert_eq!(scope.occurrences(parsed.root), 2);
        scope.pop();
        assert_eq!(scope.occurrences(parsed.root), 1);
    }

    #[test]
    fn outermost_dynamic_anchor_wins() {
        let mut arena = Arena::default();
        let outer = parse_document(
            &mut arena,
            &json!({"$dynamicAnchor": "node"}),
            DEFAULT_BASE_URI.clone(),
        )
        .unwrap();
        let inner = parse_document(
            &mut arena,
            &json!({"$dynamicAnchor": "node"}),
            DEFAULT_BASE_URI.clone(),
        )
        .unwrap();
        let mut scope = DynamicScope::new();
        scope.push(outer.root);
        scope.push(inner.root);
        assert_eq!(
            scope.lookup_dynamic_anchor(&arena, "node"),
            Some(outer.root)
        );
    }
}
