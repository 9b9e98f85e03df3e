//! `$ref` / `$dynamicRef` resolution against anchors, JSON Pointers and
//! cross-document URIs.
//!
//! Resolution never allocates schema nodes; it only fills the `resolved`
//! back references. References whose target document is not registered yet
//! are reported back to the compiler, which tracks them on a waitlist and
//! retries when the document arrives — re-running resolution is idempotent.
use ahash::AHashMap;

use crate::{
    error::CompileError,
    schema::{Arena, SchemaId},
    uri,
};

/// Outcome of resolving one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resolution {
    Resolved(SchemaId),
    /// The referenced document is not registered; carries its absolute URI.
    Missing(String),
    /// The reference points inside known documents but matches nothing.
    /// Later registrations cannot fix it.
    Failed,
}

/// Resolve `reference` as written in the schema `owner`.
pub(crate) fn resolve_reference(
    arena: &Arena,
    roots: &AHashMap<String, SchemaId>,
    owner: SchemaId,
    reference: &str,
) -> Result<Resolution, CompileError> {
    let (base, fragment) = uri::split_fragment(reference);
    if base.is_empty() {
        let root = arena.get(owner).root;
        return Ok(resolve_fragment(arena, owner, root, fragment));
    }
    let owner_base = arena.get(owner).base_uri.clone();
    let target_uri = uri::resolve_against(&owner_base, base)?;
    let target_key = target_uri.to_string();
    let root = arena.get(owner).root;
    let document = arena
        .get(root)
        .object()
        .and_then(|object| object.resources.get(&target_key).copied())
        .or_else(|| roots.get(&target_key).copied());
    match document {
        Some(document) => Ok(resolve_fragment(arena, document, document, fragment)),
        None => Ok(Resolution::Missing(target_key)),
    }
}

/// Resolve a fragment against a document: `None`/empty means the document
/// itself, `/...` is a segment-aware pointer walk, anything else an anchor.
fn resolve_fragment(
    arena: &Arena,
    from: SchemaId,
    document: SchemaId,
    fragment: Option<&str>,
) -> Resolution {
    match fragment {
        None | Some("") => Resolution::Resolved(document),
        Some(fragment) if fragment.starts_with('/') => {
            match walk_pointer(arena, document, &uri::pointer_tokens(fragment)) {
                Some(target) => Resolution::Resolved(target),
                None => Resolution::Failed,
            }
        }
        Some(fragment) => {
            let name = uri::decode_pointer_token(fragment);
            match find_anchor(arena, from, &name) {
                Some(target) => Resolution::Resolved(target),
                None => Resolution::Failed,
            }
        }
    }
}

/// Resolve a fragment within a cached document; used by schema lookup by
/// URI reference.
pub(crate) fn resolve_in_document(
    arena: &Arena,
    document: SchemaId,
    fragment: Option<&str>,
) -> Option<SchemaId> {
    match resolve_fragment(arena, document, document, fragment) {
        Resolution::Resolved(target) => Some(target),
        _ => None,
    }
}

/// Search for an anchor: the schema's own `anchors`, then its
/// `dynamic_anchors`, then the same tables walking up the parents.
fn find_anchor(arena: &Arena, from: SchemaId, name: &str) -> Option<SchemaId> {
    let mut current = Some(from);
    while let Some(id) = current {
        if let Some(object) = arena.get(id).object() {
            if let Some(target) = object.anchors.get(name) {
                return Some(*target);
            }
            if let Some(target) = object.dynamic_anchors.get(name) {
                return Some(*target);
            }
        }
        current = arena.get(id).parent;
    }
    None
}

/// Walk a JSON Pointer through the compiled schema tree.
///
/// Tokens are interpreted by position: after `properties`, `$defs`
/// (or the legacy `definitions`), `patternProperties` and
/// `dependentSchemas` the next token names an entry; after `prefixItems`
/// and the list applicators it is a numeric index; single-schema keywords
/// descend directly.
fn walk_pointer(arena: &Arena, start: SchemaId, tokens: &[String]) -> Option<SchemaId> {
    let mut current = start;
    let mut tokens = tokens.iter();
    while let Some(token) = tokens.next() {
        let object = arena.get(current).object()?;
        current = match token.as_str() {
            "properties" => {
                let name = tokens.next()?;
                object.property(name)?
            }
            "patternProperties" => {
                let source = tokens.next()?;
                object
                    .pattern_properties
                    .as_ref()?
                    .iter()
                    .find(|entry| &entry.pattern.source == source)?
                    .schema
            }
            "$defs" | "definitions" => {
                let name = tokens.next()?;
                lookup_named(object.defs.as_ref()?, name)?
            }
            "dependentSchemas" => {
                let name = tokens.next()?;
                lookup_named(object.dependent_schemas.as_ref()?, name)?
            }
            "prefixItems" => indexed(object.prefix_items.as_ref()?, tokens.next()?)?,
            "allOf" => indexed(object.all_of.as_ref()?, tokens.next()?)?,
            "anyOf" => indexed(object.any_of.as_ref()?, tokens.next()?)?,
            "oneOf" => indexed(object.one_of.as_ref()?, tokens.next()?)?,
            "items" => object.items?,
            "contains" => object.contains?,
            "additionalProperties" => object.additional_properties?,
            "propertyNames" => object.property_names?,
            "unevaluatedItems" => object.unevaluated_items?,
            "unevaluatedProperties" => object.unevaluated_properties?,
            "contentSchema" => object.content_schema?,
            "not" => object.not?,
            "if" => object.if_?,
            "then" => object.then?,
            "else" => object.else_?,
            _ => return None,
        };
    }
    Some(current)
}

fn lookup_named(named: &[(String, SchemaId)], name: &str) -> Option<SchemaId> {
    named
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, id)| *id)
}

fn indexed(ids: &[SchemaId], token: &str) -> Option<SchemaId> {
    ids.get(token.parse::<usize>().ok()?).copied()
}

/// A reference whose target document is not registered yet.
#[derive(Debug)]
pub(crate) struct PendingRef {
    pub(crate) owner: SchemaId,
    pub(crate) target_uri: String,
}

/// Resolve the `$ref`/`$dynamicRef` of every node in `nodes`, filling the
/// `resolved` back references. Returns the references still waiting on
/// unregistered documents.
pub(crate) fn resolve_nodes(
    arena: &mut Arena,
    roots: &AHashMap<String, SchemaId>,
    nodes: &[SchemaId],
    strict: bool,
) -> Result<Vec<PendingRef>, CompileError> {
    let mut pending = Vec::new();
    for id in nodes {
        for dynamic in [false, true] {
            let reference = {
                let Some(object) = arena.get(*id).object() else {
                    continue;
                };
                let field = if dynamic {
                    object.dynamic_ref.as_ref()
                } else {
                    object.ref_.as_ref()
                };
                match field {
                    Some(reference) if reference.resolved.is_none() => {
                        reference.reference.clone()
                    }
                    _ => continue,
                }
            };
            match resolve_reference(arena, roots, *id, &reference)? {
                Resolution::Resolved(target) => {
                    let object = arena
                        .get_mut(*id)
                        .object_mut()
                        .expect("checked to be an object above");
                    let field = if dynamic {
                        object.dynamic_ref.as_mut()
                    } else {
                        object.ref_.as_mut()
                    };
                    if let Some(field) = field {
                        field.resolved = Some(target);
                    }
                    tracing::trace!(reference = %reference, "resolved reference");
                }
                Resolution::Missing(target_uri) => {
                    if strict {
                        return Err(CompileError::UnresolvableRef { reference });
                    }
                    pending.push(PendingRef {
                        owner: *id,
                        target_uri,
                    });
                }
                Resolution::Failed => {
                    if strict {
                        return Err(CompileError::UnresolvableRef { reference });
                    }
                    // Left unresolved; evaluation reports `ref_unresolved`.
                }
            }
        }
    }
    Ok(pending)
}

#[cfg(test)]
mod tests {
    use super::{resolve_nodes, resolve_reference, Resolution};
    use crate::schema::{parse_document, Arena};
    use crate::uri::DEFAULT_BASE_URI;
    use ahash::AHashMap;
    use serde_json::json;

    fn setup(value: serde_json::Value) -> (Arena, crate::schema::ParsedDocument) {
        let mut arena = Arena::default();
        let parsed = parse_document(&mut arena, &value, DEFAULT_BASE_URI.clone()).unwrap();
        (arena, parsed)
    }

    #[test]
    fn empty_fragment_resolves_to_root() {
        let (arena, parsed) = setup(json!({"properties": {"x": {"$ref": "#"}}}));
        let child = arena.get(parsed.root).object().unwrap().property("x").unwrap();
        let outcome =
            resolve_reference(&arena, &AHashMap::new(), child, "#").unwrap();
        assert_eq!(outcome, Resolution::Resolved(parsed.root));
    }

    #[test]
    fn pointer_walk_is_segment_aware() {
        let (arena, parsed) = setup(json!({
            "$defs": {"pos": {"type": "integer", "minimum": 0}},
            "properties": {"x": {"$ref": "#/$defs/pos"}},
            "prefixItems": [{"type": "string"}]
        }));
        let pos = resolve_reference(&arena, &AHashMap::new(), parsed.root, "#/$defs/pos").unwrap();
        let Resolution::Resolved(pos) = pos else {
            panic!("expected resolution");
        };
        assert_eq!(arena.get(pos).pointer, "/$defs/pos");
        let first = resolve_reference(&arena, &AHashMap::new(), parsed.root, "#/prefixItems/0")
            .unwrap();
        assert!(matches!(first, Resolution::Resolved(_)));
        let missing = resolve_reference(&arena, &AHashMap::new(), parsed.root, "#/$defs/nope")
            .unwrap();
        assert_eq!(missing, Resolution::Failed);
    }

    #[test]
    fn escaped_pointer_tokens() {
        let (arena, parsed) = setup(json!({
            "properties": {"a/b": {"type": "string"}, "m~n": true}
        }));
        for reference in ["#/properties/a~1b", "#/properties/m~0n"] {
            let outcome =
                resolve_reference(&arena, &AHashMap::new(), parsed.root, reference).unwrap();
            assert!(matches!(outcome, Resolution::Resolved(_)), "{reference}");
        }
    }

    #[test]
    fn anchor_search_walks_up_parents() {
        let (arena, parsed) = setup(json!({
            "$defs": {"target": {"$anchor": "here", "type": "integer"}},
            "properties": {"x": {"$ref": "#here"}}
        }));
        let child = arena.get(parsed.root).object().unwrap().property("x").unwrap();
        let outcome = resolve_reference(&arena, &AHashMap::new(), child, "#here").unwrap();
        let Resolution::Resolved(target) = outcome else {
            panic!("anchor should resolve");
        };
        assert_eq!(arena.get(target).pointer, "/$defs/target");
    }

    #[test]
    fn cross_document_misses_are_reported() {
        let (mut arena, parsed) = setup(json!({"$ref": "https://example.com/other.json"}));
        let pending = resolve_nodes(
            &mut arena,
            &AHashMap::new(),
            &parsed.new_nodes,
            false,
        )
        .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].target_uri, "https://example.com/other.json");
    }

    #[test]
    fn strict_mode_rejects_unresolvable_references() {
        let (mut arena, parsed) = setup(json!({"$ref": "#/nope"}));
        let error =
            resolve_nodes(&mut arena, &AHashMap::new(), &parsed.new_nodes, true).unwrap_err();
        assert!(error.to_string().contains("unresolvable reference"));
    }

    #[test]
    fn resolution_is_idempotent() {
        let (mut arena, parsed) = setup(json!({"$ref": "#"}));
        resolve_nodes(&mut arena, &AHashMap::new(), &parsed.new_nodes, false).unwrap();
        let first = arena
            .get(parsed.root)
            .object()
            .unwrap()
            .ref_
            .as_ref()
            .unwrap()
            .resolved;
        resolve_nodes(&mut arena, &AHashMap::new(), &parsed.new_nodes, false).unwrap();
        let second = arena
            .get(parsed.root)
            .object()
            .unwrap()
            .ref_
            .as_ref()
            .unwrap()
            .resolved;
        assert_eq!(first, second);
        assert_eq!(first, Some(parsed.root));
    }
}
