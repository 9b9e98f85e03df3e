//! The compiled schema model: an arena of tagged schema nodes carrying the
//! full draft 2020-12 keyword set.
//!
//! The compiler exclusively owns every schema it compiles; nodes reference
//! each other through [`SchemaId`] back references, never through ownership.
//! Reference targets are filled in after parsing (possibly much later, when a
//! missing document is registered), everything else is immutable once
//! compilation returns.
use ahash::AHashMap;
use serde_json::{Map, Number, Value};
use url::Url;

use crate::{ecma, error::CompileError, uri};

/// Index of a schema node within the compiler's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct SchemaId(u32);

/// Owner of all compiled schema nodes.
#[derive(Debug, Default)]
pub(crate) struct Arena {
    nodes: Vec<SchemaNode>,
}

impl Arena {
    pub(crate) fn get(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.0 as usize]
    }

    pub(crate) fn get_mut(&mut self, id: SchemaId) -> &mut SchemaNode {
        &mut self.nodes[id.0 as usize]
    }

    fn alloc(&mut self, node: SchemaNode) -> SchemaId {
        let id = SchemaId(u32::try_from(self.nodes.len()).expect("schema arena overflow"));
        self.nodes.push(node);
        id
    }
}

/// A single compiled schema: either a boolean schema or a keyword schema.
#[derive(Debug)]
pub(crate) struct SchemaNode {
    /// Base URI of the nearest enclosing resource (`$id` boundary).
    pub(crate) base_uri: Url,
    /// JSON Pointer from the nearest resource root to this schema.
    pub(crate) pointer: String,
    pub(crate) parent: Option<SchemaId>,
    /// Document root this schema was compiled under.
    pub(crate) root: SchemaId,
    pub(crate) kind: SchemaKind,
}

#[derive(Debug)]
pub(crate) enum SchemaKind {
    Bool(bool),
    Object(Box<ObjectSchema>),
}

impl SchemaNode {
    pub(crate) fn object(&self) -> Option<&ObjectSchema> {
        match &self.kind {
            SchemaKind::Object(object) => Some(object),
            SchemaKind::Bool(_) => None,
        }
    }

    pub(crate) fn object_mut(&mut self) -> Option<&mut ObjectSchema> {
        match &mut self.kind {
            SchemaKind::Object(object) => Some(object),
            SchemaKind::Bool(_) => None,
        }
    }

    /// Absolute URI plus fragment identifying this schema, e.g.
    /// `https://example.com/s.json#/$defs/pos`, or `#/$defs/pos` for
    /// documents compiled without an identifier.
    pub(crate) fn location(&self) -> String {
        if uri::is_default_base(&self.base_uri) {
            format!("#{}", self.pointer)
        } else {
            format!("{}#{}", self.base_uri, self.pointer)
        }
    }
}

/// A `$ref` or `$dynamicRef` keyword.
///
/// The reference string is preserved verbatim; `resolved` is a back
/// reference filled during (possibly deferred) resolution.
#[derive(Debug, Clone)]
pub(crate) struct Reference {
    pub(crate) reference: String,
    pub(crate) resolved: Option<SchemaId>,
    /// Plain-name fragment, kept for `$dynamicRef` scope rebinding.
    pub(crate) anchor: Option<String>,
}

impl Reference {
    fn new(reference: &str) -> Reference {
        let anchor = match uri::split_fragment(reference) {
            (_, Some(fragment)) if !fragment.is_empty() && !fragment.starts_with('/') => {
                Some(uri::decode_pointer_token(fragment))
            }
            _ => None,
        };
        Reference {
            reference: reference.to_string(),
            resolved: None,
            anchor,
        }
    }
}

/// A compiled `pattern` keyword.
#[derive(Debug)]
pub(crate) struct CompiledPattern {
    pub(crate) source: String,
    pub(crate) regex: fancy_regex::Regex,
}

impl CompiledPattern {
    pub(crate) fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value).unwrap_or(false)
    }
}

/// One `patternProperties` entry.
#[derive(Debug)]
pub(crate) struct PatternSchema {
    pub(crate) pattern: CompiledPattern,
    pub(crate) schema: SchemaId,
}

/// Ordered name → subschema pairs; source order drives error determinism.
pub(crate) type NamedSchemas = Vec<(String, SchemaId)>;

/// The set of primitive type names accepted by the `type` keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PrimitiveType {
    Array,
    Boolean,
    Integer,
    Null,
    Number,
    Object,
    String,
}

impl PrimitiveType {
    pub(crate) fn from_name(name: &str) -> Option<PrimitiveType> {
        match name {
            "array" => Some(PrimitiveType::Array),
            "boolean" => Some(PrimitiveType::Boolean),
            "integer" => Some(PrimitiveType::Integer),
            "null" => Some(PrimitiveType::Null),
            "number" => Some(PrimitiveType::Number),
            "object" => Some(PrimitiveType::Object),
            "string" => Some(PrimitiveType::String),
            _ => None,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            PrimitiveType::Array => "array",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Null => "null",
            PrimitiveType::Number => "number",
            PrimitiveType::Object => "object",
            PrimitiveType::String => "string",
        }
    }
}

/// The primitive type of an instance value. Numbers always report as
/// `number`; the `integer` refinement happens in the `type` check.
pub(crate) fn primitive_type_of(instance: &Value) -> PrimitiveType {
    match instance {
        Value::Null => PrimitiveType::Null,
        Value::Bool(_) => PrimitiveType::Boolean,
        Value::Number(_) => PrimitiveType::Number,
        Value::String(_) => PrimitiveType::String,
        Value::Array(_) => PrimitiveType::Array,
        Value::Object(_) => PrimitiveType::Object,
    }
}

/// A set of primitive types stored as a bitmap, preserving nothing but
/// membership; names render in canonical order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct TypeSet(u8);

const ALL_TYPES: [PrimitiveType; 7] = [
    PrimitiveType::Array,
    PrimitiveType::Boolean,
    PrimitiveType::Integer,
    PrimitiveType::Null,
    PrimitiveType::Number,
    PrimitiveType::Object,
    PrimitiveType::String,
];

impl TypeSet {
    fn insert(&mut self, ty: PrimitiveType) {
        self.0 |= 1 << ty as u8;
    }

    pub(crate) fn contains(self, ty: PrimitiveType) -> bool {
        self.0 & (1 << ty as u8) != 0
    }

    pub(crate) fn names(self) -> Vec<String> {
        ALL_TYPES
            .iter()
            .filter(|ty| self.contains(**ty))
            .map(|ty| ty.name().to_string())
            .collect()
    }
}

/// How deep the evaluator may re-enter this schema before switching to the
/// reference-free degraded mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RecursionClass {
    /// The schema is a metaschema (its `$id` mentions `json-schema.org`).
    Metaschema,
    /// The schema references itself by design (`$ref: "#"` in a child).
    SelfReferential,
    Default,
}

impl RecursionClass {
    pub(crate) fn allowance(self) -> usize {
        match self {
            RecursionClass::Metaschema => 5,
            RecursionClass::SelfReferential => 10,
            RecursionClass::Default => 3,
        }
    }
}

/// A keyword schema. Every field is optional; absence means "no constraint".
#[derive(Debug, Default)]
pub(crate) struct ObjectSchema {
    // Identifiers.
    pub(crate) id: Option<String>,
    pub(crate) dialect: Option<String>,
    pub(crate) anchor: Option<String>,
    pub(crate) dynamic_anchor: Option<String>,
    pub(crate) ref_: Option<Reference>,
    pub(crate) dynamic_ref: Option<Reference>,

    // Applicators.
    pub(crate) all_of: Option<Vec<SchemaId>>,
    pub(crate) any_of: Option<Vec<SchemaId>>,
    pub(crate) one_of: Option<Vec<SchemaId>>,
    pub(crate) not: Option<SchemaId>,
    pub(crate) if_: Option<SchemaId>,
    pub(crate) then: Option<SchemaId>,
    pub(crate) else_: Option<SchemaId>,
    pub(crate) dependent_schemas: Option<NamedSchemas>,
    pub(crate) prefix_items: Option<Vec<SchemaId>>,
    pub(crate) items: Option<SchemaId>,
    pub(crate) contains: Option<SchemaId>,
    pub(crate) properties: Option<NamedSchemas>,
    pub(crate) pattern_properties: Option<Vec<PatternSchema>>,
    pub(crate) additional_properties: Option<SchemaId>,
    pub(crate) property_names: Option<SchemaId>,
    pub(crate) unevaluated_items: Option<SchemaId>,
    pub(crate) unevaluated_properties: Option<SchemaId>,
    pub(crate) content_schema: Option<SchemaId>,
    pub(crate) defs: Option<NamedSchemas>,

    // Assertions.
    pub(crate) types: Option<TypeSet>,
    pub(crate) enum_: Option<Vec<Value>>,
    pub(crate) const_: Option<Value>,
    pub(crate) multiple_of: Option<Number>,
    pub(crate) maximum: Option<Number>,
    pub(crate) exclusive_maximum: Option<Number>,
    pub(crate) minimum: Option<Number>,
    pub(crate) exclusive_minimum: Option<Number>,
    pub(crate) max_length: Option<u64>,
    pub(crate) min_length: Option<u64>,
    pub(crate) pattern: Option<CompiledPattern>,
    pub(crate) max_items: Option<u64>,
    pub(crate) min_items: Option<u64>,
    pub(crate) unique_items: bool,
    pub(crate) max_contains: Option<u64>,
    pub(crate) min_contains: Option<u64>,
    pub(crate) max_properties: Option<u64>,
    pub(crate) min_properties: Option<u64>,
    pub(crate) required: Option<Vec<String>>,
    pub(crate) dependent_required: Option<Vec<(String, Vec<String>)>>,

    // Format and content.
    pub(crate) format: Option<String>,
    pub(crate) content_encoding: Option<String>,
    pub(crate) content_media_type: Option<String>,

    // Annotations.
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) default: Option<Value>,
    pub(crate) deprecated: Option<bool>,
    pub(crate) read_only: Option<bool>,
    pub(crate) write_only: Option<bool>,
    pub(crate) examples: Option<Vec<Value>>,

    // Unrecognized keywords, kept as annotations in source order.
    pub(crate) extras: Vec<(String, Value)>,

    // Derived during compilation.
    pub(crate) anchors: AHashMap<String, SchemaId>,
    pub(crate) dynamic_anchors: AHashMap<String, SchemaId>,
    /// Root only: URI → schema for every `$id` resource in the document.
    pub(crate) resources: AHashMap<String, SchemaId>,
    pub(crate) recursion: RecursionClass,
}

impl ObjectSchema {
    pub(crate) fn property(&self, name: &str) -> Option<SchemaId> {
        self.properties
            .as_ref()?
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, id)| *id)
    }

    pub(crate) fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    pub(crate) fn matches_any_pattern(&self, name: &str) -> bool {
        self.pattern_properties
            .as_ref()
            .is_some_and(|patterns| patterns.iter().any(|entry| entry.pattern.is_match(name)))
    }

    /// Ids of all directly owned subschemas.
    pub(crate) fn child_ids(&self) -> Vec<SchemaId> {
        let mut children = Vec::new();
        let mut push_all = |ids: &Option<Vec<SchemaId>>| {
            if let Some(ids) = ids {
                children.extend(ids.iter().copied());
            }
        };
        push_all(&self.all_of);
        push_all(&self.any_of);
        push_all(&self.one_of);
        push_all(&self.prefix_items);
        for id in [
            self.not,
            self.if_,
            self.then,
            self.else_,
            self.items,
            self.contains,
            self.additional_properties,
            self.property_names,
            self.unevaluated_items,
            self.unevaluated_properties,
            self.content_schema,
        ]
        .into_iter()
        .flatten()
        {
            children.push(id);
        }
        for named in [&self.dependent_schemas, &self.properties, &self.defs]
            .into_iter()
            .flatten()
        {
            children.extend(named.iter().map(|(_, id)| *id));
        }
        if let Some(patterns) = &self.pattern_properties {
            children.extend(patterns.iter().map(|entry| entry.schema));
        }
        children
    }
}

impl Default for RecursionClass {
    fn default() -> Self {
        RecursionClass::Default
    }
}

/// Outcome of parsing one schema document into the arena.
#[derive(Debug)]
pub(crate) struct ParsedDocument {
    pub(crate) root: SchemaId,
    /// Every `$id` resource the document declared, absolute URI → schema.
    pub(crate) resources: Vec<(String, SchemaId)>,
    /// All nodes created for this document, roots first.
    pub(crate) new_nodes: Vec<SchemaId>,
}

struct AnchorInstall {
    scope: SchemaId,
    name: String,
    target: SchemaId,
    dynamic: bool,
}

struct DocumentParser<'a> {
    arena: &'a mut Arena,
    root: Option<SchemaId>,
    anchors: Vec<AnchorInstall>,
    resources: Vec<(String, SchemaId)>,
    new_nodes: Vec<SchemaId>,
}

/// Parse a schema document rooted at `value`, assigning `base` as the base
/// URI unless the document's own `$id` overrides it.
pub(crate) fn parse_document(
    arena: &mut Arena,
    value: &Value,
    base: Url,
) -> Result<ParsedDocument, CompileError> {
    let mut parser = DocumentParser {
        arena,
        root: None,
        anchors: Vec::new(),
        resources: Vec::new(),
        new_nodes: Vec::new(),
    };
    let root = parser.parse(value, &base, String::new(), None, None)?;
    parser.apply_anchors();
    let resources = std::mem::take(&mut parser.resources);
    let new_nodes = std::mem::take(&mut parser.new_nodes);
    if let Some(object) = parser.arena.get_mut(root).object_mut() {
        for (uri, id) in &resources {
            object.resources.insert(uri.clone(), *id);
        }
    }
    classify_recursion(parser.arena, &new_nodes);
    Ok(ParsedDocument {
        root,
        resources,
        new_nodes,
    })
}

impl DocumentParser<'_> {
    fn parse(
        &mut self,
        value: &Value,
        base: &Url,
        pointer: String,
        parent: Option<SchemaId>,
        scope: Option<SchemaId>,
    ) -> Result<SchemaId, CompileError> {
        match value {
            Value::Bool(accepts) => {
                let id = self.alloc(base.clone(), pointer, parent, SchemaKind::Bool(*accepts));
                Ok(id)
            }
            Value::Object(entries) => self.parse_object(entries, base, pointer, parent, scope),
            _ => Err(CompileError::invalid_schema(
                pointer_or_root(&pointer),
                "schema must be a boolean or an object",
            )),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn parse_object(
        &mut self,
        entries: &Map<String, Value>,
        base: &Url,
        pointer: String,
        parent: Option<SchemaId>,
        scope: Option<SchemaId>,
    ) -> Result<SchemaId, CompileError> {
        // Allocate first so children can point back at this node.
        let id = self.alloc(
            base.clone(),
            pointer.clone(),
            parent,
            SchemaKind::Bool(true),
        );
        let mut schema = ObjectSchema::default();

        // Base URI derivation: an absolute `$id` replaces the base, a
        // relative one resolves against it. Either way a new resource scope
        // starts here.
        let mut node_base = base.clone();
        let mut node_pointer = pointer.clone();
        if let Some(value) = entries.get("$id") {
            let raw = expect_str(value, &pointer, "$id")?;
            node_base = uri::resolve_against(base, raw)?;
            node_pointer = String::new();
            self.resources.push((node_base.to_string(), id));
            schema.id = Some(raw.to_string());
        }
        {
            let node = self.arena.get_mut(id);
            node.base_uri = node_base.clone();
            node.pointer = node_pointer.clone();
        }
        let child_scope = if schema.id.is_some() { Some(id) } else { scope };
        let root = self.root.expect("root is set by alloc");

        if let Some(value) = entries.get("$schema") {
            schema.dialect = Some(expect_str(value, &pointer, "$schema")?.to_string());
        }
        if let Some(value) = entries.get("$anchor") {
            let name = expect_str(value, &pointer, "$anchor")?.to_string();
            let scope_id = child_scope.unwrap_or(root);
            self.anchors.push(AnchorInstall {
                scope: scope_id,
                name: name.clone(),
                target: id,
                dynamic: false,
            });
            // Same-scope anchors are also visible from the document root.
            if scope_id != root && schema.id.is_none() {
                self.anchors.push(AnchorInstall {
                    scope: root,
                    name: name.clone(),
                    target: id,
                    dynamic: false,
                });
            }
            schema.anchor = Some(name);
        }
        if let Some(value) = entries.get("$dynamicAnchor") {
            let name = expect_str(value, &pointer, "$dynamicAnchor")?.to_string();
            self.anchors.push(AnchorInstall {
                scope: id,
                name: name.clone(),
                target: id,
                dynamic: true,
            });
            let scope_id = child_scope.unwrap_or(root);
            if scope_id != id {
                self.anchors.push(AnchorInstall {
                    scope: scope_id,
                    name: name.clone(),
                    target: id,
                    dynamic: true,
                });
            }
            schema.dynamic_anchor = Some(name);
        }
        if let Some(value) = entries.get("$ref") {
            schema.ref_ = Some(Reference::new(expect_str(value, &pointer, "$ref")?));
        }
        if let Some(value) = entries.get("$dynamicRef") {
            schema.dynamic_ref = Some(Reference::new(expect_str(
                value,
                &pointer,
                "$dynamicRef",
            )?));
        }

        let child = |parser: &mut Self, keyword: &str, value: &Value| {
            let pointer = join_pointer(&node_pointer, keyword);
            parser.parse(value, &node_base, pointer, Some(id), child_scope)
        };
        let child_list = |parser: &mut Self, keyword: &str, value: &Value| {
            let items = expect_array(value, &pointer, keyword)?;
            items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    let pointer =
                        join_pointer(&join_pointer(&node_pointer, keyword), &index.to_string());
                    parser.parse(item, &node_base, pointer, Some(id), child_scope)
                })
                .collect::<Result<Vec<_>, _>>()
        };
        let child_map = |parser: &mut Self, keyword: &str, value: &Value| {
            let entries = expect_object(value, &pointer, keyword)?;
            entries
                .iter()
                .map(|(name, item)| {
                    let pointer = join_pointer(&join_pointer(&node_pointer, keyword), name);
                    parser
                        .parse(item, &node_base, pointer, Some(id), child_scope)
                        .map(|child| (name.clone(), child))
                })
                .collect::<Result<NamedSchemas, _>>()
        };

        if let Some(value) = entries.get("allOf") {
            schema.all_of = Some(child_list(self, "allOf", value)?);
        }
        if let Some(value) = entries.get("anyOf") {
            schema.any_of = Some(child_list(self, "anyOf", value)?);
        }
        if let Some(value) = entries.get("oneOf") {
            schema.one_of = Some(child_list(self, "oneOf", value)?);
        }
        if let Some(value) = entries.get("not") {
            schema.not = Some(child(self, "not", value)?);
        }
        if let Some(value) = entries.get("if") {
            schema.if_ = Some(child(self, "if", value)?);
        }
        if let Some(value) = entries.get("then") {
            schema.then = Some(child(self, "then", value)?);
        }
        if let Some(value) = entries.get("else") {
            schema.else_ = Some(child(self, "else", value)?);
        }
        if let Some(value) = entries.get("dependentSchemas") {
            schema.dependent_schemas = Some(child_map(self, "dependentSchemas", value)?);
        }
        if let Some(value) = entries.get("prefixItems") {
            schema.prefix_items = Some(child_list(self, "prefixItems", value)?);
        }
        match entries.get("items") {
            // Draft-7 compatibility: array-form `items` migrates to
            // `prefixItems` and `additionalItems` takes over `items`.
            Some(Value::Array(_)) => {
                if schema.prefix_items.is_some() {
                    return Err(CompileError::invalid_schema(
                        join_pointer(&pointer, "items"),
                        "array-form items cannot be combined with prefixItems",
                    ));
                }
                schema.prefix_items = Some(child_list(self, "items", entries.get("items").expect("just matched"))?);
                if let Some(value) = entries.get("additionalItems") {
                    schema.items = Some(child(self, "additionalItems", value)?);
                }
            }
            Some(value) => {
                schema.items = Some(child(self, "items", value)?);
            }
            None => {}
        }
        if let Some(value) = entries.get("contains") {
            schema.contains = Some(child(self, "contains", value)?);
        }
        if let Some(value) = entries.get("properties") {
            schema.properties = Some(child_map(self, "properties", value)?);
        }
        if let Some(value) = entries.get("patternProperties") {
            let map = expect_object(value, &pointer, "patternProperties")?;
            let mut patterns = Vec::with_capacity(map.len());
            for (source, item) in map {
                let location = join_pointer(&join_pointer(&pointer, "patternProperties"), source);
                let regex = ecma::compile(source)
                    .map_err(|_| CompileError::invalid_regex(&location, source))?;
                let child_pointer =
                    join_pointer(&join_pointer(&node_pointer, "patternProperties"), source);
                let child =
                    self.parse(item, &node_base, child_pointer, Some(id), child_scope)?;
                patterns.push(PatternSchema {
                    pattern: CompiledPattern {
                        source: source.clone(),
                        regex,
                    },
                    schema: child,
                });
            }
            schema.pattern_properties = Some(patterns);
        }
        if let Some(value) = entries.get("additionalProperties") {
            schema.additional_properties = Some(child(self, "additionalProperties", value)?);
        }
        if let Some(value) = entries.get("propertyNames") {
            schema.property_names = Some(child(self, "propertyNames", value)?);
        }
        if let Some(value) = entries.get("unevaluatedItems") {
            schema.unevaluated_items = Some(child(self, "unevaluatedItems", value)?);
        }
        if let Some(value) = entries.get("unevaluatedProperties") {
            schema.unevaluated_properties = Some(child(self, "unevaluatedProperties", value)?);
        }
        if let Some(value) = entries.get("contentSchema") {
            schema.content_schema = Some(child(self, "contentSchema", value)?);
        }
        // `definitions` is the legacy spelling of `$defs`.
        for keyword in ["$defs", "definitions"] {
            if let Some(value) = entries.get(keyword) {
                let mut defs = child_map(self, keyword, value)?;
                match &mut schema.defs {
                    Some(existing) => existing.append(&mut defs),
                    None => schema.defs = Some(defs),
                }
            }
        }

        if let Some(value) = entries.get("type") {
            let mut types = TypeSet::default();
            match value {
                Value::String(name) => {
                    types.insert(parse_type_name(name, &pointer)?);
                }
                Value::Array(names) => {
                    for name in names {
                        let name = expect_str(name, &pointer, "type")?;
                        types.insert(parse_type_name(name, &pointer)?);
                    }
                }
                _ => {
                    return Err(CompileError::invalid_schema(
                        join_pointer(&pointer, "type"),
                        "type must be a string or an array of strings",
                    ))
                }
            }
            schema.types = Some(types);
        }
        if let Some(value) = entries.get("enum") {
            schema.enum_ = Some(expect_array(value, &pointer, "enum")?.to_vec());
        }
        if let Some(value) = entries.get("const") {
            schema.const_ = Some(value.clone());
        }
        for (keyword, field) in [
            ("multipleOf", &mut schema.multiple_of),
            ("maximum", &mut schema.maximum),
            ("exclusiveMaximum", &mut schema.exclusive_maximum),
            ("minimum", &mut schema.minimum),
            ("exclusiveMinimum", &mut schema.exclusive_minimum),
        ] {
            if let Some(value) = entries.get(keyword) {
                *field = Some(expect_number(value, &pointer, keyword)?);
            }
        }
        for (keyword, field) in [
            ("maxLength", &mut schema.max_length),
            ("minLength", &mut schema.min_length),
            ("maxItems", &mut schema.max_items),
            ("minItems", &mut schema.min_items),
            ("maxContains", &mut schema.max_contains),
            ("minContains", &mut schema.min_contains),
            ("maxProperties", &mut schema.max_properties),
            ("minProperties", &mut schema.min_properties),
        ] {
            if let Some(value) = entries.get(keyword) {
                *field = Some(expect_non_negative_integer(value, &pointer, keyword)?);
            }
        }
        if let Some(value) = entries.get("pattern") {
            let source = expect_str(value, &pointer, "pattern")?;
            let location = join_pointer(&pointer, "pattern");
            let regex = ecma::compile(source)
                .map_err(|_| CompileError::invalid_regex(&location, source))?;
            schema.pattern = Some(CompiledPattern {
                source: source.to_string(),
                regex,
            });
        }
        if let Some(value) = entries.get("uniqueItems") {
            schema.unique_items = value.as_bool().unwrap_or(false);
        }
        if let Some(value) = entries.get("required") {
            schema.required = Some(expect_string_array(value, &pointer, "required")?);
        }
        if let Some(value) = entries.get("dependentRequired") {
            let map = expect_object(value, &pointer, "dependentRequired")?;
            let mut dependencies = Vec::with_capacity(map.len());
            for (name, names) in map {
                dependencies.push((
                    name.clone(),
                    expect_string_array(names, &pointer, "dependentRequired")?,
                ));
            }
            schema.dependent_required = Some(dependencies);
        }

        for (keyword, field) in [
            ("format", &mut schema.format),
            ("contentEncoding", &mut schema.content_encoding),
            ("contentMediaType", &mut schema.content_media_type),
            ("title", &mut schema.title),
            ("description", &mut schema.description),
        ] {
            if let Some(value) = entries.get(keyword) {
                *field = Some(expect_str(value, &pointer, keyword)?.to_string());
            }
        }
        if let Some(value) = entries.get("default") {
            schema.default = Some(value.clone());
        }
        for (keyword, field) in [
            ("deprecated", &mut schema.deprecated),
            ("readOnly", &mut schema.read_only),
            ("writeOnly", &mut schema.write_only),
        ] {
            if let Some(value) = entries.get(keyword) {
                *field = value.as_bool();
            }
        }
        if let Some(value) = entries.get("examples") {
            schema.examples = Some(expect_array(value, &pointer, "examples")?.to_vec());
        }

        for (keyword, value) in entries {
            if !KNOWN_KEYWORDS.contains(&keyword.as_str()) {
                schema.extras.push((keyword.clone(), value.clone()));
            }
        }

        self.arena.get_mut(id).kind = SchemaKind::Object(Box::new(schema));
        Ok(id)
    }

    fn alloc(
        &mut self,
        base_uri: Url,
        pointer: String,
        parent: Option<SchemaId>,
        kind: SchemaKind,
    ) -> SchemaId {
        let root = self.root;
        let id = self.arena.alloc(SchemaNode {
            base_uri,
            pointer,
            parent,
            root: root.unwrap_or(SchemaId(0)),
            kind,
        });
        let root = *self.root.get_or_insert(id);
        self.arena.get_mut(id).root = root;
        self.new_nodes.push(id);
        id
    }

    fn apply_anchors(&mut self) {
        for install in self.anchors.drain(..) {
            if let Some(object) = self.arena.get_mut(install.scope).object_mut() {
                let table = if install.dynamic {
                    &mut object.dynamic_anchors
                } else {
                    &mut object.anchors
                };
                table.entry(install.name).or_insert(install.target);
            }
        }
    }
}

/// Serialize a compiled schema back into its JSON document form.
///
/// Reference strings come back verbatim; draft-7 `items`/`additionalItems`
/// forms come back in their migrated 2020-12 spelling.
pub(crate) fn to_value(arena: &Arena, id: SchemaId) -> Value {
    let node = arena.get(id);
    let object = match &node.kind {
        SchemaKind::Bool(accepts) => return Value::Bool(*accepts),
        SchemaKind::Object(object) => object,
    };
    let mut map = Map::new();
    if let Some(id) = &object.id {
        map.insert("$id".to_string(), Value::String(id.clone()));
    }
    if let Some(dialect) = &object.dialect {
        map.insert("$schema".to_string(), Value::String(dialect.clone()));
    }
    if let Some(anchor) = &object.anchor {
        map.insert("$anchor".to_string(), Value::String(anchor.clone()));
    }
    if let Some(anchor) = &object.dynamic_anchor {
        map.insert("$dynamicAnchor".to_string(), Value::String(anchor.clone()));
    }
    if let Some(reference) = &object.ref_ {
        map.insert("$ref".to_string(), Value::String(reference.reference.clone()));
    }
    if let Some(reference) = &object.dynamic_ref {
        map.insert(
            "$dynamicRef".to_string(),
            Value::String(reference.reference.clone()),
        );
    }
    let subschema = |id: &SchemaId| to_value(arena, *id);
    let subschemas = |ids: &[SchemaId]| Value::Array(ids.iter().map(subschema).collect());
    let named = |entries: &NamedSchemas| {
        Value::Object(
            entries
                .iter()
                .map(|(name, id)| (name.clone(), to_value(arena, *id)))
                .collect(),
        )
    };
    for (keyword, ids) in [
        ("allOf", &object.all_of),
        ("anyOf", &object.any_of),
        ("oneOf", &object.one_of),
        ("prefixItems", &object.prefix_items),
    ] {
        if let Some(ids) = ids {
            map.insert(keyword.to_string(), subschemas(ids));
        }
    }
    for (keyword, id) in [
        ("not", object.not),
        ("if", object.if_),
        ("then", object.then),
        ("else", object.else_),
        ("items", object.items),
        ("contains", object.contains),
        ("additionalProperties", object.additional_properties),
        ("propertyNames", object.property_names),
        ("unevaluatedItems", object.unevaluated_items),
        ("unevaluatedProperties", object.unevaluated_properties),
        ("contentSchema", object.content_schema),
    ] {
        if let Some(id) = id {
            map.insert(keyword.to_string(), subschema(&id));
        }
    }
    for (keyword, entries) in [
        ("dependentSchemas", &object.dependent_schemas),
        ("properties", &object.properties),
        ("$defs", &object.defs),
    ] {
        if let Some(entries) = entries {
            map.insert(keyword.to_string(), named(entries));
        }
    }
    if let Some(patterns) = &object.pattern_properties {
        map.insert(
            "patternProperties".to_string(),
            Value::Object(
                patterns
                    .iter()
                    .map(|entry| (entry.pattern.source.clone(), to_value(arena, entry.schema)))
                    .collect(),
            ),
        );
    }
    if let Some(types) = object.types {
        let mut names = types.names();
        let value = if names.len() == 1 {
            Value::String(names.remove(0))
        } else {
            Value::Array(names.into_iter().map(Value::String).collect())
        };
        map.insert("type".to_string(), value);
    }
    if let Some(options) = &object.enum_ {
        map.insert("enum".to_string(), Value::Array(options.clone()));
    }
    if let Some(expected) = &object.const_ {
        map.insert("const".to_string(), expected.clone());
    }
    for (keyword, number) in [
        ("multipleOf", &object.multiple_of),
        ("maximum", &object.maximum),
        ("exclusiveMaximum", &object.exclusive_maximum),
        ("minimum", &object.minimum),
        ("exclusiveMinimum", &object.exclusive_minimum),
    ] {
        if let Some(number) = number {
            map.insert(keyword.to_string(), Value::Number(number.clone()));
        }
    }
    for (keyword, bound) in [
        ("maxLength", object.max_length),
        ("minLength", object.min_length),
        ("maxItems", object.max_items),
        ("minItems", object.min_items),
        ("maxContains", object.max_contains),
        ("minContains", object.min_contains),
        ("maxProperties", object.max_properties),
        ("minProperties", object.min_properties),
    ] {
        if let Some(bound) = bound {
            map.insert(keyword.to_string(), Value::from(bound));
        }
    }
    if let Some(pattern) = &object.pattern {
        map.insert("pattern".to_string(), Value::String(pattern.source.clone()));
    }
    if object.unique_items {
        map.insert("uniqueItems".to_string(), Value::Bool(true));
    }
    if let Some(required) = &object.required {
        map.insert(
            "required".to_string(),
            Value::Array(required.iter().cloned().map(Value::String).collect()),
        );
    }
    if let Some(dependencies) = &object.dependent_required {
        map.insert(
            "dependentRequired".to_string(),
            Value::Object(
                dependencies
                    .iter()
                    .map(|(name, dependents)| {
                        (
                            name.clone(),
                            Value::Array(
                                dependents.iter().cloned().map(Value::String).collect(),
                            ),
                        )
                    })
                    .collect(),
            ),
        );
    }
    for (keyword, value) in [
        ("format", &object.format),
        ("contentEncoding", &object.content_encoding),
        ("contentMediaType", &object.content_media_type),
        ("title", &object.title),
        ("description", &object.description),
    ] {
        if let Some(value) = value {
            map.insert(keyword.to_string(), Value::String(value.clone()));
        }
    }
    if let Some(default) = &object.default {
        map.insert("default".to_string(), default.clone());
    }
    for (keyword, flag) in [
        ("deprecated", object.deprecated),
        ("readOnly", object.read_only),
        ("writeOnly", object.write_only),
    ] {
        if let Some(flag) = flag {
            map.insert(keyword.to_string(), Value::Bool(flag));
        }
    }
    if let Some(examples) = &object.examples {
        map.insert("examples".to_string(), Value::Array(examples.clone()));
    }
    for (keyword, value) in &object.extras {
        map.insert(keyword.clone(), value.clone());
    }
    Value::Object(map)
}

fn classify_recursion(arena: &mut Arena, nodes: &[SchemaId]) {
    for id in nodes {
        let Some(object) = arena.get(*id).object() else {
            continue;
        };
        let class = if object
            .id
            .as_deref()
            .is_some_and(|id| id.contains("json-schema.org"))
        {
            RecursionClass::Metaschema
        } else if object.child_ids().iter().any(|child| {
            arena
                .get(*child)
                .object()
                .and_then(|child| child.ref_.as_ref())
                .is_some_and(|reference| reference.reference == "#")
        }) {
            RecursionClass::SelfReferential
        } else {
            RecursionClass::Default
        };
        if let Some(object) = arena.get_mut(*id).object_mut() {
            object.recursion = class;
        }
    }
}

static KNOWN_KEYWORDS: &[&str] = &[
    "$id",
    "$schema",
    "$anchor",
    "$dynamicAnchor",
    "$ref",
    "$dynamicRef",
    "$defs",
    "definitions",
    "allOf",
    "anyOf",
    "oneOf",
    "not",
    "if",
    "then",
    "else",
    "dependentSchemas",
    "prefixItems",
    "items",
    "additionalItems",
    "contains",
    "properties",
    "patternProperties",
    "additionalProperties",
    "propertyNames",
    "unevaluatedItems",
    "unevaluatedProperties",
    "contentSchema",
    "type",
    "enum",
    "const",
    "multipleOf",
    "maximum",
    "exclusiveMaximum",
    "minimum",
    "exclusiveMinimum",
    "maxLength",
    "minLength",
    "pattern",
    "maxItems",
    "minItems",
    "uniqueItems",
    "maxContains",
    "minContains",
    "maxProperties",
    "minProperties",
    "required",
    "dependentRequired",
    "format",
    "contentEncoding",
    "contentMediaType",
    "title",
    "description",
    "default",
    "deprecated",
    "readOnly",
    "writeOnly",
    "examples",
];

fn pointer_or_root(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}

pub(crate) fn join_pointer(pointer: &str, token: &str) -> String {
    let mut joined = String::with_capacity(pointer.len() + token.len() + 1);
    joined.push_str(pointer);
    joined.push('/');
    for ch in token.chars() {
        match ch {
            '~' => joined.push_str("~0"),
            '/' => joined.push_str("~1"),
            _ => joined.push(ch),
        }
    }
    joined
}

fn parse_type_name(name: &str, pointer: &str) -> Result<PrimitiveType, CompileError> {
    PrimitiveType::from_name(name).ok_or_else(|| {
        CompileError::invalid_schema(
            join_pointer(pointer, "type"),
            format!("unrecognized type name {name:?}"),
        )
    })
}

fn expect_str<'v>(value: &'v Value, pointer: &str, keyword: &str) -> Result<&'v str, CompileError> {
    value.as_str().ok_or_else(|| {
        CompileError::invalid_schema(
            join_pointer(pointer, keyword),
            format!("{keyword} must be a string"),
        )
    })
}

fn expect_array<'v>(
    value: &'v Value,
    pointer: &str,
    keyword: &str,
) -> Result<&'v Vec<Value>, CompileError> {
    value.as_array().ok_or_else(|| {
        CompileError::invalid_schema(
            join_pointer(pointer, keyword),
            format!("{keyword} must be an array"),
        )
    })
}

fn expect_object<'v>(
    value: &'v Value,
    pointer: &str,
    keyword: &str,
) -> Result<&'v Map<String, Value>, CompileError> {
    value.as_object().ok_or_else(|| {
        CompileError::invalid_schema(
            join_pointer(pointer, keyword),
            format!("{keyword} must be an object"),
        )
    })
}

fn expect_number(value: &Value, pointer: &str, keyword: &str) -> Result<Number, CompileError> {
    value.as_number().cloned().ok_or_else(|| {
        CompileError::invalid_schema(
            join_pointer(pointer, keyword),
            format!("{keyword} must be a number"),
        )
    })
}

fn expect_non_negative_integer(
    value: &Value,
    pointer: &str,
    keyword: &str,
) -> Result<u64, CompileError> {
    if let Some(value) = value.as_u64() {
        return Ok(value);
    }
    // Integral floats are tolerated, matching the numeric `type` rules.
    if let Some(value) = value.as_f64() {
        if value.trunc() == value && value >= 0.0 && value <= u64::MAX as f64 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            return Ok(value as u64);
        }
    }
    Err(CompileError::invalid_schema(
        join_pointer(pointer, keyword),
        format!("{keyword} must be a non-negative integer"),
    ))
}

fn expect_string_array(
    value: &Value,
    pointer: &str,
    keyword: &str,
) -> Result<Vec<String>, CompileError> {
    expect_array(value, pointer, keyword)?
        .iter()
        .map(|item| expect_str(item, pointer, keyword).map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_document, Arena, RecursionClass, SchemaKind};
    use crate::uri::DEFAULT_BASE_URI;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> (Arena, super::ParsedDocument) {
        let mut arena = Arena::default();
        let parsed = parse_document(&mut arena, &value, DEFAULT_BASE_URI.clone())
            .expect("schema should parse");
        (arena, parsed)
    }

    #[test]
    fn boolean_schemas() {
        let (arena, parsed) = parse(json!(true));
        assert!(matches!(arena.get(parsed.root).kind, SchemaKind::Bool(true)));
    }

    #[test]
    fn properties_preserve_source_order() {
        let (arena, parsed) = parse(json!({
            "properties": {"b": {"type": "string"}, "a": true, "c": {}}
        }));
        let object = arena.get(parsed.root).object().unwrap();
        let names: Vec<_> = object
            .properties
            .as_ref()
            .unwrap()
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(names, ["b", "a", "c"]);
    }

    #[test]
    fn const_null_is_a_constraint() {
        let (arena, parsed) = parse(json!({"const": null}));
        let object = arena.get(parsed.root).object().unwrap();
        assert_eq!(object.const_, Some(serde_json::Value::Null));
    }

    #[test]
    fn invalid_regex_fails_compilation() {
        let mut arena = Arena::default();
        let error = parse_document(
            &mut arena,
            &json!({"pattern": "["}),
            DEFAULT_BASE_URI.clone(),
        )
        .unwrap_err();
        assert!(error.to_string().contains("invalid regular expression"));
    }

    #[test]
    fn nested_ids_become_resources() {
        let (arena, parsed) = parse(json!({
            "$id": "https://example.com/root.json",
            "$defs": {
                "leaf": {"$id": "leaf.json", "type": "integer"}
            }
        }));
        let object = arena.get(parsed.root).object().unwrap();
        assert!(object.resources.contains_key("https://example.com/root.json"));
        assert!(object.resources.contains_key("https://example.com/leaf.json"));
    }

    #[test]
    fn anchors_install_into_scope_and_root() {
        let (arena, parsed) = parse(json!({
            "$defs": {
                "a": {"$anchor": "target", "type": "integer"}
            }
        }));
        let object = arena.get(parsed.root).object().unwrap();
        assert!(object.anchors.contains_key("target"));
    }

    #[test]
    fn legacy_items_array_migrates_to_prefix_items() {
        let (arena, parsed) = parse(json!({
            "items": [{"type": "integer"}, {"type": "string"}],
            "additionalItems": {"type": "boolean"}
        }));
        let object = arena.get(parsed.root).object().unwrap();
        assert_eq!(object.prefix_items.as_ref().unwrap().len(), 2);
        assert!(object.items.is_some());
    }

    #[test]
    fn self_referential_schemas_are_classified() {
        let (arena, parsed) = parse(json!({
            "properties": {"children": {"$ref": "#"}}
        }));
        let object = arena.get(parsed.root).object().unwrap();
        assert_eq!(object.recursion, RecursionClass::SelfReferential);
        assert_eq!(object.recursion.allowance(), 10);
    }

    #[test]
    fn unknown_keywords_are_kept_as_extras() {
        let (arena, parsed) = parse(json!({"x-vendor": 1, "type": "string"}));
        let object = arena.get(parsed.root).object().unwrap();
        assert_eq!(object.extras, vec![("x-vendor".to_string(), json!(1))]);
    }

    #[test]
    fn unrecognized_type_is_an_error() {
        let mut arena = Arena::default();
        let error = parse_document(
            &mut arena,
            &json!({"type": "float"}),
            DEFAULT_BASE_URI.clone(),
        )
        .unwrap_err();
        assert!(error.to_string().contains("unrecognized type name"));
    }
}
