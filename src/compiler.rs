//! The schema compiler: document cache, registries and deferred reference
//! resolution.
//!
//! A [`Compiler`] owns every schema it compiles in a single arena behind
//! a read-biased lock: many threads validate concurrently while compilation
//! and registration take the write side. [`Schema`] handles are cheap clones
//! pointing into the arena.
use std::{collections::HashMap, sync::Arc, time::Duration};

use ahash::AHashMap;
use parking_lot::RwLock;
use serde_json::Value;
use url::Url;

use crate::{
    error::{CompileError, LoaderError},
    evaluator,
    keywords::format::FormatCheck,
    loader::{self, Loader},
    resolver::{self, PendingRef},
    result::EvaluationResult,
    schema::{self, Arena, PrimitiveType, SchemaId},
    uri,
};

pub(crate) type DecoderObject = dyn Fn(&str) -> Result<Vec<u8>, String> + Send + Sync;
pub(crate) type MediaTypeObject = dyn Fn(&[u8]) -> Result<Value, String> + Send + Sync;
pub(crate) type DefaultFnObject = dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync;

/// A registered custom format.
pub(crate) struct FormatEntry {
    pub(crate) check: Arc<FormatCheck>,
    /// When set, the format only applies to instances of this type; other
    /// types pass.
    pub(crate) applies_to: Option<PrimitiveType>,
}

/// Compiler configuration.
#[derive(Debug, Clone)]
pub(crate) struct CompilerOptions {
    pub(crate) default_base_uri: Url,
    pub(crate) assert_format: bool,
    pub(crate) strict_resolution: bool,
    pub(crate) loader_timeout: Duration,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            default_base_uri: uri::DEFAULT_BASE_URI.clone(),
            assert_format: false,
            strict_resolution: false,
            loader_timeout: loader::DEFAULT_TIMEOUT,
        }
    }
}

/// Everything a compiler owns, guarded by one read-biased lock.
pub(crate) struct Registry {
    pub(crate) arena: Arena,
    pub(crate) roots: AHashMap<String, SchemaId>,
    /// Unresolved references waiting for a document, keyed by its URI.
    pending: AHashMap<String, Vec<SchemaId>>,
    pub(crate) formats: AHashMap<String, FormatEntry>,
    pub(crate) decoders: AHashMap<String, Arc<DecoderObject>>,
    pub(crate) media_types: AHashMap<String, Arc<MediaTypeObject>>,
    pub(crate) default_funcs: AHashMap<String, Arc<DefaultFnObject>>,
    loaders: AHashMap<String, Arc<dyn Loader>>,
    pub(crate) options: CompilerOptions,
}

impl Registry {
    fn new(options: CompilerOptions) -> Registry {
        let mut loaders: AHashMap<String, Arc<dyn Loader>> = AHashMap::new();
        #[cfg(feature = "resolve-http")]
        {
            let http: Arc<dyn Loader> = Arc::new(loader::HttpLoader::new(options.loader_timeout));
            loaders.insert("http".to_string(), Arc::clone(&http));
            loaders.insert("https".to_string(), http);
        }
        #[cfg(feature = "resolve-file")]
        loaders.insert("file".to_string(), Arc::new(loader::FileLoader));
        Registry {
            arena: Arena::default(),
            roots: AHashMap::new(),
            pending: AHashMap::new(),
            formats: AHashMap::new(),
            decoders: AHashMap::new(),
            media_types: AHashMap::new(),
            default_funcs: AHashMap::new(),
            loaders,
            options,
        }
    }

    /// The URI the document would be cached under, without parsing it.
    fn document_uri(&self, value: &Value, base: &Url) -> Result<Option<String>, CompileError> {
        if let Some(id) = value.get("$id").and_then(Value::as_str) {
            return Ok(Some(uri::resolve_against(base, id)?.to_string()));
        }
        if uri::is_default_base(base) {
            Ok(None)
        } else {
            Ok(Some(base.to_string()))
        }
    }

    fn compile_base(&self, given: Option<&str>) -> Result<Url, CompileError> {
        match given {
            Some(given) => uri::resolve_against(&self.options.default_base_uri, given),
            None => Ok(self.options.default_base_uri.clone()),
        }
    }

    /// Parse a document and register its resources; no reference resolution.
    fn add_document(
        &mut self,
        value: &Value,
        base: Url,
    ) -> Result<schema::ParsedDocument, CompileError> {
        let parsed = schema::parse_document(&mut self.arena, value, base)?;
        for (resource_uri, id) in &parsed.resources {
            self.roots.entry(resource_uri.clone()).or_insert(*id);
        }
        Ok(parsed)
    }

    /// Resolve a document's references, fetching (strict mode) or tracking
    /// missing documents, then retry anything that waited on its resources.
    fn resolve_document(&mut self, parsed: &schema::ParsedDocument) -> Result<(), CompileError> {
        let pending = resolver::resolve_nodes(
            &mut self.arena,
            &self.roots,
            &parsed.new_nodes,
            false,
        )?;
        self.handle_pending(pending)?;
        let registered: Vec<String> = parsed
            .resources
            .iter()
            .map(|(resource_uri, _)| resource_uri.clone())
            .collect();
        self.flush_pending(&registered)?;
        Ok(())
    }

    fn handle_pending(&mut self, pending: Vec<PendingRef>) -> Result<(), CompileError> {
        for entry in pending {
            if self.options.strict_resolution {
                // Fetch eagerly; the final strict resolution pass verifies
                // that everything ended up resolved.
                if !self.roots.contains_key(&entry.target_uri) {
                    let fetched = self.fetch_and_add(&entry.target_uri)?;
                    self.resolve_document(&fetched)?;
                }
            } else {
                let owners = self.pending.entry(entry.target_uri).or_default();
                // A schema is tracked at most once per missing document.
                if !owners.contains(&entry.owner) {
                    owners.push(entry.owner);
                }
            }
        }
        Ok(())
    }

    /// Also cache the document under `base` when its own `$id` differs from
    /// the URI it was requested as.
    fn register_alias(&mut self, parsed: &mut schema::ParsedDocument, base: &Url) {
        if uri::is_default_base(base) {
            return;
        }
        let key = base.to_string();
        if !parsed.resources.iter().any(|(resource, _)| resource == &key) {
            self.roots.entry(key.clone()).or_insert(parsed.root);
            parsed.resources.push((key, parsed.root));
        }
    }

    /// Retry references that waited for any of the newly registered URIs.
    fn flush_pending(&mut self, registered: &[String]) -> Result<(), CompileError> {
        for resource_uri in registered {
            let Some(owners) = self.pending.remove(resource_uri) else {
                continue;
            };
            tracing::debug!(uri = %resource_uri, waiting = owners.len(), "resolving deferred references");
            let pending = resolver::resolve_nodes(&mut self.arena, &self.roots, &owners, false)?;
            self.handle_pending(pending)?;
        }
        Ok(())
    }

    fn fetch_and_add(&mut self, target: &str) -> Result<schema::ParsedDocument, CompileError> {
        let target_url =
            Url::parse(target).map_err(|error| CompileError::invalid_uri(target, error))?;
        let document = self.fetch(&target_url)?;
        let mut parsed = self.add_document(&document, target_url.clone())?;
        self.register_alias(&mut parsed, &target_url);
        Ok(parsed)
    }

    fn fetch(&self, target: &Url) -> Result<Value, CompileError> {
        let loader =
            self.loaders
                .get(target.scheme())
                .ok_or_else(|| LoaderError::UnsupportedScheme {
                    scheme: target.scheme().to_string(),
                })?;
        let bytes = loader.load(target)?;
        Ok(loader::parse_document(target, &bytes)?)
    }
}

/// Compiles schema documents and owns every compiled schema.
///
/// A compiler can be shared freely across threads; validation takes the read
/// side of its lock, compilation and registration the write side.
#[derive(Clone)]
pub struct Compiler {
    registry: Arc<RwLock<Registry>>,
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

impl Compiler {
    #[must_use]
    pub fn new() -> Compiler {
        Compiler::options().build()
    }

    /// Start configuring a compiler.
    #[must_use]
    pub fn options() -> CompilerBuilder {
        CompilerBuilder {
            options: CompilerOptions::default(),
        }
    }

    /// Compile a schema document from raw JSON bytes.
    ///
    /// `uri` assigns the document URI when the document has no `$id` of its
    /// own; relative values resolve against the compiler's default base URI.
    pub fn compile(&self, bytes: &[u8], uri: Option<&str>) -> Result<Schema, CompileError> {
        let value: Value = serde_json::from_slice(bytes).map_err(CompileError::invalid_json)?;
        self.compile_value(&value, uri)
    }

    /// Compile an already-parsed schema document.
    pub fn compile_value(&self, value: &Value, uri: Option<&str>) -> Result<Schema, CompileError> {
        let mut registry = self.registry.write();
        let base = registry.compile_base(uri)?;
        // Absolute document URIs are cached: the same URI compiles once.
        if let Some(document_uri) = registry.document_uri(value, &base)? {
            if let Some(existing) = registry.roots.get(&document_uri) {
                tracing::debug!(uri = %document_uri, "returning cached schema");
                return Ok(self.handle(*existing));
            }
        }
        let mut parsed = registry.add_document(value, base.clone())?;
        registry.register_alias(&mut parsed, &base);
        registry.resolve_document(&parsed)?;
        if registry.options.strict_resolution {
            let state = &mut *registry;
            resolver::resolve_nodes(&mut state.arena, &state.roots, &parsed.new_nodes, true)?;
        }
        tracing::debug!(nodes = parsed.new_nodes.len(), "compiled schema document");
        Ok(self.handle(parsed.root))
    }

    /// Compile a set of documents that may reference each other, in either
    /// direction. Parsing and registration happen for all documents before
    /// any reference resolution.
    pub fn compile_batch<I, B>(&self, documents: I) -> Result<HashMap<String, Schema>, CompileError>
    where
        I: IntoIterator<Item = (String, B)>,
        B: AsRef<[u8]>,
    {
        let mut registry = self.registry.write();
        let mut parsed_documents = Vec::new();
        for (document_uri, bytes) in documents {
            let value: Value =
                serde_json::from_slice(bytes.as_ref()).map_err(CompileError::invalid_json)?;
            let base = registry.compile_base(Some(&document_uri))?;
            let mut parsed = registry.add_document(&value, base.clone())?;
            registry.register_alias(&mut parsed, &base);
            parsed_documents.push((document_uri, parsed));
        }
        let mut compiled = HashMap::with_capacity(parsed_documents.len());
        for (document_uri, parsed) in parsed_documents {
            registry.resolve_document(&parsed)?;
            if registry.options.strict_resolution {
                let state = &mut *registry;
                resolver::resolve_nodes(&mut state.arena, &state.roots, &parsed.new_nodes, true)?;
            }
            compiled.insert(document_uri, self.handle(parsed.root));
        }
        Ok(compiled)
    }

    /// Look up a schema by URI reference, e.g.
    /// `https://example.com/s.json#/$defs/item`, fetching the document
    /// through the registered loaders when it is not cached yet.
    pub fn get_schema(&self, reference: &str) -> Result<Schema, CompileError> {
        let mut registry = self.registry.write();
        let (base, fragment) = uri::split_fragment(reference);
        let target = uri::resolve_against(&registry.options.default_base_uri.clone(), base)?;
        let target_key = target.to_string();
        let document = match registry.roots.get(&target_key) {
            Some(document) => *document,
            None => {
                let parsed = registry.fetch_and_add(&target_key)?;
                registry.resolve_document(&parsed)?;
                parsed.root
            }
        };
        match resolver::resolve_in_document(&registry.arena, document, fragment) {
            Some(target) => Ok(self.handle(target)),
            None => Err(CompileError::UnresolvableRef {
                reference: reference.to_string(),
            }),
        }
    }

    /// Register a loader for a URI scheme, replacing any existing one
    /// (including the built-in `http`/`https`/`file` loaders).
    pub fn register_loader(&self, scheme: &str, loader: impl Loader + 'static) {
        self.registry
            .write()
            .loaders
            .insert(scheme.to_string(), Arc::new(loader));
    }

    /// Register a content-encoding decoder consulted by `contentEncoding`.
    pub fn register_decoder(
        &self,
        name: &str,
        decoder: impl Fn(&str) -> Result<Vec<u8>, String> + Send + Sync + 'static,
    ) {
        self.registry
            .write()
            .decoders
            .insert(name.to_string(), Arc::new(decoder));
    }

    /// Register a media-type handler consulted by `contentMediaType`.
    pub fn register_media_type(
        &self,
        name: &str,
        handler: impl Fn(&[u8]) -> Result<Value, String> + Send + Sync + 'static,
    ) {
        self.registry
            .write()
            .media_types
            .insert(name.to_string(), Arc::new(handler));
    }

    /// Register a custom format validator. `applies_to` restricts the format
    /// to one primitive type name (`"string"`, `"number"`, …); instances of
    /// other types always pass.
    pub fn register_format(
        &self,
        name: &str,
        applies_to: Option<&str>,
        check: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) {
        let applies_to = applies_to.and_then(PrimitiveType::from_name);
        self.registry.write().formats.insert(
            name.to_string(),
            FormatEntry {
                check: Arc::new(check),
                applies_to,
            },
        );
    }

    /// Register a default-value function, consulted by name by external
    /// collaborators through [`Compiler::default_func`].
    pub fn register_default_func(
        &self,
        name: &str,
        func: impl Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    ) {
        self.registry
            .write()
            .default_funcs
            .insert(name.to_string(), Arc::new(func));
    }

    /// Look up a registered default-value function.
    #[must_use]
    pub fn default_func(
        &self,
        name: &str,
    ) -> Option<Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>> {
        self.registry.read().default_funcs.get(name).cloned()
    }

    fn handle(&self, id: SchemaId) -> Schema {
        Schema {
            registry: Arc::clone(&self.registry),
            id,
        }
    }
}

/// Builder for [`Compiler`] configuration.
#[derive(Debug, Clone)]
pub struct CompilerBuilder {
    options: CompilerOptions,
}

impl CompilerBuilder {
    /// Base URI that documents without `$id` (and relative `$id` values)
    /// resolve against.
    #[must_use]
    pub fn default_base_uri(mut self, base: &str) -> Self {
        if let Ok(parsed) = Url::parse(base) {
            self.options.default_base_uri = parsed;
        }
        self
    }

    /// Treat `format` as an assertion instead of an annotation.
    #[must_use]
    pub fn assert_format(mut self, assert: bool) -> Self {
        self.options.assert_format = assert;
        self
    }

    /// Fail compilation on any unresolvable reference, fetching remote
    /// documents eagerly through the registered loaders.
    #[must_use]
    pub fn strict_resolution(mut self, strict: bool) -> Self {
        self.options.strict_resolution = strict;
        self
    }

    /// Timeout for remote document loads.
    #[must_use]
    pub fn loader_timeout(mut self, timeout: Duration) -> Self {
        self.options.loader_timeout = timeout;
        self
    }

    #[must_use]
    pub fn build(self) -> Compiler {
        Compiler {
            registry: Arc::new(RwLock::new(Registry::new(self.options))),
        }
    }
}

/// A compiled schema, cheap to clone and safe to validate against from many
/// threads at once.
#[derive(Clone)]
pub struct Schema {
    registry: Arc<RwLock<Registry>>,
    id: SchemaId,
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema").field("id", &self.id).finish()
    }
}

impl Schema {
    /// Validate an instance. Never fails: non-conformance is reported inside
    /// the returned [`EvaluationResult`].
    #[must_use]
    pub fn validate(&self, instance: &Value) -> EvaluationResult {
        let registry = self.registry.read();
        evaluator::evaluate_root(&registry, self.id, instance)
    }

    /// Shortcut for `validate(instance).is_valid()`.
    #[must_use]
    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validate(instance).is_valid()
    }

    /// Validate a raw byte buffer. Buffers whose first non-whitespace byte
    /// is `{` or `[` are parsed as JSON; anything else validates as a
    /// string.
    #[must_use]
    pub fn validate_bytes(&self, bytes: &[u8]) -> EvaluationResult {
        let first = bytes
            .iter()
            .copied()
            .find(|byte| !byte.is_ascii_whitespace());
        if matches!(first, Some(b'{' | b'[')) {
            if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
                return self.validate(&value);
            }
        }
        let value = Value::String(String::from_utf8_lossy(bytes).into_owned());
        self.validate(&value)
    }

    /// Validate any serializable value — structs, maps, enums — through its
    /// serde representation.
    pub fn validate_as<T: serde::Serialize>(
        &self,
        value: &T,
    ) -> Result<EvaluationResult, serde_json::Error> {
        let value = serde_json::to_value(value)?;
        Ok(self.validate(&value))
    }

    /// The schema's location: its URI plus JSON Pointer fragment.
    #[must_use]
    pub fn location(&self) -> String {
        self.registry.read().arena.get(self.id).location()
    }

    /// Serialize the compiled schema back into its JSON document form.
    ///
    /// Reference strings come back verbatim. Compiling the serialized form
    /// again yields a schema with identical validation behavior.
    #[must_use]
    pub fn to_value(&self) -> Value {
        schema::to_value(&self.registry.read().arena, self.id)
    }
}
