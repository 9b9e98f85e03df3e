//! The evaluation result model: per-subschema result trees with errors,
//! annotations and locations, plus the flag and list output views described
//! by the draft 2020-12 output format.
use serde_json::{Map, Number, Value};

use crate::{locales::LocaleBundle, paths::JsonPointer};

/// The outcome of applying one subschema to one instance location.
///
/// Results form a tree: every applicator keyword that evaluated a subschema
/// contributes a child under [`EvaluationResult::details`].
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub(crate) valid: bool,
    pub(crate) evaluation_path: JsonPointer,
    pub(crate) schema_location: String,
    pub(crate) instance_location: JsonPointer,
    pub(crate) annotations: Vec<(String, Value)>,
    pub(crate) errors: Vec<EvaluationError>,
    pub(crate) details: Vec<EvaluationResult>,
}

impl EvaluationResult {
    pub(crate) fn new(
        evaluation_path: JsonPointer,
        schema_location: String,
        instance_location: JsonPointer,
    ) -> EvaluationResult {
        EvaluationResult {
            valid: true,
            evaluation_path,
            schema_location,
            instance_location,
            annotations: Vec::new(),
            errors: Vec::new(),
            details: Vec::new(),
        }
    }

    /// Whether the instance conforms to the schema.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// JSON Pointer through the dynamic schema application, e.g.
    /// `/allOf/0/properties/name`.
    #[must_use]
    pub fn evaluation_path(&self) -> &JsonPointer {
        &self.evaluation_path
    }

    /// Absolute URI plus fragment of the subschema that produced this result.
    #[must_use]
    pub fn schema_location(&self) -> &str {
        &self.schema_location
    }

    /// JSON Pointer into the instance.
    #[must_use]
    pub fn instance_location(&self) -> &JsonPointer {
        &self.instance_location
    }

    /// Keyword errors reported directly at this subschema.
    #[must_use]
    pub fn errors(&self) -> &[EvaluationError] {
        &self.errors
    }

    /// Annotations (`title`, `default`, unknown keywords, …) collected at
    /// this subschema.
    #[must_use]
    pub fn annotations(&self) -> &[(String, Value)] {
        &self.annotations
    }

    /// Results of subschema applications.
    #[must_use]
    pub fn details(&self) -> &[EvaluationResult] {
        &self.details
    }

    /// Iterate this result and all nested results, depth first.
    pub fn iter(&self) -> impl Iterator<Item = &EvaluationResult> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.details.iter().rev());
            Some(next)
        })
    }

    /// The flag output format: just validity.
    #[must_use]
    pub fn to_flag(&self) -> Flag {
        Flag { valid: self.valid }
    }

    /// The list output format. With `hierarchical` set, nested subschema
    /// results stay nested under `details`; otherwise all results are
    /// flattened into the root unit's `details`, depth first.
    #[must_use]
    pub fn to_list(&self, hierarchical: bool) -> OutputUnit {
        self.render(hierarchical, None)
    }

    /// Same as [`EvaluationResult::to_list`], but error messages are rendered
    /// through `bundle`, falling back to the built-in templates for codes the
    /// bundle does not cover.
    #[must_use]
    pub fn to_list_localized(&self, bundle: &LocaleBundle, hierarchical: bool) -> OutputUnit {
        self.render(hierarchical, Some(bundle))
    }

    fn render(&self, hierarchical: bool, bundle: Option<&LocaleBundle>) -> OutputUnit {
        if hierarchical {
            self.render_nested(bundle)
        } else {
            let mut unit = self.render_own(bundle);
            let mut flattened = Vec::new();
            for child in &self.details {
                for nested in child.iter() {
                    flattened.push(nested.render_own(bundle));
                }
            }
            if !flattened.is_empty() {
                unit.details = Some(flattened);
            }
            unit
        }
    }

    fn render_nested(&self, bundle: Option<&LocaleBundle>) -> OutputUnit {
        let mut unit = self.render_own(bundle);
        if !self.details.is_empty() {
            unit.details = Some(
                self.details
                    .iter()
                    .map(|child| child.render_nested(bundle))
                    .collect(),
            );
        }
        unit
    }

    fn render_own(&self, bundle: Option<&LocaleBundle>) -> OutputUnit {
        let errors = if self.errors.is_empty() {
            None
        } else {
            let mut map = Map::new();
            for error in &self.errors {
                let message = match bundle {
                    Some(bundle) => bundle.render(error),
                    None => error.message(),
                };
                map.insert(error.keyword.to_string(), Value::String(message));
            }
            Some(map)
        };
        let annotations = if self.valid && !self.annotations.is_empty() {
            let mut map = Map::new();
            for (keyword, value) in &self.annotations {
                map.insert(keyword.clone(), value.clone());
            }
            Some(map)
        } else {
            None
        };
        OutputUnit {
            valid: self.valid,
            evaluation_path: self.evaluation_path.to_string(),
            schema_location: self.schema_location.clone(),
            instance_location: self.instance_location.to_string(),
            errors,
            annotations,
            details: None,
        }
    }
}

/// The flag output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Flag {
    /// Whether the instance conforms.
    pub valid: bool,
}

/// One entry of the list output format.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OutputUnit {
    pub valid: bool,
    #[serde(rename = "evaluationPath")]
    pub evaluation_path: String,
    #[serde(rename = "schemaLocation")]
    pub schema_location: String,
    #[serde(rename = "instanceLocation")]
    pub instance_location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<OutputUnit>>,
}

/// A single keyword failure.
///
/// `code` is the stable public identifier consumed by translators; the
/// built-in `message_template` is the fallback rendering. Templates refer to
/// `params` entries with `{name}` placeholders.
#[derive(Debug, Clone)]
pub struct EvaluationError {
    pub keyword: &'static str,
    pub code: &'static str,
    pub message_template: &'static str,
    pub params: Vec<(&'static str, Value)>,
}

impl EvaluationError {
    /// Render the built-in message template with this error's parameters.
    #[must_use]
    pub fn message(&self) -> String {
        interpolate(self.message_template, &self.params)
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}

impl std::fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

/// Substitute `{name}` placeholders with parameter values. Strings render
/// bare, lists render as comma-separated quoted items, everything else as
/// JSON.
pub(crate) fn interpolate(template: &str, params: &[(&'static str, Value)]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        output.push_str(&rest[..start]);
        rest = &rest[start + 1..];
        match rest.find('}') {
            Some(end) => {
                let name = &rest[..end];
                match params.iter().find(|(key, _)| *key == name) {
                    Some((_, value)) => output.push_str(&display_param(value)),
                    None => {
                        output.push('{');
                        output.push_str(name);
                        output.push('}');
                    }
                }
                rest = &rest[end + 1..];
            }
            None => {
                output.push('{');
                break;
            }
        }
    }
    output.push_str(rest);
    output
}

fn display_param(value: &Value) -> String {
    match value {
        Value::String(value) => value.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(item) => format!("'{item}'"),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn number(value: Number) -> Value {
    Value::Number(value)
}

fn string_list(values: Vec<String>) -> Value {
    Value::Array(values.into_iter().map(Value::String).collect())
}

/// Constructors for every error kind the evaluator can report.
impl EvaluationError {
    pub(crate) fn false_schema() -> EvaluationError {
        EvaluationError {
            keyword: "schema",
            code: "false_schema",
            message_template: "value not allowed by schema",
            params: Vec::new(),
        }
    }

    pub(crate) fn type_mismatch(expected: Vec<String>, actual: &'static str) -> EvaluationError {
        EvaluationError {
            keyword: "type",
            code: "type_mismatch",
            message_template: "value is {actual}, expected {expected}",
            params: vec![
                ("expected", string_list(expected)),
                ("actual", Value::String(actual.to_string())),
            ],
        }
    }

    pub(crate) fn value_not_in_enum(options: Vec<Value>) -> EvaluationError {
        EvaluationError {
            keyword: "enum",
            code: "value_not_in_enum",
            message_template: "value does not match any enum value",
            params: vec![("options", Value::Array(options))],
        }
    }

    pub(crate) fn const_mismatch(expected: Value) -> EvaluationError {
        EvaluationError {
            keyword: "const",
            code: "const_mismatch",
            message_template: "value must equal the constant",
            params: vec![("expected", expected)],
        }
    }

    pub(crate) fn not_multiple_of(value: Number, multiple_of: Number) -> EvaluationError {
        EvaluationError {
            keyword: "multipleOf",
            code: "not_multiple_of",
            message_template: "{value} is not a multiple of {multiple_of}",
            params: vec![("value", number(value)), ("multiple_of", number(multiple_of))],
        }
    }

    pub(crate) fn invalid_multiple_of(multiple_of: Number) -> EvaluationError {
        EvaluationError {
            keyword: "multipleOf",
            code: "invalid_multiple_of",
            message_template: "multipleOf value {multiple_of} must be positive",
            params: vec![("multiple_of", number(multiple_of))],
        }
    }

    pub(crate) fn value_above_maximum(value: Number, maximum: Number) -> EvaluationError {
        EvaluationError {
            keyword: "maximum",
            code: "value_above_maximum",
            message_template: "value {value} is greater than maximum {maximum}",
            params: vec![("value", number(value)), ("maximum", number(maximum))],
        }
    }

    pub(crate) fn value_above_exclusive_maximum(
        value: Number,
        exclusive_maximum: Number,
    ) -> EvaluationError {
        EvaluationError {
            keyword: "exclusiveMaximum",
            code: "value_above_exclusive_maximum",
            message_template: "value {value} is not less than exclusive maximum {exclusive_maximum}",
            params: vec![
                ("value", number(value)),
                ("exclusive_maximum", number(exclusive_maximum)),
            ],
        }
    }

    pub(crate) fn value_below_minimum(value: Number, minimum: Number) -> EvaluationError {
        EvaluationError {
            keyword: "minimum",
            code: "value_below_minimum",
            message_template: "value {value} is less than minimum {minimum}",
            params: vec![("value", number(value)), ("minimum", number(minimum))],
        }
    }

    pub(crate) fn value_below_exclusive_minimum(
        value: Number,
        exclusive_minimum: Number,
    ) -> EvaluationError {
        EvaluationError {
            keyword: "exclusiveMinimum",
            code: "value_below_exclusive_minimum",
            message_template:
                "value {value} is not greater than exclusive minimum {exclusive_minimum}",
            params: vec![
                ("value", number(value)),
                ("exclusive_minimum", number(exclusive_minimum)),
            ],
        }
    }

    pub(crate) fn string_too_long(length: u64, max_length: u64) -> EvaluationError {
        EvaluationError {
            keyword: "maxLength",
            code: "string_too_long",
            message_template: "string should be at most {max_length} characters",
            params: vec![
                ("length", Value::from(length)),
                ("max_length", Value::from(max_length)),
            ],
        }
    }

    pub(crate) fn string_too_short(length: u64, min_length: u64) -> EvaluationError {
        EvaluationError {
            keyword: "minLength",
            code: "string_too_short",
            message_template: "string should be at least {min_length} characters",
            params: vec![
                ("length", Value::from(length)),
                ("min_length", Value::from(min_length)),
            ],
        }
    }

    pub(crate) fn pattern_mismatch(pattern: String) -> EvaluationError {
        EvaluationError {
            keyword: "pattern",
            code: "pattern_mismatch",
            message_template: "string does not match pattern {pattern}",
            params: vec![("pattern", Value::String(pattern))],
        }
    }

    pub(crate) fn too_many_items(count: u64, max_items: u64) -> EvaluationError {
        EvaluationError {
            keyword: "maxItems",
            code: "too_many_items",
            message_template: "array has {count} items, expected at most {max_items}",
            params: vec![
                ("count", Value::from(count)),
                ("max_items", Value::from(max_items)),
            ],
        }
    }

    pub(crate) fn too_few_items(count: u64, min_items: u64) -> EvaluationError {
        EvaluationError {
            keyword: "minItems",
            code: "too_few_items",
            message_template: "array has {count} items, expected at least {min_items}",
            params: vec![
                ("count", Value::from(count)),
                ("min_items", Value::from(min_items)),
            ],
        }
    }

    pub(crate) fn items_not_unique(first: usize, second: usize) -> EvaluationError {
        EvaluationError {
            keyword: "uniqueItems",
            code: "items_not_unique",
            message_template: "items at {first} and {second} are equal",
            params: vec![
                ("first", Value::from(first)),
                ("second", Value::from(second)),
            ],
        }
    }

    pub(crate) fn contains_mismatch() -> EvaluationError {
        EvaluationError {
            keyword: "contains",
            code: "contains_mismatch",
            message_template: "no array items match the contains schema",
            params: Vec::new(),
        }
    }

    pub(crate) fn too_few_contains_matches(count: u64, min_contains: u64) -> EvaluationError {
        EvaluationError {
            keyword: "minContains",
            code: "too_few_contains_matches",
            message_template:
                "array has {count} items matching contains, expected at least {min_contains}",
            params: vec![
                ("count", Value::from(count)),
                ("min_contains", Value::from(min_contains)),
            ],
        }
    }

    pub(crate) fn too_many_contains_matches(count: u64, max_contains: u64) -> EvaluationError {
        EvaluationError {
            keyword: "maxContains",
            code: "too_many_contains_matches",
            message_template:
                "array has {count} items matching contains, expected at most {max_contains}",
            params: vec![
                ("count", Value::from(count)),
                ("max_contains", Value::from(max_contains)),
            ],
        }
    }

    pub(crate) fn too_many_properties(count: u64, max_properties: u64) -> EvaluationError {
        EvaluationError {
            keyword: "maxProperties",
            code: "too_many_properties",
            message_template: "object has {count} properties, expected at most {max_properties}",
            params: vec![
                ("count", Value::from(count)),
                ("max_properties", Value::from(max_properties)),
            ],
        }
    }

    pub(crate) fn too_few_properties(count: u64, min_properties: u64) -> EvaluationError {
        EvaluationError {
            keyword: "minProperties",
            code: "too_few_properties",
            message_template: "object has {count} properties, expected at least {min_properties}",
            params: vec![
                ("count", Value::from(count)),
                ("min_properties", Value::from(min_properties)),
            ],
        }
    }

    pub(crate) fn missing_required_property(missing: Vec<String>) -> EvaluationError {
        EvaluationError {
            keyword: "required",
            code: "missing_required_property",
            message_template: "required properties {missing} are missing",
            params: vec![("missing", string_list(missing))],
        }
    }

    pub(crate) fn missing_dependent_property(
        property: String,
        missing: Vec<String>,
    ) -> EvaluationError {
        EvaluationError {
            keyword: "dependentRequired",
            code: "missing_dependent_property",
            message_template: "properties {missing} are required when {property} is present",
            params: vec![
                ("property", Value::String(property)),
                ("missing", string_list(missing)),
            ],
        }
    }

    pub(crate) fn properties_mismatch(properties: Vec<String>) -> EvaluationError {
        EvaluationError {
            keyword: "properties",
            code: "properties_mismatch",
            message_template: "properties {properties} do not match their schemas",
            params: vec![("properties", string_list(properties))],
        }
    }

    pub(crate) fn pattern_properties_mismatch(properties: Vec<String>) -> EvaluationError {
        EvaluationError {
            keyword: "patternProperties",
            code: "pattern_properties_mismatch",
            message_template: "properties {properties} do not match their pattern schemas",
            params: vec![("properties", string_list(properties))],
        }
    }

    pub(crate) fn additional_properties_not_allowed(unexpected: Vec<String>) -> EvaluationError {
        EvaluationError {
            keyword: "additionalProperties",
            code: "additional_properties_not_allowed",
            message_template: "additional properties {unexpected} are not allowed",
            params: vec![("unexpected", string_list(unexpected))],
        }
    }

    pub(crate) fn additional_properties_mismatch(properties: Vec<String>) -> EvaluationError {
        EvaluationError {
            keyword: "additionalProperties",
            code: "additional_properties_mismatch",
            message_template: "additional properties {properties} do not match the schema",
            params: vec![("properties", string_list(properties))],
        }
    }

    pub(crate) fn invalid_property_name(properties: Vec<String>) -> EvaluationError {
        EvaluationError {
            keyword: "propertyNames",
            code: "invalid_property_name",
            message_template: "property names {properties} are not valid",
            params: vec![("properties", string_list(properties))],
        }
    }

    pub(crate) fn prefix_items_mismatch(indices: Vec<usize>) -> EvaluationError {
        EvaluationError {
            keyword: "prefixItems",
            code: "prefix_items_mismatch",
            message_template: "items at {indices} do not match their schemas",
            params: vec![(
                "indices",
                Value::Array(indices.into_iter().map(Value::from).collect()),
            )],
        }
    }

    pub(crate) fn items_mismatch(indices: Vec<usize>) -> EvaluationError {
        EvaluationError {
            keyword: "items",
            code: "items_mismatch",
            message_template: "items at {indices} do not match the schema",
            params: vec![(
                "indices",
                Value::Array(indices.into_iter().map(Value::from).collect()),
            )],
        }
    }

    pub(crate) fn unevaluated_properties_not_allowed(unexpected: Vec<String>) -> EvaluationError {
        EvaluationError {
            keyword: "unevaluatedProperties",
            code: "unevaluated_properties_not_allowed",
            message_template: "unevaluated properties {unexpected} are not allowed",
            params: vec![("unexpected", string_list(unexpected))],
        }
    }

    pub(crate) fn unevaluated_items_not_allowed(indices: Vec<usize>) -> EvaluationError {
        EvaluationError {
            keyword: "unevaluatedItems",
            code: "unevaluated_items_not_allowed",
            message_template: "unevaluated items at {indices} are not allowed",
            params: vec![(
                "indices",
                Value::Array(indices.into_iter().map(Value::from).collect()),
            )],
        }
    }

    pub(crate) fn all_of_mismatch(failed: Vec<usize>) -> EvaluationError {
        EvaluationError {
            keyword: "allOf",
            code: "all_of_mismatch",
            message_template: "value does not match subschemas {failed} in allOf",
            params: vec![(
                "failed",
                Value::Array(failed.into_iter().map(Value::from).collect()),
            )],
        }
    }

    pub(crate) fn any_of_mismatch() -> EvaluationError {
        EvaluationError {
            keyword: "anyOf",
            code: "any_of_mismatch",
            message_template: "value does not match any schema in anyOf",
            params: Vec::new(),
        }
    }

    pub(crate) fn one_of_mismatch(matches: u64) -> EvaluationError {
        EvaluationError {
            keyword: "oneOf",
            code: "one_of_mismatch",
            message_template: "value matches {matches} schemas in oneOf, expected exactly one",
            params: vec![("matches", Value::from(matches))],
        }
    }

    pub(crate) fn not_allowed() -> EvaluationError {
        EvaluationError {
            keyword: "not",
            code: "not_allowed",
            message_template: "value must not match the schema",
            params: Vec::new(),
        }
    }

    pub(crate) fn then_mismatch() -> EvaluationError {
        EvaluationError {
            keyword: "then",
            code: "then_mismatch",
            message_template: "value does not match the then schema",
            params: Vec::new(),
        }
    }

    pub(crate) fn else_mismatch() -> EvaluationError {
        EvaluationError {
            keyword: "else",
            code: "else_mismatch",
            message_template: "value does not match the else schema",
            params: Vec::new(),
        }
    }

    pub(crate) fn dependent_schema_mismatch(property: String) -> EvaluationError {
        EvaluationError {
            keyword: "dependentSchemas",
            code: "dependent_schema_mismatch",
            message_template: "value does not match the schema dependent on {property}",
            params: vec![("property", Value::String(property))],
        }
    }

    pub(crate) fn ref_mismatch(keyword: &'static str, reference: String) -> EvaluationError {
        EvaluationError {
            keyword,
            code: "ref_mismatch",
            message_template: "value does not match the referenced schema {reference}",
            params: vec![("reference", Value::String(reference))],
        }
    }

    pub(crate) fn ref_unresolved(keyword: &'static str, reference: String) -> EvaluationError {
        EvaluationError {
            keyword,
            code: "ref_unresolved",
            message_template: "reference {reference} could not be resolved",
            params: vec![("reference", Value::String(reference))],
        }
    }

    pub(crate) fn format_mismatch(format: String) -> EvaluationError {
        EvaluationError {
            keyword: "format",
            code: "format_mismatch",
            message_template: "value does not match format {format}",
            params: vec![("format", Value::String(format))],
        }
    }

    pub(crate) fn unknown_format(format: String) -> EvaluationError {
        EvaluationError {
            keyword: "format",
            code: "unknown_format",
            message_template: "format {format} is not recognized",
            params: vec![("format", Value::String(format))],
        }
    }

    pub(crate) fn content_encoding_mismatch(encoding: String, message: String) -> EvaluationError {
        EvaluationError {
            keyword: "contentEncoding",
            code: "content_encoding_mismatch",
            message_template: "value is not valid {encoding}: {message}",
            params: vec![
                ("encoding", Value::String(encoding)),
                ("message", Value::String(message)),
            ],
        }
    }

    pub(crate) fn unknown_content_encoding(encoding: String) -> EvaluationError {
        EvaluationError {
            keyword: "contentEncoding",
            code: "unknown_content_encoding",
            message_template: "content encoding {encoding} is not recognized",
            params: vec![("encoding", Value::String(encoding))],
        }
    }

    pub(crate) fn content_media_type_mismatch(
        media_type: String,
        message: String,
    ) -> EvaluationError {
        EvaluationError {
            keyword: "contentMediaType",
            code: "content_media_type_mismatch",
            message_template: "value is not valid {media_type}: {message}",
            params: vec![
                ("media_type", Value::String(media_type)),
                ("message", Value::String(message)),
            ],
        }
    }

    pub(crate) fn unknown_content_media_type(media_type: String) -> EvaluationError {
        EvaluationError {
            keyword: "contentMediaType",
            code: "unknown_content_media_type",
            message_template: "content media type {media_type} is not recognized",
            params: vec![("media_type", Value::String(media_type))],
        }
    }

    pub(crate) fn content_schema_mismatch() -> EvaluationError {
        EvaluationError {
            keyword: "contentSchema",
            code: "content_schema_mismatch",
            message_template: "decoded content does not match the content schema",
            params: Vec::new(),
        }
    }
}
