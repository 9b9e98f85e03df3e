//! The evaluation engine: dispatches keywords in the draft-defined order and
//! threads evaluated-property / evaluated-item annotations through every
//! subschema application.
use ahash::AHashSet;
use serde_json::Value;

use crate::{
    compiler::Registry,
    keywords,
    paths::LazyPointer,
    result::{EvaluationError, EvaluationResult},
    schema::{ObjectSchema, SchemaId, SchemaKind},
    scope::DynamicScope,
};

/// Shared read-only evaluation state.
pub(crate) struct EvalContext<'r> {
    pub(crate) registry: &'r Registry,
}

/// The outcome of one subschema application: the result node plus the
/// evaluated sets the caller may merge.
pub(crate) struct Evaluated {
    pub(crate) result: EvaluationResult,
    /// Property names of the instance evaluated by this application.
    pub(crate) props: AHashSet<String>,
    /// Item indices of the instance evaluated by this application.
    pub(crate) items: AHashSet<usize>,
}

impl Evaluated {
    pub(crate) fn is_valid(&self) -> bool {
        self.result.valid
    }

    /// Adopt another application's evaluated sets. The caller decides when:
    /// references merge unconditionally, logical applicators only from
    /// passing branches.
    pub(crate) fn merge_sets(&mut self, other: &Evaluated) {
        self.props.extend(other.props.iter().cloned());
        self.items.extend(other.items.iter().copied());
    }
}

/// Evaluate `instance` against the schema rooted at `id` with a fresh
/// dynamic scope.
pub(crate) fn evaluate_root(
    registry: &Registry,
    id: SchemaId,
    instance: &Value,
) -> EvaluationResult {
    let ctx = EvalContext { registry };
    let mut scope = DynamicScope::new();
    let instance_location = LazyPointer::new();
    let evaluation_path = LazyPointer::new();
    evaluate(
        &ctx,
        &mut scope,
        id,
        instance,
        &instance_location,
        &evaluation_path,
    )
    .result
}

/// Apply one schema to one instance location. This is the single entry and
/// exit point for the dynamic scope, so pushes always pair with pops.
pub(crate) fn evaluate(
    ctx: &EvalContext<'_>,
    scope: &mut DynamicScope,
    id: SchemaId,
    instance: &Value,
    instance_location: &LazyPointer<'_, '_>,
    evaluation_path: &LazyPointer<'_, '_>,
) -> Evaluated {
    let node = ctx.registry.arena.get(id);
    let mut out = Evaluated {
        result: EvaluationResult::new(
            evaluation_path.to_pointer(),
            node.location(),
            instance_location.to_pointer(),
        ),
        props: AHashSet::new(),
        items: AHashSet::new(),
    };
    match &node.kind {
        SchemaKind::Bool(true) => mark_all_evaluated(instance, &mut out),
        SchemaKind::Bool(false) => out.result.errors.push(EvaluationError::false_schema()),
        SchemaKind::Object(object) => {
            if scope.occurrences(id) >= object.recursion.allowance() {
                // Cycle budget exhausted: keep asserting, stop descending.
                evaluate_degraded(ctx, object, instance, &mut out);
            } else {
                scope.push(id);
                evaluate_object(
                    ctx,
                    scope,
                    object,
                    instance,
                    instance_location,
                    evaluation_path,
                    &mut out,
                );
                scope.pop();
            }
        }
    }
    out.result.valid = out.result.errors.is_empty();
    out
}

/// Keyword dispatch for a keyword schema. Every step contributes to the same
/// result node and all steps run: errors accumulate, and annotation
/// collection depends on running every applicator.
fn evaluate_object(
    ctx: &EvalContext<'_>,
    scope: &mut DynamicScope,
    object: &ObjectSchema,
    instance: &Value,
    instance_location: &LazyPointer<'_, '_>,
    evaluation_path: &LazyPointer<'_, '_>,
    out: &mut Evaluated,
) {
    collect_annotations(object, out);
    keywords::reference::eval(
        ctx,
        scope,
        object,
        instance,
        instance_location,
        evaluation_path,
        out,
    );
    keywords::eval_general(object, instance, out);
    keywords::applicator::eval_logic(
        ctx,
        scope,
        object,
        instance,
        instance_location,
        evaluation_path,
        out,
    );
    keywords::applicator::eval_conditional(
        ctx,
        scope,
        object,
        instance,
        instance_location,
        evaluation_path,
        out,
    );
    match instance {
        Value::Array(items) => {
            keywords::array::eval_applicators(
                ctx,
                scope,
                object,
                items,
                instance_location,
                evaluation_path,
                out,
            );
            keywords::array::eval_constraints(object, items, out);
        }
        Value::Number(number) => keywords::numeric::eval(object, number, out),
        Value::String(value) => keywords::string::eval(object, value, out),
        Value::Object(entries) => {
            keywords::object::eval_applicators(
                ctx,
                scope,
                object,
                entries,
                instance_location,
                evaluation_path,
                out,
            );
            keywords::object::eval_constraints(object, entries, out);
        }
        _ => {}
    }
    keywords::applicator::eval_dependent_schemas(
        ctx,
        scope,
        object,
        instance,
        instance_location,
        evaluation_path,
        out,
    );
    keywords::unevaluated::eval(
        ctx,
        scope,
        object,
        instance,
        instance_location,
        evaluation_path,
        out,
    );
    keywords::format::eval(ctx, object, instance, out);
    if let Value::String(value) = instance {
        keywords::content::eval(
            ctx,
            scope,
            object,
            value,
            instance_location,
            evaluation_path,
            out,
        );
    }
}

/// Reference-free evaluation used once the cycle budget is exhausted: basic
/// assertions still run against the instance, but `$ref`, applicators and
/// descent into property or item schemas are skipped.
fn evaluate_degraded(
    ctx: &EvalContext<'_>,
    object: &ObjectSchema,
    instance: &Value,
    out: &mut Evaluated,
) {
    keywords::eval_general(object, instance, out);
    match instance {
        Value::Number(number) => keywords::numeric::eval(object, number, out),
        Value::String(value) => keywords::string::eval(object, value, out),
        Value::Array(items) => keywords::array::eval_constraints(object, items, out),
        Value::Object(entries) => {
            keywords::object::eval_constraints(object, entries, out);
            keywords::object::eval_forbidden_additional(ctx, object, entries, out);
        }
        _ => {}
    }
    keywords::format::eval(ctx, object, instance, out);
}

/// A boolean `true` schema accepts the instance and evaluates all of it.
fn mark_all_evaluated(instance: &Value, out: &mut Evaluated) {
    match instance {
        Value::Object(entries) => out.props.extend(entries.keys().cloned()),
        Value::Array(items) => out.items.extend(0..items.len()),
        _ => {}
    }
}

fn collect_annotations(object: &ObjectSchema, out: &mut Evaluated) {
    let annotations = &mut out.result.annotations;
    if let Some(value) = &object.title {
        annotations.push(("title".to_string(), Value::String(value.clone())));
    }
    if let Some(value) = &object.description {
        annotations.push(("description".to_string(), Value::String(value.clone())));
    }
    if let Some(value) = &object.default {
        annotations.push(("default".to_string(), value.clone()));
    }
    if let Some(value) = object.deprecated {
        annotations.push(("deprecated".to_string(), Value::Bool(value)));
    }
    if let Some(value) = object.read_only {
        annotations.push(("readOnly".to_string(), Value::Bool(value)));
    }
    if let Some(value) = object.write_only {
        annotations.push(("writeOnly".to_string(), Value::Bool(value)));
    }
    if let Some(values) = &object.examples {
        annotations.push(("examples".to_string(), Value::Array(values.clone())));
    }
    for (keyword, value) in &object.extras {
        annotations.push((keyword.clone(), value.clone()));
    }
}

#[cfg(test)]
mod tests {
    use crate::tests_util;
    use serde_json::{json, Value};
    use test_case::test_case;

    #[test_case(&json!(true), &json!(42))]
    #[test_case(&json!({}), &json!({"any": "thing"}))]
    #[test_case(&json!({"type": "array"}), &json!([]))]
    fn accepts(schema: &Value, instance: &Value) {
        tests_util::is_valid(schema, instance);
    }

    #[test_case(&json!(false), &json!(null))]
    #[test_case(&json!({"not": {}}), &json!(1))]
    fn rejects(schema: &Value, instance: &Value) {
        tests_util::is_not_valid(schema, instance);
    }

    #[test]
    fn property_failures_surface_at_the_parent() {
        let (error, evaluation_path, instance_location) = tests_util::first_error(
            &json!({"properties": {"a": {"type": "string"}}}),
            &json!({"a": 1}),
        );
        assert_eq!(error.code, "properties_mismatch");
        assert_eq!(evaluation_path, "");
        assert_eq!(instance_location, "");
    }

    #[test]
    fn nested_error_locations() {
        let schema = json!({
            "properties": {"xs": {"items": {"type": "integer"}}}
        });
        let compiled = crate::compile(&schema).unwrap();
        let result = compiled.validate(&json!({"xs": [1, "two"]}));
        let leaf = result
            .iter()
            .find(|entry| entry.errors().iter().any(|error| error.keyword == "type"))
            .expect("the item type error is reported");
        assert_eq!(leaf.evaluation_path().to_string(), "/properties/xs/items");
        assert_eq!(leaf.instance_location().to_string(), "/xs/1");
    }

    #[test]
    fn all_keyword_steps_accumulate_errors() {
        let schema = json!({
            "type": "string",
            "minLength": 10,
            "pattern": "^zzz",
            "format": "ipv4"
        });
        let compiled = crate::compile(&schema).unwrap();
        let result = compiled.validate(&json!("short"));
        let keywords: Vec<&str> = result
            .iter()
            .flat_map(|entry| entry.errors())
            .map(|error| error.keyword)
            .collect();
        // No short-circuit: both violations are present.
        assert!(keywords.contains(&"minLength"));
        assert!(keywords.contains(&"pattern"));
    }
}

