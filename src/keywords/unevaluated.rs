//! `unevaluatedProperties` and `unevaluatedItems`.
//!
//! In contrast to `additionalProperties`, these see through `allOf`, `oneOf`,
//! `anyOf`, `if`/`then`/`else`, `dependentSchemas` and `$ref`: they apply
//! only to the parts of the instance that no applicator marked as evaluated,
//! which is why they must run after every annotation-contributing keyword.
use serde_json::Value;

use crate::{
    evaluator::{evaluate, EvalContext, Evaluated},
    paths::LazyPointer,
    result::EvaluationError,
    schema::{ObjectSchema, SchemaKind},
    scope::DynamicScope,
};

pub(crate) fn eval(
    ctx: &EvalContext<'_>,
    scope: &mut DynamicScope,
    object: &ObjectSchema,
    instance: &Value,
    instance_location: &LazyPointer<'_, '_>,
    evaluation_path: &LazyPointer<'_, '_>,
    out: &mut Evaluated,
) {
    match instance {
        Value::Object(entries) => {
            let Some(subschema) = object.unevaluated_properties else {
                return;
            };
            let unevaluated: Vec<String> = entries
                .keys()
                .filter(|name| !out.props.contains(name.as_str()))
                .cloned()
                .collect();
            if unevaluated.is_empty() {
                return;
            }
            if let SchemaKind::Bool(false) = ctx.registry.arena.get(subschema).kind {
                out.result
                    .errors
                    .push(EvaluationError::unevaluated_properties_not_allowed(
                        unevaluated,
                    ));
                return;
            }
            let mut failed = Vec::new();
            for name in unevaluated {
                let keyword_path = evaluation_path.push_keyword("unevaluatedProperties");
                let property_location = instance_location.push(name.as_str());
                let child = evaluate(
                    ctx,
                    scope,
                    subschema,
                    &entries[name.as_str()],
                    &property_location,
                    &keyword_path,
                );
                if !child.is_valid() {
                    failed.push(name.clone());
                }
                // Validated here, so evaluated from now on.
                out.props.insert(name);
                out.result.details.push(child.result);
            }
            if !failed.is_empty() {
                out.result
                    .errors
                    .push(EvaluationError::unevaluated_properties_not_allowed(failed));
            }
        }
        Value::Array(items) => {
            let Some(subschema) = object.unevaluated_items else {
                return;
            };
            let unevaluated: Vec<usize> = (0..items.len())
                .filter(|index| !out.items.contains(index))
                .collect();
            if unevaluated.is_empty() {
                return;
            }
            if let SchemaKind::Bool(false) = ctx.registry.arena.get(subschema).kind {
                out.result
                    .errors
                    .push(EvaluationError::unevaluated_items_not_allowed(unevaluated));
                return;
            }
            let mut failed = Vec::new();
            for index in unevaluated {
                let keyword_path = evaluation_path.push_keyword("unevaluatedItems");
                let item_location = instance_location.push(index);
                let child = evaluate(
                    ctx,
                    scope,
                    subschema,
                    &items[index],
                    &item_location,
                    &keyword_path,
                );
                if !child.is_valid() {
                    failed.push(index);
                }
                out.items.insert(index);
                out.result.details.push(child.result);
            }
            if !failed.is_empty() {
                out.result
                    .errors
                    .push(EvaluationError::unevaluated_items_not_allowed(failed));
            }
        }
        _ => {}
    }
}
