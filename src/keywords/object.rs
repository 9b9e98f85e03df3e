//! Object keywords: property applicators and the object-shape assertions.
use serde_json::{Map, Value};

use crate::{
    evaluator::{evaluate, EvalContext, Evaluated},
    paths::LazyPointer,
    result::EvaluationError,
    schema::{ObjectSchema, SchemaKind},
    scope::DynamicScope,
};

pub(crate) fn eval_applicators(
    ctx: &EvalContext<'_>,
    scope: &mut DynamicScope,
    object: &ObjectSchema,
    entries: &Map<String, Value>,
    instance_location: &LazyPointer<'_, '_>,
    evaluation_path: &LazyPointer<'_, '_>,
    out: &mut Evaluated,
) {
    if let Some(properties) = &object.properties {
        let mut failed = Vec::new();
        // Schema source order, not instance order.
        for (name, subschema) in properties {
            let Some(value) = entries.get(name) else {
                continue;
            };
            let keyword_path = evaluation_path.push_keyword("properties");
            let property_path = keyword_path.push(name.as_str());
            let property_location = instance_location.push(name.as_str());
            let child = evaluate(
                ctx,
                scope,
                *subschema,
                value,
                &property_location,
                &property_path,
            );
            // A named property counts as evaluated even when its value
            // fails, so `unevaluated*` behaves.
            out.props.insert(name.clone());
            if !child.is_valid() {
                failed.push(name.clone());
            }
            out.result.details.push(child.result);
        }
        if !failed.is_empty() {
            out.result
                .errors
                .push(EvaluationError::properties_mismatch(failed));
        }
    }
    if let Some(patterns) = &object.pattern_properties {
        let mut failed = Vec::new();
        for entry in patterns {
            for (name, value) in entries {
                if !entry.pattern.is_match(name) {
                    continue;
                }
                let keyword_path = evaluation_path.push_keyword("patternProperties");
                let pattern_path = keyword_path.push(entry.pattern.source.as_str());
                let property_location = instance_location.push(name.as_str());
                let child = evaluate(
                    ctx,
                    scope,
                    entry.schema,
                    value,
                    &property_location,
                    &pattern_path,
                );
                out.props.insert(name.clone());
                if !child.is_valid() {
                    failed.push(name.clone());
                }
                out.result.details.push(child.result);
            }
        }
        if !failed.is_empty() {
            out.result
                .errors
                .push(EvaluationError::pattern_properties_mismatch(failed));
        }
    }
    if let Some(subschema) = object.additional_properties {
        let uncovered: Vec<&String> = entries
            .keys()
            .filter(|name| !object.has_property(name) && !object.matches_any_pattern(name))
            .collect();
        if let SchemaKind::Bool(false) = ctx.registry.arena.get(subschema).kind {
            if !uncovered.is_empty() {
                out.result
                    .errors
                    .push(EvaluationError::additional_properties_not_allowed(
                        uncovered.iter().map(|name| (*name).clone()).collect(),
                    ));
            }
        } else {
            let mut failed = Vec::new();
            for name in uncovered {
                let value = &entries[name.as_str()];
                let keyword_path = evaluation_path.push_keyword("additionalProperties");
                let property_location = instance_location.push(name.as_str());
                let child = evaluate(
                    ctx,
                    scope,
                    subschema,
                    value,
                    &property_location,
                    &keyword_path,
                );
                if child.is_valid() {
                    out.props.insert(name.clone());
                } else {
                    failed.push(name.clone());
                }
                out.result.details.push(child.result);
            }
            if !failed.is_empty() {
                out.result
                    .errors
                    .push(EvaluationError::additional_properties_mismatch(failed));
            }
        }
    }
    if let Some(subschema) = object.property_names {
        let mut failed = Vec::new();
        for name in entries.keys() {
            let keyword_path = evaluation_path.push_keyword("propertyNames");
            let property_location = instance_location.push(name.as_str());
            let as_value = Value::String(name.clone());
            let child = evaluate(
                ctx,
                scope,
                subschema,
                &as_value,
                &property_location,
                &keyword_path,
            );
            if !child.is_valid() {
                failed.push(name.clone());
            }
            out.result.details.push(child.result);
        }
        if !failed.is_empty() {
            out.result
                .errors
                .push(EvaluationError::invalid_property_name(failed));
        }
    }
}

pub(crate) fn eval_constraints(
    object: &ObjectSchema,
    entries: &Map<String, Value>,
    out: &mut Evaluated,
) {
    let count = entries.len() as u64;
    if let Some(max_properties) = object.max_properties {
        if count > max_properties {
            out.result
                .errors
                .push(EvaluationError::too_many_properties(count, max_properties));
        }
    }
    if let Some(min_properties) = object.min_properties {
        if count < min_properties {
            out.result
                .errors
                .push(EvaluationError::too_few_properties(count, min_properties));
        }
    }
    if let Some(required) = &object.required {
        // Reported in schema source order.
        let missing: Vec<String> = required
            .iter()
            .filter(|name| !entries.contains_key(name.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            out.result
                .errors
                .push(EvaluationError::missing_required_property(missing));
        }
    }
    if let Some(dependencies) = &object.dependent_required {
        for (property, dependents) in dependencies {
            if !entries.contains_key(property.as_str()) {
                continue;
            }
            let missing: Vec<String> = dependents
                .iter()
                .filter(|name| !entries.contains_key(name.as_str()))
                .cloned()
                .collect();
            if !missing.is_empty() {
                out.result
                    .errors
                    .push(EvaluationError::missing_dependent_property(
                        property.clone(),
                        missing,
                    ));
            }
        }
    }
}

/// The degraded-mode check: `additionalProperties: false` still rejects
/// properties outside the literally named set, without any descent.
pub(crate) fn eval_forbidden_additional(
    ctx: &EvalContext<'_>,
    object: &ObjectSchema,
    entries: &Map<String, Value>,
    out: &mut Evaluated,
) {
    let Some(subschema) = object.additional_properties else {
        return;
    };
    if !matches!(ctx.registry.arena.get(subschema).kind, SchemaKind::Bool(false)) {
        return;
    }
    let unexpected: Vec<String> = entries
        .keys()
        .filter(|name| !object.has_property(name) && !object.matches_any_pattern(name))
        .cloned()
        .collect();
    if !unexpected.is_empty() {
        out.result
            .errors
            .push(EvaluationError::additional_properties_not_allowed(unexpected));
    }
}
