//! Logical applicators, conditionals and dependent schemas.
//!
//! These apply subschemas to the same instance location, so each passing
//! branch's evaluated sets may merge into the caller per the rules in the
//! result model: `allOf`/`anyOf` per passing branch, `oneOf` only the single
//! passing branch, `not` never.
use serde_json::Value;

use crate::{
    evaluator::{evaluate, EvalContext, Evaluated},
    paths::LazyPointer,
    result::EvaluationError,
    schema::ObjectSchema,
    scope::DynamicScope,
};

pub(crate) fn eval_logic(
    ctx: &EvalContext<'_>,
    scope: &mut DynamicScope,
    object: &ObjectSchema,
    instance: &Value,
    instance_location: &LazyPointer<'_, '_>,
    evaluation_path: &LazyPointer<'_, '_>,
    out: &mut Evaluated,
) {
    if let Some(subschemas) = &object.all_of {
        let mut failed = Vec::new();
        for (index, subschema) in subschemas.iter().enumerate() {
            let keyword_path = evaluation_path.push_keyword("allOf");
            let branch_path = keyword_path.push(index);
            let child = evaluate(
                ctx,
                scope,
                *subschema,
                instance,
                instance_location,
                &branch_path,
            );
            if child.is_valid() {
                out.merge_sets(&child);
            } else {
                failed.push(index);
            }
            out.result.details.push(child.result);
        }
        if !failed.is_empty() {
            out.result
                .errors
                .push(EvaluationError::all_of_mismatch(failed));
        }
    }
    if let Some(subschemas) = &object.any_of {
        let mut any_passed = false;
        // Every branch runs: annotation collection does not short-circuit.
        for (index, subschema) in subschemas.iter().enumerate() {
            let keyword_path = evaluation_path.push_keyword("anyOf");
            let branch_path = keyword_path.push(index);
            let child = evaluate(
                ctx,
                scope,
                *subschema,
                instance,
                instance_location,
                &branch_path,
            );
            if child.is_valid() {
                any_passed = true;
                out.merge_sets(&child);
            }
            out.result.details.push(child.result);
        }
        if !any_passed {
            out.result.errors.push(EvaluationError::any_of_mismatch());
        }
    }
    if let Some(subschemas) = &object.one_of {
        let mut passed = Vec::new();
        for (index, subschema) in subschemas.iter().enumerate() {
            let keyword_path = evaluation_path.push_keyword("oneOf");
            let branch_path = keyword_path.push(index);
            let child = evaluate(
                ctx,
                scope,
                *subschema,
                instance,
                instance_location,
                &branch_path,
            );
            if child.is_valid() {
                passed.push(child);
            } else {
                out.result.details.push(child.result);
            }
        }
        if passed.len() == 1 {
            let child = passed.pop().expect("exactly one passing branch");
            out.merge_sets(&child);
            out.result.details.push(child.result);
        } else {
            let matches = passed.len() as u64;
            for child in passed {
                out.result.details.push(child.result);
            }
            out.result
                .errors
                .push(EvaluationError::one_of_mismatch(matches));
        }
    }
    if let Some(subschema) = object.not {
        let keyword_path = evaluation_path.push_keyword("not");
        let child = evaluate(
            ctx,
            scope,
            subschema,
            instance,
            instance_location,
            &keyword_path,
        );
        if child.is_valid() {
            out.result.errors.push(EvaluationError::not_allowed());
        }
        // `not` never contributes evaluated sets.
        out.result.details.push(child.result);
    }
}

pub(crate) fn eval_conditional(
    ctx: &EvalContext<'_>,
    scope: &mut DynamicScope,
    object: &ObjectSchema,
    instance: &Value,
    instance_location: &LazyPointer<'_, '_>,
    evaluation_path: &LazyPointer<'_, '_>,
    out: &mut Evaluated,
) {
    let Some(condition) = object.if_ else {
        return;
    };
    let keyword_path = evaluation_path.push_keyword("if");
    let condition_result = evaluate(
        ctx,
        scope,
        condition,
        instance,
        instance_location,
        &keyword_path,
    );
    let condition_passed = condition_result.is_valid();
    // The `if` subschema's evaluated sets count either way; this is what
    // lets `unevaluated*` see properties the condition inspected.
    out.merge_sets(&condition_result);
    out.result.details.push(condition_result.result);
    if condition_passed {
        if let Some(subschema) = object.then {
            let branch_path = evaluation_path.push_keyword("then");
            let child = evaluate(
                ctx,
                scope,
                subschema,
                instance,
                instance_location,
                &branch_path,
            );
            if child.is_valid() {
                out.merge_sets(&child);
            } else {
                out.result.errors.push(EvaluationError::then_mismatch());
            }
            out.result.details.push(child.result);
        }
    } else if let Some(subschema) = object.else_ {
        let branch_path = evaluation_path.push_keyword("else");
        let child = evaluate(
            ctx,
            scope,
            subschema,
            instance,
            instance_location,
            &branch_path,
        );
        if child.is_valid() {
            out.merge_sets(&child);
        } else {
            out.result.errors.push(EvaluationError::else_mismatch());
        }
        out.result.details.push(child.result);
    }
}

pub(crate) fn eval_dependent_schemas(
    ctx: &EvalContext<'_>,
    scope: &mut DynamicScope,
    object: &ObjectSchema,
    instance: &Value,
    instance_location: &LazyPointer<'_, '_>,
    evaluation_path: &LazyPointer<'_, '_>,
    out: &mut Evaluated,
) {
    let Some(dependencies) = &object.dependent_schemas else {
        return;
    };
    let Some(entries) = instance.as_object() else {
        return;
    };
    for (property, subschema) in dependencies {
        if !entries.contains_key(property.as_str()) {
            continue;
        }
        let keyword_path = evaluation_path.push_keyword("dependentSchemas");
        let branch_path = keyword_path.push(property.as_str());
        let child = evaluate(
            ctx,
            scope,
            *subschema,
            instance,
            instance_location,
            &branch_path,
        );
        if child.is_valid() {
            out.merge_sets(&child);
        } else {
            out.result
                .errors
                .push(EvaluationError::dependent_schema_mismatch(property.clone()));
        }
        out.result.details.push(child.result);
    }
}
