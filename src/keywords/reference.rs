//! `$ref` and `$dynamicRef` application.
//!
//! Reference targets were resolved at compile time; `$dynamicRef`
//! additionally rebinds through the dynamic scope when its initial target
//! carries a matching `$dynamicAnchor`. Evaluated sets from reference
//! targets merge into the caller whether the target passed or failed.
use serde_json::Value;

use crate::{
    evaluator::{evaluate, EvalContext, Evaluated},
    paths::LazyPointer,
    result::EvaluationError,
    schema::{ObjectSchema, Reference, SchemaId},
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
    if let Some(reference) = &object.ref_ {
        match reference.resolved {
            Some(target) => {
                apply_target(
                    ctx,
                    scope,
                    "$ref",
                    reference,
                    target,
                    instance,
                    instance_location,
                    evaluation_path,
                    out,
                );
            }
            None => out.result.errors.push(EvaluationError::ref_unresolved(
                "$ref",
                reference.reference.clone(),
            )),
        }
    }
    if let Some(reference) = &object.dynamic_ref {
        match dynamic_target(ctx, scope, reference) {
            Some(target) => {
                apply_target(
                    ctx,
                    scope,
                    "$dynamicRef",
                    reference,
                    target,
                    instance,
                    instance_location,
                    evaluation_path,
                    out,
                );
            }
            None => out.result.errors.push(EvaluationError::ref_unresolved(
                "$dynamicRef",
                reference.reference.clone(),
            )),
        }
    }
}

/// Pick the target of a `$dynamicRef`.
///
/// A plain JSON Pointer fragment never rebinds. An anchor fragment rebinds
/// only when the statically resolved target declares the same
/// `$dynamicAnchor`; the outermost dynamic scope entry wins.
fn dynamic_target(
    ctx: &EvalContext<'_>,
    scope: &DynamicScope,
    reference: &Reference,
) -> Option<SchemaId> {
    let anchor = match &reference.anchor {
        Some(anchor) => anchor,
        None => return reference.resolved,
    };
    match reference.resolved {
        Some(target) => {
            let bookended = ctx
                .registry
                .arena
                .get(target)
                .object()
                .is_some_and(|object| object.dynamic_anchor.as_deref() == Some(anchor.as_str()));
            if bookended {
                scope
                    .lookup_dynamic_anchor(&ctx.registry.arena, anchor)
                    .or(Some(target))
            } else {
                Some(target)
            }
        }
        None => scope.lookup_dynamic_anchor(&ctx.registry.arena, anchor),
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_target(
    ctx: &EvalContext<'_>,
    scope: &mut DynamicScope,
    keyword: &'static str,
    reference: &Reference,
    target: SchemaId,
    instance: &Value,
    instance_location: &LazyPointer<'_, '_>,
    evaluation_path: &LazyPointer<'_, '_>,
    out: &mut Evaluated,
) {
    let keyword_path = evaluation_path.push_keyword(keyword);
    let child = evaluate(ctx, scope, target, instance, instance_location, &keyword_path);
    // Evaluated sets merge on pass and on fail alike.
    out.merge_sets(&child);
    if !child.is_valid() {
        out.result.errors.push(EvaluationError::ref_mismatch(
            keyword,
            reference.reference.clone(),
        ));
    }
    out.result.details.push(child.result);
}
