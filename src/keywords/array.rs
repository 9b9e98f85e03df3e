//! Array keywords: `prefixItems`, `items`, `contains` and the count
//! assertions.
use serde_json::Value;

use crate::{
    evaluator::{evaluate, EvalContext, Evaluated},
    keywords::equal,
    paths::LazyPointer,
    result::EvaluationError,
    schema::ObjectSchema,
    scope::DynamicScope,
};

pub(crate) fn eval_applicators(
    ctx: &EvalContext<'_>,
    scope: &mut DynamicScope,
    object: &ObjectSchema,
    items: &[Value],
    instance_location: &LazyPointer<'_, '_>,
    evaluation_path: &LazyPointer<'_, '_>,
    out: &mut Evaluated,
) {
    let mut prefix_len = 0;
    if let Some(prefix_items) = &object.prefix_items {
        prefix_len = prefix_items.len();
        let mut failed = Vec::new();
        for (index, subschema) in prefix_items.iter().enumerate().take(items.len()) {
            let keyword_path = evaluation_path.push_keyword("prefixItems");
            let branch_path = keyword_path.push(index);
            let item_location = instance_location.push(index);
            let child = evaluate(
                ctx,
                scope,
                *subschema,
                &items[index],
                &item_location,
                &branch_path,
            );
            if child.is_valid() {
                out.items.insert(index);
            } else {
                failed.push(index);
            }
            out.result.details.push(child.result);
        }
        if !failed.is_empty() {
            out.result
                .errors
                .push(EvaluationError::prefix_items_mismatch(failed));
        }
    }
    if let Some(subschema) = object.items {
        let mut failed = Vec::new();
        for (index, item) in items.iter().enumerate().skip(prefix_len) {
            let item_path = evaluation_path.push_keyword("items");
            let item_location = instance_location.push(index);
            let child = evaluate(ctx, scope, subschema, item, &item_location, &item_path);
            if child.is_valid() {
                out.items.insert(index);
            } else {
                failed.push(index);
            }
            out.result.details.push(child.result);
        }
        if !failed.is_empty() {
            out.result.errors.push(EvaluationError::items_mismatch(failed));
        }
    }
    if let Some(subschema) = object.contains {
        let mut matches = 0_u64;
        for (index, item) in items.iter().enumerate() {
            let item_path = evaluation_path.push_keyword("contains");
            let item_location = instance_location.push(index);
            let child = evaluate(ctx, scope, subschema, item, &item_location, &item_path);
            if child.is_valid() {
                matches += 1;
                out.items.insert(index);
            }
            out.result.details.push(child.result);
        }
        let min_contains = object.min_contains.unwrap_or(1);
        if matches == 0 && min_contains > 0 {
            out.result.errors.push(EvaluationError::contains_mismatch());
        } else if matches < min_contains {
            out.result
                .errors
                .push(EvaluationError::too_few_contains_matches(
                    matches,
                    min_contains,
                ));
        }
        if let Some(max_contains) = object.max_contains {
            if matches > max_contains {
                out.result
                    .errors
                    .push(EvaluationError::too_many_contains_matches(
                        matches,
                        max_contains,
                    ));
            }
        }
    }
}

pub(crate) fn eval_constraints(object: &ObjectSchema, items: &[Value], out: &mut Evaluated) {
    let count = items.len() as u64;
    if let Some(max_items) = object.max_items {
        if count > max_items {
            out.result
                .errors
                .push(EvaluationError::too_many_items(count, max_items));
        }
    }
    if let Some(min_items) = object.min_items {
        if count < min_items {
            out.result
                .errors
                .push(EvaluationError::too_few_items(count, min_items));
        }
    }
    if object.unique_items {
        if let Some((first, second)) = first_duplicate(items) {
            out.result
                .errors
                .push(EvaluationError::items_not_unique(first, second));
        }
    }
}

/// The first pair of deeply equal items; numeric equality folds `1` and
/// `1.0`.
fn first_duplicate(items: &[Value]) -> Option<(usize, usize)> {
    for (second, right) in items.iter().enumerate().skip(1) {
        for (first, left) in items.iter().enumerate().take(second) {
            if equal(left, right) {
                return Some((first, second));
            }
        }
    }
    None
}
