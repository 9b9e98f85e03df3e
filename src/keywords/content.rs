//! `contentEncoding`, `contentMediaType` and `contentSchema`.
//!
//! String instances only. The decoder and media-type registries are
//! consulted by name: compiler-registered handlers first, then the built-in
//! tables (`base64`; `application/json`, `application/yaml`).
use serde_json::Value;

use crate::{
    content::{DEFAULT_DECODERS, DEFAULT_MEDIA_TYPES},
    evaluator::{evaluate, EvalContext, Evaluated},
    paths::LazyPointer,
    result::EvaluationError,
    schema::ObjectSchema,
    scope::DynamicScope,
};

pub(crate) fn eval(
    ctx: &EvalContext<'_>,
    scope: &mut DynamicScope,
    object: &ObjectSchema,
    value: &str,
    instance_location: &LazyPointer<'_, '_>,
    evaluation_path: &LazyPointer<'_, '_>,
    out: &mut Evaluated,
) {
    if object.content_encoding.is_none() && object.content_media_type.is_none() {
        return;
    }
    let decoded = match &object.content_encoding {
        Some(encoding) => {
            out.result.annotations.push((
                "contentEncoding".to_string(),
                Value::String(encoding.clone()),
            ));
            let decoder = ctx.registry.decoders.get(encoding.as_str()).cloned();
            let outcome = match decoder {
                Some(decoder) => (*decoder)(value),
                None => match DEFAULT_DECODERS.get(encoding.as_str()) {
                    Some(decoder) => decoder(value),
                    None => {
                        out.result
                            .errors
                            .push(EvaluationError::unknown_content_encoding(encoding.clone()));
                        return;
                    }
                },
            };
            match outcome {
                Ok(decoded) => decoded,
                Err(message) => {
                    out.result
                        .errors
                        .push(EvaluationError::content_encoding_mismatch(
                            encoding.clone(),
                            message,
                        ));
                    return;
                }
            }
        }
        None => value.as_bytes().to_vec(),
    };
    let Some(media_type) = &object.content_media_type else {
        return;
    };
    out.result.annotations.push((
        "contentMediaType".to_string(),
        Value::String(media_type.clone()),
    ));
    let handler = ctx.registry.media_types.get(media_type.as_str()).cloned();
    let parsed = match handler {
        Some(handler) => (*handler)(&decoded),
        None => match DEFAULT_MEDIA_TYPES.get(media_type.as_str()) {
            Some(handler) => handler(&decoded),
            None => {
                out.result
                    .errors
                    .push(EvaluationError::unknown_content_media_type(
                        media_type.clone(),
                    ));
                return;
            }
        },
    };
    let parsed = match parsed {
        Ok(parsed) => parsed,
        Err(message) => {
            out.result
                .errors
                .push(EvaluationError::content_media_type_mismatch(
                    media_type.clone(),
                    message,
                ));
            return;
        }
    };
    if let Some(subschema) = object.content_schema {
        let keyword_path = evaluation_path.push_keyword("contentSchema");
        let child = evaluate(
            ctx,
            scope,
            subschema,
            &parsed,
            instance_location,
            &keyword_path,
        );
        if !child.is_valid() {
            out.result
                .errors
                .push(EvaluationError::content_schema_mismatch());
        }
        out.result.details.push(child.result);
    }
}
