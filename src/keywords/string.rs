//! String assertions: length bounds count Unicode code points, `pattern`
//! matches unanchored.
use crate::{evaluator::Evaluated, result::EvaluationError, schema::ObjectSchema};

pub(crate) fn eval(object: &ObjectSchema, value: &str, out: &mut Evaluated) {
    if object.max_length.is_some() || object.min_length.is_some() {
        let length = bytecount::num_chars(value.as_bytes()) as u64;
        if let Some(max_length) = object.max_length {
            if length > max_length {
                out.result
                    .errors
                    .push(EvaluationError::string_too_long(length, max_length));
            }
        }
        if let Some(min_length) = object.min_length {
            if length < min_length {
                out.result
                    .errors
                    .push(EvaluationError::string_too_short(length, min_length));
            }
        }
    }
    if let Some(pattern) = &object.pattern {
        if !pattern.is_match(value) {
            out.result
                .errors
                .push(EvaluationError::pattern_mismatch(pattern.source.clone()));
        }
    }
}
