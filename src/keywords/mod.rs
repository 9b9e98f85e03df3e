//! Per-keyword evaluation, grouped by the instance type they apply to.
pub(crate) mod applicator;
pub(crate) mod array;
pub(crate) mod content;
pub(crate) mod format;
pub(crate) mod numeric;
pub(crate) mod object;
pub(crate) mod reference;
pub(crate) mod string;
pub(crate) mod unevaluated;

use num_cmp::NumCmp;
use serde_json::{Map, Value};

use crate::{
    evaluator::Evaluated,
    result::EvaluationError,
    schema::{primitive_type_of, ObjectSchema, PrimitiveType},
};

macro_rules! num_cmp {
    ($left:expr, $right:expr) => {
        if let Some(b) = $right.as_u64() {
            NumCmp::num_eq($left, b)
        } else if let Some(b) = $right.as_i64() {
            NumCmp::num_eq($left, b)
        } else {
            NumCmp::num_eq($left, $right.as_f64().expect("JSON numbers fit in f64"))
        }
    };
}

/// Deep equality with numeric folding: integer `1` equals float `1.0`.
#[inline]
pub(crate) fn equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::String(left), Value::String(right)) => left == right,
        (Value::Bool(left), Value::Bool(right)) => left == right,
        (Value::Null, Value::Null) => true,
        (Value::Number(left), Value::Number(right)) => {
            if let Some(a) = left.as_u64() {
                num_cmp!(a, right)
            } else if let Some(a) = left.as_i64() {
                num_cmp!(a, right)
            } else {
                let a = left.as_f64().expect("JSON numbers fit in f64");
                num_cmp!(a, right)
            }
        }
        (Value::Array(left), Value::Array(right)) => equal_arrays(left, right),
        (Value::Object(left), Value::Object(right)) => equal_objects(left, right),
        (_, _) => false,
    }
}

#[inline]
pub(crate) fn equal_arrays(left: &[Value], right: &[Value]) -> bool {
    left.len() == right.len() && left.iter().zip(right).all(|(a, b)| equal(a, b))
}

#[inline]
pub(crate) fn equal_objects(left: &Map<String, Value>, right: &Map<String, Value>) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .all(|((ka, va), (kb, vb))| ka == kb && equal(va, vb))
}

fn is_integer_valued(number: &serde_json::Number) -> bool {
    number.is_u64()
        || number.is_i64()
        || number
            .as_f64()
            .is_some_and(|value| value.fract() == 0.0 && value.is_finite())
}

/// The `type`, `enum` and `const` assertions.
pub(crate) fn eval_general(object: &ObjectSchema, instance: &Value, out: &mut Evaluated) {
    if let Some(types) = object.types {
        let actual = primitive_type_of(instance);
        let matches = match instance {
            Value::Number(number) => {
                types.contains(PrimitiveType::Number)
                    || (types.contains(PrimitiveType::Integer) && is_integer_valued(number))
            }
            _ => types.contains(actual),
        };
        if !matches {
            out.result
                .errors
                .push(EvaluationError::type_mismatch(types.names(), actual.name()));
        }
    }
    if let Some(options) = &object.enum_ {
        if !options.iter().any(|option| equal(instance, option)) {
            out.result
                .errors
                .push(EvaluationError::value_not_in_enum(options.clone()));
        }
    }
    if let Some(expected) = &object.const_ {
        if !equal(instance, expected) {
            out.result
                .errors
                .push(EvaluationError::const_mismatch(expected.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::equal;
    use serde_json::{json, Value};
    use test_case::test_case;

    #[test_case(&json!(1), &json!(1.0))]
    #[test_case(&json!([2]), &json!([2.0]))]
    #[test_case(&json!([-3]), &json!([-3.0]))]
    #[test_case(&json!({"a": 1}), &json!({"a": 1.0}))]
    fn are_equal(left: &Value, right: &Value) {
        assert!(equal(left, right));
    }

    #[test_case(&json!(1), &json!(2.0))]
    #[test_case(&json!([]), &json!(["foo"]))]
    #[test_case(&json!([-3]), &json!([-4.0]))]
    #[test_case(&json!({"a": 1}), &json!({"a": 1.0, "b": 2}))]
    #[test_case(&json!(0), &json!(false))]
    #[test_case(&json!(""), &json!(null))]
    fn are_not_equal(left: &Value, right: &Value) {
        assert!(!equal(left, right));
    }
}
