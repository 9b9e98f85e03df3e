//! Numeric assertions: `multipleOf` and the four bounds.
use serde_json::Number;

use crate::{
    evaluator::Evaluated,
    rational::{number_ge, number_gt, number_le, number_lt, Rational},
    result::EvaluationError,
    schema::ObjectSchema,
};

pub(crate) fn eval(object: &ObjectSchema, number: &Number, out: &mut Evaluated) {
    if let Some(multiple_of) = &object.multiple_of {
        let divisor = Rational::from_number(multiple_of);
        if !divisor.is_positive() {
            // A schema error, surfaced at evaluation time.
            out.result
                .errors
                .push(EvaluationError::invalid_multiple_of(multiple_of.clone()));
        } else if !Rational::from_number(number).is_multiple_of(&divisor) {
            out.result.errors.push(EvaluationError::not_multiple_of(
                number.clone(),
                multiple_of.clone(),
            ));
        }
    }
    if let Some(maximum) = &object.maximum {
        if !number_le(number, maximum) {
            out.result.errors.push(EvaluationError::value_above_maximum(
                number.clone(),
                maximum.clone(),
            ));
        }
    }
    if let Some(exclusive_maximum) = &object.exclusive_maximum {
        if !number_lt(number, exclusive_maximum) {
            out.result
                .errors
                .push(EvaluationError::value_above_exclusive_maximum(
                    number.clone(),
                    exclusive_maximum.clone(),
                ));
        }
    }
    if let Some(minimum) = &object.minimum {
        if !number_ge(number, minimum) {
            out.result.errors.push(EvaluationError::value_below_minimum(
                number.clone(),
                minimum.clone(),
            ));
        }
    }
    if let Some(exclusive_minimum) = &object.exclusive_minimum {
        if !number_gt(number, exclusive_minimum) {
            out.result
                .errors
                .push(EvaluationError::value_below_exclusive_minimum(
                    number.clone(),
                    exclusive_minimum.clone(),
                ));
        }
    }
}
