//! Arbitrary-precision rational numbers for `multipleOf` and numeric
//! comparison keywords.
use std::fmt;

use fraction::{BigFraction, BigUint, GenericFraction, Sign};
use num_cmp::NumCmp;
use serde_json::Number;

/// A rational wrapper around a JSON number.
///
/// Values are parsed from the number's decimal form, so `0.0075` becomes the
/// exact fraction `75/10000` rather than the nearest binary double. That makes
/// `multipleOf` checks exact: `0.0075` is a multiple of `0.0001` even though
/// neither has a finite binary representation.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Rational {
    value: BigFraction,
    source: String,
}

impl Rational {
    pub(crate) fn from_number(number: &Number) -> Rational {
        let source = number.to_string();
        let value = parse_decimal(&source)
            .unwrap_or_else(|| BigFraction::from(number.as_f64().unwrap_or(f64::NAN)));
        Rational { value, source }
    }

    /// Whether `self / divisor` has a denominator of one.
    pub(crate) fn is_multiple_of(&self, divisor: &Rational) -> bool {
        let quotient = self.value.clone() / divisor.value.clone();
        match quotient {
            GenericFraction::Rational(_, ratio) => ratio.denom() == &BigUint::from(1_u8),
            // NaN and infinities are not a multiple of anything.
            _ => false,
        }
    }

    pub(crate) fn is_positive(&self) -> bool {
        match &self.value {
            GenericFraction::Rational(sign, ratio) => {
                *sign == Sign::Plus && ratio.numer() != &BigUint::from(0_u8)
            }
            _ => false,
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `serde_json` already renders the shortest decimal form.
        f.write_str(&self.source)
    }
}

/// Parse a JSON number literal into an exact fraction.
///
/// Accepts the grammar serde_json emits: optional sign, digits, optional
/// fractional digits, optional exponent.
fn parse_decimal(source: &str) -> Option<BigFraction> {
    let (sign, rest) = match source.strip_prefix('-') {
        Some(rest) => (Sign::Minus, rest),
        None => (Sign::Plus, source),
    };
    let (mantissa, exponent) = match rest.find(['e', 'E']) {
        Some(at) => (&rest[..at], rest[at + 1..].parse::<i64>().ok()?),
        None => (rest, 0_i64),
    };
    let (int_part, frac_part) = match mantissa.find('.') {
        Some(at) => (&mantissa[..at], &mantissa[at + 1..]),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let mut digits = String::with_capacity(int_part.len() + frac_part.len());
    digits.push_str(int_part);
    digits.push_str(frac_part);
    let numer = digits.parse::<BigUint>().ok()?;
    let scale = exponent - frac_part.len() as i64;
    let ten = BigUint::from(10_u8);
    let (numer, denom) = if scale >= 0 {
        (numer * ten.pow(u32::try_from(scale).ok()?), BigUint::from(1_u8))
    } else {
        (numer, ten.pow(u32::try_from(-scale).ok()?))
    };
    let value = GenericFraction::new(numer, denom);
    Some(match sign {
        Sign::Plus => value,
        Sign::Minus => -value,
    })
}

macro_rules! num_cmp {
    ($left:expr, $op:ident, $right:expr) => {
        if let Some(b) = $right.as_u64() {
            NumCmp::$op($left, b)
        } else if let Some(b) = $right.as_i64() {
            NumCmp::$op($left, b)
        } else {
            NumCmp::$op($left, $right.as_f64().expect("JSON numbers fit in f64"))
        }
    };
}

macro_rules! number_cmp_fn {
    ($name:ident, $op:ident) => {
        #[inline]
        pub(crate) fn $name(left: &Number, right: &Number) -> bool {
            if let Some(a) = left.as_u64() {
                num_cmp!(a, $op, right)
            } else if let Some(a) = left.as_i64() {
                num_cmp!(a, $op, right)
            } else {
                let a = left.as_f64().expect("JSON numbers fit in f64");
                num_cmp!(a, $op, right)
            }
        }
    };
}

number_cmp_fn!(number_eq, num_eq);
number_cmp_fn!(number_lt, num_lt);
number_cmp_fn!(number_le, num_le);
number_cmp_fn!(number_gt, num_gt);
number_cmp_fn!(number_ge, num_ge);

#[cfg(test)]
mod tests {
    use super::{number_eq, number_le, number_lt, Rational};
    use serde_json::{json, Number, Value};
    use test_case::test_case;

    fn number(value: &Value) -> Number {
        value.as_number().expect("a number").clone()
    }

    #[test_case(&json!(4), &json!(2), true)]
    #[test_case(&json!(4.0), &json!(1.0), true)]
    #[test_case(&json!(3.0), &json!(1.5), true)]
    #[test_case(&json!(4.5), &json!(1.5), true)]
    #[test_case(&json!(4.5), &json!(1.0), false)]
    #[test_case(&json!(5), &json!(2), false)]
    #[test_case(&json!(0.0075), &json!(0.0001), true)]
    #[test_case(&json!(1e308), &json!(1e308), true)]
    fn multiple_of(instance: &Value, divisor: &Value, expected: bool) {
        let instance = Rational::from_number(&number(instance));
        let divisor = Rational::from_number(&number(divisor));
        assert_eq!(instance.is_multiple_of(&divisor), expected);
    }

    #[test]
    fn positivity() {
        assert!(Rational::from_number(&number(&json!(1.5))).is_positive());
        assert!(!Rational::from_number(&number(&json!(0))).is_positive());
        assert!(!Rational::from_number(&number(&json!(-2))).is_positive());
    }

    #[test_case(&json!(1), &json!(1.0), true)]
    #[test_case(&json!(-3), &json!(-3.0), true)]
    #[test_case(&json!(1), &json!(2.0), false)]
    fn cross_type_equality(left: &Value, right: &Value, expected: bool) {
        assert_eq!(number_eq(&number(left), &number(right)), expected);
    }

    #[test]
    fn cross_type_ordering() {
        assert!(number_lt(&number(&json!(1)), &number(&json!(1.5))));
        assert!(number_le(&number(&json!(2.0)), &number(&json!(2))));
        assert!(!number_lt(&number(&json!(2.0)), &number(&json!(2))));
    }

    #[test]
    fn display_keeps_shortest_decimal_form() {
        assert_eq!(Rational::from_number(&number(&json!(5))).to_string(), "5");
        assert_eq!(
            Rational::from_number(&number(&json!(0.0075))).to_string(),
            "0.0075"
        );
    }
}
