//! The `format` keyword: custom registry first, then the built-in table.
//!
//! Formats behave as annotations unless the compiler's `assert_format` flag
//! is set. Built-in checks apply to strings only; non-string instances pass.
use std::{
    net::{Ipv4Addr, Ipv6Addr},
    str::FromStr,
};

use ahash::AHashMap;
use email_address::EmailAddress;
use fancy_regex::Regex;
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::{
    ecma,
    evaluator::{EvalContext, Evaluated},
    result::EvaluationError,
    schema::{primitive_type_of, ObjectSchema},
    uri,
};

/// Signature of a registered custom format validator.
pub(crate) type FormatCheck = dyn Fn(&Value) -> bool + Send + Sync;

pub(crate) fn eval(
    ctx: &EvalContext<'_>,
    object: &ObjectSchema,
    instance: &Value,
    out: &mut Evaluated,
) {
    let Some(format) = &object.format else {
        return;
    };
    out.result
        .annotations
        .push(("format".to_string(), Value::String(format.clone())));
    let assert = ctx.registry.options.assert_format;
    if let Some(entry) = ctx.registry.formats.get(format.as_str()) {
        if let Some(applies_to) = entry.applies_to {
            if primitive_type_of(instance) != applies_to {
                return;
            }
        }
        let passed = (*entry.check)(instance);
        if !passed && assert {
            out.result
                .errors
                .push(EvaluationError::format_mismatch(format.clone()));
        }
        return;
    }
    if let Some(check) = BUILTIN_FORMATS.get(format.as_str()) {
        if let Value::String(value) = instance {
            if !check(value) && assert {
                out.result
                    .errors
                    .push(EvaluationError::format_mismatch(format.clone()));
            }
        }
        return;
    }
    if assert {
        out.result
            .errors
            .push(EvaluationError::unknown_format(format.clone()));
    }
}

type BuiltinCheck = fn(&str) -> bool;

/// The process-wide table of built-in formats; initialized on first use,
/// read-only afterwards. Per-compiler overrides live in the format registry.
static BUILTIN_FORMATS: Lazy<AHashMap<&'static str, BuiltinCheck>> = Lazy::new(|| {
    let mut map: AHashMap<&'static str, BuiltinCheck> = AHashMap::with_capacity(16);
    map.insert("date-time", is_valid_date_time);
    map.insert("date", is_valid_date);
    map.insert("time", is_valid_time);
    map.insert("duration", is_valid_duration);
    map.insert("hostname", is_valid_hostname);
    map.insert("email", is_valid_email);
    map.insert("ipv4", |value| Ipv4Addr::from_str(value).is_ok());
    map.insert("ipv6", |value| Ipv6Addr::from_str(value).is_ok());
    map.insert("uri", |value| url::Url::parse(value).is_ok());
    map.insert("uri-reference", is_valid_uri_reference);
    map.insert("uri-template", |value| {
        URI_TEMPLATE_RE.is_match(value).unwrap_or(false)
    });
    map.insert("json-pointer", |value| {
        JSON_POINTER_RE.is_match(value).unwrap_or(false)
    });
    map.insert("relative-json-pointer", |value| {
        RELATIVE_JSON_POINTER_RE.is_match(value).unwrap_or(false)
    });
    map.insert("uuid", is_valid_uuid);
    map.insert("regex", |value| ecma::compile(value).is_ok());
    map
});

static JSON_POINTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(/(([^/~])|(~[01]))*)*\z").expect("is a valid regex"));
static RELATIVE_JSON_POINTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:0|[1-9][0-9]*)(?:#|(?:/(?:[^~/]|~0|~1)*)*)\z").expect("is a valid regex")
});
static URI_TEMPLATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(?:(?:[^\x00-\x20"'<>%\\^`{|}]|%[0-9a-f]{2})|\{[+#./;?&=,!@|]?(?:[a-z0-9_]|%[0-9a-f]{2})+(?::[1-9][0-9]{0,3}|\*)?(?:,(?:[a-z0-9_]|%[0-9a-f]{2})+(?::[1-9][0-9]{0,3}|\*)?)*})*\z"#,
    )
    .expect("is a valid regex")
});

fn is_valid_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return false;
    }
    if !bytes
        .iter()
        .enumerate()
        .all(|(at, byte)| matches!(at, 4 | 7) || byte.is_ascii_digit())
    {
        return false;
    }
    let year = (u16::from(bytes[0] - b'0')) * 1000
        + (u16::from(bytes[1] - b'0')) * 100
        + (u16::from(bytes[2] - b'0')) * 10
        + u16::from(bytes[3] - b'0');
    let month = (bytes[5] - b'0') * 10 + (bytes[6] - b'0');
    let day = (bytes[8] - b'0') * 10 + (bytes[9] - b'0');
    if !(1..=12).contains(&month) {
        return false;
    }
    let max_day = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 {
                29
            } else {
                28
            }
        }
    };
    (1..=max_day).contains(&day)
}

fn is_valid_date_time(value: &str) -> bool {
    time::OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339).is_ok()
}

fn is_valid_time(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() < 9 {
        // "HH:MM:SSZ" is the shortest valid time.
        return false;
    }
    let digits = |range: std::ops::Range<usize>| {
        bytes[range.clone()].iter().all(u8::is_ascii_digit).then(|| {
            bytes[range]
                .iter()
                .fold(0_u32, |acc, byte| acc * 10 + u32::from(byte - b'0'))
        })
    };
    if bytes[2] != b':' || bytes[5] != b':' {
        return false;
    }
    let (Some(hours), Some(minutes), Some(seconds)) = (digits(0..2), digits(3..5), digits(6..8))
    else {
        return false;
    };
    if hours > 23 || minutes > 59 || seconds > 60 {
        return false;
    }
    let mut at = 8;
    if at < bytes.len() && bytes[at] == b'.' {
        at += 1;
        let start = at;
        while at < bytes.len() && bytes[at].is_ascii_digit() {
            at += 1;
        }
        if at == start {
            return false;
        }
    }
    // Leap seconds are only valid at 23:59:60 UTC.
    match bytes.get(at).copied() {
        Some(b'Z' | b'z') => {
            at == bytes.len() - 1 && (seconds != 60 || (hours == 23 && minutes == 59))
        }
        Some(sign @ (b'+' | b'-')) => {
            if bytes.len() - at != 6 || bytes[at + 3] != b':' {
                return false;
            }
            let (Some(offset_hours), Some(offset_minutes)) =
                (digits(at + 1..at + 3), digits(at + 4..at + 6))
            else {
                return false;
            };
            if offset_hours > 23 || offset_minutes > 59 {
                return false;
            }
            if seconds == 60 {
                let offset = i64::from(offset_hours) * 60 + i64::from(offset_minutes);
                let offset = if sign == b'+' { -offset } else { offset };
                let utc = (i64::from(hours) * 60 + i64::from(minutes) + offset).rem_euclid(24 * 60);
                utc == 23 * 60 + 59
            } else {
                true
            }
        }
        _ => false,
    }
}

/// ISO 8601 duration: `P` followed by date components, an optional `T` time
/// part, or a lone week component.
fn is_valid_duration(value: &str) -> bool {
    let Some(rest) = value.strip_prefix('P') else {
        return false;
    };
    if rest.is_empty() {
        return false;
    }
    let take_units = |input: &str, units: &[char]| -> Option<usize> {
        let mut consumed = 0;
        let mut next_unit = 0;
        let bytes = input.as_bytes();
        while next_unit < units.len() {
            let start = consumed;
            while consumed < bytes.len() && bytes[consumed].is_ascii_digit() {
                consumed += 1;
            }
            if consumed == start {
                break;
            }
            let unit = *bytes.get(consumed)? as char;
            let position = units[next_unit..].iter().position(|u| *u == unit)?;
            next_unit += position + 1;
            consumed += 1;
        }
        Some(consumed)
    };
    // Weeks cannot combine with any other component.
    if let Some(consumed) = take_units(rest, &['W']) {
        if consumed > 0 {
            return consumed == rest.len();
        }
    }
    let Some(date_len) = take_units(rest, &['Y', 'M', 'D']) else {
        return false;
    };
    let rest_after_date = &rest[date_len..];
    if rest_after_date.is_empty() {
        return date_len > 0;
    }
    let Some(time_part) = rest_after_date.strip_prefix('T') else {
        return false;
    };
    match take_units(time_part, &['H', 'M', 'S']) {
        Some(consumed) => consumed > 0 && consumed == time_part.len(),
        None => false,
    }
}

fn is_valid_hostname(value: &str) -> bool {
    !(value.is_empty()
        || value.starts_with('-')
        || value.ends_with('-')
        || bytecount::num_chars(value.as_bytes()) > 255
        || value
            .chars()
            .any(|ch| !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '.'))
        || value
            .split('.')
            .any(|label| label.len() > 63 || label.is_empty() && !value.ends_with('.')))
}

fn is_valid_email(value: &str) -> bool {
    let Ok(parsed) = EmailAddress::from_str(value) else {
        return false;
    };
    let domain = parsed.domain();
    if let Some(literal) = domain.strip_prefix('[').and_then(|d| d.strip_suffix(']')) {
        if let Some(v6) = literal.strip_prefix("IPv6:") {
            v6.parse::<Ipv6Addr>().is_ok()
        } else {
            literal.parse::<Ipv4Addr>().is_ok()
        }
    } else {
        is_valid_hostname(domain)
    }
}

fn is_valid_uri_reference(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(_) => true,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            uri::DEFAULT_BASE_URI.join(value).is_ok()
        }
        Err(_) => false,
    }
}

fn is_valid_uuid(value: &str) -> bool {
    value.len() == 36 && uuid::Uuid::try_parse(value).is_ok()
}
