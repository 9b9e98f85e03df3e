//! Best-effort translation of ECMA-262 regular expressions into the syntax
//! accepted by `fancy-regex`.
//!
//! `fancy-regex` already covers the ECMA features Rust's `regex` lacks
//! (look-arounds, backreferences), so the remaining gap is a handful of
//! escape forms. Patterns are translated and compiled once, at schema-compile
//! time.
use std::borrow::Cow;

use fancy_regex::Regex;

/// Translate an ECMA-262 pattern into Rust regex syntax.
///
/// Covers `\cX` control escapes and the four-digit `\uXXXX` (plus surrogate
/// pairs) Unicode escapes; everything else passes through untouched.
pub(crate) fn to_rust_regex(pattern: &str) -> Cow<'_, str> {
    if !pattern.contains("\\c") && !pattern.contains("\\u") {
        return Cow::Borrowed(pattern);
    }
    let mut output = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            output.push(ch);
            continue;
        }
        match chars.peek() {
            Some('c') => {
                let mut lookahead = chars.clone();
                lookahead.next();
                match lookahead.peek() {
                    Some(letter) if letter.is_ascii_alphabetic() => {
                        let control = ((*letter as u8) % 32) as char;
                        output.push_str(&format!("\\x{{{:02X}}}", control as u32));
                        chars.next();
                        chars.next();
                    }
                    // A dangling `\c` matches a literal backslash-c in ECMA.
                    _ => {
                        output.push_str("\\\\c");
                        chars.next();
                    }
                }
            }
            Some('u') => {
                let mut lookahead = chars.clone();
                lookahead.next();
                if *lookahead.peek().unwrap_or(&'\0') == '{' {
                    // `\u{...}` is already valid Rust regex syntax.
                    output.push('\\');
                    continue;
                }
                match take_hex4(&mut lookahead) {
                    Some(code) => {
                        chars = lookahead;
                        let code = match code {
                            // Try to combine a surrogate pair.
                            0xD800..=0xDBFF => match take_surrogate_low(&mut chars) {
                                Some(low) => {
                                    0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00)
                                }
                                None => code,
                            },
                            _ => code,
                        };
                        output.push_str(&format!("\\x{{{code:X}}}"));
                    }
                    None => {
                        // Not a recognized escape; keep it for fancy-regex to
                        // reject with a proper error.
                        output.push('\\');
                    }
                }
            }
            _ => output.push('\\'),
        }
    }
    Cow::Owned(output)
}

fn take_hex4(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<u32> {
    let mut code = 0_u32;
    let mut lookahead = chars.clone();
    for _ in 0..4 {
        let digit = lookahead.next()?.to_digit(16)?;
        code = code * 16 + digit;
    }
    *chars = lookahead;
    Some(code)
}

fn take_surrogate_low(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<u32> {
    let mut lookahead = chars.clone();
    if lookahead.next()? != '\\' || lookahead.next()? != 'u' {
        return None;
    }
    let code = take_hex4(&mut lookahead)?;
    if (0xDC00..=0xDFFF).contains(&code) {
        *chars = lookahead;
        Some(code)
    } else {
        None
    }
}

/// Compile an ECMA-262 pattern, translating it first.
pub(crate) fn compile(pattern: &str) -> Result<Regex, fancy_regex::Error> {
    Regex::new(&to_rust_regex(pattern))
}

#[cfg(test)]
mod tests {
    use super::{compile, to_rust_regex};
    use test_case::test_case;

    #[test_case("^foo $", "^foo $"; "plain pattern untouched")]
    #[test_case(r"\cJ", r"\x{0A}"; "control escape")]
    #[test_case(r"a\cab", r"a\x{01}b"; "lowercase control letter")]
    #[test_case(r"\u0041", r"\x{41}"; "bmp unicode escape")]
    #[test_case(r"\u{1F600}", r"\u{1F600}"; "braced escape passes through")]
    fn translation(pattern: &str, expected: &str) {
        assert_eq!(to_rust_regex(pattern), expected);
    }

    #[test]
    fn surrogate_pair_combines() {
        assert_eq!(to_rust_regex(r"\uD83D\uDE00"), r"\x{1F600}");
    }

    #[test]
    fn translated_patterns_match() {
        let regex = compile(r"^foo").unwrap();
        assert!(regex.is_match("foo bar").unwrap());
        let regex = compile(r"a\cJb").unwrap();
        assert!(regex.is_match("a\nb").unwrap());
    }

    #[test]
    fn lookarounds_are_supported() {
        let regex = compile(r"^(?!forbidden)\w+").unwrap();
        assert!(regex.is_match("allowed").unwrap());
        assert!(!regex.is_match("forbidden").unwrap());
    }

    #[test]
    fn incomplete_escape_is_rejected() {
        assert!(compile(r"\u").is_err());
    }
}
