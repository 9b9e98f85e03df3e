//! URI handling: base-URI derivation, `base#fragment` splitting and JSON
//! Pointer fragment decoding.
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::CompileError;

/// Base URI assigned to documents compiled without an explicit identifier.
pub(crate) static DEFAULT_BASE_URI: Lazy<Url> =
    Lazy::new(|| Url::parse("json-schema:///").expect("is a valid URI"));

pub(crate) fn is_default_base(uri: &Url) -> bool {
    uri == &*DEFAULT_BASE_URI
}

/// Split a reference into its base URI part and an optional fragment.
///
/// The base part may be empty for fragment-only references such as
/// `#/$defs/pos` or `#anchor`.
pub(crate) fn split_fragment(reference: &str) -> (&str, Option<&str>) {
    match reference.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (reference, None),
    }
}

/// Resolve a reference against a base URI, dropping any fragment from the
/// result. Returns the absolute target URI.
pub(crate) fn resolve_against(base: &Url, reference: &str) -> Result<Url, CompileError> {
    let mut resolved = base
        .join(reference)
        .map_err(|error| CompileError::invalid_uri(reference, error))?;
    resolved.set_fragment(None);
    Ok(resolved)
}

/// Decode one JSON Pointer token: percent-decoding first, then the `~1` and
/// `~0` escapes, in that order so that `~01` round-trips to `~1`.
pub(crate) fn decode_pointer_token(token: &str) -> String {
    let token = percent_decode_str(token)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| token.to_string());
    token.replace("~1", "/").replace("~0", "~")
}

/// Split a fragment of the form `/a/b/c` into decoded pointer tokens.
pub(crate) fn pointer_tokens(fragment: &str) -> Vec<String> {
    fragment
        .split('/')
        .skip(1)
        .map(decode_pointer_token)
        .collect()
}
