//! Content-encoding decoders and media-type handlers consulted by the
//! `contentEncoding` / `contentMediaType` keywords.
use ahash::AHashMap;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use serde_json::Value;

/// Decodes a `contentEncoding`-encoded string into bytes.
pub type DecoderFn = fn(&str) -> Result<Vec<u8>, String>;

/// Parses decoded bytes according to a media type.
pub type MediaTypeFn = fn(&[u8]) -> Result<Value, String>;

fn decode_base64(content: &str) -> Result<Vec<u8>, String> {
    STANDARD.decode(content).map_err(|error| error.to_string())
}

fn parse_json(content: &[u8]) -> Result<Value, String> {
    serde_json::from_slice(content).map_err(|error| error.to_string())
}

fn parse_yaml(content: &[u8]) -> Result<Value, String> {
    serde_yaml::from_slice(content).map_err(|error| error.to_string())
}

pub(crate) static DEFAULT_DECODERS: Lazy<AHashMap<&'static str, DecoderFn>> = Lazy::new(|| {
    let mut map: AHashMap<&'static str, DecoderFn> = AHashMap::with_capacity(1);
    map.insert("base64", decode_base64);
    map
});

pub(crate) static DEFAULT_MEDIA_TYPES: Lazy<AHashMap<&'static str, MediaTypeFn>> =
    Lazy::new(|| {
        let mut map: AHashMap<&'static str, MediaTypeFn> = AHashMap::with_capacity(2);
        map.insert("application/json", parse_json);
        map.insert("application/yaml", parse_yaml);
        map
    });

#[cfg(test)]
mod tests {
    use super::{DEFAULT_DECODERS, DEFAULT_MEDIA_TYPES};
    use serde_json::json;

    #[test]
    fn base64_roundtrip() {
        let decode = DEFAULT_DECODERS["base64"];
        assert_eq!(decode("aGVsbG8=").unwrap(), b"hello");
        assert!(decode("not base64!").is_err());
    }

    #[test]
    fn json_media_type() {
        let parse = DEFAULT_MEDIA_TYPES["application/json"];
        assert_eq!(parse(br#"{"a": 1}"#).unwrap(), json!({"a": 1}));
        assert!(parse(b"{").is_err());
    }

    #[test]
    fn yaml_media_type() {
        let parse = DEFAULT_MEDIA_TYPES["application/yaml"];
        assert_eq!(parse(b"a: 1\nb: [x, y]\n").unwrap(), json!({"a": 1, "b": ["x", "y"]}));
    }
}
