//! Compile-time and loading error types.
//!
//! Instance non-conformance is never an error: it is reported through
//! [`crate::EvaluationResult`]. The types here cover everything that can go
//! wrong before evaluation starts — malformed schema documents, invalid
//! regular expressions, unresolvable references and remote loading failures.
use std::sync::Arc;

/// An error raised while compiling a schema document.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum CompileError {
    /// The schema document is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(Arc<serde_json::Error>),
    /// A `pattern` or `patternProperties` key is not a valid regular
    /// expression.
    #[error("invalid regular expression {pattern:?} at {location}")]
    InvalidRegex { location: String, pattern: String },
    /// A keyword value has an unusable shape, e.g. an unrecognized `type`
    /// name or a non-string `required` entry.
    #[error("invalid schema at {location}: {message}")]
    InvalidSchema { location: String, message: String },
    /// A reference could not be resolved under strict resolution.
    #[error("unresolvable reference {reference:?}")]
    UnresolvableRef { reference: String },
    /// A URI or URI reference failed to parse.
    #[error("invalid URI {uri:?}: {source}")]
    InvalidUri {
        uri: String,
        source: url::ParseError,
    },
    /// A remote document could not be loaded.
    #[error(transparent)]
    Loader(#[from] LoaderError),
}

impl CompileError {
    pub(crate) fn invalid_json(error: serde_json::Error) -> CompileError {
        CompileError::InvalidJson(Arc::new(error))
    }

    pub(crate) fn invalid_regex(
        location: impl Into<String>,
        pattern: impl Into<String>,
    ) -> CompileError {
        CompileError::InvalidRegex {
            location: location.into(),
            pattern: pattern.into(),
        }
    }

    pub(crate) fn invalid_schema(
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> CompileError {
        CompileError::InvalidSchema {
            location: location.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_uri(uri: impl Into<String>, source: url::ParseError) -> CompileError {
        CompileError::InvalidUri {
            uri: uri.into(),
            source,
        }
    }
}

/// An error raised by a [`crate::Loader`] while fetching a remote schema.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum LoaderError {
    /// No loader is registered for the URI scheme.
    #[error("no loader registered for scheme {scheme:?}")]
    UnsupportedScheme { scheme: String },
    /// The HTTP loader received a non-200 response.
    #[error("unexpected HTTP status {status} for {uri}")]
    InvalidHttpStatus { uri: String, status: u16 },
    /// Transport-level failure, including timeouts.
    #[error("failed to load {uri}: {message}")]
    Network { uri: String, message: String },
    /// Filesystem failure from the file loader.
    #[error("failed to read {uri}: {message}")]
    Io { uri: String, message: String },
    /// The loaded document is not valid JSON.
    #[error("document at {uri} is not valid JSON: {message}")]
    InvalidDocument { uri: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::{CompileError, LoaderError};

    #[test]
    fn display_messages() {
        let error = CompileError::invalid_regex("/properties/a/pattern", "[");
        assert_eq!(
            error.to_string(),
            "invalid regular expression \"[\" at /properties/a/pattern"
        );
        let error = LoaderError::InvalidHttpStatus {
            uri: "https://example.com/s.json".into(),
            status: 404,
        };
        assert_eq!(
            error.to_string(),
            "unexpected HTTP status 404 for https://example.com/s.json"
        );
    }
}
