//! Loading of external schema documents, keyed by URI scheme.
use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::error::LoaderError;

/// Default timeout applied to remote loads.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches the document behind a URI.
///
/// Loaders are registered per scheme on the [`crate::Compiler`]; the built-in
/// `http`/`https` and `file` loaders can be replaced the same way. All
/// operations are blocking.
pub trait Loader: Send + Sync {
    /// Load the raw bytes of the document at `uri`.
    fn load(&self, uri: &Url) -> Result<Vec<u8>, LoaderError>;
}

impl<F> Loader for F
where
    F: Fn(&Url) -> Result<Vec<u8>, LoaderError> + Send + Sync,
{
    fn load(&self, uri: &Url) -> Result<Vec<u8>, LoaderError> {
        self(uri)
    }
}

/// Parse loaded bytes as a JSON document.
pub(crate) fn parse_document(uri: &Url, bytes: &[u8]) -> Result<Value, LoaderError> {
    serde_json::from_slice(bytes).map_err(|error| LoaderError::InvalidDocument {
        uri: uri.to_string(),
        message: error.to_string(),
    })
}

#[cfg(feature = "resolve-http")]
pub(crate) struct HttpLoader {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "resolve-http")]
impl HttpLoader {
    pub(crate) fn new(timeout: Duration) -> HttpLoader {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        HttpLoader { client }
    }
}

#[cfg(feature = "resolve-http")]
impl Loader for HttpLoader {
    fn load(&self, uri: &Url) -> Result<Vec<u8>, LoaderError> {
        tracing::debug!(uri = %uri, "fetching remote schema");
        let response =
            self.client
                .get(uri.as_str())
                .send()
                .map_err(|error| LoaderError::Network {
                    uri: uri.to_string(),
                    message: error.to_string(),
                })?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(LoaderError::InvalidHttpStatus {
                uri: uri.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().map_err(|error| LoaderError::Network {
            uri: uri.to_string(),
            message: error.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

#[cfg(feature = "resolve-file")]
pub(crate) struct FileLoader;

#[cfg(feature = "resolve-file")]
impl Loader for FileLoader {
    fn load(&self, uri: &Url) -> Result<Vec<u8>, LoaderError> {
        let path = uri
            .to_file_path()
            .map_err(|()| LoaderError::UnsupportedScheme {
                scheme: uri.scheme().to_string(),
            })?;
        std::fs::read(path).map_err(|error| LoaderError::Io {
            uri: uri.to_string(),
            message: error.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_document, Loader};
    use crate::error::LoaderError;
    use serde_json::json;
    use url::Url;

    #[test]
    fn closures_are_loaders() {
        let loader = |uri: &Url| -> Result<Vec<u8>, LoaderError> {
            Ok(format!("{{\"$id\": \"{uri}\"}}").into_bytes())
        };
        let uri = Url::parse("https://example.com/s.json").unwrap();
        let bytes = loader.load(&uri).unwrap();
        assert_eq!(
            parse_document(&uri, &bytes).unwrap(),
            json!({"$id": "https://example.com/s.json"})
        );
    }

    #[cfg(feature = "resolve-file")]
    #[test]
    fn file_loader_reads_documents() {
        use super::FileLoader;
        let dir = std::env::temp_dir().join("conforma-loader-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("schema.json");
        std::fs::write(&path, br#"{"type": "string"}"#).unwrap();
        let uri = Url::from_file_path(&path).unwrap();
        let bytes = FileLoader.load(&uri).unwrap();
        assert_eq!(parse_document(&uri, &bytes).unwrap(), json!({"type": "string"}));
    }
}
