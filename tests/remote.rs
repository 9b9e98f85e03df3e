//! Remote schema loading through the HTTP loader and custom loaders.
#![cfg(feature = "resolve-http")]
use serde_json::json;

use conforma::{Compiler, LoaderError};

#[test]
fn get_schema_fetches_remote_documents() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/item.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"type": "integer", "minimum": 0}"#)
        .create();

    let compiler = Compiler::new();
    let schema = compiler
        .get_schema(&format!("{}/item.json", server.url()))
        .unwrap();
    assert!(schema.is_valid(&json!(3)));
    assert!(!schema.is_valid(&json!(-3)));
    mock.assert();

    // The second lookup hits the cache, not the network.
    let again = compiler
        .get_schema(&format!("{}/item.json", server.url()))
        .unwrap();
    assert!(again.is_valid(&json!(3)));
}

#[test]
fn strict_resolution_fetches_references_eagerly() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/name.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"type": "string", "minLength": 2}"#)
        .create();

    let compiler = Compiler::options().strict_resolution(true).build();
    let schema = compiler
        .compile_value(
            &json!({
                "properties": {"name": {"$ref": format!("{}/name.json", server.url())}}
            }),
            None,
        )
        .unwrap();
    assert!(schema.is_valid(&json!({"name": "ok"})));
    assert!(!schema.is_valid(&json!({"name": "x"})));
}

#[test]
fn non_200_responses_are_loader_errors() {
    let mut server = mockito::Server::new();
    server.mock("GET", "/gone.json").with_status(404).create();

    let compiler = Compiler::options().strict_resolution(true).build();
    let error = compiler
        .get_schema(&format!("{}/gone.json", server.url()))
        .unwrap_err();
    assert!(matches!(
        error,
        conforma::CompileError::Loader(LoaderError::InvalidHttpStatus { status: 404, .. })
    ));
}

#[test]
fn custom_loaders_replace_builtins() {
    let compiler = Compiler::new();
    compiler.register_loader("vault", |uri: &url::Url| {
        if uri.path() == "/booleans.json" {
            Ok(br#"{"type": "boolean"}"#.to_vec())
        } else {
            Err(LoaderError::Network {
                uri: uri.to_string(),
                message: "unknown vault entry".to_string(),
            })
        }
    });
    let schema = compiler.get_schema("vault://schemas/booleans.json").unwrap();
    assert!(schema.is_valid(&json!(true)));
    assert!(!schema.is_valid(&json!("true")));

    let error = compiler.get_schema("vault://schemas/missing.json").unwrap_err();
    assert!(error.to_string().contains("unknown vault entry"));
}

#[test]
fn unsupported_schemes_are_reported() {
    let compiler = Compiler::new();
    let error = compiler.get_schema("gopher://example.com/s.json").unwrap_err();
    assert!(matches!(
        error,
        conforma::CompileError::Loader(LoaderError::UnsupportedScheme { .. })
    ));
}
