//! A JSON Schema draft 2020-12 validator producing structured evaluation
//! results.
//!
//! - 🧩 Full draft 2020-12 keyword set, including `$dynamicRef` and the
//!   `unevaluated*` keywords
//! - 🔗 Cross-document references with deferred resolution and per-scheme
//!   loaders
//! - 🗂 Per-keyword errors with stable codes, evaluation paths and
//!   annotations
//! - 🌐 Localizable messages through [`LocaleBundle`]
//!
//! # Validation
//!
//! For one-off checks use [`is_valid`]:
//!
//! ```rust
//! use serde_json::json;
//!
//! let schema = json!({"type": "integer", "minimum": 0});
//! assert!(conforma::is_valid(&schema, &json!(5)));
//! assert!(!conforma::is_valid(&schema, &json!(-1)));
//! ```
//!
//! For repeated validation compile once and reuse the schema:
//!
//! ```rust
//! use serde_json::json;
//!
//! let schema = conforma::compile(&json!({
//!     "type": "object",
//!     "properties": {"name": {"type": "string"}},
//!     "required": ["name"]
//! }))
//! .expect("valid schema");
//!
//! let result = schema.validate(&json!({"name": 42}));
//! assert!(!result.is_valid());
//! for entry in result.iter().filter(|entry| !entry.errors().is_empty()) {
//!     for error in entry.errors() {
//!         println!("{} at {}: {}", error.code, entry.instance_location(), error);
//!     }
//! }
//! ```
//!
//! # The compiler
//!
//! A [`Compiler`] caches every document it compiles by URI, resolves
//! references across documents (in any registration order) and hosts the
//! registries for loaders, content-encoding decoders, media-type handlers,
//! custom formats and default-value functions:
//!
//! ```rust
//! use serde_json::json;
//!
//! let compiler = conforma::Compiler::new();
//! compiler
//!     .compile_value(
//!         &json!({"$id": "https://example.com/length.json", "minLength": 3}),
//!         None,
//!     )
//!     .unwrap();
//! let schema = compiler
//!     .compile_value(&json!({"$ref": "https://example.com/length.json"}), None)
//!     .unwrap();
//! assert!(schema.is_valid(&json!("abc")));
//! ```
//!
//! # Output formats
//!
//! [`EvaluationResult`] serializes to the flag and list output formats:
//!
//! ```rust
//! use serde_json::json;
//!
//! let schema = conforma::compile(&json!({"type": "string"})).unwrap();
//! let output = schema.validate(&json!(42)).to_list(true);
//! let rendered = serde_json::to_value(&output).unwrap();
//! assert_eq!(rendered["valid"], json!(false));
//! assert_eq!(rendered["errors"]["type"], json!("value is number, expected 'string'"));
//! ```
mod compiler;
mod content;
mod ecma;
pub mod error;
mod evaluator;
mod keywords;
mod loader;
mod locales;
pub mod paths;
mod rational;
mod resolver;
mod result;
mod schema;
mod scope;
mod uri;

pub use compiler::{Compiler, CompilerBuilder, Schema};
pub use error::{CompileError, LoaderError};
pub use loader::Loader;
pub use locales::LocaleBundle;
pub use result::{EvaluationError, EvaluationResult, Flag, OutputUnit};

use serde_json::Value;

/// Validate `instance` against `schema` in one shot.
///
/// # Panics
///
/// Panics when the schema itself does not compile; use [`compile`] to handle
/// schema errors.
#[must_use]
pub fn is_valid(schema: &Value, instance: &Value) -> bool {
    let compiled = compile(schema).expect("Invalid schema");
    compiled.is_valid(instance)
}

/// Compile a schema with a fresh default [`Compiler`].
pub fn compile(schema: &Value) -> Result<Schema, CompileError> {
    Compiler::new().compile_value(schema, None)
}

#[cfg(test)]
pub(crate) mod tests_util {
    use crate::Schema;
    use serde_json::Value;

    pub(crate) fn is_valid(schema: &Value, instance: &Value) {
        let compiled = crate::compile(schema).expect("schema should compile");
        is_valid_with(&compiled, instance);
    }

    pub(crate) fn is_valid_with(compiled: &Schema, instance: &Value) {
        let result = compiled.validate(instance);
        assert!(
            result.is_valid(),
            "{instance} should be valid, errors: {:?}",
            result
                .iter()
                .flat_map(|entry| entry.errors())
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        );
        assert!(result.to_flag().valid);
        assert!(compiled.is_valid(instance));
    }

    pub(crate) fn is_not_valid(schema: &Value, instance: &Value) {
        let compiled = crate::compile(schema).expect("schema should compile");
        is_not_valid_with(&compiled, instance);
    }

    pub(crate) fn is_not_valid_with(compiled: &Schema, instance: &Value) {
        let result = compiled.validate(instance);
        assert!(!result.is_valid(), "{instance} should not be valid");
        assert!(!result.to_flag().valid);
        assert!(!compiled.is_valid(instance));
    }

    /// The first error found in a depth-first walk of the result tree.
    pub(crate) fn first_error(
        schema: &Value,
        instance: &Value,
    ) -> (crate::EvaluationError, String, String) {
        let compiled = crate::compile(schema).expect("schema should compile");
        let result = compiled.validate(instance);
        assert!(!result.is_valid(), "{instance} should not be valid");
        for entry in result.iter() {
            if let Some(error) = entry.errors().first() {
                return (
                    error.clone(),
                    entry.evaluation_path().to_string(),
                    entry.instance_location().to_string(),
                );
            }
        }
        panic!("an invalid result must carry an error");
    }
}

#[cfg(test)]
mod tests {
    use super::{is_valid, Compiler};
    use serde_json::json;

    #[test]
    fn one_shot_validation() {
        let schema = json!({"minLength": 5});
        assert!(is_valid(&schema, &json!("foobar")));
        assert!(!is_valid(&schema, &json!("foo")));
    }

    #[test]
    fn invalid_pattern_fails_compilation() {
        assert!(super::compile(&json!({"pattern": "\\u"})).is_err());
    }

    #[test]
    fn compilers_are_shareable_across_threads() {
        let compiler = Compiler::new();
        let schema = compiler
            .compile_value(&json!({"type": "integer"}), None)
            .unwrap();
        let handles: Vec<_> = (0..4)
            .map(|index| {
                let schema = schema.clone();
                std::thread::spawn(move || schema.is_valid(&json!(index)))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
