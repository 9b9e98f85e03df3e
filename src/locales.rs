//! Locale bundles: pure mappings from stable error codes to translated
//! message templates.
use ahash::AHashMap;

use crate::result::{interpolate, EvaluationError};

/// A set of translated message templates keyed by error code.
///
/// Templates use the same `{name}` placeholders as the built-in messages; a
/// code the bundle does not cover falls back to the built-in template.
///
/// ```rust
/// use conforma::LocaleBundle;
/// use serde_json::json;
///
/// let mut bundle = LocaleBundle::new();
/// bundle.insert("string_too_short", "值应至少为 {min_length} 个字符");
///
/// let schema = conforma::compile(&json!({"minLength": 3})).unwrap();
/// let result = schema.validate(&json!("ab"));
/// let list = result.to_list_localized(&bundle, false);
/// let errors = list.errors.unwrap();
/// assert_eq!(errors["minLength"], json!("值应至少为 3 个字符"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct LocaleBundle {
    templates: AHashMap<String, String>,
}

impl LocaleBundle {
    #[must_use]
    pub fn new() -> LocaleBundle {
        LocaleBundle::default()
    }

    /// Build a bundle from `(code, template)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> LocaleBundle
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        LocaleBundle {
            templates: pairs
                .into_iter()
                .map(|(code, template)| (code.into(), template.into()))
                .collect(),
        }
    }

    /// Register a template for an error code, replacing any previous one.
    pub fn insert(&mut self, code: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(code.into(), template.into());
    }

    #[must_use]
    pub fn template(&self, code: &str) -> Option<&str> {
        self.templates.get(code).map(String::as_str)
    }

    /// Render an error through this bundle, falling back to the built-in
    /// template.
    #[must_use]
    pub fn render(&self, error: &EvaluationError) -> String {
        match self.templates.get(error.code) {
            Some(template) => interpolate(template, &error.params),
            None => error.message(),
        }
    }
}
