//! End-to-end scenarios covering error codes, locations and localization.
use pretty_assertions::assert_eq;
use serde_json::json;

use conforma::{Compiler, EvaluationResult, LocaleBundle};

/// The first failing result entry, depth first.
fn first_failing(result: &EvaluationResult) -> (&conforma::EvaluationError, String, String, String) {
    result
        .iter()
        .find_map(|entry| {
            entry.errors().first().map(|error| {
                (
                    error,
                    entry.evaluation_path().to_string(),
                    entry.schema_location().to_string(),
                    entry.instance_location().to_string(),
                )
            })
        })
        .expect("an invalid result must carry an error")
}

#[test]
fn type_and_minimum() {
    let schema = conforma::compile(&json!({"type": "integer", "minimum": 0})).unwrap();

    assert!(schema.is_valid(&json!(5)));

    let result = schema.validate(&json!(-1));
    assert!(!result.is_valid());
    let (error, _, _, _) = first_failing(&result);
    assert_eq!(error.keyword, "minimum");
    assert_eq!(error.code, "value_below_minimum");
    assert_eq!(error.param("minimum"), Some(&json!(0)));
    assert_eq!(error.param("value"), Some(&json!(-1)));

    let result = schema.validate(&json!("5"));
    assert!(!result.is_valid());
    let (error, _, _, _) = first_failing(&result);
    assert_eq!(error.keyword, "type");
    assert_eq!(error.code, "type_mismatch");
}

#[test]
fn required_and_additional_properties() {
    let schema = conforma::compile(&json!({
        "type": "object",
        "properties": {
            "foo": {"type": "string", "pattern": "^foo ", "minLength": 10}
        },
        "required": ["foo"],
        "additionalProperties": false
    }))
    .unwrap();

    assert!(schema.is_valid(&json!({"foo": "foo bar baz baz"})));

    let result = schema.validate(&json!({}));
    assert!(!result.is_valid());
    let (error, _, _, _) = first_failing(&result);
    assert_eq!(error.code, "missing_required_property");
    assert_eq!(error.param("missing"), Some(&json!(["foo"])));
    assert!(error.message().contains("'foo'"));

    let result = schema.validate(&json!({"foo": "foo valid here", "extra": "data"}));
    assert!(!result.is_valid());
    let additional = result
        .iter()
        .flat_map(|entry| entry.errors())
        .find(|error| error.keyword == "additionalProperties")
        .expect("additionalProperties must report");
    assert_eq!(additional.code, "additional_properties_not_allowed");
    assert_eq!(additional.param("unexpected"), Some(&json!(["extra"])));
}

#[test]
fn one_of_with_omitted_fields() {
    let schema = conforma::compile(&json!({
        "oneOf": [
            {
                "properties": {"runs-on": {"type": "array"}},
                "required": ["runs-on"],
                "additionalProperties": false
            },
            {
                "properties": {"uses": {"type": "string"}},
                "required": ["uses"],
                "additionalProperties": false
            }
        ]
    }))
    .unwrap();

    assert!(schema.is_valid(&json!({"runs-on": ["ubuntu-latest"]})));
    assert!(schema.is_valid(&json!({"uses": "actions/checkout@v4"})));

    let result = schema.validate(&json!({"runs-on": ["x"], "uses": "y"}));
    assert!(!result.is_valid());
    let one_of = result
        .iter()
        .flat_map(|entry| entry.errors())
        .find(|error| error.keyword == "oneOf")
        .expect("oneOf must report");
    assert_eq!(one_of.code, "one_of_mismatch");
    assert_eq!(one_of.param("matches"), Some(&json!(0)));
}

#[test]
fn ref_error_locations() {
    let schema = conforma::compile(&json!({
        "$defs": {"pos": {"type": "integer", "minimum": 0}},
        "properties": {"x": {"$ref": "#/$defs/pos"}},
        "required": ["x"]
    }))
    .unwrap();

    let result = schema.validate(&json!({"x": -1}));
    assert!(!result.is_valid());
    let minimum = result
        .iter()
        .find(|entry| {
            entry
                .errors()
                .iter()
                .any(|error| error.keyword == "minimum")
        })
        .expect("the minimum violation is reported");
    assert_eq!(minimum.evaluation_path().to_string(), "/properties/x/$ref");
    assert_eq!(minimum.schema_location(), "#/$defs/pos");
    assert_eq!(minimum.instance_location().to_string(), "/x");
}

#[test]
fn recursive_tree_via_dynamic_ref() {
    let schema = conforma::compile(&json!({
        "$id": "https://example.com/tree",
        "$dynamicAnchor": "T",
        "type": "object",
        "properties": {
            "value": {"type": "integer"},
            "children": {"type": "array", "items": {"$dynamicRef": "#T"}}
        },
        "required": ["value"]
    }))
    .unwrap();

    let deep = json!({
        "value": 1,
        "children": [{
            "value": 2,
            "children": [{
                "value": 3,
                "children": [{"value": 4}]
            }]
        }]
    });
    assert!(schema.is_valid(&deep));

    let broken_leaf = json!({
        "value": 1,
        "children": [{"value": "oops"}]
    });
    let result = schema.validate(&broken_leaf);
    assert!(!result.is_valid());
    let type_error = result
        .iter()
        .find(|entry| entry.errors().iter().any(|error| error.keyword == "type"))
        .expect("the leaf type violation is reported");
    assert_eq!(
        type_error.instance_location().to_string(),
        "/children/0/value"
    );
}

#[test]
fn localized_messages() {
    let bundle = LocaleBundle::from_pairs([("string_too_short", "值应至少为 {min_length} 个字符")]);
    let schema = conforma::compile(&json!({"minLength": 3})).unwrap();
    let result = schema.validate(&json!("ab"));
    let list = result.to_list_localized(&bundle, false);
    assert_eq!(
        list.errors.as_ref().unwrap()["minLength"],
        json!("值应至少为 3 个字符")
    );
    // Codes without a translation fall back to the built-in template.
    let plain = result.to_list(false);
    assert_eq!(
        plain.errors.as_ref().unwrap()["minLength"],
        json!("string should be at least 3 characters")
    );
}

#[test]
fn output_formats_round_trip() {
    let schema = conforma::compile(&json!({
        "title": "point",
        "type": "object",
        "properties": {"x": {"type": "integer"}}
    }))
    .unwrap();

    let valid = schema.validate(&json!({"x": 1}));
    assert_eq!(serde_json::to_value(valid.to_flag()).unwrap(), json!({"valid": true}));
    let list = serde_json::to_value(valid.to_list(true)).unwrap();
    assert_eq!(list["valid"], json!(true));
    assert_eq!(list["annotations"]["title"], json!("point"));

    let invalid = schema.validate(&json!({"x": "nope"}));
    let flat = serde_json::to_value(invalid.to_list(false)).unwrap();
    assert_eq!(flat["valid"], json!(false));
    let details = flat["details"].as_array().unwrap();
    assert!(details
        .iter()
        .any(|unit| unit["evaluationPath"] == json!("/properties/x")));
}

#[test]
fn validation_is_deterministic() {
    let compiler = Compiler::new();
    let schema = compiler
        .compile_value(
            &json!({
                "type": "object",
                "properties": {"a": {"type": "string"}},
                "required": ["a", "b"],
                "additionalProperties": false
            }),
            None,
        )
        .unwrap();
    let instance = json!({"a": 7, "z": true});
    let first = serde_json::to_value(schema.validate(&instance).to_list(false)).unwrap();
    for _ in 0..4 {
        let again = serde_json::to_value(schema.validate(&instance).to_list(false)).unwrap();
        assert_eq!(first, again);
    }
}
