//! Keyword semantics and their interactions, in particular the evaluated-set
//! bookkeeping behind `unevaluatedProperties` / `unevaluatedItems`.
use serde_json::{json, Value};
use test_case::test_case;

fn is_valid(schema: &Value, instance: &Value) -> bool {
    conforma::compile(schema)
        .expect("schema should compile")
        .is_valid(instance)
}

fn error_codes(schema: &Value, instance: &Value) -> Vec<String> {
    conforma::compile(schema)
        .expect("schema should compile")
        .validate(instance)
        .iter()
        .flat_map(|entry| entry.errors())
        .map(|error| error.code.to_string())
        .collect()
}

#[test_case(&json!({"type": "integer"}), &json!(1), true)]
#[test_case(&json!({"type": "integer"}), &json!(1.0), true; "integral float is an integer")]
#[test_case(&json!({"type": "integer"}), &json!(1.5), false)]
#[test_case(&json!({"type": "number"}), &json!(1), true)]
#[test_case(&json!({"type": ["string", "null"]}), &json!(null), true)]
#[test_case(&json!({"type": ["string", "null"]}), &json!(0), false)]
fn type_matching(schema: &Value, instance: &Value, expected: bool) {
    assert_eq!(is_valid(schema, instance), expected);
}

#[test_case(&json!({"const": 1}), &json!(1.0), true; "numeric folding")]
#[test_case(&json!({"const": null}), &json!(null), true)]
#[test_case(&json!({"const": null}), &json!(0), false; "const null is a constraint")]
#[test_case(&json!({"enum": [1, "two", null]}), &json!(1.0), true)]
#[test_case(&json!({"enum": [1, "two", null]}), &json!("three"), false)]
#[test_case(&json!({"enum": []}), &json!(1), false; "empty enum rejects everything")]
fn const_and_enum(schema: &Value, instance: &Value, expected: bool) {
    assert_eq!(is_valid(schema, instance), expected);
}

#[test_case(&json!({"multipleOf": 2}), &json!(4), true)]
#[test_case(&json!({"multipleOf": 1.5}), &json!(4.5), true)]
#[test_case(&json!({"multipleOf": 0.0001}), &json!(0.0075), true; "decimal precision")]
#[test_case(&json!({"multipleOf": 2}), &json!(7), false)]
#[test_case(&json!({"exclusiveMinimum": 3}), &json!(3), false)]
#[test_case(&json!({"exclusiveMinimum": 3}), &json!(3.5), true)]
#[test_case(&json!({"maximum": 3.0}), &json!(3), true; "inclusive bound across types")]
#[test_case(&json!({"exclusiveMaximum": 3}), &json!(2.99), true)]
fn numeric_keywords(schema: &Value, instance: &Value, expected: bool) {
    assert_eq!(is_valid(schema, instance), expected);
}

#[test]
fn non_positive_multiple_of_is_an_evaluation_error() {
    assert_eq!(
        error_codes(&json!({"multipleOf": 0}), &json!(4)),
        vec!["invalid_multiple_of"]
    );
}

#[test_case(&json!({"minLength": 3}), &json!("日本語"), true; "code points not bytes")]
#[test_case(&json!({"maxLength": 3}), &json!("日本語"), true)]
#[test_case(&json!({"maxLength": 2}), &json!("日本語"), false)]
#[test_case(&json!({"pattern": "ab+c"}), &json!("xxabbbcxx"), true; "unanchored match")]
#[test_case(&json!({"pattern": "^a"}), &json!("ba"), false)]
fn string_keywords(schema: &Value, instance: &Value, expected: bool) {
    assert_eq!(is_valid(schema, instance), expected);
}

#[test_case(&json!({"uniqueItems": true}), &json!([1, 2, 3]), true)]
#[test_case(&json!({"uniqueItems": true}), &json!([1, 2, 1.0]), false; "numeric folding finds duplicates")]
#[test_case(&json!({"uniqueItems": true}), &json!([{"a": 1}, {"a": 1.0}]), false)]
#[test_case(&json!({"prefixItems": [{"type": "integer"}], "items": {"type": "string"}}), &json!([1, "a", "b"]), true)]
#[test_case(&json!({"prefixItems": [{"type": "integer"}], "items": {"type": "string"}}), &json!([1, "a", 2]), false)]
#[test_case(&json!({"contains": {"type": "string"}}), &json!([1, "a"]), true)]
#[test_case(&json!({"contains": {"type": "string"}}), &json!([1, 2]), false)]
#[test_case(&json!({"contains": {"type": "string"}, "minContains": 0}), &json!([1, 2]), true; "min contains zero allows no match")]
#[test_case(&json!({"contains": {"type": "string"}, "minContains": 2}), &json!(["a", 1, "b"]), true)]
#[test_case(&json!({"contains": {"type": "string"}, "maxContains": 1}), &json!(["a", "b"]), false)]
fn array_keywords(schema: &Value, instance: &Value, expected: bool) {
    assert_eq!(is_valid(schema, instance), expected);
}

#[test]
fn required_errors_keep_schema_source_order() {
    let codes = conforma::compile(&json!({"required": ["zeta", "alpha", "mid"]}))
        .unwrap()
        .validate(&json!({}));
    let error = codes
        .iter()
        .flat_map(|entry| entry.errors())
        .next()
        .unwrap();
    assert_eq!(error.param("missing"), Some(&json!(["zeta", "alpha", "mid"])));
}

#[test_case(&json!({"dependentRequired": {"credit": ["billing"]}}), &json!({"credit": 1, "billing": 2}), true)]
#[test_case(&json!({"dependentRequired": {"credit": ["billing"]}}), &json!({"credit": 1}), false)]
#[test_case(&json!({"dependentRequired": {"credit": ["billing"]}}), &json!({"cash": 1}), true; "absent trigger")]
#[test_case(&json!({"dependentSchemas": {"credit": {"required": ["billing"]}}}), &json!({"credit": 1}), false)]
#[test_case(&json!({"dependentSchemas": {"credit": {"required": ["billing"]}}}), &json!({"credit": 1, "billing": 2}), true)]
fn dependent_keywords(schema: &Value, instance: &Value, expected: bool) {
    assert_eq!(is_valid(schema, instance), expected);
}

#[test_case(&json!({"propertyNames": {"maxLength": 3}}), &json!({"ab": 1, "abc": 2}), true)]
#[test_case(&json!({"propertyNames": {"maxLength": 3}}), &json!({"toolong": 1}), false)]
#[test_case(&json!({"patternProperties": {"^x-": {"type": "string"}}}), &json!({"x-a": "s"}), true)]
#[test_case(&json!({"patternProperties": {"^x-": {"type": "string"}}}), &json!({"x-a": 1}), false)]
#[test_case(
    &json!({"properties": {"a": true}, "patternProperties": {"^x-": true}, "additionalProperties": {"type": "integer"}}),
    &json!({"a": "anything", "x-b": [], "other": 3}),
    true
)]
#[test_case(
    &json!({"properties": {"a": true}, "additionalProperties": {"type": "integer"}}),
    &json!({"a": 1, "other": "three"}),
    false
)]
fn object_applicators(schema: &Value, instance: &Value, expected: bool) {
    assert_eq!(is_valid(schema, instance), expected);
}

#[test]
fn unevaluated_properties_see_through_applicators() {
    let schema = json!({
        "allOf": [{"properties": {"a": true}}],
        "anyOf": [{"properties": {"b": true}, "required": ["b"]}],
        "properties": {"c": true},
        "unevaluatedProperties": false
    });
    assert!(is_valid(&schema, &json!({"a": 1, "b": 2, "c": 3})));
    let codes = error_codes(&schema, &json!({"a": 1, "b": 2, "c": 3, "d": 4}));
    assert!(codes.contains(&"unevaluated_properties_not_allowed".to_string()));
}

#[test]
fn failing_all_of_branches_do_not_mark_properties() {
    // The branch fails, so its `properties` marks must not leak out.
    let schema = json!({
        "allOf": [{"properties": {"a": {"type": "integer"}}, "required": ["missing"]}],
        "unevaluatedProperties": false
    });
    let codes = error_codes(&schema, &json!({"a": 1}));
    assert!(codes.contains(&"unevaluated_properties_not_allowed".to_string()));
}

#[test]
fn one_of_contributes_only_the_matching_branch() {
    let schema = json!({
        "oneOf": [
            {"properties": {"a": true}, "required": ["a"]},
            {"properties": {"b": true}, "required": ["b"]}
        ],
        "unevaluatedProperties": false
    });
    assert!(is_valid(&schema, &json!({"a": 1})));
    assert!(!is_valid(&schema, &json!({"a": 1, "b": 2})));
}

#[test]
fn not_never_contributes_evaluated_sets() {
    let schema = json!({
        "not": {"properties": {"a": {"type": "string"}}, "required": ["a"]},
        "unevaluatedProperties": false
    });
    // `not` passes (inner schema fails), but `a` stays unevaluated.
    let codes = error_codes(&schema, &json!({"a": 1}));
    assert!(codes.contains(&"unevaluated_properties_not_allowed".to_string()));
}

#[test]
fn if_annotations_count_even_when_the_condition_fails() {
    let schema = json!({
        "if": {"properties": {"kind": {"const": "a"}}, "required": ["kind"]},
        "then": {"required": ["size"]},
        "unevaluatedProperties": false
    });
    // `if` fails on this instance but still marks `kind` as evaluated.
    assert!(is_valid(&schema, &json!({"kind": "b"})));
    // When `if` passes, `then` runs and its requirements bind.
    assert!(!is_valid(&schema, &json!({"kind": "a"})));
    assert!(is_valid(&schema, &json!({"kind": "a", "size": 1})));
}

#[test]
fn references_merge_evaluated_sets_even_on_failure() {
    let schema = json!({
        "$defs": {"inner": {"properties": {"x": {"type": "integer"}}}},
        "$ref": "#/$defs/inner",
        "unevaluatedProperties": false
    });
    let codes = error_codes(&schema, &json!({"x": "bad"}));
    assert!(codes.contains(&"ref_mismatch".to_string()));
    assert!(!codes.contains(&"unevaluated_properties_not_allowed".to_string()));
}

#[test]
fn unevaluated_items_union() {
    let schema = json!({
        "prefixItems": [{"type": "integer"}],
        "contains": {"type": "string"},
        "unevaluatedItems": false
    });
    assert!(is_valid(&schema, &json!([1, "s"])));
    let codes = error_codes(&schema, &json!([1, "s", true]));
    assert!(codes.contains(&"unevaluated_items_not_allowed".to_string()));
}

#[test]
fn boolean_subschemas_evaluate_everything() {
    let schema = json!({
        "anyOf": [true],
        "unevaluatedProperties": false
    });
    assert!(is_valid(&schema, &json!({"free": "form"})));
}

#[test]
fn self_referential_schemas_terminate() {
    let schema = json!({"$ref": "#"});
    assert!(is_valid(&schema, &json!(5)));
    let list = json!({
        "properties": {"next": {"$ref": "#"}},
        "type": "object"
    });
    let deep = json!({"next": {"next": {"next": {"next": {"next": {}}}}}});
    assert!(is_valid(&list, &deep));
    assert!(!is_valid(&list, &json!({"next": 5})));
}

#[test]
fn legacy_additional_items_migrates() {
    let schema = json!({
        "items": [{"type": "integer"}],
        "additionalItems": {"type": "string"}
    });
    assert!(is_valid(&schema, &json!([1, "a"])));
    assert!(!is_valid(&schema, &json!([1, 2])));
}

#[test]
fn content_keywords_decode_and_validate() {
    let schema = json!({
        "contentEncoding": "base64",
        "contentMediaType": "application/json",
        "contentSchema": {"required": ["answer"]}
    });
    // {"answer":42}
    assert!(is_valid(&schema, &json!("eyJhbnN3ZXIiOjQyfQ==")));
    // {"question":"?"}
    let codes = error_codes(&schema, &json!("eyJxdWVzdGlvbiI6Ij8ifQ=="));
    assert!(codes.contains(&"content_schema_mismatch".to_string()));
    let codes = error_codes(&schema, &json!("not/base64!!"));
    assert!(codes.contains(&"content_encoding_mismatch".to_string()));
    // Non-strings are out of scope for content keywords.
    assert!(is_valid(&schema, &json!(42)));
}

#[test]
fn format_is_annotation_unless_asserted() {
    let schema_json = json!({"format": "ipv4"});
    assert!(is_valid(&schema_json, &json!("999.1.1.1")));

    let compiler = conforma::Compiler::options().assert_format(true).build();
    let schema = compiler.compile_value(&schema_json, None).unwrap();
    assert!(schema.is_valid(&json!("127.0.0.1")));
    assert!(!schema.is_valid(&json!("999.1.1.1")));
    // Formats only constrain strings.
    assert!(schema.is_valid(&json!(17)));

    let unknown = compiler
        .compile_value(&json!({"format": "no-such-format"}), None)
        .unwrap();
    let result = unknown.validate(&json!("x"));
    assert_eq!(result.iter().flat_map(|e| e.errors()).next().unwrap().code, "unknown_format");
}

#[test]
fn custom_formats_take_precedence() {
    let compiler = conforma::Compiler::options().assert_format(true).build();
    compiler.register_format("ipv4", Some("string"), |value| {
        value.as_str() == Some("only-this")
    });
    let schema = compiler.compile_value(&json!({"format": "ipv4"}), None).unwrap();
    assert!(schema.is_valid(&json!("only-this")));
    assert!(!schema.is_valid(&json!("127.0.0.1")));
    // The type restriction skips non-strings entirely.
    assert!(schema.is_valid(&json!(5)));
}

#[test]
fn custom_decoders_and_media_types() {
    let compiler = conforma::Compiler::new();
    compiler.register_decoder("rot13", |value| {
        Ok(value
            .chars()
            .map(|ch| match ch {
                'a'..='z' => (((ch as u8 - b'a') + 13) % 26 + b'a') as char,
                'A'..='Z' => (((ch as u8 - b'A') + 13) % 26 + b'A') as char,
                _ => ch,
            })
            .collect::<String>()
            .into_bytes())
    });
    compiler.register_media_type("text/csv", |bytes| {
        let text = String::from_utf8_lossy(bytes);
        Ok(serde_json::Value::Array(
            text.split(',').map(|cell| json!(cell)).collect(),
        ))
    });
    let schema = compiler
        .compile_value(
            &json!({
                "contentEncoding": "rot13",
                "contentMediaType": "text/csv",
                "contentSchema": {"minItems": 2}
            }),
            None,
        )
        .unwrap();
    assert!(schema.is_valid(&json!("n,o")));
    assert!(!schema.is_valid(&json!("nop")));
}

#[test]
fn serialization_round_trips() {
    let document = json!({
        "$id": "https://example.com/roundtrip.json",
        "$comment": "kept verbatim",
        "type": "object",
        "title": "round trip",
        "properties": {
            "name": {"type": "string", "minLength": 1, "pattern": "^[a-z]+$"},
            "age": {"type": ["integer", "null"], "minimum": 0, "maximum": 150}
        },
        "patternProperties": {"^x-": true},
        "required": ["name", "age"],
        "dependentRequired": {"credit": ["billing"]},
        "additionalProperties": false,
        "unevaluatedProperties": false,
        "allOf": [{"minProperties": 1}],
        "if": {"required": ["credit"]},
        "then": {"required": ["billing"]},
        "$defs": {"flag": {"const": null, "default": null}},
        "examples": [{"name": "ada", "age": 36}]
    });
    let schema = conforma::compile(&document).unwrap();
    assert_eq!(schema.to_value(), document);

    let recompiled = conforma::compile(&schema.to_value()).unwrap();
    for instance in [
        json!({"name": "ada", "age": 36}),
        json!({"name": "ADA", "age": 36}),
        json!({"name": "ada"}),
        json!({"name": "ada", "age": 36, "extra": 1}),
        json!(null),
    ] {
        assert_eq!(
            schema.is_valid(&instance),
            recompiled.is_valid(&instance),
            "{instance}"
        );
    }
}

#[test]
fn byte_buffers_match_parsed_values() {
    let schema = conforma::compile(&json!({
        "type": "object",
        "properties": {"a": {"type": "integer"}},
        "required": ["a"]
    }))
    .unwrap();
    let raw = br#"{"a": 1, "b": "two"}"#;
    let parsed: Value = serde_json::from_slice(raw).unwrap();
    assert_eq!(
        schema.validate_bytes(raw).is_valid(),
        schema.validate(&parsed).is_valid()
    );
}

#[test]
fn annotations_surface_in_results() {
    let schema = conforma::compile(&json!({
        "title": "thing",
        "default": 3,
        "x-vendor": {"internal": true},
        "type": "integer"
    }))
    .unwrap();
    let result = schema.validate(&json!(5));
    assert!(result.is_valid());
    let annotations = result.annotations();
    assert!(annotations.contains(&("title".to_string(), json!("thing"))));
    assert!(annotations.contains(&("default".to_string(), json!(3))));
    assert!(annotations.contains(&("x-vendor".to_string(), json!({"internal": true}))));
}
