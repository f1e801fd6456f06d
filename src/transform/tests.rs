//! Tests for record extraction and conformance

use super::*;
use crate::error::Error;
use crate::schema::{embedded_schema, JsonSchema};
use crate::types::Context;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn schema(value: Value) -> JsonSchema {
    serde_json::from_value(value).unwrap()
}

fn account_ctx() -> Context {
    json!({"accountID": "12", "account_name": "Demo Store"})
        .as_object()
        .cloned()
        .unwrap()
}

// ============================================================================
// Extraction Tests
// ============================================================================

#[test]
fn test_extract_array() {
    let body = json!({"@attributes": {"count": "2"}, "Sale": [{"saleID": "1"}, {"saleID": "2"}]});
    let records = extract_records(&body, "Sale").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["saleID"], "2");
}

#[test]
fn test_extract_single_object() {
    let body = json!({"@attributes": {"count": "1"}, "Account": {"accountID": "12", "name": "Demo"}});
    let records = extract_records(&body, "Account").unwrap();
    assert_eq!(records, vec![json!({"accountID": "12", "name": "Demo"})]);
}

#[test]
fn test_extract_missing_or_null() {
    let body = json!({"@attributes": {"count": "0"}});
    assert!(extract_records(&body, "Item").unwrap().is_empty());

    let body = json!({"Item": null});
    assert!(extract_records(&body, "Item").unwrap().is_empty());

    assert!(extract_records(&Value::Null, "Item").unwrap().is_empty());
}

#[test]
fn test_extract_rejects_unexpected_shapes() {
    let err = extract_records(&json!([1, 2]), "Item").unwrap_err();
    assert!(matches!(err, Error::RecordExtraction { .. }));

    let err = extract_records(&json!({"Item": "nope"}), "Item").unwrap_err();
    assert!(err.to_string().contains("expected an array or object"));
}

// ============================================================================
// Conformance Tests
// ============================================================================

#[test]
fn test_injects_context() {
    let transformer = RecordTransformer::new("shops", embedded_schema("shops").unwrap());
    let record = transformer
        .transform(
            json!({"shopID": "3", "name": "Main", "timeStamp": "2024-01-01T10:00:00+00:00"}),
            Some(&account_ctx()),
        )
        .unwrap();

    assert_eq!(record["accountID"], "12");
    assert_eq!(record["account_name"], "Demo Store");
    assert_eq!(record["shopID"], "3");
}

#[test]
fn test_object_becomes_array() {
    let transformer = RecordTransformer::new(
        "t",
        schema(json!({
            "type": "object",
            "properties": {
                "lines": {
                    "type": ["array", "null"],
                    "items": {"type": ["object", "null"], "properties": {"id": {"type": ["string", "null"]}}}
                }
            }
        })),
    );

    let record = transformer
        .transform(json!({"lines": {"id": "1"}}), None)
        .unwrap();
    assert_eq!(Value::Object(record), json!({"lines": [{"id": "1"}]}));

    let record = transformer.transform(json!({"lines": ""}), None).unwrap();
    assert_eq!(Value::Object(record), json!({"lines": []}));

    let record = transformer.transform(json!({"lines": "junk"}), None).unwrap();
    assert_eq!(Value::Object(record), json!({"lines": []}));

    let record = transformer.transform(json!({"lines": null}), None).unwrap();
    assert_eq!(Value::Object(record), json!({"lines": null}));
}

#[test]
fn test_scalar_becomes_scalar_array() {
    let transformer = RecordTransformer::new(
        "t",
        schema(json!({
            "type": "object",
            "properties": {"tag": {"type": ["array", "null"], "items": {"type": ["string"]}}}
        })),
    );
    let record = transformer.transform(json!({"tag": 5}), None).unwrap();
    assert_eq!(Value::Object(record), json!({"tag": ["5"]}));
}

#[test]
fn test_empty_string_object_is_null() {
    let transformer = RecordTransformer::new(
        "t",
        schema(json!({
            "type": "object",
            "properties": {"Contact": {"type": ["object", "null"], "properties": {}}}
        })),
    );
    let record = transformer.transform(json!({"Contact": ""}), None).unwrap();
    assert_eq!(Value::Object(record), json!({"Contact": null}));
}

#[test]
fn test_scalar_coercion() {
    let transformer = RecordTransformer::new(
        "t",
        schema(json!({
            "type": "object",
            "properties": {
                "s": {"type": ["string", "null"]},
                "b": {"type": ["string", "null"]},
                "i": {"type": ["integer", "null"]},
                "n": {"type": ["number", "null"]},
                "e": {"type": ["integer", "null"]},
                "flag": {"type": ["boolean", "null"]},
                "ts": {"type": ["string", "null"], "format": "date-time"},
                "bad_ts": {"type": ["string", "null"], "format": "date-time"}
            }
        })),
    );

    let record = transformer
        .transform(
            json!({
                "s": 12,
                "b": true,
                "i": "42",
                "n": "1.5",
                "e": "",
                "flag": "false",
                "ts": "2024-01-01T12:00:00+02:00",
                "bad_ts": "not a date"
            }),
            None,
        )
        .unwrap();

    assert_eq!(
        Value::Object(record),
        json!({
            "s": "12",
            "b": "true",
            "i": 42,
            "n": 1.5,
            "e": null,
            "flag": false,
            "ts": "2024-01-01T10:00:00+00:00",
            "bad_ts": "not a date"
        })
    );
}

#[test]
fn test_unknown_properties_dropped_at_every_level() {
    let transformer = RecordTransformer::new(
        "t",
        schema(json!({
            "type": "object",
            "properties": {
                "id": {"type": ["string"]},
                "nested": {"type": ["object", "null"], "properties": {"keep": {"type": ["string", "null"]}}}
            }
        })),
    );

    for _ in 0..2 {
        let record = transformer
            .transform(
                json!({"id": "1", "extra": "x", "nested": {"keep": "k", "drop": "d"}}),
                None,
            )
            .unwrap();
        assert_eq!(
            Value::Object(record),
            json!({"id": "1", "nested": {"keep": "k"}})
        );
    }
}

#[test]
fn test_deselected_fields_dropped() {
    let transformer = RecordTransformer::new("account", embedded_schema("account").unwrap())
        .with_deselected(vec!["link".to_string()]);

    let record = transformer
        .transform(
            json!({"accountID": "12", "name": "Demo", "link": {"@attributes": {"href": "x"}}}),
            None,
        )
        .unwrap();
    assert!(!record.contains_key("link"));
    assert_eq!(transformer.stream(), "account");
}

#[test]
fn test_missing_required_field() {
    let transformer = RecordTransformer::new("sales", embedded_schema("sales").unwrap());
    let err = transformer
        .transform(json!({"saleID": "1"}), Some(&account_ctx()))
        .unwrap_err();

    match err {
        Error::SchemaValidation { stream, message } => {
            assert_eq!(stream, "sales");
            assert!(message.contains("timeStamp"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_non_object_record() {
    let transformer = RecordTransformer::new("sales", embedded_schema("sales").unwrap());
    assert!(transformer.transform(json!("oops"), None).is_err());
}

#[test]
fn test_item_vendor_nums_normalized() {
    let transformer = RecordTransformer::new("items", embedded_schema("items").unwrap());
    let record = transformer
        .transform(
            json!({
                "itemID": "9",
                "timeStamp": "2024-05-01T08:00:00+00:00",
                "ItemVendorNums": {"ItemVendorNum": {"itemVendorNumID": "1", "value": "ABC"}}
            }),
            Some(&account_ctx()),
        )
        .unwrap();

    let nums = &record["ItemVendorNums"]["ItemVendorNum"];
    assert!(nums.is_array());
    assert_eq!(nums[0]["value"], "ABC");
}
