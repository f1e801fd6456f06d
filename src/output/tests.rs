//! Tests for the output module

use super::*;
use crate::catalog::Catalog;
use crate::streams::StreamRegistry;
use chrono::TimeZone;
use chrono::Utc;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn lines(writer: MessageWriter<Vec<u8>>) -> Vec<Value> {
    let bytes = writer.into_inner();
    String::from_utf8(bytes)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_schema_message_shape() {
    let mut writer = MessageWriter::new(Vec::new());
    writer
        .write_schema(
            "items",
            json!({"type": "object"}),
            vec!["itemID".to_string()],
            Some("timeStamp"),
        )
        .unwrap();

    assert_eq!(
        lines(writer),
        vec![json!({
            "type": "SCHEMA",
            "stream": "items",
            "schema": {"type": "object"},
            "key_properties": ["itemID"],
            "bookmark_properties": ["timeStamp"]
        })]
    );
}

#[test]
fn test_full_table_schema_has_no_bookmark_properties() {
    let mut writer = MessageWriter::new(Vec::new());
    writer
        .write_schema("account", json!({}), vec!["accountID".to_string()], None)
        .unwrap();

    let output = lines(writer);
    assert!(output[0].get("bookmark_properties").is_none());
}

#[test]
fn test_record_message_shape() {
    let extracted = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
    let mut writer = MessageWriter::new(Vec::new());
    writer
        .write_schema("items", json!({}), vec!["itemID".to_string()], None)
        .unwrap();
    writer
        .write_record("items", json!({"itemID": "1"}), extracted)
        .unwrap();
    assert_eq!(writer.record_count("items"), 1);

    let output = lines(writer);
    assert_eq!(
        output[1],
        json!({
            "type": "RECORD",
            "stream": "items",
            "record": {"itemID": "1"},
            "time_extracted": "2024-05-01T12:30:00.000000Z"
        })
    );
}

#[test]
fn test_record_before_schema_is_rejected() {
    let mut writer = MessageWriter::new(Vec::new());
    let err = writer
        .write_record("items", json!({"itemID": "1"}), Utc::now())
        .unwrap_err();
    assert!(err.to_string().contains("before its SCHEMA"));
    assert!(writer.get_ref().is_empty());
}

#[test]
fn test_state_message() {
    let mut writer = MessageWriter::new(Vec::new());
    writer
        .write_state(json!({"bookmarks": {"items": {}}}))
        .unwrap();
    assert_eq!(writer.states_written(), 1);

    assert_eq!(
        lines(writer),
        vec![json!({"type": "STATE", "value": {"bookmarks": {"items": {}}}})]
    );
}

#[test]
fn test_one_message_per_line() {
    let mut writer = MessageWriter::new(Vec::new());
    writer
        .write_schema("shops", json!({}), vec!["shopID".to_string()], None)
        .unwrap();
    for id in ["1", "2", "3"] {
        writer
            .write_record("shops", json!({"shopID": id, "name": "a\nb"}), Utc::now())
            .unwrap();
    }
    writer.write_state(json!({})).unwrap();

    let text = String::from_utf8(writer.into_inner()).unwrap();
    assert_eq!(text.lines().count(), 5);
    assert!(text.ends_with('\n'));
}

#[test]
fn test_write_catalog() {
    let registry = StreamRegistry::lightspeed().unwrap();
    let catalog = Catalog::discover(&registry);

    let mut writer = MessageWriter::new(Vec::new());
    writer.write_catalog(&catalog).unwrap();

    let text = String::from_utf8(writer.into_inner()).unwrap();
    let parsed: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed["streams"].as_array().unwrap().len(), registry.len());
}

#[test]
fn test_message_roundtrip_tag() {
    let message: Message = serde_json::from_value(json!({
        "type": "STATE",
        "value": {"bookmarks": {}}
    }))
    .unwrap();
    assert!(message.is_state());
    assert_eq!(message.stream(), None);

    let record = Message::record("sales", json!({}), Utc::now());
    assert!(record.is_record());
    assert_eq!(record.stream(), Some("sales"));
}
