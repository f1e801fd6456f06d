//! Tests for stream definitions

use super::*;
use crate::config::TapConfig;
use crate::types::{Context, ReplicationMethod};
use chrono::TimeZone;
use chrono::Utc;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_case::test_case;

fn config(extra: serde_json::Value) -> TapConfig {
    let mut value = json!({
        "client_id": "cid",
        "client_secret": "secret",
        "refresh_token": "refresh"
    });
    if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
        base.extend(extra.clone());
    }
    TapConfig::from_value(value).unwrap()
}

fn account_ctx() -> Context {
    json!({"accountID": "12", "account_name": "Demo Store"})
        .as_object()
        .cloned()
        .unwrap()
}

fn params(list: &[(&str, &str)]) -> Vec<(String, String)> {
    list.iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[test]
fn test_registry_order() {
    let registry = StreamRegistry::lightspeed().unwrap();
    assert_eq!(
        registry.names(),
        vec!["account", "items", "vendors", "orders", "sales", "shipments", "shops"]
    );
    assert_eq!(registry.len(), 7);
    assert!(registry.get("customers").is_none());
    assert!(registry.require("customers").is_err());
}

#[test_case("items", "/Account/{accountID}/Item.json", "itemID", "Item")]
#[test_case("vendors", "/Account/{accountID}/Vendor.json", "vendorID", "Vendor")]
#[test_case("orders", "/Account/{accountID}/Order.json", "orderID", "Order")]
#[test_case("sales", "/Account/{accountID}/Sale.json", "saleID", "Sale")]
#[test_case("shipments", "/Account/{accountID}/Shipment.json", "orderShipmentID", "OrderShipment")]
#[test_case("shops", "/Account/{accountID}/Shop.json", "shopID", "Shop")]
fn test_child_stream_definition(name: &str, path: &str, key: &str, envelope: &str) {
    let registry = StreamRegistry::lightspeed().unwrap();
    let stream = registry.require(name).unwrap();

    assert_eq!(stream.path, path);
    assert_eq!(stream.primary_keys, vec![key.to_string()]);
    assert_eq!(stream.records_key, envelope);
    assert_eq!(stream.parent.as_deref(), Some("account"));
    assert_eq!(stream.replication_key.as_deref(), Some("timeStamp"));
    assert_eq!(stream.replication_method(), ReplicationMethod::Incremental);
    assert_eq!(stream.state_partitioning_keys, vec!["accountID".to_string()]);
}

#[test]
fn test_account_stream_definition() {
    let registry = StreamRegistry::lightspeed().unwrap();
    let account = registry.require("account").unwrap();

    assert_eq!(account.path, "/Account.json");
    assert!(account.parent.is_none());
    assert!(!account.is_incremental());
    assert_eq!(account.replication_method(), ReplicationMethod::FullTable);
    assert!(account
        .request_params(&config(json!({})), None, false)
        .is_empty());
}

#[test]
fn test_request_params_full_sync() {
    let registry = StreamRegistry::lightspeed().unwrap();
    let items = registry.require("items").unwrap();

    assert_eq!(
        items.request_params(&config(json!({})), None, false),
        params(&[("limit", "100"), ("load_relations", "all")])
    );
}

#[test]
fn test_request_params_incremental_filter() {
    let registry = StreamRegistry::lightspeed().unwrap();
    let sales = registry.require("sales").unwrap();
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

    assert_eq!(
        sales.request_params(&config(json!({"page_size": 50})), Some(start), false),
        params(&[
            ("limit", "50"),
            ("timeStamp", ">=,2024-01-02T03:04:05-00:00"),
            ("load_relations", "[\"SaleLines\"]"),
        ])
    );
}

#[test]
fn test_request_params_page_size_capped() {
    let registry = StreamRegistry::lightspeed().unwrap();
    let orders = registry.require("orders").unwrap();
    let got = orders.request_params(&config(json!({"page_size": 500})), None, false);
    assert_eq!(got[0], ("limit".to_string(), "100".to_string()));
}

#[test]
fn test_request_params_relations_override() {
    let registry = StreamRegistry::lightspeed().unwrap();
    let items = registry.require("items").unwrap();
    let got = items.request_params(
        &config(json!({"items_relations": "[\"Category\"]"})),
        None,
        false,
    );
    assert_eq!(
        got,
        params(&[("limit", "100"), ("load_relations", "[\"Category\"]")])
    );
}

#[test]
fn test_request_params_next_link_adds_nothing() {
    let registry = StreamRegistry::lightspeed().unwrap();
    let items = registry.require("items").unwrap();
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    assert!(items
        .request_params(&config(json!({})), Some(start), true)
        .is_empty());
}

#[test]
fn test_render_path() {
    let registry = StreamRegistry::lightspeed().unwrap();
    let shops = registry.require("shops").unwrap();
    assert_eq!(
        shops.render_path(&account_ctx()).unwrap(),
        "/Account/12/Shop.json"
    );
    assert!(shops.render_path(&Context::new()).is_err());
}

#[test]
fn test_child_context() {
    let registry = StreamRegistry::lightspeed().unwrap();
    let account = registry.require("account").unwrap();

    let ctx = account
        .child_context(&json!({"accountID": "12", "name": "Demo Store", "link": null}))
        .unwrap();
    assert_eq!(ctx, account_ctx());

    assert!(account.child_context(&json!({"other": 1})).is_none());

    let items = registry.require("items").unwrap();
    assert!(items.child_context(&json!({"itemID": "1"})).is_none());
}

#[test]
fn test_partition_context() {
    let registry = StreamRegistry::lightspeed().unwrap();
    let items = registry.require("items").unwrap();
    let partition = items.partition_context(&account_ctx()).unwrap();
    assert_eq!(serde_json::Value::Object(partition), json!({"accountID": "12"}));

    let account = registry.require("account").unwrap();
    assert!(account.partition_context(&account_ctx()).is_none());
}

#[test]
fn test_context_keys_and_automatic_fields() {
    let registry = StreamRegistry::lightspeed().unwrap();
    let vendors = registry.require("vendors").unwrap();
    let keys = registry.context_keys(vendors);
    assert_eq!(keys, vec!["accountID".to_string(), "account_name".to_string()]);
    assert_eq!(
        vendors.automatic_fields(&keys),
        vec![
            "vendorID".to_string(),
            "timeStamp".to_string(),
            "accountID".to_string(),
            "account_name".to_string()
        ]
    );

    let account = registry.require("account").unwrap();
    assert!(registry.context_keys(account).is_empty());
}

#[test]
fn test_timestamp_helpers() {
    let parsed = parse_timestamp("2024-03-01T12:00:00+02:00").unwrap();
    assert_eq!(format_timestamp_filter(parsed), ">=,2024-03-01T10:00:00-00:00");
    assert!(parse_timestamp("yesterday").is_none());
}

#[test]
fn test_register_replaces_existing() {
    let mut registry = StreamRegistry::lightspeed().unwrap();
    let mut custom = registry.require("items").unwrap().clone();
    custom.default_relations = None;
    registry.register(custom);

    assert_eq!(registry.len(), 7);
    assert!(registry.require("items").unwrap().default_relations.is_none());
}
