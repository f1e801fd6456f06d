//! Schemas compiled into the binary

use super::types::JsonSchema;
use crate::error::{Error, Result};

/// Streams with an embedded schema
pub const EMBEDDED_STREAMS: &[&str] = &[
    "account",
    "items",
    "vendors",
    "orders",
    "sales",
    "shipments",
    "shops",
];

fn raw_schema(stream: &str) -> Option<&'static str> {
    let raw = match stream {
        "account" => include_str!("../../schemas/account.json"),
        "items" => include_str!("../../schemas/items.json"),
        "vendors" => include_str!("../../schemas/vendors.json"),
        "orders" => include_str!("../../schemas/orders.json"),
        "sales" => include_str!("../../schemas/sales.json"),
        "shipments" => include_str!("../../schemas/shipments.json"),
        "shops" => include_str!("../../schemas/shops.json"),
        _ => return None,
    };
    Some(raw)
}

/// Parse the embedded schema of a stream
pub fn embedded_schema(stream: &str) -> Result<JsonSchema> {
    let raw = raw_schema(stream).ok_or_else(|| Error::StreamNotFound {
        stream: stream.to_string(),
    })?;
    serde_json::from_str(raw)
        .map_err(|e| Error::schema(stream, format!("Embedded schema is invalid: {e}")))
}
