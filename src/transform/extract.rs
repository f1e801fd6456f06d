//! Record extraction from response envelopes

use crate::error::{Error, Result};
use crate::pagination::lookup_path;
use serde_json::Value;
use tracing::{debug, warn};

/// Extract the records held under `records_key`
///
/// The key may hold an array of records or, when the API returns a single
/// match, the record object itself. A missing or null key means no records.
pub fn extract_records(body: &Value, records_key: &str) -> Result<Vec<Value>> {
    let map = match body {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map,
        other => {
            return Err(Error::RecordExtraction {
                key: records_key.to_string(),
                message: format!("expected a JSON object, got {}", type_name(other)),
            })
        }
    };

    match map.get(records_key) {
        Some(Value::Array(records)) => Ok(records.clone()),
        Some(record @ Value::Object(_)) => Ok(vec![record.clone()]),
        Some(Value::Null) | None => {
            let count = lookup_path(body, "@attributes.count").and_then(Value::as_str);
            if count == Some("0") {
                debug!("Response has no '{records_key}' records");
            } else {
                warn!("Response is missing the '{records_key}' key, treating page as empty");
            }
            Ok(Vec::new())
        }
        Some(other) => Err(Error::RecordExtraction {
            key: records_key.to_string(),
            message: format!("expected an array or object, got {}", type_name(other)),
        }),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
