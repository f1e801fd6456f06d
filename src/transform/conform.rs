//! Schema conformance for records

use crate::error::{Error, Result};
use crate::schema::{JsonSchema, JsonType, SchemaProperty};
use crate::types::{Context, JsonObject, JsonValue};
use chrono::{DateTime, Utc};
use serde_json::Number;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use tracing::warn;

/// Shapes raw API records into schema-conforming records for one stream
#[derive(Debug)]
pub struct RecordTransformer {
    /// Stream name (for errors and logs)
    stream: String,
    /// Stream schema
    schema: JsonSchema,
    /// Top-level fields the catalog deselected
    deselected: HashSet<String>,
    /// Unknown properties already reported
    reported_unknown: Mutex<HashSet<String>>,
}

impl RecordTransformer {
    /// Create a transformer for a stream schema
    pub fn new(stream: impl Into<String>, schema: JsonSchema) -> Self {
        Self {
            stream: stream.into(),
            schema,
            deselected: HashSet::new(),
            reported_unknown: Mutex::new(HashSet::new()),
        }
    }

    /// Drop these top-level fields from every record
    #[must_use]
    pub fn with_deselected(mut self, fields: impl IntoIterator<Item = String>) -> Self {
        self.deselected = fields.into_iter().collect();
        self
    }

    /// Stream this transformer belongs to
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Transform one raw record
    pub fn transform(&self, record: JsonValue, context: Option<&Context>) -> Result<JsonObject> {
        let JsonValue::Object(mut record) = record else {
            return Err(Error::schema(&self.stream, "record is not a JSON object"));
        };

        if let Some(context) = context {
            for (key, value) in context {
                record.insert(key.clone(), value.clone());
            }
        }

        let mut record = self.conform_object(record, &self.schema.properties, "");
        record.retain(|key, _| !self.deselected.contains(key));

        for field in &self.schema.required {
            if self.deselected.contains(field) {
                continue;
            }
            if record.get(field).map_or(true, JsonValue::is_null) {
                return Err(Error::schema(
                    &self.stream,
                    format!("required field '{field}' is missing or null"),
                ));
            }
        }

        Ok(record)
    }

    fn conform_object(
        &self,
        object: JsonObject,
        properties: &BTreeMap<String, SchemaProperty>,
        prefix: &str,
    ) -> JsonObject {
        let mut out = JsonObject::new();
        for (key, value) in object {
            match properties.get(&key) {
                Some(property) => {
                    let path = join_path(prefix, &key);
                    out.insert(key, self.conform_value(value, property, &path));
                }
                None => self.report_unknown(&join_path(prefix, &key)),
            }
        }
        out
    }

    fn conform_value(&self, value: JsonValue, property: &SchemaProperty, path: &str) -> JsonValue {
        if value.is_null() || property.json_type.is_any() {
            return value;
        }

        if property.has_type(&JsonType::Array) {
            return self.conform_array(value, property, path);
        }

        if property.has_type(&JsonType::Object) {
            return match value {
                JsonValue::Object(map) => match &property.properties {
                    Some(properties) => JsonValue::Object(self.conform_object(map, properties, path)),
                    None => JsonValue::Object(map),
                },
                JsonValue::String(s) if s.is_empty() => JsonValue::Null,
                other => other,
            };
        }

        conform_scalar(value, property)
    }

    fn conform_array(&self, value: JsonValue, property: &SchemaProperty, path: &str) -> JsonValue {
        let conform_item = |item: JsonValue| match &property.items {
            Some(items) => self.conform_value(item, items, path),
            None => item,
        };

        match value {
            JsonValue::Array(items) => JsonValue::Array(items.into_iter().map(conform_item).collect()),
            object @ JsonValue::Object(_) => JsonValue::Array(vec![conform_item(object)]),
            JsonValue::String(s) if s.is_empty() => JsonValue::Array(Vec::new()),
            scalar if property.has_object_items() => {
                warn!(
                    "Stream '{}': dropping scalar {scalar} found where '{path}' expects objects",
                    self.stream
                );
                JsonValue::Array(Vec::new())
            }
            scalar => JsonValue::Array(vec![conform_item(scalar)]),
        }
    }

    fn report_unknown(&self, path: &str) {
        let Ok(mut reported) = self.reported_unknown.lock() else {
            return;
        };
        if reported.insert(path.to_string()) {
            warn!(
                "Stream '{}': property '{path}' is not in the schema and will be dropped",
                self.stream
            );
        }
    }
}

/// Coerce a scalar towards the declared primitive type
fn conform_scalar(value: JsonValue, property: &SchemaProperty) -> JsonValue {
    if property.has_type(&JsonType::String) {
        return match value {
            JsonValue::String(s) if property.is_date_time() => conform_date_time(s, property),
            JsonValue::Number(n) => JsonValue::String(n.to_string()),
            JsonValue::Bool(b) => JsonValue::String(b.to_string()),
            nested @ (JsonValue::Array(_) | JsonValue::Object(_)) => {
                JsonValue::String(nested.to_string())
            }
            other => other,
        };
    }

    if property.has_type(&JsonType::Integer) || property.has_type(&JsonType::Number) {
        if let JsonValue::String(s) = &value {
            let trimmed = s.trim();
            if trimmed.is_empty() && property.is_nullable() {
                return JsonValue::Null;
            }
            if property.has_type(&JsonType::Integer) {
                if let Ok(i) = trimmed.parse::<i64>() {
                    return JsonValue::from(i);
                }
            }
            if let Some(n) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
                return JsonValue::Number(n);
            }
        }
        return value;
    }

    if property.has_type(&JsonType::Boolean) {
        if let JsonValue::String(s) = &value {
            match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => return JsonValue::Bool(true),
                "false" | "0" => return JsonValue::Bool(false),
                _ => {}
            }
        }
    }

    value
}

/// Normalize a timestamp string to RFC 3339 in UTC
fn conform_date_time(value: String, property: &SchemaProperty) -> JsonValue {
    if value.trim().is_empty() && property.is_nullable() {
        return JsonValue::Null;
    }
    match DateTime::parse_from_rfc3339(value.trim()) {
        Ok(dt) => JsonValue::String(dt.with_timezone(&Utc).to_rfc3339()),
        Err(_) => JsonValue::String(value),
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}
