//! Catalog types

use crate::error::{Error, Result, ResultExt};
use crate::schema::JsonSchema;
use crate::streams::{StreamDefinition, StreamRegistry};
use crate::types::{JsonObject, JsonValue, ReplicationMethod};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use tracing::debug;

const INCLUSION: &str = "inclusion";
const SELECTED: &str = "selected";
const SELECTED_BY_DEFAULT: &str = "selected-by-default";

/// The set of streams a tap can extract
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Catalog entries
    #[serde(default)]
    pub streams: Vec<CatalogEntry>,
}

/// One stream in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stream identifier
    pub tap_stream_id: String,
    /// Stream name
    #[serde(default)]
    pub stream: String,
    /// JSON schema
    #[serde(default)]
    pub schema: JsonValue,
    /// Primary key fields
    #[serde(default)]
    pub key_properties: Vec<String>,
    /// Replication key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,
    /// Replication method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_method: Option<ReplicationMethod>,
    /// Selection and inclusion metadata
    #[serde(default)]
    pub metadata: Vec<MetadataEntry>,
}

/// Metadata attached to a breadcrumb (`[]` = the stream itself)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Path to the node: `[]` or `["properties", "<name>"]`
    #[serde(default)]
    pub breadcrumb: Vec<String>,
    /// Metadata values
    #[serde(default)]
    pub metadata: JsonObject,
}

impl MetadataEntry {
    fn new(breadcrumb: Vec<String>, metadata: JsonValue) -> Self {
        Self {
            breadcrumb,
            metadata: metadata.as_object().cloned().unwrap_or_default(),
        }
    }

    fn flag(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).and_then(JsonValue::as_bool)
    }

    fn inclusion(&self) -> Option<&str> {
        self.metadata.get(INCLUSION).and_then(JsonValue::as_str)
    }
}

impl Catalog {
    /// Build the discovery catalog: every stream, everything selected
    pub fn discover(registry: &StreamRegistry) -> Self {
        let streams = registry
            .streams()
            .iter()
            .map(|stream| CatalogEntry::discover(stream, &registry.context_keys(stream)))
            .collect();
        Self { streams }
    }

    /// Read a catalog file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        let value: JsonValue = serde_json::from_str(&contents)
            .map_err(|e| Error::config(format!("Invalid catalog JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Parse a catalog from JSON
    pub fn from_value(value: JsonValue) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::config(format!("Invalid catalog: {e}")))
    }

    /// Look up an entry by stream id
    pub fn get(&self, stream: &str) -> Option<&CatalogEntry> {
        self.streams.iter().find(|e| e.tap_stream_id == stream)
    }

    /// Ids of the selected streams, in catalog order
    pub fn selected_streams(&self) -> Vec<&str> {
        self.streams
            .iter()
            .filter(|e| e.is_selected())
            .map(|e| e.tap_stream_id.as_str())
            .collect()
    }

    /// Whether a stream is selected (unknown streams are not)
    pub fn is_selected(&self, stream: &str) -> bool {
        self.get(stream).is_some_and(CatalogEntry::is_selected)
    }

    /// Top-level properties of a stream that must be dropped
    pub fn deselected_properties(&self, stream: &str) -> Vec<String> {
        self.get(stream)
            .map(CatalogEntry::deselected_properties)
            .unwrap_or_default()
    }
}

impl CatalogEntry {
    /// Discovery entry for one stream
    pub fn discover(stream: &StreamDefinition, context_keys: &[String]) -> Self {
        let automatic = stream.automatic_fields(context_keys);

        let mut stream_metadata = json!({
            "inclusion": "available",
            "selected": true,
            "selected-by-default": true,
            "table-key-properties": stream.primary_keys,
            "forced-replication-method": stream.replication_method().as_str(),
        });
        if let Some(key) = &stream.replication_key {
            stream_metadata["valid-replication-keys"] = json!([key]);
        }
        if let Some(parent) = &stream.parent {
            stream_metadata["parent-tap-stream-id"] = json!(parent);
        }

        let mut metadata = vec![MetadataEntry::new(Vec::new(), stream_metadata)];
        for name in stream.schema.property_names() {
            let inclusion = if automatic.iter().any(|f| f == name) {
                "automatic"
            } else {
                "available"
            };
            metadata.push(MetadataEntry::new(
                vec!["properties".to_string(), name.to_string()],
                json!({ "inclusion": inclusion, "selected-by-default": true }),
            ));
        }

        Self {
            tap_stream_id: stream.name.clone(),
            stream: stream.name.clone(),
            schema: stream.schema.to_json(),
            key_properties: stream.primary_keys.clone(),
            replication_key: stream.replication_key.clone(),
            replication_method: Some(stream.replication_method()),
            metadata,
        }
    }

    /// Stream-level metadata
    pub fn stream_metadata(&self) -> Option<&MetadataEntry> {
        self.metadata.iter().find(|m| m.breadcrumb.is_empty())
    }

    /// Metadata of a top-level property
    pub fn property_metadata(&self, name: &str) -> Option<&MetadataEntry> {
        self.metadata.iter().find(|m| {
            m.breadcrumb.len() == 2 && m.breadcrumb[0] == "properties" && m.breadcrumb[1] == name
        })
    }

    /// Whether the stream is selected
    pub fn is_selected(&self) -> bool {
        let Some(meta) = self.stream_metadata() else {
            return false;
        };
        meta.flag(SELECTED)
            .or_else(|| meta.flag(SELECTED_BY_DEFAULT))
            .unwrap_or(false)
    }

    /// Top-level properties excluded by their metadata
    pub fn deselected_properties(&self) -> Vec<String> {
        self.metadata
            .iter()
            .filter(|m| m.breadcrumb.len() == 2 && m.breadcrumb[0] == "properties")
            .filter(|m| match m.inclusion() {
                Some("automatic") => false,
                Some("unsupported") => true,
                _ => !m
                    .flag(SELECTED)
                    .or_else(|| m.flag(SELECTED_BY_DEFAULT))
                    .unwrap_or(true),
            })
            .map(|m| m.breadcrumb[1].clone())
            .collect()
    }

    /// Parse the entry schema
    pub fn json_schema(&self) -> Result<JsonSchema> {
        serde_json::from_value(self.schema.clone()).map_err(|e| {
            Error::schema(
                &self.tap_stream_id,
                format!("Catalog schema is invalid: {e}"),
            )
        })
    }

    /// Schema to sync with: the catalog's own, else `fallback`
    pub fn schema_or(&self, fallback: &JsonSchema) -> JsonSchema {
        if self.schema.as_object().is_some_and(|s| s.contains_key("properties")) {
            match self.json_schema() {
                Ok(schema) => return schema,
                Err(e) => debug!("{e}; using the built-in schema"),
            }
        }
        fallback.clone()
    }
}
