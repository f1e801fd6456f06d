//! Stream definition types

use crate::config::TapConfig;
use crate::error::Result;
use crate::pagination::PaginationConfig;
use crate::schema::JsonSchema;
use crate::template;
use crate::types::{Context, JsonValue, ReplicationMethod};
use chrono::{DateTime, Utc};

/// Definition of one extractable stream
#[derive(Debug, Clone)]
pub struct StreamDefinition {
    /// Stream name (`tap_stream_id`)
    pub name: String,
    /// Path template relative to the base URL
    pub path: String,
    /// Primary key fields
    pub primary_keys: Vec<String>,
    /// Replication key (None = full table)
    pub replication_key: Option<String>,
    /// Response key that holds the records
    pub records_key: String,
    /// Parent stream that supplies the context
    pub parent: Option<String>,
    /// Default `load_relations` value (None = not sent)
    pub default_relations: Option<String>,
    /// Context keys that identify a bookmark partition
    pub state_partitioning_keys: Vec<String>,
    /// Child context fields: (context key, record field)
    pub child_context_fields: Vec<(String, String)>,
    /// Whether the request carries `limit`/`timeStamp`/`load_relations`
    pub sends_params: bool,
    /// Pagination strategy
    pub pagination: PaginationConfig,
    /// JSON schema
    pub schema: JsonSchema,
}

impl StreamDefinition {
    /// Create a root stream with no parameters and no pagination
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        records_key: impl Into<String>,
        schema: JsonSchema,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            primary_keys: Vec::new(),
            replication_key: None,
            records_key: records_key.into(),
            parent: None,
            default_relations: None,
            state_partitioning_keys: Vec::new(),
            child_context_fields: Vec::new(),
            sends_params: false,
            pagination: PaginationConfig::None,
            schema,
        }
    }

    /// Set the primary key
    #[must_use]
    pub fn with_primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_keys = vec![key.into()];
        self
    }

    /// Set the replication key (makes the stream incremental)
    #[must_use]
    pub fn with_replication_key(mut self, key: impl Into<String>) -> Self {
        self.replication_key = Some(key.into());
        self
    }

    /// Make this a child of `parent`, partitioned by `partition_keys`
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>, partition_keys: &[&str]) -> Self {
        self.parent = Some(parent.into());
        self.state_partitioning_keys = partition_keys.iter().map(ToString::to_string).collect();
        self
    }

    /// Send `limit`, the timestamp filter and `load_relations`; follow next links
    #[must_use]
    pub fn paged(mut self, relations: Option<&str>) -> Self {
        self.sends_params = true;
        self.default_relations = relations.map(ToString::to_string);
        self.pagination = PaginationConfig::lightspeed();
        self
    }

    /// Add a field copied from each record into the child context
    #[must_use]
    pub fn with_child_context(
        mut self,
        context_key: impl Into<String>,
        record_field: impl Into<String>,
    ) -> Self {
        self.child_context_fields
            .push((context_key.into(), record_field.into()));
        self
    }

    /// Replication method implied by the replication key
    pub fn replication_method(&self) -> ReplicationMethod {
        if self.replication_key.is_some() {
            ReplicationMethod::Incremental
        } else {
            ReplicationMethod::FullTable
        }
    }

    /// Whether this stream syncs incrementally
    pub fn is_incremental(&self) -> bool {
        self.replication_key.is_some()
    }

    /// The stream schema
    pub fn schema(&self) -> &JsonSchema {
        &self.schema
    }

    /// Effective `load_relations` value for this stream
    pub fn relations(&self, config: &TapConfig) -> Option<String> {
        config
            .relations_for(&self.name)
            .or_else(|| self.default_relations.clone())
    }

    /// Query parameters for a request
    ///
    /// `following_next` is true when the request URL is a next-page link,
    /// which already carries every parameter.
    pub fn request_params(
        &self,
        config: &TapConfig,
        start: Option<DateTime<Utc>>,
        following_next: bool,
    ) -> Vec<(String, String)> {
        if following_next || !self.sends_params {
            return Vec::new();
        }

        let mut params = vec![(
            "limit".to_string(),
            config.effective_page_size().to_string(),
        )];

        if let (Some(key), Some(start)) = (&self.replication_key, start) {
            params.push((key.clone(), format_timestamp_filter(start)));
        }

        if let Some(relations) = self.relations(config) {
            params.push(("load_relations".to_string(), relations));
        }

        params
    }

    /// Resolve the request path for a context
    pub fn render_path(&self, context: &Context) -> Result<String> {
        template::render(&self.path, context)
    }

    /// Context handed to child streams for a record of this stream
    ///
    /// Returns None when the stream has no children-facing fields or the
    /// record lacks every one of them.
    pub fn child_context(&self, record: &JsonValue) -> Option<Context> {
        if self.child_context_fields.is_empty() {
            return None;
        }

        let mut context = Context::new();
        for (context_key, record_field) in &self.child_context_fields {
            let value = record.get(record_field).cloned().unwrap_or(JsonValue::Null);
            context.insert(context_key.clone(), value);
        }

        if context.values().all(JsonValue::is_null) {
            return None;
        }
        Some(context)
    }

    /// Context that keys this stream's bookmark (None for root streams)
    pub fn partition_context(&self, context: &Context) -> Option<Context> {
        if self.state_partitioning_keys.is_empty() {
            return None;
        }

        let partition: Context = self
            .state_partitioning_keys
            .iter()
            .filter_map(|key| context.get(key).map(|v| (key.clone(), v.clone())))
            .collect();
        Some(partition)
    }

    /// Fields that are always synced: keys, replication key, context keys
    pub fn automatic_fields(&self, context_keys: &[String]) -> Vec<String> {
        let mut fields = self.primary_keys.clone();
        if let Some(key) = &self.replication_key {
            fields.push(key.clone());
        }
        for key in context_keys {
            if self.schema.get_property(key).is_some() && !fields.contains(key) {
                fields.push(key.clone());
            }
        }
        fields
    }
}

/// Lightspeed query filter: `>=,YYYY-MM-DDTHH:MM:SS-00:00` in UTC
pub fn format_timestamp_filter(start: DateTime<Utc>) -> String {
    format!(">=,{}", start.format("%Y-%m-%dT%H:%M:%S-00:00"))
}

/// Parse an RFC 3339 timestamp into UTC
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
