//! State types for tracking sync progress
//!
//! These types are serialized to JSON and round-trip through the loader.

use crate::types::{Context, JsonValue};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Note stored alongside progress markers
const PROGRESS_NOTE: &str = "Progress is not resumable if interrupted.";

/// Complete state for the tap
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream bookmarks
    #[serde(default)]
    pub bookmarks: BTreeMap<String, StreamState>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a stream
    pub fn get_stream(&self, stream: &str) -> Option<&StreamState> {
        self.bookmarks.get(stream)
    }

    /// Get mutable state for a stream, creating if needed
    pub fn get_stream_mut(&mut self, stream: &str) -> &mut StreamState {
        self.bookmarks.entry(stream.to_string()).or_default()
    }

    /// Bookmark entry for a stream and (optional) partition context
    pub fn bookmark(&self, stream: &str, context: Option<&Context>) -> Option<&PartitionState> {
        let stream_state = self.get_stream(stream)?;
        match context {
            None => Some(&stream_state.root),
            Some(ctx) => stream_state.get_partition(ctx),
        }
    }

    /// Mutable bookmark entry, creating stream and partition as needed
    pub fn bookmark_mut(&mut self, stream: &str, context: Option<&Context>) -> &mut PartitionState {
        let stream_state = self.get_stream_mut(stream);
        match context {
            None => &mut stream_state.root,
            Some(ctx) => stream_state.get_partition_mut(ctx),
        }
    }
}

/// State for a single stream
///
/// Root streams keep their bookmark inline; child streams keep one
/// entry per parent context under `partitions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamState {
    /// Bookmark of an unpartitioned stream
    #[serde(flatten)]
    pub root: PartitionState,

    /// Per-context bookmarks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partitions: Vec<PartitionState>,
}

impl StreamState {
    /// Create a new empty stream state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get partition state
    pub fn get_partition(&self, context: &Context) -> Option<&PartitionState> {
        self.partitions
            .iter()
            .find(|p| p.context.as_ref() == Some(context))
    }

    /// Get mutable partition state, creating if needed
    pub fn get_partition_mut(&mut self, context: &Context) -> &mut PartitionState {
        let index = match self
            .partitions
            .iter()
            .position(|p| p.context.as_ref() == Some(context))
        {
            Some(index) => index,
            None => {
                self.partitions.push(PartitionState::for_context(context.clone()));
                self.partitions.len() - 1
            }
        };
        &mut self.partitions[index]
    }
}

/// Bookmark for one stream or one partition of a stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionState {
    /// Parent context this bookmark belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,

    /// Field the bookmark tracks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,

    /// Highest value seen in a completed sync
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key_value: Option<JsonValue>,

    /// Highest value seen in the sync in progress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_markers: Option<ProgressMarkers>,
}

impl PartitionState {
    /// Create a new empty partition state
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty bookmark for a context
    pub fn for_context(context: Context) -> Self {
        Self {
            context: Some(context),
            ..Self::default()
        }
    }

    /// Bookmark value as a string (numbers are stringified)
    pub fn value_str(&self) -> Option<String> {
        match self.replication_key_value.as_ref()? {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Record a newly seen value in the progress markers
    ///
    /// Returns true when the marker moved.
    pub fn advance(&mut self, replication_key: &str, value: &str) -> bool {
        let current = self
            .progress_markers
            .as_ref()
            .filter(|m| m.replication_key == replication_key)
            .map(|m| m.value_str())
            .or_else(|| self.value_str());

        if let Some(current) = current {
            if !is_newer(value, &current) {
                return false;
            }
        }

        self.progress_markers = Some(ProgressMarkers::new(replication_key, value));
        true
    }

    /// Promote the progress marker to the committed bookmark
    pub fn finalize(&mut self) {
        if let Some(markers) = self.progress_markers.take() {
            self.replication_key = Some(markers.replication_key);
            self.replication_key_value = Some(markers.replication_key_value);
        }
    }
}

/// Provisional bookmark kept while a partition is being read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressMarkers {
    /// Field the marker tracks
    pub replication_key: String,
    /// Highest value seen so far
    pub replication_key_value: JsonValue,
    /// Human-readable warning for anyone reading the state
    #[serde(rename = "Note", default)]
    pub note: String,
}

impl ProgressMarkers {
    /// Create a progress marker
    pub fn new(replication_key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            replication_key: replication_key.into(),
            replication_key_value: JsonValue::String(value.into()),
            note: PROGRESS_NOTE.to_string(),
        }
    }

    fn value_str(&self) -> String {
        match &self.replication_key_value {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Whether `candidate` sorts after `current`
///
/// Values that both parse as RFC 3339 timestamps are compared as instants,
/// anything else falls back to string order.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    let ordering = match (
        DateTime::parse_from_rfc3339(candidate),
        DateTime::parse_from_rfc3339(current),
    ) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => candidate.cmp(current),
    };
    ordering == Ordering::Greater
}
