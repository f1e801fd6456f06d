//! State manager implementation
//!
//! Wraps the bookmark document behind a lock so the engine, the emitter and
//! the final abort path all see the same state.

use super::types::State;
use crate::error::{Error, Result};
use crate::types::{Context, JsonValue};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// State manager for loading and updating bookmarks
///
/// Clones share the same state.
#[derive(Debug, Clone)]
pub struct StateManager {
    state: Arc<RwLock<State>>,
}

impl StateManager {
    /// Create an in-memory state manager (no input state)
    pub fn in_memory() -> Self {
        Self::with_state(State::new())
    }

    fn with_state(state: State) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Create a state manager from a file, loading existing state if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            if contents.trim().is_empty() {
                State::new()
            } else {
                serde_json::from_str(&contents)
                    .map_err(|e| Error::state(format!("Failed to parse state file: {e}")))?
            }
        } else {
            warn!("State file {} not found, starting from scratch", path.display());
            State::new()
        };

        Ok(Self::with_state(state))
    }

    /// Create a state manager from inline JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let state: State = serde_json::from_str(json)
            .map_err(|e| Error::state(format!("Failed to parse state JSON: {e}")))?;
        Ok(Self::with_state(state))
    }

    /// Committed bookmark for a stream/context, if any
    ///
    /// Only a bookmark recorded under `replication_key` counts; leftover
    /// progress markers from an interrupted run are ignored.
    pub async fn starting_value(
        &self,
        stream: &str,
        context: Option<&Context>,
        replication_key: &str,
    ) -> Option<String> {
        let state = self.state.read().await;
        let bookmark = state.bookmark(stream, context)?;
        match bookmark.replication_key.as_deref() {
            Some(key) if key != replication_key => {
                debug!("Ignoring bookmark for '{stream}' tracked on '{key}'");
                None
            }
            _ => bookmark.value_str(),
        }
    }

    /// Drop stale progress markers before a partition starts
    pub async fn reset_progress(&self, stream: &str, context: Option<&Context>) {
        let mut state = self.state.write().await;
        if let Some(stream_state) = state.bookmarks.get_mut(stream) {
            let bookmark = match context {
                None => Some(&mut stream_state.root),
                Some(ctx) => stream_state
                    .partitions
                    .iter_mut()
                    .find(|p| p.context.as_ref() == Some(ctx)),
            };
            if let Some(bookmark) = bookmark {
                bookmark.progress_markers = None;
            }
        }
    }

    /// Record a replication value seen during the sync
    ///
    /// Returns true when the progress marker moved forward.
    pub async fn advance(
        &self,
        stream: &str,
        context: Option<&Context>,
        replication_key: &str,
        value: &str,
    ) -> bool {
        let mut state = self.state.write().await;
        state
            .bookmark_mut(stream, context)
            .advance(replication_key, value)
    }

    /// Promote the progress marker of a finished partition
    pub async fn finalize(&self, stream: &str, context: Option<&Context>) {
        let mut state = self.state.write().await;
        if state.bookmark(stream, context).is_some() {
            state.bookmark_mut(stream, context).finalize();
        }
    }

    /// Promote every outstanding progress marker
    pub async fn finalize_all(&self) {
        let mut state = self.state.write().await;
        for stream_state in state.bookmarks.values_mut() {
            stream_state.root.finalize();
            for partition in &mut stream_state.partitions {
                partition.finalize();
            }
        }
    }

    /// Current state as JSON, ready for a `STATE` message
    pub async fn snapshot(&self) -> Result<JsonValue> {
        let state = self.state.read().await;
        serde_json::to_value(&*state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }
}
