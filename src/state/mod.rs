//! State management module
//!
//! Handles bookmark tracking and resumability.
//! State is read at startup and emitted as `STATE` messages so that a
//! downstream loader can persist it between runs.
//!
//! # Overview
//!
//! The state module provides:
//! - `State` - Singer bookmark document with per-stream and per-partition entries
//! - `StateManager` - shared, lock-protected access used by the sync engine
//! - Progress markers for streams whose records arrive unsorted

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{is_newer, PartitionState, ProgressMarkers, State, StreamState};
