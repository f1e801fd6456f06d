//! Stream definitions
//!
//! Describes every extractable Lightspeed resource: where it lives, how it
//! is keyed, how it is paged and which parent context it needs.
//!
//! # Overview
//!
//! - `StreamDefinition` - path, keys, envelope, relations and schema of one stream
//! - `StreamRegistry` - the ordered set of streams the tap knows about

mod registry;
mod types;

pub use registry::StreamRegistry;
pub use types::{format_timestamp_filter, parse_timestamp, StreamDefinition};

#[cfg(test)]
mod tests;
