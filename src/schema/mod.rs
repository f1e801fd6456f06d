//! Stream schema module
//!
//! JSON Schema documents for every stream, embedded at compile time, and
//! the typed view of them used by the record transformer.
//!
//! # Features
//!
//! - **Embedded Schemas**: `schemas/<stream>.json` compiled into the binary
//! - **Nullable Types**: `["string", "null"]` style type unions
//! - **Format Hints**: `date-time` fields are normalized to RFC 3339

mod embedded;
mod types;

pub use embedded::{embedded_schema, EMBEDDED_STREAMS};
pub use types::{JsonSchema, JsonType, JsonTypeOrArray, SchemaProperty};
