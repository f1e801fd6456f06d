//! Output module
//!
//! Serializes Singer protocol messages to newline-delimited JSON.
//!
//! # Overview
//!
//! This module provides:
//! - `Message` - the `SCHEMA`, `RECORD` and `STATE` message shapes
//! - `MessageWriter` - writes messages in protocol order to any `Write`

mod types;
mod writer;

pub use types::Message;
pub use writer::MessageWriter;

#[cfg(test)]
mod tests;
