//! Record transformation module
//!
//! Turns a decoded API page into records that match the stream schema.
//!
//! # Overview
//!
//! - `extract_records` - pulls records out of the response envelope
//! - `RecordTransformer` - injects parent context, conforms values to the
//!   schema, drops deselected fields and checks required ones

mod conform;
mod extract;

pub use conform::RecordTransformer;
pub use extract::extract_records;

#[cfg(test)]
mod tests;
