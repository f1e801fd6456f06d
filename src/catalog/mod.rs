//! Catalog module
//!
//! Builds the discovery catalog from the stream registry and reads
//! selection metadata back from a user-edited catalog.
//!
//! # Selection rules
//!
//! - A stream is selected when its stream-level `selected` metadata is
//!   true, or when `selected` is absent and `selected-by-default` is true.
//! - A property with `inclusion: automatic` is always synced.
//! - A property with `selected: false` (or `inclusion: unsupported`) is
//!   dropped from every record.

mod types;

pub use types::{Catalog, CatalogEntry, MetadataEntry};
