//! Pagination module
//!
//! Supports: Next URL (Lightspeed `@attributes.next`) and single-request streams
//!
//! # Overview
//!
//! A paginator looks at each decoded response and decides whether another
//! page follows. Next-page URLs are followed verbatim; the query string the
//! API hands back already carries the limit, filters and relations. A next
//! token identical to the one just followed is treated as a server-side loop.

mod strategies;
mod types;

pub use strategies::{NextUrlPaginator, NoPaginator};
pub use types::{lookup_path, NextPage, PaginationConfig, PaginationState, Paginator};
