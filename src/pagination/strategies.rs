//! Pagination strategy implementations

use super::types::{lookup_path, NextPage, PaginationState, Paginator};
use crate::error::{Error, Result};
use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::debug;

// ============================================================================
// Next URL Pagination
// ============================================================================

/// Next URL pagination (URL in response body)
///
/// Extracts the next page URL from a field in the response body, e.g.
/// `{ "@attributes": { "next": "https://api.lightspeedapp.com/...&after=abc" } }`.
/// A missing, null or empty value ends pagination.
#[derive(Debug, Clone)]
pub struct NextUrlPaginator {
    /// Dotted path to the next URL
    pub path: String,
}

impl NextUrlPaginator {
    /// Create a new next URL paginator
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Paginator for NextUrlPaginator {
    fn process_response(
        &self,
        body: &Value,
        _headers: &HeaderMap,
        records_count: usize,
        state: &mut PaginationState,
    ) -> Result<NextPage> {
        state.add_fetched(records_count as u64);
        state.next_page();

        let next_url = lookup_path(body, &self.path)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let Some(next_url) = next_url else {
            state.mark_done();
            return Ok(NextPage::Done);
        };

        if state.previous_token.as_deref() == Some(next_url) {
            return Err(Error::PaginationLoop {
                token: next_url.to_string(),
            });
        }

        debug!("Following next page link (page {})", state.page + 1);
        state.set_token(next_url.to_string());
        Ok(NextPage::with_url(next_url))
    }
}

// ============================================================================
// No Pagination
// ============================================================================

/// No pagination - single request
#[derive(Debug, Clone, Default)]
pub struct NoPaginator;

impl Paginator for NoPaginator {
    fn process_response(
        &self,
        _body: &Value,
        _headers: &HeaderMap,
        records_count: usize,
        state: &mut PaginationState,
    ) -> Result<NextPage> {
        state.add_fetched(records_count as u64);
        state.next_page();
        state.mark_done();
        Ok(NextPage::Done)
    }
}
