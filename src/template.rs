//! Path template interpolation
//!
//! Handles `{variable}` placeholders in stream paths such as
//! `/Account/{accountID}/Sale.json`, filled from the parent context.

use crate::error::{Error, Result};
use crate::types::Context;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use url::Url;

/// Regex for matching path placeholders: {accountID}
static TEMPLATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*\}").unwrap());

/// Render a path template with the given context
///
/// Values are percent-encoded as single path segments. Every undefined
/// variable is reported in one `UndefinedVariable` error.
pub fn render(template: &str, ctx: &Context) -> Result<String> {
    let mut errors = Vec::new();

    let rendered = TEMPLATE_REGEX.replace_all(template, |cap: &regex::Captures<'_>| {
        let name = &cap[1];
        match ctx.get(name).filter(|v| !v.is_null()) {
            Some(value) => encode_segment(&value_to_string(value)),
            None => {
                errors.push(name.to_string());
                String::new()
            }
        }
    });

    if errors.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::undefined_var(errors.join(", ")))
    }
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        // For complex types, use JSON serialization
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Percent-encode a value as one path segment
fn encode_segment(value: &str) -> String {
    let Ok(mut url) = Url::parse("http://localhost/") else {
        return value.to_string();
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear().push(value);
    }
    url.path().trim_start_matches('/').to_string()
}
