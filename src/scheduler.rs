//! Stream scheduling
//!
//! Orders the selected streams so every parent is synced before its
//! children, pulling in unselected parents whose records are only needed
//! to produce child contexts.

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::streams::StreamRegistry;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// A stream in the sync plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStream {
    /// Stream name
    pub name: String,
    /// Whether records are emitted (false = fetched for child contexts only)
    pub emit: bool,
}

impl PlannedStream {
    fn new(name: &str, emit: bool) -> Self {
        Self {
            name: name.to_string(),
            emit,
        }
    }
}

/// Build the sync plan for the selected streams
///
/// Parents come before children; ties keep registry order. Selected streams
/// missing from the registry are skipped with a warning.
pub fn plan(registry: &StreamRegistry, catalog: &Catalog) -> Result<Vec<PlannedStream>> {
    let mut emit: HashMap<&str, bool> = HashMap::new();

    for name in catalog.selected_streams() {
        if registry.get(name).is_none() {
            warn!("Selected stream '{name}' is not provided by this tap, skipping");
            continue;
        }
        emit.insert(name, true);

        let mut chain = HashSet::from([name]);
        let mut current = name;
        while let Some(parent) = registry.get(current).and_then(|s| s.parent.as_deref()) {
            if registry.get(parent).is_none() {
                return Err(Error::config(format!(
                    "Stream '{current}' has unknown parent '{parent}'"
                )));
            }
            if !chain.insert(parent) {
                let mut streams: Vec<&str> = chain.into_iter().collect();
                streams.sort_unstable();
                return Err(Error::DependencyCycle {
                    streams: streams.join(", "),
                });
            }
            emit.entry(parent).or_insert(false);
            current = parent;
        }
    }

    let mut pending: Vec<&str> = registry
        .names()
        .into_iter()
        .filter(|name| emit.contains_key(name))
        .collect();
    let mut placed: HashSet<&str> = HashSet::new();
    let mut ordered = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let ready = pending.iter().position(|name| {
            registry
                .get(name)
                .and_then(|s| s.parent.as_deref())
                .map_or(true, |parent| placed.contains(parent))
        });

        let Some(index) = ready else {
            return Err(Error::DependencyCycle {
                streams: pending.join(", "),
            });
        };

        let name = pending.remove(index);
        placed.insert(name);
        let emits = emit.get(name).copied().unwrap_or(false);
        if !emits {
            debug!("Stream '{name}' is synced only to provide child contexts");
        }
        ordered.push(PlannedStream::new(name, emits));
    }

    Ok(ordered)
}
