//! Execution engine module
//!
//! Main read loop and stream orchestration.
//!
//! # Overview
//!
//! The engine module provides:
//! - `SyncEngine` - Runs the sync plan: fetch, transform, emit, checkpoint
//! - `SyncConfig` - Configuration for sync operations
//! - `SyncStats` - Counters reported at the end of a run
//!
//! For each planned stream the engine walks its partitions (one for a root
//! stream, one per parent context for a child stream), pages through the
//! API, writes `RECORD` messages and checkpoints the bookmark with a
//! `STATE` message after every page. A final `STATE` is always written,
//! also when the run fails.

mod types;

pub use types::{SyncConfig, SyncStats};

use crate::catalog::Catalog;
use crate::config::TapConfig;
use crate::error::Result;
use crate::http::HttpClient;
use crate::output::MessageWriter;
use crate::pagination::{NextPage, PaginationState};
use crate::scheduler::{self, PlannedStream};
use crate::schema::JsonSchema;
use crate::state::StateManager;
use crate::streams::{parse_timestamp, StreamDefinition, StreamRegistry};
use crate::transform::{extract_records, RecordTransformer};
use crate::types::{Context, JsonValue};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io::Write;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Sync engine for orchestrating data extraction
pub struct SyncEngine<W: Write> {
    /// HTTP client
    client: HttpClient,
    /// Available streams
    registry: StreamRegistry,
    /// Selection
    catalog: Catalog,
    /// Tap configuration
    tap_config: TapConfig,
    /// State manager
    state: StateManager,
    /// Protocol output
    writer: MessageWriter<W>,
    /// Sync configuration
    config: SyncConfig,
    /// Statistics
    stats: SyncStats,
}

/// Everything fixed for one stream while its partitions are synced
struct StreamRun<'a> {
    stream: &'a StreamDefinition,
    transformer: RecordTransformer,
    emit: bool,
    collect_children: bool,
    start_date: Option<DateTime<Utc>>,
}

impl<W: Write> SyncEngine<W> {
    /// Create a new sync engine
    pub fn new(
        client: HttpClient,
        registry: StreamRegistry,
        catalog: Catalog,
        tap_config: TapConfig,
        state: StateManager,
        writer: MessageWriter<W>,
    ) -> Self {
        Self {
            client,
            registry,
            catalog,
            tap_config,
            state,
            writer,
            config: SyncConfig::default(),
            stats: SyncStats::default(),
        }
    }

    /// Set sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Get statistics
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Get the message writer
    pub fn writer(&self) -> &MessageWriter<W> {
        &self.writer
    }

    /// Consume the engine, returning the message writer
    pub fn into_writer(self) -> MessageWriter<W> {
        self.writer
    }

    /// Run the sync
    ///
    /// The first error aborts the run. The state earned so far is still
    /// written as a final `STATE` message before the error is returned.
    pub async fn run(&mut self) -> Result<SyncStats> {
        let start = Instant::now();

        let result = self.sync_all().await;
        if let Err(e) = &result {
            self.stats.add_error();
            error!("Sync aborted: {e}");
        }

        let final_state = self.emit_state().await;
        self.stats
            .set_duration(start.elapsed().as_millis() as u64);

        result?;
        final_state?;

        info!(
            "Sync complete: {} records, {} pages, {} streams, {} partitions in {}ms",
            self.stats.records_synced,
            self.stats.pages_fetched,
            self.stats.streams_synced,
            self.stats.partitions_synced,
            self.stats.duration_ms
        );
        Ok(self.stats.clone())
    }

    async fn sync_all(&mut self) -> Result<()> {
        let plan = scheduler::plan(&self.registry, &self.catalog)?;
        if plan.is_empty() {
            warn!("No streams selected, nothing to sync");
            return Ok(());
        }

        let start_date = self.tap_config.start_date()?;
        let registry = self.registry.clone();
        let mut contexts: HashMap<String, Vec<Context>> = HashMap::new();

        for planned in &plan {
            let stream = registry.require(&planned.name)?;
            let partitions: Vec<Option<Context>> = match &stream.parent {
                None => vec![None],
                Some(parent) => contexts
                    .get(parent)
                    .map(|c| c.iter().cloned().map(Some).collect())
                    .unwrap_or_default(),
            };

            let run = StreamRun {
                stream,
                transformer: self.transformer_for(stream),
                emit: planned.emit,
                collect_children: has_children(&registry, &plan, &stream.name),
                start_date,
            };

            info!(
                "Syncing stream '{}' ({} partition(s){})",
                stream.name,
                partitions.len(),
                if run.emit { "" } else { ", contexts only" }
            );

            if run.emit {
                self.write_schema(&run)?;
            }

            let mut children = Vec::new();
            let mut logged_full_sync = false;
            for context in &partitions {
                let produced = self
                    .sync_partition(&run, context.as_ref(), &mut logged_full_sync)
                    .await?;
                children.extend(produced);
            }

            if run.collect_children {
                debug!(
                    "Stream '{}' produced {} child context(s)",
                    stream.name,
                    children.len()
                );
                contexts.insert(stream.name.clone(), children);
            }
            self.stats.add_stream();
        }

        self.state.finalize_all().await;
        Ok(())
    }

    /// Sync one partition; returns the child contexts its records produce
    async fn sync_partition(
        &mut self,
        run: &StreamRun<'_>,
        context: Option<&Context>,
        logged_full_sync: &mut bool,
    ) -> Result<Vec<Context>> {
        let stream = run.stream;
        let partition = context.and_then(|c| stream.partition_context(c));
        let bookmark_ctx = partition.as_ref();

        self.state.reset_progress(&stream.name, bookmark_ctx).await;
        let start = self
            .start_value(stream, bookmark_ctx, run.start_date)
            .await;
        if stream.is_incremental() && start.is_none() && !*logged_full_sync {
            info!(
                "Stream '{}' has no bookmark and no start_date, syncing everything",
                stream.name
            );
            *logged_full_sync = true;
        }

        let empty = Context::new();
        let mut url = stream.render_path(context.unwrap_or(&empty))?;
        let paginator = stream.pagination.build();
        let mut pagination = PaginationState::new();
        let mut following_next = false;
        let mut children = Vec::new();

        loop {
            let params = stream.request_params(&self.tap_config, start, following_next);
            let response = self.client.get_page(&url, &params).await?;
            self.stats.add_page();

            let body = response.json()?;
            let records = extract_records(&body, &stream.records_key)?;
            let count = records.len();
            let extracted_at = Utc::now();

            for raw in records {
                if run.collect_children {
                    if let Some(child) = stream.child_context(&raw) {
                        if self.context_allowed(&child) {
                            children.push(child);
                        }
                    }
                }

                let record = run.transformer.transform(raw, context)?;

                if let Some(key) = &stream.replication_key {
                    if let Some(value) = record.get(key).and_then(replication_value) {
                        self.state
                            .advance(&stream.name, bookmark_ctx, key, &value)
                            .await;
                    }
                }

                if run.emit {
                    self.writer
                        .write_record(&stream.name, JsonValue::Object(record), extracted_at)?;
                }
            }

            if run.emit {
                self.stats.add_records(count);
            }
            debug!(
                "Stream '{}': page {} with {count} record(s)",
                stream.name,
                pagination.page + 1
            );

            if run.emit && self.config.emit_state_per_page {
                self.emit_state().await?;
            }

            match paginator.process_response(&body, &response.headers, count, &mut pagination)? {
                NextPage::Url(next) => {
                    url = next;
                    following_next = true;
                }
                NextPage::Done => break,
            }
        }

        self.state.finalize(&stream.name, bookmark_ctx).await;
        self.stats.add_partition();
        Ok(children)
    }

    /// Incremental start: bookmark for the partition, else `start_date`
    async fn start_value(
        &self,
        stream: &StreamDefinition,
        bookmark_ctx: Option<&Context>,
        start_date: Option<DateTime<Utc>>,
    ) -> Option<DateTime<Utc>> {
        let key = stream.replication_key.as_deref()?;
        match self.state.starting_value(&stream.name, bookmark_ctx, key).await {
            Some(value) => match parse_timestamp(&value) {
                Some(ts) => {
                    debug!("Stream '{}' resumes from bookmark {value}", stream.name);
                    Some(ts)
                }
                None => {
                    warn!(
                        "Stream '{}' has an unparseable bookmark '{value}', ignoring it",
                        stream.name
                    );
                    start_date
                }
            },
            None => start_date,
        }
    }

    fn transformer_for(&self, stream: &StreamDefinition) -> RecordTransformer {
        let schema = self.stream_schema(stream);
        let deselected = self.catalog.deselected_properties(&stream.name);
        RecordTransformer::new(&stream.name, schema).with_deselected(deselected)
    }

    /// Schema to sync with: the catalog's, minus deselected properties
    fn stream_schema(&self, stream: &StreamDefinition) -> JsonSchema {
        let mut schema = self
            .catalog
            .get(&stream.name)
            .map_or_else(|| stream.schema.clone(), |entry| entry.schema_or(&stream.schema));
        for field in self.catalog.deselected_properties(&stream.name) {
            schema.properties.remove(&field);
            schema.required.retain(|r| r != &field);
        }
        schema
    }

    fn write_schema(&mut self, run: &StreamRun<'_>) -> Result<()> {
        let stream = run.stream;
        let schema = self.stream_schema(stream).to_json();
        self.writer.write_schema(
            &stream.name,
            schema,
            stream.primary_keys.clone(),
            stream.replication_key.as_deref(),
        )
    }

    /// Whether a child context passes the `account_id` filter
    fn context_allowed(&self, context: &Context) -> bool {
        let Some(wanted) = self.tap_config.account_id.as_deref() else {
            return true;
        };
        let allowed = context
            .get("accountID")
            .and_then(replication_value)
            .is_some_and(|id| id == wanted);
        if !allowed {
            debug!("Skipping context {context:?}: account_id is {wanted}");
        }
        allowed
    }

    async fn emit_state(&mut self) -> Result<()> {
        let snapshot = self.state.snapshot().await?;
        self.writer.write_state(snapshot)
    }
}

impl<W: Write> std::fmt::Debug for SyncEngine<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("streams", &self.registry.names())
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Whether any planned stream is a child of `name`
fn has_children(registry: &StreamRegistry, plan: &[PlannedStream], name: &str) -> bool {
    plan.iter().any(|p| {
        registry
            .get(&p.name)
            .and_then(|s| s.parent.as_deref())
            == Some(name)
    })
}

/// Replication or id value as a string
fn replication_value(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
