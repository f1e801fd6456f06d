//! Newline-delimited JSON message writer

use super::types::Message;
use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::types::JsonValue;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::io::{self, BufWriter, Stdout, Write};

/// Writes protocol messages, one JSON object per line
///
/// A stream's `SCHEMA` must be written before its first `RECORD`. Output
/// is flushed after every `STATE` so a checkpoint never sits in a buffer
/// behind the records it covers.
pub struct MessageWriter<W: Write> {
    out: W,
    /// Streams whose SCHEMA has been written
    schemas: HashSet<String>,
    /// Records written per stream
    record_counts: HashMap<String, usize>,
    /// STATE messages written
    states_written: usize,
}

impl MessageWriter<BufWriter<Stdout>> {
    /// Writer on buffered standard output
    pub fn stdout() -> Self {
        Self::new(BufWriter::new(io::stdout()))
    }
}

impl<W: Write> MessageWriter<W> {
    /// Wrap any writer
    pub fn new(out: W) -> Self {
        Self {
            out,
            schemas: HashSet::new(),
            record_counts: HashMap::new(),
            states_written: 0,
        }
    }

    /// Write a `SCHEMA` message
    pub fn write_schema(
        &mut self,
        stream: &str,
        schema: JsonValue,
        key_properties: Vec<String>,
        replication_key: Option<&str>,
    ) -> Result<()> {
        let message = Message::schema(stream, schema, key_properties, replication_key);
        self.write_message(&message)?;
        self.schemas.insert(stream.to_string());
        Ok(())
    }

    /// Write a `RECORD` message
    pub fn write_record(
        &mut self,
        stream: &str,
        record: JsonValue,
        time_extracted: DateTime<Utc>,
    ) -> Result<()> {
        if !self.schemas.contains(stream) {
            return Err(Error::output(format!(
                "RECORD for stream '{stream}' written before its SCHEMA"
            )));
        }
        self.write_message(&Message::record(stream, record, time_extracted))?;
        *self.record_counts.entry(stream.to_string()).or_default() += 1;
        Ok(())
    }

    /// Write a `STATE` message and flush
    pub fn write_state(&mut self, value: JsonValue) -> Result<()> {
        self.write_message(&Message::state(value))?;
        self.flush()?;
        self.states_written += 1;
        Ok(())
    }

    /// Write a catalog document (discovery mode)
    pub fn write_catalog(&mut self, catalog: &Catalog) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.out, catalog)?;
        self.out.write_all(b"\n")?;
        self.flush()
    }

    /// Write any message as one line
    pub fn write_message(&mut self, message: &Message) -> Result<()> {
        serde_json::to_writer(&mut self.out, message)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    /// Flush the underlying writer
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Whether the SCHEMA of `stream` has been written
    pub fn has_schema(&self, stream: &str) -> bool {
        self.schemas.contains(stream)
    }

    /// Records written for `stream`
    pub fn record_count(&self, stream: &str) -> usize {
        self.record_counts.get(stream).copied().unwrap_or(0)
    }

    /// STATE messages written
    pub fn states_written(&self) -> usize {
        self.states_written
    }

    /// Get a reference to the underlying writer
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Consume the writer, returning the underlying output
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> std::fmt::Debug for MessageWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageWriter")
            .field("schemas", &self.schemas)
            .field("record_counts", &self.record_counts)
            .field("states_written", &self.states_written)
            .finish_non_exhaustive()
    }
}
