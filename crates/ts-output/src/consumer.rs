//! `OutputConsumer<W>`: runs an `OutputWriter` as a buffer consumer.

use tracing::debug;

use ts_collect::{SinkError, TickConsumer, TickSnapshot};
use ts_core::{SimClock, SimConfig};

use crate::writer::OutputWriter;

/// A [`TickConsumer`] that hands every sealed tick to an [`OutputWriter`].
///
/// Write errors stop this consumer only; they surface when its handle is
/// joined.
pub struct OutputConsumer<W: OutputWriter> {
    name:         String,
    writer:       W,
    clock:        SimClock,
    placeholders: bool,
    written:      u64,
}

impl<W: OutputWriter> OutputConsumer<W> {
    /// Create a consumer backed by `writer`, using `config` for wall-clock
    /// conversion.
    pub fn new(name: impl Into<String>, writer: W, config: &SimConfig) -> Self {
        Self {
            name: name.into(),
            writer,
            clock: config.make_clock(),
            placeholders: false,
            written: 0,
        }
    }

    /// Also write empty ticks (summary rows of zeros).
    pub fn with_placeholders(mut self, on: bool) -> Self {
        self.placeholders = on;
        self
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Unwrap the inner writer (e.g. to inspect files after the run).
    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<W: OutputWriter + 'static> TickConsumer for OutputConsumer<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn consume(&mut self, snapshot: &TickSnapshot) -> Result<(), SinkError> {
        let unix = self.clock.unix_secs_at(snapshot.tick());
        self.writer.write_tick(snapshot, unix)?;
        self.written += 1;
        Ok(())
    }

    fn wants_placeholders(&self) -> bool {
        self.placeholders
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.writer.finish()?;
        debug!(consumer = %self.name, written = self.written, "output closed");
        Ok(())
    }
}
