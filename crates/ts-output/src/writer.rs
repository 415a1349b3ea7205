//! The `OutputWriter` trait implemented by all backend writers.

use ts_collect::TickSnapshot;

use crate::OutputResult;

/// Trait implemented by the CSV and JSON-lines writers.
///
/// Writers run on a consumer thread, so they must be `Send`.
pub trait OutputWriter: Send {
    /// Write everything recorded for one sealed tick.
    fn write_tick(&mut self, snapshot: &TickSnapshot, unix_time_secs: i64) -> OutputResult<()>;

    /// Flush and close all underlying file handles.
    ///
    /// Idempotent; safe to call more than once.
    fn finish(&mut self) -> OutputResult<()>;
}
