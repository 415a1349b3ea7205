//! `ts-output`: simulation output writers that drain the snapshot buffer.
//!
//! | Writer              | Files created                         |
//! |---------------------|---------------------------------------|
//! | [`CsvWriter`]       | `tick_summaries.csv`, `facts.csv`     |
//! | [`JsonLinesWriter`] | `ticks.jsonl`                         |
//!
//! Every writer implements [`OutputWriter`] and runs on its own consumer
//! thread through [`OutputConsumer`], so slow disks never stall the tick loop.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ts_output::{CsvWriter, OutputConsumer};
//!
//! let writer = CsvWriter::new(Path::new("./output"))?;
//! let consumer = OutputConsumer::new("csv", writer, &config);
//! let handle = ConsumerHandle::spawn(&buffer, consumer, options)?;
//! ```

pub mod consumer;
pub mod csv;
pub mod error;
pub mod json;
pub mod row;
pub mod writer;

#[cfg(test)]
mod tests;

pub use consumer::OutputConsumer;
pub use csv::CsvWriter;
pub use error::{OutputError, OutputResult};
pub use json::JsonLinesWriter;
pub use row::{FactRow, TickSummaryRow};
pub use writer::OutputWriter;
