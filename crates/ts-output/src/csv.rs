//! CSV output backend.
//!
//! Creates two files in the configured output directory:
//! - `tick_summaries.csv`: one row per written tick with per-kind counts
//! - `facts.csv`: one row per fact, payload kept as JSON text

use std::fs::{self, File};
use std::path::Path;

use csv::Writer;

use ts_collect::TickSnapshot;

use crate::row::{FactRow, TickSummaryRow};
use crate::writer::OutputWriter;
use crate::OutputResult;

pub const SUMMARY_HEADER: [&str; 7] =
    ["tick", "unix_time_secs", "vehicles", "electric_vehicles", "buses", "links", "events"];

pub const FACT_HEADER: [&str; 4] = ["tick", "kind", "id", "payload"];

/// Writes simulation output to two CSV files.
pub struct CsvWriter {
    summaries: Writer<File>,
    facts:     Writer<File>,
    finished:  bool,
}

impl CsvWriter {
    /// Create `dir` if needed, open the two CSV files and write the header rows.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        fs::create_dir_all(dir)?;

        let mut summaries = Writer::from_path(dir.join("tick_summaries.csv"))?;
        summaries.write_record(SUMMARY_HEADER)?;

        let mut facts = Writer::from_path(dir.join("facts.csv"))?;
        facts.write_record(FACT_HEADER)?;

        Ok(Self { summaries, facts, finished: false })
    }

    pub fn write_summary(&mut self, row: &TickSummaryRow) -> OutputResult<()> {
        self.summaries.write_record(&[
            row.tick.to_string(),
            row.unix_time_secs.to_string(),
            row.vehicles.to_string(),
            row.electric_vehicles.to_string(),
            row.buses.to_string(),
            row.links.to_string(),
            row.events.to_string(),
        ])?;
        Ok(())
    }

    pub fn write_facts(&mut self, rows: &[FactRow]) -> OutputResult<()> {
        for row in rows {
            self.facts.write_record(&[
                row.tick.to_string(),
                row.kind.to_owned(),
                row.id.to_string(),
                row.payload.clone(),
            ])?;
        }
        Ok(())
    }
}

impl OutputWriter for CsvWriter {
    fn write_tick(&mut self, snapshot: &TickSnapshot, unix_time_secs: i64) -> OutputResult<()> {
        self.write_summary(&TickSummaryRow::from_snapshot(snapshot, unix_time_secs))?;
        self.write_facts(&FactRow::from_snapshot(snapshot))
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.summaries.flush()?;
        self.facts.flush()?;
        Ok(())
    }
}
