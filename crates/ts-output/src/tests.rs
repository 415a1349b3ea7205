//! Tests for ts-output.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;

use ts_collect::{ConsumerHandle, ConsumerOptions, DataCollector, SnapshotBuffer, StartAt, TickSnapshot};
use ts_core::{FactKind, FactSink, SimConfig, Tick};

use crate::csv::{FACT_HEADER, SUMMARY_HEADER};
use crate::*;

fn tmp() -> TempDir {
    tempfile::tempdir().expect("create temp dir")
}

fn snapshot(tick: u64) -> TickSnapshot {
    let mut snap = TickSnapshot::new(Tick(tick));
    let mut sink = FactSink::new();
    sink.record(FactKind::Vehicle, 2, json!({ "speed": 13.5 }));
    sink.record(FactKind::Vehicle, 1, json!({ "speed": 8.0 }));
    sink.record(FactKind::Link, 40, json!({ "flow": 3 }));
    sink.event(json!({ "type": "closure", "link": 40 }));
    snap.absorb(&mut sink);
    snap
}

fn read_rows(path: std::path::PathBuf) -> (Vec<String>, Vec<::csv::StringRecord>) {
    let mut rdr = ::csv::Reader::from_path(path).unwrap();
    let headers = rdr.headers().unwrap().iter().map(str::to_owned).collect();
    let rows = rdr.records().map(|r| r.unwrap()).collect();
    (headers, rows)
}

#[cfg(test)]
mod row_tests {
    use super::*;

    #[test]
    fn summary_counts_per_kind() {
        let row = TickSummaryRow::from_snapshot(&snapshot(3), 10_800);
        assert_eq!(row.tick, 3);
        assert_eq!(row.unix_time_secs, 10_800);
        assert_eq!((row.vehicles, row.links, row.buses, row.events), (2, 1, 0, 1));
    }

    #[test]
    fn fact_rows_are_ordered() {
        let rows = FactRow::from_snapshot(&snapshot(0));
        let keys: Vec<_> = rows.iter().map(|r| (r.kind, r.id)).collect();
        assert_eq!(keys, [("vehicle", 1), ("vehicle", 2), ("link", 40), ("event", 0)]);
        assert_eq!(rows[0].payload, r#"{"speed":8.0}"#);
    }
}

#[cfg(test)]
mod csv_tests {
    use super::*;

    #[test]
    fn csv_files_created_with_headers() {
        let dir = tmp();
        let out = dir.path().join("nested");
        let mut w = CsvWriter::new(&out).unwrap();
        w.finish().unwrap();

        let (headers, rows) = read_rows(out.join("tick_summaries.csv"));
        assert_eq!(headers, SUMMARY_HEADER);
        assert!(rows.is_empty());
        let (headers, _) = read_rows(out.join("facts.csv"));
        assert_eq!(headers, FACT_HEADER);
    }

    #[test]
    fn csv_tick_written() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.write_tick(&snapshot(3), 10_800).unwrap();
        w.finish().unwrap();
        w.finish().unwrap();

        let (_, summaries) = read_rows(dir.path().join("tick_summaries.csv"));
        assert_eq!(summaries.len(), 1);
        assert_eq!(&summaries[0][0], "3");
        assert_eq!(&summaries[0][1], "10800");
        assert_eq!(&summaries[0][2], "2");

        let (_, facts) = read_rows(dir.path().join("facts.csv"));
        assert_eq!(facts.len(), 4);
        assert_eq!(&facts[2][1], "link");
        let payload: Value = serde_json::from_str(&facts[3][3]).unwrap();
        assert_eq!(payload["type"], json!("closure"));
    }
}

#[cfg(test)]
mod json_tests {
    use super::*;

    #[test]
    fn one_line_per_tick() {
        let dir = tmp();
        let mut w = JsonLinesWriter::new(dir.path()).unwrap();
        w.write_tick(&snapshot(1), 61).unwrap();
        w.write_tick(&snapshot(2), 62).unwrap();
        w.finish().unwrap();
        assert_eq!(w.lines(), 2);

        let text = std::fs::read_to_string(dir.path().join("ticks.jsonl")).unwrap();
        let docs: Vec<Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1]["tick"], json!(2));
        assert_eq!(docs[1]["unix_time_secs"], json!(62));
        assert_eq!(docs[0]["vehicle"]["2"]["speed"], json!(13.5));
    }
}

#[cfg(test)]
mod consumer_tests {
    use super::*;

    #[test]
    fn consumer_drains_buffer_to_csv() {
        let dir = tmp();
        let config = SimConfig { start_unix_secs: 1_000, tick_duration_secs: 60, ..SimConfig::default() };
        let buffer = SnapshotBuffer::new();
        let consumer = OutputConsumer::new("csv", CsvWriter::new(dir.path()).unwrap(), &config)
            .with_placeholders(true);
        let opts = ConsumerOptions {
            start: StartAt::Tick(Tick(0)),
            stride: 1,
            poll: Duration::from_millis(2),
        };
        let handle = ConsumerHandle::spawn(&buffer, consumer, opts).unwrap();

        let mut collector = DataCollector::new(Arc::clone(&buffer));
        collector.start().unwrap();
        for t in 0..4 {
            collector.open(Tick(t)).unwrap();
            if t != 3 {
                let mut sink = FactSink::new();
                sink.record(FactKind::Bus, t, json!({ "load": t }));
                collector.absorb(&mut sink).unwrap();
            }
            collector.seal().unwrap();
        }
        collector.stop().unwrap();
        let summary = handle.join().unwrap();
        assert_eq!((summary.consumed, summary.placeholders), (3, 1));

        let (_, rows) = read_rows(dir.path().join("tick_summaries.csv"));
        let ticks: Vec<_> = rows.iter().map(|r| r[0].to_owned()).collect();
        assert_eq!(ticks, ["0", "1", "2", "3"]);
        assert_eq!(&rows[2][1], "1120");
        assert_eq!(&rows[3][4], "0");
    }
}
