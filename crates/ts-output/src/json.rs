//! JSON-lines output backend: `ticks.jsonl`, one object per written tick.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::Value;

use ts_collect::TickSnapshot;

use crate::writer::OutputWriter;
use crate::OutputResult;

pub struct JsonLinesWriter {
    out:      BufWriter<File>,
    lines:    u64,
    finished: bool,
}

impl JsonLinesWriter {
    pub fn new(dir: &Path) -> OutputResult<Self> {
        fs::create_dir_all(dir)?;
        let out = BufWriter::new(File::create(dir.join("ticks.jsonl"))?);
        Ok(Self { out, lines: 0, finished: false })
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }
}

impl OutputWriter for JsonLinesWriter {
    fn write_tick(&mut self, snapshot: &TickSnapshot, unix_time_secs: i64) -> OutputResult<()> {
        let mut doc = snapshot.to_json();
        if let Value::Object(map) = &mut doc {
            map.insert("unix_time_secs".to_owned(), Value::from(unix_time_secs));
        }
        serde_json::to_writer(&mut self.out, &doc)?;
        self.out.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.out.flush()?;
        Ok(())
    }
}
