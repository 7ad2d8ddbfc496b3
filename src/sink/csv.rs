// Copyright 2026 The wattlog authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! CSV file sink.
//!
//! One row per reading, header written once at creation:
//! `timestamp,elapsed_seconds,power_watts,error`. Consumers depend on the
//! first three columns and their order; `power_watts` is either a
//! non-negative number or empty. Rows are buffered and flushed every
//! `flush_every` rows to keep high-frequency sampling off the disk.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::record::Reading;
use crate::sink::RecordSink;

pub const CSV_HEADER: &str = "timestamp,elapsed_seconds,power_watts,error";

pub struct CsvSink {
    writer: BufWriter<File>,
    path: PathBuf,
    flush_every: u64,
    rows_since_flush: u64,
}

impl CsvSink {
    /// Create (truncating) the output file and write the header row.
    pub fn create(path: &Path, flush_every: u64) -> io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{CSV_HEADER}")?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            flush_every: flush_every.max(1),
            rows_since_flush: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for CsvSink {
    fn append(&mut self, reading: &Reading) -> io::Result<()> {
        writeln!(self.writer, "{}", format_row(reading))?;
        self.rows_since_flush += 1;
        if self.rows_since_flush >= self.flush_every {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.rows_since_flush = 0;
        self.writer.flush()
    }
}

fn format_row(reading: &Reading) -> String {
    let timestamp = reading.timestamp.format("%Y-%m-%dT%H:%M:%S%.6f");
    let value = match reading.value_watts {
        Some(watts) => format!("{watts:.3}"),
        None => String::new(),
    };
    let error = match &reading.error {
        Some(message) => csv_escape(message),
        None => String::new(),
    };
    format!("{timestamp},{:.6},{value},{error}", reading.elapsed_secs)
}

/// Quote a field if it contains a delimiter, quote, or newline.
fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use tempfile::TempDir;

    fn reading_ok(elapsed: f64, watts: f64) -> Reading {
        Reading::ok(Local::now(), elapsed, "rapl:package", watts)
    }

    #[test]
    fn test_header_and_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        let mut sink = CsvSink::create(&path, 10).unwrap();
        assert_eq!(sink.path(), path);
        sink.append(&reading_ok(0.0, 35.2)).unwrap();
        sink.append(&reading_ok(0.01, 36.8)).unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].ends_with(",35.200,"));
        assert!(lines[2].ends_with(",36.800,"));
    }

    #[test]
    fn test_failed_reading_has_empty_value_field() {
        let reading = Reading::failed(Local::now(), 2.5, "gpu:0", "NVML timeout".to_string());
        let row = format_row(&reading);
        let fields: Vec<&str> = row.splitn(4, ',').collect();
        assert_eq!(fields[1], "2.500000");
        assert_eq!(fields[2], "");
        assert_eq!(fields[3], "NVML timeout");
    }

    #[test]
    fn test_error_field_is_escaped() {
        let reading = Reading::failed(
            Local::now(),
            0.0,
            "ipmi:local",
            "Command failed: 'ipmitool', code: Some(1)".to_string(),
        );
        let row = format_row(&reading);
        assert!(row.contains("\"Command failed: 'ipmitool', code: Some(1)\""));
    }

    #[test]
    fn test_csv_escape_quotes() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_flush_every_writes_through() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        let mut sink = CsvSink::create(&path, 2).unwrap();

        sink.append(&reading_ok(0.0, 1.0)).unwrap();
        sink.append(&reading_ok(1.0, 2.0)).unwrap();
        // Second append crossed the threshold, rows must be on disk without
        // an explicit flush
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("no-such-dir").join("out.csv");
        assert!(CsvSink::create(&path, 10).is_err());
    }
}
