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

//! Reading sinks.
//!
//! The sampler appends readings through the [`RecordSink`] trait; the CSV
//! file implementation lives in [`csv`]. Sinks are append-only and
//! single-writer.

pub mod csv;

use std::io;

use crate::record::Reading;

pub use csv::CsvSink;

/// Append-only destination for readings.
///
/// Write errors out of a sink are fatal to the run (disk full, permission
/// revoked); the loop attempts one final flush and reports how much was
/// collected.
pub trait RecordSink: Send {
    fn append(&mut self, reading: &Reading) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}
