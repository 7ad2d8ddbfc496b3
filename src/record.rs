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

//! The per-tick measurement record.

use chrono::{DateTime, Local};

/// One power measurement, captured at a single tick of the sampler loop.
///
/// A reading is created at each tick, appended to the sink immediately, and
/// never mutated afterwards. A failed query still produces a reading: the
/// value is absent and the error annotation says why. Absence is never
/// coerced to zero.
#[derive(Debug, Clone)]
pub struct Reading {
    /// Wall-clock time of capture, for correlation with external events.
    pub timestamp: DateTime<Local>,
    /// Monotonic time since loop start, immune to wall-clock adjustments.
    pub elapsed_secs: f64,
    /// Which power source produced the value (e.g. "rapl:package-0",
    /// "gpu:0", "redfish:10.0.0.5").
    pub source_id: String,
    /// Instantaneous power in watts, `None` when the query failed.
    pub value_watts: Option<f64>,
    /// Short description of the query failure, when there was one.
    pub error: Option<String>,
}

impl Reading {
    pub fn ok(
        timestamp: DateTime<Local>,
        elapsed_secs: f64,
        source_id: &str,
        value_watts: f64,
    ) -> Self {
        Self {
            timestamp,
            elapsed_secs,
            source_id: source_id.to_string(),
            value_watts: Some(value_watts),
            error: None,
        }
    }

    pub fn failed(
        timestamp: DateTime<Local>,
        elapsed_secs: f64,
        source_id: &str,
        error: String,
    ) -> Self {
        Self {
            timestamp,
            elapsed_secs,
            source_id: source_id.to_string(),
            value_watts: None,
            error: Some(error),
        }
    }
}
