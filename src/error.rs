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

//! Unified error types for the wattlog library.
//!
//! Transient query failures are not represented here: they are absorbed by
//! the sampler loop and recorded on the reading itself (see
//! [`crate::record::Reading`]). This module covers the fatal conditions
//! only, the ones that stop a run before or during collection.

use thiserror::Error;

/// The main error type for wattlog operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration, reported before the loop starts.
    ///
    /// Non-positive sampling intervals and negative durations land here.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A power source could not be constructed.
    ///
    /// The sysfs interface is missing, NVML and nvidia-smi are both
    /// unavailable, the Redfish endpoint URL does not parse, and so on.
    /// Once a source is constructed, its per-tick read failures are
    /// transient and never surface as this error.
    #[error("Power source unavailable: {0}")]
    SourceInit(String),

    /// The output sink failed mid-run.
    ///
    /// Disk full or permission revoked after collection started. The tick
    /// and the number of readings written so far are preserved so partial
    /// output can be diagnosed and still used.
    #[error("Sink write failed at tick {tick} after {written} readings: {source}")]
    Sink {
        tick: u64,
        written: u64,
        source: std::io::Error,
    },

    /// An I/O error occurred outside the sampling loop.
    ///
    /// Creating the output file and writing its header are the usual
    /// culprits.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for wattlog operations.
pub type Result<T> = std::result::Result<T, Error>;
