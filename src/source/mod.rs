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

//! Power source implementations.
//!
//! Each vendor interface sits behind the [`PowerSource`] trait: one method,
//! "read current watts", returning a number or a [`SourceError`]. The
//! sampler loop treats every implementation as an opaque synchronous call
//! with a bounded timeout.

pub mod command;
pub mod ipmi;
pub mod nvidia;
pub mod rapl;
pub mod redfish;

use async_trait::async_trait;
use thiserror::Error;

/// Errors a power source query can produce.
///
/// All of these are transient from the sampler's point of view: the loop
/// records them on the reading and moves on to the next tick.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Command failed: '{command}' (code: {code:?}) stderr: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("{0}")]
    Unavailable(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// A single power-reading capability.
///
/// Implementations may keep mutable state between reads (RAPL needs the
/// previous energy counter to derive watts from joule deltas), so the read
/// method takes `&mut self`. The loop owns the source exclusively; there is
/// no sharing.
#[async_trait]
pub trait PowerSource: Send {
    /// Stable identifier for this source, recorded on every reading.
    fn id(&self) -> &str;

    /// Read the current instantaneous power draw in watts.
    ///
    /// The caller wraps this in a timeout; implementations that shell out
    /// or go over the network carry their own bounded timeouts as well.
    async fn read_watts(&mut self) -> SourceResult<f64>;
}
