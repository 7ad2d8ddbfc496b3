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

//! The fixed-rate sampling loop.
//!
//! Tick `n` is scheduled against the absolute deadline `t0 + n * T`, never
//! against "now + T", so per-iteration overhead and slow queries cannot
//! accumulate drift. A query that overruns its interval delays its own
//! tick only; later ticks stay on the original schedule and the overrun is
//! counted.

use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;
use tokio::time::{self, Instant};

use crate::common::config::AppConfig;
use crate::error::{Error, Result};
use crate::record::Reading;
use crate::sink::RecordSink;
use crate::source::PowerSource;

/// Validated loop parameters.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    interval: Duration,
    duration: Option<Duration>,
    failure_warn_threshold: u32,
}

impl SamplerConfig {
    /// Build a config from raw CLI seconds. A non-positive interval or a
    /// negative duration is a configuration error; duration `0` means run
    /// until cancelled.
    pub fn new(interval_secs: f64, duration_secs: f64) -> Result<Self> {
        if !interval_secs.is_finite() || interval_secs <= 0.0 {
            return Err(Error::Config(format!(
                "interval must be positive, got {interval_secs}"
            )));
        }
        if !duration_secs.is_finite() || duration_secs < 0.0 {
            return Err(Error::Config(format!(
                "duration must be non-negative, got {duration_secs}"
            )));
        }
        if interval_secs < AppConfig::MIN_SANE_INTERVAL_SECS {
            tracing::warn!(
                interval_secs,
                "sampling interval is extremely small; the actual rate may be limited by hardware and kernel capabilities"
            );
        }

        let duration = if duration_secs > 0.0 {
            Some(Duration::from_secs_f64(duration_secs))
        } else {
            None
        };

        Ok(Self {
            interval: Duration::from_secs_f64(interval_secs),
            duration,
            failure_warn_threshold: AppConfig::FAILURE_WARN_THRESHOLD,
        })
    }

    pub fn failure_warn_threshold(mut self, threshold: u32) -> Self {
        self.failure_warn_threshold = threshold.max(1);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Bound on a single query so a hung vendor call cannot stall the
    /// schedule indefinitely. A small multiple of the interval, with a
    /// floor for very fast sampling rates.
    pub fn query_timeout(&self) -> Duration {
        let scaled = self.interval * AppConfig::QUERY_TIMEOUT_FACTOR;
        scaled.max(Duration::from_millis(AppConfig::MIN_QUERY_TIMEOUT_MS))
    }
}

/// What a completed run looked like.
#[derive(Debug, Clone)]
pub struct SamplerReport {
    /// Readings appended to the sink (failed queries included).
    pub readings: u64,
    /// Queries that returned an error or timed out.
    pub failures: u64,
    /// Ticks whose deadline had already passed when they started.
    pub overruns: u64,
    /// Monotonic time from loop start to final flush.
    pub elapsed: Duration,
    /// Whether the run ended on an operator signal rather than duration.
    pub cancelled: bool,
}

impl SamplerReport {
    pub fn average_rate(&self) -> f64 {
        self.readings as f64 / self.elapsed.as_secs_f64().max(1e-6)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Running,
    Stopping,
    Stopped,
}

/// One sampling run: a source, a sink, and a schedule.
///
/// Single logical thread of control; the only blocking points are the
/// deadline wait and the (timeout-bounded) query. Cancellation is
/// cooperative and observed at tick boundaries.
pub struct Sampler<'a> {
    source: &'a mut dyn PowerSource,
    sink: &'a mut dyn RecordSink,
    config: SamplerConfig,
}

impl<'a> Sampler<'a> {
    pub fn new(
        source: &'a mut dyn PowerSource,
        sink: &'a mut dyn RecordSink,
        config: SamplerConfig,
    ) -> Self {
        Self {
            source,
            sink,
            config,
        }
    }

    /// Run until the configured duration elapses or `shutdown` flips to
    /// true. On a fatal sink error the loop stops, attempts a final flush,
    /// and reports the tick and the count written so far.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<SamplerReport> {
        let query_timeout = self.config.query_timeout();
        let status_period = Duration::from_secs(AppConfig::STATUS_LOG_PERIOD_SECS);

        let source_id = self.source.id().to_string();

        let t0 = Instant::now();
        let mut state = LoopState::Running;
        let mut tick: u64 = 0;
        let mut written: u64 = 0;
        let mut failures: u64 = 0;
        let mut overruns: u64 = 0;
        let mut consecutive_failures: u32 = 0;
        let mut cancelled = false;
        let mut last_status = t0;

        while state == LoopState::Running {
            // Absolute deadline for this tick; the drift correction lives
            // in this one line.
            let offset = self.config.interval.mul_f64(tick as f64);
            if let Some(duration) = self.config.duration {
                // A tick whose deadline already reaches D cannot capture
                // before D; skip the final wait.
                if offset >= duration {
                    state = LoopState::Stopping;
                    continue;
                }
            }

            let deadline = t0 + offset;
            let late = Instant::now().saturating_duration_since(deadline);
            if late.is_zero() {
                tokio::select! {
                    _ = time::sleep_until(deadline) => {}
                    changed = shutdown.changed() => {
                        if changed.is_ok() && *shutdown.borrow() {
                            cancelled = true;
                            state = LoopState::Stopping;
                            continue;
                        }
                        // Sender gone; nothing can cancel us anymore
                        time::sleep_until(deadline).await;
                    }
                }
            }

            if *shutdown.borrow() {
                cancelled = true;
                state = LoopState::Stopping;
                continue;
            }

            // The duration bounds monotonic elapsed time, not the tick
            // grid: a run whose queries keep overrunning must still stop
            // once D has passed.
            if let Some(duration) = self.config.duration {
                if t0.elapsed() >= duration {
                    state = LoopState::Stopping;
                    continue;
                }
            }

            if !late.is_zero() && tick > 0 {
                // Previous query overran the interval: proceed immediately,
                // count it, never skip the tick.
                overruns += 1;
                tracing::debug!(
                    tick,
                    late_us = late.as_micros() as u64,
                    "tick deadline overrun"
                );
            }

            let timestamp = Local::now();
            let elapsed_secs = t0.elapsed().as_secs_f64();
            let reading = match time::timeout(query_timeout, self.source.read_watts()).await {
                Ok(Ok(watts)) => {
                    consecutive_failures = 0;
                    Reading::ok(timestamp, elapsed_secs, &source_id, watts)
                }
                Ok(Err(e)) => {
                    failures += 1;
                    consecutive_failures += 1;
                    tracing::debug!(tick, source = %source_id, "query failed: {e}");
                    Reading::failed(timestamp, elapsed_secs, &source_id, e.to_string())
                }
                Err(_) => {
                    failures += 1;
                    consecutive_failures += 1;
                    tracing::debug!(tick, source = %source_id, "query timed out");
                    Reading::failed(
                        timestamp,
                        elapsed_secs,
                        &source_id,
                        format!("query timed out after {query_timeout:?}"),
                    )
                }
            };

            if consecutive_failures != 0
                && consecutive_failures % self.config.failure_warn_threshold == 0
            {
                tracing::warn!(
                    source = %source_id,
                    count = consecutive_failures,
                    "consecutive query failures, collection continues"
                );
            }

            if let Err(e) = self.sink.append(&reading) {
                let _ = self.sink.flush();
                tracing::error!(tick, written, "sink write failed: {e}");
                return Err(Error::Sink {
                    tick,
                    written,
                    source: e,
                });
            }
            written += 1;
            tick += 1;

            let after_write = Instant::now();
            if after_write.duration_since(last_status) >= status_period {
                let rate = written as f64 / t0.elapsed().as_secs_f64().max(1e-6);
                tracing::info!(
                    samples = written,
                    failures,
                    "collecting at {rate:.2} samples/s"
                );
                last_status = after_write;
            }
        }

        // Stopping: one final flush, then we are done. A flush failure here
        // is as fatal as a write failure.
        if let Err(e) = self.sink.flush() {
            return Err(Error::Sink {
                tick,
                written,
                source: e,
            });
        }
        state = LoopState::Stopped;
        tracing::debug!(?state, readings = written, overruns, "sampler stopped");

        Ok(SamplerReport {
            readings: written,
            failures,
            overruns,
            elapsed: t0.elapsed(),
            cancelled,
        })
    }
}
