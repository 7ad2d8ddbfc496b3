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

//! NVIDIA GPU power via NVML, with a nvidia-smi fallback.
//!
//! NVML is the fast path (a library call per read). When it cannot be
//! initialized, the source falls back to shelling out to `nvidia-smi`,
//! which is an order of magnitude slower but works in environments where
//! the NVML shared library is not loadable.

use std::time::Duration;

use async_trait::async_trait;
use nvml_wrapper::Nvml;

use crate::source::command::run_checked_command;
use crate::source::{PowerSource, SourceError, SourceResult};
use crate::{Error, Result};

enum Backend {
    Nvml(Nvml),
    Smi,
}

pub struct NvidiaSource {
    id: String,
    index: u32,
    backend: Backend,
    timeout: Duration,
}

impl NvidiaSource {
    pub async fn new(index: u32, timeout: Duration) -> Result<Self> {
        let backend = match Nvml::init() {
            Ok(nvml) => {
                let name = {
                    let device = nvml.device_by_index(index).map_err(|e| {
                        Error::SourceInit(format!("NVIDIA GPU {index} not found: {e}"))
                    })?;
                    device.name().unwrap_or_else(|_| format!("GPU {index}"))
                };
                tracing::info!(index, gpu = %name, "using NVML");
                Backend::Nvml(nvml)
            }
            Err(e) => {
                tracing::warn!("NVML unavailable ({e}), falling back to nvidia-smi");
                run_checked_command("nvidia-smi", &["-L"], timeout)
                    .await
                    .map_err(|e| {
                        Error::SourceInit(format!(
                            "neither NVML nor nvidia-smi is available: {e}"
                        ))
                    })?;
                Backend::Smi
            }
        };

        Ok(Self {
            id: format!("gpu:{index}"),
            index,
            backend,
            timeout,
        })
    }

    async fn read_watts_smi(&self) -> SourceResult<f64> {
        let index = self.index.to_string();
        let out = run_checked_command(
            "nvidia-smi",
            &[
                "--query-gpu=power.draw",
                "--format=csv,noheader,nounits",
                "-i",
                &index,
            ],
            self.timeout,
        )
        .await?;
        parse_power_value(&out.stdout)
    }
}

#[async_trait]
impl PowerSource for NvidiaSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn read_watts(&mut self) -> SourceResult<f64> {
        match &self.backend {
            Backend::Nvml(nvml) => {
                let device = nvml
                    .device_by_index(self.index)
                    .map_err(|e| SourceError::Api(format!("NVML device lookup: {e}")))?;
                let milliwatts = device
                    .power_usage()
                    .map_err(|e| SourceError::Api(format!("NVML power usage: {e}")))?;
                Ok(f64::from(milliwatts) / 1000.0)
            }
            Backend::Smi => self.read_watts_smi().await,
        }
    }
}

/// Parse the power column of nvidia-smi's `csv,noheader,nounits` output.
/// Drivers report "[N/A]" for GPUs without power telemetry.
fn parse_power_value(raw: &str) -> SourceResult<f64> {
    let value = raw.trim();
    if value.is_empty() || value.contains("N/A") {
        return Err(SourceError::Unavailable(
            "power draw not reported for this GPU".to_string(),
        ));
    }
    value
        .parse::<f64>()
        .map_err(|e| SourceError::Parse(format!("nvidia-smi power value '{value}': {e}")))
}
