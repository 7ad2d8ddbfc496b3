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

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::common::config::AppConfig;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sample CPU package power from the Intel RAPL sysfs interface.
    Cpu(CpuArgs),
    /// Sample NVIDIA GPU power via NVML, falling back to nvidia-smi.
    Gpu(GpuArgs),
    /// Sample chassis power from a Redfish/iDRAC endpoint.
    Redfish(RedfishArgs),
    /// Sample system power through ipmitool's DCMI power reading.
    Ipmi(IpmiArgs),
}

/// Sampling options shared by every source.
#[derive(Args, Clone)]
pub struct SampleArgs {
    /// Sampling interval in seconds. May be sub-second, e.g. 0.01 for 10ms.
    #[arg(short, long, default_value_t = AppConfig::DEFAULT_INTERVAL_SECS)]
    pub interval: f64,

    /// Total sampling duration in seconds. 0 runs until interrupted.
    #[arg(short, long, default_value_t = 0.0)]
    pub duration: f64,

    /// Output CSV file. Defaults to <source>_power_data.csv.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of rows to buffer before flushing the output file.
    #[arg(long, default_value_t = AppConfig::DEFAULT_FLUSH_EVERY)]
    pub flush_every: u64,

    /// Consecutive query failures before an elevated warning is logged.
    #[arg(long, default_value_t = AppConfig::FAILURE_WARN_THRESHOLD)]
    pub failure_warn_threshold: u32,
}

impl SampleArgs {
    pub fn output_or(&self, default_name: &str) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(default_name))
    }
}

#[derive(Args, Clone)]
pub struct CpuArgs {
    #[command(flatten)]
    pub sample: SampleArgs,

    /// Specific RAPL domain to monitor (e.g. package-0, package-0-dram).
    /// By default all package domains are summed.
    #[arg(long)]
    pub domain: Option<String>,

    /// List available RAPL domains and exit.
    #[arg(long)]
    pub list_domains: bool,
}

#[derive(Args, Clone)]
pub struct GpuArgs {
    #[command(flatten)]
    pub sample: SampleArgs,

    /// GPU index to monitor.
    #[arg(long, default_value_t = 0)]
    pub index: u32,
}

#[derive(Args, Clone)]
pub struct RedfishArgs {
    #[command(flatten)]
    pub sample: SampleArgs,

    /// Base URL of the management controller, e.g. https://10.0.0.5
    #[arg(long)]
    pub host: String,

    /// Chassis resource id under /redfish/v1/Chassis/.
    #[arg(long, default_value = AppConfig::DEFAULT_REDFISH_CHASSIS)]
    pub chassis: String,

    #[arg(long)]
    pub username: Option<String>,

    #[arg(long)]
    pub password: Option<String>,

    /// Accept self-signed TLS certificates (common on BMCs).
    #[arg(long)]
    pub insecure: bool,
}

#[derive(Args, Clone)]
pub struct IpmiArgs {
    #[command(flatten)]
    pub sample: SampleArgs,

    /// Remote BMC address; omitted means the local interface.
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub username: Option<String>,

    #[arg(long)]
    pub password: Option<String>,
}
