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

//! System power via `ipmitool dcmi power reading`.
//!
//! Works against the local BMC by default, or a remote one over lanplus
//! when a host is given. ipmitool is slow (hundreds of milliseconds per
//! invocation), so sub-second intervals will overrun; the loop counts
//! those rather than drifting.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::source::command::run_checked_command;
use crate::source::{PowerSource, SourceError, SourceResult};
use crate::Result;

pub struct IpmiSource {
    id: String,
    args: Vec<String>,
    timeout: Duration,
    reading_re: Regex,
}

impl IpmiSource {
    pub fn new(
        host: Option<String>,
        username: Option<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut args = Vec::new();
        if let Some(host) = &host {
            args.extend(["-I".to_string(), "lanplus".to_string()]);
            args.extend(["-H".to_string(), host.clone()]);
            if let Some(user) = &username {
                args.extend(["-U".to_string(), user.clone()]);
            }
            if let Some(pass) = &password {
                args.extend(["-P".to_string(), pass.clone()]);
            }
        }
        args.extend(["dcmi".to_string(), "power".to_string(), "reading".to_string()]);

        let id = match &host {
            Some(h) => format!("ipmi:{h}"),
            None => "ipmi:local".to_string(),
        };

        // Infallible for a literal pattern; kept out of the per-tick path
        let reading_re = Regex::new(r"Instantaneous power reading:\s*([\d.]+)\s*Watts")
            .map_err(|e| crate::Error::SourceInit(format!("ipmi reading pattern: {e}")))?;

        Ok(Self {
            id,
            args,
            timeout,
            reading_re,
        })
    }

    fn parse_power_reading(&self, output: &str) -> SourceResult<f64> {
        let captured = self
            .reading_re
            .captures(output)
            .and_then(|c| c.get(1))
            .ok_or_else(|| {
                SourceError::Parse(
                    "no 'Instantaneous power reading' line in ipmitool output".to_string(),
                )
            })?;
        captured
            .as_str()
            .parse::<f64>()
            .map_err(|e| SourceError::Parse(format!("power value '{}': {e}", captured.as_str())))
    }
}

#[async_trait]
impl PowerSource for IpmiSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn read_watts(&mut self) -> SourceResult<f64> {
        let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
        let out = run_checked_command("ipmitool", &args, self.timeout).await?;
        self.parse_power_reading(&out.stdout)
    }
}
