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

//! Chassis power via the Redfish management API (iDRAC and friends).
//!
//! One GET per tick against `/redfish/v1/Chassis/{id}/Power`; the value is
//! `PowerControl[0].PowerConsumedWatts`. BMCs almost always serve
//! self-signed certificates, hence the `--insecure` escape hatch.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::common::config::AppConfig;
use crate::source::{PowerSource, SourceError, SourceResult};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct PowerResponse {
    #[serde(rename = "PowerControl", default)]
    power_control: Vec<PowerControl>,
}

#[derive(Debug, Deserialize)]
struct PowerControl {
    #[serde(rename = "PowerConsumedWatts")]
    power_consumed_watts: Option<f64>,
}

#[derive(Debug)]
pub struct RedfishSource {
    id: String,
    client: reqwest::Client,
    power_url: Url,
    username: Option<String>,
    password: Option<String>,
}

impl RedfishSource {
    pub fn new(
        host: &str,
        chassis: &str,
        username: Option<String>,
        password: Option<String>,
        insecure: bool,
    ) -> Result<Self> {
        let base = Url::parse(host)
            .map_err(|e| Error::SourceInit(format!("invalid Redfish host URL '{host}': {e}")))?;
        let power_url = base
            .join(&format!("/redfish/v1/Chassis/{chassis}/Power"))
            .map_err(|e| Error::SourceInit(format!("invalid chassis id '{chassis}': {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(AppConfig::CONNECTION_TIMEOUT_SECS))
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|e| Error::SourceInit(format!("HTTP client: {e}")))?;

        let id = format!("redfish:{}", base.host_str().unwrap_or(host));

        Ok(Self {
            id,
            client,
            power_url,
            username,
            password,
        })
    }
}

#[async_trait]
impl PowerSource for RedfishSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn read_watts(&mut self) -> SourceResult<f64> {
        let mut request = self.client.get(self.power_url.clone());
        if let Some(user) = &self.username {
            request = request.basic_auth(user, self.password.as_deref());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout(format!("Redfish request to {}: {e}", self.power_url))
            } else {
                SourceError::Api(format!("Redfish request to {}: {e}", self.power_url))
            }
        })?;
        let response = response
            .error_for_status()
            .map_err(|e| SourceError::Api(format!("Redfish status: {e}")))?;

        let payload: PowerResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Redfish power payload: {e}")))?;

        extract_watts(&payload)
    }
}

fn extract_watts(payload: &PowerResponse) -> SourceResult<f64> {
    payload
        .power_control
        .iter()
        .find_map(|pc| pc.power_consumed_watts)
        .ok_or_else(|| {
            SourceError::Unavailable(
                "no PowerControl entry reported PowerConsumedWatts".to_string(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_power_payload() {
        let payload: PowerResponse = serde_json::from_str(
            r#"{
                "@odata.id": "/redfish/v1/Chassis/1/Power",
                "PowerControl": [
                    {
                        "Name": "System Power Control",
                        "PowerConsumedWatts": 208.0,
                        "PowerCapacityWatts": 750
                    }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(extract_watts(&payload).unwrap(), 208.0);
    }

    #[test]
    fn test_parse_payload_without_power_control() {
        let payload: PowerResponse = serde_json::from_str(r#"{"Id": "Power"}"#).unwrap();
        assert!(matches!(
            extract_watts(&payload),
            Err(SourceError::Unavailable(_))
        ));
    }

    #[test]
    fn test_parse_payload_null_watts_falls_through() {
        // Some BMCs include the entry but null the value out under load
        let payload: PowerResponse = serde_json::from_str(
            r#"{"PowerControl": [{"PowerConsumedWatts": null}, {"PowerConsumedWatts": 75.5}]}"#,
        )
        .unwrap();
        assert_eq!(extract_watts(&payload).unwrap(), 75.5);
    }

    #[test]
    fn test_invalid_host_url_is_fatal() {
        let err = RedfishSource::new("not a url", "1", None, None, false).unwrap_err();
        assert!(matches!(err, Error::SourceInit(_)));
    }

    #[test]
    fn test_source_id_uses_hostname() {
        let source =
            RedfishSource::new("https://10.82.128.41", "System.Embedded.1", None, None, true)
                .unwrap();
        assert_eq!(source.id(), "redfish:10.82.128.41");
    }
}
