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

//! Fixed-rate power sampling to CSV.
//!
//! The [`sampler`] module holds the drift-corrected scheduling loop;
//! [`source`] holds one vendor adapter per power interface (RAPL, NVML,
//! Redfish, IPMI); [`sink`] writes the readings out.

pub mod cli;
pub mod error;
pub mod record;
pub mod sampler;
pub mod sink;
pub mod source;

pub mod common {
    pub mod config;
}

pub use error::{Error, Result};
