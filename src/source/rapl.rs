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

//! CPU package power via the Intel RAPL sysfs interface.
//!
//! RAPL exposes monotonically increasing energy counters (microjoules) per
//! domain under `/sys/class/powercap/intel-rapl`. Power is derived from the
//! counter delta between consecutive reads divided by the elapsed monotonic
//! time, with wraparound handled through `max_energy_range_uj`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::source::{PowerSource, SourceError, SourceResult};

const RAPL_SYSFS: &str = "/sys/class/powercap/intel-rapl";

// Used when max_energy_range_uj is unreadable; matches the common 32-bit
// counter width.
const FALLBACK_MAX_ENERGY_UJ: u64 = 1 << 32;

/// One RAPL domain being tracked: its energy counter file, the counter's
/// wraparound range, and the last value seen.
#[derive(Debug)]
struct Domain {
    name: String,
    energy_path: PathBuf,
    max_energy_uj: u64,
    prev_uj: u64,
}

/// Power source backed by one or more RAPL domains.
///
/// With no explicit domain, all top-level `package-*` domains are summed
/// into a single total-CPU value. Counters are primed at construction so
/// the first tick already produces a delta.
#[derive(Debug)]
pub struct RaplSource {
    id: String,
    domains: Vec<Domain>,
    last_read: Instant,
}

impl RaplSource {
    pub fn new(domain: Option<&str>) -> Result<Self> {
        Self::with_root(Path::new(RAPL_SYSFS), domain)
    }

    /// Construct against an explicit sysfs root. Split out from [`new`]
    /// so tests can point at a synthetic tree.
    ///
    /// [`new`]: RaplSource::new
    pub fn with_root(root: &Path, domain: Option<&str>) -> Result<Self> {
        let available = discover_domains(root)?;

        let selected: Vec<(String, PathBuf)> = match domain {
            Some(name) => {
                let found = available.iter().find(|(n, _)| n.as_str() == name).cloned();
                match found {
                    Some(d) => vec![d],
                    None => {
                        let names: Vec<&str> =
                            available.iter().map(|(n, _)| n.as_str()).collect();
                        return Err(Error::SourceInit(format!(
                            "RAPL domain '{name}' not found (available: {})",
                            names.join(", ")
                        )));
                    }
                }
            }
            None => {
                // Top-level package domains only; subdomains (core, uncore,
                // dram) are subsets of the package counter and would be
                // double-counted.
                let packages: Vec<(String, PathBuf)> = available
                    .iter()
                    .filter(|(n, p)| {
                        n.starts_with("package") && p.parent() == Some(root)
                    })
                    .cloned()
                    .collect();
                if packages.is_empty() {
                    let names: Vec<&str> =
                        available.iter().map(|(n, _)| n.as_str()).collect();
                    return Err(Error::SourceInit(format!(
                        "no RAPL package domains found (available: {})",
                        names.join(", ")
                    )));
                }
                packages
            }
        };

        let id = match domain {
            Some(name) => format!("rapl:{name}"),
            None => "rapl:package".to_string(),
        };

        let mut domains = Vec::with_capacity(selected.len());
        for (name, dir) in selected {
            let energy_path = dir.join("energy_uj");
            let prev_uj = read_counter(&energy_path).map_err(|e| {
                Error::SourceInit(format!(
                    "cannot read energy counter for domain '{name}': {e}"
                ))
            })?;
            let max_energy_uj = match read_counter(&dir.join("max_energy_range_uj")) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(
                        domain = %name,
                        "couldn't read max energy range, assuming 32-bit counter: {e}"
                    );
                    FALLBACK_MAX_ENERGY_UJ
                }
            };
            domains.push(Domain {
                name,
                energy_path,
                max_energy_uj,
                prev_uj,
            });
        }

        Ok(Self {
            id,
            domains,
            last_read: Instant::now(),
        })
    }

    /// Domain names present on this system, for `--list-domains`.
    pub fn available_domains() -> Result<Vec<String>> {
        Self::available_domains_at(Path::new(RAPL_SYSFS))
    }

    pub fn available_domains_at(root: &Path) -> Result<Vec<String>> {
        Ok(discover_domains(root)?.into_iter().map(|(n, _)| n).collect())
    }
}

#[async_trait]
impl PowerSource for RaplSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn read_watts(&mut self) -> SourceResult<f64> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_read).as_secs_f64();

        let mut total_delta_uj: u64 = 0;
        for domain in &mut self.domains {
            let current = read_counter(&domain.energy_path).map_err(|e| {
                SourceError::Unavailable(format!(
                    "energy counter for '{}' unreadable: {e}",
                    domain.name
                ))
            })?;
            total_delta_uj += counter_delta(domain.prev_uj, current, domain.max_energy_uj);
            domain.prev_uj = current;
        }
        self.last_read = now;

        Ok(watts_from_delta(total_delta_uj, elapsed))
    }
}

/// All RAPL domains under `root`, top-level and one level of subdomains,
/// named the way the kernel names them ("package-0", "package-0-dram").
fn discover_domains(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !root.exists() {
        return Err(Error::SourceInit(format!(
            "RAPL sysfs interface not found at {} (ensure the CPU supports RAPL and powercap is enabled)",
            root.display()
        )));
    }

    let mut domains = Vec::new();
    for entry in sorted_rapl_entries(root)? {
        let name = read_name(&entry)?;
        domains.push((name.clone(), entry.clone()));
        for sub in sorted_rapl_entries(&entry)? {
            let sub_name = read_name(&sub)?;
            domains.push((format!("{name}-{sub_name}"), sub));
        }
    }

    if domains.is_empty() {
        return Err(Error::SourceInit(format!(
            "no RAPL domains found under {}",
            root.display()
        )));
    }
    Ok(domains)
}

fn sorted_rapl_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_rapl_node = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("intel-rapl:"));
        if is_rapl_node && path.is_dir() {
            entries.push(path);
        }
    }
    entries.sort();
    Ok(entries)
}

fn read_name(dir: &Path) -> Result<String> {
    Ok(fs::read_to_string(dir.join("name"))?.trim().to_string())
}

fn read_counter(path: &Path) -> SourceResult<u64> {
    let content = fs::read_to_string(path)?;
    content
        .trim()
        .parse::<u64>()
        .map_err(|e| SourceError::Parse(format!("{}: {e}", path.display())))
}

/// Counter delta with wraparound correction.
fn counter_delta(prev_uj: u64, current_uj: u64, max_energy_uj: u64) -> u64 {
    if current_uj >= prev_uj {
        current_uj - prev_uj
    } else {
        current_uj + max_energy_uj - prev_uj
    }
}

/// Microjoules over elapsed seconds, clamped against zero-length windows.
fn watts_from_delta(delta_uj: u64, elapsed_secs: f64) -> f64 {
    let elapsed = elapsed_secs.max(1e-6);
    (delta_uj as f64 / 1_000_000.0) / elapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{create_dir_all, write};
    use tempfile::TempDir;

    fn fake_domain(root: &Path, node: &str, name: &str, energy_uj: u64) {
        let dir = root.join(node);
        create_dir_all(&dir).unwrap();
        write(dir.join("name"), format!("{name}\n")).unwrap();
        write(dir.join("energy_uj"), format!("{energy_uj}\n")).unwrap();
        write(dir.join("max_energy_range_uj"), "262143328850\n").unwrap();
    }

    #[test]
    fn test_counter_delta_monotonic() {
        assert_eq!(counter_delta(1_000, 5_000, 1 << 32), 4_000);
        assert_eq!(counter_delta(0, 0, 1 << 32), 0);
    }

    #[test]
    fn test_counter_delta_wraparound() {
        // Counter wrapped: 10 uj before the limit, 20 uj after
        let max = 1_000_000;
        assert_eq!(counter_delta(max - 10, 20, max), 30);
    }

    #[test]
    fn test_watts_from_delta() {
        // 1 J over 1 s is 1 W
        assert!((watts_from_delta(1_000_000, 1.0) - 1.0).abs() < 1e-9);
        // 0.5 J over 10 ms is 50 W
        assert!((watts_from_delta(500_000, 0.01) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_watts_zero_elapsed_is_finite() {
        assert!(watts_from_delta(1_000_000, 0.0).is_finite());
    }

    #[test]
    fn test_discover_domains_with_subdomains() {
        let tmp = TempDir::new().unwrap();
        fake_domain(tmp.path(), "intel-rapl:0", "package-0", 100);
        fake_domain(tmp.path(), "intel-rapl:0/intel-rapl:0:0", "core", 50);
        fake_domain(tmp.path(), "intel-rapl:1", "package-1", 200);

        let names = RaplSource::available_domains_at(tmp.path()).unwrap();
        assert_eq!(names, vec!["package-0", "package-0-core", "package-1"]);
    }

    #[test]
    fn test_missing_root_is_source_init_error() {
        let tmp = TempDir::new().unwrap();
        let err = RaplSource::with_root(&tmp.path().join("nope"), None).unwrap_err();
        assert!(matches!(err, Error::SourceInit(_)));
    }

    #[test]
    fn test_unknown_domain_lists_available() {
        let tmp = TempDir::new().unwrap();
        fake_domain(tmp.path(), "intel-rapl:0", "package-0", 100);
        let err = RaplSource::with_root(tmp.path(), Some("dram")).unwrap_err();
        assert!(err.to_string().contains("package-0"));
    }

    #[test]
    fn test_default_selection_skips_subdomains() {
        let tmp = TempDir::new().unwrap();
        fake_domain(tmp.path(), "intel-rapl:0", "package-0", 100);
        fake_domain(tmp.path(), "intel-rapl:0/intel-rapl:0:0", "dram", 50);

        let source = RaplSource::with_root(tmp.path(), None).unwrap();
        assert_eq!(source.domains.len(), 1);
        assert_eq!(source.domains[0].name, "package-0");
        assert_eq!(source.id(), "rapl:package");
    }

    #[tokio::test]
    async fn test_read_watts_from_counter_delta() {
        let tmp = TempDir::new().unwrap();
        fake_domain(tmp.path(), "intel-rapl:0", "package-0", 1_000_000);

        let mut source = RaplSource::with_root(tmp.path(), None).unwrap();
        // Advance the counter by 2 J
        write(
            tmp.path().join("intel-rapl:0/energy_uj"),
            "3000000\n",
        )
        .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));

        let watts = source.read_watts().await.unwrap();
        assert!(watts > 0.0);
        assert!(watts.is_finite());
    }

    #[tokio::test]
    async fn test_read_watts_counter_removed_is_transient() {
        let tmp = TempDir::new().unwrap();
        fake_domain(tmp.path(), "intel-rapl:0", "package-0", 100);

        let mut source = RaplSource::with_root(tmp.path(), None).unwrap();
        std::fs::remove_file(tmp.path().join("intel-rapl:0/energy_uj")).unwrap();

        let err = source.read_watts().await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }
}
