//! Dependency probes sampled by the health service.

use std::io;

use fruitful_postgres::PgClient;
use serde::{Deserialize, Serialize};

use crate::BoxedError;

/// Checks that the database answers queries.
#[async_trait::async_trait]
pub trait DatabaseProbe: Send + Sync + 'static {
    /// Runs a trivial round trip against the database.
    async fn ping(&self) -> Result<(), BoxedError>;
}

#[async_trait::async_trait]
impl DatabaseProbe for PgClient {
    async fn ping(&self) -> Result<(), BoxedError> {
        PgClient::ping(self).await.map_err(BoxedError::from)
    }
}

/// Process memory in bytes.
///
/// Field names follow the portal's health payload: `heap_used` and `rss` are
/// the resident set, `heap_total` is the memory limit the process runs
/// under, and `external` is mapped but non-resident memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub heap_used: u64,
    pub heap_total: u64,
    pub rss: u64,
    pub external: u64,
}

impl MemoryUsage {
    /// Returns used over available memory.
    pub fn ratio(&self) -> f64 {
        if self.heap_total == 0 {
            return 0.0;
        }
        self.heap_used as f64 / self.heap_total as f64
    }
}

/// Samples process memory usage.
pub trait MemoryProbe: Send + Sync + 'static {
    fn sample(&self) -> io::Result<MemoryUsage>;
}

/// Reads memory usage of the current process from `/proc`.
///
/// The limit is the cgroup memory limit when one is set, capped by the
/// total memory of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemoryProbe;

const PROC_STATUS: &str = "/proc/self/status";
const PROC_MEMINFO: &str = "/proc/meminfo";
const CGROUP_V2_LIMIT: &str = "/sys/fs/cgroup/memory.max";
const CGROUP_V1_LIMIT: &str = "/sys/fs/cgroup/memory/memory.limit_in_bytes";

impl MemoryProbe for ProcessMemoryProbe {
    fn sample(&self) -> io::Result<MemoryUsage> {
        let status = std::fs::read_to_string(PROC_STATUS)?;
        let rss = parse_kib_field(&status, "VmRSS:").ok_or_else(|| invalid("VmRSS missing"))?;
        let virt = parse_kib_field(&status, "VmSize:").unwrap_or(rss);

        let meminfo = std::fs::read_to_string(PROC_MEMINFO)?;
        let total =
            parse_kib_field(&meminfo, "MemTotal:").ok_or_else(|| invalid("MemTotal missing"))?;

        let limit = cgroup_limit().map_or(total, |limit| limit.min(total));
        if limit == 0 {
            return Err(invalid("memory limit is zero"));
        }

        Ok(MemoryUsage {
            heap_used: rss,
            heap_total: limit,
            rss,
            external: virt.saturating_sub(rss),
        })
    }
}

fn invalid(message: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

fn cgroup_limit() -> Option<u64> {
    [CGROUP_V2_LIMIT, CGROUP_V1_LIMIT]
        .into_iter()
        .find_map(|path| std::fs::read_to_string(path).ok())
        .and_then(|raw| parse_cgroup_limit(&raw))
}

/// Parses a `Key:   1234 kB` line and returns the value in bytes.
fn parse_kib_field(contents: &str, key: &str) -> Option<u64> {
    contents
        .lines()
        .find_map(|line| line.strip_prefix(key))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse::<u64>().ok())
        .map(|kib| kib.saturating_mul(1024))
}

/// Parses a cgroup memory limit. `max` means unlimited.
fn parse_cgroup_limit(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw == "max" {
        return None;
    }
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "Name:\tfruitful\nVmPeak:\t  300000 kB\nVmSize:\t  250000 kB\nVmRSS:\t   50000 kB\n";

    #[test]
    fn parses_kib_fields() {
        assert_eq!(parse_kib_field(STATUS, "VmRSS:"), Some(50_000 * 1024));
        assert_eq!(parse_kib_field(STATUS, "VmSize:"), Some(250_000 * 1024));
        assert_eq!(parse_kib_field(STATUS, "VmSwap:"), None);
    }

    #[test]
    fn parses_cgroup_limits() {
        assert_eq!(parse_cgroup_limit("max\n"), None);
        assert_eq!(parse_cgroup_limit("536870912\n"), Some(536_870_912));
        assert_eq!(parse_cgroup_limit("garbage"), None);
    }

    #[test]
    fn ratio_handles_zero_total() {
        let usage = MemoryUsage {
            heap_used: 10,
            heap_total: 0,
            rss: 10,
            external: 0,
        };
        assert_eq!(usage.ratio(), 0.0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn samples_current_process() -> anyhow::Result<()> {
        let usage = ProcessMemoryProbe.sample()?;
        assert!(usage.rss > 0);
        assert!(usage.heap_total > 0);
        assert_eq!(usage.heap_used, usage.rss);
        Ok(())
    }
}
