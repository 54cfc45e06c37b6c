//! Memory and swap sampler.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;

use super::{to_values, SampleError, Sampler};
use crate::metrics::MetricFamily;

#[derive(Debug, Serialize)]
struct MemoryValues {
    total_bytes: u64,
    used_bytes: u64,
    free_bytes: u64,
    available_bytes: u64,
    /// Page-cache bytes; only reported where the OS exposes them.
    #[serde(skip_serializing_if = "Option::is_none")]
    cached_bytes: Option<u64>,
    /// Buffer bytes; only reported where the OS exposes them.
    #[serde(skip_serializing_if = "Option::is_none")]
    buffer_bytes: Option<u64>,
    swap_total_bytes: u64,
    swap_used_bytes: u64,
}

/// Samples RAM and swap occupancy via sysinfo, plus cached/buffer pages
/// from `/proc/meminfo` on Linux.
pub struct MemorySampler {
    system: Arc<Mutex<sysinfo::System>>,
}

impl MemorySampler {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(sysinfo::System::new())),
        }
    }
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sampler for MemorySampler {
    fn family(&self) -> MetricFamily {
        MetricFamily::Memory
    }

    async fn sample(&self) -> Result<serde_json::Value, SampleError> {
        let system = self.system.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = system
                .lock()
                .map_err(|_| SampleError("memory sampler state poisoned".into()))?;
            sys.refresh_memory();

            let (cached_bytes, buffer_bytes) = read_page_cache();
            let values = MemoryValues {
                total_bytes: sys.total_memory(),
                used_bytes: sys.used_memory(),
                free_bytes: sys.free_memory(),
                available_bytes: sys.available_memory(),
                cached_bytes,
                buffer_bytes,
                swap_total_bytes: sys.total_swap(),
                swap_used_bytes: sys.used_swap(),
            };
            to_values(&values)
        })
        .await
        .map_err(|e| SampleError(format!("memory sampler task failed: {e}")))?
    }
}

/// Cached and buffer byte counts from `/proc/meminfo`.
#[cfg(target_os = "linux")]
fn read_page_cache() -> (Option<u64>, Option<u64>) {
    let Ok(content) = std::fs::read_to_string("/proc/meminfo") else {
        return (None, None);
    };
    let field = |name: &str| {
        content.lines().find_map(|line| {
            let rest = line.strip_prefix(name)?;
            // Lines look like "Cached:          1234 kB".
            let kb: u64 = rest.trim().split_whitespace().next()?.parse().ok()?;
            Some(kb * 1024)
        })
    };
    (field("Cached:"), field("Buffers:"))
}

#[cfg(not(target_os = "linux"))]
fn read_page_cache() -> (Option<u64>, Option<u64>) {
    (None, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sample_reports_plausible_totals() {
        let sampler = MemorySampler::new();
        let values = sampler.sample().await.unwrap();

        let total = values["total_bytes"].as_u64().unwrap();
        let used = values["used_bytes"].as_u64().unwrap();
        assert!(total > 0);
        assert!(used <= total);
        assert!(values["swap_total_bytes"].is_u64());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn linux_reports_page_cache() {
        let sampler = MemorySampler::new();
        let values = sampler.sample().await.unwrap();
        assert!(values["cached_bytes"].is_u64());
    }
}
