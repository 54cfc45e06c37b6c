//! Disk capacity sampler.

use async_trait::async_trait;
use serde::Serialize;

use super::{to_values, SampleError, Sampler};
use crate::metrics::MetricFamily;

#[derive(Debug, Serialize)]
struct DiskValues {
    mounts: Vec<MountEntry>,
}

#[derive(Debug, Serialize)]
struct MountEntry {
    name: String,
    mount_point: String,
    filesystem: String,
    total_bytes: u64,
    used_bytes: u64,
    free_bytes: u64,
}

/// Samples per-mountpoint capacity. Stateless: the disk list is refreshed
/// on every tick so hotplugged volumes appear without a restart.
pub struct DiskSampler;

#[async_trait]
impl Sampler for DiskSampler {
    fn family(&self) -> MetricFamily {
        MetricFamily::Disk
    }

    async fn sample(&self) -> Result<serde_json::Value, SampleError> {
        tokio::task::spawn_blocking(|| {
            let disks = sysinfo::Disks::new_with_refreshed_list();
            let mounts = disks
                .iter()
                .map(|disk| {
                    let total = disk.total_space();
                    let free = disk.available_space();
                    MountEntry {
                        name: disk.name().to_string_lossy().into_owned(),
                        mount_point: disk.mount_point().to_string_lossy().into_owned(),
                        filesystem: disk.file_system().to_string_lossy().into_owned(),
                        total_bytes: total,
                        used_bytes: total.saturating_sub(free),
                        free_bytes: free,
                    }
                })
                .collect();
            to_values(&DiskValues { mounts })
        })
        .await
        .map_err(|e| SampleError(format!("disk sampler task failed: {e}")))?
    }
}
