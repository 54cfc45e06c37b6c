//! Metric samplers, one per family.
//!
//! A sampler is a small, internally synchronized object that produces the
//! family-specific measurement document for one tick. Samplers never retry
//! and never block the async runtime: procfs and sysinfo reads run under
//! `spawn_blocking`, and the owning collector bounds every call with the
//! per-tick deadline.

mod cpu;
mod disk;
mod load;
mod memory;
mod network;
mod uptime;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::metrics::MetricFamily;

pub use cpu::CpuSampler;
pub use disk::DiskSampler;
pub use load::LoadSampler;
pub use memory::MemorySampler;
pub use network::NetworkSampler;
pub use uptime::UptimeSampler;

/// Transient metric acquisition failure (e.g. a procfs read error).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SampleError(pub String);

/// Produces one measurement document per call for a single metric family.
///
/// Implementations are safe for concurrent invocation; any state they keep
/// (previous counter snapshots, a sysinfo handle) is internally locked.
#[async_trait]
pub trait Sampler: Send + Sync {
    /// The family this sampler produces.
    fn family(&self) -> MetricFamily;

    /// Acquire one sample. Returns the family-specific `values` document.
    async fn sample(&self) -> Result<serde_json::Value, SampleError>;
}

/// Construct the stock sampler for a family.
pub fn default_sampler(family: MetricFamily) -> Arc<dyn Sampler> {
    match family {
        MetricFamily::Cpu => Arc::new(CpuSampler::new()),
        MetricFamily::Memory => Arc::new(MemorySampler::new()),
        MetricFamily::Disk => Arc::new(DiskSampler),
        MetricFamily::Network => Arc::new(NetworkSampler),
        MetricFamily::Load => Arc::new(LoadSampler),
        MetricFamily::Uptime => Arc::new(UptimeSampler),
    }
}

/// Serialize a typed values struct into the wire document.
pub(crate) fn to_values<T: serde::Serialize>(values: &T) -> Result<serde_json::Value, SampleError> {
    serde_json::to_value(values).map_err(|e| SampleError(format!("encode failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_family_has_a_sampler() {
        for family in MetricFamily::ALL {
            let sampler = default_sampler(family);
            assert_eq!(sampler.family(), family);
        }
    }
}
