//! Host uptime sampler.

use async_trait::async_trait;
use serde::Serialize;

use super::{to_values, SampleError, Sampler};
use crate::metrics::MetricFamily;

#[derive(Debug, Serialize)]
struct UptimeValues {
    /// Boot timestamp, UTC epoch seconds.
    boot_time: u64,
    /// Seconds since boot.
    uptime_secs: u64,
}

/// Samples boot timestamp and elapsed uptime.
pub struct UptimeSampler;

#[async_trait]
impl Sampler for UptimeSampler {
    fn family(&self) -> MetricFamily {
        MetricFamily::Uptime
    }

    async fn sample(&self) -> Result<serde_json::Value, SampleError> {
        to_values(&UptimeValues {
            boot_time: sysinfo::System::boot_time(),
            uptime_secs: sysinfo::System::uptime(),
        })
    }
}
