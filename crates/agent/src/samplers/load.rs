//! Load average sampler.

use async_trait::async_trait;
use serde::Serialize;

use super::{to_values, SampleError, Sampler};
use crate::metrics::MetricFamily;

#[derive(Debug, Serialize)]
struct LoadValues {
    load_1: f64,
    load_5: f64,
    load_15: f64,
}

/// Samples 1/5/15 minute load averages. Platforms without the concept
/// (Windows) report zeros via sysinfo.
pub struct LoadSampler;

#[async_trait]
impl Sampler for LoadSampler {
    fn family(&self) -> MetricFamily {
        MetricFamily::Load
    }

    async fn sample(&self) -> Result<serde_json::Value, SampleError> {
        let avg = sysinfo::System::load_average();
        to_values(&LoadValues {
            load_1: avg.one,
            load_5: avg.five,
            load_15: avg.fifteen,
        })
    }
}
