//! Network interface counter sampler.

use async_trait::async_trait;
use serde::Serialize;

use super::{to_values, SampleError, Sampler};
use crate::metrics::MetricFamily;

#[derive(Debug, Serialize)]
struct NetworkValues {
    interfaces: Vec<InterfaceEntry>,
}

/// Cumulative counters since boot; consumers derive rates from deltas.
#[derive(Debug, Serialize)]
struct InterfaceEntry {
    name: String,
    rx_bytes: u64,
    tx_bytes: u64,
    rx_packets: u64,
    tx_packets: u64,
    rx_errors: u64,
    tx_errors: u64,
}

/// Samples per-interface traffic counters. Stateless, like [`super::DiskSampler`].
pub struct NetworkSampler;

#[async_trait]
impl Sampler for NetworkSampler {
    fn family(&self) -> MetricFamily {
        MetricFamily::Network
    }

    async fn sample(&self) -> Result<serde_json::Value, SampleError> {
        tokio::task::spawn_blocking(|| {
            let networks = sysinfo::Networks::new_with_refreshed_list();
            let interfaces = networks
                .iter()
                .map(|(name, data)| InterfaceEntry {
                    name: name.clone(),
                    rx_bytes: data.total_received(),
                    tx_bytes: data.total_transmitted(),
                    rx_packets: data.total_packets_received(),
                    tx_packets: data.total_packets_transmitted(),
                    rx_errors: data.total_errors_on_received(),
                    tx_errors: data.total_errors_on_transmitted(),
                })
                .collect();
            to_values(&NetworkValues { interfaces })
        })
        .await
        .map_err(|e| SampleError(format!("network sampler task failed: {e}")))?
    }
}
