use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A category of host metric sampled by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricFamily {
    #[serde(rename = "cpu")]
    Cpu,
    #[serde(rename = "mem")]
    Memory,
    #[serde(rename = "disk")]
    Disk,
    #[serde(rename = "net")]
    Network,
    #[serde(rename = "load")]
    Load,
    #[serde(rename = "uptime")]
    Uptime,
}

impl MetricFamily {
    /// All families, in registration order.
    pub const ALL: [MetricFamily; 6] = [
        MetricFamily::Cpu,
        MetricFamily::Memory,
        MetricFamily::Disk,
        MetricFamily::Network,
        MetricFamily::Load,
        MetricFamily::Uptime,
    ];

    /// Configuration key for this family (`collector.<name>`).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Disk => "disk",
            Self::Network => "network",
            Self::Load => "load",
            Self::Uptime => "uptime",
        }
    }

    /// Default subject suffix (`P.A.sys.<suffix>`).
    pub fn default_suffix(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "mem",
            Self::Disk => "disk",
            Self::Network => "network",
            Self::Load => "load",
            Self::Uptime => "uptime",
        }
    }

    /// Default sampling interval.
    pub fn default_interval(&self) -> Duration {
        match self {
            Self::Cpu => Duration::from_secs(10),
            Self::Memory => Duration::from_secs(30),
            Self::Disk => Duration::from_secs(60),
            Self::Network => Duration::from_secs(30),
            Self::Load => Duration::from_secs(30),
            Self::Uptime => Duration::from_secs(300),
        }
    }
}

impl std::fmt::Display for MetricFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A timestamped, typed sample for one metric family.
///
/// Created per tick in the sampler, published once as a JSON document,
/// then discarded — the bus owns durability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Family tag (`cpu|mem|disk|net|load|uptime`).
    pub family: MetricFamily,
    /// Id of the agent that collected this sample.
    pub agent_id: String,
    /// Acquisition timestamp, UTC epoch milliseconds.
    pub collected_at: i64,
    /// Family-specific measurement document (snake_case numeric fields).
    pub values: serde_json::Value,
}

impl MetricRecord {
    /// Create a record stamped with the current time.
    pub fn new(family: MetricFamily, agent_id: &str, values: serde_json::Value) -> Self {
        Self {
            family,
            agent_id: agent_id.to_string(),
            collected_at: Utc::now().timestamp_millis(),
            values,
        }
    }
}
