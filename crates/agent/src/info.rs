//! Identity, heartbeat, and diagnostic wire records.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;

/// Periodic liveness event published on `P.A.event.heartbeat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub agent_id: String,
    /// UTC epoch milliseconds.
    pub timestamp: i64,
}

impl Heartbeat {
    pub fn new(agent_id: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Identity/inventory report published on `P.A.sys.info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub agent_id: String,
    pub hostname: String,
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_version: Option<String>,
    pub arch: String,
    pub agent_version: String,
    /// When this agent process booted, UTC epoch milliseconds.
    pub started_at: i64,
    /// Configured sampling intervals per enabled family, in seconds.
    pub collector_intervals: BTreeMap<String, u64>,
}

/// Gather the inventory record for the configured agent.
pub fn collect(config: &AgentConfig, started_at: i64) -> AgentInfo {
    let collector_intervals = config
        .collector
        .enabled_families()
        .into_iter()
        .map(|family| {
            (
                family.name().to_string(),
                config.collector.interval(family).as_secs(),
            )
        })
        .collect();

    AgentInfo {
        agent_id: config.agent.id.clone(),
        hostname: sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string()),
        os: sysinfo::System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
        os_version: sysinfo::System::os_version(),
        kernel_version: sysinfo::System::kernel_version(),
        arch: std::env::consts::ARCH.to_string(),
        agent_version: env!("CARGO_PKG_VERSION").to_string(),
        started_at,
        collector_intervals,
    }
}

/// Best-effort diagnostic published on `P.A.warn` / `P.A.error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub agent_id: String,
    /// Component that raised the diagnostic (e.g. "collector", "executor").
    pub source: String,
    pub message: String,
    /// UTC epoch milliseconds.
    pub timestamp: i64,
}

impl Diagnostic {
    pub fn new(agent_id: &str, source: &str, message: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            source: source.to_string(),
            message: message.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_carries_id_and_time() {
        let beat = Heartbeat::new("agent-1");
        assert_eq!(beat.agent_id, "agent-1");
        assert!(beat.timestamp > 0);
    }

    #[test]
    fn info_reflects_config() {
        let yaml = r#"
agent:
  id: agent-1
collector:
  cpu: { interval: 2 }
  disk: { enabled: false }
"#;
        let config = AgentConfig::from_yaml(yaml).unwrap();
        let info = collect(&config, 123);

        assert_eq!(info.agent_id, "agent-1");
        assert_eq!(info.started_at, 123);
        assert!(!info.hostname.is_empty());
        assert_eq!(info.agent_version, env!("CARGO_PKG_VERSION"));
        assert_eq!(info.collector_intervals.get("cpu"), Some(&2));
        assert!(!info.collector_intervals.contains_key("disk"));
    }

    #[test]
    fn diagnostic_roundtrip() {
        let diag = Diagnostic::new("agent-1", "executor", "publish failed");
        let bytes = serde_json::to_vec(&diag).unwrap();
        let decoded: Diagnostic = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded.source, "executor");
        assert_eq!(decoded.message, "publish failed");
    }
}
