//! Agent configuration: YAML document, defaults, and validation.
//!
//! The file layout mirrors the option paths operators see in docs:
//! `agent.*`, `collector.<family>.*`, `bus.*`, `logger.*`,
//! `shutdown_timeout_sec`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use watchdog_bus::{validate_agent_id, Transport, DEFAULT_SUBJECT_PREFIX};

use crate::error::AgentError;
use crate::metrics::MetricFamily;

// ── Top-level config ────────────────────────────────────────────────

/// Full agent configuration, parsed from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Identity and reporting cadence.
    pub agent: AgentSection,

    /// Per-family collector settings and the shared subject prefix.
    #[serde(default)]
    pub collector: CollectorSection,

    /// Bus endpoints.
    #[serde(default)]
    pub bus: BusSection,

    /// Logging levels for console and optional file output.
    #[serde(default)]
    pub logger: LoggerSection,

    /// Budget for graceful shutdown, in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_sec: u64,
}

fn default_shutdown_timeout() -> u64 {
    10
}

impl AgentConfig {
    /// Parse config from a YAML string and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self, AgentError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Validate invariants the type system cannot express.
    pub fn validate(&self) -> Result<(), AgentError> {
        validate_agent_id(&self.agent.id)
            .map_err(|e| AgentError::Config(format!("agent.id: {e}")))?;
        if self.agent.heartbeat_interval == 0 {
            return Err(AgentError::Config(
                "agent.heartbeat_interval must be > 0".into(),
            ));
        }
        if self.agent.info_report_interval == 0 {
            return Err(AgentError::Config(
                "agent.info_report_interval must be > 0".into(),
            ));
        }
        if self.collector.subject_prefix.is_empty() {
            return Err(AgentError::Config(
                "collector.subject_prefix must not be empty".into(),
            ));
        }
        if self.shutdown_timeout_sec == 0 {
            return Err(AgentError::Config("shutdown_timeout_sec must be > 0".into()));
        }
        for family in MetricFamily::ALL {
            let fam = self.collector.family(family);
            if fam.enabled && fam.interval == Some(0) {
                return Err(AgentError::Config(format!(
                    "collector.{family}.interval must be > 0"
                )));
            }
        }
        self.bus.publish_transports()?;
        self.bus.subscribe_transports()?;
        Ok(())
    }

    /// Render the config back to YAML (for `config show`).
    pub fn to_yaml(&self) -> Result<String, AgentError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.agent.heartbeat_interval)
    }

    pub fn info_report_interval(&self) -> Duration {
        Duration::from_secs(self.agent.info_report_interval)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_sec)
    }

    /// Commented starter config written by `config init`.
    pub fn template(agent_id: &str) -> String {
        format!(
            r#"# watchdog agent configuration
agent:
  # Subject key for everything this agent publishes. [A-Za-z0-9_-]+ only.
  id: {agent_id}
  # Seconds between heartbeat events on <prefix>.<id>.event.heartbeat.
  heartbeat_interval: 5
  # Seconds between identity/inventory reports on <prefix>.<id>.sys.info.
  info_report_interval: 600

collector:
  # Prefix for every subject the agent owns.
  subject_prefix: "wd.a."
  # Per-family sampling. Omitted families use the defaults shown here.
  cpu:
    enabled: true
    interval: 10
    subject_suffix: cpu
  memory:
    enabled: true
    interval: 30
    subject_suffix: mem
  disk:
    enabled: true
    interval: 60
    subject_suffix: disk
  network:
    enabled: true
    interval: 30
    subject_suffix: network
  load:
    enabled: true
    interval: 30
    subject_suffix: load
  uptime:
    enabled: true
    interval: 300
    subject_suffix: uptime

bus:
  # Broker frontend endpoints the agent publishes to.
  urls:
    - tcp://127.0.0.1:5555
  # Broker backend endpoints the agent's mailbox subscription connects to.
  subscribe_urls:
    - tcp://127.0.0.1:5556

logger:
  console:
    level: info
  # Uncomment to also log to a file:
  # file:
  #   level: debug
  #   path: /var/log/watchdog/agent.log

# Remote commands sent to the mailbox: a command with `args` is executed
# directly (exec-style, no shell); a command without `args` is run as a
# shell line via `sh -c`. Keep this in mind when quoting.

shutdown_timeout_sec: 10
"#
        )
    }
}

// ── Section configs ─────────────────────────────────────────────────

/// Identity and reporting cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    /// Stable agent id, used as the key in every subject the agent owns.
    pub id: String,

    /// Seconds between heartbeat events (default 5).
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,

    /// Seconds between identity/inventory reports (default 600).
    #[serde(default = "default_info_report_interval")]
    pub info_report_interval: u64,
}

fn default_heartbeat_interval() -> u64 {
    5
}

fn default_info_report_interval() -> u64 {
    600
}

/// Collector section: subject prefix plus one block per metric family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorSection {
    /// Prefix `P` for every subject the agent owns (default `wd.a.`).
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,

    #[serde(default)]
    pub cpu: FamilyConfig,
    #[serde(default)]
    pub memory: FamilyConfig,
    #[serde(default)]
    pub disk: FamilyConfig,
    #[serde(default)]
    pub network: FamilyConfig,
    #[serde(default)]
    pub load: FamilyConfig,
    #[serde(default)]
    pub uptime: FamilyConfig,
}

fn default_subject_prefix() -> String {
    DEFAULT_SUBJECT_PREFIX.to_string()
}

impl Default for CollectorSection {
    fn default() -> Self {
        Self {
            subject_prefix: default_subject_prefix(),
            cpu: FamilyConfig::default(),
            memory: FamilyConfig::default(),
            disk: FamilyConfig::default(),
            network: FamilyConfig::default(),
            load: FamilyConfig::default(),
            uptime: FamilyConfig::default(),
        }
    }
}

impl CollectorSection {
    /// The config block for a family.
    pub fn family(&self, family: MetricFamily) -> &FamilyConfig {
        match family {
            MetricFamily::Cpu => &self.cpu,
            MetricFamily::Memory => &self.memory,
            MetricFamily::Disk => &self.disk,
            MetricFamily::Network => &self.network,
            MetricFamily::Load => &self.load,
            MetricFamily::Uptime => &self.uptime,
        }
    }

    /// Effective sampling interval for a family.
    pub fn interval(&self, family: MetricFamily) -> Duration {
        self.family(family)
            .interval
            .map(Duration::from_secs)
            .unwrap_or_else(|| family.default_interval())
    }

    /// Effective subject suffix for a family.
    pub fn suffix(&self, family: MetricFamily) -> String {
        self.family(family)
            .subject_suffix
            .clone()
            .unwrap_or_else(|| family.default_suffix().to_string())
    }

    /// Families with `enabled: true`, in registration order.
    pub fn enabled_families(&self) -> Vec<MetricFamily> {
        MetricFamily::ALL
            .into_iter()
            .filter(|f| self.family(*f).enabled)
            .collect()
    }
}

/// Per-family collector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyConfig {
    /// Whether this family is sampled at all (default true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Sampling interval in seconds (default is per-family).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,

    /// Subject suffix override (default is the family's wire name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_suffix: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Default for FamilyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: None,
            subject_suffix: None,
        }
    }
}

/// Bus endpoints section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusSection {
    /// Broker frontend endpoints the agent publishes to.
    #[serde(default = "default_publish_urls")]
    pub urls: Vec<String>,

    /// Broker backend endpoints the mailbox subscription connects to.
    #[serde(default = "default_subscribe_urls")]
    pub subscribe_urls: Vec<String>,
}

fn default_publish_urls() -> Vec<String> {
    vec!["tcp://127.0.0.1:5555".to_string()]
}

fn default_subscribe_urls() -> Vec<String> {
    vec!["tcp://127.0.0.1:5556".to_string()]
}

impl Default for BusSection {
    fn default() -> Self {
        Self {
            urls: default_publish_urls(),
            subscribe_urls: default_subscribe_urls(),
        }
    }
}

impl BusSection {
    /// Parsed publish (broker frontend) endpoints.
    pub fn publish_transports(&self) -> Result<Vec<Transport>, AgentError> {
        if self.urls.is_empty() {
            return Err(AgentError::Config("bus.urls must not be empty".into()));
        }
        self.urls
            .iter()
            .map(|u| Transport::parse(u).map_err(AgentError::Bus))
            .collect()
    }

    /// Parsed subscribe (broker backend) endpoints.
    pub fn subscribe_transports(&self) -> Result<Vec<Transport>, AgentError> {
        if self.subscribe_urls.is_empty() {
            return Err(AgentError::Config(
                "bus.subscribe_urls must not be empty".into(),
            ));
        }
        self.subscribe_urls
            .iter()
            .map(|u| Transport::parse(u).map_err(AgentError::Bus))
            .collect()
    }
}

/// Logging section: console always, file output optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggerSection {
    #[serde(default)]
    pub console: ConsoleLogConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileLogConfig>,
}

/// Console log output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleLogConfig {
    /// `debug|info|warn|error` (default info).
    #[serde(default = "default_console_level")]
    pub level: String,
}

fn default_console_level() -> String {
    "info".to_string()
}

impl Default for ConsoleLogConfig {
    fn default() -> Self {
        Self {
            level: default_console_level(),
        }
    }
}

/// File log output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileLogConfig {
    /// `debug|info|warn|error` (default debug).
    #[serde(default = "default_file_level")]
    pub level: String,

    /// Path the log file is appended to.
    pub path: String,
}

fn default_file_level() -> String {
    "debug".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "agent:\n  id: agent-1\n";

    #[test]
    fn minimal_config_gets_defaults() {
        let config = AgentConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.agent.id, "agent-1");
        assert_eq!(config.agent.heartbeat_interval, 5);
        assert_eq!(config.agent.info_report_interval, 600);
        assert_eq!(config.collector.subject_prefix, "wd.a.");
        assert_eq!(config.shutdown_timeout_sec, 10);
        assert_eq!(config.bus.urls, vec!["tcp://127.0.0.1:5555"]);
    }

    #[test]
    fn all_families_enabled_by_default() {
        let config = AgentConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.collector.enabled_families(), MetricFamily::ALL.to_vec());
    }

    #[test]
    fn family_defaults_resolve() {
        let config = AgentConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(
            config.collector.interval(MetricFamily::Cpu),
            Duration::from_secs(10)
        );
        assert_eq!(
            config.collector.interval(MetricFamily::Uptime),
            Duration::from_secs(300)
        );
        assert_eq!(config.collector.suffix(MetricFamily::Memory), "mem");
        assert_eq!(config.collector.suffix(MetricFamily::Network), "network");
    }

    #[test]
    fn family_overrides_apply() {
        let yaml = r#"
agent:
  id: agent-1
collector:
  cpu:
    interval: 1
  disk:
    enabled: false
  network:
    subject_suffix: net
"#;
        let config = AgentConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.collector.interval(MetricFamily::Cpu),
            Duration::from_secs(1)
        );
        assert_eq!(config.collector.suffix(MetricFamily::Network), "net");
        assert!(!config
            .collector
            .enabled_families()
            .contains(&MetricFamily::Disk));
    }

    #[test]
    fn rejects_missing_agent_id() {
        assert!(AgentConfig::from_yaml("agent:\n  id: \"\"\n").is_err());
    }

    #[test]
    fn rejects_dotted_agent_id() {
        assert!(AgentConfig::from_yaml("agent:\n  id: a.b\n").is_err());
    }

    #[test]
    fn rejects_zero_intervals() {
        assert!(AgentConfig::from_yaml("agent:\n  id: a\n  heartbeat_interval: 0\n").is_err());
        let yaml = "agent:\n  id: a\ncollector:\n  cpu:\n    interval: 0\n";
        assert!(AgentConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn rejects_bad_bus_url() {
        let yaml = "agent:\n  id: a\nbus:\n  urls: [\"nats://x:1\"]\n";
        assert!(AgentConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn rejects_empty_bus_urls() {
        let yaml = "agent:\n  id: a\nbus:\n  urls: []\n";
        assert!(AgentConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn template_is_valid_config() {
        let config = AgentConfig::from_yaml(&AgentConfig::template("agent-42")).unwrap();
        assert_eq!(config.agent.id, "agent-42");
        assert_eq!(
            config.collector.interval(MetricFamily::Disk),
            Duration::from_secs(60)
        );
        assert!(config.logger.file.is_none());
    }

    #[test]
    fn show_roundtrip() {
        let config = AgentConfig::from_yaml(MINIMAL).unwrap();
        let shown = config.to_yaml().unwrap();
        let reparsed = AgentConfig::from_yaml(&shown).unwrap();
        assert_eq!(reparsed.agent.id, config.agent.id);
        assert_eq!(reparsed.shutdown_timeout_sec, config.shutdown_timeout_sec);
    }

    #[test]
    fn from_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchdog.yaml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = AgentConfig::from_file(&path).unwrap();
        assert_eq!(config.agent.id, "agent-1");
    }
}
