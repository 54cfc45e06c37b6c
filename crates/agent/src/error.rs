use thiserror::Error;

use crate::metrics::MetricFamily;

/// Errors that can occur in the agent runtime.
///
/// Errors inside a collector tick or a command execution are local — they
/// flip health flags or end up in a `CommandResult` — and never tear down
/// the owning component. Errors during `start` are fatal and bubble up to
/// the binary, which exits non-zero.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("config error: {0}")]
    Config(String),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("bus error: {0}")]
    Bus(#[from] watchdog_bus::BusError),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("sample error for {family}: {message}")]
    Sample {
        family: MetricFamily,
        message: String,
    },

    #[error("collector for {family} is unhealthy")]
    CollectorUnhealthy { family: MetricFamily },

    #[error("{0} is already running")]
    AlreadyRunning(&'static str),

    #[error("task failed: {0}")]
    TaskFailed(String),
}
