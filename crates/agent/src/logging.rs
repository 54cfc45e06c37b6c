//! Logging bootstrap driven by the `logger` config section.
//!
//! Console output is always on; a file layer is added when configured.
//! `RUST_LOG` overrides the console level when set.

use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggerSection;
use crate::error::AgentError;

/// Parse a configured level (`debug|info|warn|error`).
fn parse_level(level: &str) -> Result<Level, AgentError> {
    level.parse::<Level>().map_err(|_| {
        AgentError::Config(format!(
            "invalid log level '{level}' (expected debug|info|warn|error)"
        ))
    })
}

/// Install the global tracing subscriber.
pub fn init(logger: &LoggerSection) -> Result<(), AgentError> {
    let console_level = parse_level(&logger.console.level)?;
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));
    let console_layer = fmt::layer()
        .with_target(false)
        .with_filter(console_filter);

    let file_layer = match &logger.file {
        Some(file_config) => {
            let file_level = parse_level(&file_config.level)?;
            if let Some(parent) = Path::new(&file_config.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&file_config.path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file))
                    .with_filter(EnvFilter::new(file_level.to_string())),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AgentError::Config(format!("logging init failed: {e}")))?;
    Ok(())
}
