mod cli;

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use uuid::Uuid;

use watchdog_agent::{logging, Agent, AgentConfig};

use crate::cli::{Cli, Commands, ConfigAction};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    match args.command {
        Commands::Start { config } => run_start(&config).await,
        Commands::Version => {
            println!("watchdog {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Config { action } => run_config(action),
    }
}

/// Boot the agent and run until a shutdown signal arrives.
async fn run_start(path: &str) -> Result<()> {
    let config = AgentConfig::from_file(path)
        .with_context(|| format!("failed to load configuration from {path}"))?;
    logging::init(&config.logger).context("failed to initialize logging")?;

    let shutdown_timeout = config.shutdown_timeout();
    let agent = Agent::connect(config)
        .await
        .context("failed to connect to the bus")?;

    if let Err(e) = agent.start().await {
        // Best-effort teardown of whatever came up before the failure.
        let _ = tokio::time::timeout(shutdown_timeout, agent.stop()).await;
        return Err(anyhow::Error::new(e).context("agent failed to start"));
    }

    shutdown_signal().await;
    tracing::info!("shutdown signal received");

    // Graceful stop under the configured budget; on expiry the process
    // exits regardless of outstanding tasks.
    match tokio::time::timeout(shutdown_timeout, agent.stop()).await {
        Ok(Ok(())) => tracing::info!("agent stopped gracefully"),
        Ok(Err(e)) => tracing::warn!(error = %e, "agent stop returned error"),
        Err(_) => {
            tracing::warn!(timeout = ?shutdown_timeout, "agent stop timed out, forcing exit")
        }
    }
    Ok(())
}

fn run_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show { config } => {
            let loaded = AgentConfig::from_file(&config)
                .with_context(|| format!("failed to load configuration from {config}"))?;
            print!("{}", loaded.to_yaml()?);
            Ok(())
        }
        ConfigAction::Validate { config } => {
            AgentConfig::from_file(&config)
                .with_context(|| format!("configuration at {config} is invalid"))?;
            println!("{config} is valid");
            Ok(())
        }
        ConfigAction::Init { config } => {
            if Path::new(&config).exists() {
                bail!("refusing to overwrite existing configuration at {config}");
            }
            let agent_id = format!("agent-{}", Uuid::new_v4());
            std::fs::write(&config, AgentConfig::template(&agent_id))
                .with_context(|| format!("failed to write {config}"))?;
            println!("wrote starter configuration to {config} (agent id: {agent_id})");
            Ok(())
        }
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for ctrl_c");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_init_then_validate_and_show() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchdog.yaml");
        let path_str = path.display().to_string();

        run_config(ConfigAction::Init {
            config: path_str.clone(),
        })
        .unwrap();
        assert!(path.exists());

        run_config(ConfigAction::Validate {
            config: path_str.clone(),
        })
        .unwrap();
        run_config(ConfigAction::Show { config: path_str }).unwrap();
    }

    #[test]
    fn config_init_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchdog.yaml");
        std::fs::write(&path, "agent:\n  id: keep\n").unwrap();

        let err = run_config(ConfigAction::Init {
            config: path.display().to_string(),
        })
        .unwrap_err();
        assert!(err.to_string().contains("refusing to overwrite"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "agent:\n  id: keep\n"
        );
    }

    #[test]
    fn config_validate_rejects_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchdog.yaml");
        std::fs::write(&path, "agent:\n  id: \"has space\"\n").unwrap();

        assert!(run_config(ConfigAction::Validate {
            config: path.display().to_string(),
        })
        .is_err());
    }
}
