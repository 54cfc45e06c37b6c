use clap::{Parser, Subcommand};

/// Host monitoring agent for the watchdog platform.
///
/// Samples host metrics onto the bus and executes remote commands
/// received on the agent's mailbox subject.
#[derive(Parser, Debug)]
#[command(name = "watchdog", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the agent and run until SIGINT/SIGTERM.
    Start {
        /// Path to the YAML configuration file.
        #[arg(long, env = "WATCHDOG_CONFIG", default_value = "watchdog.yaml")]
        config: String,
    },

    /// Print the agent version.
    Version,

    /// Inspect and manage the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration with defaults applied.
    Show {
        #[arg(long, env = "WATCHDOG_CONFIG", default_value = "watchdog.yaml")]
        config: String,
    },

    /// Check that the configuration file parses and validates.
    Validate {
        #[arg(long, env = "WATCHDOG_CONFIG", default_value = "watchdog.yaml")]
        config: String,
    },

    /// Write a commented starter configuration with a generated agent id.
    Init {
        #[arg(long, env = "WATCHDOG_CONFIG", default_value = "watchdog.yaml")]
        config: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_with_config_flag() {
        let cli = Cli::parse_from(["watchdog", "start", "--config", "/etc/watchdog.yaml"]);
        match cli.command {
            Commands::Start { config } => assert_eq!(config, "/etc/watchdog.yaml"),
            other => panic!("expected start, got {other:?}"),
        }
    }

    #[test]
    fn parses_config_subcommands() {
        let cli = Cli::parse_from(["watchdog", "config", "init"]);
        match cli.command {
            Commands::Config {
                action: ConfigAction::Init { config },
            } => assert_eq!(config, "watchdog.yaml"),
            other => panic!("expected config init, got {other:?}"),
        }
    }

    #[test]
    fn parses_version() {
        let cli = Cli::parse_from(["watchdog", "version"]);
        assert!(matches!(cli.command, Commands::Version));
    }
}
