//! Command Line Interface module
//!
//! Implements the CLI commands and argument parsing for chartsync.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "chartsync")]
#[command(about = "Chart overlay reconciliation engine")]
#[command(long_about = "Keeps position and limit-order price lines on a chart in sync with trading state")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    #[arg(long, default_value = "config.toml")]
    pub config_file: String,

    /// Log level (trace, debug, info, warn, error); defaults to the config's log_level
    #[arg(long)]
    pub log_level: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Replay a scenario file against an in-memory chart
    Run {
        /// Scenario JSON file
        #[arg(long)]
        scenario: PathBuf,

        /// Override the scenario's starting symbol
        #[arg(long)]
        symbol: Option<String>,
    },

    /// Replay the built-in demo scenario
    Demo,

    /// Show which saved drawings would be restored for a symbol
    Drawings {
        /// Symbol to inspect (defaults to chart.default_symbol)
        #[arg(long)]
        symbol: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Demo
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the actual command, using default if none provided
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or_default()
    }

    /// Log level to use: `--verbose`, then `--log-level`, then the configured level
    pub fn effective_log_level(&self, configured: &str) -> String {
        if self.verbose {
            "debug".to_string()
        } else {
            self.log_level.clone().unwrap_or_else(|| configured.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::parse_from(["chartsync", "run", "--scenario", "steps.json", "--symbol", "btc"]);
        match cli.command() {
            Commands::Run { scenario, symbol } => {
                assert_eq!(scenario, PathBuf::from("steps.json"));
                assert_eq!(symbol.as_deref(), Some("btc"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_default_command_and_verbose() {
        let cli = Cli::parse_from(["chartsync", "-v"]);
        assert!(matches!(cli.command(), Commands::Demo));
        assert_eq!(cli.effective_log_level("warn"), "debug");
    }

    #[test]
    fn test_log_level_falls_back_to_config() {
        let cli = Cli::parse_from(["chartsync", "demo"]);
        assert_eq!(cli.effective_log_level("warn"), "warn");

        let cli = Cli::parse_from(["chartsync", "--log-level", "trace", "demo"]);
        assert_eq!(cli.effective_log_level("warn"), "trace");
    }
}
