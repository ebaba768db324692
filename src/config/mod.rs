//! Configuration management module
//!
//! Handles loading, validation, and management of application configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::overlay::LabelAlignment;
use crate::trading::{OverlayFlags, normalize_symbol};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Logging level
    pub log_level: String,

    /// File-based logging configuration
    pub log: LogConfig,

    /// Chart widget configuration
    pub chart: ChartConfig,

    /// Initial overlay flags
    pub overlay: OverlayConfig,

    /// Drawing storage configuration
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Absolute or relative path to the log file
    pub file_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Symbol shown when the chart starts
    pub default_symbol: String,

    /// Side of the line on which labels are drawn
    pub label_alignment: LabelAlignment,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Draw break-even lines for positions
    pub show_break_even_line: bool,

    /// Append position size in USD to line labels
    pub toggle_size_usd_in_chart: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file backing the drawing store
    pub drawings_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log: LogConfig::default(),
            chart: ChartConfig::default(),
            overlay: OverlayConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file_path: "logs/chartsync.log".to_string(),
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            default_symbol: "SOL".to_string(),
            label_alignment: LabelAlignment::Right,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            drawings_path: "chart_drawings.json".to_string(),
        }
    }
}

impl OverlayConfig {
    pub fn flags(&self) -> OverlayFlags {
        OverlayFlags {
            show_break_even_line: self.show_break_even_line,
            toggle_size_usd_in_chart: self.toggle_size_usd_in_chart,
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        config.apply_env_overrides();

        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        // CHARTSYNC_LOG_LEVEL - logging level
        if let Ok(log_level) = env::var("CHARTSYNC_LOG_LEVEL") {
            self.log_level = log_level;
        }

        // CHARTSYNC_LOG_FILE_PATH - logging destination file
        if let Ok(file_path) = env::var("CHARTSYNC_LOG_FILE_PATH") {
            if !file_path.trim().is_empty() {
                self.log.file_path = file_path;
            }
        }

        // CHARTSYNC_SYMBOL - initial chart symbol
        if let Ok(symbol) = env::var("CHARTSYNC_SYMBOL") {
            if !symbol.trim().is_empty() {
                self.chart.default_symbol = symbol;
            }
        }

        // CHARTSYNC_LABEL_ALIGNMENT - left or right
        if let Ok(alignment) = env::var("CHARTSYNC_LABEL_ALIGNMENT") {
            match alignment.parse() {
                Ok(value) => self.chart.label_alignment = value,
                Err(err) => tracing::warn!("Ignoring CHARTSYNC_LABEL_ALIGNMENT: {}", err),
            }
        }

        // CHARTSYNC_SHOW_BREAK_EVEN_LINE - draw break-even lines
        if let Ok(show) = env::var("CHARTSYNC_SHOW_BREAK_EVEN_LINE") {
            self.overlay.show_break_even_line = show.parse().unwrap_or(self.overlay.show_break_even_line);
        }

        // CHARTSYNC_SIZE_USD_IN_CHART - append size to labels
        if let Ok(sized) = env::var("CHARTSYNC_SIZE_USD_IN_CHART") {
            self.overlay.toggle_size_usd_in_chart =
                sized.parse().unwrap_or(self.overlay.toggle_size_usd_in_chart);
        }

        // CHARTSYNC_DRAWINGS_PATH - drawing store file
        if let Ok(path) = env::var("CHARTSYNC_DRAWINGS_PATH") {
            if !path.trim().is_empty() {
                self.storage.drawings_path = path;
            }
        }
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load_from_file(path).unwrap_or_else(|err| {
            tracing::warn!("Failed to load config: {}, using defaults", err);
            let mut config = Self::default();
            config.apply_env_overrides();
            config
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if normalize_symbol(&self.chart.default_symbol).is_empty() {
            anyhow::bail!("chart.default_symbol must not be empty");
        }

        if self.log.file_path.trim().is_empty() {
            anyhow::bail!("Log file path must not be empty");
        }

        if self.storage.drawings_path.trim().is_empty() {
            anyhow::bail!("storage.drawings_path must not be empty");
        }

        match self.log_level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => anyhow::bail!("Invalid log level: {}", other),
        }
    }

    /// Display formatted configuration
    pub fn display(&self) -> Result<()> {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(self).context("Failed to serialize configuration")?);
        Ok(())
    }

    /// Display configuration management help
    pub fn display_help() -> Result<()> {
        println!("Configuration management commands:");
        println!("  chartsync config show    - Show current configuration");
        println!("  chartsync config reset   - Write default configuration to the config file");
        Ok(())
    }

    /// Handle configuration command
    pub fn handle_command(action: &Option<crate::cli::ConfigAction>, config_file: &str) -> Result<()> {
        match action {
            Some(crate::cli::ConfigAction::Show) => {
                let config = Config::load_or_default(config_file);
                config.display()?;
            }
            Some(crate::cli::ConfigAction::Reset) => {
                let default_config = Config::default();
                default_config.save_to_file(config_file)?;
                println!("Default configuration written to {}", config_file);
                default_config.display()?;
            }
            None => {
                Config::display_help()?;
            }
        }
        Ok(())
    }
}
