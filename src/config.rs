//! Configuration management for the subtitle pipeline.
//!
//! Loads configuration from TOML files and provides runtime defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::types::TranslationSettings;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub translation: TranslationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            timing: TimingConfig::default(),
            translation: TranslationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Delay between capture iterations in milliseconds
    #[serde(default = "default_capture_interval")]
    pub capture_interval_ms: u64,

    /// Delay after a failed iteration before the next attempt
    #[serde(default = "default_error_backoff")]
    pub error_backoff_ms: u64,

    /// Poll cadence of a detached display surface
    #[serde(default = "default_channel_poll_interval")]
    pub channel_poll_interval_ms: u64,

    /// Poll cadence of the overlay liveness monitor
    #[serde(default = "default_liveness_poll_interval")]
    pub liveness_poll_interval_ms: u64,

    /// How long stop() waits for the capture loop to wind down
    #[serde(default = "default_stop_grace")]
    pub stop_grace_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            capture_interval_ms: 300,
            error_backoff_ms: 1000,
            channel_poll_interval_ms: 100,
            liveness_poll_interval_ms: 500,
            stop_grace_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Preferred intermediate language for multi-hop routes
    #[serde(default = "default_pivot_language")]
    pub pivot_language: String,

    /// Translation settings applied at startup
    #[serde(default)]
    pub defaults: TranslationSettings,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            pivot_language: "en".to_string(),
            defaults: TranslationSettings::default(),
        }
    }
}

// Default value functions for serde
fn default_log_level() -> String {
    "info".to_string()
}

fn default_capture_interval() -> u64 {
    300
}

fn default_error_backoff() -> u64 {
    1000
}

fn default_channel_poll_interval() -> u64 {
    100
}

fn default_liveness_poll_interval() -> u64 {
    500
}

fn default_stop_grace() -> u64 {
    2000
}

fn default_pivot_language() -> String {
    "en".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_config_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("subtitle-pipeline")
            .join("config.toml")
    }

    /// Save configuration to the default path
    pub fn save(&self) -> std::io::Result<()> {
        self.save_to_path(Self::default_config_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: PathBuf) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

        std::fs::write(&path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}
