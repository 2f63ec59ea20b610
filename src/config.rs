//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! watchface-config.toml file. It provides a centralized way to configure the
//! emulated screen, clock preferences and the sync spool location.
//!
//! Every section and field has a default, so a partial file is valid:
//!
//! ```toml
//! [display]
//! round = true
//!
//! [clock]
//! use_24_hour = true
//! ```

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "watchface-config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config serialize: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("config IO: {0}")]
    Io(#[from] std::io::Error),
}

/// Application configuration loaded from watchface-config.toml
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Emulated screen and the host capabilities it reports
    pub display: DisplayConfig,
    /// Wall clock preferences
    pub clock: ClockConfig,
    /// Companion sync transport
    pub sync: SyncConfig,
}

/// Emulated screen configuration
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Screen width in pixels
    pub width: u32,
    /// Screen height in pixels
    pub height: u32,
    /// Round screens get the larger text metrics
    pub round: bool,
    /// Baseline of the time row, in pixels from the top
    pub y_offset: f32,
    /// Start (and preview) in ambient mode
    pub ambient: bool,
    /// Screen supports fewer bits per pixel in ambient mode
    pub low_bit_ambient: bool,
    /// Screen requires burn-in protection in ambient mode
    pub burn_in_protection: bool,
}

/// Clock preferences
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ClockConfig {
    pub use_24_hour: bool,
    /// Pin the time zone to a UTC offset; unset follows the system zone
    pub utc_offset_minutes: Option<i32>,
}

/// Spool directory sync transport
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Root holding `inbox/` and `outbox/`
    pub spool_dir: PathBuf,
    /// How often the inbox is checked while listening
    pub poll_interval_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            width: 320,
            height: 320,
            round: false,
            y_offset: 110.0,
            ambient: false,
            low_bit_ambient: false,
            burn_in_protection: false,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            spool_dir: PathBuf::from("spool"),
            poll_interval_ms: 1000,
        }
    }
}

impl Config {
    /// Load configuration from watchface-config.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(
                        "Loaded configuration from {} ({}x{}, {})",
                        path.display(),
                        config.display.width,
                        config.display.height,
                        if config.display.round { "round" } else { "rectangular" }
                    );
                    config
                }
                Err(e) => {
                    warn!("Invalid config file format in {}: {}", path.display(), e);
                    warn!("Using default configuration");
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found at {}, using default configuration", path.display());
                Self::default()
            }
        }
    }

    /// Save current configuration to watchface-config.toml
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(CONFIG_FILE)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.display.width, 320);
        assert_eq!(config.display.height, 320);
        assert!(!config.display.round);
        assert!(!config.clock.use_24_hour);
        assert_eq!(config.clock.utc_offset_minutes, None);
        assert_eq!(config.sync.poll_interval_ms, 1000);
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.clock.utc_offset_minutes = Some(-300);
        config.display.round = true;
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.clock.utc_offset_minutes, Some(-300));
        assert!(parsed.display.round);
        assert_eq!(parsed.sync.spool_dir, config.sync.spool_dir);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: Config = toml::from_str("[clock]\nuse_24_hour = true\n").unwrap();
        assert!(parsed.clock.use_24_hour);
        assert_eq!(parsed.display.width, 320);
        assert_eq!(parsed.sync.spool_dir, PathBuf::from("spool"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert_eq!(config.display.width, 320);
    }

    #[test]
    fn test_load_invalid_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[display]\nwidth = \"wide\"\n").unwrap();
        assert_eq!(Config::load_from_path(&path).display.width, 320);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut config = Config::default();
        config.display.low_bit_ambient = true;
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path);
        assert!(loaded.display.low_bit_ambient);
    }
}
