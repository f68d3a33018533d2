//! Persistent application configuration
//!
//! Stores session timing, default output paths and the simulated loop size
//! in a JSON file at `<config_dir>/usbloop/config.json`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use usbloop_core::SessionConfig;

fn default_capture_path() -> PathBuf {
    PathBuf::from("output.wav")
}

fn default_loop_capacity() -> usize {
    1 << 20
}

/// Persistent application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Session timing and sizing
    #[serde(default)]
    pub session: SessionConfig,
    /// Where captures are written when no output is given
    #[serde(default = "default_capture_path")]
    pub capture_path: PathBuf,
    /// Where session reports are written (None = no report)
    #[serde(default)]
    pub report_path: Option<PathBuf>,
    /// Samples the simulated analog loop can hold
    #[serde(default = "default_loop_capacity")]
    pub loop_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            capture_path: default_capture_path(),
            report_path: None,
            loop_capacity: default_loop_capacity(),
        }
    }
}

impl AppConfig {
    /// Config file path: `<config_dir>/usbloop/config.json`
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("usbloop")
            .join("config.json")
    }

    /// Load config from `path`, falling back to defaults on any error
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded config from disk");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }
}
