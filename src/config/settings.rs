//! Settings management via a JSON config file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::xdg::XdgDirs;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persisted client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the conversation server.
    pub server_url: String,
    /// Seconds between task reconciliation fetches.
    pub poll_interval_secs: u64,
    /// Seconds to wait before reconnecting a dropped event stream.
    pub retry_delay_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".to_string(),
            poll_interval_secs: 30,
            retry_delay_secs: 3,
        }
    }
}

impl Settings {
    /// Path of the settings file.
    pub fn default_path() -> PathBuf {
        XdgDirs::new().config.join("settings.json")
    }

    /// Load settings from the default location.
    ///
    /// A missing or unreadable file yields defaults; settings must never
    /// block startup.
    pub fn load() -> Self {
        match Self::load_from(&Self::default_path()) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!("using default settings: {e}");
                Self::default()
            }
        }
    }

    /// Load settings from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write settings to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}
