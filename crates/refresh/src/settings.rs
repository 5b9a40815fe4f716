use std::path::{Path, PathBuf};

use refresh_core::{ConfigError, UpdaterOptions};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(flatten)]
    pub updater: UpdaterOptions,

    #[serde(default, rename = "debugLogging")]
    pub debug_logging: bool,

    #[serde(default, rename = "logFile")]
    pub log_file: Option<PathBuf>,

    #[serde(default = "default_max_log_size_bytes", rename = "maxLogSizeBytes")]
    pub max_log_size_bytes: u64,

    #[serde(default = "default_http_timeout", rename = "httpTimeoutSecs")]
    pub http_timeout_secs: u64,
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_http_timeout() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            updater: UpdaterOptions::default(),
            debug_logging: false,
            log_file: None,
            max_log_size_bytes: default_max_log_size_bytes(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

impl Settings {
    /// Load settings from `path`. A missing file means defaults.
    ///
    /// # Errors
    /// Returns an error when the file exists but cannot be read, is not
    /// valid JSON, or holds invalid updater options.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let settings: Self =
            serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        settings.updater.validate()?;
        Ok(settings)
    }

    #[must_use]
    pub fn http_timeout(&self) -> Option<std::time::Duration> {
        (self.http_timeout_secs > 0).then(|| std::time::Duration::from_secs(self.http_timeout_secs))
    }
}
