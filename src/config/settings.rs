//! Tool settings
//!
//! Which backend the CLI talks to, whether and how the running-app oracle is
//! polled, and the default log level. Stored as TOML next to the UI state file.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants;

/// Top-level settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub oracle: OracleSettings,
}

/// Where profile state lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Read and write the lsfg-vk profile file directly
    #[default]
    File,
    /// Talk to a `serve` process over its Unix socket
    Socket,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default)]
    pub kind: BackendKind,
    /// Override for the lsfg-vk profile file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conf_path: Option<PathBuf>,
    /// Override for the backend socket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleSettings {
    #[serde(default = "default_oracle_enabled")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_oracle_enabled() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    constants::oracle::POLL_INTERVAL_MS
}

fn default_proc_root() -> PathBuf {
    PathBuf::from(constants::oracle::PROC_ROOT)
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            backend: BackendSettings::default(),
            oracle: OracleSettings::default(),
        }
    }
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            enabled: default_oracle_enabled(),
            poll_interval_ms: default_poll_interval_ms(),
            proc_root: default_proc_root(),
        }
    }
}

/// `$XDG_CONFIG_HOME/lsfg-profiles/<filename>`
pub fn app_config_path(filename: &str) -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(constants::config::APP_DIR);
    path.push(filename);
    path
}

impl AppSettings {
    pub fn path() -> PathBuf {
        app_config_path(constants::config::SETTINGS_FILENAME)
    }

    /// Load settings from the default location, creating the file if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "Settings file not found, creating default");
            let settings = AppSettings::default();
            settings.save_to(path)?;
            return Ok(settings);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;

        let settings: AppSettings = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from {:?}", path))?;
        settings
            .validate()
            .with_context(|| format!("Invalid settings in {:?}", path))?;

        info!(path = %path.display(), backend = ?settings.backend.kind, "Loaded settings");
        Ok(settings)
    }

    /// Reject values that cannot drive the runtime
    pub fn validate(&self) -> Result<()> {
        if self.oracle.poll_interval_ms == 0 {
            bail!("oracle.poll_interval_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory {:?}", parent))?;
        }

        let toml_string =
            toml::to_string_pretty(self).context("Failed to serialize settings to TOML")?;

        fs::write(path, toml_string)
            .with_context(|| format!("Failed to write settings to {:?}", path))?;

        info!(path = %path.display(), "Saved settings");
        Ok(())
    }

    /// Profile file path, honoring the override
    pub fn conf_path(&self) -> PathBuf {
        self.backend.conf_path.clone().unwrap_or_else(|| {
            let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
            path.push(constants::config::LSFG_DIR);
            path.push(constants::config::LSFG_CONF_FILENAME);
            path
        })
    }
}
