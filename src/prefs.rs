//! Cosmetic UI state that survives restarts
//!
//! Which panels are collapsed. Loaded once when the store is opened, written
//! back only when a value actually changes. The storage is injectable so hosts
//! can keep it wherever they keep their own settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::settings::app_config_path;
use crate::constants;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiPreferences {
    pub profiles_collapsed: bool,
    pub workarounds_collapsed: bool,
}

impl Default for UiPreferences {
    fn default() -> Self {
        Self {
            profiles_collapsed: false,
            workarounds_collapsed: true,
        }
    }
}

/// Backing storage for [`UiPreferences`]
pub trait PreferenceStorage {
    /// `Ok(None)` when nothing has been stored yet
    fn load(&self) -> Result<Option<UiPreferences>>;
    fn save(&self, prefs: &UiPreferences) -> Result<()>;
}

/// JSON file storage, `ui-state.json` in the app config dir by default
pub struct JsonFileStorage {
    path: PathBuf,
}

impl Default for JsonFileStorage {
    fn default() -> Self {
        Self::new(app_config_path(constants::config::PREFS_FILENAME))
    }
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<UiPreferences>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read UI state from {:?}", self.path))?;
        let prefs = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse UI state from {:?}", self.path))?;
        Ok(Some(prefs))
    }

    fn save(&self, prefs: &UiPreferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(prefs).context("Failed to serialize UI state")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write UI state to {:?}", self.path))?;
        debug!(path = %self.path.display(), "Saved UI state");
        Ok(())
    }
}

pub struct PreferenceStore<S: PreferenceStorage> {
    storage: S,
    current: UiPreferences,
}

impl<S: PreferenceStorage> PreferenceStore<S> {
    /// Load once from `storage`; unreadable data falls back to defaults
    pub fn open(storage: S) -> Self {
        let current = match storage.load() {
            Ok(Some(prefs)) => {
                info!(?prefs, "Loaded UI preferences");
                prefs
            }
            Ok(None) => UiPreferences::default(),
            Err(e) => {
                warn!(error = ?e, "Failed to load UI preferences, using defaults");
                UiPreferences::default()
            }
        };
        Self { storage, current }
    }

    pub fn get(&self) -> UiPreferences {
        self.current
    }

    /// Returns whether the stored value changed
    pub fn set_profiles_collapsed(&mut self, collapsed: bool) -> Result<bool> {
        self.update(|prefs| prefs.profiles_collapsed = collapsed)
    }

    pub fn set_workarounds_collapsed(&mut self, collapsed: bool) -> Result<bool> {
        self.update(|prefs| prefs.workarounds_collapsed = collapsed)
    }

    fn update(&mut self, edit: impl FnOnce(&mut UiPreferences)) -> Result<bool> {
        let mut next = self.current;
        edit(&mut next);
        if next == self.current {
            return Ok(false);
        }
        self.storage.save(&next)?;
        self.current = next;
        Ok(true)
    }
}
