//! File-backed profile storage
//!
//! Profiles live in the lsfg-vk `conf.toml`: one `[[game]]` table per profile
//! keyed by `exe = "<profile name>"`, plus `[global] current_profile`. The
//! frame-generation layer hot-reloads this file, so every write replaces it
//! atomically (temp file + rename) and never leaves a partial document behind.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{ConfigBackend, ProfileListing};
use crate::config::ConfigurationData;
use crate::constants::config::LSFG_CONF_VERSION;
use crate::constants::profile::DEFAULT_PROFILE;
use crate::error::BackendError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ProfileFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    global: GlobalSection,
    #[serde(default, rename = "game")]
    games: Vec<GameEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct GlobalSection {
    #[serde(default = "default_current_profile")]
    current_profile: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct GameEntry {
    exe: String,
    #[serde(flatten)]
    config: ConfigurationData,
}

fn default_version() -> u32 {
    LSFG_CONF_VERSION
}

fn default_current_profile() -> String {
    DEFAULT_PROFILE.to_string()
}

impl Default for GlobalSection {
    fn default() -> Self {
        Self {
            current_profile: default_current_profile(),
        }
    }
}

impl Default for ProfileFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            global: GlobalSection::default(),
            games: vec![GameEntry {
                exe: DEFAULT_PROFILE.to_string(),
                config: ConfigurationData::default(),
            }],
        }
    }
}

impl ProfileFile {
    fn position(&self, name: &str) -> Option<usize> {
        self.games.iter().position(|g| g.exe == name)
    }

    fn entry(&self, name: &str) -> Result<&GameEntry, BackendError> {
        self.games
            .iter()
            .find(|g| g.exe == name)
            .ok_or_else(|| not_found(name))
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut GameEntry, BackendError> {
        self.games
            .iter_mut()
            .find(|g| g.exe == name)
            .ok_or_else(|| not_found(name))
    }

    /// Re-establish the default profile and a valid current pointer
    fn repair(&mut self) {
        if self.position(DEFAULT_PROFILE).is_none() {
            warn!(profile = DEFAULT_PROFILE, "Default profile missing from store, recreating");
            self.games.insert(
                0,
                GameEntry {
                    exe: DEFAULT_PROFILE.to_string(),
                    config: ConfigurationData::default(),
                },
            );
        }
        if self.position(&self.global.current_profile).is_none() {
            warn!(
                current = %self.global.current_profile,
                "Current profile missing from store, falling back to default"
            );
            self.global.current_profile = DEFAULT_PROFILE.to_string();
        }
    }
}

fn not_found(name: &str) -> BackendError {
    BackendError::NotFound(format!("profile '{name}' not found"))
}

fn io_error(action: &str, path: &Path, err: impl std::fmt::Display) -> BackendError {
    BackendError::Communication(format!("failed to {action} {}: {err}", path.display()))
}

/// Backend that edits the profile file directly
pub struct FileBackend {
    path: PathBuf,
    // Serializes read-modify-write cycles from this process
    lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<ProfileFile, BackendError> {
        let mut file = match fs::read_to_string(&self.path).await {
            Ok(contents) => toml::from_str::<ProfileFile>(&contents)
                .map_err(|e| io_error("parse", &self.path, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Profile file not found, using defaults");
                ProfileFile::default()
            }
            Err(e) => return Err(io_error("read", &self.path, e)),
        };
        file.repair();
        Ok(file)
    }

    async fn store(&self, file: &ProfileFile) -> Result<(), BackendError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create directory for", &self.path, e))?;
        }

        let contents =
            toml::to_string_pretty(file).map_err(|e| io_error("serialize", &self.path, e))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, contents)
            .await
            .map_err(|e| io_error("write", &tmp, e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error("replace", &self.path, e))?;
        Ok(())
    }

    /// Read-modify-write under the process-local lock
    async fn modify<T>(
        &self,
        change: impl FnOnce(&mut ProfileFile) -> Result<T, BackendError> + Send,
    ) -> Result<T, BackendError> {
        let _guard = self.lock.lock().await;
        let mut file = self.load().await?;
        let out = change(&mut file)?;
        self.store(&file).await?;
        Ok(out)
    }
}

#[async_trait]
impl ConfigBackend for FileBackend {
    async fn list_profiles(&self) -> Result<ProfileListing, BackendError> {
        let _guard = self.lock.lock().await;
        let file = self.load().await?;
        Ok(ProfileListing {
            profiles: file.games.iter().map(|g| g.exe.clone()).collect(),
            current_profile: file.global.current_profile,
        })
    }

    async fn create_profile(&self, name: &str, source: &str) -> Result<(), BackendError> {
        self.modify(|file| {
            if file.position(name).is_some() {
                return Err(BackendError::Conflict(format!(
                    "profile '{name}' already exists"
                )));
            }
            // Verbatim copy at creation time; later source edits stay independent
            let config = file.entry(source)?.config.clone();
            file.games.push(GameEntry {
                exe: name.to_string(),
                config,
            });
            Ok(())
        })
        .await?;
        info!(profile = %name, source = %source, "Created profile");
        Ok(())
    }

    async fn delete_profile(&self, name: &str) -> Result<(), BackendError> {
        if name == DEFAULT_PROFILE {
            return Err(BackendError::Rejected(
                "the default profile cannot be deleted".to_string(),
            ));
        }
        self.modify(|file| {
            let idx = file.position(name).ok_or_else(|| not_found(name))?;
            file.games.remove(idx);
            if file.global.current_profile == name {
                file.global.current_profile = DEFAULT_PROFILE.to_string();
            }
            Ok(())
        })
        .await?;
        info!(profile = %name, "Deleted profile");
        Ok(())
    }

    async fn rename_profile(&self, old_name: &str, new_name: &str) -> Result<(), BackendError> {
        if old_name == DEFAULT_PROFILE {
            return Err(BackendError::Rejected(
                "the default profile cannot be renamed".to_string(),
            ));
        }
        self.modify(|file| {
            if old_name != new_name && file.position(new_name).is_some() {
                return Err(BackendError::Conflict(format!(
                    "profile '{new_name}' already exists"
                )));
            }
            file.entry_mut(old_name)?.exe = new_name.to_string();
            if file.global.current_profile == old_name {
                file.global.current_profile = new_name.to_string();
            }
            Ok(())
        })
        .await?;
        info!(from = %old_name, to = %new_name, "Renamed profile");
        Ok(())
    }

    async fn set_current_profile(&self, name: &str) -> Result<(), BackendError> {
        self.modify(|file| {
            file.entry(name)?;
            file.global.current_profile = name.to_string();
            Ok(())
        })
        .await?;
        info!(profile = %name, "Set current profile");
        Ok(())
    }

    async fn update_profile_config(
        &self,
        name: &str,
        config: &ConfigurationData,
    ) -> Result<(), BackendError> {
        self.modify(|file| {
            file.entry_mut(name)?.config = config.clone();
            Ok(())
        })
        .await?;
        debug!(profile = %name, "Updated profile configuration");
        Ok(())
    }

    async fn get_profile_config(&self, name: &str) -> Result<ConfigurationData, BackendError> {
        let _guard = self.lock.lock().await;
        let file = self.load().await?;
        Ok(file.entry(name)?.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_in(dir: &tempfile::TempDir) -> FileBackend {
        FileBackend::new(dir.path().join("lsfg-vk").join("conf.toml"))
    }

    #[tokio::test]
    async fn test_missing_file_lists_default_profile() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_in(&dir);

        let listing = backend.list_profiles().await.unwrap();
        assert_eq!(listing.profiles, vec![DEFAULT_PROFILE.to_string()]);
        assert_eq!(listing.current_profile, DEFAULT_PROFILE);
    }

    #[tokio::test]
    async fn test_create_copies_source_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_in(&dir);

        let tuned = ConfigurationData {
            multiplier: 3,
            flow_scale: 0.5,
            ..ConfigurationData::default()
        };
        backend.update_profile_config(DEFAULT_PROFILE, &tuned).await.unwrap();
        backend.create_profile("fast", DEFAULT_PROFILE).await.unwrap();
        assert_eq!(backend.get_profile_config("fast").await.unwrap(), tuned);

        // Later edits to the source do not reach the copy
        backend
            .update_profile_config(DEFAULT_PROFILE, &ConfigurationData::default())
            .await
            .unwrap();
        assert_eq!(backend.get_profile_config("fast").await.unwrap(), tuned);
    }

    #[tokio::test]
    async fn test_create_conflict_and_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_in(&dir);

        backend.create_profile("fast", DEFAULT_PROFILE).await.unwrap();
        assert!(matches!(
            backend.create_profile("fast", DEFAULT_PROFILE).await,
            Err(BackendError::Conflict(_))
        ));
        assert!(matches!(
            backend.create_profile("slow", "ghost").await,
            Err(BackendError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_current_resets_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_in(&dir);

        backend.create_profile("fast", DEFAULT_PROFILE).await.unwrap();
        backend.set_current_profile("fast").await.unwrap();
        backend.delete_profile("fast").await.unwrap();

        let listing = backend.list_profiles().await.unwrap();
        assert_eq!(listing.profiles, vec![DEFAULT_PROFILE.to_string()]);
        assert_eq!(listing.current_profile, DEFAULT_PROFILE);
    }

    #[tokio::test]
    async fn test_default_profile_cannot_be_removed_or_renamed() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_in(&dir);

        assert!(matches!(
            backend.delete_profile(DEFAULT_PROFILE).await,
            Err(BackendError::Rejected(_))
        ));
        assert!(matches!(
            backend.rename_profile(DEFAULT_PROFILE, "x").await,
            Err(BackendError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_moves_current_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_in(&dir);

        backend.create_profile("fast", DEFAULT_PROFILE).await.unwrap();
        backend.set_current_profile("fast").await.unwrap();
        backend.rename_profile("fast", "faster").await.unwrap();

        let listing = backend.list_profiles().await.unwrap();
        assert!(listing.profiles.contains(&"faster".to_string()));
        assert!(!listing.profiles.contains(&"fast".to_string()));
        assert_eq!(listing.current_profile, "faster");
    }

    #[tokio::test]
    async fn test_written_file_uses_game_tables() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_in(&dir);
        backend.create_profile("fast", DEFAULT_PROFILE).await.unwrap();

        let contents = std::fs::read_to_string(backend.path()).unwrap();
        assert!(contents.contains("[[game]]"));
        assert!(contents.contains("exe = \"fast\""));
        assert!(contents.contains("current_profile = \"decky-lsfg-vk\""));
        assert!(!backend.path().with_extension("toml.tmp").exists());
    }

    #[tokio::test]
    async fn test_hand_edited_file_is_repaired() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_in(&dir);
        std::fs::create_dir_all(backend.path().parent().unwrap()).unwrap();
        std::fs::write(
            backend.path(),
            "version = 1\n[global]\ncurrent_profile = \"gone\"\n\n[[game]]\nexe = \"fast\"\nmultiplier = 2\n",
        )
        .unwrap();

        let listing = backend.list_profiles().await.unwrap();
        assert_eq!(listing.profiles[0], DEFAULT_PROFILE);
        assert!(listing.profiles.contains(&"fast".to_string()));
        assert_eq!(listing.current_profile, DEFAULT_PROFILE);

        let fast = backend.get_profile_config("fast").await.unwrap();
        assert_eq!(fast.multiplier, 2);
        assert_eq!(fast.flow_scale, ConfigurationData::default().flow_scale);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_communication_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_in(&dir);
        std::fs::create_dir_all(backend.path().parent().unwrap()).unwrap();
        std::fs::write(backend.path(), "[[game]\nexe = ").unwrap();

        assert!(matches!(
            backend.list_profiles().await,
            Err(BackendError::Communication(_))
        ));
    }
}
