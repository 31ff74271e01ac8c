//! Guarded profile mutations
//!
//! [`ProfileOperations`] is the only writer of backend profile state. Each
//! mutating call passes three guards, in order:
//! 1. in-flight: one mutation per instance at a time
//! 2. default-profile: `decky-lsfg-vk` is never renamed or deleted
//! 3. running-app: no switch/rename/delete while a game is running
//!
//! Guard rejections resolve locally without touching the backend. Every call,
//! successful or not, emits exactly one [`Notification`].

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::store::{ProfileSnapshot, ProfileStore};
use crate::backend::ConfigBackend;
use crate::config::{ConfigField, ConfigValue, ConfigurationData};
use crate::constants::profile::DEFAULT_PROFILE;
use crate::error::{ErrorKind, OperationResult, ProfileError};
use crate::notify::{Notification, Notifier, Operation};
use crate::oracle::RunningAppSignal;

/// What happened to the automatic switch that follows a create
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum AutoSwitch {
    Switched,
    /// A game was running, so the new profile was left inactive
    SkippedGameRunning,
    /// The profile exists but the backend refused to make it current
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOutcome {
    pub name: String,
    pub auto_switch: AutoSwitch,
    pub snapshot: ProfileSnapshot,
}

/// Result of editing a single option
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionChange {
    pub profile: String,
    /// Every field whose value changed, the edited one first
    pub changed: Vec<ConfigField>,
    pub config: ConfigurationData,
}

/// Releases the in-flight flag on drop, including when the future is cancelled
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// State after a committed mutation has been re-synced with the backend
struct Settled {
    snapshot: ProfileSnapshot,
    /// Current profile exactly as the backend listed it; `None` if the
    /// refresh failed and the change was applied locally
    reported_current: Option<String>,
}

pub struct ProfileOperations {
    backend: Arc<dyn ConfigBackend>,
    store: ProfileStore,
    running_app: watch::Receiver<RunningAppSignal>,
    notifier: Arc<dyn Notifier>,
    in_flight: AtomicBool,
}

impl ProfileOperations {
    pub fn new(
        backend: Arc<dyn ConfigBackend>,
        running_app: watch::Receiver<RunningAppSignal>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store: ProfileStore::new(backend.clone()),
            backend,
            running_app,
            notifier,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        self.store.snapshot()
    }

    pub fn running_app(&self) -> RunningAppSignal {
        self.running_app.borrow().clone()
    }

    /// Re-fetch profiles and the active pointer from the backend
    pub async fn refresh(&self) -> OperationResult<ProfileSnapshot> {
        let result = self.store.refresh().await;
        self.finish(Operation::Refresh, result, |snapshot| {
            Notification::info(
                Operation::Refresh,
                "Profiles loaded",
                format!(
                    "{} profile(s), active: {}",
                    snapshot.len(),
                    snapshot.current()
                ),
            )
        })
    }

    /// Create `name` as a copy of `source` (the active profile if `None`),
    /// then try to make it active
    pub async fn create(&self, name: &str, source: Option<&str>) -> OperationResult<CreateOutcome> {
        let result = self.try_create(name, source).await;
        self.finish(Operation::Create, result, |outcome| {
            let message = match &outcome.auto_switch {
                AutoSwitch::Switched => format!("'{}' created and activated", outcome.name),
                AutoSwitch::SkippedGameRunning => format!(
                    "'{}' created; close the game to activate it",
                    outcome.name
                ),
                AutoSwitch::Failed(reason) => format!(
                    "'{}' created but could not be activated: {reason}",
                    outcome.name
                ),
            };
            Notification::success(Operation::Create, "Profile created", message)
        })
    }

    pub async fn rename(&self, old_name: &str, new_name: &str) -> OperationResult<ProfileSnapshot> {
        let new_trimmed = new_name.trim();
        let result = self.try_rename(old_name, new_trimmed).await;
        self.finish(Operation::Rename, result, |_| {
            if old_name == new_trimmed {
                Notification::info(
                    Operation::Rename,
                    "Profile unchanged",
                    format!("'{old_name}' already has that name"),
                )
            } else {
                Notification::success(
                    Operation::Rename,
                    "Profile renamed",
                    format!("'{old_name}' is now '{new_trimmed}'"),
                )
            }
        })
    }

    pub async fn delete(&self, name: &str) -> OperationResult<ProfileSnapshot> {
        let result = self.try_delete(name).await;
        self.finish(Operation::Delete, result, |snapshot| {
            Notification::success(
                Operation::Delete,
                "Profile deleted",
                format!("'{name}' deleted, active: {}", snapshot.current()),
            )
        })
    }

    /// Make `name` the active profile
    pub async fn switch_to(&self, name: &str) -> OperationResult<ProfileSnapshot> {
        let result = self.try_switch(name).await;
        self.finish(Operation::Switch, result, |_| {
            Notification::success(
                Operation::Switch,
                "Profile switched",
                format!("'{name}' is now active"),
            )
        })
    }

    /// Overwrite the whole configuration of `name`.
    ///
    /// Allowed at any time: while a game runs, and alongside other mutations.
    pub async fn update_config(&self, name: &str, config: &ConfigurationData) -> OperationResult<()> {
        let result = self.write_config(name, config).await;
        self.finish(Operation::UpdateConfig, result, |_| {
            Notification::success(
                Operation::UpdateConfig,
                "Configuration saved",
                format!("'{name}' updated"),
            )
        })
    }

    pub async fn load_config(&self, name: &str) -> OperationResult<ConfigurationData> {
        let result = self.read_config(name).await;
        self.finish(Operation::LoadConfig, result, |_| {
            Notification::info(
                Operation::LoadConfig,
                "Configuration loaded",
                format!("'{name}' loaded"),
            )
        })
    }

    /// Edit one option of `name`, enforcing the rules that couple options.
    ///
    /// Follows the same rules as [`Self::update_config`].
    pub async fn set_option(
        &self,
        name: &str,
        field: ConfigField,
        value: ConfigValue,
    ) -> OperationResult<OptionChange> {
        let result = self.try_set_option(name, field, value).await;
        self.finish(Operation::UpdateConfig, result, |change| {
            let message = if change.changed.is_empty() {
                format!("'{name}': {field} unchanged")
            } else {
                let keys: Vec<&str> = change.changed.iter().map(|f| f.key()).collect();
                format!("'{name}': updated {}", keys.join(", "))
            };
            Notification::success(Operation::UpdateConfig, "Configuration saved", message)
        })
    }

    async fn try_create(&self, name: &str, source: Option<&str>) -> OperationResult<CreateOutcome> {
        let _guard = self.begin()?;

        let name = name.trim();
        if name.is_empty() {
            return Err(ProfileError::empty_name());
        }
        if self.store.contains(name) {
            return Err(ProfileError::name_conflict(name));
        }
        let source = match source {
            Some(source) => source.to_string(),
            None => self.store.current(),
        };
        if !self.store.contains(&source) {
            return Err(ProfileError::not_found(&source));
        }

        self.backend.create_profile(name, &source).await?;
        info!(profile = %name, source = %source, "Created profile");
        let settled = self.settle(|snapshot| snapshot.insert(name)).await;

        // Internal switch: same running-app rule as a user switch
        let auto_switch = if let Some(app) = self.running_app() {
            info!(profile = %name, game = %app.display_name, "Game running, leaving new profile inactive");
            AutoSwitch::SkippedGameRunning
        } else {
            match self.backend.set_current_profile(name).await {
                Ok(()) => AutoSwitch::Switched,
                Err(e) => {
                    warn!(profile = %name, error = %e, "Could not activate new profile");
                    AutoSwitch::Failed(e.to_string())
                }
            }
        };

        let snapshot = if auto_switch == AutoSwitch::Switched {
            self.store.update(|snapshot| snapshot.set_current(name))
        } else {
            settled.snapshot
        };

        Ok(CreateOutcome {
            name: name.to_string(),
            auto_switch,
            snapshot,
        })
    }

    async fn try_rename(&self, old_name: &str, new_name: &str) -> OperationResult<ProfileSnapshot> {
        let _guard = self.begin()?;
        if old_name == DEFAULT_PROFILE {
            return Err(ProfileError::default_protected("renamed"));
        }
        self.check_no_game()?;

        if !self.store.contains(old_name) {
            return Err(ProfileError::not_found(old_name));
        }
        if new_name == old_name {
            debug!(profile = %old_name, "Rename to same name, nothing to do");
            return Ok(self.store.snapshot());
        }
        if new_name.is_empty() {
            return Err(ProfileError::empty_name());
        }
        if self.store.contains(new_name) {
            return Err(ProfileError::name_conflict(new_name));
        }

        let was_active = self.store.current() == old_name;
        self.backend.rename_profile(old_name, new_name).await?;
        info!(from = %old_name, to = %new_name, "Renamed profile");

        let settled = self
            .settle(|snapshot| snapshot.rename(old_name, new_name))
            .await;
        if was_active && settled.snapshot.current() != new_name {
            return Ok(self.store.update(|snapshot| snapshot.set_current(new_name)));
        }
        Ok(settled.snapshot)
    }

    async fn try_delete(&self, name: &str) -> OperationResult<ProfileSnapshot> {
        let _guard = self.begin()?;
        if name == DEFAULT_PROFILE {
            return Err(ProfileError::default_protected("deleted"));
        }
        self.check_no_game()?;

        if !self.store.contains(name) {
            return Err(ProfileError::not_found(name));
        }

        let was_active = self.store.current() == name;
        self.backend.delete_profile(name).await?;
        info!(profile = %name, "Deleted profile");

        let settled = self.settle(|snapshot| snapshot.remove(name)).await;
        if !was_active {
            return Ok(settled.snapshot);
        }

        if let Some(reported) = &settled.reported_current
            && reported != DEFAULT_PROFILE
        {
            debug!(reported = %reported, "Backend still points elsewhere, resetting to default");
            if let Err(e) = self.backend.set_current_profile(DEFAULT_PROFILE).await {
                warn!(error = %e, "Could not reset backend pointer to the default profile");
            }
        }
        Ok(self
            .store
            .update(|snapshot| snapshot.set_current(DEFAULT_PROFILE)))
    }

    async fn try_switch(&self, name: &str) -> OperationResult<ProfileSnapshot> {
        let _guard = self.begin()?;
        self.check_no_game()?;

        // Cached set only; a backend-side race comes back as NotFound below
        if !self.store.contains(name) {
            return Err(ProfileError::not_found(name));
        }

        self.backend.set_current_profile(name).await?;
        info!(profile = %name, "Switched profile");
        Ok(self.store.update(|snapshot| snapshot.set_current(name)))
    }

    async fn try_set_option(
        &self,
        name: &str,
        field: ConfigField,
        value: ConfigValue,
    ) -> OperationResult<OptionChange> {
        let mut config = self.read_config(name).await?;
        let changed = config
            .apply_change(field, value)
            .map_err(|e| ProfileError::new(ErrorKind::InvalidOption, e.to_string()))?;

        if !changed.is_empty() {
            self.write_config(name, &config).await?;
        }
        Ok(OptionChange {
            profile: name.to_string(),
            changed,
            config,
        })
    }

    async fn read_config(&self, name: &str) -> OperationResult<ConfigurationData> {
        Ok(self.backend.get_profile_config(name).await?)
    }

    async fn write_config(&self, name: &str, config: &ConfigurationData) -> OperationResult<()> {
        self.backend.update_profile_config(name, config).await?;
        debug!(profile = %name, "Wrote profile configuration");
        Ok(())
    }

    fn begin(&self) -> OperationResult<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlight(&self.in_flight))
            .map_err(|_| ProfileError::in_progress())
    }

    fn check_no_game(&self) -> OperationResult<()> {
        match &*self.running_app.borrow() {
            Some(app) => Err(ProfileError::game_running(&app.display_name)),
            None => Ok(()),
        }
    }

    /// Refresh after a committed mutation; if that fails, apply `local_edit`
    /// to the cache so it never shows the mutation half-done
    async fn settle(&self, local_edit: impl FnOnce(&mut ProfileSnapshot)) -> Settled {
        match self.backend.list_profiles().await {
            Ok(listing) => {
                let reported_current = Some(listing.current_profile.clone());
                Settled {
                    snapshot: self.store.replace(listing),
                    reported_current,
                }
            }
            Err(e) => {
                warn!(error = %e, "Refresh after mutation failed, applying change locally");
                Settled {
                    snapshot: self.store.update(local_edit),
                    reported_current: None,
                }
            }
        }
    }

    fn finish<T>(
        &self,
        operation: Operation,
        result: OperationResult<T>,
        on_success: impl FnOnce(&T) -> Notification,
    ) -> OperationResult<T> {
        let notification = match &result {
            Ok(value) => on_success(value),
            Err(e) => Notification::failure(operation, e),
        };
        self.notifier.notify(notification);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::error::BackendError;
    use crate::notify::Severity;
    use crate::notify::recording::RecordingNotifier;
    use crate::oracle::RunningApp;
    use std::time::Duration;

    struct Harness {
        backend: Arc<MemoryBackend>,
        ops: ProfileOperations,
        game: watch::Sender<RunningAppSignal>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Harness {
        fn start_game(&self) {
            self.game.send_replace(Some(RunningApp {
                pid: 4242,
                display_name: "eldenring.exe".to_string(),
            }));
        }

        fn stop_game(&self) {
            self.game.send_replace(None);
        }
    }

    async fn setup(profiles: &[&str]) -> Harness {
        let backend = Arc::new(MemoryBackend::with_profiles(profiles));
        let (game, running_app) = watch::channel(None);
        let notifier = Arc::new(RecordingNotifier::default());
        let ops = ProfileOperations::new(backend.clone(), running_app, notifier.clone());
        ops.refresh().await.unwrap();
        notifier.take();
        Harness {
            backend,
            ops,
            game,
            notifier,
        }
    }

    fn names(snapshot: &ProfileSnapshot) -> Vec<&str> {
        snapshot.display_order()
    }

    #[tokio::test]
    async fn test_create_then_delete_scenario() {
        let h = setup(&[]).await;

        let outcome = h.ops.create("fast", None).await.unwrap();
        assert_eq!(outcome.auto_switch, AutoSwitch::Switched);
        assert_eq!(names(&outcome.snapshot), vec![DEFAULT_PROFILE, "fast"]);
        assert_eq!(outcome.snapshot.current(), "fast");
        assert_eq!(h.backend.current(), "fast");

        let snapshot = h.ops.delete("fast").await.unwrap();
        assert_eq!(names(&snapshot), vec![DEFAULT_PROFILE]);
        assert_eq!(snapshot.current(), DEFAULT_PROFILE);
        assert_eq!(h.ops.snapshot(), snapshot);
    }

    #[tokio::test]
    async fn test_default_profile_is_protected() {
        let h = setup(&["fast"]).await;

        let err = h.ops.rename(DEFAULT_PROFILE, "x").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DefaultProfileProtected);
        let err = h.ops.delete(DEFAULT_PROFILE).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DefaultProfileProtected);

        // Default check comes before the running-app check
        h.start_game();
        let err = h.ops.delete(DEFAULT_PROFILE).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DefaultProfileProtected);

        assert_eq!(h.backend.mutation_count(), 0);
        assert!(h.ops.snapshot().contains(DEFAULT_PROFILE));
    }

    #[tokio::test]
    async fn test_running_game_blocks_switch_rename_delete() {
        let h = setup(&["fast"]).await;
        h.start_game();

        for err in [
            h.ops.switch_to("fast").await.unwrap_err(),
            h.ops.rename("fast", "faster").await.unwrap_err(),
            h.ops.delete("fast").await.unwrap_err(),
        ] {
            assert_eq!(err.kind, ErrorKind::GameRunning);
            assert!(err.message.contains("eldenring.exe"));
        }
        assert_eq!(h.backend.mutation_count(), 0);

        h.stop_game();
        let snapshot = h.ops.switch_to("fast").await.unwrap();
        assert_eq!(snapshot.current(), "fast");
    }

    #[tokio::test]
    async fn test_create_while_game_running_skips_switch() {
        let h = setup(&[]).await;
        h.start_game();

        let outcome = h.ops.create("fast", None).await.unwrap();
        assert_eq!(outcome.auto_switch, AutoSwitch::SkippedGameRunning);
        assert!(outcome.snapshot.contains("fast"));
        assert_eq!(outcome.snapshot.current(), DEFAULT_PROFILE);
        assert_eq!(h.backend.current(), DEFAULT_PROFILE);
        assert_eq!(h.backend.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_create_reports_failed_auto_switch() {
        let h = setup(&[]).await;
        h.backend
            .fail_next_switch(BackendError::Rejected("pointer locked".into()));

        let outcome = h.ops.create("fast", None).await.unwrap();
        assert_eq!(
            outcome.auto_switch,
            AutoSwitch::Failed("pointer locked".to_string())
        );
        assert!(outcome.snapshot.contains("fast"));
        assert_eq!(outcome.snapshot.current(), DEFAULT_PROFILE);

        let seen = h.notifier.take();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].severity, Severity::Success);
        assert!(seen[0].message.contains("could not be activated"));
    }

    #[tokio::test]
    async fn test_create_backend_failure_is_create_failure() {
        let h = setup(&[]).await;
        h.backend
            .fail_next_mutation(BackendError::Rejected("disk full".into()));

        let err = h.ops.create("fast", None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::BackendRejected);
        assert_eq!(err.message, "disk full");
        assert!(!h.ops.snapshot().contains("fast"));
    }

    #[tokio::test]
    async fn test_create_rejects_existing_and_empty_names() {
        let h = setup(&["fast"]).await;

        let err = h.ops.create("fast", None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NameConflict);
        let err = h.ops.create("  fast ", None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NameConflict);
        let err = h.ops.create(DEFAULT_PROFILE, None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NameConflict);
        let err = h.ops.create("   ", None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NameConflict);

        assert_eq!(h.backend.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_create_trims_name_and_checks_source() {
        let h = setup(&[]).await;

        let err = h.ops.create("fast", Some("ghost")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(h.backend.mutation_count(), 0);

        let outcome = h.ops.create("  fast  ", None).await.unwrap();
        assert_eq!(outcome.name, "fast");
        assert!(h.backend.config_of("fast").is_some());
    }

    #[tokio::test]
    async fn test_create_copies_source_config_as_of_call() {
        let h = setup(&[]).await;
        let tuned = ConfigurationData {
            multiplier: 3,
            flow_scale: 0.5,
            ..ConfigurationData::default()
        };
        h.ops.update_config(DEFAULT_PROFILE, &tuned).await.unwrap();

        h.ops.create("fast", Some(DEFAULT_PROFILE)).await.unwrap();

        let later = ConfigurationData {
            multiplier: 2,
            ..tuned.clone()
        };
        h.ops.update_config(DEFAULT_PROFILE, &later).await.unwrap();

        assert_eq!(h.ops.load_config("fast").await.unwrap(), tuned);
        assert_eq!(h.ops.load_config(DEFAULT_PROFILE).await.unwrap(), later);
    }

    #[tokio::test]
    async fn test_create_defaults_to_active_profile_as_source() {
        let h = setup(&["tuned"]).await;
        let config = ConfigurationData {
            multiplier: 4,
            ..ConfigurationData::default()
        };
        h.ops.update_config("tuned", &config).await.unwrap();
        h.ops.switch_to("tuned").await.unwrap();

        h.ops.create("copy", None).await.unwrap();
        assert_eq!(h.backend.config_of("copy"), Some(config));
    }

    #[tokio::test]
    async fn test_rename_roundtrip_restores_state() {
        let h = setup(&["a"]).await;
        h.ops.switch_to("a").await.unwrap();
        let before = h.ops.snapshot();

        let renamed = h.ops.rename("a", "b").await.unwrap();
        assert!(renamed.contains("b"));
        assert!(!renamed.contains("a"));
        assert_eq!(renamed.current(), "b");

        let restored = h.ops.rename("b", "a").await.unwrap();
        assert_eq!(restored, before);
    }

    #[tokio::test]
    async fn test_rename_edge_cases() {
        let h = setup(&["a", "b"]).await;

        let err = h.ops.rename("ghost", "x").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        let err = h.ops.rename("a", "b").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NameConflict);
        let err = h.ops.rename("a", "  ").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NameConflict);

        // Same name is a successful no-op
        let snapshot = h.ops.rename("a", " a ").await.unwrap();
        assert!(snapshot.contains("a"));
        assert_eq!(h.backend.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_unknown_profile() {
        let h = setup(&[]).await;
        let err = h.ops.delete("ghost").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(h.backend.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_active_resets_backend_pointer_when_it_disagrees() {
        let h = setup(&["fast"]).await;
        h.ops.switch_to("fast").await.unwrap();
        h.backend.report_current_as("fast");

        let snapshot = h.ops.delete("fast").await.unwrap();
        assert_eq!(snapshot.current(), DEFAULT_PROFILE);
        // switch + delete + pointer reset
        assert_eq!(h.backend.mutation_count(), 3);
    }

    #[tokio::test]
    async fn test_delete_active_without_disagreement() {
        let h = setup(&["fast"]).await;
        h.ops.switch_to("fast").await.unwrap();

        let snapshot = h.ops.delete("fast").await.unwrap();
        assert_eq!(snapshot.current(), DEFAULT_PROFILE);
        assert_eq!(h.backend.mutation_count(), 2);
    }

    #[tokio::test]
    async fn test_switch_unknown_and_backend_race() {
        let h = setup(&["fast"]).await;

        let err = h.ops.switch_to("ghost").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);

        // Removed behind our back: cache still lists it, backend says no
        h.backend.remove_externally("fast");
        let err = h.ops.switch_to("fast").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(h.ops.snapshot().current(), DEFAULT_PROFILE);
    }

    #[tokio::test]
    async fn test_second_mutation_is_rejected_while_first_in_flight() {
        let h = setup(&["a", "b"]).await;
        let gate = h.backend.hold_mutations();

        let (first, second) = tokio::join!(h.ops.switch_to("a"), async {
            let second = h.ops.switch_to("b").await;
            gate.notify_one();
            second
        });

        assert_eq!(first.unwrap().current(), "a");
        assert_eq!(second.unwrap_err().kind, ErrorKind::OperationInProgress);
        assert_eq!(h.backend.mutation_count(), 1);
        assert_eq!(h.backend.current(), "a");
    }

    #[tokio::test]
    async fn test_in_flight_guard_precedes_other_guards() {
        let h = setup(&["a"]).await;
        let gate = h.backend.hold_mutations();

        let (first, second) = tokio::join!(h.ops.switch_to("a"), async {
            let second = h.ops.rename(DEFAULT_PROFILE, "x").await;
            gate.notify_one();
            second
        });

        assert!(first.is_ok());
        assert_eq!(second.unwrap_err().kind, ErrorKind::OperationInProgress);
    }

    #[tokio::test]
    async fn test_update_config_is_not_serialized() {
        let h = setup(&["a"]).await;
        let gate = h.backend.hold_mutations();
        let config = ConfigurationData {
            no_fp16: true,
            ..ConfigurationData::default()
        };

        let (first, update) = tokio::join!(h.ops.switch_to("a"), async {
            let update = h.ops.update_config("a", &config).await;
            gate.notify_one();
            update
        });

        assert!(first.is_ok());
        assert!(update.is_ok());
        assert_eq!(h.backend.config_of("a"), Some(config));
    }

    #[tokio::test]
    async fn test_update_config_allowed_while_game_running() {
        let h = setup(&["a"]).await;
        h.start_game();
        let config = ConfigurationData {
            multiplier: 2,
            ..ConfigurationData::default()
        };
        h.ops.update_config("a", &config).await.unwrap();
        assert_eq!(h.backend.config_of("a"), Some(config));
    }

    #[tokio::test]
    async fn test_cancelled_operation_releases_guard() {
        let h = setup(&["a", "b"]).await;
        let _gate = h.backend.hold_mutations();

        let cancelled = tokio::time::timeout(Duration::from_millis(20), h.ops.switch_to("a")).await;
        assert!(cancelled.is_err());

        let snapshot = h.ops.switch_to("b").await.unwrap();
        assert_eq!(snapshot.current(), "b");
    }

    #[tokio::test]
    async fn test_failed_refresh_after_mutation_applies_locally() {
        let h = setup(&["a"]).await;
        h.ops.switch_to("a").await.unwrap();

        h.backend
            .fail_next_list(BackendError::Communication("socket closed".into()));
        let snapshot = h.ops.rename("a", "b").await.unwrap();
        assert!(snapshot.contains("b"));
        assert!(!snapshot.contains("a"));
        assert_eq!(snapshot.current(), "b");

        h.backend
            .fail_next_list(BackendError::Communication("socket closed".into()));
        let snapshot = h.ops.delete("b").await.unwrap();
        assert!(!snapshot.contains("b"));
        assert_eq!(snapshot.current(), DEFAULT_PROFILE);

        // A later refresh agrees with the local edits
        assert_eq!(h.ops.refresh().await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_cache_untouched() {
        let h = setup(&["a"]).await;
        let before = h.ops.snapshot();

        h.backend
            .fail_next_mutation(BackendError::Communication("broken pipe".into()));
        let err = h.ops.delete("a").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::BackendCommunicationError);
        assert_eq!(h.ops.snapshot(), before);
    }

    #[tokio::test]
    async fn test_set_option_enforces_schema() {
        let h = setup(&[]).await;

        let err = h
            .ops
            .set_option(DEFAULT_PROFILE, ConfigField::HdrMode, ConfigValue::Bool(true))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOption);
        assert_eq!(h.backend.mutation_count(), 0);

        h.ops
            .set_option(DEFAULT_PROFILE, ConfigField::EnableWsi, ConfigValue::Bool(true))
            .await
            .unwrap();
        h.ops
            .set_option(DEFAULT_PROFILE, ConfigField::HdrMode, ConfigValue::Bool(true))
            .await
            .unwrap();

        let change = h
            .ops
            .set_option(DEFAULT_PROFILE, ConfigField::EnableWsi, ConfigValue::Bool(false))
            .await
            .unwrap();
        assert_eq!(change.changed, vec![ConfigField::EnableWsi, ConfigField::HdrMode]);
        assert!(!h.backend.config_of(DEFAULT_PROFILE).unwrap().hdr_mode);
    }

    #[tokio::test]
    async fn test_set_option_without_change_skips_write() {
        let h = setup(&[]).await;
        let change = h
            .ops
            .set_option(DEFAULT_PROFILE, ConfigField::Multiplier, ConfigValue::Number(1.0))
            .await
            .unwrap();
        assert!(change.changed.is_empty());
        assert_eq!(h.backend.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_each_operation_notifies_exactly_once() {
        let h = setup(&["a"]).await;

        h.ops.create("fast", None).await.unwrap();
        h.ops.rename(DEFAULT_PROFILE, "x").await.unwrap_err();
        h.ops.switch_to("a").await.unwrap();
        h.ops.delete("ghost").await.unwrap_err();
        h.ops.refresh().await.unwrap();

        let seen = h.notifier.take();
        let summary: Vec<(Operation, Severity)> =
            seen.iter().map(|n| (n.operation, n.severity)).collect();
        assert_eq!(
            summary,
            vec![
                (Operation::Create, Severity::Success),
                (Operation::Rename, Severity::Error),
                (Operation::Switch, Severity::Success),
                (Operation::Delete, Severity::Error),
                (Operation::Refresh, Severity::Info),
            ]
        );
        assert!(seen[1].message.contains("cannot be renamed"));
    }
}
