//! In-memory backend for tests
//!
//! Mirrors the file backend's semantics without touching disk, and adds the
//! knobs tests need: a gate that parks mutations until released, a counter of
//! mutations that reached the store, and one-shot failure injection.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::{ConfigBackend, ProfileListing};
use crate::config::ConfigurationData;
use crate::constants::profile::DEFAULT_PROFILE;
use crate::error::BackendError;

#[derive(Debug)]
struct State {
    // Insertion order matters for listings
    order: Vec<String>,
    configs: BTreeMap<String, ConfigurationData>,
    current: String,
}

pub(crate) struct MemoryBackend {
    state: Mutex<State>,
    mutations: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
    fail_next_mutation: Mutex<Option<BackendError>>,
    fail_next_list: Mutex<Option<BackendError>>,
    fail_next_switch: Mutex<Option<BackendError>>,
    // Reported by list_profiles instead of the real pointer when set
    listed_current_override: Mutex<Option<String>>,
}

impl MemoryBackend {
    pub(crate) fn new() -> Self {
        let mut configs = BTreeMap::new();
        configs.insert(DEFAULT_PROFILE.to_string(), ConfigurationData::default());
        Self {
            state: Mutex::new(State {
                order: vec![DEFAULT_PROFILE.to_string()],
                configs,
                current: DEFAULT_PROFILE.to_string(),
            }),
            mutations: AtomicUsize::new(0),
            gate: Mutex::new(None),
            fail_next_mutation: Mutex::new(None),
            fail_next_list: Mutex::new(None),
            fail_next_switch: Mutex::new(None),
            listed_current_override: Mutex::new(None),
        }
    }

    /// Backend pre-populated with extra profiles (copies of the default)
    pub(crate) fn with_profiles(names: &[&str]) -> Self {
        let backend = Self::new();
        {
            let mut state = backend.state.lock().unwrap();
            for name in names {
                state.order.push(name.to_string());
                state
                    .configs
                    .insert(name.to_string(), ConfigurationData::default());
            }
        }
        backend
    }

    /// Park every mutation until the returned handle is notified
    pub(crate) fn hold_mutations(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    pub(crate) fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_next_mutation(&self, err: BackendError) {
        *self.fail_next_mutation.lock().unwrap() = Some(err);
    }

    pub(crate) fn fail_next_list(&self, err: BackendError) {
        *self.fail_next_list.lock().unwrap() = Some(err);
    }

    /// Fail the next `set_current_profile` only
    pub(crate) fn fail_next_switch(&self, err: BackendError) {
        *self.fail_next_switch.lock().unwrap() = Some(err);
    }

    pub(crate) fn report_current_as(&self, name: &str) {
        *self.listed_current_override.lock().unwrap() = Some(name.to_string());
    }

    /// Remove a profile behind the subsystem's back
    pub(crate) fn remove_externally(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.order.retain(|n| n != name);
        state.configs.remove(name);
        if state.current == name {
            state.current = DEFAULT_PROFILE.to_string();
        }
    }

    pub(crate) fn current(&self) -> String {
        self.state.lock().unwrap().current.clone()
    }

    pub(crate) fn config_of(&self, name: &str) -> Option<ConfigurationData> {
        self.state.lock().unwrap().configs.get(name).cloned()
    }

    async fn begin_mutation(&self) -> Result<(), BackendError> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(err) = self.fail_next_mutation.lock().unwrap().take() {
            return Err(err);
        }
        Ok(())
    }

    fn commit<T>(
        &self,
        change: impl FnOnce(&mut State) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let mut state = self.state.lock().unwrap();
        let out = change(&mut state)?;
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(out)
    }
}

fn not_found(name: &str) -> BackendError {
    BackendError::NotFound(format!("profile '{name}' not found"))
}

#[async_trait]
impl ConfigBackend for MemoryBackend {
    async fn list_profiles(&self) -> Result<ProfileListing, BackendError> {
        if let Some(err) = self.fail_next_list.lock().unwrap().take() {
            return Err(err);
        }
        let state = self.state.lock().unwrap();
        let current = self
            .listed_current_override
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| state.current.clone());
        Ok(ProfileListing {
            profiles: state.order.clone(),
            current_profile: current,
        })
    }

    async fn create_profile(&self, name: &str, source: &str) -> Result<(), BackendError> {
        self.begin_mutation().await?;
        self.commit(|state| {
            if state.configs.contains_key(name) {
                return Err(BackendError::Conflict(format!(
                    "profile '{name}' already exists"
                )));
            }
            let config = state.configs.get(source).cloned().ok_or_else(|| not_found(source))?;
            state.order.push(name.to_string());
            state.configs.insert(name.to_string(), config);
            Ok(())
        })
    }

    async fn delete_profile(&self, name: &str) -> Result<(), BackendError> {
        self.begin_mutation().await?;
        self.commit(|state| {
            state.configs.remove(name).ok_or_else(|| not_found(name))?;
            state.order.retain(|n| n != name);
            if state.current == name {
                state.current = DEFAULT_PROFILE.to_string();
            }
            Ok(())
        })
    }

    async fn rename_profile(&self, old_name: &str, new_name: &str) -> Result<(), BackendError> {
        self.begin_mutation().await?;
        self.commit(|state| {
            if state.configs.contains_key(new_name) {
                return Err(BackendError::Conflict(format!(
                    "profile '{new_name}' already exists"
                )));
            }
            let config = state.configs.remove(old_name).ok_or_else(|| not_found(old_name))?;
            state.configs.insert(new_name.to_string(), config);
            for entry in state.order.iter_mut() {
                if entry == old_name {
                    *entry = new_name.to_string();
                }
            }
            if state.current == old_name {
                state.current = new_name.to_string();
            }
            Ok(())
        })
    }

    async fn set_current_profile(&self, name: &str) -> Result<(), BackendError> {
        self.begin_mutation().await?;
        if let Some(err) = self.fail_next_switch.lock().unwrap().take() {
            return Err(err);
        }
        self.commit(|state| {
            if !state.configs.contains_key(name) {
                return Err(not_found(name));
            }
            state.current = name.to_string();
            Ok(())
        })
    }

    async fn update_profile_config(
        &self,
        name: &str,
        config: &ConfigurationData,
    ) -> Result<(), BackendError> {
        self.begin_mutation().await?;
        self.commit(|state| {
            let slot = state.configs.get_mut(name).ok_or_else(|| not_found(name))?;
            *slot = config.clone();
            Ok(())
        })
    }

    async fn get_profile_config(&self, name: &str) -> Result<ConfigurationData, BackendError> {
        self.config_of(name).ok_or_else(|| not_found(name))
    }
}
