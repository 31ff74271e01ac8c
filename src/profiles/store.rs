//! Cached view of the backend's profile set
//!
//! [`ProfileStore`] holds the last known `{profiles, current}` pair as one
//! [`ProfileSnapshot`]. Readers always get a consistent copy; a refresh swaps the
//! whole snapshot under a single write lock or leaves it untouched on failure.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use tracing::{debug, warn};

use crate::backend::{ConfigBackend, ProfileListing};
use crate::constants::profile::DEFAULT_PROFILE;
use crate::error::{OperationResult, ProfileError};

/// Profile names plus the active pointer at one point in time.
///
/// Invariants: the default profile is always a member, and `current` always
/// names a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSnapshot {
    profiles: BTreeSet<String>,
    current: String,
}

impl Default for ProfileSnapshot {
    fn default() -> Self {
        Self {
            profiles: BTreeSet::from([DEFAULT_PROFILE.to_string()]),
            current: DEFAULT_PROFILE.to_string(),
        }
    }
}

impl ProfileSnapshot {
    /// Build from a backend listing, repairing anything that breaks the invariants
    pub fn from_listing(listing: ProfileListing) -> Self {
        let mut profiles: BTreeSet<String> = listing
            .profiles
            .into_iter()
            .filter(|name| !name.is_empty())
            .collect();

        if profiles.insert(DEFAULT_PROFILE.to_string()) {
            warn!(profile = DEFAULT_PROFILE, "Backend listing lacks the default profile");
        }

        let current = if profiles.contains(&listing.current_profile) {
            listing.current_profile
        } else {
            warn!(
                current = %listing.current_profile,
                "Backend reports an unknown current profile, using default"
            );
            DEFAULT_PROFILE.to_string()
        };

        Self { profiles, current }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains(name)
    }

    pub(crate) fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(String::as_str)
    }

    /// Presentation order: default profile first, the rest alphabetical
    pub fn display_order(&self) -> Vec<&str> {
        std::iter::once(DEFAULT_PROFILE)
            .chain(self.profiles().filter(|name| *name != DEFAULT_PROFILE))
            .collect()
    }

    pub(crate) fn set_current(&mut self, name: &str) {
        if self.contains(name) {
            self.current = name.to_string();
        } else {
            warn!(profile = %name, "Refusing to point current at an unknown profile");
        }
    }

    pub(crate) fn insert(&mut self, name: &str) {
        self.profiles.insert(name.to_string());
    }

    pub(crate) fn remove(&mut self, name: &str) {
        if name == DEFAULT_PROFILE {
            return;
        }
        self.profiles.remove(name);
        if self.current == name {
            self.current = DEFAULT_PROFILE.to_string();
        }
    }

    pub(crate) fn rename(&mut self, old_name: &str, new_name: &str) {
        if old_name == DEFAULT_PROFILE || !self.profiles.remove(old_name) {
            return;
        }
        self.profiles.insert(new_name.to_string());
        if self.current == old_name {
            self.current = new_name.to_string();
        }
    }
}

/// In-memory cache of the backend's profile set
pub struct ProfileStore {
    backend: Arc<dyn ConfigBackend>,
    cache: RwLock<ProfileSnapshot>,
}

impl ProfileStore {
    pub fn new(backend: Arc<dyn ConfigBackend>) -> Self {
        Self {
            backend,
            cache: RwLock::new(ProfileSnapshot::default()),
        }
    }

    /// Consistent copy of the cached state
    pub fn snapshot(&self) -> ProfileSnapshot {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn current(&self) -> String {
        self.snapshot().current
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }

    /// Re-fetch the profile set and active pointer.
    ///
    /// All-or-nothing: on failure the previous cache stays as it was.
    pub async fn refresh(&self) -> OperationResult<ProfileSnapshot> {
        let listing = self.backend.list_profiles().await.map_err(|e| {
            warn!(error = %e, "Failed to refresh profile list, keeping cached state");
            ProfileError::from(e)
        })?;

        Ok(self.replace(listing))
    }

    /// Swap in a freshly fetched listing
    pub(crate) fn replace(&self, listing: ProfileListing) -> ProfileSnapshot {
        let snapshot = ProfileSnapshot::from_listing(listing);
        *self.write() = snapshot.clone();
        debug!(
            count = snapshot.len(),
            current = %snapshot.current(),
            "Refreshed profile cache"
        );
        snapshot
    }

    /// Apply a local edit to the cache under one write lock
    pub(crate) fn update(&self, edit: impl FnOnce(&mut ProfileSnapshot)) -> ProfileSnapshot {
        let mut cache = self.write();
        edit(&mut cache);
        cache.clone()
    }

    fn write(&self) -> RwLockWriteGuard<'_, ProfileSnapshot> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}
