//! Configuration backends
//!
//! A [`ConfigBackend`] owns durable profile storage and answers asynchronous
//! request/response calls. Two implementations ship with the crate:
//! - [`FileBackend`]: edits the lsfg-vk profile file in place
//! - [`SocketBackend`]: forwards every call to a `serve` process over IPC

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ConfigurationData;
use crate::error::BackendError;

pub mod file;
pub mod socket;

#[cfg(test)]
pub(crate) mod memory;

pub use file::FileBackend;
pub use socket::SocketBackend;

/// Answer to `list_profiles`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileListing {
    pub profiles: Vec<String>,
    pub current_profile: String,
}

#[async_trait]
pub trait ConfigBackend: Send + Sync {
    async fn list_profiles(&self) -> Result<ProfileListing, BackendError>;

    /// Create `name` holding a copy of `source`'s configuration
    async fn create_profile(&self, name: &str, source: &str) -> Result<(), BackendError>;

    async fn delete_profile(&self, name: &str) -> Result<(), BackendError>;

    async fn rename_profile(&self, old_name: &str, new_name: &str) -> Result<(), BackendError>;

    async fn set_current_profile(&self, name: &str) -> Result<(), BackendError>;

    /// Overwrite the whole configuration record of `name`
    async fn update_profile_config(
        &self,
        name: &str,
        config: &ConfigurationData,
    ) -> Result<(), BackendError>;

    async fn get_profile_config(&self, name: &str) -> Result<ConfigurationData, BackendError>;
}
