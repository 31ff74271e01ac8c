//! Backend reached over the `serve` process's Unix socket

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::net::UnixStream;
use tracing::debug;

use super::{ConfigBackend, ProfileListing};
use crate::config::ConfigurationData;
use crate::error::BackendError;
use crate::ipc::{self, BackendRequest, BackendResponse};

/// Client side of the backend socket; one connection per request
pub struct SocketBackend {
    path: PathBuf,
}

impl SocketBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Health check against the server
    pub async fn ping(&self) -> Result<(), BackendError> {
        self.call(BackendRequest::Ping).await.map(|_| ())
    }

    async fn call(&self, request: BackendRequest) -> Result<BackendResponse, BackendError> {
        let mut stream = UnixStream::connect(&self.path).await.map_err(|e| {
            BackendError::Communication(format!(
                "failed to connect to {}: {e}",
                self.path.display()
            ))
        })?;

        debug!(?request, "Sending backend request");
        ipc::write_message(&mut stream, &request)
            .await
            .map_err(|e| BackendError::Communication(format!("{e:#}")))?;
        let response: BackendResponse = ipc::read_message(&mut stream)
            .await
            .map_err(|e| BackendError::Communication(format!("{e:#}")))?;

        response.into_result()
    }
}

#[async_trait]
impl ConfigBackend for SocketBackend {
    async fn list_profiles(&self) -> Result<ProfileListing, BackendError> {
        self.call(BackendRequest::ListProfiles).await?.into_listing()
    }

    async fn create_profile(&self, name: &str, source: &str) -> Result<(), BackendError> {
        self.call(BackendRequest::CreateProfile {
            name: name.to_string(),
            source: source.to_string(),
        })
        .await
        .map(|_| ())
    }

    async fn delete_profile(&self, name: &str) -> Result<(), BackendError> {
        self.call(BackendRequest::DeleteProfile {
            name: name.to_string(),
        })
        .await
        .map(|_| ())
    }

    async fn rename_profile(&self, old_name: &str, new_name: &str) -> Result<(), BackendError> {
        self.call(BackendRequest::RenameProfile {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
        })
        .await
        .map(|_| ())
    }

    async fn set_current_profile(&self, name: &str) -> Result<(), BackendError> {
        self.call(BackendRequest::SetCurrentProfile {
            name: name.to_string(),
        })
        .await
        .map(|_| ())
    }

    async fn update_profile_config(
        &self,
        name: &str,
        config: &ConfigurationData,
    ) -> Result<(), BackendError> {
        self.call(BackendRequest::UpdateProfileConfig {
            name: name.to_string(),
            config: config.clone(),
        })
        .await
        .map(|_| ())
    }

    async fn get_profile_config(&self, name: &str) -> Result<ConfigurationData, BackendError> {
        self.call(BackendRequest::GetProfileConfig {
            name: name.to_string(),
        })
        .await?
        .into_config()
    }
}
