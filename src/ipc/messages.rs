//! IPC message types for client ↔ `serve` communication

use serde::{Deserialize, Serialize};

use crate::backend::ProfileListing;
use crate::config::ConfigurationData;
use crate::error::{BackendError, BackendErrorKind};

/// One call on the remote backend
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum BackendRequest {
    ListProfiles,
    CreateProfile {
        name: String,
        source: String,
    },
    DeleteProfile {
        name: String,
    },
    RenameProfile {
        old_name: String,
        new_name: String,
    },
    SetCurrentProfile {
        name: String,
    },
    UpdateProfileConfig {
        name: String,
        config: ConfigurationData,
    },
    GetProfileConfig {
        name: String,
    },
    /// Health check
    Ping,
}

/// `{success, ...payload, error?}` answer to a [`BackendRequest`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct BackendResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigurationData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<BackendErrorKind>,
}

impl BackendResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn listing(listing: ProfileListing) -> Self {
        Self {
            success: true,
            profiles: Some(listing.profiles),
            current_profile: Some(listing.current_profile),
            ..Self::default()
        }
    }

    pub fn config(config: ConfigurationData) -> Self {
        Self {
            success: true,
            config: Some(config),
            ..Self::default()
        }
    }

    pub fn failure(err: &BackendError) -> Self {
        Self {
            success: false,
            error: Some(err.message().to_string()),
            error_kind: Some(err.wire_kind()),
            ..Self::default()
        }
    }

    /// Turn an unsuccessful response back into the backend error it carries
    pub fn into_result(self) -> Result<Self, BackendError> {
        if self.success {
            return Ok(self);
        }
        let message = self
            .error
            .clone()
            .unwrap_or_else(|| "backend reported failure without a message".to_string());
        Err(BackendError::from_wire(self.error_kind, message))
    }

    pub fn into_listing(self) -> Result<ProfileListing, BackendError> {
        match (self.profiles, self.current_profile) {
            (Some(profiles), Some(current_profile)) => Ok(ProfileListing {
                profiles,
                current_profile,
            }),
            _ => Err(BackendError::Communication(
                "malformed response: listing without profiles or current_profile".to_string(),
            )),
        }
    }

    pub fn into_config(self) -> Result<ConfigurationData, BackendError> {
        self.config.ok_or_else(|| {
            BackendError::Communication("malformed response: missing config".to_string())
        })
    }
}
