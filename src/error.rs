//! Error taxonomy for profile operations
//!
//! Backends report failures as [`BackendError`]; the operations layer turns
//! those (and its own guard rejections) into a [`ProfileError`] carrying an
//! [`ErrorKind`] tag plus the user-facing message.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::constants::profile::DEFAULT_PROFILE;

/// Classification of every failure a profile operation can resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Target profile is absent
    NotFound,
    /// Target name already in use (or empty)
    NameConflict,
    /// Rename/delete attempted on the default profile
    DefaultProfileProtected,
    /// Switch/rename/delete attempted while a managed process is running
    GameRunning,
    /// Another mutating operation from this instance has not finished
    OperationInProgress,
    /// Transport or serialization failure talking to the backend
    BackendCommunicationError,
    /// Backend refused the request for a reason outside the kinds above
    BackendRejected,
    /// A single option edit violated the configuration schema
    InvalidOption,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::NameConflict => "NameConflict",
            ErrorKind::DefaultProfileProtected => "DefaultProfileProtected",
            ErrorKind::GameRunning => "GameRunning",
            ErrorKind::OperationInProgress => "OperationInProgress",
            ErrorKind::BackendCommunicationError => "BackendCommunicationError",
            ErrorKind::BackendRejected => "BackendRejected",
            ErrorKind::InvalidOption => "InvalidOption",
        };
        f.write_str(name)
    }
}

/// Failure of a profile operation, as surfaced to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProfileError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ProfileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(name: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("profile '{name}' does not exist"))
    }

    pub fn name_conflict(name: &str) -> Self {
        Self::new(
            ErrorKind::NameConflict,
            format!("profile '{name}' already exists"),
        )
    }

    pub fn empty_name() -> Self {
        Self::new(ErrorKind::NameConflict, "profile name must not be empty")
    }

    pub fn default_protected(action: &str) -> Self {
        Self::new(
            ErrorKind::DefaultProfileProtected,
            format!("the default profile '{DEFAULT_PROFILE}' cannot be {action}"),
        )
    }

    pub fn game_running(display_name: &str) -> Self {
        Self::new(
            ErrorKind::GameRunning,
            format!("{display_name} is running; close the game before changing profiles"),
        )
    }

    pub fn in_progress() -> Self {
        Self::new(
            ErrorKind::OperationInProgress,
            "another profile operation is still in progress",
        )
    }
}

pub type OperationResult<T> = Result<T, ProfileError>;

/// Failure reported by a [`crate::backend::ConfigBackend`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Rejected(String),
    #[error("backend communication failed: {0}")]
    Communication(String),
}

impl BackendError {
    /// Stable wire tag, used by the socket protocol
    pub fn wire_kind(&self) -> BackendErrorKind {
        match self {
            BackendError::NotFound(_) => BackendErrorKind::NotFound,
            BackendError::Conflict(_) => BackendErrorKind::Conflict,
            BackendError::Rejected(_) => BackendErrorKind::Rejected,
            BackendError::Communication(_) => BackendErrorKind::Communication,
        }
    }

    pub fn from_wire(kind: Option<BackendErrorKind>, message: String) -> Self {
        match kind {
            Some(BackendErrorKind::NotFound) => BackendError::NotFound(message),
            Some(BackendErrorKind::Conflict) => BackendError::Conflict(message),
            Some(BackendErrorKind::Communication) => BackendError::Communication(message),
            Some(BackendErrorKind::Rejected) | None => BackendError::Rejected(message),
        }
    }

    /// Message without the transport prefix
    pub fn message(&self) -> &str {
        match self {
            BackendError::NotFound(msg)
            | BackendError::Conflict(msg)
            | BackendError::Rejected(msg)
            | BackendError::Communication(msg) => msg,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    NotFound,
    Conflict,
    Rejected,
    Communication,
}

impl From<BackendError> for ProfileError {
    fn from(err: BackendError) -> Self {
        let kind = match &err {
            BackendError::NotFound(_) => ErrorKind::NotFound,
            BackendError::Conflict(_) => ErrorKind::NameConflict,
            BackendError::Rejected(_) => ErrorKind::BackendRejected,
            BackendError::Communication(_) => ErrorKind::BackendCommunicationError,
        };
        // Backend text is passed through verbatim
        ProfileError::new(kind, err.to_string())
    }
}

/// Serializable `{success, data}` / `{success, error, message}` view of a result
#[derive(Debug, Clone, Serialize)]
pub struct OperationReport<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> From<OperationResult<T>> for OperationReport<T> {
    fn from(result: OperationResult<T>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
                message: None,
            },
            Err(err) => Self {
                success: false,
                data: None,
                error: Some(err.kind),
                message: Some(err.message),
            },
        }
    }
}
