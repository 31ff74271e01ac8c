//! Terminal notifications for profile operations
//!
//! Every operation ends in exactly one [`Notification`]. How it is shown
//! (toast, log line, console) is up to the [`Notifier`] the host injects.

use serde::Serialize;
use std::fmt;
use tracing::{error, info};

use crate::error::ProfileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// Which operation produced a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Refresh,
    Create,
    Rename,
    Delete,
    Switch,
    UpdateConfig,
    LoadConfig,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Refresh => "refresh",
            Operation::Create => "create",
            Operation::Rename => "rename",
            Operation::Delete => "delete",
            Operation::Switch => "switch",
            Operation::UpdateConfig => "update config",
            Operation::LoadConfig => "load config",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub severity: Severity,
    pub operation: Operation,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn info(operation: Operation, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            operation,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn success(
        operation: Operation,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Success,
            operation,
            title: title.into(),
            message: message.into(),
        }
    }

    /// Failure notice; the title names the operation, the body is the error text
    pub fn failure(operation: Operation, err: &ProfileError) -> Self {
        Self {
            severity: Severity::Error,
            operation,
            title: format!("Could not {operation}"),
            message: err.message.clone(),
        }
    }
}

/// Sink for operation outcomes
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the tracing log
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.severity {
            Severity::Error => {
                error!(operation = %n.operation, title = %n.title, "{}", n.message)
            }
            Severity::Info | Severity::Success => {
                info!(operation = %n.operation, title = %n.title, "{}", n.message)
            }
        }
    }
}
