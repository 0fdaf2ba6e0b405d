//! Lifecycle error taxonomy

use std::path::PathBuf;

use thiserror::Error;

/// Failures of container lifecycle operations
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("state of container '{0}' could not be determined")]
    StatusUnknown(String),

    #[error("container '{0}' already exists")]
    AlreadyExists(String),

    #[error("bundle directory not found: {0}")]
    BundleNotFound(PathBuf),

    #[error("failed to create container '{id}': {reason}")]
    CreateFailed { id: String, reason: String },

    #[error("failed to start container '{id}': {reason}")]
    StartFailed { id: String, reason: String },

    #[error("container '{0}' has already stopped")]
    ContainerStopped(String),

    #[error("container '{0}' is already running")]
    ContainerRunning(String),

    #[error("failed to send {signal} to container '{id}': {reason}")]
    SignalFailed {
        id: String,
        signal: &'static str,
        reason: String,
    },

    #[error("container '{0}' did not stop before the timeout")]
    Timeout(String),

    #[error("failed to delete container '{id}': {reason}")]
    DeleteFailed { id: String, reason: String },
}

impl LifecycleError {
    /// Stable name of the error kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleError::StatusUnknown(_) => "StatusUnknown",
            LifecycleError::AlreadyExists(_) => "AlreadyExists",
            LifecycleError::BundleNotFound(_) => "BundleNotFound",
            LifecycleError::CreateFailed { .. } => "CreateFailed",
            LifecycleError::StartFailed { .. } => "StartFailed",
            LifecycleError::ContainerStopped(_) => "ContainerStopped",
            LifecycleError::ContainerRunning(_) => "ContainerRunning",
            LifecycleError::SignalFailed { .. } => "SignalFailed",
            LifecycleError::Timeout(_) => "Timeout",
            LifecycleError::DeleteFailed { .. } => "DeleteFailed",
        }
    }
}
