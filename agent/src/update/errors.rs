//! Update batch errors

use thiserror::Error;

use crate::container::errors::LifecycleError;
use crate::header::errors::FormatError;
use crate::package::errors::PackageError;

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("invalid update payload: {0}")]
    ArchiveInvalid(String),

    #[error("failed to install '{app}': {source}")]
    InstallFailed {
        app: String,
        #[source]
        source: PackageError,
    },

    #[error("failed to stop '{app}', update rolled back: {source}")]
    RollbackOnStopFailure {
        app: String,
        #[source]
        source: LifecycleError,
    },

    #[error("failed to start '{app}', update rolled back: {source}")]
    RollbackOnStartFailure {
        app: String,
        #[source]
        source: LifecycleError,
    },

    #[error("payload does not match its header: {0}")]
    PayloadMismatch(String),

    #[error("invalid update header: {0}")]
    Header(#[from] FormatError),

    #[error("reboot failed: {0}")]
    RebootFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpdateError {
    /// Stable name of the error kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            UpdateError::ArchiveInvalid(_) => "ArchiveInvalid",
            UpdateError::InstallFailed { .. } => "InstallFailed",
            UpdateError::RollbackOnStopFailure { .. } => "RollbackOnStopFailure",
            UpdateError::RollbackOnStartFailure { .. } => "RollbackOnStartFailure",
            UpdateError::PayloadMismatch(_) => "PayloadMismatch",
            UpdateError::Header(_) => "FormatError",
            UpdateError::RebootFailed(_) => "RebootFailed",
            UpdateError::Io(_) => "Io",
        }
    }
}
