//! Error types for appvisor

use thiserror::Error;

use crate::container::errors::LifecycleError;
use crate::header::errors::FormatError;
use crate::package::errors::PackageError;
use crate::update::errors::UpdateError;

/// Main error type for appvisor
#[derive(Error, Debug)]
pub enum AppvisorError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("update applied, but {0} old bundle(s) could not be removed")]
    CleanupWarning(usize),
}

impl AppvisorError {
    /// Process exit code for this error; every error kind has its own
    pub fn exit_code(&self) -> i32 {
        match self {
            AppvisorError::IoError(_) | AppvisorError::JsonError(_) => 1,
            AppvisorError::ConfigError(_) => 2,
            AppvisorError::InvalidArgument(_) => 3,
            AppvisorError::Lifecycle(e) => match e {
                LifecycleError::StatusUnknown(_) => 10,
                LifecycleError::AlreadyExists(_) => 11,
                LifecycleError::BundleNotFound(_) => 12,
                LifecycleError::CreateFailed { .. } => 13,
                LifecycleError::StartFailed { .. } => 14,
                LifecycleError::ContainerStopped(_) => 15,
                LifecycleError::ContainerRunning(_) => 16,
                LifecycleError::SignalFailed { .. } => 17,
                LifecycleError::Timeout(_) => 18,
                LifecycleError::DeleteFailed { .. } => 19,
            },
            AppvisorError::Package(e) => match e {
                PackageError::InstallFailed { .. } => 30,
                PackageError::RemoveFailed { .. } => 31,
                PackageError::Metadata { .. } => 32,
                PackageError::AlreadyInstalled(_) => 33,
                PackageError::NotInstalled(_) => 34,
                PackageError::InvalidName(_) => 35,
                PackageError::Io(_) => 1,
            },
            AppvisorError::Update(e) => match e {
                UpdateError::ArchiveInvalid(_) => 40,
                UpdateError::InstallFailed { .. } => 41,
                UpdateError::RollbackOnStopFailure { .. } => 42,
                UpdateError::RollbackOnStartFailure { .. } => 43,
                UpdateError::PayloadMismatch(_) => 45,
                UpdateError::RebootFailed(_) => 46,
                UpdateError::Header(_) => 50,
                UpdateError::Io(_) => 1,
            },
            AppvisorError::CleanupWarning(_) => 44,
            AppvisorError::Format(_) => 50,
        }
    }

    /// Stable name of the error kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            AppvisorError::IoError(_) => "Io",
            AppvisorError::JsonError(_) => "Json",
            AppvisorError::ConfigError(_) => "Config",
            AppvisorError::InvalidArgument(_) => "InvalidArgument",
            AppvisorError::Lifecycle(e) => e.kind(),
            AppvisorError::Package(e) => match e {
                PackageError::InstallFailed { .. } => "InstallFailed",
                PackageError::RemoveFailed { .. } => "RemoveFailed",
                PackageError::Metadata { .. } => "MetadataFailed",
                PackageError::AlreadyInstalled(_) => "AlreadyInstalled",
                PackageError::NotInstalled(_) => "NotInstalled",
                PackageError::InvalidName(_) => "InvalidName",
                PackageError::Io(_) => "Io",
            },
            AppvisorError::Update(e) => e.kind(),
            AppvisorError::Format(_) => "FormatError",
            AppvisorError::CleanupWarning(_) => "CleanupWarning",
        }
    }
}
