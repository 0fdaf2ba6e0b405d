//! Package errors

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("failed to install {package:?}: {reason}")]
    InstallFailed { package: PathBuf, reason: String },

    #[error("failed to remove '{app}' from {path:?}: {reason}")]
    RemoveFailed {
        app: String,
        path: PathBuf,
        reason: String,
    },

    #[error("unable to read metadata of {package:?}: {reason}")]
    Metadata { package: PathBuf, reason: String },

    #[error("application '{0}' is already installed")]
    AlreadyInstalled(String),

    #[error("application '{0}' is not installed")]
    NotInstalled(String),

    #[error("invalid application name {0:?}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
