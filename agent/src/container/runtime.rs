//! OCI runtime collaborator interface

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Signals the controller sends to a container's init process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Term,
    Kill,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Term => "SIGTERM",
            Signal::Kill => "SIGKILL",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw state document returned by `state`.
///
/// Only the status is interpreted; a missing status is a valid document
/// that the controller reports as `Unknown`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawState {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub pid: Option<i64>,

    #[serde(default)]
    pub bundle: Option<String>,
}

/// Failures reported by the runtime process, classified by what the
/// runtime said rather than by exit code alone
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("container '{0}' does not exist")]
    NotFound(String),

    #[error("container '{0}' is already stopped")]
    AlreadyStopped(String),

    #[error("container '{0}' is already running")]
    AlreadyRunning(String),

    #[error("malformed runtime output: {0}")]
    Malformed(String),

    #[error("failed to spawn runtime: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("runtime command failed: {0}")]
    Failed(String),
}

/// Command surface of an OCI runtime
#[async_trait]
pub trait OciRuntime: Send + Sync {
    /// Query the state document of a container
    async fn state(&self, id: &str) -> Result<RawState, RuntimeError>;

    /// Create a container from a bundle without starting the user process
    async fn create(&self, id: &str, bundle: &Path) -> Result<(), RuntimeError>;

    /// Start the user process of a created container
    async fn start(&self, id: &str) -> Result<(), RuntimeError>;

    /// Send a signal to the container's init process
    async fn kill(&self, id: &str, signal: Signal) -> Result<(), RuntimeError>;

    /// Release the resources of a stopped container
    async fn delete(&self, id: &str) -> Result<(), RuntimeError>;
}
