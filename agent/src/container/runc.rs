//! `runc`-compatible OCI runtime invoked as an external process

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::container::runtime::{OciRuntime, RawState, RuntimeError, Signal};

const NOT_EXIST_MARKER: &str = "does not exist";
const ALREADY_STOPPED_MARKERS: &[&str] = &[
    "container not running",
    "process already finished",
    "cannot start a container that has stopped",
    "container has stopped",
];
const ALREADY_RUNNING_MARKERS: &[&str] = &[
    "cannot start an already running container",
    "already running",
];

/// OCI runtime reached through a runc-style command line
#[derive(Debug, Clone)]
pub struct RuncRuntime {
    binary: PathBuf,
    root: Option<PathBuf>,
}

impl RuncRuntime {
    pub fn new(binary: impl Into<PathBuf>, root: Option<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            root,
        }
    }

    async fn exec(&self, args: &[&str]) -> Result<Output, RuntimeError> {
        let mut cmd = Command::new(&self.binary);
        if let Some(root) = &self.root {
            cmd.arg("--root").arg(root);
        }
        cmd.args(args);
        debug!("Invoking runtime: {:?} {:?}", self.binary, args);
        let output = cmd.output().await?;
        Ok(output)
    }

    async fn exec_checked(&self, id: &str, args: &[&str]) -> Result<Output, RuntimeError> {
        let output = self.exec(args).await?;
        if output.status.success() {
            return Ok(output);
        }
        Err(classify_failure(id, &String::from_utf8_lossy(&output.stderr)))
    }
}

/// Turn runtime stderr into a typed failure
pub fn classify_failure(id: &str, stderr: &str) -> RuntimeError {
    let lowered = stderr.to_lowercase();
    if lowered.contains(NOT_EXIST_MARKER) {
        RuntimeError::NotFound(id.to_string())
    } else if ALREADY_STOPPED_MARKERS.iter().any(|m| lowered.contains(m)) {
        RuntimeError::AlreadyStopped(id.to_string())
    } else if ALREADY_RUNNING_MARKERS.iter().any(|m| lowered.contains(m)) {
        RuntimeError::AlreadyRunning(id.to_string())
    } else {
        RuntimeError::Failed(stderr.trim().to_string())
    }
}

/// Parse the JSON document printed by `state`
pub fn parse_state(stdout: &[u8]) -> Result<RawState, RuntimeError> {
    serde_json::from_slice(stdout).map_err(|e| RuntimeError::Malformed(e.to_string()))
}

#[async_trait]
impl OciRuntime for RuncRuntime {
    async fn state(&self, id: &str) -> Result<RawState, RuntimeError> {
        let output = self.exec_checked(id, &["state", id]).await?;
        parse_state(&output.stdout)
    }

    async fn create(&self, id: &str, bundle: &Path) -> Result<(), RuntimeError> {
        let bundle = bundle.to_string_lossy();
        self.exec_checked(id, &["create", "--bundle", bundle.as_ref(), id])
            .await?;
        Ok(())
    }

    async fn start(&self, id: &str) -> Result<(), RuntimeError> {
        self.exec_checked(id, &["start", id]).await?;
        Ok(())
    }

    async fn kill(&self, id: &str, signal: Signal) -> Result<(), RuntimeError> {
        self.exec_checked(id, &["kill", id, signal.as_str()]).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RuntimeError> {
        self.exec_checked(id, &["delete", id]).await?;
        Ok(())
    }
}
