//! Container state as observed through the OCI runtime

use serde::{Deserialize, Serialize};

/// State of a container as reported by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    /// Created but the user process has not been started
    Created,

    /// User process is running
    Running,

    /// User process exited, resources not yet released
    Stopped,

    /// The runtime explicitly reported that no such container exists
    DoesNotExist,

    /// The runtime could not be queried or returned unparseable data
    Unknown,
}

impl ContainerState {
    /// Map an OCI status string to a state.
    ///
    /// Statuses outside `created`/`running`/`stopped` (e.g. `paused`,
    /// `creating`) are not states this controller drives, so they map to
    /// `Unknown`.
    pub fn from_status(status: &str) -> Self {
        match status.trim() {
            "created" => ContainerState::Created,
            "running" => ContainerState::Running,
            "stopped" => ContainerState::Stopped,
            _ => ContainerState::Unknown,
        }
    }

    /// Whether the runtime knows about the container
    pub fn exists(&self) -> bool {
        matches!(
            self,
            ContainerState::Created | ContainerState::Running | ContainerState::Stopped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Stopped => "stopped",
            ContainerState::DoesNotExist => "does_not_exist",
            ContainerState::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
