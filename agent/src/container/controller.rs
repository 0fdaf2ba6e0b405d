//! Container lifecycle controller
//!
//! Every operation re-queries the runtime; nothing about a container is
//! cached between calls.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::fs;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::container::errors::LifecycleError;
use crate::container::poll::poll_until;
use crate::container::runtime::{OciRuntime, RuntimeError, Signal};
use crate::container::state::ContainerState;

/// Controller options
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Interval between state queries while waiting for a container to stop
    pub poll_interval: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Successful outcome of `stop` and `kill`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The container was stopped (if needed) and deleted
    Stopped,

    /// There was nothing to stop
    DoesNotExist,
}

/// Drives containers through create/start/signal/delete
pub struct ContainerController {
    runtime: Arc<dyn OciRuntime>,
    options: ControllerOptions,
    span: Span,
}

impl ContainerController {
    /// Create a controller. All operations are recorded under `span`.
    pub fn new(runtime: Arc<dyn OciRuntime>, options: ControllerOptions, span: Span) -> Self {
        Self {
            runtime,
            options,
            span,
        }
    }

    /// Query the runtime for the state of a container
    pub async fn get_state(&self, id: &str) -> ContainerState {
        match self.runtime.state(id).await {
            Ok(raw) => match raw.status.as_deref() {
                Some(status) => {
                    let state = ContainerState::from_status(status);
                    if state == ContainerState::Unknown {
                        warn!("Container {} reported unrecognised status '{}'", id, status);
                    }
                    state
                }
                None => {
                    warn!("Container {} state has no status field", id);
                    ContainerState::Unknown
                }
            },
            Err(RuntimeError::NotFound(_)) => ContainerState::DoesNotExist,
            Err(e) => {
                warn!("Unable to query state of container {}: {}", id, e);
                ContainerState::Unknown
            }
        }
    }

    /// Create and start a container from `bundle`
    pub async fn run(&self, id: &str, bundle: &Path) -> Result<(), LifecycleError> {
        let span = info_span!(parent: &self.span, "run", container = id);
        self.create_and_start(id, bundle).instrument(span).await
    }

    async fn create_and_start(&self, id: &str, bundle: &Path) -> Result<(), LifecycleError> {
        info!("Running container {} from {:?}", id, bundle);
        self.create(id, bundle).await?;
        self.start(id).await?;
        info!("Container {} is running", id);
        Ok(())
    }

    /// Create a container without starting it
    pub async fn create(&self, id: &str, bundle: &Path) -> Result<(), LifecycleError> {
        match self.get_state(id).await {
            ContainerState::DoesNotExist => {}
            ContainerState::Unknown => return Err(LifecycleError::StatusUnknown(id.to_string())),
            state => {
                debug!("Container {} already exists in state {}", id, state);
                return Err(LifecycleError::AlreadyExists(id.to_string()));
            }
        }

        let is_dir = fs::metadata(bundle)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(LifecycleError::BundleNotFound(bundle.to_path_buf()));
        }

        self.runtime
            .create(id, bundle)
            .await
            .map_err(|e| LifecycleError::CreateFailed {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        debug!("Container {} created", id);
        Ok(())
    }

    /// Start a created container
    pub async fn start(&self, id: &str) -> Result<(), LifecycleError> {
        self.runtime.start(id).await.map_err(|e| match e {
            RuntimeError::AlreadyStopped(_) => LifecycleError::ContainerStopped(id.to_string()),
            RuntimeError::AlreadyRunning(_) => LifecycleError::ContainerRunning(id.to_string()),
            other => LifecycleError::StartFailed {
                id: id.to_string(),
                reason: other.to_string(),
            },
        })
    }

    /// Stop a container gracefully, escalating to SIGKILL after
    /// `sigterm_timeout`, then delete it
    pub async fn stop(
        &self,
        id: &str,
        sigterm_timeout: Duration,
        sigkill_timeout: Duration,
    ) -> Result<StopOutcome, LifecycleError> {
        let span = info_span!(parent: &self.span, "stop", container = id);
        self.terminate(id, &[(Signal::Term, sigterm_timeout), (Signal::Kill, sigkill_timeout)])
            .instrument(span)
            .await
    }

    /// Kill a container with SIGKILL, then delete it
    pub async fn kill(&self, id: &str, sigkill_timeout: Duration) -> Result<StopOutcome, LifecycleError> {
        let span = info_span!(parent: &self.span, "kill", container = id);
        self.terminate(id, &[(Signal::Kill, sigkill_timeout)])
            .instrument(span)
            .await
    }

    async fn terminate(
        &self,
        id: &str,
        escalation: &[(Signal, Duration)],
    ) -> Result<StopOutcome, LifecycleError> {
        match self.get_state(id).await {
            ContainerState::DoesNotExist => {
                info!("Container {} does not exist, nothing to stop", id);
                return Ok(StopOutcome::DoesNotExist);
            }
            ContainerState::Unknown => return Err(LifecycleError::StatusUnknown(id.to_string())),
            ContainerState::Stopped => {
                debug!("Container {} is already stopped", id);
            }
            ContainerState::Created | ContainerState::Running => {
                let mut stopped = false;
                for (signal, timeout) in escalation {
                    if self.signal_and_wait(id, *signal, *timeout).await? {
                        stopped = true;
                        break;
                    }
                    warn!("Container {} still running {:?} after {}", id, timeout, signal);
                }
                if !stopped {
                    return Err(LifecycleError::Timeout(id.to_string()));
                }
            }
        }

        self.delete(id).await?;
        info!("Container {} stopped and deleted", id);
        Ok(StopOutcome::Stopped)
    }

    /// Send `signal` and wait up to `timeout` for the container to stop.
    /// Returns whether it stopped.
    async fn signal_and_wait(
        &self,
        id: &str,
        signal: Signal,
        timeout: Duration,
    ) -> Result<bool, LifecycleError> {
        debug!("Sending {} to container {}", signal, id);
        match self.runtime.kill(id, signal).await {
            Ok(()) => {}
            Err(RuntimeError::AlreadyStopped(_)) | Err(RuntimeError::NotFound(_)) => {
                debug!("Container {} had already stopped", id);
                return Ok(true);
            }
            Err(e) => {
                return Err(LifecycleError::SignalFailed {
                    id: id.to_string(),
                    signal: signal.as_str(),
                    reason: e.to_string(),
                })
            }
        }

        poll_until(self.options.poll_interval, timeout, || self.is_stopped(id)).await
    }

    async fn is_stopped(&self, id: &str) -> Result<bool, LifecycleError> {
        match self.get_state(id).await {
            ContainerState::Stopped | ContainerState::DoesNotExist => Ok(true),
            ContainerState::Unknown => Err(LifecycleError::StatusUnknown(id.to_string())),
            ContainerState::Created | ContainerState::Running => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), LifecycleError> {
        match self.runtime.delete(id).await {
            Ok(()) | Err(RuntimeError::NotFound(_)) => Ok(()),
            Err(e) => Err(LifecycleError::DeleteFailed {
                id: id.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
