//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use appvisor::container::controller::{ContainerController, ControllerOptions};
use appvisor::container::runtime::{OciRuntime, RawState, RuntimeError, Signal};
use appvisor::package::errors::PackageError;
use appvisor::package::installer::PackageInstaller;

/// How a fake container reacts to the runtime commands
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    /// SIGTERM is delivered but the process keeps running
    pub ignore_term: bool,
    /// SIGKILL is delivered but the process keeps running
    pub ignore_kill: bool,
    /// After a signal, the container reports "stopped" only after this
    /// many further state queries
    pub polls_to_stop: u32,
    pub fail_create: bool,
    pub fail_start: bool,
    pub fail_kill: bool,
    /// `state` returns a status the controller does not know
    pub unknown_state: bool,
}

#[derive(Debug, Clone)]
struct FakeContainer {
    status: String,
    bundle: PathBuf,
    stopping_in: Option<u32>,
}

#[derive(Default)]
struct RuntimeInner {
    containers: HashMap<String, FakeContainer>,
    behaviors: HashMap<String, Behavior>,
    calls: Vec<String>,
}

/// OCI runtime keeping its containers in memory
#[derive(Default)]
pub struct FakeRuntime {
    inner: Mutex<RuntimeInner>,
}

impl FakeRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_behavior(&self, id: &str, behavior: Behavior) {
        self.inner.lock().unwrap().behaviors.insert(id.to_string(), behavior);
    }

    /// Register a container that is already in `status`
    pub fn add_container(&self, id: &str, status: &str, bundle: &Path) {
        self.inner.lock().unwrap().containers.insert(
            id.to_string(),
            FakeContainer {
                status: status.to_string(),
                bundle: bundle.to_path_buf(),
                stopping_in: None,
            },
        );
    }

    pub fn status(&self, id: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .containers
            .get(id)
            .map(|c| c.status.clone())
    }

    pub fn bundle(&self, id: &str) -> Option<PathBuf> {
        self.inner
            .lock()
            .unwrap()
            .containers
            .get(id)
            .map(|c| c.bundle.clone())
    }

    /// Bundle of `id` if it is running
    pub fn running_bundle(&self, id: &str) -> Option<PathBuf> {
        let inner = self.inner.lock().unwrap();
        inner
            .containers
            .get(id)
            .filter(|c| c.status == "running")
            .map(|c| c.bundle.clone())
    }

    /// Every mutating command, e.g. "kill app SIGTERM"
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn signals_sent(&self, id: &str) -> Vec<String> {
        let prefix = format!("kill {} ", id);
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    fn behavior(inner: &RuntimeInner, id: &str) -> Behavior {
        inner.behaviors.get(id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl OciRuntime for FakeRuntime {
    async fn state(&self, id: &str) -> Result<RawState, RuntimeError> {
        let mut inner = self.inner.lock().unwrap();
        if Self::behavior(&inner, id).unknown_state {
            return Ok(RawState {
                id: Some(id.to_string()),
                status: Some("confused".to_string()),
                ..Default::default()
            });
        }
        let container = inner
            .containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;

        if let Some(remaining) = container.stopping_in {
            if remaining == 0 {
                container.status = "stopped".to_string();
                container.stopping_in = None;
            } else {
                container.stopping_in = Some(remaining - 1);
            }
        }
        Ok(RawState {
            id: Some(id.to_string()),
            status: Some(container.status.clone()),
            pid: Some(42),
            bundle: Some(container.bundle.display().to_string()),
        })
    }

    async fn create(&self, id: &str, bundle: &Path) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(format!("create {}", id));
        if Self::behavior(&inner, id).fail_create {
            return Err(RuntimeError::Failed("rootfs missing".to_string()));
        }
        if inner.containers.contains_key(id) {
            return Err(RuntimeError::Failed(format!("container with id {} already exists", id)));
        }
        inner.containers.insert(
            id.to_string(),
            FakeContainer {
                status: "created".to_string(),
                bundle: bundle.to_path_buf(),
                stopping_in: None,
            },
        );
        Ok(())
    }

    async fn start(&self, id: &str) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(format!("start {}", id));
        let behavior = Self::behavior(&inner, id);
        let container = inner
            .containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
        match container.status.as_str() {
            "stopped" => return Err(RuntimeError::AlreadyStopped(id.to_string())),
            "running" => return Err(RuntimeError::AlreadyRunning(id.to_string())),
            _ => {}
        }
        if behavior.fail_start {
            container.status = "stopped".to_string();
            return Err(RuntimeError::Failed("exec: no such file".to_string()));
        }
        container.status = "running".to_string();
        Ok(())
    }

    async fn kill(&self, id: &str, signal: Signal) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(format!("kill {} {}", id, signal));
        let behavior = Self::behavior(&inner, id);
        if behavior.fail_kill {
            return Err(RuntimeError::Failed("permission denied".to_string()));
        }
        let container = inner
            .containers
            .get_mut(id)
            .ok_or_else(|| RuntimeError::NotFound(id.to_string()))?;
        if container.status == "stopped" {
            return Err(RuntimeError::AlreadyStopped(id.to_string()));
        }
        let ignored = match signal {
            Signal::Term => behavior.ignore_term,
            Signal::Kill => behavior.ignore_kill,
        };
        if !ignored {
            if behavior.polls_to_stop == 0 {
                container.status = "stopped".to_string();
            } else {
                container.stopping_in = Some(behavior.polls_to_stop);
            }
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(format!("delete {}", id));
        match inner.containers.get(id) {
            None => Err(RuntimeError::NotFound(id.to_string())),
            Some(c) if c.status == "running" => {
                Err(RuntimeError::Failed(format!("cannot delete running container {}", id)))
            }
            Some(_) => {
                inner.containers.remove(id);
                Ok(())
            }
        }
    }
}

#[derive(Default)]
struct InstallerInner {
    fail_install: HashSet<String>,
    fail_remove: HashSet<String>,
    calls: Vec<String>,
}

/// Package installer over plain files. A package is a text file holding
/// the application name; installing it creates the destination directory
/// with a copy of the package.
#[derive(Default)]
pub struct FakeInstaller {
    inner: Mutex<InstallerInner>,
}

impl FakeInstaller {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_install(&self, app: &str) {
        self.inner.lock().unwrap().fail_install.insert(app.to_string());
    }

    pub fn fail_remove(&self, app: &str) {
        self.inner.lock().unwrap().fail_remove.insert(app.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl PackageInstaller for FakeInstaller {
    async fn install(&self, package: &Path, destination: &Path) -> Result<(), PackageError> {
        let name = self.app_name(package).await?;
        let fail = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(format!("install {}", name));
            inner.fail_install.contains(&name)
        };

        // a failing install still leaves partial output behind
        tokio::fs::create_dir_all(destination).await?;
        if fail {
            return Err(PackageError::InstallFailed {
                package: package.to_path_buf(),
                reason: "package manager exited with status 1".to_string(),
            });
        }
        tokio::fs::copy(package, destination.join("package")).await?;
        Ok(())
    }

    async fn remove(&self, app_name: &str, path: &Path) -> Result<(), PackageError> {
        let fail = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(format!("remove {} {}", app_name, path.display()));
            inner.fail_remove.contains(app_name)
        };
        if fail {
            return Err(PackageError::RemoveFailed {
                app: app_name.to_string(),
                path: path.to_path_buf(),
                reason: "device or resource busy".to_string(),
            });
        }
        match tokio::fs::remove_dir_all(path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn app_name(&self, package: &Path) -> Result<String, PackageError> {
        let contents = tokio::fs::read_to_string(package).await?;
        let name = contents.lines().next().unwrap_or_default().trim().to_string();
        if name.is_empty() {
            return Err(PackageError::Metadata {
                package: package.to_path_buf(),
                reason: "no Package field".to_string(),
            });
        }
        Ok(name)
    }
}

/// Write a fake package for `app` with the given file name
pub fn write_package(dir: &Path, file_name: &str, app: &str) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, format!("{}\n", app)).unwrap();
    path
}

/// Create an installed bundle `<root>/<app>/<index>`
pub fn write_bundle(root: &Path, app: &str, index: u32) -> PathBuf {
    let path = root.join(app).join(index.to_string());
    std::fs::create_dir_all(&path).unwrap();
    std::fs::write(path.join("package"), format!("{}\n", app)).unwrap();
    path
}

pub fn controller(runtime: Arc<FakeRuntime>) -> Arc<ContainerController> {
    Arc::new(ContainerController::new(
        runtime,
        ControllerOptions::default(),
        tracing::Span::none(),
    ))
}
