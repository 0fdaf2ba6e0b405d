//! Multi-application update orchestration
//!
//! Phases run strictly in order over the whole batch: install, stop,
//! start, finalize. A failure in any of the first three undoes exactly
//! the steps recorded in the batch progress; finalize failures are only
//! reported.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::container::controller::{ContainerController, StopOutcome};
use crate::container::state::ContainerState;
use crate::filesys::dir::Dir;
use crate::package::errors::PackageError;
use crate::package::installer::{validate_app_name, PackageInstaller};
use crate::storage::layout::AppsLayout;
use crate::update::batch::{AppRecord, BatchReport, CleanupWarning, UpdateBatch};
use crate::update::errors::UpdateError;
use crate::update::payload;

/// Orchestrator options
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Extension every package in a payload must carry
    pub package_extension: String,

    /// Parent of the per-batch staging directories
    pub staging_root: PathBuf,

    pub sigterm_timeout: Duration,

    pub sigkill_timeout: Duration,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            package_extension: "ipk".to_string(),
            staging_root: PathBuf::from("/var/tmp/appvisor"),
            sigterm_timeout: Duration::from_secs(3),
            sigkill_timeout: Duration::from_secs(1),
        }
    }
}

/// Applies update payloads atomically across all applications they contain
pub struct UpdateOrchestrator {
    controller: Arc<ContainerController>,
    installer: Arc<dyn PackageInstaller>,
    layout: AppsLayout,
    options: UpdateOptions,
    span: Span,
}

impl UpdateOrchestrator {
    pub fn new(
        controller: Arc<ContainerController>,
        installer: Arc<dyn PackageInstaller>,
        layout: AppsLayout,
        options: UpdateOptions,
        span: Span,
    ) -> Self {
        Self {
            controller,
            installer,
            layout,
            options,
            span,
        }
    }

    /// Unpack `payload` and update every application it contains
    pub async fn apply_payload(&self, payload: &Path) -> Result<BatchReport, UpdateError> {
        let staging = Dir::new(&self.options.staging_root)
            .create_temp_dir("batch")
            .await?;

        let result = self.unpack_and_run(payload, staging.path()).await;

        if let Err(e) = staging.delete().await {
            warn!("Unable to remove staging directory {:?}: {}", staging.path(), e);
        }
        result
    }

    async fn unpack_and_run(&self, payload: &Path, staging: &Path) -> Result<BatchReport, UpdateError> {
        let packages = payload::unpack(payload, staging, &self.options.package_extension).await?;
        self.run_batch(&packages).await
    }

    /// Update one application per package, in the given order
    pub async fn run_batch(&self, packages: &[PathBuf]) -> Result<BatchReport, UpdateError> {
        let span = info_span!(parent: &self.span, "update_batch", packages = packages.len());
        self.run_phases(packages).instrument(span).await
    }

    async fn run_phases(&self, packages: &[PathBuf]) -> Result<BatchReport, UpdateError> {
        if packages.is_empty() {
            warn!("Update payload contains no packages, nothing to do");
            return Ok(BatchReport::default());
        }

        let mut batch = UpdateBatch::new();
        self.install_all(&mut batch, packages).await?;
        self.stop_all(&mut batch).await?;
        self.start_all(&mut batch).await?;
        let report = self.finalize(&batch).await;
        info!("Updated {} application(s): {:?}", report.updated.len(), report.updated);
        Ok(report)
    }

    async fn install_all(&self, batch: &mut UpdateBatch, packages: &[PathBuf]) -> Result<(), UpdateError> {
        for package in packages {
            let record = match self.prepare_record(batch, package).await {
                Ok(record) => record,
                Err((app, source)) => {
                    error!("Unable to prepare install of {:?}: {}", package, source);
                    self.rollback(batch).await;
                    return Err(UpdateError::InstallFailed { app, source });
                }
            };

            info!(
                "Installing {} into {:?} (current: {:?})",
                record.name, record.new_bundle, record.current_bundle
            );
            let index = batch.push(record);
            batch.mark_install_attempted(index);

            let record = batch.record(index);
            if let Err(source) = self.installer.install(&record.package, &record.new_bundle).await {
                let app = record.name.clone();
                error!("Install of {} failed: {}", app, source);
                self.rollback(batch).await;
                return Err(UpdateError::InstallFailed { app, source });
            }
            batch.mark_installed(index);
        }
        Ok(())
    }

    async fn prepare_record(
        &self,
        batch: &UpdateBatch,
        package: &Path,
    ) -> Result<AppRecord, (String, PackageError)> {
        let label = package
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| package.display().to_string());

        let name = self
            .installer
            .app_name(package)
            .await
            .and_then(|name| validate_app_name(&name).map(|()| name))
            .map_err(|e| (label.clone(), e))?;

        if batch.contains(&name) {
            return Err((
                name,
                PackageError::InstallFailed {
                    package: package.to_path_buf(),
                    reason: "application appears more than once in the payload".to_string(),
                },
            ));
        }

        let current_bundle = self
            .layout
            .current_bundle(&name)
            .await
            .map_err(|e| (name.clone(), PackageError::Io(e)))?
            .map(|(_, path)| path);
        let new_bundle = self
            .layout
            .next_bundle(&name)
            .await
            .map_err(|e| (name.clone(), PackageError::Io(e)))?;

        Ok(AppRecord {
            name,
            current_bundle,
            new_bundle,
            package: package.to_path_buf(),
        })
    }

    async fn stop_all(&self, batch: &mut UpdateBatch) -> Result<(), UpdateError> {
        for index in 0..batch.len() {
            let name = batch.record(index).name.clone();
            // only a container that was running gets restarted on rollback
            let was_running = self.controller.get_state(&name).await == ContainerState::Running;
            match self
                .controller
                .stop(&name, self.options.sigterm_timeout, self.options.sigkill_timeout)
                .await
            {
                Ok(outcome) => {
                    if outcome == StopOutcome::Stopped && !was_running {
                        debug!("{} was not running before the update", name);
                    }
                    batch.mark_stopped(index, was_running && outcome == StopOutcome::Stopped);
                }
                Err(source) => {
                    error!("Stopping {} failed: {}", name, source);
                    self.rollback(batch).await;
                    return Err(UpdateError::RollbackOnStopFailure { app: name, source });
                }
            }
        }
        Ok(())
    }

    async fn start_all(&self, batch: &mut UpdateBatch) -> Result<(), UpdateError> {
        for index in 0..batch.len() {
            batch.mark_start_attempted(index);
            let record = batch.record(index);
            if let Err(source) = self.controller.run(&record.name, &record.new_bundle).await {
                let app = record.name.clone();
                error!("Starting new version of {} failed: {}", app, source);
                self.rollback(batch).await;
                return Err(UpdateError::RollbackOnStartFailure { app, source });
            }
            batch.mark_started(index);
        }
        Ok(())
    }

    async fn finalize(&self, batch: &UpdateBatch) -> BatchReport {
        let mut report = BatchReport::default();
        for entry in batch.entries() {
            let record = &entry.record;
            report.updated.push(record.name.clone());

            let Some(old) = &record.current_bundle else {
                continue;
            };
            info!("Removing previous bundle {:?} of {}", old, record.name);
            if let Err(e) = self.installer.remove(&record.name, old).await {
                warn!("Cleanup of {:?} for {} failed: {}", old, record.name, e);
                report.cleanup_warnings.push(CleanupWarning {
                    app: record.name.clone(),
                    path: old.clone(),
                    reason: e.to_string(),
                });
            }
        }
        report
    }

    /// Undo every completed step of `batch`. Each undo step is attempted
    /// even if an earlier one fails.
    async fn rollback(&self, batch: &UpdateBatch) {
        warn!("Rolling back update batch of {} application(s)", batch.len());

        for entry in batch.entries().iter().rev() {
            if !entry.progress.start_attempted {
                continue;
            }
            let name = &entry.record.name;
            info!("Rollback: stopping new instance of {}", name);
            if let Err(e) = self
                .controller
                .stop(name, self.options.sigterm_timeout, self.options.sigkill_timeout)
                .await
            {
                error!("Rollback: failed to stop {}: {}", name, e);
            }
        }

        for entry in batch.entries().iter().rev() {
            if !entry.progress.install_attempted {
                continue;
            }
            let record = &entry.record;
            info!("Rollback: removing new bundle {:?} of {}", record.new_bundle, record.name);
            if let Err(e) = self.installer.remove(&record.name, &record.new_bundle).await {
                error!("Rollback: failed to remove {:?}: {}", record.new_bundle, e);
            }
        }

        for entry in batch.entries() {
            if !entry.progress.was_running {
                continue;
            }
            let record = &entry.record;
            match &record.current_bundle {
                Some(old) => {
                    info!("Rollback: restarting {} from {:?}", record.name, old);
                    if let Err(e) = self.controller.run(&record.name, old).await {
                        error!("Rollback: failed to restart {}: {}", record.name, e);
                    }
                }
                None => {
                    warn!("Rollback: {} has no previous bundle, leaving it absent", record.name);
                }
            }
        }

        warn!("Rollback complete");
    }
}
