//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::container::controller::ControllerOptions;
use crate::storage::settings::{RuntimeSettings, Settings};
use crate::update::orchestrator::UpdateOptions;

/// Options every command is built from
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Root of the versioned application bundles
    pub apps_root: PathBuf,

    /// OCI runtime configuration
    pub runtime: RuntimeSettings,

    /// Package tool executable
    pub package_binary: PathBuf,

    /// Container controller options
    pub controller: ControllerOptions,

    /// Update orchestrator options, including the default stop timeouts
    pub update: UpdateOptions,

    /// Command used to reboot after an update
    pub reboot_command: Vec<String>,
}

impl AppOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            apps_root: settings.apps_root.clone(),
            runtime: settings.runtime.clone(),
            package_binary: settings.packages.binary.clone(),
            controller: ControllerOptions {
                poll_interval: Duration::from_millis(settings.timeouts.poll_interval_ms),
            },
            update: UpdateOptions {
                package_extension: settings.packages.extension.clone(),
                staging_root: settings.staging_root.clone(),
                sigterm_timeout: Duration::from_secs(settings.timeouts.sigterm_secs),
                sigkill_timeout: Duration::from_secs(settings.timeouts.sigkill_secs),
            },
            reboot_command: settings.reboot_command.clone(),
        }
    }

    pub fn sigterm_timeout(&self, override_secs: Option<u64>) -> Duration {
        override_secs
            .map(Duration::from_secs)
            .unwrap_or(self.update.sigterm_timeout)
    }

    pub fn sigkill_timeout(&self, override_secs: Option<u64>) -> Duration {
        override_secs
            .map(Duration::from_secs)
            .unwrap_or(self.update.sigkill_timeout)
    }
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}
