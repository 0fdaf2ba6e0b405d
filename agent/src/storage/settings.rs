//! Settings file management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::AppvisorError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Appvisor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Also write logs to files in this directory
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Root of the versioned application bundles
    #[serde(default = "default_apps_root")]
    pub apps_root: PathBuf,

    /// Where update payloads are unpacked
    #[serde(default = "default_staging_root")]
    pub staging_root: PathBuf,

    /// OCI runtime configuration
    #[serde(default)]
    pub runtime: RuntimeSettings,

    /// Package tool configuration
    #[serde(default)]
    pub packages: PackageSettings,

    /// Stop/kill timeouts
    #[serde(default)]
    pub timeouts: TimeoutSettings,

    /// Command used to reboot after an update
    #[serde(default = "default_reboot_command")]
    pub reboot_command: Vec<String>,
}

fn default_apps_root() -> PathBuf {
    PathBuf::from("/home/app")
}

fn default_staging_root() -> PathBuf {
    PathBuf::from("/var/tmp/appvisor")
}

fn default_reboot_command() -> Vec<String> {
    vec!["reboot".to_string()]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            apps_root: default_apps_root(),
            staging_root: default_staging_root(),
            runtime: RuntimeSettings::default(),
            packages: PackageSettings::default(),
            timeouts: TimeoutSettings::default(),
            reboot_command: default_reboot_command(),
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file does not exist
    pub async fn load(file: &File) -> Result<Self, AppvisorError> {
        if !file.exists().await {
            return Ok(Self::default());
        }
        file.read_json().await.map_err(|e| {
            AppvisorError::ConfigError(format!("invalid settings file {:?}: {}", file.path(), e))
        })
    }
}

/// OCI runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Runtime executable
    #[serde(default = "default_runtime_binary")]
    pub binary: PathBuf,

    /// State directory passed as `--root`
    #[serde(default)]
    pub root: Option<PathBuf>,
}

fn default_runtime_binary() -> PathBuf {
    PathBuf::from("runc")
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            binary: default_runtime_binary(),
            root: None,
        }
    }
}

/// Package tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSettings {
    /// Package tool executable
    #[serde(default = "default_package_binary")]
    pub binary: PathBuf,

    /// Extension every package in an update payload must carry
    #[serde(default = "default_package_extension")]
    pub extension: String,
}

fn default_package_binary() -> PathBuf {
    PathBuf::from("opkg")
}

fn default_package_extension() -> String {
    "ipk".to_string()
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            binary: default_package_binary(),
            extension: default_package_extension(),
        }
    }
}

/// Timeouts for stopping containers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default = "default_sigterm_secs")]
    pub sigterm_secs: u64,

    #[serde(default = "default_sigkill_secs")]
    pub sigkill_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_sigterm_secs() -> u64 {
    3
}

fn default_sigkill_secs() -> u64 {
    1
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            sigterm_secs: default_sigterm_secs(),
            sigkill_secs: default_sigkill_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}
