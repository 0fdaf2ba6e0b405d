//! opkg-backed package installer
//!
//! Each application version is its own opkg destination rooted at the
//! bundle directory, so removing a version never touches another one.

use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::read::GzDecoder;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::filesys::dir::Dir;
use crate::package::errors::PackageError;
use crate::package::installer::PackageInstaller;

const DEST_NAME: &str = "app";
const CONTROL_MEMBER: &str = "control.tar.gz";

/// Installs `.ipk` packages with opkg
#[derive(Debug, Clone)]
pub struct OpkgInstaller {
    binary: PathBuf,
}

impl OpkgInstaller {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn opkg(&self, dest: &Path, args: &[&str]) -> Result<(), String> {
        let add_dest = format!("{}:{}", DEST_NAME, dest.display());
        debug!("Invoking {:?} --add-dest {} --dest {} {:?}", self.binary, add_dest, DEST_NAME, args);
        let output = Command::new(&self.binary)
            .args(["--add-dest", &add_dest, "--dest", DEST_NAME])
            .args(args)
            .output()
            .await
            .map_err(|e| format!("failed to run {:?}: {}", self.binary, e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
        }
    }
}

#[async_trait]
impl PackageInstaller for OpkgInstaller {
    async fn install(&self, package: &Path, destination: &Path) -> Result<(), PackageError> {
        info!("Installing {:?} into {:?}", package, destination);
        Dir::new(destination).create().await.map_err(|e| PackageError::InstallFailed {
            package: package.to_path_buf(),
            reason: e.to_string(),
        })?;

        let package_arg = package.to_string_lossy();
        self.opkg(destination, &["install", package_arg.as_ref()])
            .await
            .map_err(|reason| PackageError::InstallFailed {
                package: package.to_path_buf(),
                reason,
            })
    }

    async fn remove(&self, app_name: &str, path: &Path) -> Result<(), PackageError> {
        let dir = Dir::new(path);
        if !dir.exists().await {
            debug!("Nothing to remove for {} at {:?}", app_name, path);
            return Ok(());
        }

        info!("Removing {} from {:?}", app_name, path);
        if let Err(reason) = self.opkg(path, &["remove", app_name]).await {
            // The destination is self-contained; deleting it is what matters
            warn!("opkg could not remove {} cleanly: {}", app_name, reason);
        }

        dir.delete().await.map_err(|e| PackageError::RemoveFailed {
            app: app_name.to_string(),
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    async fn app_name(&self, package: &Path) -> Result<String, PackageError> {
        let metadata_err = |reason: String| PackageError::Metadata {
            package: package.to_path_buf(),
            reason,
        };

        let output = Command::new("ar")
            .arg("p")
            .arg(package)
            .arg(CONTROL_MEMBER)
            .output()
            .await
            .map_err(|e| metadata_err(format!("failed to run ar: {}", e)))?;
        if !output.status.success() {
            return Err(metadata_err(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let control = read_control_file(&output.stdout).map_err(metadata_err)?;
        control_field(&control, "Package").ok_or_else(|| metadata_err("no Package field in control file".to_string()))
    }
}

/// Extract the `control` file from a gzipped control tarball
pub fn read_control_file(control_tar_gz: &[u8]) -> Result<String, String> {
    let mut archive = tar::Archive::new(GzDecoder::new(control_tar_gz));
    let entries = archive.entries().map_err(|e| e.to_string())?;
    for entry in entries {
        let mut entry = entry.map_err(|e| e.to_string())?;
        let is_control = entry
            .path()
            .map(|p| p.file_name().map(|n| n == "control").unwrap_or(false))
            .unwrap_or(false);
        if is_control {
            let mut contents = String::new();
            entry.read_to_string(&mut contents).map_err(|e| e.to_string())?;
            return Ok(contents);
        }
    }
    Err("control file missing from control archive".to_string())
}

/// Value of a `Key: value` field in a Debian-style control file
pub fn control_field(control: &str, key: &str) -> Option<String> {
    control.lines().find_map(|line| {
        let (k, v) = line.split_once(':')?;
        if k.trim() == key {
            let v = v.trim();
            (!v.is_empty()).then(|| v.to_string())
        } else {
            None
        }
    })
}
