//! Installing and removing single applications outside of an update batch

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, info_span, warn, Instrument, Span};

use crate::package::errors::PackageError;
use crate::package::installer::{validate_app_name, PackageInstaller};
use crate::storage::layout::AppsLayout;

/// An installed application and its version directories
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledApp {
    pub name: String,
    pub versions: Vec<u32>,
}

pub struct AppManager {
    installer: Arc<dyn PackageInstaller>,
    layout: AppsLayout,
    span: Span,
}

impl AppManager {
    pub fn new(installer: Arc<dyn PackageInstaller>, layout: AppsLayout, span: Span) -> Self {
        Self {
            installer,
            layout,
            span,
        }
    }

    /// Install a package whose application has no bundle yet.
    /// Returns the application name and its bundle path.
    pub async fn install(&self, package: &Path) -> Result<(String, PathBuf), PackageError> {
        let name = self.app_name(package).await?;
        if self.layout.current_bundle(&name).await?.is_some() {
            return Err(PackageError::AlreadyInstalled(name));
        }
        self.install_fresh(name, package).await
    }

    /// Install a package, replacing every existing version of its
    /// application
    pub async fn force_install(&self, package: &Path) -> Result<(String, PathBuf), PackageError> {
        let name = self.app_name(package).await?;
        self.remove_versions(&name).await?;
        self.install_fresh(name, package).await
    }

    /// Remove every version of `app`
    pub async fn remove(&self, app: &str) -> Result<(), PackageError> {
        validate_app_name(app)?;
        let span = info_span!(parent: &self.span, "remove", app = app);
        let removed = self.remove_versions(app).instrument(span).await?;
        if removed == 0 {
            return Err(PackageError::NotInstalled(app.to_string()));
        }
        info!("Removed {}", app);
        Ok(())
    }

    /// Every installed application, sorted by name
    pub async fn list(&self) -> Result<Vec<InstalledApp>, PackageError> {
        let mut apps = Vec::new();
        for name in self.layout.installed_apps().await? {
            let versions = self
                .layout
                .version_dirs(&name)
                .await?
                .into_iter()
                .map(|(index, _)| index)
                .collect();
            apps.push(InstalledApp { name, versions });
        }
        apps.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(apps)
    }

    /// Application name of `package`, checked for use as a directory name
    pub async fn app_name(&self, package: &Path) -> Result<String, PackageError> {
        let name = self.installer.app_name(package).await?;
        validate_app_name(&name)?;
        Ok(name)
    }

    async fn install_fresh(&self, name: String, package: &Path) -> Result<(String, PathBuf), PackageError> {
        let span = info_span!(parent: &self.span, "install", app = %name);
        let destination = self.layout.bundle_path(&name, 0);
        let result = self
            .installer
            .install(package, &destination)
            .instrument(span)
            .await;

        if let Err(e) = result {
            if let Err(cleanup) = self.installer.remove(&name, &destination).await {
                warn!("Unable to clean up partial install of {}: {}", name, cleanup);
            }
            return Err(e);
        }
        info!("Installed {} at {:?}", name, destination);
        Ok((name, destination))
    }

    /// Remove all version directories of `app`, newest first.
    /// Returns how many were removed.
    async fn remove_versions(&self, app: &str) -> Result<usize, PackageError> {
        let versions = self.layout.version_dirs(app).await?;
        for (_, path) in versions.iter().rev() {
            self.installer.remove(app, path).await?;
        }
        self.layout.app_dir(app).delete().await?;
        Ok(versions.len())
    }
}
