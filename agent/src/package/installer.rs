//! Package-install collaborator interface

use std::path::Path;

use async_trait::async_trait;

use crate::package::errors::PackageError;

/// Check that `name` can be used as a single directory under the apps
/// root. Names come from package metadata and the command line.
pub fn validate_app_name(name: &str) -> Result<(), PackageError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\0');
    if invalid {
        return Err(PackageError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Materializes packages on disk
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Install `package` so that its bundle ends up at `destination`
    async fn install(&self, package: &Path, destination: &Path) -> Result<(), PackageError>;

    /// Remove the installation of `app_name` rooted at `path`.
    /// Removing a path that does not exist succeeds.
    async fn remove(&self, app_name: &str, path: &Path) -> Result<(), PackageError>;

    /// Application name declared in the package metadata
    async fn app_name(&self, package: &Path) -> Result<String, PackageError>;
}
