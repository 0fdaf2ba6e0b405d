//! Storage layout configuration

use std::io;
use std::path::{Path, PathBuf};

use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Configuration layout for appvisor
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for configuration
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new("/etc/appvisor")
    }
}

/// Versioned bundle tree: `<root>/<app>/<N>/` where `N` is a
/// non-negative integer and the highest `N` is the current bundle
#[derive(Debug, Clone)]
pub struct AppsLayout {
    root: Dir,
}

impl AppsLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Dir::new(root),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Directory holding every version of `app`
    pub fn app_dir(&self, app: &str) -> Dir {
        self.root.subdir(app)
    }

    /// Path of version `index` of `app`
    pub fn bundle_path(&self, app: &str, index: u32) -> PathBuf {
        self.app_dir(app).path().join(index.to_string())
    }

    /// Numbered version directories of `app`, ascending.
    /// Entries that are not integers are ignored.
    pub async fn version_dirs(&self, app: &str) -> io::Result<Vec<(u32, PathBuf)>> {
        let mut versions: Vec<(u32, PathBuf)> = self
            .app_dir(app)
            .list_dirs()
            .await?
            .into_iter()
            .filter_map(|path| {
                let index = path.file_name()?.to_str()?.parse::<u32>().ok()?;
                Some((index, path))
            })
            .collect();
        versions.sort_by_key(|(index, _)| *index);
        Ok(versions)
    }

    /// Highest numbered bundle of `app`, if any
    pub async fn current_bundle(&self, app: &str) -> io::Result<Option<(u32, PathBuf)>> {
        Ok(self.version_dirs(app).await?.pop())
    }

    /// Where the next version of `app` goes: current index + 1, or 0
    pub async fn next_bundle(&self, app: &str) -> io::Result<PathBuf> {
        let next = match self.current_bundle(app).await? {
            Some((index, _)) => index.checked_add(1).ok_or_else(|| {
                io::Error::new(io::ErrorKind::Other, format!("version index of {} exhausted", app))
            })?,
            None => 0,
        };
        Ok(self.bundle_path(app, next))
    }

    /// Names of applications with at least one bundle
    pub async fn installed_apps(&self) -> io::Result<Vec<String>> {
        let mut apps = Vec::new();
        for path in self.root.list_dirs().await? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !self.version_dirs(name).await?.is_empty() {
                apps.push(name.to_string());
            }
        }
        Ok(apps)
    }
}
