//! Directory operations

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the directory exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Create the directory (and parents)
    pub async fn create(&self) -> io::Result<()> {
        fs::create_dir_all(&self.path).await
    }

    /// Delete the directory and all contents. Missing directories are fine.
    pub async fn delete(&self) -> io::Result<()> {
        match fs::remove_dir_all(&self.path).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// List subdirectories. A missing directory has none.
    pub async fn list_dirs(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = match fs::read_dir(&self.path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Get a subdirectory
    pub fn subdir(&self, name: &str) -> Dir {
        Dir::new(self.path.join(name))
    }

    /// Create a uniquely named directory under this one
    pub async fn create_temp_dir(&self, prefix: &str) -> io::Result<Dir> {
        let dir = self.subdir(&format!("{}-{}", prefix, uuid::Uuid::new_v4()));
        dir.create().await?;
        Ok(dir)
    }
}
