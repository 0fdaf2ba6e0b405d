//! Update payload unpacking
//!
//! A payload is a plain tar whose entries are all regular package files
//! at the top level of the archive.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tar::EntryType;
use tracing::{debug, info};

use crate::update::errors::UpdateError;

/// Extract every package in `payload` into `staging`, returning the
/// extracted paths in archive order
pub async fn unpack(payload: &Path, staging: &Path, extension: &str) -> Result<Vec<PathBuf>, UpdateError> {
    let payload = payload.to_path_buf();
    let staging = staging.to_path_buf();
    let extension = extension.to_string();
    tokio::task::spawn_blocking(move || unpack_blocking(&payload, &staging, &extension))
        .await
        .map_err(|e| UpdateError::ArchiveInvalid(format!("unpack task failed: {}", e)))?
}

fn unpack_blocking(payload: &Path, staging: &Path, extension: &str) -> Result<Vec<PathBuf>, UpdateError> {
    info!("Unpacking update payload {:?}", payload);
    let names = validate_archive(payload, extension)?;

    // every entry is valid; the second pass only extracts
    let mut archive = tar::Archive::new(fs::File::open(payload)?);
    let mut packages = Vec::with_capacity(names.len());
    for (entry, name) in archive.entries()?.zip(&names) {
        let target = staging.join(name);
        entry?.unpack(&target)?;
        debug!("Extracted {}", name);
        packages.push(target);
    }

    Ok(packages)
}

/// Check every entry of the archive before anything is extracted,
/// returning the package file names in archive order
fn validate_archive(payload: &Path, extension: &str) -> Result<Vec<String>, UpdateError> {
    let mut archive = tar::Archive::new(fs::File::open(payload)?);
    let entries = archive
        .entries()
        .map_err(|e| UpdateError::ArchiveInvalid(format!("not a tar archive: {}", e)))?;

    let mut names = Vec::new();
    let mut seen = HashSet::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| UpdateError::ArchiveInvalid(format!("malformed archive: {}", e)))?;
        let path = entry
            .path()
            .map_err(|e| UpdateError::ArchiveInvalid(format!("bad entry name: {}", e)))?
            .into_owned();
        let name = validate_entry(&path, entry.header().entry_type(), extension)?;
        if !seen.insert(name.clone()) {
            return Err(UpdateError::ArchiveInvalid(format!("duplicate entry {:?}", name)));
        }
        names.push(name);
    }
    Ok(names)
}

/// Check one archive entry, returning its file name
pub fn validate_entry(path: &Path, kind: EntryType, extension: &str) -> Result<String, UpdateError> {
    if !kind.is_file() {
        return Err(UpdateError::ArchiveInvalid(format!(
            "entry {:?} is not a regular file",
            path
        )));
    }

    let mut components = path.components();
    let name = match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => name,
        _ => {
            return Err(UpdateError::ArchiveInvalid(format!(
                "entry {:?} must not contain a directory component",
                path
            )))
        }
    };

    if Path::new(name).extension().and_then(|e| e.to_str()) != Some(extension) {
        return Err(UpdateError::ArchiveInvalid(format!(
            "entry {:?} is not a .{} package",
            path, extension
        )));
    }

    name.to_str()
        .map(str::to_string)
        .ok_or_else(|| UpdateError::ArchiveInvalid(format!("entry {:?} is not valid UTF-8", path)))
}
