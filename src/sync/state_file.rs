//! Whole-file JSON persistence for the two local state files.
//!
//! Writes go to a temporary sibling that is chmod'ed to 0600 and then renamed
//! over the target, so a reader sees either the old or the new content.

use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use super::error::{SyncError, SyncResult};
use crate::error::SyncOperation;

/// Outcome of reading a state file.
#[derive(Debug)]
pub enum StateRead<T> {
    Missing,
    Loaded(T),
}

pub fn read_json<T: DeserializeOwned>(
    path: &Path,
    operation: SyncOperation,
) -> SyncResult<StateRead<T>> {
    if !path.exists() {
        return Ok(StateRead::Missing);
    }

    let content = fs::read_to_string(path).map_err(|err| SyncError::io(err, path))?;
    let value = serde_json::from_str(&content).map_err(|err| SyncError::json(operation, err))?;
    Ok(StateRead::Loaded(value))
}

pub fn write_private_json<T: Serialize>(
    path: &Path,
    value: &T,
    operation: SyncOperation,
) -> SyncResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|err| SyncError::io(err, parent))?;

    let json = serde_json::to_vec_pretty(value).map_err(|err| SyncError::json(operation, err))?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|err| SyncError::io(err, parent))?;
    restrict_permissions(temp.path())?;
    temp.write_all(&json)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|err| SyncError::io(err, temp.path()))?;
    temp.persist(path)
        .map_err(|err| SyncError::io(err.error, path))?;

    // persist keeps the temp file's mode, re-apply in case the target pre-existed with a wider one
    restrict_permissions(path)?;
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> SyncResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)
        .map_err(|err| SyncError::io(err, path))?
        .permissions();
    perms.set_mode(0o600); // rw-------
    fs::set_permissions(path, perms).map_err(|err| SyncError::io(err, path))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> SyncResult<()> {
    Ok(())
}
