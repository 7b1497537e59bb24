//! Record of files already sent to SleepHQ.
//!
//! Keyed by canonical absolute path. The whole table is rewritten on every
//! mutation, so stable storage always matches the last completed call.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};

use super::error::{SyncError, SyncResult};
use super::state_file::{read_json, write_private_json, StateRead};
use crate::error::SyncOperation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// File modification time in Unix seconds, string-encoded.
    pub uploaded_at: String,
    pub filename: String,
}

#[derive(Debug)]
pub struct UploadHistory {
    path: PathBuf,
    uploads: BTreeMap<String, HistoryEntry>,
}

impl UploadHistory {
    /// Open the history file. Missing or malformed files give an empty table.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let uploads = match read_json(&path, SyncOperation::HistoryLoad) {
            Ok(StateRead::Loaded(uploads)) => uploads,
            Ok(StateRead::Missing) => {
                debug!("No existing tracker file at {}", path.display());
                BTreeMap::new()
            }
            Err(err) => {
                warn!("Failed to load tracker file: {}", err);
                BTreeMap::new()
            }
        };
        debug!("Loaded upload tracker with {} entries", uploads.len());

        Self { path, uploads }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mark_uploaded(&mut self, file_path: &Path) -> SyncResult<()> {
        let canonical = file_path
            .canonicalize()
            .map_err(|err| SyncError::io(err, file_path))?;
        let metadata =
            std::fs::metadata(&canonical).map_err(|err| SyncError::io(err, &canonical))?;
        let modified = metadata
            .modified()
            .map_err(|err| SyncError::io(err, &canonical))?;
        let mtime = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let filename = canonical
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut staged = self.uploads.clone();
        staged.insert(
            canonical.to_string_lossy().into_owned(),
            HistoryEntry {
                uploaded_at: mtime.to_string(),
                filename: filename.clone(),
            },
        );
        self.commit(staged)?;
        debug!("Marked as uploaded: {}", filename);
        Ok(())
    }

    pub fn is_uploaded(&self, file_path: &Path) -> bool {
        self.uploads.contains_key(&history_key(file_path))
    }

    pub fn entry(&self, file_path: &Path) -> Option<&HistoryEntry> {
        self.uploads.get(&history_key(file_path))
    }

    /// Returns whether an entry was removed.
    pub fn remove(&mut self, file_path: &Path) -> SyncResult<bool> {
        let mut staged = self.uploads.clone();
        if staged.remove(&history_key(file_path)).is_none() {
            return Ok(false);
        }
        self.commit(staged)?;
        debug!("Removed from tracker: {}", file_path.display());
        Ok(true)
    }

    pub fn clear(&mut self) -> SyncResult<()> {
        self.commit(BTreeMap::new())?;
        info!("Upload tracker cleared");
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.uploads.len()
    }

    /// Persist `uploads`, then adopt it. On failure the table is left as it was.
    fn commit(&mut self, uploads: BTreeMap<String, HistoryEntry>) -> SyncResult<()> {
        write_private_json(&self.path, &uploads, SyncOperation::HistorySave)
            .map_err(|err| SyncError::history_save(format!("{}: {}", self.path.display(), err)))?;
        self.uploads = uploads;
        Ok(())
    }
}

/// Canonical path when the file still exists, absolute path otherwise.
fn history_key(file_path: &Path) -> String {
    let resolved = file_path.canonicalize().unwrap_or_else(|_| {
        if file_path.is_absolute() {
            file_path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(file_path))
                .unwrap_or_else(|_| file_path.to_path_buf())
        }
    });
    resolved.to_string_lossy().into_owned()
}
