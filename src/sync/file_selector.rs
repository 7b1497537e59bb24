//! Decides which files of the mirrored SD card go into the next import.
//!
//! Three categories are ever selected, in this order:
//! 1. the mandatory root files (`STR.edf`, `Identification.crc`, `Identification.json`)
//! 2. everything under `SETTINGS/`
//! 3. `DATALOG/<date>/` folders, in full, when forced or when a changed file lives in them
//!
//! Every other file in the tree is ignored.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::{DATALOG_DIR, MANDATORY_ROOT_FILES, SETTINGS_DIR};

#[derive(Debug, Clone)]
pub struct FileSelector {
    mirror_root: PathBuf,
}

/// Ordered, duplicate-free accumulator.
#[derive(Debug, Default)]
struct Selection {
    files: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl Selection {
    fn add(&mut self, path: &Path) {
        if !path.is_file() || is_hidden(path) {
            return;
        }
        if self.seen.insert(path.to_path_buf()) {
            self.files.push(path.to_path_buf());
        }
    }

    fn add_tree(&mut self, dir: &Path) {
        for entry in WalkDir::new(dir).sort_by_file_name() {
            match entry {
                Ok(entry) => self.add(entry.path()),
                Err(err) => warn!("Skipping unreadable entry under {}: {}", dir.display(), err),
            }
        }
    }
}

impl FileSelector {
    pub fn new(mirror_root: impl Into<PathBuf>) -> Self {
        Self {
            mirror_root: mirror_root.into(),
        }
    }

    pub fn mirror_root(&self) -> &Path {
        &self.mirror_root
    }

    /// Files for the next import, in upload order.
    pub fn select(&self, changed_files: &[PathBuf], force: bool) -> Vec<PathBuf> {
        let mut selection = Selection::default();

        for name in MANDATORY_ROOT_FILES {
            selection.add(&self.mirror_root.join(name));
        }

        let settings_dir = self.mirror_root.join(SETTINGS_DIR);
        if settings_dir.is_dir() {
            selection.add_tree(&settings_dir);
        }

        let active = self.active_date_folders(changed_files);
        for folder in self.date_folders() {
            let name = folder
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if force || active.contains(&name) {
                debug!("Including date folder {}", name);
                selection.add_tree(&folder);
            } else {
                debug!("Skipping unchanged date folder {}", name);
            }
        }

        selection.files
    }

    /// Names of the `DATALOG` date folders touched by the change set.
    pub fn active_date_folders(&self, changed_files: &[PathBuf]) -> BTreeSet<String> {
        let mut active = BTreeSet::new();

        for changed in changed_files {
            let Some(relative) = self.relative_to_root(changed) else {
                warn!(
                    "Changed file {} is not under mirror root {}, ignoring",
                    changed.display(),
                    self.mirror_root.display()
                );
                continue;
            };

            let mut parts = relative.components().filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            });
            if let (Some(first), Some(folder)) = (parts.next(), parts.next()) {
                if first == DATALOG_DIR {
                    active.insert(folder);
                }
            }
        }

        active
    }

    fn relative_to_root(&self, path: &Path) -> Option<PathBuf> {
        if path.is_relative() {
            return Some(path.to_path_buf());
        }
        if let Ok(relative) = path.strip_prefix(&self.mirror_root) {
            return Some(relative.to_path_buf());
        }

        // the mirror process may report paths through a symlinked or otherwise
        // differently spelled root
        let root = self.mirror_root.canonicalize().ok()?;
        let canonical = path.canonicalize().ok()?;
        canonical.strip_prefix(&root).ok().map(Path::to_path_buf)
    }

    fn date_folders(&self) -> Vec<PathBuf> {
        let datalog = self.mirror_root.join(DATALOG_DIR);
        if !datalog.is_dir() {
            return Vec::new();
        }

        let entries = match fs::read_dir(&datalog) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Failed to list {}: {}", datalog.display(), err);
                return Vec::new();
            }
        };

        let mut folders: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        folders.sort();
        folders
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(true)
}
