//! Configuration path management
//!
//! - persistent state (settings, credential, upload history) lives in `~/.config/sleephq-sync/`
//! - runtime data (logs) lives in `<tmp>/.sleephq-sync/`

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::{
    APP_DIR_NAME, HISTORY_FILE_NAME, LOG_FILE_NAME, SETTINGS_FILE_NAME, TOKEN_FILE_NAME,
};

/// Resolved file locations
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Persistent configuration directory
    pub config_dir: PathBuf,
    /// Runtime data directory
    pub runtime_dir: PathBuf,
    /// User settings file
    pub settings_file: PathBuf,
    /// Stored bearer token
    pub token_file: PathBuf,
    /// Upload history table
    pub history_file: PathBuf,
    /// Log file (runtime directory)
    pub log_file: PathBuf,
}

impl ConfigPaths {
    pub fn new() -> Result<Self> {
        let home_dir =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?;
        Ok(Self::rooted_at(&home_dir.join(".config").join(APP_DIR_NAME)))
    }

    /// Build paths under an explicit configuration directory.
    pub fn rooted_at(config_dir: &Path) -> Self {
        let runtime_dir = std::env::temp_dir().join(format!(".{APP_DIR_NAME}"));

        Self {
            settings_file: config_dir.join(SETTINGS_FILE_NAME),
            token_file: config_dir.join(TOKEN_FILE_NAME),
            history_file: config_dir.join(HISTORY_FILE_NAME),
            log_file: runtime_dir.join(LOG_FILE_NAME),
            config_dir: config_dir.to_path_buf(),
            runtime_dir,
        }
    }

    /// Make sure the directories exist
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.runtime_dir)?;
        Ok(())
    }
}

/// Expand `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
