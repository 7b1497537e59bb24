use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::sync::error::{SyncError, SyncResult};
use crate::utils::config_paths::{expand_home, ConfigPaths};
use crate::utils::env::{expand_env_var, non_empty_var};

pub const DEFAULT_BASE_URL: &str = "https://sleephq.com";
pub const OAUTH_TOKEN_PATH: &str = "/oauth/token";
pub const TEAMS_PATH: &str = "/api/v1/teams";
pub const OAUTH_SCOPE: &str = "read write delete";

pub const AUTH_TIMEOUT: Duration = Duration::from_secs(10);
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifetime assumed when the token response carries no `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 7200;
/// A credential counts as expired this long before its real expiry.
pub const EXPIRY_MARGIN_SECS: f64 = 60.0;

/// Root files that belong in every import.
pub const MANDATORY_ROOT_FILES: [&str; 3] =
    ["STR.edf", "Identification.crc", "Identification.json"];
pub const SETTINGS_DIR: &str = "SETTINGS";
pub const DATALOG_DIR: &str = "DATALOG";

pub const APP_DIR_NAME: &str = "sleephq-sync";
pub const SETTINGS_FILE_NAME: &str = "config.json";
pub const TOKEN_FILE_NAME: &str = "sleephq_token.json";
pub const HISTORY_FILE_NAME: &str = "upload_tracker.json";
pub const LOG_FILE_NAME: &str = "sleephq-sync.log";

pub const CLIENT_ID_ENV: &str = "SLEEPHQ_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "SLEEPHQ_CLIENT_SECRET";
pub const BASE_URL_ENV: &str = "SLEEPHQ_BASE_URL";
pub const USERNAME_ENV: &str = "SLEEPHQ_USERNAME";
pub const PASSWORD_ENV: &str = "SLEEPHQ_PASSWORD";

/// User settings read from `config.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub username: Option<String>,
    pub mirror_root: Option<String>,
    pub token_file: Option<String>,
    pub history_file: Option<String>,
    pub record_history: bool,
    pub process_after_upload: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            username: None,
            mirror_root: None,
            token_file: None,
            history_file: None,
            record_history: true,
            process_after_upload: true,
        }
    }
}

impl Settings {
    /// Load settings from `path`, then apply environment overrides.
    ///
    /// A missing or malformed file yields the defaults.
    pub fn load(path: &Path) -> Self {
        let mut settings = Self::load_file(path);
        settings.apply_env_overrides();
        settings.expand_placeholders();
        settings
    }

    fn load_file(path: &Path) -> Self {
        if !path.exists() {
            debug!("No settings file at {}", path.display());
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!("Ignoring malformed settings file {}: {}", path.display(), err);
                    Self::default()
                }
            },
            Err(err) => {
                warn!("Failed to read settings file {}: {}", path.display(), err);
                Self::default()
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Some(value) = non_empty_var(CLIENT_ID_ENV) {
            self.client_id = value;
        }
        if let Some(value) = non_empty_var(CLIENT_SECRET_ENV) {
            self.client_secret = value;
        }
        if let Some(value) = non_empty_var(BASE_URL_ENV) {
            self.base_url = value;
        }
        if let Some(value) = non_empty_var(USERNAME_ENV) {
            self.username = Some(value);
        }
    }

    fn expand_placeholders(&mut self) {
        self.client_id = expand_env_var(&self.client_id);
        self.client_secret = expand_env_var(&self.client_secret);
        self.base_url = expand_env_var(&self.base_url);
        self.username = self.username.as_deref().map(expand_env_var);
    }

    /// Reject settings that cannot possibly authenticate.
    pub fn validate(&self) -> SyncResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(SyncError::config(format!(
                "client_id is required (set it in {SETTINGS_FILE_NAME} or {CLIENT_ID_ENV})"
            )));
        }
        if self.client_secret.trim().is_empty() {
            return Err(SyncError::config(format!(
                "client_secret is required (set it in {SETTINGS_FILE_NAME} or {CLIENT_SECRET_ENV})"
            )));
        }
        url::Url::parse(&self.base_url).map_err(SyncError::url)?;
        Ok(())
    }

    pub fn token_path(&self, paths: &ConfigPaths) -> PathBuf {
        self.token_file
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| paths.token_file.clone())
    }

    pub fn history_path(&self, paths: &ConfigPaths) -> PathBuf {
        self.history_file
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| paths.history_file.clone())
    }

    pub fn mirror_root_path(&self) -> Option<PathBuf> {
        self.mirror_root.as_deref().map(expand_home)
    }
}
