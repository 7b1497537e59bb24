use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

use super::error::SyncResult;
use super::responses::id_to_string;
use super::state_file::{read_json, write_private_json, StateRead};
use crate::config::EXPIRY_MARGIN_SECS;
use crate::error::SyncOperation;
use crate::utils::unix_now;

/// Bearer token, its absolute expiry and the resolved team.
#[derive(Clone, PartialEq)]
pub struct CredentialRecord {
    pub access_token: String,
    /// Unix seconds
    pub expires_at: f64,
    pub team_id: String,
}

impl CredentialRecord {
    pub fn new(
        access_token: impl Into<String>,
        expires_at: f64,
        team_id: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
            team_id: team_id.into(),
        }
    }

    /// Usable iff token and team are present and `now < expires_at - 60s`.
    pub fn is_usable_at(&self, now: f64) -> bool {
        !self.access_token.is_empty()
            && !self.team_id.is_empty()
            && now < self.expires_at - EXPIRY_MARGIN_SECS
    }

    pub fn is_usable(&self) -> bool {
        self.is_usable_at(unix_now())
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        let secs = self.expires_at.trunc() as i64;
        let nanos = (self.expires_at.fract() * 1e9) as u32;
        Utc.timestamp_opt(secs, nanos).single()
    }
}

// never print the token
impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("team_id", &self.team_id)
            .finish()
    }
}

/// On-disk layout of the credential file.
#[derive(Debug, Serialize, Deserialize)]
struct StoredCredential {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_at: Option<f64>,
    #[serde(default)]
    team_id: Option<Value>,
}

impl From<&CredentialRecord> for StoredCredential {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            access_token: Some(record.access_token.clone()),
            expires_at: Some(record.expires_at),
            team_id: Some(Value::String(record.team_id.clone())),
        }
    }
}

/// Persists the credential record to a single owner-only JSON file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload the stored credential.
    ///
    /// Never fails: a missing, unreadable, malformed, incomplete or expired
    /// record only means the caller has to authenticate again.
    pub fn load(&self) -> Option<CredentialRecord> {
        let read = read_json::<StoredCredential>(&self.path, SyncOperation::CredentialLoad);
        let stored = match read {
            Ok(StateRead::Missing) => {
                debug!("No stored token at {}", self.path.display());
                return None;
            }
            Ok(StateRead::Loaded(stored)) => stored,
            Err(err) => {
                warn!("Failed to load token file: {}", err);
                return None;
            }
        };

        let record = CredentialRecord {
            access_token: stored.access_token.unwrap_or_default(),
            expires_at: stored.expires_at.unwrap_or(0.0),
            team_id: stored
                .team_id
                .as_ref()
                .and_then(id_to_string)
                .unwrap_or_default(),
        };

        if record.is_usable() {
            debug!("Loaded valid stored token");
            Some(record)
        } else {
            debug!("Stored token has expired or is incomplete");
            None
        }
    }

    /// Write token, expiry and team id as one unit.
    pub fn save(&self, record: &CredentialRecord) -> SyncResult<()> {
        write_private_json(
            &self.path,
            &StoredCredential::from(record),
            SyncOperation::CredentialSave,
        )?;
        debug!("Token saved to {}", self.path.display());
        Ok(())
    }

    /// Save, logging instead of failing. The in-memory credential stays usable
    /// for the rest of the run either way.
    pub fn save_or_log(&self, record: &CredentialRecord) -> bool {
        match self.save(record) {
            Ok(()) => true,
            Err(err) => {
                error!("Failed to save token file: {}", err);
                false
            }
        }
    }

    /// Drop the stored credential so the next run logs in again.
    pub fn invalidate(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed stored token {}", self.path.display()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("Failed to remove token file {}: {}", self.path.display(), err),
        }
    }
}
