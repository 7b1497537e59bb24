//! One upload pass: authenticate, select, upload, record.

use secrecy::SecretString;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use super::file_selector::FileSelector;
use super::sleephq_client::SleepHqClient;
use super::upload_history::UploadHistory;

/// Username and password for an explicit login.
#[derive(Clone)]
pub struct LoginCredentials {
    pub username: String,
    pub password: SecretString,
}

impl LoginCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Supplies login credentials when no stored token is usable.
///
/// Interactive prompting lives behind this trait, outside the core.
pub trait CredentialSource {
    fn login_credentials(&self) -> Option<LoginCredentials>;
}

/// Never supplies credentials; for unattended runs that must rely on a stored token.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialSource for NoCredentials {
    fn login_credentials(&self) -> Option<LoginCredentials> {
        None
    }
}

impl CredentialSource for LoginCredentials {
    fn login_credentials(&self) -> Option<LoginCredentials> {
        Some(self.clone())
    }
}

/// Input handed over by the mirroring process.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub mirror_root: PathBuf,
    /// Files written during the current sync pass, absolute or relative to the root
    pub changed_files: Vec<PathBuf>,
    pub force: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct UploadOptions {
    /// Trigger server-side processing after the files are attached
    pub process: bool,
    /// Record successfully attached files in the upload history
    pub record_history: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            process: true,
            record_history: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Empty change set and no force flag; nothing was contacted
    NothingChanged,
    /// Authentication could not be established
    AuthenticationFailed,
    /// The selector found no eligible files
    NothingSelected,
    /// The import could not be created; every selected file counts as failed
    ImportFailed,
    Uploaded { processing_triggered: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub status: RunStatus,
    pub successful: usize,
    pub failed: usize,
    pub import_id: Option<String>,
}

impl RunReport {
    fn empty(status: RunStatus) -> Self {
        Self {
            status,
            successful: 0,
            failed: 0,
            import_id: None,
        }
    }

    pub fn counts(&self) -> (usize, usize) {
        (self.successful, self.failed)
    }

    /// Whether the run should be reported as failed to the scheduler.
    pub fn has_failures(&self) -> bool {
        matches!(
            self.status,
            RunStatus::AuthenticationFailed | RunStatus::ImportFailed
        ) || self.failed > 0
    }
}

/// Drives the client, selector and history through one run.
pub struct Uploader {
    client: SleepHqClient,
    history: Option<UploadHistory>,
    options: UploadOptions,
}

impl Uploader {
    pub fn new(
        client: SleepHqClient,
        history: Option<UploadHistory>,
        options: UploadOptions,
    ) -> Self {
        Self {
            client,
            history,
            options,
        }
    }

    pub fn client(&self) -> &SleepHqClient {
        &self.client
    }

    pub fn history(&self) -> Option<&UploadHistory> {
        self.history.as_ref()
    }

    /// Reuse a valid stored credential, otherwise log in with `credentials`.
    pub async fn ensure_authenticated(&mut self, credentials: &dyn CredentialSource) -> bool {
        if self.client.is_authenticated() {
            debug!("Reusing stored SleepHQ credential");
            return true;
        }

        let Some(login) = credentials.login_credentials() else {
            error!("SleepHQ authentication required but no credentials are available");
            return false;
        };

        match self.client.authenticate(&login.username, &login.password).await {
            Ok(_) => true,
            Err(err) => {
                error!("Failed to authenticate with SleepHQ: {}", err);
                false
            }
        }
    }

    pub async fn run(
        &mut self,
        request: &SyncRequest,
        credentials: &dyn CredentialSource,
    ) -> RunReport {
        if request.changed_files.is_empty() && !request.force {
            info!("No files downloaded in this sync, skipping SleepHQ upload");
            return RunReport::empty(RunStatus::NothingChanged);
        }

        if !self.ensure_authenticated(credentials).await {
            return RunReport::empty(RunStatus::AuthenticationFailed);
        }

        let selector = FileSelector::new(&request.mirror_root);
        let files = selector.select(&request.changed_files, request.force);
        let mirror_root = selector.mirror_root();
        if files.is_empty() {
            info!("No data files found in {} to upload", mirror_root.display());
            return RunReport::empty(RunStatus::NothingSelected);
        }

        info!(
            "Found {} file(s) in {} to upload to SleepHQ",
            files.len(),
            mirror_root.display()
        );

        let summary = self
            .client
            .upload_files(&files, Some(mirror_root), self.options.process)
            .await;

        if self.options.record_history {
            self.record_uploaded(&summary.uploaded);
        }

        let status = match &summary.import_id {
            Some(_) => RunStatus::Uploaded {
                processing_triggered: summary.processing_triggered,
            },
            None => RunStatus::ImportFailed,
        };

        info!(
            "SleepHQ upload complete: {} successful, {} failed",
            summary.successful, summary.failed
        );

        RunReport {
            status,
            successful: summary.successful,
            failed: summary.failed,
            import_id: summary.import_id,
        }
    }

    fn record_uploaded(&mut self, uploaded: &[PathBuf]) {
        let Some(history) = self.history.as_mut() else {
            return;
        };
        for path in uploaded {
            if let Err(err) = history.mark_uploaded(path) {
                warn!("Could not record {} in upload history: {}", path.display(), err);
            }
        }
    }
}
