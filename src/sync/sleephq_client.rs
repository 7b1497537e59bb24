// SleepHQ API client - OAuth2 password grant plus the three-step import protocol
// (create import -> add files -> process files)

use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::credential_store::{CredentialRecord, CredentialStore};
use super::error::{SyncError, SyncResult};
use super::responses::{self, TokenResponse};
use super::upload_descriptor::PreparedFile;
use crate::config::{
    Settings, AUTH_TIMEOUT, OAUTH_SCOPE, OAUTH_TOKEN_PATH, TEAMS_PATH, UPLOAD_TIMEOUT,
};
use crate::error::{SyncOperation, UploaderError};
use crate::utils::unix_now;

/// OAuth client credentials and the service location.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub base_url: String,
}

impl ClientConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            base_url: crate::config::DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at another host (tests, staging).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn from_settings(settings: &Settings) -> SyncResult<Self> {
        settings.validate()?;
        Ok(Self::new(settings.client_id.clone(), settings.client_secret.clone())
            .with_base_url(settings.base_url.clone()))
    }
}

/// Outcome of one `upload_files` batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadSummary {
    pub import_id: Option<String>,
    pub successful: usize,
    pub failed: usize,
    /// Paths whose add-file call succeeded, in upload order
    pub uploaded: Vec<PathBuf>,
    pub processing_triggered: bool,
}

impl UploadSummary {
    pub fn counts(&self) -> (usize, usize) {
        (self.successful, self.failed)
    }
}

/// Client for the SleepHQ API
#[derive(Debug)]
pub struct SleepHqClient {
    config: ClientConfig,
    http_client: reqwest::Client,
    store: CredentialStore,
    credential: Option<CredentialRecord>,
}

impl SleepHqClient {
    /// Create a client, picking up any still-valid stored credential.
    pub fn new(config: ClientConfig, store: CredentialStore) -> Self {
        let credential = store.load();
        Self {
            config,
            http_client: reqwest::Client::new(),
            store,
            credential,
        }
    }

    pub fn credential(&self) -> Option<&CredentialRecord> {
        self.credential.as_ref()
    }

    pub fn credential_store(&self) -> &CredentialStore {
        &self.store
    }

    /// Evaluated against the clock on every call.
    pub fn is_authenticated(&self) -> bool {
        self.credential
            .as_ref()
            .map(CredentialRecord::is_usable)
            .unwrap_or(false)
    }

    /// Drop the held token in memory and on disk.
    pub fn invalidate(&mut self) {
        if let Some(credential) = self.credential.as_mut() {
            credential.access_token.clear();
        }
        self.store.invalidate();
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// OAuth2 password grant followed by team resolution.
    ///
    /// Only a fully resolved credential (token and team) is kept and persisted.
    pub async fn authenticate(
        &mut self,
        username: &str,
        password: &SecretString,
    ) -> SyncResult<CredentialRecord> {
        self.credential = None;
        debug!("Authenticating with SleepHQ API");

        let token = self
            .request_token(username, password)
            .await
            .map_err(|err| auth_failure("Authentication failed", err))?;
        let expires_at = unix_now() + token.lifetime_secs();
        info!("Successfully authenticated with SleepHQ API");

        let team_id = self
            .resolve_team_id(&token.access_token)
            .await
            .map_err(|err| auth_failure("Failed to retrieve team ID", err))?;
        debug!("Retrieved team ID: {}", team_id);

        let record = CredentialRecord::new(token.access_token, expires_at, team_id);
        self.store.save_or_log(&record);
        self.credential = Some(record.clone());
        Ok(record)
    }

    async fn request_token(
        &self,
        username: &str,
        password: &SecretString,
    ) -> SyncResult<TokenResponse> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret().as_str()),
            ("grant_type", "password"),
            ("username", username),
            ("password", password.expose_secret().as_str()),
            ("scope", OAUTH_SCOPE),
        ];

        let response = self
            .http_client
            .post(self.endpoint(OAUTH_TOKEN_PATH))
            .form(&params)
            .timeout(AUTH_TIMEOUT)
            .send()
            .await
            .map_err(SyncError::http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::status(
                SyncOperation::Authentication,
                status.as_u16(),
                &body,
            ));
        }

        let body = response.text().await.map_err(SyncError::http)?;
        serde_json::from_str(&body).map_err(|err| {
            SyncError::unexpected_shape(
                SyncOperation::Authentication,
                format!("invalid token response: {err}"),
            )
        })
    }

    async fn resolve_team_id(&mut self, access_token: &str) -> SyncResult<String> {
        let response = self
            .http_client
            .get(self.endpoint(TEAMS_PATH))
            .bearer_auth(access_token)
            .timeout(AUTH_TIMEOUT)
            .send()
            .await
            .map_err(SyncError::http)?;

        let response = self
            .ensure_success(response, SyncOperation::TeamResolution)
            .await?;
        let body = read_json(response, SyncOperation::TeamResolution).await?;
        debug!("Teams API response: {}", body);
        responses::first_team_id(&body)
    }

    /// Token and team of a currently usable credential.
    fn bearer(&self) -> SyncResult<(String, String)> {
        match &self.credential {
            Some(credential) if credential.is_usable() => {
                Ok((credential.access_token.clone(), credential.team_id.clone()))
            }
            _ => {
                error!("Not authenticated with SleepHQ API");
                Err(SyncError::authentication_required())
            }
        }
    }

    /// 401 invalidates the credential; other non-2xx become protocol errors.
    async fn ensure_success(
        &mut self,
        response: Response,
        operation: SyncOperation,
    ) -> SyncResult<Response> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            error!("Authentication token expired or invalid");
            self.invalidate();
            return Err(SyncError::unauthorized(operation));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::status(operation, status.as_u16(), &body));
        }
        Ok(response)
    }

    /// Create an empty import for the team.
    pub async fn create_import(&mut self) -> SyncResult<String> {
        let (token, team_id) = self.bearer()?;
        let url = self.endpoint(&format!("/api/v1/teams/{team_id}/imports"));

        let response = self
            .http_client
            .post(url)
            .bearer_auth(token)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await
            .map_err(SyncError::http)?;

        let response = self
            .ensure_success(response, SyncOperation::CreateImport)
            .await?;
        let body = read_json(response, SyncOperation::CreateImport).await?;
        debug!("Create import response: {}", body);

        let import_id = responses::import_id(&body)?;
        info!("Created new import with ID: {}", import_id);
        Ok(import_id)
    }

    /// Attach one file to an import.
    pub async fn add_file(
        &mut self,
        import_id: &str,
        file_path: &Path,
        mirror_root: Option<&Path>,
    ) -> SyncResult<()> {
        let (token, _) = self.bearer()?;
        let prepared = PreparedFile::read(file_path, mirror_root)?;
        let descriptor = prepared.descriptor;

        debug!(
            "Uploading {}: path={}, hash={}",
            descriptor.name, descriptor.path, descriptor.content_hash
        );

        let file_part = Part::bytes(prepared.content)
            .file_name(descriptor.name.clone())
            .mime_str("application/octet-stream")
            .map_err(SyncError::http)?;

        let form = Form::new()
            .part("file", file_part)
            .text("name", descriptor.name.clone())
            .text("path", descriptor.path)
            .text("content_hash", descriptor.content_hash);

        let response = self
            .http_client
            .post(self.endpoint(&format!("/api/v1/imports/{import_id}/files")))
            .bearer_auth(token)
            .multipart(form)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await
            .map_err(SyncError::http)?;

        self.ensure_success(response, SyncOperation::AddFile).await?;
        debug!("Added file {} to import {}", descriptor.name, import_id);
        Ok(())
    }

    /// Ask the service to process everything attached to the import.
    pub async fn process_import(&mut self, import_id: &str) -> SyncResult<()> {
        let (token, _) = self.bearer()?;

        let response = self
            .http_client
            .post(self.endpoint(&format!("/api/v1/imports/{import_id}/process_files")))
            .bearer_auth(token)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await
            .map_err(SyncError::http)?;

        self.ensure_success(response, SyncOperation::ProcessImport).await?;
        info!("Successfully triggered processing for import ID: {}", import_id);
        Ok(())
    }

    /// Upload a batch of files as a single import.
    ///
    /// 1. create the import (on failure every file counts as failed)
    /// 2. attach each file independently
    /// 3. trigger processing if `process` is set and anything was attached
    ///
    /// The returned counts reflect step 2 only.
    pub async fn upload_files(
        &mut self,
        file_paths: &[PathBuf],
        mirror_root: Option<&Path>,
        process: bool,
    ) -> UploadSummary {
        let mut summary = UploadSummary::default();
        if file_paths.is_empty() {
            warn!("No files to upload");
            return summary;
        }

        let import_id = match self.create_import().await {
            Ok(import_id) => import_id,
            Err(err) => {
                error!("Failed to create import, aborting upload: {}", err);
                summary.failed = file_paths.len();
                return summary;
            }
        };

        for (index, file_path) in file_paths.iter().enumerate() {
            match self.add_file(&import_id, file_path, mirror_root).await {
                Ok(()) => {
                    summary.successful += 1;
                    summary.uploaded.push(file_path.clone());
                    info!("Added file to import: {}", display_name(file_path));
                }
                Err(err) if err.is_unauthorized() => {
                    // the token is gone; the rest cannot be attached this run
                    let remaining = file_paths.len() - index;
                    summary.failed += remaining;
                    error!(
                        "Token rejected while adding {}, {} file(s) not uploaded",
                        display_name(file_path),
                        remaining
                    );
                    break;
                }
                Err(err) => {
                    summary.failed += 1;
                    error!("Failed to add file {}: {}", display_name(file_path), err);
                }
            }
        }

        info!(
            "Upload complete: {} successful, {} failed (import ID: {})",
            summary.successful, summary.failed, import_id
        );

        if process && summary.successful > 0 {
            match self.process_import(&import_id).await {
                Ok(()) => {
                    summary.processing_triggered = true;
                    info!(
                        "Processing triggered for import with {} file(s)",
                        summary.successful
                    );
                }
                Err(err) => error!("Failed to trigger processing: {}", err),
            }
        }

        summary.import_id = Some(import_id);
        summary
    }
}

async fn read_json(response: Response, operation: SyncOperation) -> SyncResult<Value> {
    let body = response.text().await.map_err(SyncError::http)?;
    serde_json::from_str(&body).map_err(|err| {
        SyncError::unexpected_shape(operation, format!("response is not valid JSON: {err}"))
    })
}

fn auth_failure(context: &str, err: UploaderError) -> UploaderError {
    error!("{}: {}", context, err);
    UploaderError::Auth {
        message: format!("{context}: {err}"),
        source: Some(Box::new(err)),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
