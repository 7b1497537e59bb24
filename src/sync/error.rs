use crate::error::{errors, SyncOperation, UploaderError, UploaderResult};
use reqwest::Error as ReqwestError;
use serde_json::Error as SerdeError;
use std::io;
use std::path::Path;
use url::ParseError;

pub type SyncResult<T> = UploaderResult<T>;

/// Helper namespace that converts low-level failures into `UploaderError` instances.
pub struct SyncError;

impl SyncError {
    pub fn history_save(reason: impl Into<String>) -> UploaderError {
        errors::sync_error(SyncOperation::HistorySave, reason)
    }

    pub fn file_selection(reason: impl Into<String>) -> UploaderError {
        errors::sync_error(SyncOperation::FileSelection, reason)
    }

    pub fn config(reason: impl Into<String>) -> UploaderError {
        errors::config_error(reason)
    }

    pub fn io(err: io::Error, path: &Path) -> UploaderError {
        UploaderError::Filesystem {
            message: err.to_string(),
            path: path.display().to_string(),
            source: Some(Box::new(err)),
        }
    }

    pub fn json(operation: SyncOperation, err: SerdeError) -> UploaderError {
        errors::sync_error_with_source(operation, format!("JSON error: {err}"), err)
    }

    /// Transport failure. Timeouts land here too.
    pub fn http(err: ReqwestError) -> UploaderError {
        let url = err.url().map(|u| u.to_string());
        let message = if err.is_timeout() {
            format!("Request timed out: {err}")
        } else {
            format!("Request to SleepHQ failed: {err}")
        };
        UploaderError::Network {
            message,
            url,
            source: Some(Box::new(err)),
        }
    }

    pub fn url(err: ParseError) -> UploaderError {
        UploaderError::Validation {
            message: format!("Invalid SleepHQ URL: {err}"),
            field: Some("base_url".to_string()),
            value: None,
        }
    }

    pub fn status(operation: SyncOperation, status: u16, body: &str) -> UploaderError {
        errors::protocol_error(
            operation,
            Some(status),
            format!("HTTP {status}: {}", body.trim()),
        )
    }

    pub fn unexpected_shape(operation: SyncOperation, reason: impl Into<String>) -> UploaderError {
        errors::protocol_error(operation, None, reason)
    }

    pub fn unauthorized(operation: SyncOperation) -> UploaderError {
        UploaderError::Unauthorized { operation }
    }

    pub fn authentication_required() -> UploaderError {
        errors::auth_error("SleepHQ authentication required")
    }

    pub fn file_not_found(path: &Path) -> UploaderError {
        errors::filesystem_error("File does not exist", path.display().to_string())
    }
}
