//! Unified error handling for sleephq-sync
//!
//! Every failure the uploader can hit is classified here so that call sites
//! can decide whether to log-and-continue, force re-authentication, or stop.

use std::fmt;
use std::io;
use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for the uploader
#[derive(Error, Debug)]
pub enum UploaderError {
    /// Configuration errors (missing client credentials, bad base URL, ...)
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        source: Option<BoxedSource>,
    },

    /// Authentication could not be established
    #[error("Authentication error: {message}")]
    Auth {
        message: String,
        source: Option<BoxedSource>,
    },

    /// The service answered 401 to a bearer-authenticated call
    #[error("Unauthorized during {operation}: bearer token rejected")]
    Unauthorized { operation: SyncOperation },

    /// Transport errors: connection refused, DNS, timeouts
    #[error("Network error: {message}")]
    Network {
        message: String,
        url: Option<String>,
        source: Option<BoxedSource>,
    },

    /// Non-2xx answers and response bodies of an unexpected shape
    #[error("Protocol error ({operation}): {message}")]
    Protocol {
        message: String,
        operation: SyncOperation,
        status: Option<u16>,
    },

    /// Filesystem errors
    #[error("Filesystem error: {message} (path: {path})")]
    Filesystem {
        message: String,
        path: String,
        source: Option<BoxedSource>,
    },

    /// State-file and orchestration errors
    #[error("Sync error ({operation}): {message}")]
    Sync {
        message: String,
        operation: SyncOperation,
        source: Option<BoxedSource>,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        value: Option<String>,
    },
}

/// Step of the upload pipeline an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
    CredentialLoad,
    CredentialSave,
    Authentication,
    TeamResolution,
    CreateImport,
    AddFile,
    ProcessImport,
    HistoryLoad,
    HistorySave,
    FileSelection,
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::CredentialLoad => "credential_load",
            SyncOperation::CredentialSave => "credential_save",
            SyncOperation::Authentication => "authentication",
            SyncOperation::TeamResolution => "team_resolution",
            SyncOperation::CreateImport => "create_import",
            SyncOperation::AddFile => "add_file",
            SyncOperation::ProcessImport => "process_import",
            SyncOperation::HistoryLoad => "history_load",
            SyncOperation::HistorySave => "history_save",
            SyncOperation::FileSelection => "file_selection",
        }
    }
}

/// Error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Auth,
    Network,
    Protocol,
    Filesystem,
    Sync,
    Validation,
}

impl ErrorCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            ErrorCategory::Config => "Configuration",
            ErrorCategory::Auth => "Authentication",
            ErrorCategory::Network => "Network",
            ErrorCategory::Protocol => "Protocol",
            ErrorCategory::Filesystem => "Filesystem",
            ErrorCategory::Sync => "Synchronization",
            ErrorCategory::Validation => "Validation",
        }
    }
}

impl UploaderError {
    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            UploaderError::Config { .. } => ErrorCategory::Config,
            UploaderError::Auth { .. } | UploaderError::Unauthorized { .. } => ErrorCategory::Auth,
            UploaderError::Network { .. } => ErrorCategory::Network,
            UploaderError::Protocol { .. } => ErrorCategory::Protocol,
            UploaderError::Filesystem { .. } => ErrorCategory::Filesystem,
            UploaderError::Sync { .. } => ErrorCategory::Sync,
            UploaderError::Validation { .. } => ErrorCategory::Validation,
        }
    }

    /// Whether the next scheduled run can be expected to get past this error
    /// without the user touching configuration.
    pub fn is_recoverable(&self) -> bool {
        match self {
            UploaderError::Config { .. } => false,
            UploaderError::Auth { .. } => true,
            UploaderError::Unauthorized { .. } => true,
            UploaderError::Network { .. } => true,
            UploaderError::Protocol { .. } => true,
            UploaderError::Filesystem { .. } => false,
            UploaderError::Sync { .. } => true,
            UploaderError::Validation { .. } => false,
        }
    }

    /// True for a 401 from the service.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, UploaderError::Unauthorized { .. })
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            UploaderError::Config { message, .. } => {
                format!("Configuration problem: {}", message)
            }
            UploaderError::Auth { message, .. } => {
                format!("Authentication with SleepHQ failed: {}", message)
            }
            UploaderError::Unauthorized { .. } => {
                "SleepHQ rejected the stored login; you will be asked to sign in again".to_string()
            }
            UploaderError::Network { message, .. } => format!("Network issue: {}", message),
            UploaderError::Protocol {
                message, operation, ..
            } => match operation {
                SyncOperation::TeamResolution => {
                    format!("Could not determine your SleepHQ team: {}", message)
                }
                SyncOperation::CreateImport => format!("Could not start an import: {}", message),
                SyncOperation::AddFile => format!("File upload rejected: {}", message),
                SyncOperation::ProcessImport => {
                    format!("Could not start import processing: {}", message)
                }
                _ => format!("Unexpected response from SleepHQ: {}", message),
            },
            UploaderError::Filesystem { message, .. } => {
                format!("File system problem: {}", message)
            }
            UploaderError::Sync {
                message, operation, ..
            } => match operation {
                SyncOperation::CredentialLoad | SyncOperation::CredentialSave => {
                    format!("Stored login problem: {}", message)
                }
                SyncOperation::HistoryLoad | SyncOperation::HistorySave => {
                    format!("Upload history problem: {}", message)
                }
                SyncOperation::FileSelection => format!("Could not scan the SD card: {}", message),
                _ => format!("Sync problem: {}", message),
            },
            UploaderError::Validation { message, .. } => {
                format!("Input validation failed: {}", message)
            }
        }
    }
}

impl From<io::Error> for UploaderError {
    fn from(err: io::Error) -> Self {
        UploaderError::Filesystem {
            message: format!("I/O error: {err}"),
            path: "<io>".to_string(),
            source: Some(Box::new(err)),
        }
    }
}

/// Result type alias for convenience
pub type UploaderResult<T> = Result<T, UploaderError>;

/// Convenience functions for creating common errors
pub mod errors {
    use super::*;

    pub fn config_error(message: impl Into<String>) -> UploaderError {
        UploaderError::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn auth_error(message: impl Into<String>) -> UploaderError {
        UploaderError::Auth {
            message: message.into(),
            source: None,
        }
    }

    pub fn protocol_error(
        operation: SyncOperation,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> UploaderError {
        UploaderError::Protocol {
            message: message.into(),
            operation,
            status,
        }
    }

    pub fn sync_error(operation: SyncOperation, message: impl Into<String>) -> UploaderError {
        UploaderError::Sync {
            message: message.into(),
            operation,
            source: None,
        }
    }

    pub fn sync_error_with_source(
        operation: SyncOperation,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> UploaderError {
        UploaderError::Sync {
            message: message.into(),
            operation,
            source: Some(Box::new(source)),
        }
    }

    pub fn filesystem_error(message: impl Into<String>, path: impl Into<String>) -> UploaderError {
        UploaderError::Filesystem {
            message: message.into(),
            path: path.into(),
            source: None,
        }
    }
}
