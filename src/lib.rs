//! SleepHQ Sync Library
//!
//! Uploads the CPAP data mirrored from a wireless SD card to the SleepHQ
//! cloud service: OAuth password login, file selection, import creation and
//! per-file multipart upload.

pub mod commands;
pub mod config;
pub mod error;
pub mod sync;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::Settings;
pub use error::{UploaderError, UploaderResult};
pub use sync::credential_store::{CredentialRecord, CredentialStore};
pub use sync::file_selector::FileSelector;
pub use sync::sleephq_client::{ClientConfig, SleepHqClient, UploadSummary};
pub use sync::upload_history::UploadHistory;
pub use sync::uploader::{
    CredentialSource, LoginCredentials, NoCredentials, RunReport, RunStatus, SyncRequest,
    UploadOptions, Uploader,
};
