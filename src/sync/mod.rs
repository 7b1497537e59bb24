pub mod credential_store;
pub mod error;
pub mod file_selector;
pub mod responses;
pub mod sleephq_client;
pub mod state_file;
pub mod sync_command;
pub mod upload_descriptor;
pub mod upload_history;
pub mod uploader;
