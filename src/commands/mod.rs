//! CLI surface

pub mod parser;

pub use parser::{Cli, Commands, HistoryAction, UploadArgs};
