//! Command-line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "sleephq-sync",
    version,
    about = "Upload CPAP SD-card data to SleepHQ"
)]
pub struct Cli {
    /// Log level or filter directive (overrides RUST_LOG)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Settings file (default: ~/.config/sleephq-sync/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Upload the files touched by the last sync pass
    Upload(UploadArgs),

    /// Log in and store the bearer token
    Login {
        /// SleepHQ username / email
        #[arg(long)]
        username: Option<String>,
    },

    /// Forget the stored bearer token
    Logout,

    /// Show stored login and upload history state
    Status,

    /// Inspect or edit the upload history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct UploadArgs {
    /// Local mirror of the SD card (falls back to `mirror_root` in the settings)
    #[arg(long)]
    pub mirror_root: Option<PathBuf>,

    /// File changed in this sync pass (repeatable)
    #[arg(long = "changed", value_name = "PATH")]
    pub changed: Vec<PathBuf>,

    /// Read changed files from a newline-separated list
    #[arg(long, value_name = "FILE")]
    pub changed_from: Option<PathBuf>,

    /// Upload every date folder regardless of the change set
    #[arg(long)]
    pub force: bool,

    /// SleepHQ username / email for a fresh login
    #[arg(long)]
    pub username: Option<String>,

    /// Never prompt; fail if no stored token or password is available
    #[arg(long)]
    pub no_prompt: bool,

    /// Attach files but do not trigger processing
    #[arg(long)]
    pub no_process: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum HistoryAction {
    /// Number of recorded uploads
    Count,
    /// Remove every record
    Clear,
    /// Remove the record of one file
    Forget {
        path: PathBuf,
    },
}

impl Cli {
    pub fn parse_command() -> Self {
        Self::parse()
    }
}
