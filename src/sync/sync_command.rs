use console::Term;
use dialoguer::{Input, Password};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::credential_store::CredentialStore;
use super::error::{SyncError, SyncResult};
use super::sleephq_client::{ClientConfig, SleepHqClient};
use super::upload_history::UploadHistory;
use super::uploader::{
    CredentialSource, LoginCredentials, RunStatus, SyncRequest, UploadOptions, Uploader,
};
use crate::commands::{Commands, HistoryAction, UploadArgs};
use crate::config::{Settings, PASSWORD_ENV};
use crate::utils::config_paths::ConfigPaths;

/// Route a parsed subcommand to its handler.
pub async fn handle_command(
    command: Commands,
    settings: Settings,
    paths: ConfigPaths,
) -> SyncResult<i32> {
    let cmd = SyncCommand::new(settings, paths);

    match command {
        Commands::Upload(args) => cmd.execute_upload(args).await,
        Commands::Login { username } => cmd.execute_login(username).await,
        Commands::Logout => cmd.execute_logout(),
        Commands::Status => cmd.execute_status(),
        Commands::History { action } => cmd.execute_history(action),
    }
}

/// Asks for whatever is missing: username from flag, settings or prompt;
/// password from `SLEEPHQ_PASSWORD` or prompt.
#[derive(Debug, Clone)]
pub struct PromptCredentials {
    username: Option<String>,
    allow_prompt: bool,
}

impl PromptCredentials {
    pub fn new(username: Option<String>, allow_prompt: bool) -> Self {
        Self {
            username,
            allow_prompt,
        }
    }
}

impl CredentialSource for PromptCredentials {
    fn login_credentials(&self) -> Option<LoginCredentials> {
        let password_from_env = std::env::var(PASSWORD_ENV).ok().filter(|v| !v.is_empty());
        if !self.allow_prompt && (self.username.is_none() || password_from_env.is_none()) {
            warn!("SleepHQ login needed but prompting is disabled");
            return None;
        }

        if self.allow_prompt {
            announce_login(&mut Term::stderr());
        }

        let username = match &self.username {
            Some(username) => username.clone(),
            None => match Input::<String>::new()
                .with_prompt("SleepHQ username/email")
                .interact_text()
            {
                Ok(value) => value.trim().to_string(),
                Err(err) => {
                    warn!("Could not read username: {}", err);
                    return None;
                }
            },
        };

        let password = match password_from_env {
            Some(password) => password,
            None => match Password::new().with_prompt("SleepHQ password").interact() {
                Ok(value) => value,
                Err(err) => {
                    warn!("Could not read password: {}", err);
                    return None;
                }
            },
        };

        Some(LoginCredentials::new(username, password))
    }
}

fn announce_login(out: &mut impl Write) {
    if let Err(err) = writeln!(out, "\nSleepHQ authentication required") {
        debug!("Could not write login banner: {}", err);
    }
}

/// Read a newline-separated list of paths, skipping blanks.
pub fn read_changed_list(path: &Path) -> SyncResult<Vec<PathBuf>> {
    let content = fs::read_to_string(path).map_err(|err| SyncError::io(err, path))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

pub struct SyncCommand {
    settings: Settings,
    paths: ConfigPaths,
}

impl SyncCommand {
    pub fn new(settings: Settings, paths: ConfigPaths) -> Self {
        Self { settings, paths }
    }

    fn credential_store(&self) -> CredentialStore {
        CredentialStore::new(self.settings.token_path(&self.paths))
    }

    fn history(&self) -> UploadHistory {
        UploadHistory::open(self.settings.history_path(&self.paths))
    }

    fn client(&self) -> SyncResult<SleepHqClient> {
        let config = ClientConfig::from_settings(&self.settings)?;
        Ok(SleepHqClient::new(config, self.credential_store()))
    }

    fn username(&self, flag: Option<String>) -> Option<String> {
        flag.or_else(|| self.settings.username.clone())
    }

    pub async fn execute_upload(&self, args: UploadArgs) -> SyncResult<i32> {
        let term = Term::stdout();

        let mirror_root = args
            .mirror_root
            .clone()
            .or_else(|| self.settings.mirror_root_path())
            .ok_or_else(|| {
                SyncError::config(
                    "no mirror root given (use --mirror-root or `mirror_root` in settings)",
                )
            })?;
        if !mirror_root.is_dir() {
            return Err(SyncError::file_selection(format!(
                "mirror root {} is not a directory",
                mirror_root.display()
            )));
        }

        let mut changed_files = args.changed.clone();
        if let Some(list) = &args.changed_from {
            changed_files.extend(read_changed_list(list)?);
        }
        debug!("{} changed file(s) reported", changed_files.len());

        let options = UploadOptions {
            process: self.settings.process_after_upload && !args.no_process,
            record_history: self.settings.record_history,
        };
        let history = options.record_history.then(|| self.history());
        let mut uploader = Uploader::new(self.client()?, history, options);

        let credentials = PromptCredentials::new(self.username(args.username), !args.no_prompt);
        let request = SyncRequest {
            mirror_root,
            changed_files,
            force: args.force,
        };
        let report = uploader.run(&request, &credentials).await;

        match &report.status {
            RunStatus::NothingChanged => {
                term.write_line("No new files in this sync; nothing to upload.")?;
            }
            RunStatus::NothingSelected => {
                term.write_line("No eligible files found on the SD card mirror.")?;
            }
            RunStatus::AuthenticationFailed => {
                term.write_line("SleepHQ authentication failed; nothing uploaded.")?;
            }
            RunStatus::ImportFailed => {
                term.write_line("Could not create a SleepHQ import; nothing uploaded.")?;
            }
            RunStatus::Uploaded {
                processing_triggered,
            } => {
                term.write_line("SleepHQ upload summary:")?;
                if let Some(import_id) = &report.import_id {
                    term.write_line(&format!("   Import: {}", import_id))?;
                }
                term.write_line(&format!("   Uploaded: {}", report.successful))?;
                term.write_line(&format!("   Failed: {}", report.failed))?;
                term.write_line(&format!(
                    "   Processing: {}",
                    if *processing_triggered {
                        "triggered"
                    } else {
                        "not triggered"
                    }
                ))?;
            }
        }

        Ok(if report.has_failures() { 1 } else { 0 })
    }

    pub async fn execute_login(&self, username: Option<String>) -> SyncResult<i32> {
        let term = Term::stdout();
        let mut client = self.client()?;

        let credentials = PromptCredentials::new(self.username(username), true);
        let Some(login) = credentials.login_credentials() else {
            term.write_line("No credentials entered.")?;
            return Ok(1);
        };

        match client.authenticate(&login.username, &login.password).await {
            Ok(record) => {
                term.write_line("Logged in to SleepHQ.")?;
                term.write_line(&format!("   Team: {}", record.team_id))?;
                if let Some(expiry) = record.expires_at_utc() {
                    term.write_line(&format!("   Token valid until: {}", expiry.to_rfc3339()))?;
                }
                Ok(0)
            }
            Err(err) => {
                term.write_line(&err.user_message())?;
                Ok(1)
            }
        }
    }

    pub fn execute_logout(&self) -> SyncResult<i32> {
        let store = self.credential_store();
        store.invalidate();
        Term::stdout().write_line("Stored SleepHQ login removed.")?;
        Ok(0)
    }

    pub fn execute_status(&self) -> SyncResult<i32> {
        let term = Term::stdout();
        let store = self.credential_store();

        term.write_line("SleepHQ status:")?;
        match store.load() {
            Some(record) => {
                term.write_line("   Login: valid")?;
                term.write_line(&format!("   Team: {}", record.team_id))?;
                if let Some(expiry) = record.expires_at_utc() {
                    term.write_line(&format!("   Expires: {}", expiry.to_rfc3339()))?;
                }
            }
            None => term.write_line("   Login: not authenticated")?,
        }
        term.write_line(&format!("   Token file: {}", store.path().display()))?;

        let history = self.history();
        term.write_line(&format!("   Recorded uploads: {}", history.count()))?;
        term.write_line(&format!("   History file: {}", history.path().display()))?;
        Ok(0)
    }

    pub fn execute_history(&self, action: HistoryAction) -> SyncResult<i32> {
        let term = Term::stdout();
        let mut history = self.history();

        match action {
            HistoryAction::Count => {
                term.write_line(&history.count().to_string())?;
            }
            HistoryAction::Clear => {
                history.clear()?;
                term.write_line("Upload history cleared.")?;
            }
            HistoryAction::Forget { path } => {
                if history.remove(&path)? {
                    term.write_line(&format!("Forgot {}", path.display()))?;
                } else {
                    term.write_line(&format!("{} was not recorded", path.display()))?;
                    return Ok(1);
                }
            }
        }
        Ok(0)
    }
}
