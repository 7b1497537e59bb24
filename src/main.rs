use sleephq_sync::commands::Cli;
use sleephq_sync::config::Settings;
use sleephq_sync::error::UploaderError;
use sleephq_sync::sync::sync_command::handle_command;
use sleephq_sync::utils::config_paths::ConfigPaths;
use sleephq_sync::utils::logger::init_logger;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_command();

    let paths = match ConfigPaths::new() {
        Ok(paths) => paths,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::from(1);
        }
    };
    if let Err(err) = paths.ensure_dirs() {
        eprintln!("Failed to create {}: {}", paths.config_dir.display(), err);
    }

    let log_file = cli.log_file.clone().unwrap_or_else(|| paths.log_file.clone());
    if let Err(err) = init_logger(cli.log_level.as_deref(), Some(log_file)) {
        eprintln!("Failed to initialise logging: {}", err);
    }

    match main_impl(cli, paths).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::from(1)
        }
    }
}

async fn main_impl(cli: Cli, paths: ConfigPaths) -> Result<u8, String> {
    let settings_file = cli
        .config
        .clone()
        .unwrap_or_else(|| paths.settings_file.clone());
    let settings = Settings::load(&settings_file);

    let code = handle_command(cli.command, settings, paths)
        .await
        .map_err(|err| describe_failure(&err))?;
    Ok(u8::try_from(code).unwrap_or(1))
}

fn describe_failure(err: &UploaderError) -> String {
    let message = format!("[{}] {}", err.category().display_name(), err.user_message());
    if err.is_recoverable() {
        message
    } else {
        format!(
            "{}\n\nFix the settings and run again. Use 'sleephq-sync --help' for more information.",
            message
        )
    }
}
