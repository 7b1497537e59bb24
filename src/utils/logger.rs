//! Logging setup
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! binary's job.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialise the logging system.
///
/// # Arguments
/// * `log_level` - level or filter directive (trace, debug, info, warn, error).
///   Falls back to `RUST_LOG`, then to `info,sleephq_sync=debug`.
/// * `log_file` - optional file that receives an uncoloured copy of every event;
///   its parent directories are created on demand
///
/// # Examples
/// ```no_run
/// use sleephq_sync::utils::config_paths::ConfigPaths;
/// use sleephq_sync::utils::logger::init_logger;
///
/// let paths = ConfigPaths::new().unwrap();
/// init_logger(Some("sleephq_sync=trace"), Some(paths.log_file)).unwrap();
/// ```
pub fn init_logger(log_level: Option<&str>, log_file: Option<PathBuf>) -> Result<()> {
    let env_filter = if let Some(level) = log_level {
        EnvFilter::try_new(level)?
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,sleephq_sync=debug"))
    };

    // stderr keeps stdout free for the command's own report
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_ansi(true)
        .compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if let Some(log_path) = log_file {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(std::sync::Arc::new(file))
            .with_target(true)
            .with_ansi(false)
            .with_level(true);

        registry.with(file_layer).try_init()?;
    } else {
        registry.try_init()?;
    }

    tracing::debug!("Logger initialized");
    Ok(())
}
