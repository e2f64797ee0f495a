use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging options, usually taken from [`HubConfig`](crate::models::HubConfig).
#[derive(Debug, Clone)]
pub struct LogOptions<'a> {
    /// Directory for log files (e.g., "logs")
    pub log_dir: &'a str,
    /// Prefix for log files (e.g., "statushub")
    pub log_prefix: &'a str,
    /// Debug level instead of info
    pub debug_mode: bool,
    /// Also log to stderr
    pub console_output: bool,
    /// Write the file log as JSON lines
    pub json: bool,
}

/// Setup logging with a daily rotating file appender.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging(log_dir: &str, log_prefix: &str, debug_mode: bool) -> Result<WorkerGuard> {
    setup_logging_with(&LogOptions {
        log_dir,
        log_prefix,
        debug_mode,
        console_output: false,
        json: false,
    })
}

/// Setup logging with the file appender plus optional console output.
///
/// The console layer writes to stderr; stdout belongs to the observer
/// protocol. `RUST_LOG` overrides the level chosen by `debug_mode`.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging_with(options: &LogOptions<'_>) -> Result<WorkerGuard> {
    let log_path = Utf8PathBuf::from(options.log_dir);
    if !log_path.exists() {
        fs::create_dir_all(&log_path)
            .with_context(|| format!("Failed to create log directory: {}", options.log_dir))?;
    }

    let file_appender = rolling::daily(options.log_dir, options.log_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if options.debug_mode { "debug" } else { "info" })
    });

    let text_layer = (!options.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking.clone())
            .with_ansi(false) // No ANSI codes in log files
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });
    let json_layer = options.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });
    let console_layer = options.console_output.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .with(console_layer)
        .try_init()
        .context("Logging already initialized")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}, json={}",
        options.log_dir,
        options.log_prefix,
        options.debug_mode,
        options.console_output,
        options.json
    );

    Ok(guard)
}
