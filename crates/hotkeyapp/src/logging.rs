//! Console + rolling file logging.
//!
//! Each output has its own level. `RUST_LOG`, when set, replaces both.

use crate::settings::{LogSettings, APP_DIR};
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub const LOG_FILE: &str = "hotkeyapp.log";

/// Keep alive for the whole program; dropping it flushes the file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Parses a level name. Unknown names fall back to `default` with a note on
/// stderr, since the subscriber does not exist yet.
pub fn parse_level(raw: &str, default: LevelFilter, setting: &str) -> LevelFilter {
    match LevelFilter::from_str(raw.trim()) {
        Ok(level) => level,
        Err(_) => {
            eprintln!(
                "[hotkeyapp] invalid level {:?} for {}, using {}",
                raw, setting, default
            );
            default
        }
    }
}

fn filter_for(level: LevelFilter) -> EnvFilter {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives)
            .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into())),
        _ => EnvFilter::default().add_directive(level.into()),
    }
}

pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join("logs")
}

pub fn init(settings: &LogSettings) -> Result<LoggingGuard> {
    let console_level = parse_level(&settings.console_level, LevelFilter::INFO, "console_level");
    let file_level = parse_level(&settings.file_level, LevelFilter::DEBUG, "file_level");

    let log_dir = settings.file_dir.clone().unwrap_or_else(default_log_dir);
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log dir {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE);
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(filter_for(console_level));

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_filter(filter_for(file_level));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    tracing::info!("Logging to {}", log_dir.join(LOG_FILE).display());

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
