//! Tracing setup for the `dynprice` binaries.
//!
//! Console output goes to stderr so a CLI's stdout carries only its result. Each launch
//! also appends to its own `logs/dynprice_<timestamp>.log` under the project root; only
//! the newest [`MAX_LOG_FILES`] are kept.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;
use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

use crate::project_dirs::{self, ProjectDirError};

pub const MAX_LOG_FILES: usize = 10;
const LOG_FILE_PREFIX: &str = "dynprice_";
const LOG_FILE_EXTENSION: &str = "log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error(transparent)]
    Dirs(#[from] ProjectDirError),
    #[error("Failed to format log file timestamp: {0}")]
    FormatTime(#[from] time::error::Format),
    #[error("Failed to open log file in {dir}: {source}")]
    Appender { dir: PathBuf, source: InitError },
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install the global subscriber. Later calls are no-ops; errors are returned so the
/// binaries can carry on without file logging.
pub fn init() -> Result<(), LoggingError> {
    if LOG_GUARD.get().is_some() {
        return Ok(());
    }

    let log_dir = project_dirs::logs_dir()?;
    let stem = log_file_stem(now_local_or_utc())?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(&stem)
        .filename_suffix(LOG_FILE_EXTENSION)
        .build(&log_dir)
        .map_err(|source| LoggingError::Appender {
            dir: log_dir.clone(),
            source,
        })?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let timer = build_timer();
    let console_layer = fmt::layer()
        .with_timer(timer.clone())
        .with_writer(io::stderr);
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_timer(timer)
        .with_writer(file_writer);
    let subscriber = Registry::default()
        .with(env_filter())
        .with(console_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = LOG_GUARD.set(guard);

    tracing::info!(
        "Logging to {}",
        log_dir.join(format!("{stem}.{LOG_FILE_EXTENSION}")).display()
    );
    match prune_old_logs(&log_dir, MAX_LOG_FILES) {
        Ok(0) => {}
        Ok(removed) => tracing::debug!(removed, "Pruned old log files"),
        Err(err) => tracing::warn!("Failed to prune {}: {err}", log_dir.display()),
    }
    Ok(())
}

/// Delete all but the newest `keep` log files. Timestamped names sort chronologically,
/// and files not written by this crate are left alone.
fn prune_old_logs(dir: &Path, keep: usize) -> io::Result<usize> {
    let mut logs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_ours = name.starts_with(LOG_FILE_PREFIX)
            && Path::new(&name).extension().is_some_and(|ext| ext == LOG_FILE_EXTENSION);
        if is_ours && entry.file_type()?.is_file() {
            logs.push(name);
        }
    }
    if logs.len() <= keep {
        return Ok(0);
    }
    logs.sort_unstable();
    let stale = logs.len() - keep;
    for name in &logs[..stale] {
        fs::remove_file(dir.join(name))?;
    }
    Ok(stale)
}

fn log_file_stem(now: OffsetDateTime) -> Result<String, time::error::Format> {
    const NAME_FORMAT: &[FormatItem<'_>] =
        format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    Ok(format!("{LOG_FILE_PREFIX}{}", now.format(NAME_FORMAT)?))
}

fn build_timer() -> fmt::time::OffsetTime<time::format_description::BorrowedFormatItem<'static>> {
    const DISPLAY_FORMAT: &[FormatItem<'static>] =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    fmt::time::OffsetTime::new(offset, DISPLAY_FORMAT.into())
}

fn now_local_or_utc() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
