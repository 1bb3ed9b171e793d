//! Centralized file-based logging system
//!
//! Writes logs to files in logs/ directory, separated by log type:
//! - logs/main - All logs, JSON
//! - logs/error - Error and warning logs only
//! - logs/ws - Stream connection logs
//! - logs/rest - REST data source logs

use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_TYPES: [&str; 4] = ["main", "error", "ws", "rest"];

/// Initialize centralized file logging
///
/// Creates logs/ directory and sets up file appenders for different log types.
/// Returns WorkerGuards which must be kept alive for the duration of the program.
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_logging() -> io::Result<Vec<WorkerGuard>> {
    init_logging_in(Path::new("logs"))
}

/// Same as [`init_logging`] with an explicit log directory
pub fn init_logging_in(logs_dir: &Path) -> io::Result<Vec<WorkerGuard>> {
    create_log_dirs(logs_dir)?;

    let mut guards = Vec::new();

    let (main_appender, main_guard) = create_appender(&logs_dir.join("main"), "main");
    guards.push(main_guard);

    let (error_appender, error_guard) = create_appender(&logs_dir.join("error"), "error");
    guards.push(error_guard);

    let (ws_appender, ws_guard) = create_appender(&logs_dir.join("ws"), "ws");
    guards.push(ws_guard);

    let (rest_appender, rest_guard) = create_appender(&logs_dir.join("rest"), "rest");
    guards.push(rest_guard);

    let main_layer = tracing_subscriber::fmt::layer()
        .with_writer(main_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json();

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::LevelFilter::WARN);

    let ws_layer = tracing_subscriber::fmt::layer()
        .with_writer(ws_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            is_ws_target(metadata.target())
        }));

    let rest_layer = tracing_subscriber::fmt::layer()
        .with_writer(rest_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            is_rest_target(metadata.target())
        }));

    // Console layer for development
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(main_layer)
        .with(error_layer)
        .with(ws_layer)
        .with(rest_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    tracing::info!("Logging system initialized. Log files in {}", logs_dir.display());

    Ok(guards)
}

fn create_log_dirs(logs_dir: &Path) -> io::Result<()> {
    for log_type in LOG_TYPES {
        fs::create_dir_all(logs_dir.join(log_type))?;
    }
    Ok(())
}

fn is_ws_target(target: &str) -> bool {
    target == "ws" || target.contains("::ws") || target.contains("hot_path")
}

fn is_rest_target(target: &str) -> bool {
    target == "rest" || target.contains("::rest")
}

/// Create a rolling file appender
fn create_appender(dir: &Path, name: &str) -> (NonBlocking, WorkerGuard) {
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, name);

    tracing_appender::non_blocking(appender)
}

/// Log macro helpers for specific log types
#[macro_export]
macro_rules! log_ws {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "ws", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_rest {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "rest", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_main {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "main", $level, $($arg)+)
    };
}
