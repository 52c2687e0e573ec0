//! Structured logging for touch-grass using tracing.
//!
//! Logs to `<cache dir>/touch-grass.{date}.log` with daily rotation (7 files
//! kept) and mirrors everything to stderr. Level comes from `RUST_LOG`;
//! `TOUCH_GRASS_DEBUG_LOG=1` forces debug.
//!
//! Falls back to stderr-only logging if there is no cache directory or the
//! file appender cannot be created.

use fs_err as fs;
use std::env;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "touch_grass=info,grass_core=info";

/// Keep the returned guard alive until exit so buffered lines are flushed,
/// including the ones written by the shutdown routine.
pub fn init(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(false);

    match log_dir.map(create_file_appender) {
        Some(Ok(file_appender)) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(env_filter())
                .with(stderr_layer)
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_timer(fmt::time::UtcTime::rfc_3339())
                        .with_ansi(false),
                )
                .init();
            Some(guard)
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(stderr_layer)
                .init();
            None
        }
    }
}

fn env_filter() -> EnvFilter {
    let debug_enabled = env::var("TOUCH_GRASS_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

fn create_file_appender(
    log_dir: &Path,
) -> Result<RollingFileAppender, tracing_appender::rolling::InitError> {
    let _ = fs::create_dir_all(log_dir);
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("touch-grass")
        .filename_suffix("log")
        .max_log_files(7)
        .build(log_dir)
}
