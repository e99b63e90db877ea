//! Tracing setup for the `gvm` binary
//!
//! Library code logs through `tracing` macros. The binary writes those events
//! to `<home>/gvm.log`, filtered by `GVM_LOG` (default `info`). With
//! `--verbose` they are mirrored to stderr as well; command output itself is
//! printed separately.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::config::LOG_ENV;

const DEFAULT_FILTER: &str = "info";

/// Filter from `GVM_LOG`, falling back to `default` when unset or invalid
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Installs the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be kept alive
/// until the process exits. `None` means the log file could not be opened and
/// only the stderr layer (if requested) is active.
pub fn init(log_file: &Path, verbose: bool) -> Option<WorkerGuard> {
    let stderr_layer = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(env_filter("debug"))
    });

    let file_writer = log_file
        .parent()
        .filter(|dir| std::fs::create_dir_all(dir).is_ok())
        .and_then(|dir| Some((dir, log_file.file_name()?)))
        .map(|(dir, name)| tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name)));

    let (file_layer, guard) = match file_writer {
        Some((writer, guard)) => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
                    .with_filter(env_filter(DEFAULT_FILTER)),
            ),
            Some(guard),
        ),
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init();

    guard
}
