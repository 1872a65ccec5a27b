// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing subscriber setup.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

use crate::lifecycle::{Config, LifecycleError};

/// Daemon log file name inside the log directory
pub const LOG_FILE: &str = "flowd.log";

/// Install the global subscriber.
///
/// Writes to `<log_dir>/flowd.log` through a non-blocking writer when a log
/// directory is configured, to stderr otherwise. Keep the returned guard
/// alive until exit or buffered lines are lost. Calling this again once a
/// subscriber is installed leaves the first one in place.
pub fn init(config: &Config) -> Result<Option<WorkerGuard>, LifecycleError> {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|e| {
        eprintln!("invalid log filter {:?}: {e}", config.log_filter);
        EnvFilter::new("info")
    });

    match &config.log_dir {
        Some(dir) => {
            let appender = file_appender(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            Ok(Some(guard))
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
            Ok(None)
        }
    }
}

fn file_appender(dir: &Path) -> Result<RollingFileAppender, LifecycleError> {
    std::fs::create_dir_all(dir)?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE)
        .build(dir)
        .map_err(|e| LifecycleError::Logging(e.to_string()))
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
