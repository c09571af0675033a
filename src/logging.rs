//! Tracing subscriber setup.
//!
//! Diagnostics always go to stderr; stdout belongs to the host bridge's JSON
//! protocol. An optional daily-rolling file sink mirrors the same events.

use crate::config::LoggingConfig;
use crate::error::{PracticeError, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const LOG_FILE_PREFIX: &str = "lingualive.log";

/// Build the filter: `RUST_LOG` wins, then the configured level, then `info`.
#[must_use]
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Returns the file writer guard when file logging is enabled; keep it alive
/// for the lifetime of the process or buffered lines are lost.
///
/// # Errors
///
/// Returns `Config` if a global subscriber is already installed.
pub fn init(config: &LoggingConfig, logs_dir: &Path) -> Result<Option<WorkerGuard>> {
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = if config.file {
        std::fs::create_dir_all(logs_dir)?;
        let appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| PracticeError::Config(format!("failed to install tracing subscriber: {e}")))?;

    if config.file {
        tracing::info!(dir = %logs_dir.display(), "file logging enabled");
    }
    Ok(guard)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    // The only test in this crate that installs the global subscriber.
    #[test]
    fn file_sink_creates_logs_dir_and_init_runs_once() {
        let root = tempfile::tempdir().unwrap();
        let logs_dir = root.path().join("nested").join("logs");
        let config = LoggingConfig {
            level: "lingualive=debug".to_owned(),
            file: true,
        };

        let guard = init(&config, &logs_dir).unwrap();
        assert!(guard.is_some());
        assert!(logs_dir.is_dir());

        let err = init(&LoggingConfig::default(), &logs_dir).unwrap_err();
        assert!(matches!(err, PracticeError::Config(_)));
    }
}
