//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Select plain or JSON output
//! - Write to stdout or to a (optionally rotating) log file
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the level chosen from `--debug`
//! - File output goes through a non-blocking writer; the returned guard must
//!   live until shutdown or buffered lines are lost

use std::path::Path;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

use crate::config::{LoggingConfig, RotationPeriod};

/// Error type for logging setup.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log file path: {0}")]
    InvalidPath(String),

    #[error("failed to open log file: {0}")]
    Appender(#[from] InitError),

    #[error("failed to install subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Default filter directive for the given mode.
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "entra_phishing_detection=debug,tower_http=debug,info"
    } else {
        "info"
    }
}

/// Install the global subscriber.
///
/// Returns the file writer guard when logging to a file.
pub fn init_logging(config: &LoggingConfig, debug: bool) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    let (writer, guard, ansi) = if config.log_file.is_empty() {
        (BoxMakeWriter::new(std::io::stdout), None, true)
    } else {
        let appender = file_appender(config)?;
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        (BoxMakeWriter::new(non_blocking), Some(guard), false)
    };

    let layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(writer)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()?;

    Ok(guard)
}

fn file_appender(config: &LoggingConfig) -> Result<RollingFileAppender, LoggingError> {
    let path = Path::new(&config.log_file);
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| LoggingError::InvalidPath(config.log_file.clone()))?;
    let directory = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let rotation = if config.rotate.enabled {
        rotation(config.rotate.period)
    } else {
        Rotation::NEVER
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(file_name);
    if config.rotate.enabled && config.rotate.max_files > 0 {
        builder = builder.max_log_files(config.rotate.max_files);
    }

    Ok(builder.build(directory)?)
}

fn rotation(period: RotationPeriod) -> Rotation {
    match period {
        RotationPeriod::Minutely => Rotation::MINUTELY,
        RotationPeriod::Hourly => Rotation::HOURLY,
        RotationPeriod::Daily => Rotation::DAILY,
        RotationPeriod::Never => Rotation::NEVER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RotateConfig;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "info");
        assert!(default_directive(true).contains("entra_phishing_detection=debug"));
    }

    #[test]
    fn test_file_appender_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            log_file: dir.path().join("detector.log").to_string_lossy().into_owned(),
            rotate: RotateConfig {
                enabled: false,
                ..RotateConfig::default()
            },
            ..LoggingConfig::default()
        };

        let _appender = file_appender(&config).unwrap();
        assert!(dir.path().join("detector.log").exists());
    }

    #[test]
    fn test_invalid_log_path() {
        let config = LoggingConfig {
            log_file: "/".to_string(),
            ..LoggingConfig::default()
        };
        assert!(matches!(file_appender(&config), Err(LoggingError::InvalidPath(_))));
    }
}
