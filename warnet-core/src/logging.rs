//! Logging configuration module
//!
//! Console output always goes to stderr so command output on stdout stays
//! machine readable. An optional JSON file log rotates via tracing-appender.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::WarnetError;

pub const LOG_PATH_ENV: &str = "WARNET_LOG_PATH";
pub const LOG_ROTATION_ENV: &str = "WARNET_LOG_ROTATION";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,               // trace, debug, info, warn, error
    pub file_path: Option<PathBuf>,  // directory for warnet.log
    pub rotation: LogRotation,
    pub with_target: bool,
}

/// Log rotation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

impl FromStr for LogRotation {
    type Err = WarnetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "never" => Ok(Self::Never),
            other => Err(WarnetError::Validation(format!(
                "Unknown log rotation '{}', expected hourly, daily or never",
                other
            ))),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
            rotation: LogRotation::Daily,
            with_target: false,
        }
    }
}

impl LoggingConfig {
    /// Build from `RUST_LOG`, `WARNET_LOG_PATH` and `WARNET_LOG_ROTATION`
    pub fn from_env() -> Self {
        let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let file_path = std::env::var(LOG_PATH_ENV).ok().map(PathBuf::from);
        let rotation = std::env::var(LOG_ROTATION_ENV)
            .ok()
            .and_then(|r| r.parse().ok())
            .unwrap_or(LogRotation::Daily);

        Self {
            level,
            file_path,
            rotation,
            ..Default::default()
        }
    }

    /// Filter used when `RUST_LOG` is not set
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }

    /// Install the global subscriber.
    ///
    /// The returned guard flushes the file log when dropped and must be kept
    /// alive for the life of the process.
    pub fn init(&self) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
        let console_layer = fmt::layer()
            .with_target(self.with_target)
            .with_level(true)
            .with_ansi(true)
            .with_writer(io::stderr);

        let guard = if let Some(ref path) = self.file_path {
            std::fs::create_dir_all(path)?;
            let file_appender = match self.rotation {
                LogRotation::Hourly => rolling::hourly(path, "warnet.log"),
                LogRotation::Daily => rolling::daily(path, "warnet.log"),
                LogRotation::Never => rolling::never(path, "warnet.log"),
            };
            let (writer, guard) = non_blocking(file_appender);

            let file_layer = fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .json()
                .with_writer(writer);

            tracing_subscriber::registry()
                .with(self.filter())
                .with(console_layer)
                .with(file_layer)
                .try_init()?;
            Some(guard)
        } else {
            tracing_subscriber::registry()
                .with(self.filter())
                .with(console_layer)
                .try_init()?;
            None
        };

        tracing::debug!("Logging initialized - level: {}", self.level);

        Ok(guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.file_path.is_none());
        assert_eq!(config.rotation, LogRotation::Daily);
    }

    #[test]
    fn test_rotation_names() {
        assert_eq!("hourly".parse::<LogRotation>().unwrap(), LogRotation::Hourly);
        assert_eq!(" Never ".parse::<LogRotation>().unwrap(), LogRotation::Never);
        assert!(matches!(
            "weekly".parse::<LogRotation>(),
            Err(WarnetError::Validation(_))
        ));
    }

    #[test]
    fn test_file_logging_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let config = LoggingConfig {
            file_path: Some(log_dir.clone()),
            rotation: LogRotation::Never,
            ..Default::default()
        };

        // Another test may already own the global subscriber; the directory
        // is created before installation either way.
        let _ = config.init();
        assert!(log_dir.is_dir());
    }
}
