//! Logging Module
//!
//! Structured logging setup on top of `tracing`. The library itself only emits
//! events (checkpoint notices, created directories, written charts); binaries
//! and training drivers call [`init_logging`] once to install a subscriber.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::utils::error::{Result, TrainKitError};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: LogLevel,
    /// Whether to include target (module path)
    pub include_target: bool,
    /// Whether to use ANSI colors
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_target: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Debug output with module paths
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            include_target: true,
            ansi_colors: true,
        }
    }
}

/// Log level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Install a global compact formatter filtered at `config.level`.
///
/// Fails if another subscriber has already been installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::new(config.level.to_string().to_lowercase());

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_ansi(config.ansi_colors)
                .with_target(config.include_target),
        )
        .with(filter)
        .try_init()
        .map_err(|e| TrainKitError::Config(format!("Failed to initialize logger: {e}")))?;

    Ok(())
}

/// Default or verbose logging, as selected by a `--verbose` flag
pub fn setup_cli_logging(verbose: bool) -> Result<()> {
    if verbose {
        init_logging(&LogConfig::verbose())
    } else {
        init_logging(&LogConfig::default())
    }
}
