//! Tracing subscriber setup.
//!
//! Console output goes to stderr with local timestamps. With a log directory
//! configured, a second layer writes plain-text logs to a daily rolling file
//! through a non-blocking writer; keep the returned [`LogGuard`] alive until
//! exit or buffered lines are lost.

use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use time::macros::format_description;
use time::UtcOffset;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

/// Default log file prefix; the appender adds the date.
pub const DEFAULT_FILE_PREFIX: &str = "fetchkit.log";

#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid log filter '{directive}': {reason}")]
    Filter { directive: String, reason: String },

    #[error("logging already initialized: {0}")]
    Init(#[from] TryInitError),
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or
    /// `fetchkit=debug`.
    pub level: String,
    /// Directory for the rolling log file. `None` disables file output.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
    pub ansi: bool,
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            directory: None,
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            ansi: true,
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_file(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

/// Keeps the file writer flushing. Dropping it flushes and stops the writer.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Filter from `env_directive` when it is set and non-empty, else from `level`.
fn build_filter(level: &str, env_directive: Option<&str>) -> Result<EnvFilter, LogError> {
    let directive = match env_directive {
        Some(env) if !env.trim().is_empty() => env,
        _ => level,
    };
    EnvFilter::try_new(directive).map_err(|e| LogError::Filter {
        directive: directive.to_string(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init(config: &LogConfig) -> Result<LogGuard, LogError> {
    let env_directive = env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(&config.level, env_directive.as_deref())?;

    // The local offset is unavailable on some multi-threaded platforms
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let timer = OffsetTime::new(
        offset,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"),
    );

    let console = fmt::layer()
        .with_timer(timer.clone())
        .with_target(false)
        .with_ansi(config.ansi)
        .with_writer(io::stderr);

    let (file, guard) = match &config.directory {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|e| LogError::Directory {
                path: dir.clone(),
                source: e,
            })?;
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_timer(timer)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;

    tracing::debug!(level = %config.level, file = ?config.directory, "Logging initialized");
    Ok(LogGuard { _file: guard })
}
