//! CLI error type.

use std::io;
use std::path::PathBuf;

use fetchkit::config::ConfigError;
use fetchkit::thumbnail::ThumbnailError;
use fetchkit::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error("failed to create HTTP client: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("image error: {0}")]
    Image(String),

    #[error(transparent)]
    Thumbnail(#[from] ThumbnailError),

    #[error("{0}")]
    Download(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl CliError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CliError::Io {
            path: path.into(),
            source,
        }
    }
}
