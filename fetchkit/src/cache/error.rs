//! Error types for the image cache.
//!
//! These never reach callers of [`ImageCache`](super::ImageCache). Disk
//! errors degrade to a miss and network-path errors become a
//! [`CacheEvent::LoadFailed`](super::CacheEvent::LoadFailed); the error is
//! only used for logging and for the failure reason.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::download::DownloadError;

/// Errors raised inside the cache tiers.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Bytes could not be decoded into an image.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Image could not be encoded for disk.
    #[error("encode failed: {0}")]
    Encode(String),

    /// Network fetch failed.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Response carried no body.
    #[error("response has no data")]
    MissingData,

    /// A disk operation was requested with the disk tier disabled.
    #[error("disk cache is disabled")]
    DiskDisabled,

    /// The background task running the operation went away.
    #[error("background task failed: {0}")]
    Task(String),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}
