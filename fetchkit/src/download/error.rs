//! Download error types.

use thiserror::Error;

use crate::transport::TransportError;

/// Terminal error of a failed download.
///
/// Clonable so every subscriber of a download receives the same value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    /// The transport could not produce a complete response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a status outside `[200, 300)`.
    #[error("bad response: HTTP {status}")]
    BadResponse { status: u16 },
}

impl DownloadError {
    /// Returns true if the download failed because of a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DownloadError::Transport(e) if e.is_timeout())
    }

    /// The HTTP status for bad responses.
    pub fn status(&self) -> Option<u16> {
        match self {
            DownloadError::BadResponse { status } => Some(*status),
            DownloadError::Transport(_) => None,
        }
    }
}
