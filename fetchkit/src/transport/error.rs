//! Transport-level errors.

use thiserror::Error;

/// Errors raised before a complete HTTP response is available.
///
/// Status codes are not errors at this level; the download manager decides
/// what counts as a bad response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request exceeded the session timeout.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Connection, DNS or protocol failure.
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    /// The response body could not be read to the end.
    #[error("failed to read response body from {url}: {reason}")]
    Body { url: String, reason: String },
}

impl TransportError {
    /// Returns true for timeouts, so callers can special-case them.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }

    /// The URL the failed request was addressed to.
    pub fn url(&self) -> &str {
        match self {
            TransportError::Timeout { url }
            | TransportError::Network { url, .. }
            | TransportError::Body { url, .. } => url,
        }
    }
}
