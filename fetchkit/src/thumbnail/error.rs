//! Error types for thumbnail encoding and decoding.

use thiserror::Error;

/// Why a thumbnail could not be produced or restored.
///
/// The public codec API maps these to `None`; they exist so the failure can
/// be logged with a reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThumbnailError {
    #[error("packet too short: {len} bytes")]
    Truncated { len: usize },

    #[error("unsupported packet version {found} (expected {expected})")]
    UnsupportedVersion { found: u8, expected: u8 },

    #[error("no donor header registered for data type {0}")]
    UnknownDataType(u8),

    #[error("invalid thumbnail dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("marker 0xFF{marker:02X} not found")]
    MarkerNotFound { marker: u8 },

    #[error("segment at offset {offset} runs past the end of the buffer")]
    SegmentOutOfBounds { offset: usize },

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("decoding failed: {0}")]
    Decode(String),
}
