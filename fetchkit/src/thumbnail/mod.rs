//! Compact thumbnail codec.
//!
//! A thumbnail packet carries a tiny JPEG preview in a few dozen bytes by
//! dropping everything a decoder can reconstruct on its own. Baseline JPEG
//! headers produced by one encoder configuration are byte-identical except
//! for the frame dimensions, so the packet keeps only the entropy-coded scan
//! data and the receiver splices it back into a registered donor header.
//!
//! # Packet layout
//!
//! ```text
//! ┌─────────┬───────────┬───────┬────────┬──────────────────────┐
//! │ version │ data type │ width │ height │ scan payload (n)     │
//! │   u8    │    u8     │  u8   │   u8   │ SOS body .. EOI      │
//! └─────────┴───────────┴───────┴────────┴──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use fetchkit::thumbnail::{ThumbnailCodec, ThumbnailRequest};
//!
//! let codec = ThumbnailCodec::new();
//! codec.register_header(1, ThumbnailCodec::donor_header(0.5)?);
//!
//! let packet = codec.encode(&image, 1, 0.5).unwrap();
//! let preview = codec.decode(&packet, &ThumbnailRequest::new(128, 128)).unwrap();
//! ```

mod codec;
mod error;
mod marker;
mod packet;

pub use codec::{ThumbnailCodec, ThumbnailRequest, DEFAULT_PIXEL_BUDGET};
pub use error::ThumbnailError;
pub use marker::{find_marker, find_segment, MARKER_PREFIX};
pub use packet::{ThumbnailPacket, PACKET_HEADER_LEN, PACKET_VERSION};
