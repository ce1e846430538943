//! Thumbnail packet framing.

use super::error::ThumbnailError;

/// Packet format version written by this codec.
pub const PACKET_VERSION: u8 = 1;

/// Bytes before the scan payload.
pub const PACKET_HEADER_LEN: usize = 4;

/// A parsed thumbnail packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailPacket {
    pub version: u8,
    /// Selects the donor header.
    pub data_type: u8,
    pub width: u8,
    pub height: u8,
    /// Entropy-coded scan data without header or end marker.
    pub payload: Vec<u8>,
}

impl ThumbnailPacket {
    /// A current-version packet.
    pub fn new(data_type: u8, width: u8, height: u8, payload: Vec<u8>) -> Self {
        Self {
            version: PACKET_VERSION,
            data_type,
            width,
            height,
            payload,
        }
    }

    /// Split raw bytes into header fields and payload.
    ///
    /// Only the length is checked here; the version is checked by the codec.
    pub fn parse(bytes: &[u8]) -> Result<Self, ThumbnailError> {
        match bytes {
            [version, data_type, width, height, payload @ ..] => Ok(Self {
                version: *version,
                data_type: *data_type,
                width: *width,
                height: *height,
                payload: payload.to_vec(),
            }),
            _ => Err(ThumbnailError::Truncated { len: bytes.len() }),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PACKET_HEADER_LEN + self.payload.len());
        bytes.extend_from_slice(&[self.version, self.data_type, self.width, self.height]);
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    pub fn is_current_version(&self) -> bool {
        self.version == PACKET_VERSION
    }

    /// Total encoded size in bytes.
    pub fn len(&self) -> usize {
        PACKET_HEADER_LEN + self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_fields() {
        let packet = ThumbnailPacket::parse(&[1, 7, 42, 30, 0xAA, 0xBB]).unwrap();
        assert_eq!(packet.version, 1);
        assert_eq!(packet.data_type, 7);
        assert_eq!((packet.width, packet.height), (42, 30));
        assert_eq!(packet.payload, vec![0xAA, 0xBB]);
        assert_eq!(packet.len(), 6);
        assert!(packet.is_current_version());
    }

    #[test]
    fn test_parse_header_only() {
        let packet = ThumbnailPacket::parse(&[2, 0, 1, 1]).unwrap();
        assert!(packet.is_empty());
        assert!(!packet.is_current_version());
    }

    #[test]
    fn test_parse_truncated() {
        assert_eq!(
            ThumbnailPacket::parse(&[1, 0, 5]),
            Err(ThumbnailError::Truncated { len: 3 })
        );
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            match ThumbnailPacket::parse(&bytes) {
                Ok(packet) => {
                    prop_assert!(bytes.len() >= PACKET_HEADER_LEN);
                    prop_assert_eq!(packet.to_bytes(), bytes);
                }
                Err(_) => prop_assert!(bytes.len() < PACKET_HEADER_LEN),
            }
        }
    }
}
