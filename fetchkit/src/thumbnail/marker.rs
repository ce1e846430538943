//! JPEG marker search and header patching.
//!
//! All offsets are validated against the buffer length; malformed input
//! yields an error, never a panic.

use super::error::ThumbnailError;

/// Byte that introduces every JPEG marker.
pub const MARKER_PREFIX: u8 = 0xFF;

pub(crate) const SOI: u8 = 0xD8;
pub(crate) const EOI: u8 = 0xD9;
pub(crate) const SOS: u8 = 0xDA;

/// Start-of-frame markers whose dimension fields are patched on decode.
pub(crate) const SOF_MARKERS: [u8; 3] = [0xC0, 0xC1, 0xC2];

/// Offset of the first `0xFF marker` pair in `data`.
///
/// Linear scan; returns the offset of the `0xFF` byte.
pub fn find_marker(data: &[u8], marker: u8) -> Option<usize> {
    data.windows(2)
        .position(|pair| pair[0] == MARKER_PREFIX && pair[1] == marker)
}

/// Markers that stand alone without a length field.
fn is_standalone(marker: u8) -> bool {
    matches!(marker, 0x01 | 0xD0..=0xD7 | SOI | EOI)
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16, ThumbnailError> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(ThumbnailError::SegmentOutOfBounds { offset })
}

/// Offset of the segment introduced by `marker`, walking the header
/// segment by segment from the SOI.
///
/// Unlike [`find_marker`] this cannot be fooled by table bytes that happen
/// to look like a marker. The walk stops at the first SOS.
pub fn find_segment(data: &[u8], marker: u8) -> Result<usize, ThumbnailError> {
    if data.len() < 2 || data[0] != MARKER_PREFIX || data[1] != SOI {
        return Err(ThumbnailError::MarkerNotFound { marker: SOI });
    }

    let mut pos = 2;
    loop {
        // Fill bytes
        while data.get(pos) == Some(&MARKER_PREFIX) && data.get(pos + 1) == Some(&MARKER_PREFIX) {
            pos += 1;
        }
        match (data.get(pos), data.get(pos + 1)) {
            (Some(&MARKER_PREFIX), Some(&found)) => {
                if found == marker {
                    return Ok(pos);
                }
                if found == SOS || found == EOI {
                    return Err(ThumbnailError::MarkerNotFound { marker });
                }
                if is_standalone(found) {
                    pos += 2;
                } else {
                    pos += 2 + read_u16(data, pos + 2)? as usize;
                }
            }
            _ => return Err(ThumbnailError::MarkerNotFound { marker }),
        }
    }
}

/// Offset just past the segment starting at `offset`.
pub(crate) fn segment_end(data: &[u8], offset: usize) -> Result<usize, ThumbnailError> {
    let len = read_u16(data, offset + 2)? as usize;
    let end = offset + 2 + len;
    if len < 2 || end > data.len() {
        return Err(ThumbnailError::SegmentOutOfBounds { offset });
    }
    Ok(end)
}

/// Offset of the first start-of-frame segment.
fn find_frame(data: &[u8]) -> Result<usize, ThumbnailError> {
    SOF_MARKERS
        .iter()
        .find_map(|&m| find_segment(data, m).ok())
        .ok_or(ThumbnailError::MarkerNotFound {
            marker: SOF_MARKERS[0],
        })
}

/// Overwrite the frame height and width in the first SOF segment.
pub(crate) fn patch_dimensions(
    data: &mut [u8],
    width: u16,
    height: u16,
) -> Result<(), ThumbnailError> {
    let sof = find_frame(data)?;

    // FF Cx, length(2), precision(1), height(2), width(2)
    let fields = data
        .get_mut(sof + 5..sof + 9)
        .ok_or(ThumbnailError::SegmentOutOfBounds { offset: sof })?;
    fields[..2].copy_from_slice(&height.to_be_bytes());
    fields[2..].copy_from_slice(&width.to_be_bytes());
    Ok(())
}

/// Frame dimensions `(width, height)` from the first SOF segment.
#[cfg(test)]
fn read_dimensions(data: &[u8]) -> Result<(u16, u16), ThumbnailError> {
    let sof = find_frame(data)?;
    let height = read_u16(data, sof + 5)?;
    let width = read_u16(data, sof + 7)?;
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// SOI, APP0 (len 4), SOF0 (len 11), SOS (len 8), two scan bytes, EOI.
    fn sample() -> Vec<u8> {
        vec![
            0xFF, 0xD8, // SOI
            0xFF, 0xE0, 0x00, 0x04, 0xFF, 0xC0, // APP0 with a fake marker inside
            0xFF, 0xC0, 0x00, 0x0B, 0x08, 0x00, 0x10, 0x00, 0x20, 0x01, 0x01, 0x11, 0x00,
            0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00, // SOS
            0x12, 0x34, // scan
            0xFF, 0xD9, // EOI
        ]
    }

    #[test]
    fn test_find_marker_linear() {
        let data = sample();
        assert_eq!(find_marker(&data, SOI), Some(0));
        // The fake marker inside APP0 is found first by a plain scan
        assert_eq!(find_marker(&data, 0xC0), Some(6));
        assert_eq!(find_marker(&data, EOI), Some(data.len() - 2));
        assert_eq!(find_marker(&data, 0xC4), None);
        assert_eq!(find_marker(&[], 0xC0), None);
        assert_eq!(find_marker(&[0xFF], 0xC0), None);
    }

    #[test]
    fn test_find_segment_skips_segment_bodies() {
        let data = sample();
        assert_eq!(find_segment(&data, 0xC0), Ok(8));
        assert_eq!(find_segment(&data, SOS), Ok(21));
        assert_eq!(
            find_segment(&data, 0xC4),
            Err(ThumbnailError::MarkerNotFound { marker: 0xC4 })
        );
    }

    #[test]
    fn test_segment_end() {
        let data = sample();
        assert_eq!(segment_end(&data, 21), Ok(31));
        assert!(segment_end(&data, data.len() - 1).is_err());
    }

    #[test]
    fn test_patch_and_read_dimensions() {
        let mut data = sample();
        assert_eq!(read_dimensions(&data), Ok((32, 16)));

        patch_dimensions(&mut data, 300, 7).unwrap();
        assert_eq!(read_dimensions(&data), Ok((300, 7)));
        assert_eq!(&data[13..17], &[0x00, 0x07, 0x01, 0x2C]);
    }

    #[test]
    fn test_patch_without_sof_fails() {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02];
        assert_eq!(
            patch_dimensions(&mut data, 1, 1),
            Err(ThumbnailError::MarkerNotFound { marker: 0xC0 })
        );
    }

    #[test]
    fn test_truncated_sof_fails() {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x0B, 0x08];
        assert!(patch_dimensions(&mut data, 1, 1).is_err());
    }

    proptest! {
        #[test]
        fn prop_find_marker_returns_first_pair(
            data in proptest::collection::vec(any::<u8>(), 0..256),
            marker in any::<u8>(),
        ) {
            match find_marker(&data, marker) {
                Some(i) => {
                    prop_assert_eq!(data[i], MARKER_PREFIX);
                    prop_assert_eq!(data[i + 1], marker);
                    prop_assert!(find_marker(&data[..i + 1], marker).is_none());
                }
                None => {
                    prop_assert!(!data.windows(2).any(|w| w[0] == MARKER_PREFIX && w[1] == marker));
                }
            }
        }

        #[test]
        fn prop_header_walk_never_panics(
            data in proptest::collection::vec(any::<u8>(), 0..128),
            marker in any::<u8>(),
        ) {
            let mut prefixed = vec![0xFF, 0xD8];
            prefixed.extend_from_slice(&data);
            if let Ok(pos) = find_segment(&prefixed, marker) {
                prop_assert_eq!(prefixed[pos], MARKER_PREFIX);
                prop_assert_eq!(prefixed[pos + 1], marker);
            }
            let _ = patch_dimensions(&mut prefixed, 10, 10);
            let _ = read_dimensions(&prefixed);
        }
    }
}
