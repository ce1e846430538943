//! Integration tests for the thumbnail codec.
//!
//! Run with: `cargo test --test thumbnail_integration`

use image::{DynamicImage, Rgb, RgbImage};

use fetchkit::thumbnail::{
    ThumbnailCodec, ThumbnailPacket, ThumbnailRequest, PACKET_HEADER_LEN, PACKET_VERSION,
};

const PHOTO: u8 = 1;
const QUALITY: f32 = 0.6;

fn codec() -> ThumbnailCodec {
    let codec = ThumbnailCodec::new();
    codec.register_header(PHOTO, ThumbnailCodec::donor_header(QUALITY).unwrap());
    codec
}

/// A gradient, so the payload is not trivially uniform.
fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
    }))
}

#[test]
fn test_round_trip_respects_bounds() {
    let codec = codec();

    for (width, height) in [(640, 480), (480, 640), (1000, 100), (64, 64)] {
        let packet = codec.encode(&gradient(width, height), PHOTO, QUALITY).unwrap();
        let parsed = ThumbnailPacket::parse(&packet).unwrap();
        assert_eq!(parsed.version, PACKET_VERSION);
        assert_eq!(parsed.data_type, PHOTO);
        assert_eq!(packet.len(), PACKET_HEADER_LEN + parsed.payload.len());

        let request = ThumbnailRequest::new(200, 150).with_blur(2.0);
        let image = codec.decode(&packet, &request).unwrap();
        assert!(image.width() <= 200, "{width}x{height} -> {}", image.width());
        assert!(image.height() <= 150, "{width}x{height} -> {}", image.height());
        assert!(image.width() > 0 && image.height() > 0);
    }
}

#[test]
fn test_packets_are_small() {
    let packet = codec().encode(&gradient(800, 600), PHOTO, QUALITY).unwrap();
    assert!(packet.len() < 2048, "packet is {} bytes", packet.len());
}

#[test]
fn test_oversized_thumbnail_is_rejected() {
    // 10000x1 at the default budget needs a thumbnail wider than 255
    assert!(codec().encode(&gradient(10_000, 1), PHOTO, QUALITY).is_none());
}

#[test]
fn test_version_guard() {
    let codec = codec();
    let mut packet = codec.encode(&gradient(64, 48), PHOTO, QUALITY).unwrap();
    packet[0] = PACKET_VERSION + 1;

    assert!(codec.decode(&packet, &ThumbnailRequest::new(64, 64)).is_none());
    // Same result with no headers registered at all
    assert!(ThumbnailCodec::new()
        .decode(&packet, &ThumbnailRequest::new(64, 64))
        .is_none());
}

#[test]
fn test_unregistered_data_type_fails() {
    let codec = codec();
    let packet = codec.encode(&gradient(64, 48), 9, QUALITY).unwrap();
    assert!(codec.decode(&packet, &ThumbnailRequest::new(64, 64)).is_none());

    codec.register_header(9, ThumbnailCodec::donor_header(QUALITY).unwrap());
    assert!(codec.decode(&packet, &ThumbnailRequest::new(64, 64)).is_some());
}
