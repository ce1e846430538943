//! Thumbnail encoder and decoder.

use std::sync::Arc;

use dashmap::DashMap;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbImage};
use tracing::debug;

use super::error::ThumbnailError;
use super::marker::{
    find_marker, find_segment, patch_dimensions, segment_end, EOI, MARKER_PREFIX, SOS,
};
use super::packet::{ThumbnailPacket, PACKET_VERSION};

/// Default target pixel count of a thumbnail (42 x 42).
pub const DEFAULT_PIXEL_BUDGET: u32 = 42 * 42;

/// Largest dimension the one-byte packet fields can carry.
const MAX_DIMENSION: u32 = u8::MAX as u32;

/// Size of the image used to capture a donor header.
const DONOR_SIZE: u32 = 8;

/// How to inflate a thumbnail on decode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThumbnailRequest {
    /// Bounding box in points; the result fits inside it, aspect preserved.
    pub max_size: (u32, u32),
    /// Gaussian blur radius in points. 0 disables the blur.
    pub blur_radius: f32,
    /// Pixels per point.
    pub scale: f32,
}

impl ThumbnailRequest {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_size: (max_width, max_height),
            blur_radius: 0.0,
            scale: 1.0,
        }
    }

    pub fn with_blur(mut self, radius: f32) -> Self {
        self.blur_radius = radius;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Pixel bounds after applying `scale`. Never zero.
    pub fn pixel_bounds(&self) -> (u32, u32) {
        let scale = if self.scale > 0.0 { self.scale } else { 1.0 };
        let (w, h) = self.max_size;
        (
            ((w as f32 * scale).round() as u32).max(1),
            ((h as f32 * scale).round() as u32).max(1),
        )
    }

    /// Blur sigma in pixels.
    pub fn blur_sigma(&self) -> f32 {
        (self.blur_radius * self.scale).max(0.0)
    }
}

/// Map a `[0, 1]` quality to the JPEG encoder's `1..=100`.
fn jpeg_quality(quality: f32) -> u8 {
    debug_assert!(
        (0.0..=1.0).contains(&quality),
        "quality out of range: {quality}"
    );
    ((quality.clamp(0.0, 1.0) * 100.0).round() as u8).clamp(1, 100)
}

fn encode_jpeg(image: &RgbImage, quality: f32) -> Result<Vec<u8>, ThumbnailError> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, jpeg_quality(quality))
        .encode_image(image)
        .map_err(|e| ThumbnailError::Encode(e.to_string()))?;
    Ok(bytes)
}

/// Offsets `(scan_start, eoi)` of the entropy-coded data in a JPEG stream.
fn scan_bounds(jpeg: &[u8]) -> Result<(usize, usize), ThumbnailError> {
    let sos = find_segment(jpeg, SOS)?;
    let scan_start = segment_end(jpeg, sos)?;
    let eoi = find_marker(&jpeg[scan_start..], EOI)
        .map(|offset| scan_start + offset)
        .ok_or(ThumbnailError::MarkerNotFound { marker: EOI })?;
    Ok((scan_start, eoi))
}

/// Thumbnail dimensions for a source of `width x height` scaled to about
/// `pixel_budget` pixels.
pub(crate) fn thumbnail_dimensions(
    width: u32,
    height: u32,
    pixel_budget: u32,
) -> Result<(u8, u8), ThumbnailError> {
    if width == 0 || height == 0 || pixel_budget == 0 {
        return Err(ThumbnailError::InvalidDimensions { width, height });
    }

    let scale = (pixel_budget as f64 / (width as f64 * height as f64)).sqrt();
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    if w > MAX_DIMENSION || h > MAX_DIMENSION {
        return Err(ThumbnailError::InvalidDimensions {
            width: w,
            height: h,
        });
    }
    Ok((w as u8, h as u8))
}

/// Encodes images into thumbnail packets and restores them.
///
/// Decoding needs a donor header registered for the packet's data type.
/// Headers are tied to the encoder configuration, so register the one
/// captured with [`donor_header`](Self::donor_header) at the quality the
/// packets were encoded with. Clones share the header registry.
#[derive(Debug, Clone, Default)]
pub struct ThumbnailCodec {
    headers: Arc<DashMap<u8, Arc<[u8]>>>,
}

impl ThumbnailCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the donor header this crate's JPEG encoder writes at
    /// `quality` (in `[0, 1]`): every byte up to the start of the scan data.
    pub fn donor_header(quality: f32) -> Result<Vec<u8>, ThumbnailError> {
        let jpeg = encode_jpeg(&RgbImage::new(DONOR_SIZE, DONOR_SIZE), quality)?;
        let (scan_start, _) = scan_bounds(&jpeg)?;
        Ok(jpeg[..scan_start].to_vec())
    }

    /// Associate a donor header with a data-type tag, replacing any previous one.
    pub fn register_header(&self, data_type: u8, header: impl Into<Vec<u8>>) {
        let header: Vec<u8> = header.into();
        debug!(data_type, len = header.len(), "Thumbnail donor header registered");
        self.headers.insert(data_type, Arc::from(header));
    }

    pub fn has_header(&self, data_type: u8) -> bool {
        self.headers.contains_key(&data_type)
    }

    pub fn remove_header(&self, data_type: u8) -> bool {
        self.headers.remove(&data_type).is_some()
    }

    /// Encode with the default pixel budget. See [`encode_with_budget`](Self::encode_with_budget).
    pub fn encode(&self, image: &DynamicImage, data_type: u8, quality: f32) -> Option<Vec<u8>> {
        self.encode_with_budget(image, data_type, quality, DEFAULT_PIXEL_BUDGET)
    }

    /// Encode `image` into a packet tagged `data_type`.
    ///
    /// Returns `None` if the scaled thumbnail would exceed 255 pixels on
    /// either axis, or if encoding fails.
    pub fn encode_with_budget(
        &self,
        image: &DynamicImage,
        data_type: u8,
        quality: f32,
        pixel_budget: u32,
    ) -> Option<Vec<u8>> {
        match self.try_encode(image, data_type, quality, pixel_budget) {
            Ok(packet) => Some(packet.to_bytes()),
            Err(e) => {
                debug!(error = %e, "Thumbnail encode failed");
                None
            }
        }
    }

    /// Encode, reporting why on failure.
    pub fn try_encode(
        &self,
        image: &DynamicImage,
        data_type: u8,
        quality: f32,
        pixel_budget: u32,
    ) -> Result<ThumbnailPacket, ThumbnailError> {
        let (width, height) = thumbnail_dimensions(image.width(), image.height(), pixel_budget)?;

        let small = image
            .resize_exact(width as u32, height as u32, FilterType::Triangle)
            .to_rgb8();
        let jpeg = encode_jpeg(&small, quality)?;
        let (scan_start, eoi) = scan_bounds(&jpeg)?;

        Ok(ThumbnailPacket::new(
            data_type,
            width,
            height,
            jpeg[scan_start..eoi].to_vec(),
        ))
    }

    /// Restore a packet into an image bounded by `request`.
    ///
    /// Returns `None` on a version mismatch, an unknown data type, a header
    /// that cannot be patched, or a stream that fails to decode.
    pub fn decode(&self, packet: &[u8], request: &ThumbnailRequest) -> Option<DynamicImage> {
        match self.try_decode(packet, request) {
            Ok(image) => Some(image),
            Err(e) => {
                debug!(error = %e, "Thumbnail decode failed");
                None
            }
        }
    }

    /// Decode, reporting why on failure.
    pub fn try_decode(
        &self,
        packet: &[u8],
        request: &ThumbnailRequest,
    ) -> Result<DynamicImage, ThumbnailError> {
        // Version first, before the header registry is consulted
        match packet.first() {
            None => return Err(ThumbnailError::Truncated { len: 0 }),
            Some(&version) if version != PACKET_VERSION => {
                return Err(ThumbnailError::UnsupportedVersion {
                    found: version,
                    expected: PACKET_VERSION,
                })
            }
            Some(_) => {}
        }

        let packet = ThumbnailPacket::parse(packet)?;
        if packet.width == 0 || packet.height == 0 {
            return Err(ThumbnailError::InvalidDimensions {
                width: packet.width as u32,
                height: packet.height as u32,
            });
        }

        let header = self
            .headers
            .get(&packet.data_type)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(ThumbnailError::UnknownDataType(packet.data_type))?;

        let mut jpeg = Vec::with_capacity(header.len() + packet.payload.len() + 2);
        jpeg.extend_from_slice(&header);
        jpeg.extend_from_slice(&packet.payload);
        jpeg.extend_from_slice(&[MARKER_PREFIX, EOI]);
        patch_dimensions(&mut jpeg, packet.width as u16, packet.height as u16)?;

        let tiny = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)
            .map_err(|e| ThumbnailError::Decode(e.to_string()))?;

        let (max_width, max_height) = request.pixel_bounds();
        let mut image = tiny.resize(max_width, max_height, FilterType::CatmullRom);

        let sigma = request.blur_sigma();
        if sigma > 0.0 {
            image = image.blur(sigma);
        }
        Ok(image)
    }
}
