//! Decoding, downscaling and re-encoding of cached images.
//!
//! CPU-bound; callers run these on the blocking pool.

use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, DynamicImage, ImageFormat};

use super::config::DiskFormat;
use super::error::CacheError;
use super::types::CachedImage;

const GIF_MAGIC: [&[u8]; 2] = [b"GIF87a", b"GIF89a"];

/// True if the path of `url` ends in `.gif`, ignoring case, query and fragment.
pub fn is_gif_url(url: &str) -> bool {
    let path = url
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or_default()
        .as_bytes();
    path.len() >= 4 && path[path.len() - 4..].eq_ignore_ascii_case(b".gif")
}

/// True if the bytes start with a GIF signature.
pub fn is_gif_data(bytes: &[u8]) -> bool {
    GIF_MAGIC.iter().any(|magic| bytes.starts_with(magic))
}

/// True if the content type is `image/gif`, parameters ignored.
pub fn is_gif_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("image/gif"))
}

/// Decode every frame of a GIF. The first frame becomes the still image.
pub fn decode_gif(bytes: &[u8]) -> Result<CachedImage, CacheError> {
    let decoder =
        GifDecoder::new(Cursor::new(bytes)).map_err(|e| CacheError::Decode(e.to_string()))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| CacheError::Decode(e.to_string()))?;
    let first = frames
        .first()
        .map(|frame| DynamicImage::ImageRgba8(frame.buffer().clone()))
        .ok_or_else(|| CacheError::Decode("GIF has no frames".to_string()))?;

    Ok(CachedImage {
        image: first,
        frames,
        format: Some(ImageFormat::Gif),
    })
}

/// Decode a still image, guessing the format from the bytes.
pub fn decode_raster(bytes: &[u8]) -> Result<CachedImage, CacheError> {
    let format = image::guess_format(bytes).ok();
    let image = image::load_from_memory(bytes).map_err(|e| CacheError::Decode(e.to_string()))?;
    Ok(CachedImage::still(image, format))
}

/// Shrink `image` to fit `max`, aspect preserved. Returns `None` if it
/// already fits.
pub fn downscale(image: &DynamicImage, max: Option<(u32, u32)>) -> Option<DynamicImage> {
    let (max_width, max_height) = max?;
    if image.width() <= max_width && image.height() <= max_height {
        return None;
    }
    Some(image.resize(max_width.max(1), max_height.max(1), FilterType::Triangle))
}

/// Decoded network response and whether it was resized.
pub struct Decoded {
    pub image: CachedImage,
    pub resized: bool,
}

/// Decode a network body. GIF by content type or signature, otherwise a
/// raster image that is downscaled to `max`.
pub fn decode_response(
    bytes: &[u8],
    content_type: Option<&str>,
    max: Option<(u32, u32)>,
) -> Result<Decoded, CacheError> {
    if bytes.is_empty() {
        return Err(CacheError::MissingData);
    }

    if content_type.is_some_and(is_gif_content_type) || is_gif_data(bytes) {
        return Ok(Decoded {
            image: decode_gif(bytes)?,
            resized: false,
        });
    }

    let mut decoded = decode_raster(bytes)?;
    let resized = match downscale(&decoded.image, max) {
        Some(smaller) => {
            decoded.image = smaller;
            true
        }
        None => false,
    };
    Ok(Decoded {
        image: decoded,
        resized,
    })
}

/// Map a `[0, 1]` quality to the JPEG encoder's `1..=100`.
fn jpeg_quality(quality: f32) -> u8 {
    ((quality.clamp(0.0, 1.0) * 100.0).round() as u8).clamp(1, 100)
}

/// Encode `image` for the disk tier.
pub fn encode_for_disk(
    image: &DynamicImage,
    format: DiskFormat,
    jpeg_quality_value: f32,
) -> Result<Vec<u8>, CacheError> {
    let mut bytes = Vec::new();
    match format {
        DiskFormat::Png => image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| CacheError::Encode(e.to_string()))?,
        DiskFormat::Jpeg => {
            JpegEncoder::new_with_quality(&mut bytes, jpeg_quality(jpeg_quality_value))
                .encode_image(&image.to_rgb8())
                .map_err(|e| CacheError::Encode(e.to_string()))?
        }
    }
    Ok(bytes)
}

/// Bytes to write for a network response.
///
/// The response body is written as-is when nothing was re-encoded and it is
/// already a GIF or already in the configured format.
pub fn disk_bytes(
    body: &[u8],
    content_type: Option<&str>,
    image: &CachedImage,
    resized: bool,
    format: DiskFormat,
    jpeg_quality_value: f32,
) -> Result<Vec<u8>, CacheError> {
    let is_gif = image.format == Some(ImageFormat::Gif);
    let same_format = content_type.is_some_and(|ct| format.matches_content_type(ct));
    if !resized && (is_gif || same_format) {
        Ok(body.to_vec())
    } else {
        encode_for_disk(&image.image, format, jpeg_quality_value)
    }
}
