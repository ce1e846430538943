//! Image cache configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use image::ImageFormat;

/// Default subdirectory of the platform cache directory.
pub const DEFAULT_SUBPATH: &str = "images";

/// Default age after which an unused disk entry is reaped (30 days).
pub const DEFAULT_MAX_UNUSED_FILE_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Default JPEG quality for re-encoded disk entries.
pub const DEFAULT_JPEG_QUALITY: f32 = 0.9;

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Encoding used when an image has to be re-encoded for disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiskFormat {
    #[default]
    Png,
    Jpeg,
}

impl DiskFormat {
    pub fn image_format(&self) -> ImageFormat {
        match self {
            DiskFormat::Png => ImageFormat::Png,
            DiskFormat::Jpeg => ImageFormat::Jpeg,
        }
    }

    /// Returns true if a response with this content type is already in
    /// this format.
    pub fn matches_content_type(&self, content_type: &str) -> bool {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match self {
            DiskFormat::Png => mime == "image/png",
            DiskFormat::Jpeg => mime == "image/jpeg" || mime == "image/jpg",
        }
    }
}

impl fmt::Display for DiskFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskFormat::Png => write!(f, "png"),
            DiskFormat::Jpeg => write!(f, "jpeg"),
        }
    }
}

impl FromStr for DiskFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(DiskFormat::Png),
            "jpeg" | "jpg" => Ok(DiskFormat::Jpeg),
            other => Err(format!("unknown disk format '{}' (expected png or jpeg)", other)),
        }
    }
}

/// Settings for an [`ImageCache`](super::ImageCache).
#[derive(Debug, Clone)]
pub struct ImageCacheConfig {
    /// Disk tier root. One file per entry, named by the MD5 of the key.
    pub directory: PathBuf,
    /// Images larger than this are downscaled, aspect preserved. GIFs never are.
    pub max_image_dimensions: Option<(u32, u32)>,
    /// Disk entries not accessed for this long are reaped.
    pub max_unused_file_age: Duration,
    /// Encoding for re-encoded disk entries.
    pub disk_format: DiskFormat,
    /// JPEG quality in [0, 1].
    pub jpeg_quality: f32,
    pub disk_cache_enabled: bool,
    /// Events buffered per subscriber before it lags.
    pub event_capacity: usize,
}

impl ImageCacheConfig {
    /// Configuration rooted at `directory` with every other setting at its default.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            max_image_dimensions: None,
            max_unused_file_age: DEFAULT_MAX_UNUSED_FILE_AGE,
            disk_format: DiskFormat::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            disk_cache_enabled: true,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// `<platform cache dir>/<subpath>`, falling back to the temp dir.
    pub fn default_directory(subpath: impl AsRef<Path>) -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(subpath)
    }

    pub fn with_max_image_dimensions(mut self, width: u32, height: u32) -> Self {
        self.max_image_dimensions = Some((width, height));
        self
    }

    pub fn with_max_unused_file_age(mut self, age: Duration) -> Self {
        self.max_unused_file_age = age;
        self
    }

    pub fn with_disk_format(mut self, format: DiskFormat) -> Self {
        self.disk_format = format;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: f32) -> Self {
        debug_assert!(
            (0.0..=1.0).contains(&quality),
            "jpeg quality out of range: {quality}"
        );
        self.jpeg_quality = quality;
        self
    }

    pub fn with_disk_cache(mut self, enabled: bool) -> Self {
        self.disk_cache_enabled = enabled;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self::new(Self::default_directory(DEFAULT_SUBPATH))
    }
}
