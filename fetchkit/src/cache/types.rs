//! Value types shared by the cache tiers.

use std::fmt;
use std::str::FromStr;

use image::{DynamicImage, Frame, ImageFormat};
use serde::Serialize;

/// A decoded image held by the memory tier.
#[derive(Clone)]
pub struct CachedImage {
    /// First frame for animations, the image itself otherwise.
    pub image: DynamicImage,
    /// Every animation frame. Empty for still images.
    pub frames: Vec<Frame>,
    /// Format the bytes were decoded from, when known.
    pub format: Option<ImageFormat>,
}

impl CachedImage {
    /// A still image.
    pub fn still(image: DynamicImage, format: Option<ImageFormat>) -> Self {
        Self {
            image,
            frames: Vec::new(),
            format,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len().max(1)
    }
}

impl fmt::Debug for CachedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("frames", &self.frames.len())
            .field("format", &self.format)
            .finish()
    }
}

/// How far [`ImageCache::get_image`](super::ImageCache::get_image) may go on a miss.
///
/// Each policy includes the tiers below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadPolicy {
    Memory,
    Disk,
    Network,
}

impl LoadPolicy {
    pub fn allows_disk(&self) -> bool {
        *self >= LoadPolicy::Disk
    }

    pub fn allows_network(&self) -> bool {
        *self == LoadPolicy::Network
    }
}

impl fmt::Display for LoadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadPolicy::Memory => write!(f, "memory"),
            LoadPolicy::Disk => write!(f, "disk"),
            LoadPolicy::Network => write!(f, "network"),
        }
    }
}

impl FromStr for LoadPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(LoadPolicy::Memory),
            "disk" => Ok(LoadPolicy::Disk),
            "network" => Ok(LoadPolicy::Network),
            other => Err(format!(
                "unknown load policy '{}' (expected memory, disk or network)",
                other
            )),
        }
    }
}

/// Result of a disk reap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReapResult {
    /// Number of files removed.
    pub entries_removed: usize,
    /// Total bytes freed.
    pub bytes_freed: u64,
    /// Duration of the sweep in milliseconds.
    pub duration_ms: u64,
}

impl fmt::Display for ReapResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Reap: removed {} entries, freed {} bytes in {}ms",
            self.entries_removed, self.bytes_freed, self.duration_ms
        )
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub disk_hits: u64,
    pub disk_misses: u64,
    pub network_fetches: u64,
    pub network_failures: u64,
    pub memory_entries: usize,
}

impl CacheStats {
    /// Memory hit rate in [0, 1]; 0 before any lookup.
    pub fn memory_hit_rate(&self) -> f64 {
        let total = self.memory_hits + self.memory_misses;
        if total == 0 {
            0.0
        } else {
            self.memory_hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Memory entries:   {}", self.memory_entries)?;
        writeln!(
            f,
            "Memory hits:      {} ({:.1}%)",
            self.memory_hits,
            self.memory_hit_rate() * 100.0
        )?;
        writeln!(f, "Memory misses:    {}", self.memory_misses)?;
        writeln!(f, "Disk hits:        {}", self.disk_hits)?;
        writeln!(f, "Disk misses:      {}", self.disk_misses)?;
        writeln!(f, "Network fetches:  {}", self.network_fetches)?;
        write!(f, "Network failures: {}", self.network_failures)
    }
}
