//! Three-tier image cache.
//!
//! This module provides:
//! - [`ImageCache`]: memory, disk and network tiers behind one lookup
//! - [`LoadPolicy`]: how far a lookup may escalate on a miss
//! - [`CacheEvent`] / [`CacheSubscription`]: completion of background loads
//!
//! # Architecture
//!
//! ```text
//! get_image(key, policy)
//!     │
//!     ├── memory hit ──► Some(image)
//!     │
//!     └── miss ──► None, then in the background:
//!             ├── DiskQueue ──► DiskStore::read ──► decode ──► Loaded
//!             └── DownloadManager::download_unique ──► decode ──► Loaded
//!                                                        └──► DiskQueue write
//! ```
//!
//! Disk entries live directly under the configured directory, one file per
//! key named by the key's MD5. Every disk operation of a cache is serialized
//! through one queue, so a write is always visible to a later read.

mod config;
mod disk;
mod error;
mod events;
mod image_cache;
mod memory;
mod process;
mod queue;
mod types;

pub use config::{
    DiskFormat, ImageCacheConfig, DEFAULT_EVENT_CAPACITY, DEFAULT_JPEG_QUALITY,
    DEFAULT_MAX_UNUSED_FILE_AGE, DEFAULT_SUBPATH,
};
pub use disk::cache_file_name;
pub use error::CacheError;
pub use events::{CacheEvent, CacheSubscription};
pub use image_cache::ImageCache;
pub use process::{
    decode_gif, decode_raster, decode_response, disk_bytes, downscale, encode_for_disk,
    is_gif_content_type, is_gif_data, is_gif_url, Decoded,
};
pub use types::{CacheStats, CachedImage, LoadPolicy, ReapResult};
