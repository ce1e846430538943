//! FetchKit - client-side networking toolkit
//!
//! This library provides tracked HTTP downloads, a three-tier
//! (memory → disk → network) image cache and a compact thumbnail codec that
//! packs a tiny image preview into a few dozen bytes.
//!
//! # Architecture
//!
//! ```text
//! ImageCache ──► MemoryTier (DashMap)
//!     │
//!     ├──► DiskStore ──► DiskQueue (one serial worker per cache)
//!     │
//!     └──► DownloadManager ──► Transport (reqwest, or MockService in tests)
//!               │
//!               └──► Download / DownloadGroup (progress + completion fan-out)
//!
//! ThumbnailCodec ──► ThumbnailPacket (4-byte header + JPEG scan payload)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use fetchkit::cache::{ImageCache, ImageCacheConfig, LoadPolicy};
//! use fetchkit::download::DownloadManager;
//! use fetchkit::transport::ReqwestTransport;
//!
//! let downloads = DownloadManager::new(Arc::new(ReqwestTransport::new()?));
//! let cache = ImageCache::new(ImageCacheConfig::new(dir), downloads);
//!
//! let mut events = cache.subscribe_key("https://example.com/a.png");
//! if cache.get_image("https://example.com/a.png", LoadPolicy::Network).is_none() {
//!     events.recv().await;
//! }
//! ```

pub mod cache;
pub mod config;
pub mod download;
pub mod logging;
pub mod mock;
pub mod thumbnail;
pub mod transport;

/// Crate version, embedded in the default user agent.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
