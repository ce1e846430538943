//! Three-tier image cache.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use md5::{Digest, Md5};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::config::ImageCacheConfig;
use super::disk::DiskStore;
use super::error::CacheError;
use super::events::{CacheEvent, CacheSubscription};
use super::memory::MemoryTier;
use super::process::{self, Decoded};
use super::queue::DiskQueue;
use super::types::{CacheStats, CachedImage, LoadPolicy, ReapResult};
use crate::download::{DownloadManager, DownloadOptions, DownloadStart};
use crate::thumbnail::{ThumbnailCodec, ThumbnailRequest};

#[derive(Debug, Default)]
struct Counters {
    memory_hits: AtomicU64,
    memory_misses: AtomicU64,
    disk_hits: AtomicU64,
    disk_misses: AtomicU64,
    network_fetches: AtomicU64,
    network_failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

struct CacheInner {
    config: ImageCacheConfig,
    memory: MemoryTier,
    disk: DiskStore,
    queue: DiskQueue,
    downloads: DownloadManager,
    events: broadcast::Sender<CacheEvent>,
    counters: Counters,
}

impl CacheInner {
    fn emit(&self, event: CacheEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Insert into memory and announce it.
    fn insert_loaded(&self, key: &str, image: Arc<CachedImage>) {
        self.memory.insert(key, image);
        self.emit(CacheEvent::Loaded {
            key: key.to_string(),
        });
    }

    /// Record a network-path failure and announce it.
    fn fail(&self, key: &str, error: &CacheError) {
        Counters::bump(&self.counters.network_failures);
        warn!(key, error = %error, "Image load failed");
        self.emit(CacheEvent::LoadFailed {
            key: key.to_string(),
            reason: error.to_string(),
        });
    }

    /// Queue a disk job whose only outcome is a log line.
    fn queue_logged<F>(&self, what: &'static str, key: &str, job: F)
    where
        F: FnOnce(&DiskStore) -> Result<(), CacheError> + Send + 'static,
    {
        let disk = self.disk.clone();
        let key = key.to_string();
        let _ = self.queue.run(move || match job(&disk) {
            Ok(()) => debug!(key, what, "Disk job done"),
            Err(e) => warn!(key, what, error = %e, "Disk job failed"),
        });
    }
}

/// Run a reap and log the outcome.
fn reap_logged(disk: &DiskStore, max_age: Duration) -> ReapResult {
    match disk.reap(max_age, SystemTime::now()) {
        Ok(result) => {
            if result.entries_removed > 0 {
                info!(root = %disk.root().display(), "{}", result);
            } else {
                debug!(root = %disk.root().display(), "{}", result);
            }
            result
        }
        Err(e) => {
            warn!(error = %e, "Disk reap failed");
            ReapResult::default()
        }
    }
}

/// Image cache with memory, disk and network tiers.
///
/// Lookups answer synchronously from memory only. Disk and network loads run
/// in the background and report through [`CacheEvent`]s; subscribe before
/// calling [`get_image`](Self::get_image) to be sure to see the result.
///
/// Clones share the same cache. Each cache runs its own serial disk queue,
/// so two caches must not share a directory.
///
/// # Runtime
///
/// Construction and every background load spawn Tokio tasks and must happen
/// inside a Tokio runtime.
#[derive(Clone)]
pub struct ImageCache {
    inner: Arc<CacheInner>,
}

impl ImageCache {
    /// Create a cache and queue a reap of expired disk entries.
    pub fn new(config: ImageCacheConfig, downloads: DownloadManager) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let queue = DiskQueue::spawn();
        let disk = DiskStore::new(&config.directory);

        if config.disk_cache_enabled {
            let reap_disk = disk.clone();
            let max_age = config.max_unused_file_age;
            let _ = queue.run(move || reap_logged(&reap_disk, max_age));
        }

        info!(
            directory = %config.directory.display(),
            disk_enabled = config.disk_cache_enabled,
            format = %config.disk_format,
            "Image cache created"
        );

        Self {
            inner: Arc::new(CacheInner {
                config,
                memory: MemoryTier::new(),
                disk,
                queue,
                downloads,
                events,
                counters: Counters::default(),
            }),
        }
    }

    pub fn config(&self) -> &ImageCacheConfig {
        &self.inner.config
    }

    /// The manager network loads go through.
    pub fn downloads(&self) -> &DownloadManager {
        &self.inner.downloads
    }

    /// Events for every key.
    pub fn subscribe(&self) -> CacheSubscription {
        CacheSubscription::new(self.inner.events.subscribe(), None)
    }

    /// Events for one key.
    pub fn subscribe_key(&self, key: &str) -> CacheSubscription {
        CacheSubscription::new(self.inner.events.subscribe(), Some(key.to_string()))
    }

    /// Look up `key`, escalating as far as `policy` allows.
    ///
    /// Returns the image only if it is already in memory. Otherwise a disk
    /// load (and, for [`LoadPolicy::Network`], a network fetch of `key` as a
    /// URL) starts in the background and the outcome arrives as a
    /// [`CacheEvent`]. A disk miss is silent; only network failures emit
    /// [`CacheEvent::LoadFailed`]. No fetch is started while one for the same
    /// URL is pending.
    pub fn get_image(&self, key: &str, policy: LoadPolicy) -> Option<Arc<CachedImage>> {
        if let Some(image) = self.inner.memory.get(key) {
            Counters::bump(&self.inner.counters.memory_hits);
            return Some(image);
        }
        Counters::bump(&self.inner.counters.memory_misses);

        if policy.allows_disk() {
            let inner = Arc::clone(&self.inner);
            let key = key.to_string();
            tokio::spawn(async move {
                load(&inner, &key, policy).await;
            });
        }
        None
    }

    pub fn available_in_memory(&self, key: &str) -> bool {
        self.inner.memory.contains(key)
    }

    /// Insert an image under `key`, downscaled per configuration.
    ///
    /// With `store_on_disk` the image is also re-encoded to the configured
    /// disk format in the background. Animated images lose their animation
    /// on this path.
    pub fn put_image(
        &self,
        image: DynamicImage,
        key: &str,
        store_on_disk: bool,
    ) -> Arc<CachedImage> {
        let image = match process::downscale(&image, self.inner.config.max_image_dimensions) {
            Some(smaller) => smaller,
            None => image,
        };
        let cached = Arc::new(CachedImage::still(image, None));
        self.inner.insert_loaded(key, Arc::clone(&cached));

        if store_on_disk {
            if self.inner.config.disk_cache_enabled {
                let to_encode = Arc::clone(&cached);
                let format = self.inner.config.disk_format;
                let quality = self.inner.config.jpeg_quality;
                let disk_key = key.to_string();
                self.inner.queue_logged("put", key, move |disk| {
                    let bytes = process::encode_for_disk(&to_encode.image, format, quality)?;
                    disk.write(&disk_key, &bytes)
                });
            } else {
                debug!(key, "Disk cache disabled, image kept in memory only");
            }
        }
        cached
    }

    /// Write raw bytes to the disk entry for `key` without decoding them.
    ///
    /// Does nothing, apart from logging an error, when the disk tier is disabled.
    pub fn store_image(&self, data: impl Into<Bytes>, key: &str) {
        if !self.inner.config.disk_cache_enabled {
            error!(key, error = %CacheError::DiskDisabled, "Cannot store image");
            return;
        }
        let data: Bytes = data.into();
        let disk_key = key.to_string();
        self.inner
            .queue_logged("store", key, move |disk| disk.write(&disk_key, &data));
    }

    /// Drop `key` from memory, and from disk in the background if asked.
    pub fn remove_image(&self, key: &str, remove_from_disk: bool) {
        self.inner.memory.remove(key);
        if remove_from_disk {
            let disk_key = key.to_string();
            self.inner
                .queue_logged("remove", key, move |disk| disk.remove(&disk_key).map(|_| ()));
        }
    }

    /// Drop every memory entry, and every disk file in the background if asked.
    pub fn clear_cache(&self, clear_disk: bool) {
        let dropped = self.inner.memory.clear();
        debug!(dropped, clear_disk, "Image cache cleared");
        if clear_disk {
            self.inner
                .queue_logged("clear", "*", |disk| disk.clear().map(|_| ()));
        }
    }

    /// Respond to memory pressure: drop the memory tier, keep the disk tier.
    ///
    /// Returns the number of entries dropped.
    pub fn handle_memory_pressure(&self) -> usize {
        let dropped = self.inner.memory.clear();
        info!(dropped, "Memory pressure, image memory tier dropped");
        dropped
    }

    /// Delete disk entries unused for longer than the configured age.
    pub async fn reap_expired(&self) -> ReapResult {
        let disk = self.inner.disk.clone();
        let max_age = self.inner.config.max_unused_file_age;
        self.inner
            .queue
            .run(move || reap_logged(&disk, max_age))
            .await
            .unwrap_or_default()
    }

    /// Wait for every disk operation queued so far.
    pub async fn flush(&self) {
        self.inner.queue.flush().await;
    }

    /// `(files, bytes)` in the disk tier.
    pub async fn disk_usage(&self) -> (u64, u64) {
        let disk = self.inner.disk.clone();
        match self.inner.queue.run(move || disk.usage()).await {
            Ok(Ok(usage)) => usage,
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to measure disk cache");
                (0, 0)
            }
            Err(_) => (0, 0),
        }
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.inner.counters;
        CacheStats {
            memory_hits: c.memory_hits.load(Ordering::Relaxed),
            memory_misses: c.memory_misses.load(Ordering::Relaxed),
            disk_hits: c.disk_hits.load(Ordering::Relaxed),
            disk_misses: c.disk_misses.load(Ordering::Relaxed),
            network_fetches: c.network_fetches.load(Ordering::Relaxed),
            network_failures: c.network_failures.load(Ordering::Relaxed),
            memory_entries: self.inner.memory.len(),
        }
    }

    /// Memory key for a thumbnail packet: the hex MD5 of its bytes.
    pub fn cache_key_for_packet(packet: &[u8]) -> String {
        format!("{:x}", Md5::digest(packet))
    }

    /// Decode a thumbnail packet through the memory tier.
    ///
    /// Thumbnails are never written to disk.
    pub async fn thumbnail(
        &self,
        packet: &[u8],
        codec: &ThumbnailCodec,
        request: ThumbnailRequest,
    ) -> Option<Arc<CachedImage>> {
        let key = Self::cache_key_for_packet(packet);
        if let Some(image) = self.inner.memory.get(&key) {
            Counters::bump(&self.inner.counters.memory_hits);
            return Some(image);
        }
        Counters::bump(&self.inner.counters.memory_misses);

        let codec = codec.clone();
        let packet = packet.to_vec();
        let image = tokio::task::spawn_blocking(move || codec.decode(&packet, &request))
            .await
            .ok()
            .flatten()?;

        let cached = Arc::new(CachedImage::still(image, Some(ImageFormat::Jpeg)));
        self.inner.insert_loaded(&key, Arc::clone(&cached));
        Some(cached)
    }
}

/// Background part of a lookup: disk, then network if allowed.
async fn load(inner: &Arc<CacheInner>, key: &str, policy: LoadPolicy) {
    if inner.config.disk_cache_enabled {
        if let Some(image) = load_from_disk(inner, key).await {
            inner.insert_loaded(key, image);
            let disk_key = key.to_string();
            inner.queue_logged("touch", key, move |disk| disk.touch(&disk_key));
            return;
        }
    }

    if policy.allows_network() {
        load_from_network(inner, key).await;
    }
}

async fn load_from_disk(inner: &CacheInner, key: &str) -> Option<Arc<CachedImage>> {
    let disk = inner.disk.clone();
    let disk_key = key.to_string();
    let bytes = match inner.queue.run(move || disk.read(&disk_key)).await {
        Ok(Ok(Some(bytes))) => bytes,
        Ok(Ok(None)) => {
            Counters::bump(&inner.counters.disk_misses);
            debug!(key, "Disk miss");
            return None;
        }
        Ok(Err(e)) => {
            Counters::bump(&inner.counters.disk_misses);
            warn!(key, error = %e, "Disk read failed, treating as miss");
            return None;
        }
        Err(_) => return None,
    };

    let gif = process::is_gif_url(key) || process::is_gif_data(&bytes);
    let decoded = tokio::task::spawn_blocking(move || {
        if gif {
            process::decode_gif(&bytes)
        } else {
            process::decode_raster(&bytes)
        }
    })
    .await;

    match decoded {
        Ok(Ok(image)) => {
            Counters::bump(&inner.counters.disk_hits);
            debug!(key, "Disk hit");
            Some(Arc::new(image))
        }
        Ok(Err(e)) => {
            Counters::bump(&inner.counters.disk_misses);
            warn!(key, error = %e, "Disk entry unreadable, treating as miss");
            None
        }
        Err(e) => {
            warn!(key, error = %e, "Disk decode task failed");
            None
        }
    }
}

async fn load_from_network(inner: &CacheInner, key: &str) {
    let download = match inner.downloads.download_unique(key, DownloadOptions::new()) {
        DownloadStart::Started(download) => download,
        DownloadStart::AlreadyPending(_) => {
            debug!(key, "Fetch already pending");
            return;
        }
    };
    Counters::bump(&inner.counters.network_fetches);

    let response = match download.wait().await {
        Ok(response) => response,
        Err(e) => {
            inner.fail(key, &CacheError::from(e));
            return;
        }
    };

    let content_type = response.content_type().map(str::to_string);
    let body = response.body.clone();
    let max = inner.config.max_image_dimensions;

    let decode_body = body.clone();
    let decode_type = content_type.clone();
    let decoded = tokio::task::spawn_blocking(move || {
        process::decode_response(&decode_body, decode_type.as_deref(), max)
    })
    .await;

    let Decoded { image, resized } = match decoded {
        Ok(Ok(decoded)) => decoded,
        Ok(Err(e)) => {
            inner.fail(key, &e);
            return;
        }
        Err(e) => {
            inner.fail(key, &CacheError::Task(e.to_string()));
            return;
        }
    };

    let image = Arc::new(image);
    inner.insert_loaded(key, Arc::clone(&image));
    debug!(key, resized, "Network load complete");

    if inner.config.disk_cache_enabled {
        let format = inner.config.disk_format;
        let quality = inner.config.jpeg_quality;
        let disk_key = key.to_string();
        inner.queue_logged("write", key, move |disk| {
            let bytes = process::disk_bytes(
                &body,
                content_type.as_deref(),
                &image,
                resized,
                format,
                quality,
            )?;
            disk.write(&disk_key, &bytes)
        });
    }
}

impl fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageCache")
            .field("directory", &self.inner.config.directory)
            .field("memory_entries", &self.inner.memory.len())
            .field("disk_enabled", &self.inner.config.disk_cache_enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use filetime::FileTime;
    use tempfile::TempDir;

    use crate::cache::config::DiskFormat;
    use crate::cache::disk::cache_file_name;
    use crate::mock::{MockContent, MockMapping, MockService};

    const WAIT: Duration = Duration::from_secs(5);

    fn png(width: u32, height: u32) -> Vec<u8> {
        process::encode_for_disk(&DynamicImage::new_rgb8(width, height), DiskFormat::Png, 0.9)
            .unwrap()
    }

    fn service() -> MockService {
        let service = MockService::new()
            .with_latency(Duration::from_millis(30), Duration::from_millis(30));
        service.register(
            MockMapping::new("GET", "/img.png")
                .success(MockContent::bytes("image/png", png(64, 32))),
        );
        service.register(
            MockMapping::new("GET", "/broken.png")
                .success(MockContent::bytes("image/png", b"garbage".to_vec())),
        );
        service
    }

    fn cache_with(
        dir: &TempDir,
        service: &MockService,
        config: impl FnOnce(ImageCacheConfig) -> ImageCacheConfig,
    ) -> ImageCache {
        let downloads = DownloadManager::new(Arc::new(service.clone()));
        ImageCache::new(config(ImageCacheConfig::new(dir.path())), downloads)
    }

    async fn next(sub: &mut CacheSubscription) -> CacheEvent {
        tokio::time::timeout(WAIT, sub.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_memory_policy_never_loads() {
        let dir = TempDir::new().unwrap();
        let service = service();
        let cache = cache_with(&dir, &service, |c| c);
        cache.store_image(png(4, 4), "http://x/img.png");
        cache.flush().await;

        let mut events = cache.subscribe();
        assert!(cache.get_image("http://x/img.png", LoadPolicy::Memory).is_none());
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(events.try_recv().is_none());
        assert_eq!(service.total_requests(), 0);
        assert!(!cache.available_in_memory("http://x/img.png"));
    }

    #[tokio::test]
    async fn test_disk_policy_loads_from_disk_only() {
        let dir = TempDir::new().unwrap();
        let service = service();
        let cache = cache_with(&dir, &service, |c| c);
        cache.store_image(png(5, 3), "http://x/stored.png");
        cache.flush().await;

        let mut events = cache.subscribe_key("http://x/stored.png");
        assert!(cache.get_image("http://x/stored.png", LoadPolicy::Disk).is_none());
        assert!(next(&mut events).await.is_loaded());

        let image = cache.get_image("http://x/stored.png", LoadPolicy::Memory).unwrap();
        assert_eq!((image.width(), image.height()), (5, 3));
        assert_eq!(service.total_requests(), 0);
        assert_eq!(cache.stats().disk_hits, 1);
    }

    #[tokio::test]
    async fn test_disk_miss_is_silent_without_network() {
        let dir = TempDir::new().unwrap();
        let service = service();
        let cache = cache_with(&dir, &service, |c| c);

        let mut events = cache.subscribe();
        assert!(cache.get_image("http://x/img.png", LoadPolicy::Disk).is_none());
        tokio::time::sleep(Duration::from_millis(100)).await;
        cache.flush().await;

        assert!(events.try_recv().is_none());
        assert_eq!(service.total_requests(), 0);
        assert_eq!(cache.stats().disk_misses, 1);
    }

    #[tokio::test]
    async fn test_network_fetch_fills_memory_and_disk() {
        let dir = TempDir::new().unwrap();
        let service = service();
        let cache = cache_with(&dir, &service, |c| c);
        let url = "http://x/img.png";

        let mut events = cache.subscribe_key(url);
        assert!(cache.get_image(url, LoadPolicy::Network).is_none());
        assert_eq!(next(&mut events).await, CacheEvent::Loaded { key: url.to_string() });

        assert!(cache.get_image(url, LoadPolicy::Memory).is_some());
        cache.flush().await;

        // PNG response with PNG disk format is written through unchanged
        let on_disk = std::fs::read(dir.path().join(cache_file_name(url))).unwrap();
        assert_eq!(on_disk, png(64, 32));
        assert_eq!(cache.stats().network_fetches, 1);
    }

    #[tokio::test]
    async fn test_network_fetch_reencodes_when_resized() {
        let dir = TempDir::new().unwrap();
        let service = service();
        let cache = cache_with(&dir, &service, |c| {
            c.with_max_image_dimensions(16, 16)
                .with_disk_format(DiskFormat::Jpeg)
        });
        let url = "http://x/img.png";

        let mut events = cache.subscribe_key(url);
        cache.get_image(url, LoadPolicy::Network);
        next(&mut events).await;

        let image = cache.get_image(url, LoadPolicy::Memory).unwrap();
        assert_eq!((image.width(), image.height()), (16, 8));

        cache.flush().await;
        let on_disk = std::fs::read(dir.path().join(cache_file_name(url))).unwrap();
        assert_eq!(image::guess_format(&on_disk).unwrap(), ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn test_concurrent_misses_fetch_once() {
        let dir = TempDir::new().unwrap();
        let service = service();
        let cache = cache_with(&dir, &service, |c| c.with_disk_cache(false));
        let url = "http://x/img.png";

        let mut events = cache.subscribe_key(url);
        cache.get_image(url, LoadPolicy::Network);
        cache.get_image(url, LoadPolicy::Network);
        next(&mut events).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(service.request_count("/img.png"), 1);
    }

    #[tokio::test]
    async fn test_failures_emit_load_failed() {
        let dir = TempDir::new().unwrap();
        let service = service();
        let cache = cache_with(&dir, &service, |c| c);

        let mut events = cache.subscribe();
        cache.get_image("http://x/missing.png", LoadPolicy::Network);
        cache.get_image("http://x/broken.png", LoadPolicy::Network);

        let mut failed = Vec::new();
        for _ in 0..2 {
            match next(&mut events).await {
                CacheEvent::LoadFailed { key, .. } => failed.push(key),
                other => panic!("unexpected event {other:?}"),
            }
        }
        failed.sort();
        assert_eq!(failed, vec!["http://x/broken.png", "http://x/missing.png"]);

        cache.flush().await;
        assert!(!cache.available_in_memory("http://x/broken.png"));
        assert_eq!(cache.disk_usage().await, (0, 0));
        assert_eq!(cache.stats().network_failures, 2);
    }

    #[tokio::test]
    async fn test_put_image_downscales_and_stores() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with(&dir, &service(), |c| c.with_max_image_dimensions(10, 10));

        let mut events = cache.subscribe_key("local");
        let cached = cache.put_image(DynamicImage::new_rgb8(40, 20), "local", true);
        assert_eq!((cached.width(), cached.height()), (10, 5));
        assert!(next(&mut events).await.is_loaded());

        cache.flush().await;
        let on_disk = std::fs::read(dir.path().join(cache_file_name("local"))).unwrap();
        assert_eq!(image::guess_format(&on_disk).unwrap(), ImageFormat::Png);
    }

    #[tokio::test]
    async fn test_store_image_requires_disk() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with(&dir, &service(), |c| c.with_disk_cache(false));

        cache.store_image(vec![1, 2, 3], "k");
        cache.flush().await;

        assert_eq!(cache.disk_usage().await, (0, 0));
        assert!(!cache.available_in_memory("k"));
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with(&dir, &service(), |c| c);
        cache.put_image(DynamicImage::new_rgb8(2, 2), "a", true);
        cache.put_image(DynamicImage::new_rgb8(2, 2), "b", true);
        cache.flush().await;
        assert_eq!(cache.disk_usage().await.0, 2);

        cache.remove_image("a", false);
        cache.flush().await;
        assert!(!cache.available_in_memory("a"));
        assert_eq!(cache.disk_usage().await.0, 2);

        cache.remove_image("a", true);
        cache.flush().await;
        assert_eq!(cache.disk_usage().await.0, 1);

        cache.clear_cache(true);
        cache.flush().await;
        assert!(!cache.available_in_memory("b"));
        assert_eq!(cache.disk_usage().await, (0, 0));
    }

    #[tokio::test]
    async fn test_memory_pressure_keeps_disk() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with(&dir, &service(), |c| c);
        cache.put_image(DynamicImage::new_rgb8(2, 2), "a", true);
        cache.flush().await;

        assert_eq!(cache.handle_memory_pressure(), 1);
        assert!(!cache.available_in_memory("a"));
        assert_eq!(cache.disk_usage().await.0, 1);
    }

    #[tokio::test]
    async fn test_disk_hit_touches_mtime() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with(&dir, &service(), |c| c);
        cache.store_image(png(2, 2), "k");
        cache.flush().await;

        let path = dir.path().join(cache_file_name("k"));
        let old = SystemTime::now() - Duration::from_secs(10 * 24 * 3600);
        filetime::set_file_mtime(&path, FileTime::from_system_time(old)).unwrap();

        let mut events = cache.subscribe_key("k");
        cache.get_image("k", LoadPolicy::Disk);
        next(&mut events).await;
        cache.flush().await;

        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert!(modified > old + Duration::from_secs(24 * 3600));
    }

    #[tokio::test]
    async fn test_reap_expired() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with(&dir, &service(), |c| {
            c.with_max_unused_file_age(Duration::from_secs(3600))
        });
        cache.store_image(vec![0u8; 100], "old");
        cache.store_image(vec![0u8; 50], "new");
        cache.flush().await;

        let old = SystemTime::now() - Duration::from_secs(7200);
        filetime::set_file_mtime(
            dir.path().join(cache_file_name("old")),
            FileTime::from_system_time(old),
        )
        .unwrap();

        let result = cache.reap_expired().await;
        assert_eq!(result.entries_removed, 1);
        assert_eq!(result.bytes_freed, 100);
        assert_eq!(cache.disk_usage().await, (1, 50));
    }

    #[tokio::test]
    async fn test_thumbnail_is_cached_by_packet() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with(&dir, &service(), |c| c);
        let codec = ThumbnailCodec::new();
        codec.register_header(1, ThumbnailCodec::donor_header(0.5).unwrap());
        let packet = codec
            .encode(&DynamicImage::new_rgb8(120, 80), 1, 0.5)
            .unwrap();

        let key = ImageCache::cache_key_for_packet(&packet);
        assert_eq!(key.len(), 32);

        let request = ThumbnailRequest::new(60, 60);
        let first = cache.thumbnail(&packet, &codec, request).await.unwrap();
        assert!(first.width() <= 60 && first.height() <= 60);
        assert!(cache.available_in_memory(&key));

        let second = cache.thumbnail(&packet, &codec, request).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        cache.flush().await;
        assert_eq!(cache.disk_usage().await, (0, 0));
    }

    #[tokio::test]
    async fn test_bad_thumbnail_is_none() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with(&dir, &service(), |c| c);
        let codec = ThumbnailCodec::new();

        assert!(cache
            .thumbnail(&[2, 1, 8, 8], &codec, ThumbnailRequest::new(8, 8))
            .await
            .is_none());
    }
}
