//! Get command - look up one image through the cache.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fetchkit::cache::{CacheEvent, CachedImage, ImageCache, LoadPolicy};
use fetchkit::config::ConfigFile;
use tracing::debug;

use super::common;
use crate::error::CliError;

/// Extra wait on top of the network timeout for decode and events.
const EVENT_SLACK: Duration = Duration::from_secs(5);

/// Run the get command.
pub fn run(url: &str, policy: LoadPolicy, out: Option<PathBuf>) -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    let runtime = common::runtime()?;
    runtime.block_on(async {
        let cache = common::image_cache(&config)?;
        // A disk miss is silent, so only a network lookup deserves the full timeout
        let wait = match policy {
            LoadPolicy::Network => Duration::from_secs(config.network.timeout_secs) + EVENT_SLACK,
            LoadPolicy::Memory | LoadPolicy::Disk => EVENT_SLACK,
        };
        let result = lookup(&cache, url, policy, wait).await;
        // Let queued disk writes land before the process exits
        cache.flush().await;
        let image = result?;

        println!(
            "{} {}x{} ({} frame{})",
            url,
            image.width(),
            image.height(),
            image.frame_count(),
            if image.frame_count() == 1 { "" } else { "s" }
        );

        if let Some(path) = out {
            image
                .image
                .save(&path)
                .map_err(|e| CliError::Image(format!("{}: {}", path.display(), e)))?;
            println!("Saved to {}", path.display());
        }
        Ok::<(), CliError>(())
    })
}

async fn lookup(
    cache: &ImageCache,
    url: &str,
    policy: LoadPolicy,
    wait: Duration,
) -> Result<Arc<CachedImage>, CliError> {
    debug!(url, %policy, "Cache lookup");
    let mut events = cache.subscribe_key(url);
    if let Some(image) = cache.get_image(url, policy) {
        return Ok(image);
    }
    let not_found =
        || CliError::Download(format!("{} is not available with policy '{}'", url, policy));
    if policy == LoadPolicy::Memory {
        return Err(not_found());
    }

    match tokio::time::timeout(wait, events.recv()).await {
        Ok(Some(CacheEvent::Loaded { .. })) => {
            cache.get_image(url, LoadPolicy::Memory).ok_or_else(not_found)
        }
        Ok(Some(CacheEvent::LoadFailed { reason, .. })) => {
            Err(CliError::Download(format!("{}: {}", url, reason)))
        }
        Ok(None) | Err(_) => Err(not_found()),
    }
}
