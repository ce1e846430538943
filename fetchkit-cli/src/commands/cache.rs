//! Cache management CLI commands.

use clap::Subcommand;
use fetchkit::config::{format_size, ConfigFile};

use super::common;
use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Clear the disk cache, removing all cached images
    Clear,
    /// Remove disk entries unused for longer than the configured age
    Reap,
    /// Show disk cache statistics
    Stats,
}

/// Run a cache subcommand.
pub fn run(action: CacheAction) -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    let runtime = common::runtime()?;

    runtime.block_on(async {
        let cache = common::image_cache(&config)?;
        // The constructor queues a reap; let it finish before measuring
        cache.flush().await;
        let cache_dir = &config.cache.directory;

        match action {
            CacheAction::Clear => {
                println!("Clearing disk cache at: {}", cache_dir.display());
                let (files, bytes) = cache.disk_usage().await;
                cache.clear_cache(true);
                cache.flush().await;
                println!("Deleted {} files, freed {}", files, format_size(bytes));
            }
            CacheAction::Reap => {
                println!(
                    "Reaping entries unused for {} days at: {}",
                    config.cache.max_age_days,
                    cache_dir.display()
                );
                let result = cache.reap_expired().await;
                println!(
                    "Removed {} files, freed {}",
                    result.entries_removed,
                    format_size(result.bytes_freed)
                );
            }
            CacheAction::Stats => {
                let (files, bytes) = cache.disk_usage().await;
                println!("Disk cache: {}", cache_dir.display());
                println!("  Enabled: {}", config.cache.disk_enabled);
                println!("  Format:  {}", config.cache.disk_format);
                println!("  Files:   {}", files);
                println!("  Size:    {}", format_size(bytes));
            }
        }
        Ok::<(), CliError>(())
    })
}
