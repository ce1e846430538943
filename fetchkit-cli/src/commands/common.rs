//! Helpers shared across commands.

use std::sync::Arc;

use fetchkit::cache::ImageCache;
use fetchkit::config::ConfigFile;
use fetchkit::download::DownloadManager;
use fetchkit::transport::Headers;
use tokio::runtime::Runtime;

use crate::error::CliError;

/// Multi-threaded runtime for one command.
pub fn runtime() -> Result<Runtime, CliError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)
}

/// Download manager over the configured HTTP transport.
pub fn download_manager(config: &ConfigFile) -> Result<DownloadManager, CliError> {
    Ok(DownloadManager::new(Arc::new(config.transport()?)))
}

/// Image cache from the configuration. Must run inside the runtime.
pub fn image_cache(config: &ConfigFile) -> Result<ImageCache, CliError> {
    Ok(ImageCache::new(
        config.cache_config(),
        download_manager(config)?,
    ))
}

/// Parse `Name: Value` header arguments.
pub fn parse_headers(raw: &[String]) -> Result<Headers, CliError> {
    raw.iter()
        .map(|header| {
            let (name, value) = header.split_once(':').ok_or_else(|| {
                CliError::InvalidArgument(format!("header '{}' is not 'Name: Value'", header))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(CliError::InvalidArgument(format!(
                    "header '{}' has no name",
                    header
                )));
            }
            Ok((name.to_string(), value.trim().to_string()))
        })
        .collect()
}
