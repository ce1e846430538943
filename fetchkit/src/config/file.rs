//! The INI configuration file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use tracing::{debug, info};

use super::error::ConfigError;
use super::keys::ConfigKey;
use crate::cache::{
    DiskFormat, ImageCacheConfig, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_UNUSED_FILE_AGE,
    DEFAULT_SUBPATH,
};
use crate::logging::LogConfig;
use crate::transport::{ReqwestTransport, TransportError, DEFAULT_TIMEOUT_SECS};

/// Directory name under the platform config and cache directories.
pub const APP_DIR: &str = "fetchkit";

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "config.ini";

pub(crate) const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// `<platform config dir>/fetchkit`.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

/// `<platform config dir>/fetchkit/config.ini`.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

/// Human-readable byte size, e.g. `1.5 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub directory: PathBuf,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub max_age_days: u64,
    pub disk_format: DiskFormat,
    pub jpeg_quality: f32,
    pub disk_enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: ImageCacheConfig::default_directory(
                Path::new(APP_DIR).join(DEFAULT_SUBPATH),
            ),
            max_width: None,
            max_height: None,
            max_age_days: DEFAULT_MAX_UNUSED_FILE_AGE.as_secs() / SECONDS_PER_DAY,
            disk_format: DiskFormat::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            disk_enabled: true,
        }
    }
}

/// `[network]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub timeout_secs: u64,
    /// `None` uses the crate's default user agent.
    pub user_agent: Option<String>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: None,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Log file directory. `None` logs to the console only.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// Parsed configuration file. Missing keys keep their defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub network: NetworkSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from [`config_file_path`]. A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let ini = Ini::load_from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|section| section.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini
    }

    /// Save to [`config_file_path`].
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating its parent directory.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
        info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Image cache configuration from the `[cache]` section.
    pub fn cache_config(&self) -> ImageCacheConfig {
        let cache = &self.cache;
        let max_age = Duration::from_secs(cache.max_age_days.saturating_mul(SECONDS_PER_DAY));
        let mut config = ImageCacheConfig::new(&cache.directory)
            .with_max_unused_file_age(max_age)
            .with_disk_format(cache.disk_format)
            .with_jpeg_quality(cache.jpeg_quality)
            .with_disk_cache(cache.disk_enabled);
        // A single bound leaves the other axis unconstrained
        if cache.max_width.is_some() || cache.max_height.is_some() {
            config = config.with_max_image_dimensions(
                cache.max_width.unwrap_or(u32::MAX),
                cache.max_height.unwrap_or(u32::MAX),
            );
        }
        config
    }

    /// HTTP transport from the `[network]` section.
    pub fn transport(&self) -> Result<ReqwestTransport, TransportError> {
        let timeout = Duration::from_secs(self.network.timeout_secs);
        match &self.network.user_agent {
            Some(agent) => ReqwestTransport::with_options(timeout, agent),
            None => ReqwestTransport::with_timeout(timeout),
        }
    }

    /// Logging setup from the `[logging]` section.
    pub fn log_config(&self) -> LogConfig {
        let config = LogConfig::new(&self.logging.level);
        match &self.logging.directory {
            Some(dir) => config.with_file(dir),
            None => config,
        }
    }
}
