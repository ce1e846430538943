//! INI configuration file.
//!
//! Stored at `<platform config dir>/fetchkit/config.ini`:
//!
//! ```ini
//! [cache]
//! directory = ~/.cache/fetchkit/images
//! max_width = 1024
//! max_height = 1024
//! max_age_days = 30
//! disk_format = png
//! jpeg_quality = 0.9
//! disk_enabled = true
//!
//! [network]
//! timeout_secs = 60
//! user_agent = my-app/1.0
//!
//! [logging]
//! level = info
//! directory = ~/.local/state/fetchkit/logs
//! ```
//!
//! Missing keys keep their defaults; invalid values fail the load.

mod error;
mod file;
mod keys;

pub use error::ConfigError;
pub use file::{
    config_directory, config_file_path, format_size, CacheSettings, ConfigFile, LoggingSettings,
    NetworkSettings, APP_DIR, CONFIG_FILE_NAME,
};
pub use keys::ConfigKey;
