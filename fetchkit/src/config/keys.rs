//! Addressable configuration keys.
//!
//! Every setting in the file is a [`ConfigKey`], named `section.key`. The
//! file loader and the CLI both go through [`ConfigKey::set`], so a value is
//! validated the same way whichever way it arrives.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::error::ConfigError;
use super::file::{ConfigFile, SECONDS_PER_DAY};
use crate::cache::DiskFormat;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    CacheDirectory,
    CacheMaxWidth,
    CacheMaxHeight,
    CacheMaxAgeDays,
    CacheDiskFormat,
    CacheJpegQuality,
    CacheDiskEnabled,
    NetworkTimeoutSecs,
    NetworkUserAgent,
    LoggingLevel,
    LoggingDirectory,
}

impl ConfigKey {
    /// Every key, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::CacheDirectory,
            ConfigKey::CacheMaxWidth,
            ConfigKey::CacheMaxHeight,
            ConfigKey::CacheMaxAgeDays,
            ConfigKey::CacheDiskFormat,
            ConfigKey::CacheJpegQuality,
            ConfigKey::CacheDiskEnabled,
            ConfigKey::NetworkTimeoutSecs,
            ConfigKey::NetworkUserAgent,
            ConfigKey::LoggingLevel,
            ConfigKey::LoggingDirectory,
        ]
    }

    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::CacheDirectory
            | ConfigKey::CacheMaxWidth
            | ConfigKey::CacheMaxHeight
            | ConfigKey::CacheMaxAgeDays
            | ConfigKey::CacheDiskFormat
            | ConfigKey::CacheJpegQuality
            | ConfigKey::CacheDiskEnabled => "cache",
            ConfigKey::NetworkTimeoutSecs | ConfigKey::NetworkUserAgent => "network",
            ConfigKey::LoggingLevel | ConfigKey::LoggingDirectory => "logging",
        }
    }

    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::CacheDirectory | ConfigKey::LoggingDirectory => "directory",
            ConfigKey::CacheMaxWidth => "max_width",
            ConfigKey::CacheMaxHeight => "max_height",
            ConfigKey::CacheMaxAgeDays => "max_age_days",
            ConfigKey::CacheDiskFormat => "disk_format",
            ConfigKey::CacheJpegQuality => "jpeg_quality",
            ConfigKey::CacheDiskEnabled => "disk_enabled",
            ConfigKey::NetworkTimeoutSecs => "timeout_secs",
            ConfigKey::NetworkUserAgent => "user_agent",
            ConfigKey::LoggingLevel => "level",
        }
    }

    /// `section.key`.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as written in the file. Empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        fn optional<T: ToString>(value: &Option<T>) -> String {
            value.as_ref().map(ToString::to_string).unwrap_or_default()
        }

        match self {
            ConfigKey::CacheDirectory => config.cache.directory.display().to_string(),
            ConfigKey::CacheMaxWidth => optional(&config.cache.max_width),
            ConfigKey::CacheMaxHeight => optional(&config.cache.max_height),
            ConfigKey::CacheMaxAgeDays => config.cache.max_age_days.to_string(),
            ConfigKey::CacheDiskFormat => config.cache.disk_format.to_string(),
            ConfigKey::CacheJpegQuality => config.cache.jpeg_quality.to_string(),
            ConfigKey::CacheDiskEnabled => config.cache.disk_enabled.to_string(),
            ConfigKey::NetworkTimeoutSecs => config.network.timeout_secs.to_string(),
            ConfigKey::NetworkUserAgent => optional(&config.network.user_agent),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingDirectory => config
                .logging
                .directory
                .as_ref()
                .map(|dir| dir.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Validate `value` and store it. An empty value clears optional keys.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let name = self.name();
        let invalid = |reason: &str| ConfigError::invalid(&name, value, reason);

        match self {
            ConfigKey::CacheDirectory => {
                if value.is_empty() {
                    return Err(invalid("directory must not be empty"));
                }
                config.cache.directory = expand_home(value);
            }
            ConfigKey::CacheMaxWidth => config.cache.max_width = parse_dimension(value, &invalid)?,
            ConfigKey::CacheMaxHeight => {
                config.cache.max_height = parse_dimension(value, &invalid)?
            }
            ConfigKey::CacheMaxAgeDays => {
                let days: u64 = value
                    .parse()
                    .map_err(|_| invalid("expected a whole number of days"))?;
                if days.checked_mul(SECONDS_PER_DAY).is_none() {
                    return Err(invalid("too many days"));
                }
                config.cache.max_age_days = days;
            }
            ConfigKey::CacheDiskFormat => {
                config.cache.disk_format =
                    value.parse::<DiskFormat>().map_err(|e| invalid(e.as_str()))?;
            }
            ConfigKey::CacheJpegQuality => {
                let quality: f32 = value.parse().map_err(|_| invalid("expected a number"))?;
                if !(0.0..=1.0).contains(&quality) {
                    return Err(invalid("must be between 0 and 1"));
                }
                config.cache.jpeg_quality = quality;
            }
            ConfigKey::CacheDiskEnabled => {
                config.cache.disk_enabled =
                    parse_bool(value).ok_or_else(|| invalid("expected true or false"))?;
            }
            ConfigKey::NetworkTimeoutSecs => {
                let secs: u64 = value
                    .parse()
                    .map_err(|_| invalid("expected a whole number of seconds"))?;
                if secs == 0 {
                    return Err(invalid("must be at least 1"));
                }
                config.network.timeout_secs = secs;
            }
            ConfigKey::NetworkUserAgent => {
                config.network.user_agent = (!value.is_empty()).then(|| value.to_string());
            }
            ConfigKey::LoggingLevel => {
                let level = value.to_ascii_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(invalid("expected trace, debug, info, warn or error"));
                }
                config.logging.level = level;
            }
            ConfigKey::LoggingDirectory => {
                config.logging.directory = (!value.is_empty()).then(|| expand_home(value));
            }
        }
        Ok(())
    }
}

fn parse_dimension(
    value: &str,
    invalid: &dyn Fn(&str) -> ConfigError,
) -> Result<Option<u32>, ConfigError> {
    if value.is_empty() {
        return Ok(None);
    }
    match value.parse::<u32>() {
        Ok(0) | Err(_) => Err(invalid("expected a positive number of pixels")),
        Ok(pixels) => Ok(Some(pixels)),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Expand a leading `~` to the home directory.
fn expand_home(value: &str) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(value),
        },
        None => PathBuf::from(value),
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("cache.max_width".parse::<ConfigKey>().unwrap(), ConfigKey::CacheMaxWidth);
        assert_eq!("LOGGING.Level".parse::<ConfigKey>().unwrap(), ConfigKey::LoggingLevel);
        assert!(matches!(
            "cache.size".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_every_key_round_trips_its_name() {
        for key in ConfigKey::all() {
            assert_eq!(key.name().parse::<ConfigKey>().unwrap(), *key);
            assert_eq!(key.to_string(), key.name());
        }
    }

    #[test]
    fn test_set_and_get() {
        let mut config = ConfigFile::default();

        ConfigKey::CacheMaxWidth.set(&mut config, "640").unwrap();
        ConfigKey::CacheDiskFormat.set(&mut config, "JPG").unwrap();
        ConfigKey::CacheDiskEnabled.set(&mut config, "no").unwrap();
        ConfigKey::LoggingLevel.set(&mut config, "Debug").unwrap();

        assert_eq!(ConfigKey::CacheMaxWidth.get(&config), "640");
        assert_eq!(ConfigKey::CacheDiskFormat.get(&config), "jpeg");
        assert_eq!(ConfigKey::CacheDiskEnabled.get(&config), "false");
        assert_eq!(ConfigKey::LoggingLevel.get(&config), "debug");
        assert_eq!(ConfigKey::CacheMaxHeight.get(&config), "");
    }

    #[test]
    fn test_empty_clears_optional() {
        let mut config = ConfigFile::default();
        ConfigKey::NetworkUserAgent.set(&mut config, "agent/2").unwrap();
        ConfigKey::NetworkUserAgent.set(&mut config, "").unwrap();
        assert_eq!(config.network.user_agent, None);

        ConfigKey::CacheMaxWidth.set(&mut config, "10").unwrap();
        ConfigKey::CacheMaxWidth.set(&mut config, " ").unwrap();
        assert_eq!(config.cache.max_width, None);
    }

    #[test]
    fn test_validation() {
        let mut config = ConfigFile::default();
        assert!(ConfigKey::CacheJpegQuality.set(&mut config, "1.5").is_err());
        assert!(ConfigKey::CacheMaxWidth.set(&mut config, "0").is_err());
        assert!(ConfigKey::CacheMaxAgeDays.set(&mut config, "-1").is_err());
        assert!(ConfigKey::CacheMaxAgeDays
            .set(&mut config, "300000000000000")
            .is_err());
        assert!(ConfigKey::NetworkTimeoutSecs.set(&mut config, "0").is_err());
        assert!(ConfigKey::LoggingLevel.set(&mut config, "loud").is_err());
        assert!(ConfigKey::CacheDirectory.set(&mut config, "").is_err());
        assert_eq!(config, ConfigFile::default());
    }
}
