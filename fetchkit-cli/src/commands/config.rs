//! Config command - inspect and edit `config.ini`.

use clap::Subcommand;
use console::style;
use fetchkit::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show settings, optionally only one section (cache, network, logging)
    Show { section: Option<String> },

    /// Print one value, e.g. `cache.max_age_days`
    Get { key: String },

    /// Change one value; an empty value clears optional keys
    Set { key: String, value: String },

    /// Restore one key to its default
    Unset { key: String },

    /// Print where the configuration file lives
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show { section } => show(section.as_deref()),
        ConfigCommands::Get { key } => {
            let key = lookup(&key)?;
            println!("{}", key.get(&ConfigFile::load()?));
            Ok(())
        }
        ConfigCommands::Set { key, value } => update(lookup(&key)?, &value),
        ConfigCommands::Unset { key } => {
            let key = lookup(&key)?;
            update(key, &key.get(&ConfigFile::default()))
        }
        ConfigCommands::Path => {
            let path = config_file_path();
            let note = if path.exists() { "" } else { " (not created yet)" };
            println!("{}{}", path.display(), note);
            Ok(())
        }
    }
}

fn lookup(name: &str) -> Result<ConfigKey, CliError> {
    name.parse().map_err(|_| {
        let known: Vec<String> = ConfigKey::all().iter().map(ConfigKey::name).collect();
        CliError::Config(format!("no key '{}'; known keys: {}", name, known.join(", ")))
    })
}

fn update(key: ConfigKey, value: &str) -> Result<(), CliError> {
    let mut config = ConfigFile::load()?;
    let before = key.get(&config);
    key.set(&mut config, value)?;
    let after = key.get(&config);
    if before == after {
        println!("{} unchanged", key);
        return Ok(());
    }
    config.save()?;
    println!("{}: {} -> {}", key, display_value(&before), display_value(&after));
    Ok(())
}

fn show(only: Option<&str>) -> Result<(), CliError> {
    let sections = sections();
    if let Some(name) = only {
        if !sections.iter().any(|s| *s == name) {
            return Err(CliError::InvalidArgument(format!(
                "no section '{}'; sections: {}",
                name,
                sections.join(", ")
            )));
        }
    }

    let config = ConfigFile::load()?;
    let defaults = ConfigFile::default();
    for section in sections {
        if only.is_some_and(|o| o != section) {
            continue;
        }
        println!("{}", style(format!("[{}]", section)).bold());
        for row in section_rows(&config, &defaults, section) {
            let marker = if row.customized { style("*").cyan() } else { style(" ") };
            println!("{} {:<14} {}", marker, row.name, display_value(&row.value));
        }
        println!();
    }
    println!("{} differs from the default", style("*").cyan());
    Ok(())
}

/// Section names in file order.
fn sections() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = Vec::new();
    for key in ConfigKey::all() {
        if !names.contains(&key.section()) {
            names.push(key.section());
        }
    }
    names
}

#[derive(Debug, PartialEq)]
struct Row {
    name: &'static str,
    value: String,
    customized: bool,
}

fn section_rows(config: &ConfigFile, defaults: &ConfigFile, section: &str) -> Vec<Row> {
    ConfigKey::all()
        .iter()
        .filter(|key| key.section() == section)
        .map(|key| {
            let value = key.get(config);
            Row {
                name: key.key_name(),
                customized: value != key.get(defaults),
                value,
            }
        })
        .collect()
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "(unset)"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_in_file_order() {
        assert_eq!(sections(), vec!["cache", "network", "logging"]);
    }

    #[test]
    fn test_rows_mark_customized_values() {
        let defaults = ConfigFile::default();
        let mut config = ConfigFile::default();
        ConfigKey::NetworkTimeoutSecs.set(&mut config, "7").unwrap();

        let rows = section_rows(&config, &defaults, "network");
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            Row {
                name: "timeout_secs",
                value: "7".to_string(),
                customized: true,
            }
        );
        assert!(!rows[1].customized);
        assert!(section_rows(&config, &defaults, "cache")
            .iter()
            .all(|row| !row.customized));
    }

    #[test]
    fn test_unknown_key_lists_known_keys() {
        let err = lookup("cache.size").unwrap_err().to_string();
        assert!(err.contains("cache.max_age_days"));
        assert!(lookup("Cache.Max_Width").is_ok());
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(""), "(unset)");
        assert_eq!(display_value("jpeg"), "jpeg");
    }
}
