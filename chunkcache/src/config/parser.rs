//! INI parsing: `Ini` → `ConfigFile`.
//!
//! The single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::time::Duration;

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("capacity") {
            let capacity = parse_size(v).map_err(|_| {
                invalid(
                    "cache",
                    "capacity",
                    v,
                    "expected format like '2GB', '500MB', or '1024KB'",
                )
            })?;
            if capacity == 0 {
                return Err(invalid("cache", "capacity", v, "must be greater than zero"));
            }
            config.cache.capacity = capacity;
        }
    }

    // [cost] section
    if let Some(section) = ini.section(Some("cost")) {
        if let Some(v) = section.get("recency_half_life_secs") {
            let secs = parse_f64("cost", "recency_half_life_secs", v)?;
            config.cost.recency_half_life = Duration::try_from_secs_f64(secs)
                .ok()
                .filter(|d| !d.is_zero())
                .ok_or_else(|| {
                    invalid(
                        "cost",
                        "recency_half_life_secs",
                        v,
                        "must be a positive number of seconds",
                    )
                })?;
        }
        if let Some(v) = section.get("frequency_weight") {
            config.cost.frequency_weight = parse_weight("cost", "frequency_weight", v)?;
        }
        if let Some(v) = section.get("cost_weight") {
            config.cost.cost_weight = parse_weight("cost", "cost_weight", v)?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_f64(section: &str, key: &str, v: &str) -> Result<f64, ConfigFileError> {
    v.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| invalid(section, key, v, "expected a number"))
}

fn parse_weight(section: &str, key: &str, v: &str) -> Result<f64, ConfigFileError> {
    let weight = parse_f64(section, key, v)?;
    if weight < 0.0 {
        return Err(invalid(section, key, v, "must not be negative"));
    }
    Ok(weight)
}

/// Expand a leading `~` to the home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::DEFAULT_CACHE_CAPACITY;
    use tempfile::TempDir;

    fn load(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");
        std::fs::write(&path, content).unwrap();
        ConfigFile::load_from(&path)
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = load(
            r#"
[cost]
frequency_weight = 0.5
"#,
        )
        .unwrap();

        assert_eq!(config.cost.frequency_weight, 0.5);
        assert_eq!(config.cache.capacity, DEFAULT_CACHE_CAPACITY);
        assert_eq!(config.cost.recency_half_life, Duration::from_secs(60));
    }

    #[test]
    fn test_human_readable_capacity() {
        let config = load("[cache]\ncapacity = 2GB\n").unwrap();
        assert_eq!(config.cache.capacity, 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_capacity() {
        let err = load("[cache]\ncapacity = lots\n").unwrap_err();
        assert!(err.to_string().contains("cache.capacity"));

        let err = load("[cache]\ncapacity = 0\n").unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_fractional_half_life() {
        let config = load("[cost]\nrecency_half_life_secs = 2.5\n").unwrap();
        assert_eq!(config.cost.recency_half_life, Duration::from_millis(2500));
    }

    #[test]
    fn test_invalid_cost_values() {
        assert!(load("[cost]\nrecency_half_life_secs = 0\n").is_err());
        assert!(load("[cost]\nrecency_half_life_secs = -3\n").is_err());
        assert!(load("[cost]\nfrequency_weight = -1\n").is_err());
        assert!(load("[cost]\ncost_weight = NaN\n").is_err());
        assert!(load("[cost]\ncost_weight = heavy\n").is_err());
    }

    #[test]
    fn test_logging_section() {
        let config = load("[logging]\ndirectory = /var/log/chunkcache\nfile = cc.log\n").unwrap();

        assert_eq!(config.logging.directory, PathBuf::from("/var/log/chunkcache"));
        assert_eq!(config.logging.file, "cc.log");
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/logs");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("logs"));
        }
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }
}
