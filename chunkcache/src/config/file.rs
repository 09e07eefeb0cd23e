//! Reading and initializing ~/.chunkcache/config.ini.
//!
//! Settings structs live in [`super::settings`], parsing in
//! [`super::parser`], and serialization in [`super::writer`].

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use super::settings::ConfigFile;

/// Errors loading or initializing the config file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Cannot read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Malformed INI in {}: {source}", .path.display())]
    Syntax {
        path: PathBuf,
        source: ini::ParseError,
    },

    #[error("Cannot write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    /// A key parsed but its value is out of range or of the wrong type.
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigFile {
    /// Load `~/.chunkcache/config.ini`, or defaults if it does not exist.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load a config file, overlaying its values on the defaults.
    ///
    /// A missing file is not an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigFileError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let ini = Ini::load_from_str(&content).map_err(|source| ConfigFileError::Syntax {
            path: path.to_path_buf(),
            source,
        })?;
        super::parser::parse_ini(&ini)
    }

    /// Write a commented default config to `path` unless a file is already
    /// there. Parent directories are created as needed.
    ///
    /// Returns true if a file was written.
    pub fn ensure_exists_at(path: &Path) -> Result<bool, ConfigFileError> {
        let write_err = |source: io::Error| ConfigFileError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(write_err(e)),
        };
        file.write_all(super::writer::to_config_string(&Self::default()).as_bytes())
            .map_err(write_err)?;
        Ok(true)
    }
}

/// Path to the config file (~/.chunkcache/config.ini).
pub fn config_file_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".chunkcache")
        .join("config.ini")
}
