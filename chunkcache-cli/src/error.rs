//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use chunkcache::cache::StoreError;
use chunkcache::config::{ConfigFileError, SizeParseError};

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be read or written
    Config(ConfigFileError),
    /// A command-line argument was out of range
    InvalidArgument(String),
    /// A size argument could not be parsed
    InvalidSize(SizeParseError),
    /// The cache could not be created
    Store(StoreError),
    /// The async runtime could not be started
    Runtime(std::io::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Config(ConfigFileError::InvalidValue { .. }) => {
                eprintln!();
                eprintln!("Fix the value in your config file, or regenerate it with:");
                eprintln!("  chunkcache config init");
                eprintln!("Config file: {}", chunkcache::config::config_file_path().display());
            }
            CliError::LoggingInit(_) => {
                eprintln!();
                eprintln!("Check that the [logging] directory in config.ini is writable.");
            }
            _ => {}
        }

        let code = match self {
            CliError::InvalidArgument(_) | CliError::InvalidSize(_) => 2,
            _ => 1,
        };
        process::exit(code)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::InvalidSize(e) => write!(f, "{}", e),
            CliError::Store(e) => write!(f, "Failed to create cache: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::InvalidSize(e) => Some(e),
            CliError::Store(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<SizeParseError> for CliError {
    fn from(e: SizeParseError) -> Self {
        CliError::InvalidSize(e)
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e)
    }
}
