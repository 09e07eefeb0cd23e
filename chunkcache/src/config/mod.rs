//! User configuration.
//!
//! Configuration lives in `~/.chunkcache/config.ini`:
//!
//! ```ini
//! [cache]
//! capacity = 512MB
//!
//! [cost]
//! recency_half_life_secs = 60
//! frequency_weight = 1.0
//! cost_weight = 1.0
//!
//! [logging]
//! directory = logs
//! file = chunkcache.log
//! ```
//!
//! Missing files and missing keys fall back to defaults.
//!
//! # Example
//!
//! ```
//! use chunkcache::cache::Store;
//! use chunkcache::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! let store: Store<Vec<u8>> =
//!     Store::with_cost_model(config.cache.capacity, config.cost.to_cost_model()).unwrap();
//! assert_eq!(store.capacity_bytes(), 512 * 1024 * 1024);
//! ```

mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use file::{config_file_path, ConfigFileError};
pub use settings::{
    CacheSettings, ConfigFile, CostSettings, LoggingSettings, DEFAULT_CACHE_CAPACITY,
};
pub use size::{format_size, parse_size, Size, SizeParseError};
