//! Settings structs for each section of the config file, with defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{
    BlendedCost, DEFAULT_COST_WEIGHT, DEFAULT_FREQUENCY_WEIGHT, DEFAULT_RECENCY_HALF_LIFE,
};
use crate::logging::{default_log_dir, default_log_file};

/// Default cache capacity (512 MB).
pub const DEFAULT_CACHE_CAPACITY: u64 = 512 * 1024 * 1024;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub cost: CostSettings,
    pub logging: LoggingSettings,
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Byte budget for cached chunk results.
    pub capacity: u64,
}

/// `[cost]` section: eviction scoring weights.
#[derive(Debug, Clone, PartialEq)]
pub struct CostSettings {
    /// Idle time after which the recency factor halves.
    pub recency_half_life: Duration,
    /// Weight of the access-count factor.
    pub frequency_weight: f64,
    /// Weight of the compute-time factor.
    pub cost_weight: f64,
}

impl CostSettings {
    /// Build the cost model these settings describe.
    pub fn to_cost_model(&self) -> BlendedCost {
        BlendedCost::new(
            self.recency_half_life,
            self.frequency_weight,
            self.cost_weight,
        )
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl Default for CostSettings {
    fn default() -> Self {
        Self {
            recency_half_life: DEFAULT_RECENCY_HALF_LIFE,
            frequency_weight: DEFAULT_FREQUENCY_WEIGHT,
            cost_weight: DEFAULT_COST_WEIGHT,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(default_log_dir()),
            file: default_log_file().to_string(),
        }
    }
}
