//! INI serialization: `ConfigFile` → commented INI string.

use super::settings::ConfigFile;
use super::size::format_size;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[cache]
; Maximum total size of cached chunk results.
; Accepts sizes like 512MB, 2GB or a plain byte count.
capacity = {}

[cost]
; Eviction scoring. Entries with the lowest score are evicted first.
; Idle seconds after which an entry's recency factor halves.
recency_half_life_secs = {}
; Weight of the access-count factor (0 disables it).
frequency_weight = {}
; Weight of the compute-time factor (0 disables it).
cost_weight = {}

[logging]
; Directory for log files (relative paths are relative to the working directory).
directory = {}
; Log file name. The file is cleared at the start of each session.
file = {}
"#,
        format_size(config.cache.capacity),
        config.cost.recency_half_life.as_secs_f64(),
        config.cost.frequency_weight,
        config.cost.cost_weight,
        config.logging.directory.to_string_lossy(),
        config.logging.file,
    )
}
