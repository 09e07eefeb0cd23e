//! Human-readable size parsing (e.g., "2GB", "500MB").

use std::fmt;
use thiserror::Error;

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size '{input}' - expected format like '2GB', '500MB', or '1024KB'")]
pub struct SizeParseError {
    input: String,
}

impl SizeParseError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Accepts bare numbers (bytes) and `KB`/`K`, `MB`/`M`, `GB`/`G` suffixes in
/// powers of 1024. Case-insensitive and whitespace tolerant.
///
/// # Examples
///
/// ```
/// use chunkcache::config::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1 KB").unwrap(), 1024);
/// assert_eq!(parse_size("512mb").unwrap(), 512 * 1024 * 1024);
/// ```
pub fn parse_size(s: &str) -> Result<u64, SizeParseError> {
    let s = s.trim();
    let upper = s.to_ascii_uppercase();

    let suffixes = [
        ("GB", GB),
        ("G", GB),
        ("MB", MB),
        ("M", MB),
        ("KB", KB),
        ("K", KB),
    ];
    let (suffix_len, multiplier) = suffixes
        .iter()
        .find(|(suffix, _)| upper.ends_with(suffix))
        .map(|(suffix, mult)| (suffix.len(), *mult))
        .unwrap_or((0, 1));

    let num_str = s[..s.len() - suffix_len].trim();
    if num_str.is_empty() {
        return Err(SizeParseError::new(s));
    }

    let num: u64 = num_str.parse().map_err(|_| SizeParseError::new(s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| SizeParseError::new(s))
}

/// Format a byte count using the largest unit that divides it exactly.
///
/// # Examples
///
/// ```
/// use chunkcache::config::format_size;
///
/// assert_eq!(format_size(512 * 1024 * 1024), "512MB");
/// assert_eq!(format_size(1000), "1000");
/// ```
pub fn format_size(bytes: u64) -> String {
    if bytes >= GB && bytes % GB == 0 {
        format!("{}GB", bytes / GB)
    } else if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else if bytes >= KB && bytes % KB == 0 {
        format!("{}KB", bytes / KB)
    } else {
        format!("{}", bytes)
    }
}

/// A byte count that parses from and displays as a human-readable string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Size(pub u64);

impl Size {
    pub fn bytes(self) -> u64 {
        self.0
    }

    pub fn from_mb(mb: u64) -> Self {
        Self(mb * MB)
    }

    pub fn from_gb(gb: u64) -> Self {
        Self(gb * GB)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_size(self.0))
    }
}

impl std::str::FromStr for Size {
    type Err = SizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_size(s).map(Size)
    }
}
