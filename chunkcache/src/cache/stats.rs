//! Store statistics.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated by the store.
#[derive(Debug, Default)]
pub(crate) struct StoreCounters {
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) insertions: AtomicU64,
    pub(crate) evictions: AtomicU64,
    pub(crate) evicted_bytes: AtomicU64,
    pub(crate) rejected_too_large: AtomicU64,
    pub(crate) invalidations: AtomicU64,
}

impl StoreCounters {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

/// Point-in-time snapshot of store statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    /// Entries removed to make room, not counting invalidations.
    pub evictions: u64,
    pub evicted_bytes: u64,
    /// Puts refused because the value exceeded capacity on its own.
    pub rejected_too_large: u64,
    pub invalidations: u64,
    pub entry_count: usize,
    pub size_bytes: u64,
    pub capacity_bytes: u64,
}

impl StoreStats {
    /// Fraction of lookups that were hits (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Fraction of capacity in use (0.0 to 1.0).
    pub fn utilization(&self) -> f64 {
        if self.capacity_bytes == 0 {
            0.0
        } else {
            self.size_bytes as f64 / self.capacity_bytes as f64
        }
    }
}

impl StoreCounters {
    pub(crate) fn snapshot(&self) -> StoreStats {
        StoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            evicted_bytes: self.evicted_bytes.load(Ordering::Relaxed),
            rejected_too_large: self.rejected_too_large.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            ..StoreStats::default()
        }
    }
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries, {}/{} bytes, hits {} misses {} ({:.1}%), {} evicted",
            self.entry_count,
            self.size_bytes,
            self.capacity_bytes,
            self.hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.evictions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_empty() {
        assert_eq!(StoreStats::default().hit_rate(), 0.0);
        assert_eq!(StoreStats::default().utilization(), 0.0);
    }

    #[test]
    fn test_hit_rate() {
        let stats = StoreStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < 0.001);
    }

    #[test]
    fn test_display() {
        let stats = StoreStats {
            hits: 1,
            misses: 1,
            evictions: 4,
            entry_count: 2,
            size_bytes: 60,
            capacity_bytes: 100,
            ..Default::default()
        };
        let display = stats.to_string();
        assert!(display.contains("60/100"));
        assert!(display.contains("50.0%"));
        assert!(display.contains("4 evicted"));
    }
}
