//! Gateway statistics for monitoring cache and coalescing effectiveness.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct GatewayCounters {
    pub(crate) requests: AtomicU64,
    pub(crate) hits: AtomicU64,
    pub(crate) coalesced: AtomicU64,
    pub(crate) computed: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) cancelled: AtomicU64,
    pub(crate) uncached_too_large: AtomicU64,
}

impl GatewayCounters {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> GatewayStats {
        GatewayStats {
            requests: self.requests.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            computed: self.computed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            uncached_too_large: self.uncached_too_large.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of gateway statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayStats {
    /// Total `fetch` calls.
    pub requests: u64,
    /// Requests answered from the store.
    pub hits: u64,
    /// Requests that joined an in-flight computation.
    pub coalesced: u64,
    /// Computations that completed successfully.
    pub computed: u64,
    /// Computations whose compute function returned an error.
    pub failed: u64,
    /// Computations cancelled before completion.
    pub cancelled: u64,
    /// Computed values returned to callers but too large to cache.
    pub uncached_too_large: u64,
}

impl GatewayStats {
    /// Fraction of requests served from the store (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        ratio(self.hits, self.requests)
    }

    /// Fraction of requests that joined existing work (0.0 to 1.0).
    pub fn coalescing_ratio(&self) -> f64 {
        ratio(self.coalesced, self.requests)
    }

    /// Computations started, whatever their outcome.
    pub fn episodes(&self) -> u64 {
        self.computed + self.failed + self.cancelled
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

impl fmt::Display for GatewayStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requests: {} hits ({:.1}%), {} coalesced ({:.1}%), {} computed, {} failed, {} cancelled",
            self.requests,
            self.hits,
            self.hit_ratio() * 100.0,
            self.coalesced,
            self.coalescing_ratio() * 100.0,
            self.computed,
            self.failed,
            self.cancelled
        )
    }
}
