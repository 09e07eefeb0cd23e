//! Cache entries and the access metadata the cost model scores.

use std::time::Duration;

use tokio::time::Instant;

/// Access metadata for a cached value.
///
/// This is everything a [`CostModel`](super::CostModel) is allowed to look at.
/// Kept separate from the value so scoring never touches payload data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryMeta {
    /// Size of the value in bytes, as reported by the caller.
    pub size_bytes: u64,
    /// When the entry was last read or written.
    pub last_access: Instant,
    /// Number of hits since insertion.
    pub access_count: u64,
    /// When the entry was inserted.
    pub inserted_at: Instant,
    /// How long the value took to compute.
    pub compute_cost: Duration,
    /// Monotonic insertion sequence, used to break score ties.
    pub insert_seq: u64,
}

impl EntryMeta {
    pub(crate) fn new(size_bytes: u64, compute_cost: Duration, now: Instant, seq: u64) -> Self {
        Self {
            size_bytes,
            last_access: now,
            access_count: 0,
            inserted_at: now,
            compute_cost,
            insert_seq: seq,
        }
    }

    /// Time elapsed since the last access, saturating at zero.
    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_access)
    }

    /// Record a hit.
    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_access = now;
        self.access_count = self.access_count.saturating_add(1);
    }
}

/// A value held by the store together with its metadata.
#[derive(Debug)]
pub struct CacheEntry<V> {
    pub(crate) value: V,
    pub(crate) meta: EntryMeta,
}

impl<V> CacheEntry<V> {
    pub(crate) fn new(value: V, meta: EntryMeta) -> Self {
        Self { value, meta }
    }

    /// The cached value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Metadata for scoring.
    pub fn meta(&self) -> &EntryMeta {
        &self.meta
    }
}
