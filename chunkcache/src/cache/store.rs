//! Bounded key-value store with cost-driven eviction.
//!
//! The [`Store`] holds materialized chunk values under a byte budget. When an
//! insertion overflows the budget it asks its [`CostModel`] to score each
//! entry and evicts the lowest scores until the budget holds again.
//!
//! # Invariants
//!
//! - `size_bytes() <= capacity_bytes()` after every operation returns
//! - a value larger than the whole capacity is never stored
//! - eviction order is deterministic for a given snapshot: ascending score,
//!   ties broken by insertion order (oldest first)
//!
//! # Locking
//!
//! All state sits behind one `parking_lot::Mutex`. Hits mutate access
//! metadata, so reads take the same lock as writes; the critical sections are
//! short and the value is cloned out before the lock is released, so a value
//! being read can never be evicted mid-read.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::cost::{BlendedCost, CostModel};
use super::entry::{CacheEntry, EntryMeta};
use super::key::CacheKey;
use super::stats::{StoreCounters, StoreStats};

/// Errors constructing or reconfiguring a store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Capacity must be at least one byte.
    #[error("Store capacity must be positive")]
    ZeroCapacity,
}

/// Summary of the eviction pass that followed an insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Eviction {
    /// Number of entries evicted.
    pub entries: usize,
    /// Bytes freed.
    pub bytes: u64,
}

/// Result of [`Store::put`].
#[derive(Debug)]
pub enum PutOutcome<V> {
    /// The value was inserted and the budget enforced.
    ///
    /// `retained` is false when the new entry itself scored lowest and was
    /// evicted by the same pass.
    Stored { eviction: Eviction, retained: bool },

    /// The value exceeds the store capacity on its own and was not stored.
    /// The value is handed back to the caller.
    TooLarge { value: V, size_bytes: u64 },
}

impl<V> PutOutcome<V> {
    /// True if the value is in the store after the call.
    pub fn is_retained(&self) -> bool {
        matches!(self, Self::Stored { retained: true, .. })
    }

    /// True if the value was refused for exceeding capacity.
    pub fn is_too_large(&self) -> bool {
        matches!(self, Self::TooLarge { .. })
    }

    /// Recover the value from a too-large rejection.
    pub fn into_rejected(self) -> Option<V> {
        match self {
            Self::TooLarge { value, .. } => Some(value),
            Self::Stored { .. } => None,
        }
    }
}

struct StoreInner<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    total_bytes: u64,
    capacity_bytes: u64,
    next_seq: u64,
}

impl<V> StoreInner<V> {
    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.total_bytes -= entry.meta.size_bytes;
        Some(entry)
    }

    /// Evict lowest-scoring entries until the budget holds.
    ///
    /// Scores every entry once, heapifies in linear time and pops only as
    /// many candidates as the overflow requires.
    fn enforce_budget<M: CostModel + ?Sized>(&mut self, model: &M, now: Instant) -> Eviction {
        let mut eviction = Eviction::default();
        if self.total_bytes <= self.capacity_bytes {
            return eviction;
        }

        let mut candidates: BinaryHeap<Candidate> = self
            .entries
            .iter()
            .map(|(key, entry)| Candidate {
                score: model.score(&entry.meta, now),
                seq: entry.meta.insert_seq,
                key: key.clone(),
            })
            .collect();

        while self.total_bytes > self.capacity_bytes {
            let Some(Candidate { score, key, .. }) = candidates.pop() else {
                break;
            };
            if let Some(entry) = self.remove(&key) {
                trace!(key = %key, score, size = entry.meta.size_bytes, "Evicted entry");
                eviction.entries += 1;
                eviction.bytes += entry.meta.size_bytes;
            }
        }

        eviction
    }
}

/// Eviction candidate, ordered so the max-heap pops the lowest score first
/// and, among equal scores, the oldest insertion.
struct Candidate {
    score: f64,
    seq: u64,
    key: CacheKey,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then(other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Bounded in-memory store for chunk values.
///
/// # Type Parameters
///
/// * `V` - Value type; cloned out on every hit, so use a cheap handle such as
///   `bytes::Bytes` or `Arc<T>` for large payloads
/// * `M` - Eviction scoring strategy
pub struct Store<V, M = BlendedCost> {
    inner: Mutex<StoreInner<V>>,
    model: M,
    counters: StoreCounters,
}

impl<V: Clone> Store<V, BlendedCost> {
    /// Create a store with the default cost model.
    ///
    /// # Arguments
    ///
    /// * `capacity_bytes` - Maximum total size of stored values (must be > 0)
    pub fn new(capacity_bytes: u64) -> Result<Self, StoreError> {
        Self::with_cost_model(capacity_bytes, BlendedCost::default())
    }
}

impl<V: Clone, M: CostModel> Store<V, M> {
    /// Create a store with a custom cost model.
    pub fn with_cost_model(capacity_bytes: u64, model: M) -> Result<Self, StoreError> {
        if capacity_bytes == 0 {
            return Err(StoreError::ZeroCapacity);
        }

        Ok(Self {
            inner: Mutex::new(StoreInner {
                entries: HashMap::new(),
                total_bytes: 0,
                capacity_bytes,
                next_seq: 0,
            }),
            model,
            counters: StoreCounters::default(),
        })
    }

    /// Look up a value.
    ///
    /// A hit refreshes the entry's recency and bumps its access count.
    /// Returns `None` on a miss; absence is never an error.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let mut inner = self.inner.lock();
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.meta.touch(Instant::now());
                StoreCounters::incr(&self.counters.hits);
                Some(entry.value.clone())
            }
            None => {
                StoreCounters::incr(&self.counters.misses);
                None
            }
        }
    }

    /// Second lookup within a request that already missed through [`get`].
    ///
    /// A hit refreshes recency and access count like [`get`], but the
    /// hit/miss counters are left alone so the request is counted once.
    ///
    /// [`get`]: Store::get
    pub(crate) fn recheck(&self, key: &CacheKey) -> Option<V> {
        let mut inner = self.inner.lock();
        let entry = inner.entries.get_mut(key)?;
        entry.meta.touch(Instant::now());
        Some(entry.value.clone())
    }

    /// Insert or replace a value with no recorded compute cost.
    pub fn put(&self, key: CacheKey, value: V, size_bytes: u64) -> PutOutcome<V> {
        self.put_with_cost(key, value, size_bytes, Duration::ZERO)
    }

    /// Insert or replace a value, recording how long it took to compute.
    ///
    /// If `size_bytes` exceeds the capacity the value is returned in
    /// [`PutOutcome::TooLarge`] and any previous entry for the key is dropped,
    /// since it no longer reflects the latest value. Otherwise the value is
    /// inserted and lowest-scoring entries are evicted until the budget holds.
    pub fn put_with_cost(
        &self,
        key: CacheKey,
        value: V,
        size_bytes: u64,
        compute_cost: Duration,
    ) -> PutOutcome<V> {
        let mut inner = self.inner.lock();

        if size_bytes > inner.capacity_bytes {
            if inner.remove(&key).is_some() {
                StoreCounters::incr(&self.counters.invalidations);
            }
            StoreCounters::incr(&self.counters.rejected_too_large);
            debug!(
                key = %key,
                size_bytes,
                capacity_bytes = inner.capacity_bytes,
                "Value too large for cache, not stored"
            );
            return PutOutcome::TooLarge { value, size_bytes };
        }

        let now = Instant::now();
        let seq = inner.next_seq;
        inner.next_seq += 1;

        inner.remove(&key);
        inner.total_bytes += size_bytes;
        inner.entries.insert(
            key.clone(),
            CacheEntry::new(value, EntryMeta::new(size_bytes, compute_cost, now, seq)),
        );
        StoreCounters::incr(&self.counters.insertions);

        let eviction = inner.enforce_budget(&self.model, now);
        let retained = inner.entries.contains_key(&key);

        if eviction.entries > 0 {
            StoreCounters::add(&self.counters.evictions, eviction.entries as u64);
            StoreCounters::add(&self.counters.evicted_bytes, eviction.bytes);
            debug!(
                key = %key,
                evicted = eviction.entries,
                freed_bytes = eviction.bytes,
                retained,
                size_bytes = inner.total_bytes,
                "Eviction pass completed"
            );
        }

        PutOutcome::Stored { eviction, retained }
    }

    /// Remove an entry. Returns true if it existed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = self.inner.lock().remove(key).is_some();
        if removed {
            StoreCounters::incr(&self.counters.invalidations);
        }
        removed
    }

    /// Drop all entries.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let count = inner.entries.len() as u64;
        inner.entries.clear();
        inner.total_bytes = 0;
        StoreCounters::add(&self.counters.invalidations, count);
    }

    /// Change the capacity, evicting as needed to fit the new limit.
    pub fn set_capacity(&self, capacity_bytes: u64) -> Result<Eviction, StoreError> {
        if capacity_bytes == 0 {
            return Err(StoreError::ZeroCapacity);
        }

        let mut inner = self.inner.lock();
        inner.capacity_bytes = capacity_bytes;
        let eviction = inner.enforce_budget(&self.model, Instant::now());

        if eviction.entries > 0 {
            StoreCounters::add(&self.counters.evictions, eviction.entries as u64);
            StoreCounters::add(&self.counters.evicted_bytes, eviction.bytes);
            debug!(
                capacity_bytes,
                evicted = eviction.entries,
                freed_bytes = eviction.bytes,
                size_bytes = inner.total_bytes,
                "Capacity reduced, eviction pass completed"
            );
        }

        Ok(eviction)
    }

    /// Check for a key without touching its access metadata.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// Access metadata for a key, without counting as a hit.
    pub fn meta(&self, key: &CacheKey) -> Option<EntryMeta> {
        self.inner.lock().entries.get(key).map(|e| e.meta)
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total size of stored values in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.inner.lock().total_bytes
    }

    /// Configured capacity in bytes.
    pub fn capacity_bytes(&self) -> u64 {
        self.inner.lock().capacity_bytes
    }

    /// The scoring strategy in use.
    pub fn cost_model(&self) -> &M {
        &self.model
    }

    /// Snapshot of counters and current occupancy.
    pub fn stats(&self) -> StoreStats {
        let mut stats = self.counters.snapshot();
        let inner = self.inner.lock();
        stats.entry_count = inner.entries.len();
        stats.size_bytes = inner.total_bytes;
        stats.capacity_bytes = inner.capacity_bytes;
        stats
    }
}
