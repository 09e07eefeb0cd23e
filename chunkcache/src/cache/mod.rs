//! Bounded, cost-aware cache for chunk results.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                    Store                     │
//! │                                              │
//! │  CacheKey ──► CacheEntry { value, meta }     │
//! │                                              │
//! │  put() ──► insert ──► enforce byte budget    │
//! │                          │                   │
//! │                          ▼                   │
//! │                 CostModel::score(meta, now)  │
//! │                 lowest scores evicted first  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The store is an explicitly constructed value; share it with `Arc` rather
//! than through any process-wide instance, so several independent caches can
//! coexist (one per dataset, one per test, ...).
//!
//! # Example
//!
//! ```
//! use chunkcache::cache::{CacheKey, ChunkCoords, Store};
//!
//! let store = Store::new(100).unwrap();
//! let key = CacheKey::chunk("era5", "t2m", ChunkCoords::new(vec![0, 0]));
//!
//! store.put(key.clone(), vec![1u8, 2, 3], 3);
//! assert_eq!(store.get(&key), Some(vec![1, 2, 3]));
//! ```

mod cost;
mod entry;
mod key;
mod stats;
mod store;
mod weight;

pub use cost::{
    BlendedCost, CostModel, DEFAULT_COST_WEIGHT, DEFAULT_FREQUENCY_WEIGHT,
    DEFAULT_RECENCY_HALF_LIFE,
};
pub use entry::{CacheEntry, EntryMeta};
pub use key::{CacheKey, ChunkCoords, KeyParseError};
pub use stats::StoreStats;
pub use store::{Eviction, PutOutcome, Store, StoreError};
pub use weight::ByteSize;
