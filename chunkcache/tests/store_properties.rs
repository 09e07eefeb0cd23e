//! Property tests for the bounded store.
//!
//! Random sequences of puts, gets and invalidations must never push the
//! store over its byte budget, and oversized values must never be stored.
//!
//! Run with: `cargo test --test store_properties`

use std::collections::HashSet;

use chunkcache::cache::{CacheKey, ChunkCoords, PutOutcome, Store};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Put { key: u8, size: u64 },
    Get { key: u8 },
    Invalidate { key: u8 },
}

fn key(i: u8) -> CacheKey {
    CacheKey::chunk("prop", "var", ChunkCoords::new(vec![i as u64]))
}

fn op_strategy(max_size: u64) -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..16, 0..=max_size).prop_map(|(key, size)| Op::Put { key, size }),
        3 => (0u8..16).prop_map(|key| Op::Get { key }),
        1 => (0u8..16).prop_map(|key| Op::Invalidate { key }),
    ]
}

fn stored_total(store: &Store<u64>) -> u64 {
    (0u8..16).filter_map(|i| store.meta(&key(i))).map(|m| m.size_bytes).sum()
}

proptest! {
    #[test]
    fn test_total_never_exceeds_capacity(
        capacity in 1u64..500,
        ops in prop::collection::vec(op_strategy(600), 1..80),
    ) {
        let store: Store<u64> = Store::new(capacity).unwrap();

        for op in ops {
            match op {
                Op::Put { key: k, size } => {
                    let outcome = store.put(key(k), size, size);
                    if size > capacity {
                        prop_assert!(outcome.is_too_large());
                        prop_assert!(!store.contains(&key(k)));
                    } else {
                        prop_assert!(!outcome.is_too_large());
                    }
                }
                Op::Get { key: k } => {
                    if let Some(value) = store.get(&key(k)) {
                        // Values are their own sizes in this test.
                        prop_assert_eq!(store.meta(&key(k)).map(|m| m.size_bytes), Some(value));
                    }
                }
                Op::Invalidate { key: k } => {
                    store.invalidate(&key(k));
                    prop_assert!(!store.contains(&key(k)));
                }
            }

            prop_assert!(store.size_bytes() <= store.capacity_bytes());
            prop_assert_eq!(store.size_bytes(), stored_total(&store));
        }
    }

    #[test]
    fn test_too_large_never_stored(
        capacity in 1u64..1_000,
        excess in 1u64..1_000,
    ) {
        let store: Store<u64> = Store::new(capacity).unwrap();
        let outcome = store.put(key(0), 0, capacity + excess);

        let rejected = matches!(outcome, PutOutcome::TooLarge { .. });
        prop_assert!(rejected);
        prop_assert!(store.is_empty());
        prop_assert_eq!(store.size_bytes(), 0);
    }

    #[test]
    fn test_shrinking_capacity_keeps_budget(
        sizes in prop::collection::vec(1u64..50, 1..30),
        new_capacity in 1u64..200,
    ) {
        let store: Store<u64> = Store::new(1_000).unwrap();
        for (i, size) in sizes.iter().enumerate() {
            store.put(key(i as u8), *size, *size);
        }

        let before = store.size_bytes();
        let eviction = store.set_capacity(new_capacity).unwrap();

        prop_assert!(store.size_bytes() <= new_capacity);
        prop_assert_eq!(before - eviction.bytes, store.size_bytes());
        let remaining: HashSet<u8> = (0u8..30).filter(|i| store.contains(&key(*i))).collect();
        prop_assert_eq!(remaining.len(), store.len());
    }
}
