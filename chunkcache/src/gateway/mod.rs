//! Cache-or-compute gateway with single-flight de-duplication.
//!
//! The [`ComputeGateway`] is the entry point the serving layer calls. For each
//! request it either returns a cached value, joins a computation already in
//! flight for the same key, or runs the compute function itself and stores
//! the result.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        ComputeGateway                            │
//! │                                                                  │
//! │  fetch(key) ──► ┌──────────────┐                                 │
//! │                 │ Store lookup │──► Hit ──► Return immediately   │
//! │                 └──────┬───────┘                                 │
//! │                        │ Miss                                    │
//! │                        ▼                                         │
//! │                 ┌──────────────┐                                 │
//! │                 │   Registry   │──► In flight ──► Join, wait     │
//! │                 └──────┬───────┘                                 │
//! │                        │ Idle: recheck store, else lead          │
//! │                        ▼                                         │
//! │                 ┌──────────────┐                                 │
//! │                 │  compute_fn  │──► Err ──► Broadcast, not cached│
//! │                 └──────┬───────┘                                 │
//! │                        │ Ok                                      │
//! │                        ▼                                         │
//! │                 ┌──────────────┐                                 │
//! │                 │  Store put   │──► Broadcast value to joiners   │
//! │                 └──────────────┘                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Per-key states
//!
//! - **Idle → Computing**: first request with no hit and nothing in flight
//! - **Computing → Computing**: later requests join the same episode
//! - **Computing → Done**: value stored (unless too large) and delivered to all
//! - **Computing → Failed**: error delivered to all, nothing cached
//! - **Computing → Cancelled**: [`ComputeGateway::cancel`] or the leading
//!   request being dropped; all joiners receive [`ComputeError::Cancelled`]
//!
//! Every terminal state clears the in-flight entry, so the next request for
//! the key starts a fresh episode.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use chunkcache::cache::{CacheKey, ChunkCoords};
//! use chunkcache::gateway::ComputeGateway;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let gateway = ComputeGateway::with_capacity(64 * 1024 * 1024).unwrap();
//! let key = CacheKey::chunk("era5", "t2m", ChunkCoords::new(vec![0, 0]));
//!
//! let chunk = gateway
//!     .fetch(key.clone(), || async { Ok::<_, std::io::Error>(Bytes::from_static(b"chunk")) })
//!     .await
//!     .unwrap();
//! assert_eq!(chunk, Bytes::from_static(b"chunk"));
//! # }
//! ```

mod coalesce;
mod error;
mod stats;

pub use error::{ComputeError, SharedError};
pub use stats::GatewayStats;

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::cache::{BlendedCost, ByteSize, CacheKey, CostModel, PutOutcome, Store, StoreError};
use coalesce::{InFlightRegistry, Registration};
use stats::GatewayCounters;

/// Cache-or-compute front for a [`Store`].
///
/// The store is shared, not owned: pass the same `Arc<Store>` to any other
/// collaborator that needs direct access (metrics, admin endpoints, tests).
pub struct ComputeGateway<V: Clone, M = BlendedCost> {
    store: Arc<Store<V, M>>,
    registry: InFlightRegistry<V>,
    counters: GatewayCounters,
}

impl<V> ComputeGateway<V, BlendedCost>
where
    V: Clone + ByteSize + Send + Sync + 'static,
{
    /// Create a gateway over a new store with the default cost model.
    pub fn with_capacity(capacity_bytes: u64) -> Result<Self, StoreError> {
        Ok(Self::new(Arc::new(Store::new(capacity_bytes)?)))
    }
}

impl<V, M> ComputeGateway<V, M>
where
    V: Clone + ByteSize + Send + Sync + 'static,
    M: CostModel,
{
    /// Create a gateway over an existing store.
    pub fn new(store: Arc<Store<V, M>>) -> Self {
        Self {
            store,
            registry: InFlightRegistry::new(),
            counters: GatewayCounters::default(),
        }
    }

    /// Return the cached value for `key`, computing it if needed.
    ///
    /// `compute` runs at most once per computation episode for a key, no
    /// matter how many requests arrive while it runs; all of them receive
    /// the same outcome. Values too large for the store are still returned,
    /// they are just not cached. Errors are never cached.
    ///
    /// # Errors
    ///
    /// - [`ComputeError::Failed`] if `compute` returned an error (shared
    ///   verbatim with every joined request)
    /// - [`ComputeError::Cancelled`] if the episode was cancelled
    pub async fn fetch<F, Fut, E>(&self, key: CacheKey, compute: F) -> Result<V, ComputeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        GatewayCounters::incr(&self.counters.requests);

        // Hits never touch the registry.
        if let Some(value) = self.store.get(&key) {
            GatewayCounters::incr(&self.counters.hits);
            trace!(key = %key, "Cache hit");
            return Ok(value);
        }

        let leader = match self.registry.register(&key, || self.store.recheck(&key)) {
            Registration::Hit(value) => {
                GatewayCounters::incr(&self.counters.hits);
                trace!(key = %key, "Cache hit on recheck");
                return Ok(value);
            }
            Registration::Joined(rx) => {
                GatewayCounters::incr(&self.counters.coalesced);
                return InFlightRegistry::wait(rx).await;
            }
            Registration::Leader(leader) => leader,
        };

        let started = Instant::now();
        let token = leader.cancel_token().clone();
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(ComputeError::Cancelled),
            result = compute() => result.map_err(ComputeError::failed),
        };
        let elapsed = started.elapsed();

        match &outcome {
            Ok(value) => {
                GatewayCounters::incr(&self.counters.computed);
                let size_bytes = value.byte_size();
                let put = self
                    .store
                    .put_with_cost(key.clone(), value.clone(), size_bytes, elapsed);
                if let PutOutcome::TooLarge { .. } = put {
                    GatewayCounters::incr(&self.counters.uncached_too_large);
                }
            }
            Err(ComputeError::Cancelled) => {
                GatewayCounters::incr(&self.counters.cancelled);
                info!(key = %key, episode = leader.episode(), "Computation cancelled");
            }
            Err(e) => {
                GatewayCounters::incr(&self.counters.failed);
                warn!(key = %key, episode = leader.episode(), error = %e, "Computation failed");
            }
        }

        let episode = leader.episode();
        let waiters = leader.complete(outcome.clone());
        debug!(
            key = %key,
            episode,
            waiters,
            elapsed_ms = elapsed.as_millis() as u64,
            success = outcome.is_ok(),
            "Computation episode finished"
        );

        outcome
    }

    /// Look up a cached value without computing.
    pub fn cached(&self, key: &CacheKey) -> Option<V> {
        self.store.get(key)
    }

    /// Cancel the in-flight computation for `key`.
    ///
    /// Returns false if nothing was in flight.
    pub fn cancel(&self, key: &CacheKey) -> bool {
        self.registry.cancel(key)
    }

    /// Cancel all in-flight computations. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        self.registry.cancel_all()
    }

    /// Drop the cached value for `key`.
    ///
    /// A computation already in flight for the key is not affected and will
    /// store its result when it completes.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.store.invalidate(key)
    }

    /// Drop all cached values.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// True if a computation for `key` is currently running.
    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.registry.is_in_flight(key)
    }

    /// Number of computations currently running.
    pub fn in_flight_count(&self) -> usize {
        self.registry.len()
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<Store<V, M>> {
        &self.store
    }

    /// Snapshot of gateway statistics.
    pub fn stats(&self) -> GatewayStats {
        self.counters.snapshot()
    }

    /// Log current gateway and store statistics.
    pub fn log_stats(&self) {
        let stats = self.stats();
        let store = self.store.stats();

        info!(
            requests = stats.requests,
            hits = stats.hits,
            coalesced = stats.coalesced,
            computed = stats.computed,
            failed = stats.failed,
            cancelled = stats.cancelled,
            uncached_too_large = stats.uncached_too_large,
            in_flight = self.in_flight_count(),
            hit_ratio = format!("{:.1}%", stats.hit_ratio() * 100.0),
            coalescing_ratio = format!("{:.1}%", stats.coalescing_ratio() * 100.0),
            entries = store.entry_count,
            size_bytes = store.size_bytes,
            capacity_bytes = store.capacity_bytes,
            evictions = store.evictions,
            "Compute gateway statistics"
        );
    }
}
