//! In-flight registry for single-flight computation.
//!
//! When several requests for the same key arrive while its value is being
//! computed, only the first one (the leader) runs the computation. The others
//! subscribe to the leader's broadcast channel and receive the same outcome.
//!
//! # Architecture
//!
//! ```text
//! Request A ─┐
//!            │                                 compute_fn
//! Request B ─┼──► InFlightRegistry ──► Leader ──► (once)
//!            │        │                              │
//! Request C ─┘        │                              │
//!                     ▼                              ▼
//!               [B, C subscribe]◄──── broadcast outcome
//! ```
//!
//! # Episodes
//!
//! Each registration that creates a leader starts a new episode. The entry is
//! removed when the episode ends (success, failure or cancellation), before
//! the outcome is broadcast, so every subscriber is attached before the send
//! and a request arriving afterwards starts from the cache or a new episode.
//!
//! If the leader is dropped before completing (its caller was cancelled), the
//! [`Leader`] guard broadcasts [`ComputeError::Cancelled`] so joiners never
//! wait on a computation that no longer exists.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::ComputeError;
use crate::cache::CacheKey;

/// Outcome delivered to every requester of an episode.
pub(crate) type Outcome<V> = Result<V, ComputeError>;

struct Pending<V> {
    sender: broadcast::Sender<Outcome<V>>,
    cancel: CancellationToken,
    episode: u64,
}

/// Result of registering a request.
pub(crate) enum Registration<'a, V: Clone> {
    /// The value was found in the cache while holding the registry slot.
    Hit(V),
    /// Another request is computing this key; wait on the receiver.
    Joined(broadcast::Receiver<Outcome<V>>),
    /// This request must compute the value and complete the episode.
    Leader(Leader<'a, V>),
}

/// Tracks keys whose values are currently being computed.
pub(crate) struct InFlightRegistry<V> {
    in_flight: DashMap<CacheKey, Pending<V>>,
    next_episode: AtomicU64,
}

impl<V: Clone> InFlightRegistry<V> {
    pub(crate) fn new() -> Self {
        Self {
            in_flight: DashMap::new(),
            next_episode: AtomicU64::new(0),
        }
    }

    /// Register a request for `key`.
    ///
    /// `lookup` is called only when no computation is in flight, while the
    /// registry slot for the key is held. A value that landed in the cache
    /// between the caller's own checks and this call is therefore seen here
    /// instead of triggering a second computation.
    pub(crate) fn register(
        &self,
        key: &CacheKey,
        lookup: impl FnOnce() -> Option<V>,
    ) -> Registration<'_, V> {
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let pending = entry.get();
                debug!(
                    key = %key,
                    episode = pending.episode,
                    waiters = pending.sender.receiver_count() + 1,
                    "Joining in-flight computation"
                );
                Registration::Joined(pending.sender.subscribe())
            }
            Entry::Vacant(entry) => {
                if let Some(value) = lookup() {
                    return Registration::Hit(value);
                }

                let episode = self.next_episode.fetch_add(1, Ordering::Relaxed);
                // Exactly one message is ever sent per episode.
                let (sender, _rx) = broadcast::channel(1);
                let cancel = CancellationToken::new();
                entry.insert(Pending {
                    sender: sender.clone(),
                    cancel: cancel.clone(),
                    episode,
                });
                debug!(key = %key, episode, "Starting computation");

                Registration::Leader(Leader {
                    registry: self,
                    key: key.clone(),
                    episode,
                    sender,
                    cancel,
                    completed: false,
                })
            }
        }
    }

    /// Cancel the in-flight computation for `key`, if any.
    pub(crate) fn cancel(&self, key: &CacheKey) -> bool {
        match self.in_flight.get(key) {
            Some(pending) => {
                pending.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every in-flight computation.
    pub(crate) fn cancel_all(&self) -> usize {
        let mut count = 0;
        for pending in self.in_flight.iter() {
            pending.cancel.cancel();
            count += 1;
        }
        count
    }

    pub(crate) fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.in_flight.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.in_flight.len()
    }

    fn finish(&self, key: &CacheKey, episode: u64) {
        self.in_flight
            .remove_if(key, |_, pending| pending.episode == episode);
    }

    /// Wait for the outcome of a joined episode.
    pub(crate) async fn wait(mut rx: broadcast::Receiver<Outcome<V>>) -> Outcome<V> {
        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "In-flight computation ended without an outcome");
                Err(ComputeError::Cancelled)
            }
        }
    }
}

/// Handle held by the request that runs the computation.
///
/// Must be completed with [`Leader::complete`]; dropping it instead ends the
/// episode as cancelled.
pub(crate) struct Leader<'a, V: Clone> {
    registry: &'a InFlightRegistry<V>,
    key: CacheKey,
    episode: u64,
    sender: broadcast::Sender<Outcome<V>>,
    cancel: CancellationToken,
    completed: bool,
}

impl<V: Clone> Leader<'_, V> {
    /// Token that fires when the episode is cancelled.
    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn episode(&self) -> u64 {
        self.episode
    }

    /// End the episode and deliver the outcome to all joined requesters.
    ///
    /// Returns the number of joiners that were waiting.
    pub(crate) fn complete(mut self, outcome: Outcome<V>) -> usize {
        self.completed = true;
        self.registry.finish(&self.key, self.episode);
        let waiters = self.sender.receiver_count();
        // No receivers is normal: nobody joined this episode.
        let _ = self.sender.send(outcome);
        waiters
    }
}

impl<V: Clone> Drop for Leader<'_, V> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        self.registry.finish(&self.key, self.episode);
        let waiters = self.sender.receiver_count();
        let _ = self.sender.send(Err(ComputeError::Cancelled));
        debug!(
            key = %self.key,
            episode = self.episode,
            waiters,
            "Leader dropped before completion, episode cancelled"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ChunkCoords;
    use std::sync::Arc;

    fn key(i: u64) -> CacheKey {
        CacheKey::chunk("test", "var", ChunkCoords::new(vec![i]))
    }

    fn is_leader<V: Clone>(r: &Registration<'_, V>) -> bool {
        matches!(r, Registration::Leader(_))
    }

    #[test]
    fn test_first_request_leads() {
        let registry: InFlightRegistry<u32> = InFlightRegistry::new();
        let first = registry.register(&key(1), || None);

        assert!(is_leader(&first));
        assert!(registry.is_in_flight(&key(1)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_second_request_joins() {
        let registry: InFlightRegistry<u32> = InFlightRegistry::new();
        let _first = registry.register(&key(1), || None);
        let second = registry.register(&key(1), || panic!("lookup must not run"));

        assert!(matches!(second, Registration::Joined(_)));
    }

    #[test]
    fn test_different_keys_lead_independently() {
        let registry: InFlightRegistry<u32> = InFlightRegistry::new();
        let a = registry.register(&key(1), || None);
        let b = registry.register(&key(2), || None);

        assert!(is_leader(&a));
        assert!(is_leader(&b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_lookup_hit_skips_registration() {
        let registry: InFlightRegistry<u32> = InFlightRegistry::new();
        let result = registry.register(&key(1), || Some(42));

        assert!(matches!(result, Registration::Hit(42)));
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn test_joiners_receive_outcome() {
        let registry: InFlightRegistry<u32> = InFlightRegistry::new();
        let leader = match registry.register(&key(1), || None) {
            Registration::Leader(l) => l,
            _ => panic!("expected leader"),
        };

        let receivers: Vec<_> = (0..3)
            .map(|_| match registry.register(&key(1), || None) {
                Registration::Joined(rx) => rx,
                _ => panic!("expected join"),
            })
            .collect();

        assert_eq!(leader.complete(Ok(7)), 3);
        assert_eq!(registry.len(), 0);

        for rx in receivers {
            assert_eq!(InFlightRegistry::wait(rx).await.unwrap(), 7);
        }
    }

    #[tokio::test]
    async fn test_failure_is_shared() {
        let registry: InFlightRegistry<u32> = InFlightRegistry::new();
        let leader = match registry.register(&key(1), || None) {
            Registration::Leader(l) => l,
            _ => panic!("expected leader"),
        };
        let rx = match registry.register(&key(1), || None) {
            Registration::Joined(rx) => rx,
            _ => panic!("expected join"),
        };

        leader.complete(Err(ComputeError::failed("boom")));

        let err = InFlightRegistry::wait(rx).await.unwrap_err();
        assert_eq!(err.to_string(), "Computation failed: boom");
    }

    #[tokio::test]
    async fn test_dropped_leader_cancels_joiners() {
        let registry: InFlightRegistry<u32> = InFlightRegistry::new();
        let leader = registry.register(&key(1), || None);
        let rx = match registry.register(&key(1), || None) {
            Registration::Joined(rx) => rx,
            _ => panic!("expected join"),
        };

        drop(leader);

        assert!(InFlightRegistry::wait(rx).await.unwrap_err().is_cancelled());
        assert!(!registry.is_in_flight(&key(1)));
    }

    #[test]
    fn test_completion_allows_new_episode() {
        let registry: InFlightRegistry<u32> = InFlightRegistry::new();
        let first = match registry.register(&key(1), || None) {
            Registration::Leader(l) => l,
            _ => panic!("expected leader"),
        };
        let first_episode = first.episode();
        first.complete(Ok(1));

        match registry.register(&key(1), || None) {
            Registration::Leader(l) => assert!(l.episode() > first_episode),
            _ => panic!("expected a fresh leader"),
        };
    }

    #[test]
    fn test_cancel_fires_token() {
        let registry: InFlightRegistry<u32> = InFlightRegistry::new();
        let leader = match registry.register(&key(1), || None) {
            Registration::Leader(l) => l,
            _ => panic!("expected leader"),
        };

        assert!(registry.cancel(&key(1)));
        assert!(leader.cancel_token().is_cancelled());
        assert!(!registry.cancel(&key(2)));
    }

    #[test]
    fn test_cancel_all() {
        let registry: InFlightRegistry<u32> = InFlightRegistry::new();
        let _a = registry.register(&key(1), || None);
        let _b = registry.register(&key(2), || None);

        assert_eq!(registry.cancel_all(), 2);
    }

    #[test]
    fn test_concurrent_registration_single_leader() {
        let registry: Arc<InFlightRegistry<u32>> = Arc::new(InFlightRegistry::new());
        let barrier = Arc::new(std::sync::Barrier::new(10));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    let registration = registry.register(&key(1), || None);
                    let led = is_leader(&registration);
                    // Keep leaders registered so later threads must join.
                    std::mem::forget(registration);
                    led
                })
            })
            .collect();

        let leaders = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|led| *led)
            .count();

        assert_eq!(leaders, 1, "exactly one request should lead");
    }
}
