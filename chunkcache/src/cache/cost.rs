//! Eviction scoring.
//!
//! The store asks a [`CostModel`] for a score per entry and evicts the lowest
//! scores first. A score must be a pure function of the entry metadata and
//! the current time so that eviction order is deterministic for a snapshot.
//!
//! # Contract
//!
//! For any implementation, holding the other inputs fixed, the score is:
//! - non-increasing in idle time (time since last access)
//! - non-decreasing in access count
//! - non-increasing in size
//!
//! [`BlendedCost`] satisfies these strictly and additionally rewards values
//! that were expensive to compute.

use std::f64::consts::LN_2;
use std::time::Duration;

use tokio::time::Instant;

use super::entry::EntryMeta;

/// Default half-life for the recency factor.
pub const DEFAULT_RECENCY_HALF_LIFE: Duration = Duration::from_secs(60);

/// Default weight of the access-frequency factor.
pub const DEFAULT_FREQUENCY_WEIGHT: f64 = 1.0;

/// Default weight of the compute-cost factor (per second of compute).
pub const DEFAULT_COST_WEIGHT: f64 = 1.0;

/// Scoring strategy used to order entries for eviction.
///
/// Higher scores are kept; lower scores are evicted first.
pub trait CostModel: Send + Sync {
    /// Score an entry at time `now`.
    fn score(&self, entry: &EntryMeta, now: Instant) -> f64;
}

impl<M: CostModel + ?Sized> CostModel for Box<M> {
    fn score(&self, entry: &EntryMeta, now: Instant) -> f64 {
        (**self).score(entry, now)
    }
}

impl<M: CostModel + ?Sized> CostModel for std::sync::Arc<M> {
    fn score(&self, entry: &EntryMeta, now: Instant) -> f64 {
        (**self).score(entry, now)
    }
}

/// Recency, frequency, compute cost and size blended into one value.
///
/// The blend is the product
///
/// ```text
/// recency   = 0.5 ^ (idle / half_life)
/// frequency = 1 + frequency_weight * ln(1 + access_count)
/// cost      = 1 + cost_weight * compute_secs
/// blend     = recency * frequency * cost / max(size_bytes, 1)
/// ```
///
/// and the score is its natural log, summed term by term:
///
/// ```text
/// score = -ln2 * idle / half_life + ln(frequency) + ln(cost) - ln(max(size_bytes, 1))
/// ```
///
/// The product itself underflows to zero after about a thousand idle
/// half-lives, at which point every stale entry would tie. The log form
/// orders entries identically and stays finite for any idle time.
///
/// Setting a weight to zero removes that factor from the blend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendedCost {
    recency_half_life: Duration,
    frequency_weight: f64,
    cost_weight: f64,
}

impl BlendedCost {
    /// Create a cost model with explicit weights.
    ///
    /// Negative weights are clamped to zero and a zero half-life is raised
    /// to one millisecond, keeping the model within its contract.
    pub fn new(recency_half_life: Duration, frequency_weight: f64, cost_weight: f64) -> Self {
        Self {
            recency_half_life: recency_half_life.max(Duration::from_millis(1)),
            frequency_weight: non_negative(frequency_weight),
            cost_weight: non_negative(cost_weight),
        }
    }

    /// Set the recency half-life.
    pub fn with_recency_half_life(self, half_life: Duration) -> Self {
        Self::new(half_life, self.frequency_weight, self.cost_weight)
    }

    /// Set the access-frequency weight.
    pub fn with_frequency_weight(self, weight: f64) -> Self {
        Self::new(self.recency_half_life, weight, self.cost_weight)
    }

    /// Set the compute-cost weight.
    pub fn with_cost_weight(self, weight: f64) -> Self {
        Self::new(self.recency_half_life, self.frequency_weight, weight)
    }

    pub fn recency_half_life(&self) -> Duration {
        self.recency_half_life
    }

    pub fn frequency_weight(&self) -> f64 {
        self.frequency_weight
    }

    pub fn cost_weight(&self) -> f64 {
        self.cost_weight
    }
}

impl Default for BlendedCost {
    fn default() -> Self {
        Self::new(
            DEFAULT_RECENCY_HALF_LIFE,
            DEFAULT_FREQUENCY_WEIGHT,
            DEFAULT_COST_WEIGHT,
        )
    }
}

impl CostModel for BlendedCost {
    fn score(&self, entry: &EntryMeta, now: Instant) -> f64 {
        let idle = entry.idle(now).as_secs_f64();
        let recency = -LN_2 * idle / self.recency_half_life.as_secs_f64();
        let frequency = (self.frequency_weight * (entry.access_count as f64).ln_1p()).ln_1p();
        let cost = (self.cost_weight * entry.compute_cost.as_secs_f64()).ln_1p();
        let size = (entry.size_bytes.max(1) as f64).ln();

        recency + frequency + cost - size
    }
}

fn non_negative(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}
