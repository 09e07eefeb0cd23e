//! Errors surfaced by the compute gateway.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Shared, type-erased error from a compute function.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

/// Failure of a computation episode.
///
/// Every requester joined to the episode receives a clone of the same value.
/// The underlying error is shared, not re-created, so callers can downcast
/// it to the type their compute function returned.
#[derive(Debug, Clone, Error)]
pub enum ComputeError {
    /// The compute function returned an error.
    #[error("Computation failed: {0}")]
    Failed(#[source] SharedError),

    /// The computation was cancelled before it finished.
    #[error("Computation cancelled")]
    Cancelled,
}

impl ComputeError {
    /// Wrap a compute function's error.
    pub fn failed(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Failed(Arc::from(err.into()))
    }

    /// True if the episode was cancelled rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The compute function's error, if any.
    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Self::Failed(err) => Some(err.as_ref()),
            Self::Cancelled => None,
        }
    }

    /// Downcast the compute function's error to a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner()?.downcast_ref::<E>()
    }
}
