//! Cancellation handles and the live-batch record they refer to.

use crate::types::{FetchResult, Generation};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub(super) type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;
pub(super) type CompletionCallback = Box<dyn FnOnce(FetchResult) + Send>;

/// Token identifying one batch lifecycle
///
/// Returned by [`FetchCoordinator::start`](super::FetchCoordinator::start). A handle
/// becomes stale when its batch completes, is cancelled, or is superseded by a newer
/// `start`; cancelling a stale handle is a no-op.
#[derive(Clone, Debug)]
pub struct CancellationHandle {
    pub(super) generation: Generation,
    pub(super) token: CancellationToken,
}

impl CancellationHandle {
    /// Generation of the batch this handle controls
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// True once the batch has completed, been cancelled or been superseded
    pub fn is_invalidated(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The cooperative cancellation token shared with the batch's resolution tasks
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// The single in-flight batch of a coordinator
///
/// Owns the consumer callbacks: once a batch is replaced or finished its record
/// is dropped, so its callbacks can no longer be reached.
pub(super) struct LiveBatch {
    pub(super) generation: Generation,
    pub(super) token: CancellationToken,
    pub(super) on_progress: ProgressCallback,
    pub(super) on_complete: Option<CompletionCallback>,
    /// Highest progress value forwarded so far
    pub(super) high_water: f64,
}

impl LiveBatch {
    pub(super) fn handle(&self) -> CancellationHandle {
        CancellationHandle {
            generation: self.generation,
            token: self.token.clone(),
        }
    }

    pub(super) fn accepts(&self, generation: Generation) -> bool {
        self.generation == generation && !self.token.is_cancelled()
    }
}
