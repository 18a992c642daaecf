//! Fetch coordination -- concurrent resolution of a batch with aggregated progress.
//!
//! Split into focused submodules:
//! - [`handle`] - Cancellation handles and the live-batch record
//! - [`batch`] - Batch driver and per-item resolution tasks
//! - [`dispatch`] - Consumer-facing delivery context for callbacks and events
//!
//! A coordinator runs at most one batch at a time. Every batch gets a fresh
//! [`Generation`]; deliveries carry the generation they were produced for and are
//! dropped unless it still names the live batch.

mod batch;
mod dispatch;
mod handle;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use handle::CancellationHandle;

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::progress::ProgressAggregator;
use crate::resolver::AssetResolver;
use crate::types::{Event, FetchBatch, FetchOptions, FetchResult, FetchState, Generation};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use batch::BatchContext;
use dispatch::Delivery;
use handle::LiveBatch;

/// State shared between the coordinator, its batch drivers and the dispatcher
pub(crate) struct CoordinatorState {
    /// The in-flight batch, if any
    live: Mutex<Option<LiveBatch>>,
    /// Held while a callback is delivered and while the live batch is swapped
    gate: Mutex<()>,
    /// Last generation handed out
    generation: AtomicU64,
    /// Progress of the live batch
    aggregator: ProgressAggregator,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<Event>,
    /// Lowest progress value forwarded once a batch has started
    progress_floor: f64,
}

impl CoordinatorState {
    fn live(&self) -> MutexGuard<'_, Option<LiveBatch>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the delivery gate unless this thread is already delivering one of
    /// this coordinator's callbacks
    fn enter_gate(&self) -> Option<MutexGuard<'_, ()>> {
        if dispatch::in_delivery(self) {
            None
        } else {
            Some(self.gate.lock().unwrap_or_else(PoisonError::into_inner))
        }
    }

    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

/// Orchestrates concurrent resolution of fetch batches
///
/// `start` and `cancel` are synchronous and may be called from any thread; the
/// work runs on the tokio runtime the coordinator was created on. Progress and
/// completion callbacks are invoked one at a time from a single dispatcher task,
/// never directly from resolution workers.
pub struct FetchCoordinator {
    state: Arc<CoordinatorState>,
    resolver: Arc<dyn AssetResolver>,
    config: FetchConfig,
    delivery_tx: mpsc::UnboundedSender<Delivery>,
    runtime: tokio::runtime::Handle,
}

impl std::fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FetchCoordinator {
    /// Create a coordinator bound to the current tokio runtime
    ///
    /// Fails with [`Error::NoRuntime`] outside a runtime and with
    /// [`Error::Config`] if `config` is invalid.
    pub fn new(resolver: Arc<dyn AssetResolver>, config: FetchConfig) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;
        Self::with_runtime(resolver, config, runtime)
    }

    /// Create a coordinator that drives its batches on `runtime`
    pub fn with_runtime(
        resolver: Arc<dyn AssetResolver>,
        config: FetchConfig,
        runtime: tokio::runtime::Handle,
    ) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(config.event_buffer);
        let state = Arc::new(CoordinatorState {
            live: Mutex::new(None),
            gate: Mutex::new(()),
            generation: AtomicU64::new(0),
            aggregator: ProgressAggregator::new(),
            event_tx,
            progress_floor: config.progress_floor,
        });

        let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();
        runtime.spawn(dispatch::run_dispatcher(Arc::clone(&state), delivery_rx));

        Ok(Self {
            state,
            resolver,
            config,
            delivery_tx,
            runtime,
        })
    }

    /// Start fetching `batch` with the configured completion policy
    ///
    /// Any live batch is cancelled first. `on_progress` receives the aggregate in
    /// `[0, 1]`, never decreasing and never below the configured floor;
    /// `on_complete` fires at most once with the order-preserving result, and
    /// never if the batch is cancelled or superseded.
    pub fn start<P, C>(&self, batch: FetchBatch, on_progress: P, on_complete: C) -> CancellationHandle
    where
        P: Fn(f64) + Send + Sync + 'static,
        C: FnOnce(FetchResult) + Send + 'static,
    {
        let options = FetchOptions {
            policy: self.config.completion_policy,
        };
        self.start_with(batch, options, on_progress, on_complete)
    }

    /// Start fetching `batch` with explicit per-batch options
    pub fn start_with<P, C>(
        &self,
        batch: FetchBatch,
        options: FetchOptions,
        on_progress: P,
        on_complete: C,
    ) -> CancellationHandle
    where
        P: Fn(f64) + Send + Sync + 'static,
        C: FnOnce(FetchResult) + Send + 'static,
    {
        let _gate = self.state.enter_gate();

        let generation = Generation(self.state.generation.fetch_add(1, Ordering::SeqCst) + 1);
        let token = CancellationToken::new();
        let epoch = self.state.aggregator.reset(batch.items());
        let live = LiveBatch {
            generation,
            token: token.clone(),
            on_progress: Arc::new(on_progress),
            on_complete: Some(Box::new(on_complete)),
            high_water: 0.0,
        };
        let handle = live.handle();

        let previous = self.state.live().replace(live);
        if let Some(previous) = previous {
            previous.token.cancel();
            tracing::debug!(
                generation = previous.generation.0,
                superseded_by = generation.0,
                "Superseding in-flight batch"
            );
            self.state.emit(Event::BatchCancelled {
                generation: previous.generation,
                superseded: true,
            });
        }

        tracing::info!(
            generation = generation.0,
            items = batch.len(),
            policy = ?options.policy,
            "Starting fetch batch"
        );
        self.state.emit(Event::BatchStarted {
            generation,
            items: batch.len(),
        });

        self.runtime.spawn(batch::run_batch(BatchContext {
            generation,
            batch,
            policy: options.policy,
            epoch,
            token,
            resolver: Arc::clone(&self.resolver),
            state: Arc::clone(&self.state),
            delivery_tx: self.delivery_tx.clone(),
            concurrency: self.config.max_concurrent_resolutions,
            video_image_share: self.config.video_image_share,
        }));

        handle
    }

    /// Cancel the batch identified by `handle`
    ///
    /// Idempotent; a no-op when the handle is stale. Returns true if a live batch
    /// was cancelled.
    pub fn cancel(&self, handle: &CancellationHandle) -> bool {
        let _gate = self.state.enter_gate();

        let cancelled = {
            let mut live = self.state.live();
            let matches = live
                .as_ref()
                .is_some_and(|batch| batch.generation == handle.generation);
            if matches { live.take() } else { None }
        };

        match cancelled {
            Some(batch) => {
                batch.token.cancel();
                self.state.aggregator.clear();
                tracing::info!(generation = batch.generation.0, "Fetch batch cancelled");
                self.state.emit(Event::BatchCancelled {
                    generation: batch.generation,
                    superseded: false,
                });
                true
            }
            None => {
                tracing::debug!(
                    generation = handle.generation.0,
                    "Ignoring cancel for stale handle"
                );
                false
            }
        }
    }

    /// Current coordinator state
    pub fn state(&self) -> FetchState {
        match self.state.live().as_ref() {
            Some(batch) => FetchState::Fetching {
                generation: batch.generation,
            },
            None => FetchState::Idle,
        }
    }

    /// Whether `handle` still controls the in-flight batch
    pub fn is_live(&self, handle: &CancellationHandle) -> bool {
        self.state
            .live()
            .as_ref()
            .is_some_and(|batch| batch.generation == handle.generation)
    }

    /// Subscribe to batch lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.state.event_tx.subscribe()
    }

    /// Batch lifecycle events as a stream
    pub fn events(&self) -> tokio_stream::wrappers::BroadcastStream<Event> {
        tokio_stream::wrappers::BroadcastStream::new(self.subscribe())
    }

    /// Fetch settings in effect
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

impl Drop for FetchCoordinator {
    fn drop(&mut self) {
        let _gate = self.state.enter_gate();
        let live = self.state.live().take();
        if let Some(batch) = live {
            batch.token.cancel();
            self.state.aggregator.clear();
            tracing::debug!(
                generation = batch.generation.0,
                "Coordinator dropped, cancelling in-flight batch"
            );
            self.state.emit(Event::BatchCancelled {
                generation: batch.generation,
                superseded: false,
            });
        }
    }
}
