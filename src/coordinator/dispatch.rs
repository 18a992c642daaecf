//! Consumer-facing delivery context.
//!
//! Resolution workers never call consumer callbacks themselves. They hand
//! [`Delivery`] messages to a single dispatcher task, which checks each message's
//! generation against the live batch under the delivery gate and then invokes the
//! callback. `start` and `cancel` take the same gate to swap the live batch, so
//! once either returns no callback of a replaced batch can run.

use crate::types::{Event, FetchResult, Generation, MediaId};
use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError};
use tokio::sync::mpsc;

use super::CoordinatorState;

/// Message from a batch driver or resolution task to the dispatcher
#[derive(Debug)]
pub(super) enum Delivery {
    /// The aggregate changed
    Progress { generation: Generation, value: f64 },
    /// One item failed and will be omitted
    ItemFailed {
        generation: Generation,
        id: MediaId,
        error: String,
    },
    /// Every slot settled without cancellation
    Complete {
        generation: Generation,
        result: FetchResult,
    },
}

thread_local! {
    /// Coordinators whose callbacks are running on this thread, innermost last
    static DELIVERING: RefCell<Vec<*const CoordinatorState>> = const { RefCell::new(Vec::new()) };
}

/// True while this thread is running a callback of the coordinator owning `state`
pub(super) fn in_delivery(state: &CoordinatorState) -> bool {
    let key: *const CoordinatorState = state;
    DELIVERING.with(|delivering| delivering.borrow().contains(&key))
}

/// Run a consumer callback, recording `state` on this thread so re-entrant
/// `start`/`cancel` calls on the same coordinator skip the gate its dispatcher
/// already holds. Calls on any other coordinator still take that one's gate.
fn deliver(
    state: &CoordinatorState,
    generation: Generation,
    what: &'static str,
    callback: impl FnOnce(),
) {
    let key: *const CoordinatorState = state;
    DELIVERING.with(|delivering| delivering.borrow_mut().push(key));
    let outcome = catch_unwind(AssertUnwindSafe(callback));
    DELIVERING.with(|delivering| {
        let mut delivering = delivering.borrow_mut();
        if let Some(pos) = delivering.iter().rposition(|k| *k == key) {
            delivering.remove(pos);
        }
    });
    if outcome.is_err() {
        tracing::error!(generation = generation.0, callback = what, "Consumer callback panicked");
    }
}

/// Serially deliver callbacks until every sender is gone
pub(super) async fn run_dispatcher(
    state: Arc<CoordinatorState>,
    mut rx: mpsc::UnboundedReceiver<Delivery>,
) {
    while let Some(delivery) = rx.recv().await {
        match delivery {
            Delivery::Progress { generation, value } => {
                deliver_progress(&state, generation, value);
            }
            Delivery::ItemFailed {
                generation,
                id,
                error,
            } => {
                let live = state
                    .live()
                    .as_ref()
                    .is_some_and(|batch| batch.accepts(generation));
                if live {
                    state.emit(Event::ItemFailed {
                        generation,
                        id,
                        error,
                    });
                }
            }
            Delivery::Complete { generation, result } => {
                deliver_completion(&state, generation, result);
            }
        }
    }
    tracing::debug!("Fetch dispatcher stopped");
}

fn deliver_progress(state: &CoordinatorState, generation: Generation, aggregate: f64) {
    let _gate = state.gate.lock().unwrap_or_else(PoisonError::into_inner);

    let forward = {
        let mut live = state.live();
        match live.as_mut() {
            Some(batch) if batch.accepts(generation) => {
                let value = aggregate.max(state.progress_floor).min(1.0);
                if value > batch.high_water {
                    batch.high_water = value;
                    Some((Arc::clone(&batch.on_progress), value))
                } else {
                    None
                }
            }
            _ => {
                tracing::trace!(generation = generation.0, "Dropping stale progress");
                None
            }
        }
    };

    if let Some((on_progress, value)) = forward {
        state.emit(Event::Progress { generation, value });
        deliver(state, generation, "on_progress", || on_progress(value));
    }
}

fn deliver_completion(state: &CoordinatorState, generation: Generation, result: FetchResult) {
    let _gate = state.gate.lock().unwrap_or_else(PoisonError::into_inner);

    let finished = {
        let mut live = state.live();
        let accepts = live
            .as_ref()
            .is_some_and(|batch| batch.accepts(generation));
        if accepts { live.take() } else { None }
    };

    let Some(mut batch) = finished else {
        tracing::debug!(generation = generation.0, "Dropping stale completion");
        return;
    };

    // Completion invalidates the handle just like cancellation does.
    batch.token.cancel();
    state.aggregator.clear();

    tracing::info!(
        generation = generation.0,
        delivered = result.len(),
        omitted = result.failed.len(),
        "Fetch batch completed"
    );

    if batch.high_water < 1.0 {
        let on_progress = Arc::clone(&batch.on_progress);
        state.emit(Event::Progress {
            generation,
            value: 1.0,
        });
        deliver(state, generation, "on_progress", || on_progress(1.0));
    }

    state.emit(Event::BatchCompleted {
        generation,
        delivered: result.len(),
        omitted: result.failed.len(),
    });
    if let Some(on_complete) = batch.on_complete.take() {
        deliver(state, generation, "on_complete", || on_complete(result));
    }
}
