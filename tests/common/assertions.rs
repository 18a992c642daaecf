//! Custom test assertions for integration tests

use mediasheet::{CancellationHandle, Event, FetchBatch, FetchCoordinator, FetchResult};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// Outcome of waiting for a batch
#[derive(Debug)]
pub enum WaitResult {
    /// The completion callback fired
    Completed(FetchResult),
    /// The completion callback was dropped without firing
    Dropped,
    /// Timeout waiting for completion
    Timeout,
}

/// A started batch with its observed progress values
pub struct Started {
    pub handle: CancellationHandle,
    pub progress: Arc<Mutex<Vec<f64>>>,
    completion: oneshot::Receiver<FetchResult>,
}

impl Started {
    /// Wait for the completion callback
    pub async fn wait(self, timeout: Duration) -> WaitResult {
        match tokio::time::timeout(timeout, self.completion).await {
            Ok(Ok(result)) => WaitResult::Completed(result),
            Ok(Err(_)) => WaitResult::Dropped,
            Err(_) => WaitResult::Timeout,
        }
    }

    /// Progress values seen so far
    pub fn progress_values(&self) -> Vec<f64> {
        self.progress.lock().unwrap().clone()
    }
}

/// Start `batch` and capture its callbacks
pub fn start_batch(coordinator: &FetchCoordinator, batch: FetchBatch) -> Started {
    let progress = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&progress);
    let (tx, completion) = oneshot::channel();
    let handle = coordinator.start(
        batch,
        move |value| sink.lock().unwrap().push(value),
        move |result| {
            tx.send(result).ok();
        },
    );
    Started {
        handle,
        progress,
        completion,
    }
}

/// Expect a completed batch, panicking with the actual outcome otherwise
pub async fn expect_completed(started: Started) -> FetchResult {
    match started.wait(Duration::from_secs(5)).await {
        WaitResult::Completed(result) => result,
        other => panic!("expected completion, got {other:?}"),
    }
}

/// Assert progress values never decrease, stay in `[floor, 1]` and end at 1.0
pub fn assert_progress_well_formed(values: &[f64], floor: f64) {
    assert!(!values.is_empty(), "no progress reported");
    for window in values.windows(2) {
        assert!(window[0] <= window[1], "progress went backwards: {values:?}");
    }
    for value in values {
        assert!(
            (floor..=1.0).contains(value),
            "progress {value} outside [{floor}, 1]"
        );
    }
    assert_eq!(values.last().copied(), Some(1.0), "progress did not finish");
}

/// Collect every event already buffered on `events`
pub fn drain_events(events: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}
