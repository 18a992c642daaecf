//! Progress aggregation across the items of one batch.
//!
//! The aggregator is a single serialized store shared by every resolution task.
//! Each [`reset`](ProgressAggregator::reset) opens a new epoch; updates tagged with
//! an older epoch, or naming an item outside the current set, are ignored so that a
//! superseded batch cannot move the progress of its successor.

use crate::types::{MediaId, MediaItem};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Identifies the item set installed by one [`ProgressAggregator::reset`] call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Epoch(u64);

#[derive(Debug, Default)]
struct ProgressMap {
    epoch: u64,
    entries: HashMap<MediaId, f64>,
}

impl ProgressMap {
    fn mean(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.entries.values().sum::<f64>() / self.entries.len() as f64
    }
}

/// Serialized mapping from item to fractional progress
///
/// Per-item values are clamped to `[0, 1]` and never move backwards within an
/// epoch, so the aggregate is non-decreasing while a batch runs.
#[derive(Debug, Default)]
pub struct ProgressAggregator {
    inner: Mutex<ProgressMap>,
}

impl ProgressAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tracked set with exactly `items`, all at zero
    pub fn reset<'a>(&self, items: impl IntoIterator<Item = &'a MediaItem>) -> Epoch {
        let mut map = self.lock();
        map.epoch += 1;
        map.entries = items
            .into_iter()
            .map(|item| (item.id().clone(), 0.0))
            .collect();
        Epoch(map.epoch)
    }

    /// Discard every entry (batch completed or cancelled)
    pub fn clear(&self) {
        let mut map = self.lock();
        map.epoch += 1;
        map.entries.clear();
    }

    /// Record progress for an item in the current set
    ///
    /// Returns the new aggregate, or `None` when the item is not tracked.
    pub fn update(&self, id: &MediaId, value: f64) -> Option<f64> {
        let mut map = self.lock();
        Self::apply(&mut map, id, value)
    }

    /// Record progress only if `epoch` is still the current one
    pub fn update_in(&self, epoch: Epoch, id: &MediaId, value: f64) -> Option<f64> {
        let mut map = self.lock();
        if map.epoch != epoch.0 {
            return None;
        }
        Self::apply(&mut map, id, value)
    }

    /// Arithmetic mean over the current set; 0 when the set is empty
    pub fn aggregate(&self) -> f64 {
        self.lock().mean()
    }

    /// Current value for one item
    pub fn value_of(&self, id: &MediaId) -> Option<f64> {
        self.lock().entries.get(id).copied()
    }

    /// Number of tracked items
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether no items are tracked
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Whether `epoch` is the current one
    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.lock().epoch == epoch.0
    }

    fn apply(map: &mut ProgressMap, id: &MediaId, value: f64) -> Option<f64> {
        if value.is_nan() {
            return None;
        }
        let entry = map.entries.get_mut(id)?;
        *entry = entry.max(value.clamp(0.0, 1.0));
        Some(map.mean())
    }

    fn lock(&self) -> MutexGuard<'_, ProgressMap> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
