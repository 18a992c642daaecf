//! Selection model: an ordered, deduplicated, capacity-bounded set of chosen items.
//!
//! The model is owned by the presentation layer and mutated through `&mut self`;
//! wrap it in a mutex if several threads need to toggle items.

use crate::config::SelectionConfig;
use crate::error::{Error, Result};
use crate::types::{FetchBatch, MediaItem, SelectionState};

/// Identifier returned by [`SelectionModel::subscribe`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ChangeCallback = Box<dyn Fn(&SelectionState) + Send + Sync>;

/// Ordered selection of media items with a capacity limit
pub struct SelectionModel {
    items: Vec<MediaItem>,
    limit: usize,
    subscribers: Vec<(SubscriptionId, ChangeCallback)>,
    next_subscription: u64,
}

impl std::fmt::Debug for SelectionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionModel")
            .field("items", &self.items)
            .field("limit", &self.limit)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl SelectionModel {
    /// Create an empty selection holding at most `limit` items
    ///
    /// A limit of zero is rejected; see [`Config::validate`](crate::Config::validate).
    pub fn new(limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(Error::config(
                "selected_limit",
                "selected_limit must be at least 1",
            ));
        }
        Ok(Self {
            items: Vec::new(),
            limit,
            subscribers: Vec::new(),
            next_subscription: 0,
        })
    }

    /// Create an empty selection sized by `config`
    pub fn from_config(config: &SelectionConfig) -> Result<Self> {
        config.validate()?;
        Self::new(config.selected_limit)
    }

    /// Toggle an item in or out of the selection
    ///
    /// A present item is removed, keeping the relative order of the rest. An absent
    /// item is appended, unless the selection is full, in which case
    /// [`Error::LimitReached`] is returned and nothing changes. Subscribers are
    /// notified synchronously after every successful toggle.
    pub fn toggle(&mut self, item: MediaItem) -> Result<SelectionState> {
        if let Some(pos) = self.items.iter().position(|selected| *selected == item) {
            self.items.remove(pos);
            tracing::debug!(item = %item.id(), selected = self.items.len(), "Deselected item");
        } else if self.items.len() >= self.limit {
            tracing::debug!(item = %item.id(), limit = self.limit, "Selection limit reached");
            return Err(Error::LimitReached { limit: self.limit });
        } else {
            tracing::debug!(item = %item.id(), selected = self.items.len() + 1, "Selected item");
            self.items.push(item);
        }

        let state = self.current();
        self.notify(&state);
        Ok(state)
    }

    /// Remove every item, notifying subscribers if anything was selected
    pub fn clear(&mut self) -> SelectionState {
        if !self.items.is_empty() {
            self.items.clear();
            let state = self.current();
            self.notify(&state);
        }
        self.current()
    }

    /// Read-only snapshot of the selection
    pub fn current(&self) -> SelectionState {
        SelectionState::from_items(self.items.clone())
    }

    /// Capture the current selection as an immutable fetch batch
    pub fn snapshot(&self) -> FetchBatch {
        FetchBatch::new(self.items.iter().cloned())
    }

    /// Register a callback invoked with the new state after every change
    pub fn subscribe<F>(&mut self, on_change: F) -> SubscriptionId
    where
        F: Fn(&SelectionState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(on_change)));
        id
    }

    /// Remove a subscription; returns false if it was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    /// Whether the item is selected
    pub fn contains(&self, item: &MediaItem) -> bool {
        self.items.contains(item)
    }

    /// 1-based position of the item in selection order, as shown on selection badges
    pub fn position(&self, item: &MediaItem) -> Option<usize> {
        self.items
            .iter()
            .position(|selected| selected == item)
            .map(|p| p + 1)
    }

    /// Number of selected items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is selected
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether another absent item could be added
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.limit
    }

    /// Configured capacity
    pub fn limit(&self) -> usize {
        self.limit
    }

    fn notify(&self, state: &SelectionState) {
        for (_, callback) in &self.subscribers {
            callback(state);
        }
    }
}
