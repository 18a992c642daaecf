//! Core types for mediasheet

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Opaque, stable identifier of an underlying library asset
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(String);

impl MediaId {
    /// Create a new MediaId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MediaId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MediaId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MediaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Media kind of a library asset
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image
    #[default]
    Image,
    /// Video; resolving it also exports a video asset
    Video,
}

/// One user-selectable library asset
///
/// Equality and hashing use the identifier only, so the same asset listed at two
/// positions compares equal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MediaItem {
    id: MediaId,
    kind: MediaKind,
    index: usize,
}

impl MediaItem {
    /// Create a media item at the given library position
    pub fn new(id: impl Into<MediaId>, kind: MediaKind, index: usize) -> Self {
        Self {
            id: id.into(),
            kind,
            index,
        }
    }

    /// Shorthand for an image item
    pub fn image(id: impl Into<MediaId>, index: usize) -> Self {
        Self::new(id, MediaKind::Image, index)
    }

    /// Shorthand for a video item
    pub fn video(id: impl Into<MediaId>, index: usize) -> Self {
        Self::new(id, MediaKind::Video, index)
    }

    /// Asset identifier
    pub fn id(&self) -> &MediaId {
        &self.id
    }

    /// Media kind
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Position of the item in the library listing it was picked from
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether resolving this item includes a video phase
    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }
}

impl PartialEq for MediaItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MediaItem {}

impl Hash for MediaItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Insertion-ordered, duplicate-free snapshot of the current selection
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    items: Vec<MediaItem>,
}

impl SelectionState {
    pub(crate) fn from_items(items: Vec<MediaItem>) -> Self {
        Self { items }
    }

    /// Selected items in selection order
    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    /// Identifiers in selection order
    pub fn ids(&self) -> Vec<&MediaId> {
        self.items.iter().map(MediaItem::id).collect()
    }

    /// Number of selected items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is selected
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the item is selected
    pub fn contains(&self, item: &MediaItem) -> bool {
        self.items.contains(item)
    }

    /// Iterate over selected items in order
    pub fn iter(&self) -> std::slice::Iter<'_, MediaItem> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a SelectionState {
    type Item = &'a MediaItem;
    type IntoIter = std::slice::Iter<'a, MediaItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Immutable ordered snapshot of the items to fetch
///
/// Cloning is cheap; the items are shared. Duplicate identifiers are dropped on
/// construction, keeping the first occurrence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchBatch {
    items: Arc<[MediaItem]>,
}

impl FetchBatch {
    /// Capture a batch from an ordered list of items
    pub fn new(items: impl IntoIterator<Item = MediaItem>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let items: Vec<MediaItem> = items
            .into_iter()
            .filter(|item| seen.insert(item.id().clone()))
            .collect();
        Self {
            items: items.into(),
        }
    }

    /// Items in batch order
    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    /// Number of items in the batch
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<&SelectionState> for FetchBatch {
    fn from(state: &SelectionState) -> Self {
        Self::new(state.items().iter().cloned())
    }
}

/// Monotonic counter identifying one batch lifecycle on a coordinator
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolved image data for one item
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImagePayload {
    /// Encoded image bytes
    pub data: Vec<u8>,
    /// Pixel width
    pub width: u32,
    /// Pixel height
    pub height: u32,
}

impl ImagePayload {
    /// Size of the encoded image in bytes
    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Exported video asset for a video item
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoAsset {
    /// Location of the exported file
    pub location: PathBuf,
    /// Exported file size in bytes
    pub size_bytes: u64,
    /// Playback duration, if known
    pub duration: Option<Duration>,
}

/// Fully resolved payload for one item
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedMedia {
    /// The source item
    pub item: MediaItem,
    /// Resolved image (poster frame for videos)
    pub image: ImagePayload,
    /// Exported video, present for video items
    pub video: Option<VideoAsset>,
}

/// Order-preserving outcome of a completed batch
///
/// `items` follows batch order with failed items omitted; `failed` lists the
/// omitted identifiers, also in batch order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResult {
    /// Generation of the batch that produced this result
    pub generation: Generation,
    /// Resolved payloads in batch order
    pub items: Vec<ResolvedMedia>,
    /// Items that failed to resolve
    pub failed: Vec<MediaId>,
}

impl FetchResult {
    /// Number of delivered payloads
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing was delivered
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether any item was omitted
    pub fn has_omissions(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Delivered identifiers in order
    pub fn ids(&self) -> Vec<&MediaId> {
        self.items.iter().map(|m| m.item.id()).collect()
    }

    /// Total bytes to send: image data of image items plus exported video files.
    ///
    /// The poster image of a video item is not counted.
    pub fn total_size_bytes(&self) -> u64 {
        let images: u64 = self
            .items
            .iter()
            .filter(|m| m.item.kind() == MediaKind::Image)
            .map(|m| m.image.size_bytes())
            .sum();
        let videos: u64 = self
            .items
            .iter()
            .filter_map(|m| m.video.as_ref())
            .map(|v| v.size_bytes)
            .sum();
        images + videos
    }
}

/// Observable coordinator state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FetchState {
    /// No batch in flight
    Idle,
    /// A batch is being resolved
    Fetching {
        /// Generation of the live batch
        generation: Generation,
    },
}

/// How item failures affect the delivered result
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Omit failed items and deliver the rest
    #[default]
    SkipFailed,
    /// Deliver nothing if any item failed
    AllOrNothing,
}

/// Per-batch options for [`FetchCoordinator::start_with`](crate::FetchCoordinator::start_with)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Failure policy for this batch
    #[serde(default)]
    pub policy: CompletionPolicy,
}

/// Event emitted during a batch lifecycle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batch started resolving
    BatchStarted {
        /// Batch generation
        generation: Generation,
        /// Number of items in the batch
        items: usize,
    },

    /// Aggregate progress forwarded to the consumer
    Progress {
        /// Batch generation
        generation: Generation,
        /// Aggregate progress (0.0 to 1.0)
        value: f64,
    },

    /// A single item failed and will be omitted
    ItemFailed {
        /// Batch generation
        generation: Generation,
        /// The failed item
        id: MediaId,
        /// Error message
        error: String,
    },

    /// The batch completed and its result was delivered
    BatchCompleted {
        /// Batch generation
        generation: Generation,
        /// Number of delivered payloads
        delivered: usize,
        /// Number of omitted items
        omitted: usize,
    },

    /// The batch was cancelled; no result is delivered for it
    BatchCancelled {
        /// Batch generation
        generation: Generation,
        /// True when a newer batch replaced it
        superseded: bool,
    },
}
