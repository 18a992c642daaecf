//! # mediasheet
//!
//! Selection and concurrent fetch coordination for media picker sheets.
//!
//! ## Design Philosophy
//!
//! mediasheet is designed to be:
//! - **Library-first** - No UI, purely the state behind a picker sheet
//! - **Order-preserving** - Results come back in selection order, however the work finishes
//! - **Cancellation-safe** - A cancelled or superseded batch never calls back again
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! The host supplies an [`AssetResolver`] that turns one [`MediaItem`] into image
//! bytes (and, for videos, an exported file). A [`SelectionModel`] tracks what the
//! user picked; a [`FetchCoordinator`] resolves a snapshot of that selection with
//! bounded concurrency and reports one aggregate progress value.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use mediasheet::{
//!     AssetResolver, Config, FetchCoordinator, ImagePayload, MediaItem, ProgressSink,
//!     ResolutionError, SelectionModel, VideoAsset,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! struct Library;
//!
//! #[async_trait::async_trait]
//! impl AssetResolver for Library {
//!     async fn resolve_image(
//!         &self,
//!         item: &MediaItem,
//!         _progress: &ProgressSink,
//!         _cancel: &CancellationToken,
//!     ) -> Result<ImagePayload, ResolutionError> {
//!         Err(ResolutionError::Unavailable { id: item.id().clone() })
//!     }
//!
//!     async fn resolve_video(
//!         &self,
//!         item: &MediaItem,
//!         _progress: &ProgressSink,
//!         _cancel: &CancellationToken,
//!     ) -> Result<VideoAsset, ResolutionError> {
//!         Err(ResolutionError::Unavailable { id: item.id().clone() })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let mut selection = SelectionModel::from_config(&config.selection)?;
//!     selection.toggle(MediaItem::image("IMG_0001", 0))?;
//!     selection.toggle(MediaItem::video("IMG_0002", 1))?;
//!
//!     let coordinator = FetchCoordinator::new(Arc::new(Library), config.fetch)?;
//!
//!     // Subscribe to events
//!     let mut events = coordinator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let (tx, rx) = tokio::sync::oneshot::channel();
//!     coordinator.start(
//!         selection.snapshot(),
//!         |progress| println!("progress: {:.0}%", progress * 100.0),
//!         move |result| {
//!             tx.send(result).ok();
//!         },
//!     );
//!
//!     let result = rx.await?;
//!     println!("{} items ready, {} omitted", result.len(), result.failed.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Fetch coordination (decomposed into focused submodules)
pub mod coordinator;
/// Error types
pub mod error;
/// Network conditions and send confirmation
pub mod network;
/// Progress aggregation across a batch
pub mod progress;
/// Asset resolution seam
pub mod resolver;
/// Selection model
pub mod selection;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, FetchConfig, SelectionConfig};
pub use coordinator::{CancellationHandle, FetchCoordinator};
pub use error::{Error, ResolutionError, Result};
pub use network::{
    DeliveryQuality, NetworkStateProbe, SendSummary, StaticNetworkProbe, requires_confirmation,
};
pub use progress::{Epoch, ProgressAggregator};
pub use resolver::{AssetResolver, ProgressSink};
pub use selection::{SelectionModel, SubscriptionId};
pub use types::{
    CompletionPolicy, Event, FetchBatch, FetchOptions, FetchResult, FetchState, Generation,
    ImagePayload, MediaId, MediaItem, MediaKind, ResolvedMedia, SelectionState, VideoAsset,
};
