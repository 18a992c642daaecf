//! Asset resolution capability consumed by the fetch coordinator.
//!
//! The platform's asset-resolution primitive (photo library, cache, remote store,
//! video exporter) is supplied by the embedder through [`AssetResolver`]. The
//! coordinator never reimplements it; it only drives it concurrently, feeds the
//! reported progress into the aggregator and honours cancellation.

use crate::error::ResolutionError;
use crate::types::{ImagePayload, MediaItem, VideoAsset};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Progress-report sink handed to each resolution call
///
/// Fractions are relative to the call (0.0 = just started, 1.0 = done). Reports
/// made after cancellation are dropped.
#[derive(Clone)]
pub struct ProgressSink {
    report: Arc<dyn Fn(f64) + Send + Sync>,
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSink").finish_non_exhaustive()
    }
}

impl ProgressSink {
    /// Wrap a reporting function
    pub fn new<F>(report: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        Self {
            report: Arc::new(report),
        }
    }

    /// A sink that discards every report
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Report fractional progress of the current call
    pub fn report(&self, fraction: f64) {
        (self.report)(fraction);
    }
}

/// Resolves the binary payloads of library items
///
/// Implementations should check `cancel` at natural suspension points (for long
/// video exports, periodically) and return [`ResolutionError::Cancelled`] once it
/// fires. The coordinator additionally drops any result produced after
/// cancellation.
#[async_trait::async_trait]
pub trait AssetResolver: Send + Sync {
    /// Produce the image payload for `item` (the poster frame for videos)
    async fn resolve_image(
        &self,
        item: &MediaItem,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ImagePayload, ResolutionError>;

    /// Export the video asset of a video item
    async fn resolve_video(
        &self,
        item: &MediaItem,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<VideoAsset, ResolutionError>;
}
