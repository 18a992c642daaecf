//! In-memory media library used as the asset resolver in integration tests

use mediasheet::{
    AssetResolver, ImagePayload, MediaId, MediaItem, ProgressSink, ResolutionError, VideoAsset,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// One asset stored in the library
#[derive(Clone)]
struct Asset {
    image_bytes: usize,
    video_bytes: u64,
    latency: Duration,
    broken: bool,
    hold: Option<Arc<Notify>>,
}

impl Default for Asset {
    fn default() -> Self {
        Self {
            image_bytes: 256,
            video_bytes: 4_096,
            latency: Duration::ZERO,
            broken: false,
            hold: None,
        }
    }
}

/// Photo library backed by a map, with per-asset latency and failures
#[derive(Default)]
pub struct MemoryLibrary {
    assets: Mutex<HashMap<MediaId, Asset>>,
    /// Number of resolve calls that observed cancellation
    pub cancellations: AtomicUsize,
    /// Total image resolutions started
    pub image_requests: AtomicUsize,
}

impl MemoryLibrary {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn edit(&self, id: &str, f: impl FnOnce(&mut Asset)) {
        let mut assets = self.assets.lock().unwrap();
        f(assets.entry(MediaId::from(id)).or_default());
    }

    /// Add an asset whose image takes `latency_ms` to load
    pub fn add(&self, id: &str, image_bytes: usize, latency_ms: u64) {
        self.edit(id, |asset| {
            asset.image_bytes = image_bytes;
            asset.latency = Duration::from_millis(latency_ms);
        });
    }

    /// Make every resolution of `id` fail
    pub fn break_asset(&self, id: &str) {
        self.edit(id, |asset| asset.broken = true);
    }

    /// Block `id` until the returned gate is notified (or the fetch is cancelled)
    pub fn hold(&self, id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        let held = Arc::clone(&gate);
        self.edit(id, move |asset| asset.hold = Some(held));
        gate
    }

    fn asset(&self, id: &MediaId) -> Asset {
        self.assets
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    async fn wait(
        &self,
        asset: &Asset,
        item: &MediaItem,
        cancel: &CancellationToken,
    ) -> Result<(), ResolutionError> {
        let sleep = tokio::time::sleep(asset.latency);
        tokio::select! {
            _ = sleep => {}
            _ = cancel.cancelled() => return Err(self.cancelled(item)),
        }
        if let Some(gate) = &asset.hold {
            tokio::select! {
                _ = gate.notified() => {}
                _ = cancel.cancelled() => return Err(self.cancelled(item)),
            }
        }
        Ok(())
    }

    fn cancelled(&self, item: &MediaItem) -> ResolutionError {
        self.cancellations.fetch_add(1, Ordering::SeqCst);
        ResolutionError::Cancelled {
            id: item.id().clone(),
        }
    }
}

#[async_trait::async_trait]
impl AssetResolver for MemoryLibrary {
    async fn resolve_image(
        &self,
        item: &MediaItem,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ImagePayload, ResolutionError> {
        self.image_requests.fetch_add(1, Ordering::SeqCst);
        let asset = self.asset(item.id());
        progress.report(0.5);
        self.wait(&asset, item, cancel).await?;

        if asset.broken {
            return Err(ResolutionError::Unavailable {
                id: item.id().clone(),
            });
        }
        Ok(ImagePayload {
            data: vec![0xAB; asset.image_bytes],
            width: 1024,
            height: 768,
        })
    }

    async fn resolve_video(
        &self,
        item: &MediaItem,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<VideoAsset, ResolutionError> {
        let asset = self.asset(item.id());
        for step in 1..=4 {
            if cancel.is_cancelled() {
                return Err(self.cancelled(item));
            }
            progress.report(f64::from(step) / 4.0);
            tokio::task::yield_now().await;
        }
        Ok(VideoAsset {
            location: std::env::temp_dir().join(format!("{}.mp4", item.id())),
            size_bytes: asset.video_bytes,
            duration: Some(Duration::from_secs(12)),
        })
    }
}
