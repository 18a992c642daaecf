//! Shared test helpers: a scripted in-memory resolver and callback collectors.

use crate::config::FetchConfig;
use crate::coordinator::FetchCoordinator;
use crate::error::ResolutionError;
use crate::resolver::{AssetResolver, ProgressSink};
use crate::types::{FetchResult, ImagePayload, MediaId, MediaItem, VideoAsset};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;

/// How the resolver behaves for one item
#[derive(Clone, Default)]
pub(crate) struct Script {
    /// Wait for this gate before finishing the image phase
    pub(crate) image_gate: Option<Arc<Notify>>,
    /// Wait for this gate before finishing the video phase
    pub(crate) video_gate: Option<Arc<Notify>>,
    /// Delay before the image phase finishes
    pub(crate) image_delay: Duration,
    /// Intermediate image progress reports
    pub(crate) image_steps: Vec<f64>,
    /// Number of periodic progress ticks during video export
    pub(crate) video_ticks: usize,
    /// Fail the image phase
    pub(crate) fail_image: bool,
    /// Fail the video phase
    pub(crate) fail_video: bool,
}

impl Script {
    pub(crate) fn gated(gate: &Arc<Notify>) -> Self {
        Self {
            image_gate: Some(Arc::clone(gate)),
            ..Self::default()
        }
    }

    pub(crate) fn delayed(ms: u64) -> Self {
        Self {
            image_delay: Duration::from_millis(ms),
            ..Self::default()
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail_image: true,
            ..Self::default()
        }
    }
}

/// In-memory [`AssetResolver`] driven by per-item scripts
#[derive(Default)]
pub(crate) struct ScriptedResolver {
    scripts: Mutex<HashMap<MediaId, Script>>,
    pub(crate) image_calls: AtomicUsize,
    pub(crate) video_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
    pub(crate) cancelled_observed: AtomicUsize,
}

impl ScriptedResolver {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn script(&self, id: &str, script: Script) {
        self.scripts.lock().unwrap().insert(MediaId::from(id), script);
    }

    fn script_for(&self, item: &MediaItem) -> Script {
        self.scripts
            .lock()
            .unwrap()
            .get(item.id())
            .cloned()
            .unwrap_or_default()
    }

    async fn wait_gate(
        &self,
        gate: Option<Arc<Notify>>,
        item: &MediaItem,
        cancel: &CancellationToken,
    ) -> Result<(), ResolutionError> {
        let Some(gate) = gate else {
            return Ok(());
        };
        tokio::select! {
            _ = gate.notified() => Ok(()),
            _ = cancel.cancelled() => {
                self.cancelled_observed.fetch_add(1, Ordering::SeqCst);
                Err(ResolutionError::Cancelled { id: item.id().clone() })
            }
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl AssetResolver for ScriptedResolver {
    async fn resolve_image(
        &self,
        item: &MediaItem,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ImagePayload, ResolutionError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(&self.in_flight, &self.max_in_flight);
        let script = self.script_for(item);

        for step in &script.image_steps {
            progress.report(*step);
            tokio::task::yield_now().await;
        }
        if !script.image_delay.is_zero() {
            tokio::time::sleep(script.image_delay).await;
        }
        self.wait_gate(script.image_gate.clone(), item, cancel).await?;

        if script.fail_image {
            return Err(ResolutionError::Image {
                id: item.id().clone(),
                reason: "scripted failure".into(),
            });
        }
        Ok(ImagePayload {
            data: item.id().as_str().as_bytes().to_vec(),
            width: 64,
            height: 48,
        })
    }

    async fn resolve_video(
        &self,
        item: &MediaItem,
        progress: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<VideoAsset, ResolutionError> {
        self.video_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script_for(item);

        for tick in 1..=script.video_ticks {
            if cancel.is_cancelled() {
                self.cancelled_observed.fetch_add(1, Ordering::SeqCst);
                return Err(ResolutionError::Cancelled {
                    id: item.id().clone(),
                });
            }
            progress.report(tick as f64 / script.video_ticks as f64);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        self.wait_gate(script.video_gate.clone(), item, cancel).await?;

        if script.fail_video {
            return Err(ResolutionError::Video {
                id: item.id().clone(),
                reason: "scripted export failure".into(),
            });
        }
        Ok(VideoAsset {
            location: format!("/tmp/{}.mp4", item.id()).into(),
            size_bytes: 1_000,
            duration: Some(Duration::from_secs(2)),
        })
    }
}

/// Channels receiving one batch's callbacks
pub(crate) struct Callbacks {
    pub(crate) progress: mpsc::UnboundedReceiver<f64>,
    pub(crate) complete: mpsc::UnboundedReceiver<FetchResult>,
}

/// Callback closures paired with the receivers that observe them
pub(crate) fn callbacks() -> (
    impl Fn(f64) + Send + Sync + 'static,
    impl FnOnce(FetchResult) + Send + 'static,
    Callbacks,
) {
    let (progress_tx, progress) = mpsc::unbounded_channel();
    let (complete_tx, complete) = mpsc::unbounded_channel();
    (
        move |value| {
            progress_tx.send(value).ok();
        },
        move |result| {
            complete_tx.send(result).ok();
        },
        Callbacks { progress, complete },
    )
}

impl Callbacks {
    /// Wait for the completion callback
    pub(crate) async fn completion(&mut self) -> FetchResult {
        tokio::time::timeout(Duration::from_secs(5), self.complete.recv())
            .await
            .expect("timed out waiting for completion")
            .expect("completion channel closed")
    }

    /// Assert no completion arrives within `ms`
    pub(crate) async fn assert_no_completion(&mut self, ms: u64) {
        let outcome = tokio::time::timeout(Duration::from_millis(ms), self.complete.recv()).await;
        match outcome {
            Err(_) | Ok(None) => {}
            Ok(Some(result)) => panic!("unexpected completion: {result:?}"),
        }
    }

    /// Every progress value received so far
    pub(crate) fn drain_progress(&mut self) -> Vec<f64> {
        let mut values = Vec::new();
        while let Ok(value) = self.progress.try_recv() {
            values.push(value);
        }
        values
    }
}

pub(crate) fn coordinator(resolver: &Arc<ScriptedResolver>) -> FetchCoordinator {
    coordinator_with(resolver, FetchConfig::default())
}

pub(crate) fn coordinator_with(
    resolver: &Arc<ScriptedResolver>,
    config: FetchConfig,
) -> FetchCoordinator {
    let resolver: Arc<dyn AssetResolver> = Arc::clone(resolver) as Arc<dyn AssetResolver>;
    FetchCoordinator::new(resolver, config).unwrap()
}
