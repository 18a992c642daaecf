//! Batch driver and per-item resolution tasks.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ResolutionError;
use crate::progress::Epoch;
use crate::resolver::{AssetResolver, ProgressSink};
use crate::types::{
    CompletionPolicy, FetchBatch, FetchResult, Generation, MediaItem, ResolvedMedia,
};

use super::CoordinatorState;
use super::dispatch::Delivery;

/// Outcome of one item's resolution, `None` until its slot settles
type Slot = Option<Result<ResolvedMedia, ResolutionError>>;

/// Everything a batch driver needs, owned so the task is independent of the coordinator
pub(super) struct BatchContext {
    pub(super) generation: Generation,
    pub(super) batch: FetchBatch,
    pub(super) policy: CompletionPolicy,
    pub(super) epoch: Epoch,
    pub(super) token: CancellationToken,
    pub(super) resolver: Arc<dyn AssetResolver>,
    pub(super) state: Arc<CoordinatorState>,
    pub(super) delivery_tx: mpsc::UnboundedSender<Delivery>,
    pub(super) concurrency: usize,
    pub(super) video_image_share: f64,
}

/// Per-item view of the batch context
#[derive(Clone)]
struct ItemContext {
    generation: Generation,
    epoch: Epoch,
    token: CancellationToken,
    resolver: Arc<dyn AssetResolver>,
    state: Arc<CoordinatorState>,
    delivery_tx: mpsc::UnboundedSender<Delivery>,
    video_image_share: f64,
}

impl ItemContext {
    /// Map a phase-relative fraction into `[start, end]` of the item's progress
    /// and feed it to the aggregator.
    fn report(&self, item: &MediaItem, start: f64, end: f64, fraction: f64) {
        if self.token.is_cancelled() || fraction.is_nan() {
            return;
        }
        let value = start + (end - start) * fraction.clamp(0.0, 1.0);
        if let Some(aggregate) = self.state.aggregator.update_in(self.epoch, item.id(), value) {
            self.delivery_tx
                .send(Delivery::Progress {
                    generation: self.generation,
                    value: aggregate,
                })
                .ok();
        }
    }

    fn phase_sink(&self, item: &MediaItem, start: f64, end: f64) -> ProgressSink {
        let ctx = self.clone();
        let item = item.clone();
        ProgressSink::new(move |fraction| ctx.report(&item, start, end, fraction))
    }

    fn ensure_live(&self, item: &MediaItem) -> Result<(), ResolutionError> {
        if self.token.is_cancelled() {
            Err(ResolutionError::Cancelled {
                id: item.id().clone(),
            })
        } else {
            Ok(())
        }
    }
}

/// Drive one batch to completion or cancellation.
///
/// Phases:
/// 1. Resolve every item concurrently (bounded), each into its positional slot
/// 2. Abandon silently if the batch was cancelled at any point
/// 3. Assemble the order-preserving result and hand it to the dispatcher
///
/// Cancellation is cooperative. In-flight resolvers see the token and stop at
/// their next checkpoint; items not yet started are skipped.
pub(super) async fn run_batch(ctx: BatchContext) {
    let generation = ctx.generation;

    let slots = resolve_all(&ctx).await;

    if ctx.token.is_cancelled() {
        tracing::debug!(generation = generation.0, "Batch cancelled, discarding result");
        return;
    }

    let result = assemble_result(generation, &ctx.batch, slots, ctx.policy);
    ctx.delivery_tx
        .send(Delivery::Complete { generation, result })
        .ok();
}

/// Resolve all items with at most `concurrency` in flight, placing each outcome
/// in the slot of its batch position.
async fn resolve_all(ctx: &BatchContext) -> Vec<Slot> {
    let item_ctx = ItemContext {
        generation: ctx.generation,
        epoch: ctx.epoch,
        token: ctx.token.clone(),
        resolver: Arc::clone(&ctx.resolver),
        state: Arc::clone(&ctx.state),
        delivery_tx: ctx.delivery_tx.clone(),
        video_image_share: ctx.video_image_share,
    };

    let mut slots: Vec<Slot> = (0..ctx.batch.len()).map(|_| None).collect();
    let mut outcomes = stream::iter(ctx.batch.items().iter().cloned().enumerate())
        .map(|(position, item)| {
            let item_ctx = item_ctx.clone();
            async move {
                let outcome = resolve_item(&item_ctx, &item).await;
                if let Err(e) = &outcome {
                    settle_failure(&item_ctx, &item, e);
                }
                (position, outcome)
            }
        })
        .buffer_unordered(ctx.concurrency.max(1));

    while let Some((position, outcome)) = outcomes.next().await {
        if let Some(slot) = slots.get_mut(position) {
            *slot = Some(outcome);
        }
    }
    slots
}

/// Resolve one item: image phase, then (for videos) the video phase.
async fn resolve_item(
    ctx: &ItemContext,
    item: &MediaItem,
) -> Result<ResolvedMedia, ResolutionError> {
    ctx.ensure_live(item)?;

    let image_end = if item.is_video() {
        ctx.video_image_share
    } else {
        1.0
    };
    let image_sink = ctx.phase_sink(item, 0.0, image_end);
    let image = ctx
        .resolver
        .resolve_image(item, &image_sink, &ctx.token)
        .await?;
    ctx.ensure_live(item)?;
    ctx.report(item, 0.0, image_end, 1.0);

    let video = if item.is_video() {
        let video_sink = ctx.phase_sink(item, image_end, 1.0);
        let video = ctx
            .resolver
            .resolve_video(item, &video_sink, &ctx.token)
            .await?;
        ctx.ensure_live(item)?;
        ctx.report(item, image_end, 1.0, 1.0);
        Some(video)
    } else {
        None
    };

    Ok(ResolvedMedia {
        item: item.clone(),
        image,
        video,
    })
}

/// Log a failed item and count its slot as settled for progress purposes.
fn settle_failure(ctx: &ItemContext, item: &MediaItem, error: &ResolutionError) {
    if ctx.token.is_cancelled() || matches!(error, ResolutionError::Cancelled { .. }) {
        return;
    }
    tracing::warn!(
        generation = ctx.generation.0,
        item = %item.id(),
        error = %error,
        "Item resolution failed, omitting from result"
    );
    ctx.delivery_tx
        .send(Delivery::ItemFailed {
            generation: ctx.generation,
            id: item.id().clone(),
            error: error.to_string(),
        })
        .ok();
    ctx.report(item, 0.0, 1.0, 1.0);
}

/// Build the result in batch order from the settled slots.
pub(super) fn assemble_result(
    generation: Generation,
    batch: &FetchBatch,
    slots: Vec<Slot>,
    policy: CompletionPolicy,
) -> FetchResult {
    let mut items = Vec::with_capacity(batch.len());
    let mut failed = Vec::new();

    for (item, slot) in batch.items().iter().zip(slots) {
        match slot {
            Some(Ok(resolved)) => items.push(resolved),
            Some(Err(_)) | None => failed.push(item.id().clone()),
        }
    }

    if policy == CompletionPolicy::AllOrNothing && !failed.is_empty() {
        tracing::info!(
            generation = generation.0,
            failed = failed.len(),
            "All-or-nothing batch had failures, delivering no items"
        );
        items.clear();
    }

    FetchResult {
        generation,
        items,
        failed,
    }
}
