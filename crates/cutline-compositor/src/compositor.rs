//! Preview Compositor.
//!
//! One evaluation pass reads the playhead once, resolves the active clips,
//! prepares their media through the pool, resolves transforms, and stages
//! layer styles for the next flush. If the playhead moves while the pass is
//! waiting on the pool, the pass is dropped rather than applied late.
//!
//! Failures are per clip: a clip whose media cannot be prepared is left out
//! of this frame and reported, while every other clip still renders.

use cutline_core::{CutlineError, Frame};
use cutline_media::{MediaElement, MediaError, MediaPool};
use cutline_playback::{FrameRequestId, FrameScheduler, PlaybackState};
use cutline_timeline::{
    upcoming_assets, AssetId, AssetLookup, ClipId, IntegrityViolation, Playhead, TimelineSnapshot,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::audio::sync_audio;
use crate::layers::{Layer, LayerStyle, LayerTree, Viewport};
use crate::output::OutputTarget;

#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Preview has been disposed")]
    Disposed,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CutlineError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    pub viewport: Viewport,
    /// How far ahead of the playhead upcoming clips are preloaded.
    pub preload_horizon_frames: Frame,
    /// Defer output writes to the next scheduled frame.
    pub batch_writes: bool,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            preload_horizon_frames: 60,
            batch_writes: true,
        }
    }
}

/// A clip left out of a frame because its media could not be prepared.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipFailure {
    pub clip_id: ClipId,
    pub asset_id: AssetId,
    pub error: MediaError,
}

/// What one applied evaluation did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub frame: Frame,
    pub revision: u64,
    /// Visual layers staged.
    pub layers: usize,
    /// Audio-bearing elements synced.
    pub audible: usize,
    pub failures: Vec<ClipFailure>,
    /// Clips shown with a seek that timed out.
    pub stale: Vec<ClipId>,
    pub violations: Vec<IntegrityViolation>,
    pub preloads_started: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Applied(FrameReport),
    /// The playhead moved from `frame` to `current` mid-pass; nothing staged.
    Superseded { frame: Frame, current: Frame },
}

impl Evaluation {
    pub fn report(&self) -> Option<&FrameReport> {
        match self {
            Evaluation::Applied(report) => Some(report),
            Evaluation::Superseded { .. } => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Evaluation::Superseded { .. })
    }
}

pub struct Compositor<E: MediaElement, S: FrameScheduler, T: OutputTarget> {
    config: CompositorConfig,
    pool: Arc<MediaPool<E>>,
    scheduler: S,
    target: T,
    tree: LayerTree,
    pending_flush: Option<FrameRequestId>,
    disposed: bool,
}

impl<E: MediaElement, S: FrameScheduler, T: OutputTarget> Compositor<E, S, T> {
    pub fn new(config: CompositorConfig, pool: Arc<MediaPool<E>>, scheduler: S, target: T) -> Self {
        Self {
            config,
            pool,
            scheduler,
            target,
            tree: LayerTree::new(),
            pending_flush: None,
            disposed: false,
        }
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<MediaPool<E>> {
        &self.pool
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn viewport(&self) -> Viewport {
        self.config.viewport
    }

    /// Forwarded container resize; applies from the next evaluation.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.config.viewport = viewport;
    }

    /// Evaluate the frame under `playhead` and stage the result.
    pub async fn evaluate<A>(
        &mut self,
        snapshot: &TimelineSnapshot,
        assets: &A,
        playhead: &Playhead,
        playback: PlaybackState,
    ) -> Result<Evaluation, CompositorError>
    where
        A: AssetLookup + ?Sized,
    {
        if self.disposed {
            return Err(CompositorError::Disposed);
        }
        if !snapshot.fps.is_valid() {
            return Err(CutlineError::InvalidParameter(format!(
                "frame rate {}/{} must have non-zero terms",
                snapshot.fps.numerator, snapshot.fps.denominator
            ))
            .into());
        }

        let frame = playhead.get();
        let active = snapshot.active_at(frame);
        for violation in &active.violations {
            warn!(%violation, "Clip excluded: timeline data is inconsistent");
        }

        let mut report = FrameReport {
            frame,
            revision: snapshot.revision,
            violations: active.violations.clone(),
            ..FrameReport::default()
        };
        let mut layers = Vec::with_capacity(active.len());
        let mut active_assets = HashSet::new();
        // Slots handed out during this pass.
        let mut pinned = HashSet::new();

        for (z_index, item) in active.iter().enumerate() {
            let clip = item.clip;
            let Some(asset) = assets.get_asset(&clip.asset_id) else {
                warn!(clip = %clip.id, asset = %clip.asset_id, "Asset not found; clip skipped");
                report.failures.push(ClipFailure {
                    clip_id: clip.id,
                    asset_id: clip.asset_id.clone(),
                    error: MediaError::UnknownAsset(clip.asset_id.clone()),
                });
                continue;
            };
            active_assets.insert(asset.id.clone());

            let mut slot = None;
            if asset.needs_element() {
                let target_secs = snapshot.fps.frames_to_seconds(item.local_frame);
                let acquired = self
                    .pool
                    .acquire_pinned(asset, target_secs, playback.is_playing, &pinned)
                    .await;

                let current = playhead.get();
                if current != frame {
                    debug!(frame, current, "Evaluation superseded");
                    return Ok(Evaluation::Superseded { frame, current });
                }

                match acquired {
                    Ok(handle) => {
                        pinned.insert(handle.slot());
                        slot = Some(handle.slot());
                        if handle.is_stale() {
                            warn!(clip = %clip.id, asset = %asset.id, frame, "Showing possibly stale frame");
                            report.stale.push(clip.id);
                        }
                        let synced = if asset.carries_audio() {
                            sync_audio(&handle, &playback, item.track)
                        } else {
                            handle.sync_playback(playback.is_playing, playback.rate)
                        };
                        match synced {
                            Ok(()) if asset.carries_audio() => report.audible += 1,
                            Ok(()) => {}
                            Err(err) => {
                                warn!(clip = %clip.id, error = %err, "Playback sync failed");
                                report.failures.push(ClipFailure {
                                    clip_id: clip.id,
                                    asset_id: asset.id.clone(),
                                    error: err,
                                });
                            }
                        }
                    }
                    Err(MediaError::Disposed) => return Err(CompositorError::Disposed),
                    Err(err) => {
                        warn!(clip = %clip.id, asset = %asset.id, error = %err, "Clip skipped for this frame");
                        report.failures.push(ClipFailure {
                            clip_id: clip.id,
                            asset_id: asset.id.clone(),
                            error: err,
                        });
                        continue;
                    }
                }
            }

            if asset.is_visual() {
                let state = clip.visual_state_at(frame);
                layers.push(Layer {
                    clip_id: clip.id,
                    asset_id: clip.asset_id.clone(),
                    slot,
                    style: LayerStyle::project(
                        &state,
                        self.config.viewport,
                        z_index as i32,
                        clip.is_animating_at(frame),
                    ),
                });
            }
        }

        self.pool.pause_except(&active_assets);
        let upcoming = upcoming_assets(snapshot, frame, self.config.preload_horizon_frames);
        if !upcoming.is_empty() {
            report.preloads_started = self.pool.preload(&upcoming, assets);
        }

        report.layers = layers.len();
        self.tree.stage(frame, layers);
        if self.config.batch_writes {
            self.schedule_flush();
        } else {
            self.flush();
        }

        trace!(frame, layers = report.layers, audible = report.audible, "Frame evaluated");
        Ok(Evaluation::Applied(report))
    }

    /// Handle a host frame callback. Flushes staged writes if `id` is the
    /// flush this compositor requested.
    pub fn on_animation_frame(&mut self, id: FrameRequestId) -> bool {
        if self.pending_flush != Some(id) {
            return false;
        }
        self.pending_flush = None;
        self.flush()
    }

    /// Write staged layers to the output now. Returns whether anything was
    /// staged.
    pub fn flush(&mut self) -> bool {
        match self.tree.take_batch() {
            Some(batch) => {
                if !batch.is_empty() {
                    self.target.apply(&batch);
                }
                true
            }
            None => false,
        }
    }

    pub fn has_pending_flush(&self) -> bool {
        self.pending_flush.is_some()
    }

    /// Tear down: cancel the pending flush, release all media, clear output.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(id) = self.pending_flush.take() {
            self.scheduler.cancel_frame(id);
        }
        self.pool.dispose();
        let batch = self.tree.clear();
        if !batch.is_empty() {
            self.target.apply(&batch);
        }
        self.disposed = true;
        debug!("Compositor disposed");
    }

    fn schedule_flush(&mut self) {
        if self.pending_flush.is_none() {
            self.pending_flush = Some(self.scheduler.request_frame());
        }
    }
}
