//! The preview facade: one transport, one compositor, one shared playhead.

use cutline_core::{CutlineError, Frame};
use cutline_media::{MediaElement, MediaPool, PoolConfig};
use cutline_playback::{FrameRequestId, FrameScheduler, PlaybackState, Transport, TransportConfig};
use cutline_timeline::{AssetLookup, Playhead, TimelineSnapshot};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::compositor::{Compositor, CompositorConfig, CompositorError, Evaluation};
use crate::layers::Viewport;
use crate::output::OutputTarget;

/// Configuration for every preview component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub pool: PoolConfig,
    pub transport: TransportConfig,
    pub compositor: CompositorConfig,
}

impl PreviewConfig {
    pub fn from_json(data: &[u8]) -> Result<Self, CompositorError> {
        let config: Self = serde_json::from_slice(data)
            .map_err(|e| CutlineError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, CompositorError> {
        let data = std::fs::read(path).map_err(CutlineError::from)?;
        Self::from_json(&data)
    }

    fn validate(&self) -> Result<(), CompositorError> {
        if self.pool.pool_size == 0 {
            return Err(CompositorError::Config("pool.pool_size must be at least 1".into()));
        }
        if self.transport.max_frames_per_tick == 0 {
            return Err(CompositorError::Config(
                "transport.max_frames_per_tick must be at least 1".into(),
            ));
        }
        if !(self.transport.min_rate > 0.0 && self.transport.min_rate <= self.transport.max_rate) {
            return Err(CompositorError::Config(format!(
                "invalid rate range {}..{}",
                self.transport.min_rate, self.transport.max_rate
            )));
        }
        Ok(())
    }
}

/// Inputs of the last applied evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Applied {
    frame: Frame,
    revision: u64,
    playback: PlaybackState,
}

/// Drives a [`Compositor`] from a [`Transport`].
///
/// The host forwards every frame callback to [`Preview::on_animation_frame`];
/// both components share the scheduler, and each ignores requests it did not
/// issue. A new evaluation runs whenever the playhead, the timeline revision
/// or the play state has changed since the last applied one.
pub struct Preview<E, S, T, A>
where
    E: MediaElement,
    S: FrameScheduler + Clone,
    T: OutputTarget,
    A: AssetLookup,
{
    transport: Transport<S>,
    compositor: Compositor<E, S, T>,
    snapshot: TimelineSnapshot,
    assets: A,
    playhead: Playhead,
    applied: Option<Applied>,
}

impl<E, S, T, A> Preview<E, S, T, A>
where
    E: MediaElement,
    S: FrameScheduler + Clone,
    T: OutputTarget,
    A: AssetLookup,
{
    pub fn new(
        config: PreviewConfig,
        scheduler: S,
        snapshot: TimelineSnapshot,
        assets: A,
        target: T,
        make_element: impl FnMut(usize) -> E,
    ) -> Self {
        let playhead = Playhead::new(0);
        let pool = Arc::new(MediaPool::new(config.pool, make_element));
        let transport = Transport::new(
            config.transport,
            scheduler.clone(),
            playhead.clone(),
            snapshot.fps,
            snapshot.duration,
        );
        let compositor = Compositor::new(config.compositor, pool, scheduler, target);
        info!(
            fps = %snapshot.fps,
            duration = snapshot.duration,
            clips = snapshot.clips.len(),
            "Preview created"
        );
        Self {
            transport,
            compositor,
            snapshot,
            assets,
            playhead,
            applied: None,
        }
    }

    pub fn transport(&self) -> &Transport<S> {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport<S> {
        &mut self.transport
    }

    pub fn compositor(&self) -> &Compositor<E, S, T> {
        &self.compositor
    }

    pub fn pool(&self) -> &Arc<MediaPool<E>> {
        self.compositor.pool()
    }

    pub fn target(&self) -> &T {
        self.compositor.target()
    }

    pub fn playhead(&self) -> &Playhead {
        &self.playhead
    }

    pub fn snapshot(&self) -> &TimelineSnapshot {
        &self.snapshot
    }

    pub fn assets(&self) -> &A {
        &self.assets
    }

    /// Swap in a new timeline. The transport re-clamps the playhead, and the
    /// next refresh re-evaluates. A timeline with an unusable frame rate is
    /// rejected and the current one stays.
    pub fn set_timeline(&mut self, snapshot: TimelineSnapshot) -> Result<(), CompositorError> {
        if !snapshot.fps.is_valid() {
            return Err(CutlineError::InvalidParameter(format!(
                "frame rate {}/{} must have non-zero terms",
                snapshot.fps.numerator, snapshot.fps.denominator
            ))
            .into());
        }
        self.transport.set_timeline(snapshot.fps, snapshot.duration);
        debug!(revision = snapshot.revision, duration = snapshot.duration, "Timeline updated");
        self.snapshot = snapshot;
        self.applied = None;
        Ok(())
    }

    pub fn set_assets(&mut self, assets: A) {
        self.assets = assets;
        self.applied = None;
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.compositor.set_viewport(viewport);
        self.applied = None;
    }

    /// Forward a host frame callback to both components, then refresh.
    pub async fn on_animation_frame(
        &mut self,
        id: FrameRequestId,
        timestamp_ms: f64,
    ) -> Result<Option<Evaluation>, CompositorError> {
        self.transport.on_animation_frame(id, timestamp_ms);
        self.compositor.on_animation_frame(id);
        self.refresh().await
    }

    /// Evaluate the current frame unless nothing has changed since the last
    /// applied evaluation.
    pub async fn refresh(&mut self) -> Result<Option<Evaluation>, CompositorError> {
        let playback = self.transport.playback_state();
        let key = Applied {
            frame: self.playhead.get(),
            revision: self.snapshot.revision,
            playback,
        };
        if self.applied == Some(key) {
            return Ok(None);
        }

        let evaluation = self
            .compositor
            .evaluate(&self.snapshot, &self.assets, &self.playhead, playback)
            .await?;
        if let Evaluation::Applied(report) = &evaluation {
            self.applied = Some(Applied {
                frame: report.frame,
                ..key
            });
        }
        Ok(Some(evaluation))
    }

    pub fn dispose(&mut self) {
        self.transport.dispose();
        self.compositor.dispose();
        self.applied = None;
        info!("Preview disposed");
    }
}
