//! Real-time playback loop.
//!
//! Stands in for a browser host: a display-rate interval delivers pending
//! frame requests to the preview with wall-clock timestamps.

use anyhow::Result;
use cutline_compositor::{Evaluation, Preview, PreviewConfig, TracingTarget};
use cutline_core::Frame;
use cutline_media::SimulatedBackend;
use cutline_playback::{ManualScheduler, TransportEvent};
use cutline_timeline::TimelineFile;
use std::fmt;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::PlayArgs;

#[derive(Debug, Default)]
pub struct RunStats {
    pub frames_advanced: usize,
    pub final_frame: Frame,
    pub evaluations: usize,
    pub superseded: usize,
    pub clip_failures: usize,
    pub stale_frames: usize,
    pub max_layers: usize,
    pub preloads: usize,
    pub media_loads: usize,
    pub media_seeks: usize,
}

impl RunStats {
    fn record(&mut self, evaluation: &Evaluation) {
        match evaluation {
            Evaluation::Applied(report) => {
                self.evaluations += 1;
                self.clip_failures += report.failures.len();
                self.stale_frames += report.stale.len();
                self.max_layers = self.max_layers.max(report.layers);
                self.preloads += report.preloads_started;
            }
            Evaluation::Superseded { .. } => self.superseded += 1,
        }
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "frames advanced: {}", self.frames_advanced)?;
        writeln!(f, "final frame:     {}", self.final_frame)?;
        writeln!(
            f,
            "evaluations:     {} ({} superseded)",
            self.evaluations, self.superseded
        )?;
        writeln!(f, "max layers:      {}", self.max_layers)?;
        writeln!(
            f,
            "clip failures:   {} ({} stale frames)",
            self.clip_failures, self.stale_frames
        )?;
        write!(
            f,
            "media:           {} loads, {} seeks, {} preloads",
            self.media_loads, self.media_seeks, self.preloads
        )
    }
}

pub async fn play(file: TimelineFile, config: PreviewConfig, args: &PlayArgs) -> Result<RunStats> {
    let (snapshot, assets) = file.timeline.into_parts();
    let backend = SimulatedBackend::new();
    let scheduler = ManualScheduler::new();
    let mut preview = Preview::new(
        config,
        scheduler.clone(),
        snapshot,
        assets,
        TracingTarget::new(),
        |_| backend.element(),
    );

    let rate = preview.transport_mut().set_playback_rate(args.rate);
    if (rate - args.rate).abs() > f64::EPSILON {
        warn!(requested = args.rate, applied = rate, "Playback rate clamped");
    }
    preview.transport_mut().seek(args.start);
    let events = preview.transport_mut().subscribe();

    let mut stats = RunStats::default();
    if let Some(evaluation) = preview.refresh().await? {
        stats.record(&evaluation);
    }
    preview.transport_mut().play();

    let started = Instant::now();
    let deadline = started + Duration::from_secs_f64(args.seconds);
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / args.refresh_hz));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while Instant::now() < deadline && (preview.transport().is_playing() || scheduler.has_pending()) {
        ticker.tick().await;
        let timestamp_ms = started.elapsed().as_secs_f64() * 1000.0;
        for id in scheduler.take_pending() {
            if let Some(evaluation) = preview.on_animation_frame(id, timestamp_ms).await? {
                stats.record(&evaluation);
            }
        }
    }

    stats.frames_advanced = events
        .try_iter()
        .filter(|event| matches!(event, TransportEvent::Frame(_)))
        .count();
    stats.final_frame = preview.transport().current_frame();
    stats.media_loads = backend.load_count();
    stats.media_seeks = backend.seek_count();
    debug!(pool = ?preview.pool().stats(), "Pool state at exit");

    preview.dispose();
    Ok(stats)
}
