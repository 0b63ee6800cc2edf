//! The preview loop end to end: transport ticks, pooled media, output.

use cutline_compositor::{Evaluation, Preview, PreviewConfig, RecordingTarget};
use cutline_core::FrameRate;
use cutline_media::{MediaError, SimulatedBackend, SimulatedElement};
use cutline_playback::{ManualScheduler, TransportState};
use cutline_timeline::{AssetId, Clip, ClipId, MediaAsset, TimelineFile, TimelineSnapshot, Track};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

type TestPreview =
    Preview<SimulatedElement, ManualScheduler, RecordingTarget, HashMap<AssetId, MediaAsset>>;

const DEMO: &str = include_str!("../../../demos/timeline.json");
const FRAME_MS: f64 = 1000.0 / 30.0;

// ── Helpers ────────────────────────────────────────────────────

struct Harness {
    preview: TestPreview,
    scheduler: ManualScheduler,
    backend: Arc<SimulatedBackend>,
    now_ms: f64,
}

impl Harness {
    fn new(snapshot: TimelineSnapshot, assets: HashMap<AssetId, MediaAsset>) -> Self {
        Self::with_backend(snapshot, assets, SimulatedBackend::new())
    }

    fn demo(backend: Arc<SimulatedBackend>) -> Self {
        let (snapshot, assets) = TimelineFile::from_json(DEMO.as_bytes())
            .unwrap()
            .timeline
            .into_parts();
        Self::with_backend(snapshot, assets, backend)
    }

    fn with_backend(
        snapshot: TimelineSnapshot,
        assets: HashMap<AssetId, MediaAsset>,
        backend: Arc<SimulatedBackend>,
    ) -> Self {
        let scheduler = ManualScheduler::new();
        let preview = Preview::new(
            PreviewConfig::default(),
            scheduler.clone(),
            snapshot,
            assets,
            RecordingTarget::new(),
            |_| backend.element(),
        );
        Self {
            preview,
            scheduler,
            backend,
            now_ms: 0.0,
        }
    }

    /// Deliver everything pending, then advance the host clock by `step_ms`.
    async fn tick(&mut self, step_ms: f64) -> Vec<Evaluation> {
        let mut evaluations = Vec::new();
        for id in self.scheduler.take_pending() {
            if let Some(evaluation) = self.preview.on_animation_frame(id, self.now_ms).await.unwrap() {
                evaluations.push(evaluation);
            }
        }
        self.now_ms += step_ms;
        evaluations
    }

    /// Tick until nothing is pending or `max_ticks` is reached.
    async fn run(&mut self, step_ms: f64, max_ticks: usize) -> Vec<Evaluation> {
        let mut evaluations = Vec::new();
        for _ in 0..max_ticks {
            if !self.scheduler.has_pending() {
                break;
            }
            evaluations.extend(self.tick(step_ms).await);
            assert!(self.preview.pool().stats().bound <= self.preview.pool().size());
        }
        evaluations
    }
}

fn clip_for(preview: &TestPreview, asset: &str) -> ClipId {
    preview
        .snapshot()
        .clips
        .values()
        .find(|c| c.asset_id.as_str() == asset)
        .map(|c| c.id)
        .unwrap()
}

// ── Playback ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn demo_plays_to_the_end() {
    let mut h = Harness::demo(SimulatedBackend::new());
    h.preview.refresh().await.unwrap();
    h.preview.transport_mut().play();

    let evaluations = h.run(FRAME_MS, 1000).await;

    assert_eq!(h.preview.transport().state(), TransportState::Paused);
    assert_eq!(h.preview.transport().current_frame(), 360);
    assert!(evaluations.iter().all(|e| !e.is_superseded()));
    assert!(evaluations
        .iter()
        .filter_map(Evaluation::report)
        .all(|r| r.failures.is_empty()));
    // Nothing is active at the end frame, so the output is empty again.
    assert!(h.preview.target().is_empty());
    assert_eq!(h.preview.target().last_frame(), Some(360));

    let last = evaluations.last().and_then(Evaluation::report).unwrap();
    assert_eq!(last.frame, 360);
    assert_eq!(last.audible, 0);
}

#[tokio::test(start_paused = true)]
async fn layers_follow_the_playhead() {
    let mut h = Harness::demo(SimulatedBackend::new());
    h.preview.transport_mut().seek(150);
    h.preview.refresh().await.unwrap();
    h.tick(0.0).await;

    let target = h.preview.target();
    let interview = clip_for(&h.preview, "interview");
    let title = clip_for(&h.preview, "lower-third");
    assert_eq!(target.stack(), vec![interview, title]);
    assert_eq!(target.layer(title).unwrap().opacity, 0.0);
    assert!(target.layer(title).unwrap().will_change);
}

#[tokio::test(start_paused = true)]
async fn double_rate_advances_two_frames_per_tick() {
    let mut h = Harness::demo(SimulatedBackend::new());
    h.preview.transport_mut().set_playback_rate(2.0);
    h.preview.transport_mut().play();

    // The first tick only establishes the time base.
    h.tick(FRAME_MS).await;
    for _ in 0..10 {
        h.tick(FRAME_MS).await;
    }
    assert_eq!(h.preview.transport().current_frame(), 20);
}

#[tokio::test(start_paused = true)]
async fn sequential_assets_cycle_through_a_small_pool() {
    let track = Track::new("V1", 0);
    let mut assets = HashMap::new();
    let mut clips = Vec::new();
    for i in 0..6u64 {
        let asset = MediaAsset::video(format!("shot-{i}"), format!("https://cdn.example/{i}.mp4"), 2.0);
        clips.push(Clip::new(track.id, asset.id.clone(), i * 30, 30));
        assets.insert(asset.id.clone(), asset);
    }
    let snapshot = TimelineSnapshot::new(FrameRate::FPS_30, vec![track], clips);

    let mut h = Harness::new(snapshot, assets);
    h.preview.transport_mut().play();
    let evaluations = h.run(FRAME_MS, 1000).await;

    assert_eq!(h.preview.transport().current_frame(), 180);
    assert!(h.backend.load_count() >= 6);
    assert!(evaluations
        .iter()
        .filter_map(Evaluation::report)
        .all(|r| r.failures.is_empty() && r.layers <= 1));
}

// ── Failure handling ───────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn broken_asset_does_not_blank_the_frame() {
    let backend = SimulatedBackend::new();
    backend.fail_url("https://cdn.example/interview.mp4");
    let mut h = Harness::demo(backend);

    h.preview.transport_mut().seek(180);
    let evaluation = h.preview.refresh().await.unwrap().unwrap();
    let report = evaluation.report().unwrap();
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, MediaError::LoadFailed { .. }));
    assert_eq!(report.layers, 1);
    assert_eq!(report.audible, 1);

    h.tick(0.0).await;
    let title = clip_for(&h.preview, "lower-third");
    assert_eq!(h.preview.target().stack(), vec![title]);
}

#[tokio::test(start_paused = true)]
async fn scrubbing_during_a_slow_load_supersedes() {
    let backend = SimulatedBackend::with_delays(Duration::from_millis(200), Duration::from_millis(5));
    let mut h = Harness::demo(backend);

    let playhead = h.preview.playhead().clone();
    let (first, ()) = tokio::join!(h.preview.refresh(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        playhead.set(200);
    });
    assert_eq!(
        first.unwrap(),
        Some(Evaluation::Superseded {
            frame: 0,
            current: 200
        })
    );

    let second = h.preview.refresh().await.unwrap().unwrap();
    assert_eq!(second.report().unwrap().frame, 200);
    h.tick(0.0).await;
    assert_eq!(h.preview.target().last_frame(), Some(200));
}

#[tokio::test(start_paused = true)]
async fn dispose_releases_everything() {
    let mut h = Harness::demo(SimulatedBackend::new());
    h.preview.transport_mut().play();
    h.run(FRAME_MS, 5).await;
    assert!(!h.preview.target().is_empty());

    h.preview.dispose();
    assert!(h.preview.target().is_empty());
    assert!(!h.scheduler.has_pending());
    assert_eq!(h.preview.pool().stats().bound, 0);
}
