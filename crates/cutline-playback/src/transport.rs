//! Playback Transport.
//!
//! The transport is the only owner of play state, rate and volume, and the
//! only writer of the playhead while playing. It advances the playhead from
//! host frame callbacks using a time accumulator, capped per tick so a long
//! stall (backgrounded window, debugger pause) cannot jump the preview.
//!
//! Observers see two kinds of events: frame updates and state changes. Both
//! are delivered synchronously to registered callbacks and, for
//! cross-thread consumers, through [`Transport::subscribe`] channels.

use crossbeam_channel::{unbounded, Receiver, Sender};
use cutline_core::{limits, Frame, FrameRate};
use cutline_timeline::Playhead;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::scheduler::{FrameRequestId, FrameScheduler};

/// Slack when comparing accumulated time against one frame interval.
const ACCUMULATOR_EPSILON_MS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    #[default]
    Stopped,
    Paused,
    Playing,
}

/// Snapshot of the transport's user-facing settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub rate: f64,
    pub volume: f32,
    pub muted: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            is_playing: false,
            rate: 1.0,
            volume: 1.0,
            muted: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Most frames a single tick may advance.
    pub max_frames_per_tick: u32,
    pub min_rate: f64,
    pub max_rate: f64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_frames_per_tick: limits::MAX_FRAMES_PER_TICK,
            min_rate: 0.25,
            max_rate: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    Frame(Frame),
    StateChanged(TransportState),
}

type FrameCallback = Box<dyn FnMut(Frame) + Send>;
type StateCallback = Box<dyn FnMut(TransportState) + Send>;

pub struct Transport<S: FrameScheduler> {
    config: TransportConfig,
    scheduler: S,
    playhead: Playhead,
    fps: FrameRate,
    duration: Frame,

    state: TransportState,
    rate: f64,
    volume: f32,
    muted: bool,

    accumulator_ms: f64,
    last_timestamp_ms: Option<f64>,
    pending: Option<FrameRequestId>,

    frame_callbacks: Vec<FrameCallback>,
    state_callbacks: Vec<StateCallback>,
    subscribers: Vec<Sender<TransportEvent>>,
}

impl<S: FrameScheduler> Transport<S> {
    pub fn new(
        config: TransportConfig,
        scheduler: S,
        playhead: Playhead,
        fps: FrameRate,
        duration: Frame,
    ) -> Self {
        let fps = if fps.is_valid() {
            fps
        } else {
            warn!(%fps, "Unusable frame rate; falling back to default");
            FrameRate::default()
        };
        Self {
            config,
            scheduler,
            playhead,
            fps,
            duration,
            state: TransportState::Stopped,
            rate: 1.0,
            volume: 1.0,
            muted: false,
            accumulator_ms: 0.0,
            last_timestamp_ms: None,
            pending: None,
            frame_callbacks: Vec::new(),
            state_callbacks: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    // ---- control surface ----

    /// Start playback. At the end of the timeline, restarts from frame 0.
    pub fn play(&mut self) {
        if self.state == TransportState::Playing {
            return;
        }
        if self.duration == 0 {
            debug!("Play ignored: empty timeline");
            return;
        }
        if self.playhead.get() >= self.duration {
            self.write_frame(0);
        }

        self.accumulator_ms = 0.0;
        self.last_timestamp_ms = None;
        self.pending = Some(self.scheduler.request_frame());
        self.set_state(TransportState::Playing);
        debug!(frame = self.playhead.get(), rate = self.rate, "Playback started");
    }

    /// Pause playback. No-op unless playing.
    pub fn pause(&mut self) {
        if self.state != TransportState::Playing {
            return;
        }
        self.cancel_pending();
        self.set_state(TransportState::Paused);
        debug!(frame = self.playhead.get(), "Playback paused");
    }

    /// Pause and rewind to frame 0.
    pub fn stop(&mut self) {
        self.cancel_pending();
        if self.playhead.get() != 0 {
            self.write_frame(0);
        }
        self.accumulator_ms = 0.0;
        if self.state != TransportState::Stopped {
            self.set_state(TransportState::Stopped);
            debug!("Playback stopped");
        }
    }

    pub fn toggle(&mut self) {
        if self.state == TransportState::Playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Move the playhead, clamped to the timeline. Play state is unchanged.
    pub fn seek(&mut self, frame: Frame) {
        let frame = frame.min(self.duration);
        self.accumulator_ms = 0.0;
        debug!(frame, "Seek");
        self.write_frame(frame);
    }

    /// Set the playback rate, clamped to the configured bounds. Takes effect
    /// on the next tick. Returns the applied rate.
    pub fn set_playback_rate(&mut self, rate: f64) -> f64 {
        if !rate.is_finite() {
            warn!(rate, "Ignoring non-finite playback rate");
            return self.rate;
        }
        self.rate = rate.clamp(self.config.min_rate, self.config.max_rate);
        debug!(rate = self.rate, "Playback rate set");
        self.rate
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            self.volume
        };
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Adopt a new frame rate and length after the timeline changed. An
    /// unusable rate keeps the previous one.
    pub fn set_timeline(&mut self, fps: FrameRate, duration: Frame) {
        if fps.is_valid() {
            self.fps = fps;
        } else {
            warn!(%fps, keeping = %self.fps, "Ignoring unusable frame rate");
        }
        self.duration = duration;
        if self.playhead.get() > duration {
            self.write_frame(duration);
        }
    }

    // ---- host callback ----

    /// Handle a frame callback delivered by the host. Returns the number of
    /// frames advanced. Callbacks for requests that are no longer pending
    /// (cancelled or superseded) are ignored.
    pub fn on_animation_frame(&mut self, id: FrameRequestId, timestamp_ms: f64) -> u32 {
        if self.state != TransportState::Playing || self.pending != Some(id) {
            trace!(?id, "Ignoring stale frame callback");
            return 0;
        }
        self.pending = None;

        let delta = match self.last_timestamp_ms {
            Some(previous) => (timestamp_ms - previous).max(0.0),
            None => 0.0,
        };
        self.last_timestamp_ms = Some(timestamp_ms);
        self.accumulator_ms += delta;

        let ms_per_frame = self.fps.frame_interval_ms() / self.rate;
        let mut frame = self.playhead.get();
        let mut advanced = 0;
        while advanced < self.config.max_frames_per_tick
            && self.accumulator_ms + ACCUMULATOR_EPSILON_MS >= ms_per_frame
        {
            self.accumulator_ms -= ms_per_frame;
            frame = (frame + 1).min(self.duration);
            advanced += 1;
            self.write_frame(frame);
            if frame >= self.duration {
                break;
            }
        }
        trace!(delta, advanced, carry = self.accumulator_ms, "Tick");

        if frame >= self.duration {
            self.accumulator_ms = 0.0;
            self.set_state(TransportState::Paused);
            debug!(frame, "Reached end of timeline");
        } else {
            self.pending = Some(self.scheduler.request_frame());
        }
        advanced
    }

    // ---- observation ----

    pub fn on_frame(&mut self, callback: impl FnMut(Frame) + Send + 'static) {
        self.frame_callbacks.push(Box::new(callback));
    }

    pub fn on_state_change(&mut self, callback: impl FnMut(TransportState) + Send + 'static) {
        self.state_callbacks.push(Box::new(callback));
    }

    /// Receive every future event on a channel.
    pub fn subscribe(&mut self) -> Receiver<TransportEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn playback_state(&self) -> PlaybackState {
        PlaybackState {
            is_playing: self.is_playing(),
            rate: self.rate,
            volume: self.volume,
            muted: self.muted,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn current_frame(&self) -> Frame {
        self.playhead.get()
    }

    /// Playhead position in seconds.
    pub fn current_time(&self) -> f64 {
        self.fps.frames_to_seconds(self.playhead.get())
    }

    pub fn duration_seconds(&self) -> f64 {
        self.fps.frames_to_seconds(self.duration)
    }

    pub fn duration(&self) -> Frame {
        self.duration
    }

    pub fn fps(&self) -> FrameRate {
        self.fps
    }

    pub fn playhead(&self) -> &Playhead {
        &self.playhead
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Cancel any pending tick and drop all observers.
    pub fn dispose(&mut self) {
        self.cancel_pending();
        if self.state == TransportState::Playing {
            self.state = TransportState::Paused;
        }
        self.frame_callbacks.clear();
        self.state_callbacks.clear();
        self.subscribers.clear();
    }

    // ---- internals ----

    fn cancel_pending(&mut self) {
        if let Some(id) = self.pending.take() {
            self.scheduler.cancel_frame(id);
        }
    }

    fn write_frame(&mut self, frame: Frame) {
        self.playhead.set(frame);
        for callback in &mut self.frame_callbacks {
            callback(frame);
        }
        self.broadcast(TransportEvent::Frame(frame));
    }

    fn set_state(&mut self, state: TransportState) {
        if self.state == state {
            return;
        }
        self.state = state;
        for callback in &mut self.state_callbacks {
            callback(state);
        }
        self.broadcast(TransportEvent::StateChanged(state));
    }

    fn broadcast(&mut self, event: TransportEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }
}

impl<S: FrameScheduler> std::fmt::Debug for Transport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("state", &self.state)
            .field("frame", &self.playhead.get())
            .field("duration", &self.duration)
            .field("rate", &self.rate)
            .field("pending", &self.pending)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use parking_lot::Mutex;
    use std::sync::Arc;

    const FRAME_MS: f64 = 1000.0 / 30.0;

    fn transport(duration: Frame) -> (Transport<ManualScheduler>, ManualScheduler) {
        let scheduler = ManualScheduler::new();
        let transport = Transport::new(
            TransportConfig::default(),
            scheduler.clone(),
            Playhead::default(),
            FrameRate::FPS_30,
            duration,
        );
        (transport, scheduler)
    }

    /// Deliver the single pending callback at `timestamp`.
    fn tick(
        transport: &mut Transport<ManualScheduler>,
        scheduler: &ManualScheduler,
        timestamp: f64,
    ) -> u32 {
        let pending = scheduler.take_pending();
        assert_eq!(pending.len(), 1, "expected exactly one pending tick");
        transport.on_animation_frame(pending[0], timestamp)
    }

    #[test]
    fn test_play_schedules_and_pause_cancels() {
        let (mut t, scheduler) = transport(300);
        t.play();
        assert_eq!(t.state(), TransportState::Playing);
        assert!(scheduler.has_pending());

        t.pause();
        assert_eq!(t.state(), TransportState::Paused);
        assert!(!scheduler.has_pending());
        assert_eq!(scheduler.cancel_count(), 1);
    }

    #[test]
    fn test_ticks_advance_one_frame_per_interval() {
        let (mut t, scheduler) = transport(300);
        t.play();
        assert_eq!(tick(&mut t, &scheduler, 1000.0), 0);
        assert_eq!(tick(&mut t, &scheduler, 1000.0 + FRAME_MS), 1);
        assert_eq!(tick(&mut t, &scheduler, 1000.0 + 2.0 * FRAME_MS), 1);
        assert_eq!(t.current_frame(), 2);
    }

    #[test]
    fn test_frame_cap_carries_remainder() {
        let (mut t, scheduler) = transport(300);
        t.play();
        tick(&mut t, &scheduler, 0.0);

        // A stall worth ten frames only moves the playhead by two.
        let stalled = 10.0 * FRAME_MS;
        assert_eq!(tick(&mut t, &scheduler, stalled), 2);
        assert_eq!(t.current_frame(), 2);

        // The backlog drains over the next ticks without new time passing.
        let mut total = 2;
        for _ in 0..4 {
            total += tick(&mut t, &scheduler, stalled);
        }
        assert_eq!(total, 10);
        assert_eq!(t.current_frame(), 10);
        assert_eq!(tick(&mut t, &scheduler, stalled), 0);
    }

    #[test]
    fn test_rate_scales_frame_interval() {
        let (mut t, scheduler) = transport(300);
        t.set_playback_rate(2.0);
        t.play();
        tick(&mut t, &scheduler, 0.0);
        assert_eq!(tick(&mut t, &scheduler, FRAME_MS), 2);

        t.set_playback_rate(0.5);
        assert_eq!(tick(&mut t, &scheduler, 2.0 * FRAME_MS), 0);
        assert_eq!(tick(&mut t, &scheduler, 3.0 * FRAME_MS), 1);
    }

    #[test]
    fn test_rate_is_clamped() {
        let (mut t, _) = transport(300);
        assert_eq!(t.set_playback_rate(8.0), 2.0);
        assert_eq!(t.set_playback_rate(0.1), 0.25);
        assert_eq!(t.set_playback_rate(f64::NAN), 0.25);
    }

    #[test]
    fn test_end_of_timeline_pauses_at_duration() {
        let (mut t, scheduler) = transport(10);
        t.seek(9);
        t.play();
        tick(&mut t, &scheduler, 0.0);
        assert_eq!(tick(&mut t, &scheduler, 5.0 * FRAME_MS), 1);

        assert_eq!(t.current_frame(), 10);
        assert_eq!(t.state(), TransportState::Paused);
        assert!(!scheduler.has_pending());
    }

    #[test]
    fn test_play_at_end_restarts() {
        let (mut t, _) = transport(10);
        t.seek(10);
        t.play();
        assert_eq!(t.current_frame(), 0);
        assert!(t.is_playing());
    }

    #[test]
    fn test_pause_and_stop_are_idempotent() {
        let (mut t, scheduler) = transport(300);
        let events = Arc::new(Mutex::new(Vec::new()));
        {
            let events = Arc::clone(&events);
            t.on_state_change(move |state| events.lock().push(state));
        }

        // Stopped: pause does nothing.
        t.pause();
        assert!(events.lock().is_empty());

        t.play();
        t.pause();
        t.pause();
        assert_eq!(scheduler.cancel_count(), 1);
        assert_eq!(
            *events.lock(),
            vec![TransportState::Playing, TransportState::Paused]
        );

        t.stop();
        t.stop();
        t.pause();
        assert_eq!(scheduler.cancel_count(), 1);
        assert_eq!(events.lock().len(), 3);
        assert_eq!(t.state(), TransportState::Stopped);
    }

    #[test]
    fn test_stop_rewinds() {
        let (mut t, _) = transport(300);
        t.seek(120);
        t.stop();
        assert_eq!(t.current_frame(), 0);
    }

    #[test]
    fn test_stale_callback_ignored() {
        let (mut t, scheduler) = transport(300);
        t.play();
        let id = scheduler.pending()[0];
        t.pause();
        assert_eq!(t.on_animation_frame(id, 500.0), 0);

        t.play();
        assert_eq!(t.on_animation_frame(id, 600.0), 0);
        assert_eq!(t.current_frame(), 0);
    }

    #[test]
    fn test_seek_clamps_and_resets_accumulator() {
        let (mut t, scheduler) = transport(100);
        t.play();
        tick(&mut t, &scheduler, 0.0);
        tick(&mut t, &scheduler, 1.5 * FRAME_MS);
        assert_eq!(t.current_frame(), 1);

        t.seek(500);
        assert_eq!(t.current_frame(), 100);
        t.seek(40);
        // Half a frame was carried before the seek; it must not count now.
        assert_eq!(tick(&mut t, &scheduler, 2.0 * FRAME_MS), 0);
        assert!(t.is_playing());
    }

    #[test]
    fn test_frame_callbacks_and_subscription() {
        let (mut t, scheduler) = transport(300);
        let frames = Arc::new(Mutex::new(Vec::new()));
        {
            let frames = Arc::clone(&frames);
            t.on_frame(move |frame| frames.lock().push(frame));
        }
        let rx = t.subscribe();

        t.play();
        tick(&mut t, &scheduler, 0.0);
        tick(&mut t, &scheduler, 2.0 * FRAME_MS);

        assert_eq!(*frames.lock(), vec![1, 2]);
        let events: Vec<TransportEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                TransportEvent::StateChanged(TransportState::Playing),
                TransportEvent::Frame(1),
                TransportEvent::Frame(2),
            ]
        );
    }

    #[test]
    fn test_set_timeline_clamps_playhead() {
        let (mut t, _) = transport(300);
        t.seek(250);
        t.set_timeline(FrameRate::FPS_24, 200);
        assert_eq!(t.current_frame(), 200);
        assert_eq!(t.duration_seconds(), 200.0 / 24.0);
    }

    #[test]
    fn test_unusable_frame_rate_is_ignored() {
        let (mut t, _) = transport(300);
        t.set_timeline(FrameRate::new(0, 1), 120);
        assert_eq!(t.fps(), FrameRate::FPS_30);
        assert_eq!(t.duration_seconds(), 4.0);

        let fresh = Transport::new(
            TransportConfig::default(),
            ManualScheduler::new(),
            Playhead::default(),
            FrameRate::new(30, 0),
            90,
        );
        assert_eq!(fresh.fps(), FrameRate::default());
        assert_eq!(fresh.duration_seconds(), 3.0);
    }

    #[test]
    fn test_playback_state_snapshot() {
        let (mut t, _) = transport(300);
        t.set_volume(1.7);
        t.set_muted(true);
        t.play();
        let state = t.playback_state();
        assert!(state.is_playing);
        assert_eq!(state.volume, 1.0);
        assert!(state.muted);
    }

    #[test]
    fn test_empty_timeline_never_plays() {
        let (mut t, scheduler) = transport(0);
        t.play();
        assert_eq!(t.state(), TransportState::Stopped);
        assert!(!scheduler.has_pending());
    }

    #[test]
    fn test_config_and_state_serde() {
        let config: TransportConfig = serde_json::from_str(r#"{"max_rate": 4.0}"#).unwrap();
        assert_eq!(config.max_rate, 4.0);
        assert_eq!(config.max_frames_per_tick, limits::MAX_FRAMES_PER_TICK);

        let json = serde_json::to_string(&TransportState::Playing).unwrap();
        assert_eq!(json, r#""playing""#);
    }
}
