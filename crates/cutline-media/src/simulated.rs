//! In-process media element used by the headless preview and tests.
//!
//! Elements share a [`SimulatedBackend`] that decides how long loads and
//! seeks take, which URLs fail, and whether seeks hang. Timing runs on the
//! tokio clock, so tests with a paused clock are deterministic.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::element::MediaElement;
use crate::error::{MediaError, MediaResult};

/// Shared behaviour for a family of simulated elements.
#[derive(Debug)]
pub struct SimulatedBackend {
    load_delay: Duration,
    seek_delay: Duration,
    failing: Mutex<HashSet<String>>,
    hang_seeks: AtomicBool,
    loads: AtomicUsize,
    seeks: AtomicUsize,
}

impl SimulatedBackend {
    pub fn new() -> Arc<Self> {
        Self::with_delays(Duration::from_millis(20), Duration::from_millis(5))
    }

    pub fn with_delays(load_delay: Duration, seek_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            load_delay,
            seek_delay,
            failing: Mutex::new(HashSet::new()),
            hang_seeks: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
            seeks: AtomicUsize::new(0),
        })
    }

    /// Make every future load of `url` fail.
    pub fn fail_url(&self, url: impl Into<String>) {
        self.failing.lock().insert(url.into());
    }

    /// Make seeks never complete.
    pub fn set_hanging_seeks(&self, hang: bool) {
        self.hang_seeks.store(hang, Ordering::Relaxed);
    }

    /// Loads started across all elements.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    /// Seeks started across all elements.
    pub fn seek_count(&self) -> usize {
        self.seeks.load(Ordering::Relaxed)
    }

    pub fn element(self: &Arc<Self>) -> SimulatedElement {
        SimulatedElement {
            backend: Arc::clone(self),
            state: Mutex::new(Playback::default()),
        }
    }

    fn is_failing(&self, url: &str) -> bool {
        self.failing.lock().contains(url)
    }
}

#[derive(Debug)]
struct Playback {
    source: Option<String>,
    /// Clock position at `anchor`.
    position: f64,
    /// When the clock last started running; `None` while paused.
    anchor: Option<Instant>,
    rate: f64,
    volume: f32,
    muted: bool,
}

impl Default for Playback {
    fn default() -> Self {
        Self {
            source: None,
            position: 0.0,
            anchor: None,
            rate: 1.0,
            volume: 1.0,
            muted: false,
        }
    }
}

impl Playback {
    fn now(&self) -> f64 {
        match self.anchor {
            Some(at) => self.position + at.elapsed().as_secs_f64() * self.rate,
            None => self.position,
        }
    }

    /// Fold elapsed running time into `position` and restart the anchor.
    fn settle(&mut self) {
        self.position = self.now();
        if self.anchor.is_some() {
            self.anchor = Some(Instant::now());
        }
    }
}

/// A media element whose clock advances in real (tokio) time while playing.
#[derive(Debug)]
pub struct SimulatedElement {
    backend: Arc<SimulatedBackend>,
    state: Mutex<Playback>,
}

impl SimulatedElement {
    /// Jump the clock without a seek, as a drifting decoder would.
    pub fn set_position(&self, seconds: f64) {
        let mut state = self.state.lock();
        state.position = seconds;
        if state.anchor.is_some() {
            state.anchor = Some(Instant::now());
        }
    }
}

impl MediaElement for SimulatedElement {
    fn load(&self, url: String) -> impl Future<Output = MediaResult<()>> + Send {
        async move {
            {
                let mut state = self.state.lock();
                state.source = Some(url.clone());
                state.position = 0.0;
                state.anchor = None;
            }
            self.backend.loads.fetch_add(1, Ordering::Relaxed);

            tokio::time::sleep(self.backend.load_delay).await;

            if url.is_empty() || self.backend.is_failing(&url) {
                return Err(MediaError::LoadFailed {
                    url,
                    reason: "unsupported or unreachable source".to_string(),
                });
            }
            let still_bound = self.state.lock().source.as_deref() == Some(url.as_str());
            if !still_bound {
                return Err(MediaError::LoadFailed {
                    url,
                    reason: "load aborted".to_string(),
                });
            }
            Ok(())
        }
    }

    fn unload(&self) {
        let mut state = self.state.lock();
        state.source = None;
        state.position = 0.0;
        state.anchor = None;
    }

    fn source(&self) -> Option<String> {
        self.state.lock().source.clone()
    }

    fn current_time(&self) -> f64 {
        self.state.lock().now()
    }

    fn seek(&self, seconds: f64) -> impl Future<Output = ()> + Send {
        async move {
            self.backend.seeks.fetch_add(1, Ordering::Relaxed);
            tokio::time::sleep(self.backend.seek_delay).await;
            if self.backend.hang_seeks.load(Ordering::Relaxed) {
                std::future::pending::<()>().await;
            }
            let mut state = self.state.lock();
            state.position = seconds.max(0.0);
            if state.anchor.is_some() {
                state.anchor = Some(Instant::now());
            }
        }
    }

    fn is_paused(&self) -> bool {
        self.state.lock().anchor.is_none()
    }

    fn play(&self) -> MediaResult<()> {
        let mut state = self.state.lock();
        if state.source.is_none() {
            return Err(MediaError::PlaybackRejected("no source bound".to_string()));
        }
        if state.anchor.is_none() {
            state.anchor = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&self) {
        let mut state = self.state.lock();
        state.position = state.now();
        state.anchor = None;
    }

    fn playback_rate(&self) -> f64 {
        self.state.lock().rate
    }

    fn set_playback_rate(&self, rate: f64) {
        let mut state = self.state.lock();
        state.settle();
        state.rate = rate;
    }

    fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    fn set_volume(&self, volume: f32) {
        self.state.lock().volume = volume.clamp(0.0, 1.0);
    }

    fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    fn set_muted(&self, muted: bool) {
        self.state.lock().muted = muted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_clock_runs_while_playing() {
        let backend = SimulatedBackend::new();
        let element = backend.element();
        element.load("clip.mp4".to_string()).await.unwrap();
        element.play().unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!((element.current_time() - 0.5).abs() < 1e-6);

        element.pause();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!((element.current_time() - 0.5).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_scales_clock() {
        let backend = SimulatedBackend::new();
        let element = backend.element();
        element.load("clip.mp4".to_string()).await.unwrap();
        element.set_playback_rate(2.0);
        element.play().unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!((element.current_time() - 0.5).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_url() {
        let backend = SimulatedBackend::new();
        backend.fail_url("broken.mp4");
        let element = backend.element();
        let err = element.load("broken.mp4".to_string()).await.unwrap_err();
        assert!(matches!(err, MediaError::LoadFailed { .. }));
        assert_eq!(backend.load_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_moves_clock() {
        let backend = SimulatedBackend::new();
        let element = backend.element();
        element.load("clip.mp4".to_string()).await.unwrap();
        element.seek(3.25).await;
        assert_eq!(element.current_time(), 3.25);
        assert_eq!(backend.seek_count(), 1);
    }

    #[test]
    fn test_play_without_source_rejected() {
        let backend = SimulatedBackend::new();
        let element = backend.element();
        assert!(matches!(
            element.play(),
            Err(MediaError::PlaybackRejected(_))
        ));
    }
}
