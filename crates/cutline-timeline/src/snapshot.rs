//! Read-only timeline snapshot and the shared playhead.

use cutline_core::{Frame, FrameRate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::active::{resolve_active, ActiveSet};
use crate::clip::{Clip, ClipId};
use crate::track::{Track, TrackId};

/// An immutable view of the timeline as supplied by the timeline store.
///
/// The preview engine reads a snapshot once per evaluation pass and never
/// mutates it. `revision` changes whenever the store publishes new data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineSnapshot {
    pub tracks: Vec<Track>,
    pub clips: HashMap<ClipId, Clip>,
    pub fps: FrameRate,
    /// Timeline length in frames.
    pub duration: Frame,
    #[serde(default)]
    pub revision: u64,
}

impl TimelineSnapshot {
    /// Build a snapshot whose duration is the end of the last clip.
    pub fn new(fps: FrameRate, tracks: Vec<Track>, clips: impl IntoIterator<Item = Clip>) -> Self {
        let clips: HashMap<ClipId, Clip> = clips.into_iter().map(|c| (c.id, c)).collect();
        let duration = clips.values().map(Clip::end_frame).max().unwrap_or(0);
        Self {
            tracks,
            clips,
            fps,
            duration,
            revision: 0,
        }
    }

    pub fn with_duration(mut self, duration: Frame) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.get(&id)
    }

    /// Timeline length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.fps.frames_to_seconds(self.duration)
    }

    /// Active clips at `frame`, ordered bottom-to-top.
    pub fn active_at(&self, frame: Frame) -> ActiveSet<'_> {
        resolve_active(&self.tracks, self.clips.values(), frame)
    }
}

/// The global playhead position, shared between the transport (writer) and
/// the compositor (reader).
///
/// Cloning yields another handle to the same position.
#[derive(Debug, Clone, Default)]
pub struct Playhead {
    frame: Arc<AtomicU64>,
}

impl Playhead {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame: Arc::new(AtomicU64::new(frame)),
        }
    }

    #[inline]
    pub fn get(&self) -> Frame {
        self.frame.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, frame: Frame) {
        self.frame.store(frame, Ordering::Release);
    }
}
