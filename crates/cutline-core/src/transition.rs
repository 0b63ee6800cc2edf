//! Transition opacity overlay.
//!
//! A transition modulates a clip's opacity at its head (transition-in) or
//! tail (transition-out). The overlay is independent of keyframes: the final
//! opacity is `resolved.opacity * transition_multiplier(..)`.

use serde::{Deserialize, Serialize};

use crate::time::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WipeDirection {
    #[default]
    Left,
    Right,
    Up,
    Down,
}

/// Transition style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransitionKind {
    Fade,
    Dissolve,
    DipToBlack,
    Wipe { direction: WipeDirection },
    Push { direction: WipeDirection },
}

/// How a transition shapes opacity over its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionFamily {
    /// Opacity follows progress linearly.
    Fade,
    /// Opacity snaps between 0 and 1 at the halfway point.
    Wipe,
}

impl TransitionKind {
    pub fn family(self) -> TransitionFamily {
        match self {
            TransitionKind::Fade | TransitionKind::Dissolve | TransitionKind::DipToBlack => {
                TransitionFamily::Fade
            }
            TransitionKind::Wipe { .. } | TransitionKind::Push { .. } => TransitionFamily::Wipe,
        }
    }
}

/// A transition attached to one edge of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub kind: TransitionKind,
    /// Length of the transition window in frames.
    pub duration: Frame,
}

impl Transition {
    pub fn new(kind: TransitionKind, duration: Frame) -> Self {
        Self { kind, duration }
    }

    pub fn fade(duration: Frame) -> Self {
        Self::new(TransitionKind::Fade, duration)
    }

    /// Opacity factor for a given linear visibility (0 = hidden, 1 = shown).
    fn shape(&self, visibility: f32) -> f32 {
        match self.kind.family() {
            TransitionFamily::Fade => visibility,
            TransitionFamily::Wipe => {
                if visibility >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// A clip's placement on the global timeline: `[start, start + duration)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipWindow {
    pub start: Frame,
    pub duration: Frame,
}

impl ClipWindow {
    pub fn new(start: Frame, duration: Frame) -> Self {
        Self { start, duration }
    }

    /// Exclusive end frame, saturating at `Frame::MAX`.
    pub fn end(&self) -> Frame {
        self.start.saturating_add(self.duration)
    }

    pub fn contains(&self, frame: Frame) -> bool {
        frame >= self.start && frame < self.end()
    }
}

/// Progress (0..1) through the transition-in window, if `frame` is inside it.
fn in_progress(window: &ClipWindow, transition: &Transition, frame: Frame) -> Option<f32> {
    if transition.duration == 0 {
        return None;
    }
    let window_end = window.start.saturating_add(transition.duration);
    (frame >= window.start && frame < window_end)
        .then(|| (frame - window.start) as f32 / transition.duration as f32)
}

/// Progress (0..1) through the transition-out window, if `frame` is inside it.
fn out_progress(window: &ClipWindow, transition: &Transition, frame: Frame) -> Option<f32> {
    if transition.duration == 0 {
        return None;
    }
    let end = window.end();
    let window_start = end.saturating_sub(transition.duration);
    (frame >= window_start && frame < end)
        .then(|| (frame - window_start) as f32 / transition.duration as f32)
}

/// Opacity multiplier contributed by the clip's transitions at `frame`.
///
/// Frames outside both windows yield `1.0`. Overlapping in/out windows
/// (clip shorter than both transitions) multiply.
pub fn transition_multiplier(
    window: &ClipWindow,
    transition_in: Option<&Transition>,
    transition_out: Option<&Transition>,
    frame: Frame,
) -> f32 {
    let mut multiplier = 1.0;
    if let Some(t) = transition_in {
        if let Some(progress) = in_progress(window, t, frame) {
            multiplier *= t.shape(progress);
        }
    }
    if let Some(t) = transition_out {
        if let Some(progress) = out_progress(window, t, frame) {
            multiplier *= t.shape(1.0 - progress);
        }
    }
    multiplier
}

/// Whether `frame` falls inside either transition window.
pub fn in_transition_window(
    window: &ClipWindow,
    transition_in: Option<&Transition>,
    transition_out: Option<&Transition>,
    frame: Frame,
) -> bool {
    transition_in.is_some_and(|t| in_progress(window, t, frame).is_some())
        || transition_out.is_some_and(|t| out_progress(window, t, frame).is_some())
}
