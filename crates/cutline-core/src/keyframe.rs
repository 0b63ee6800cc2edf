//! Keyframe interpolation and easing.
//!
//! Keyframes are anchored to global timeline frames and carry a
//! [`PartialTransform`] override. Between two keyframes the later
//! keyframe's easing shapes the progress, and every transform field is
//! interpolated independently.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::time::Frame;
use crate::transform::{PartialTransform, TransformState};

// ── Easing ──────────────────────────────────────────────────────

/// Easing applied to keyframe progress. Input and output are in [0, 1].
///
/// Serialized as a lowercase name; unknown names deserialize as `Linear`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl Easing {
    /// Evaluate the easing curve at `t`.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => t * (2.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
        }
    }

    /// Parse an easing name. Unrecognized names fall back to linear.
    pub fn parse(name: &str) -> Self {
        match name {
            "easeIn" | "ease-in" | "ease_in" => Easing::EaseIn,
            "easeOut" | "ease-out" | "ease_out" => Easing::EaseOut,
            "easeInOut" | "ease-in-out" | "ease_in_out" => Easing::EaseInOut,
            _ => Easing::Linear,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Easing::Linear => "linear",
            Easing::EaseIn => "easeIn",
            Easing::EaseOut => "easeOut",
            Easing::EaseInOut => "easeInOut",
        }
    }
}

impl From<String> for Easing {
    fn from(name: String) -> Self {
        Easing::parse(&name)
    }
}

impl From<Easing> for String {
    fn from(easing: Easing) -> Self {
        easing.as_str().to_string()
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Keyframe ────────────────────────────────────────────────────

/// A transform override anchored at a global frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Global timeline frame of this keyframe.
    pub frame: Frame,
    /// Fields overridden at this keyframe.
    pub transform: PartialTransform,
    /// Easing used when interpolating INTO this keyframe.
    #[serde(default)]
    pub easing: Easing,
}

impl Keyframe {
    pub fn new(frame: Frame, transform: PartialTransform) -> Self {
        Self {
            frame,
            transform,
            easing: Easing::Linear,
        }
    }

    pub fn with_easing(frame: Frame, transform: PartialTransform, easing: Easing) -> Self {
        Self {
            frame,
            transform,
            easing,
        }
    }
}

// ── Resolver ────────────────────────────────────────────────────

/// Resolve the visual transform at `frame`.
///
/// `keyframes` must be sorted ascending by frame. With no keyframes the base
/// transform is returned unchanged. Outside the keyframed span, or exactly on
/// a keyframe, the nearest keyframe's override is merged over `base`.
pub fn resolve_transform(
    base: &TransformState,
    keyframes: &[Keyframe],
    frame: Frame,
) -> TransformState {
    if keyframes.is_empty() {
        return *base;
    }
    debug_assert!(
        keyframes.windows(2).all(|w| w[0].frame <= w[1].frame),
        "keyframes must be sorted by frame"
    );

    let idx = keyframes.partition_point(|kf| kf.frame <= frame);
    let before = idx.checked_sub(1).map(|i| &keyframes[i]);
    let after = keyframes.get(idx);

    match (before, after) {
        (Some(b), _) if b.frame == frame => b.transform.merge_over(base),
        (Some(b), Some(a)) => {
            let span = (a.frame - b.frame) as f32;
            let progress = (frame - b.frame) as f32 / span;
            let eased = a.easing.apply(progress);
            let from = b.transform.merge_over(base);
            let to = a.transform.merge_over(base);
            from.lerp(&to, eased)
        }
        (Some(only), None) | (None, Some(only)) => only.transform.merge_over(base),
        (None, None) => *base,
    }
}

/// Whether `frame` lies within the span covered by `keyframes`.
pub fn is_animating(keyframes: &[Keyframe], frame: Frame) -> bool {
    match (keyframes.first(), keyframes.last()) {
        (Some(first), Some(last)) if keyframes.len() > 1 => {
            frame >= first.frame && frame <= last.frame
        }
        _ => false,
    }
}

// ── Tests ───────────────────────────────────────────────────────
