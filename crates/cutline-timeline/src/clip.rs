//! Clip types for the timeline.

use cutline_core::{
    in_transition_window, is_animating, resolve_transform, transition_multiplier, ClipWindow,
    Frame, Keyframe, Transition, TransformState,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::asset::AssetId;
use crate::track::TrackId;

/// Unique clip identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(pub Uuid);

impl ClipId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Deterministic id, mostly useful for fixtures.
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl Default for ClipId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A placed instance of a media asset on a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: ClipId,
    pub track_id: TrackId,
    pub asset_id: AssetId,
    /// First frame on the global timeline.
    pub start_frame: Frame,
    /// Length on the timeline, in frames.
    pub duration: Frame,
    /// Source in-point, in frames from the start of the asset.
    pub in_point: Frame,
    /// Source out-point, in frames from the start of the asset.
    pub out_point: Frame,
    #[serde(default)]
    pub transform: TransformState,
    /// Sorted ascending by frame.
    #[serde(default)]
    pub keyframes: Vec<Keyframe>,
    #[serde(default)]
    pub transition_in: Option<Transition>,
    #[serde(default)]
    pub transition_out: Option<Transition>,
    /// Compositing order within the track; defaults to the track order.
    #[serde(default)]
    pub layer: Option<i32>,
}

impl Clip {
    /// Create a clip that plays `duration` frames of the asset from its start.
    pub fn new(
        track_id: TrackId,
        asset_id: impl Into<AssetId>,
        start_frame: Frame,
        duration: Frame,
    ) -> Self {
        Self {
            id: ClipId::new(),
            track_id,
            asset_id: asset_id.into(),
            start_frame,
            duration,
            in_point: 0,
            out_point: duration,
            transform: TransformState::IDENTITY,
            keyframes: Vec::new(),
            transition_in: None,
            transition_out: None,
            layer: None,
        }
    }

    pub fn with_id(mut self, id: ClipId) -> Self {
        self.id = id;
        self
    }

    /// Set the source trim window. The out-point must not precede the in-point.
    pub fn with_trim(mut self, in_point: Frame, out_point: Frame) -> Self {
        self.in_point = in_point;
        self.out_point = out_point;
        self
    }

    pub fn with_keyframes(mut self, mut keyframes: Vec<Keyframe>) -> Self {
        keyframes.sort_by_key(|kf| kf.frame);
        self.keyframes = keyframes;
        self
    }

    pub fn with_transitions(
        mut self,
        transition_in: Option<Transition>,
        transition_out: Option<Transition>,
    ) -> Self {
        self.transition_in = transition_in;
        self.transition_out = transition_out;
        self
    }

    pub fn with_layer(mut self, layer: i32) -> Self {
        self.layer = Some(layer);
        self
    }

    /// Placement on the global timeline.
    pub fn window(&self) -> ClipWindow {
        ClipWindow::new(self.start_frame, self.duration)
    }

    /// Exclusive end frame.
    pub fn end_frame(&self) -> Frame {
        self.start_frame.saturating_add(self.duration)
    }

    /// Returns `true` if this clip's window contains `frame`.
    pub fn is_active_at(&self, frame: Frame) -> bool {
        self.window().contains(frame)
    }

    /// Source frame shown at global `frame`, without range checks.
    pub fn local_frame_unchecked(&self, frame: Frame) -> Frame {
        self.in_point
            .saturating_add(frame.saturating_sub(self.start_frame))
    }

    /// Effective compositing layer, falling back to the owning track's order.
    pub fn effective_layer(&self, track_order: i32) -> i32 {
        self.layer.unwrap_or(track_order)
    }

    /// Keyframe-resolved transform at `frame`, before transition overlay.
    pub fn transform_at(&self, frame: Frame) -> TransformState {
        resolve_transform(&self.transform, &self.keyframes, frame)
    }

    /// Opacity multiplier from the clip's transitions at `frame`.
    pub fn transition_multiplier(&self, frame: Frame) -> f32 {
        transition_multiplier(
            &self.window(),
            self.transition_in.as_ref(),
            self.transition_out.as_ref(),
            frame,
        )
    }

    /// Final visual state at `frame`: keyframes, then the transition overlay.
    pub fn visual_state_at(&self, frame: Frame) -> TransformState {
        self.transform_at(frame)
            .with_opacity_factor(self.transition_multiplier(frame))
    }

    /// Whether keyframes or a transition are changing this clip at `frame`.
    pub fn is_animating_at(&self, frame: Frame) -> bool {
        is_animating(&self.keyframes, frame)
            || in_transition_window(
                &self.window(),
                self.transition_in.as_ref(),
                self.transition_out.as_ref(),
                frame,
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutline_core::PartialTransform;

    fn clip() -> Clip {
        Clip::new(TrackId::from_u128(1), "asset", 30, 60).with_trim(15, 75)
    }

    #[test]
    fn test_window_bounds() {
        let c = clip();
        assert!(!c.is_active_at(29));
        assert!(c.is_active_at(30));
        assert!(c.is_active_at(89));
        assert!(!c.is_active_at(90));
        assert_eq!(c.end_frame(), 90);
    }

    #[test]
    fn test_local_frame_mapping() {
        let c = clip();
        assert_eq!(c.local_frame_unchecked(45), 30);
        assert_eq!(c.local_frame_unchecked(30), 15);
    }

    #[test]
    fn test_effective_layer_defaults_to_track_order() {
        let c = clip();
        assert_eq!(c.effective_layer(4), 4);
        assert_eq!(c.with_layer(9).effective_layer(4), 9);
    }

    #[test]
    fn test_visual_state_combines_keyframes_and_transition() {
        let c = clip()
            .with_keyframes(vec![
                Keyframe::new(30, PartialTransform::opacity(0.5)),
                Keyframe::new(89, PartialTransform::opacity(0.5)),
            ])
            .with_transitions(Some(Transition::fade(10)), None);
        let state = c.visual_state_at(35);
        assert!((state.opacity - 0.25).abs() < 1e-6);
        assert!(c.is_animating_at(35));
    }

    #[test]
    fn test_static_clip_is_not_animating() {
        let c = clip();
        assert!(!c.is_animating_at(50));
        assert_eq!(c.visual_state_at(50), TransformState::IDENTITY);
    }

    #[test]
    fn test_with_keyframes_sorts() {
        let c = clip().with_keyframes(vec![
            Keyframe::new(60, PartialTransform::rotation(1.0)),
            Keyframe::new(40, PartialTransform::rotation(0.0)),
        ]);
        assert_eq!(c.keyframes[0].frame, 40);
    }
}
