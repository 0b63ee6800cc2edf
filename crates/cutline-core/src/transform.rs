//! Visual transform state for a clip layer.
//!
//! `TransformState` is the fully-resolved transform; `PartialTransform` is a
//! keyframe override where every field is optional. Merging is explicit:
//! a field present in the override wins, otherwise the base value is kept.

use glam::Vec2 as GlamVec2;
use serde::{Deserialize, Serialize};

/// 2D vector.
pub type Vec2 = GlamVec2;

/// Resolved visual state of a clip at a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformState {
    /// Offset normalized to the output size (0..1 per axis).
    pub position: Vec2,
    /// Scale multiplier per axis.
    pub scale: Vec2,
    /// Rotation in degrees, clockwise.
    pub rotation: f32,
    /// Opacity (0.0..=1.0).
    pub opacity: f32,
}

impl TransformState {
    pub const IDENTITY: Self = Self {
        position: Vec2::ZERO,
        scale: Vec2::ONE,
        rotation: 0.0,
        opacity: 1.0,
    };

    /// Linearly interpolate every scalar field independently.
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(other.position, t),
            scale: self.scale.lerp(other.scale, t),
            rotation: self.rotation + (other.rotation - self.rotation) * t,
            opacity: self.opacity + (other.opacity - self.opacity) * t,
        }
    }

    /// Returns a copy with opacity multiplied by `factor`.
    pub fn with_opacity_factor(mut self, factor: f32) -> Self {
        self.opacity *= factor;
        self
    }
}

impl Default for TransformState {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Keyframe override: only the fields that are `Some` replace the base.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialTransform {
    pub position_x: Option<f32>,
    pub position_y: Option<f32>,
    pub scale_x: Option<f32>,
    pub scale_y: Option<f32>,
    pub rotation: Option<f32>,
    pub opacity: Option<f32>,
}

impl PartialTransform {
    /// Override that only sets opacity.
    pub fn opacity(value: f32) -> Self {
        Self {
            opacity: Some(value),
            ..Self::default()
        }
    }

    /// Override that only sets position.
    pub fn position(x: f32, y: f32) -> Self {
        Self {
            position_x: Some(x),
            position_y: Some(y),
            ..Self::default()
        }
    }

    /// Override that sets a uniform scale.
    pub fn uniform_scale(value: f32) -> Self {
        Self {
            scale_x: Some(value),
            scale_y: Some(value),
            ..Self::default()
        }
    }

    /// Override that only sets rotation.
    pub fn rotation(degrees: f32) -> Self {
        Self {
            rotation: Some(degrees),
            ..Self::default()
        }
    }

    /// Whether no field is overridden.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply this override over `base`.
    pub fn merge_over(&self, base: &TransformState) -> TransformState {
        TransformState {
            position: Vec2::new(
                self.position_x.unwrap_or(base.position.x),
                self.position_y.unwrap_or(base.position.y),
            ),
            scale: Vec2::new(
                self.scale_x.unwrap_or(base.scale.x),
                self.scale_y.unwrap_or(base.scale.y),
            ),
            rotation: self.rotation.unwrap_or(base.rotation),
            opacity: self.opacity.unwrap_or(base.opacity),
        }
    }
}
