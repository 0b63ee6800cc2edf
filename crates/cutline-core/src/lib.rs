//! Cutline Core - Foundation types for the preview engine
//!
//! This crate provides the pure, I/O-free building blocks used throughout Cutline:
//! - Frame/time representation (FrameRate, RationalTime)
//! - Visual transform state and partial keyframe overrides
//! - Easing functions and keyframe interpolation (the transform resolver)
//! - Transition opacity overlays

pub mod error;
pub mod keyframe;
pub mod time;
pub mod transform;
pub mod transition;

pub use error::{CutlineError, Result};
pub use keyframe::{is_animating, resolve_transform, Easing, Keyframe};
pub use time::{Frame, FrameRate, RationalTime};
pub use transform::{PartialTransform, TransformState, Vec2};
pub use transition::{
    in_transition_window, transition_multiplier, ClipWindow, Transition, TransitionFamily,
    TransitionKind, WipeDirection,
};

/// Default resource limits for a single preview instance.
pub mod limits {
    /// Number of pooled media elements.
    pub const POOL_SIZE: usize = 3;

    /// Upcoming assets to warm up in idle pool slots.
    pub const PRELOAD_COUNT: usize = 2;

    /// Upper bound on a single seek before the pool gives up waiting (ms).
    pub const SEEK_TIMEOUT_MS: u64 = 1000;

    /// Maximum frames the transport advances in one tick.
    pub const MAX_FRAMES_PER_TICK: u32 = 2;
}
