//! Time representation for frame-accurate preview
//!
//! The timeline is addressed in whole frames. Conversions to seconds go
//! through rational arithmetic so that long timelines at NTSC rates do not
//! accumulate floating-point drift.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// A frame index on the global timeline (or an offset into a source asset).
pub type Frame = u64;

/// A rational time value representing a point in time, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RationalTime {
    value: Rational64,
}

impl RationalTime {
    /// Create a new RationalTime of `numerator / denominator` seconds.
    #[inline]
    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self {
            value: Rational64::new(numerator, denominator),
        }
    }

    /// Create a RationalTime from a frame number and frame rate.
    #[inline]
    pub fn from_frames(frames: Frame, rate: FrameRate) -> Self {
        Self {
            value: Rational64::new(
                frames as i64 * rate.denominator as i64,
                rate.numerator as i64,
            ),
        }
    }

    /// Create a RationalTime from seconds as a float.
    /// Note: May introduce small precision errors.
    pub fn from_seconds_f64(seconds: f64) -> Self {
        const PRECISION: i64 = 1_000_000;
        Self {
            value: Rational64::new((seconds * PRECISION as f64).round() as i64, PRECISION),
        }
    }

    /// Convert to seconds as f64.
    #[inline]
    pub fn to_seconds_f64(self) -> f64 {
        *self.value.numer() as f64 / *self.value.denom() as f64
    }

    /// Convert to a frame number at the given rate (floored, never negative).
    #[inline]
    pub fn to_frames(self, rate: FrameRate) -> Frame {
        let frames = self.value * Rational64::new(rate.numerator as i64, rate.denominator as i64);
        (*frames.numer() / *frames.denom()).max(0) as Frame
    }

    /// Zero time constant.
    pub const ZERO: Self = Self {
        value: Rational64::new_raw(0, 1),
    };
}

impl Default for RationalTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for RationalTime {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            value: self.value + rhs.value,
        }
    }
}

impl Sub for RationalTime {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            value: self.value - rhs.value,
        }
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.to_seconds_f64())
    }
}

/// Frame rate as a rational number (e.g., 30000/1001 for 29.97 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameRate {
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Frames per second as f64.
    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Duration of a single frame.
    #[inline]
    pub fn frame_duration(self) -> RationalTime {
        RationalTime::new(self.denominator as i64, self.numerator as i64)
    }

    /// Duration of a single frame in seconds.
    #[inline]
    pub fn frame_interval_secs(self) -> f64 {
        self.denominator as f64 / self.numerator as f64
    }

    /// Wall-clock milliseconds per frame at 1x speed.
    #[inline]
    pub fn frame_interval_ms(self) -> f64 {
        1000.0 / self.to_fps_f64()
    }

    /// Seconds at the start of `frame`.
    #[inline]
    pub fn frames_to_seconds(self, frame: Frame) -> f64 {
        RationalTime::from_frames(frame, self).to_seconds_f64()
    }

    /// Frame containing the instant `seconds`.
    #[inline]
    pub fn seconds_to_frames(self, seconds: f64) -> Frame {
        RationalTime::from_seconds_f64(seconds).to_frames(self)
    }

    /// Whether this rate can be used for timing (non-zero terms).
    pub fn is_valid(self) -> bool {
        self.numerator > 0 && self.denominator > 0
    }

    pub const FPS_23_976: Self = Self::new(24000, 1001);
    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_50: Self = Self::new(50, 1);
    pub const FPS_60: Self = Self::new(60, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_30
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps_f64();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}
