//! Cutline Playback - Transport state machine and frame scheduling
//!
//! - [`FrameScheduler`]: the host's "call me on the next frame" capability
//! - [`ManualScheduler`]: a scheduler the caller drives explicitly
//! - [`Transport`]: play/pause/stop/seek/rate, accumulator-driven ticks

pub mod scheduler;
pub mod transport;

pub use scheduler::{FrameRequestId, FrameScheduler, ManualScheduler};
pub use transport::{PlaybackState, Transport, TransportConfig, TransportEvent, TransportState};
