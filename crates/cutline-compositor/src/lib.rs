//! Cutline Compositor - Turns the playhead into layered output
//!
//! - [`Compositor`]: per-frame evaluation with supersession and per-clip
//!   failure isolation
//! - [`LayerTree`]: staged layer styles, diffed into one [`RenderBatch`] per
//!   flushed frame
//! - [`OutputTarget`]: where batches land
//! - [`Preview`]: transport and compositor wired to one playhead

pub mod audio;
pub mod compositor;
pub mod layers;
pub mod output;
pub mod preview;

pub use audio::{sync_audio, ClipGain};
pub use compositor::{
    ClipFailure, Compositor, CompositorConfig, CompositorError, Evaluation, FrameReport,
};
pub use layers::{Layer, LayerOp, LayerStyle, LayerTree, RenderBatch, Viewport};
pub use output::{OutputTarget, RecordingTarget, TracingTarget};
pub use preview::{Preview, PreviewConfig};
