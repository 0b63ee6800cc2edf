//! Cutline Media - Media elements and the bounded resource pool
//!
//! Native decoders are expensive, so the preview engine keeps a small fixed
//! pool of them and rebinds them as the playhead moves:
//! - [`MediaElement`]: the async load/seek/playback surface of one decoder
//! - [`MediaPool`]: LRU binding, drift-tolerant seeks with a timeout, preload
//! - [`PreparedHandle`]: a positioned element plus its audio sync surface
//! - [`SimulatedElement`]: a clock-driven element for headless runs and tests

pub mod element;
pub mod error;
pub mod handle;
pub mod pool;
pub mod simulated;

pub use element::MediaElement;
pub use error::{MediaError, MediaResult};
pub use handle::PreparedHandle;
pub use pool::{MediaPool, PoolConfig, PoolStats, SlotSnapshot};
pub use simulated::{SimulatedBackend, SimulatedElement};
