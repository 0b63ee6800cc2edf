//! Cutline Timeline - Timeline data model read by the preview engine
//!
//! The editing layer owns and mutates timeline data; this crate defines the
//! read-only shapes it hands to the engine:
//! - Tracks, clips and media asset references
//! - Immutable timeline snapshots and the shared playhead
//! - Active-clip resolution (which clips show at a frame, in what order)
//! - Versioned timeline files and render-submission export

pub mod active;
pub mod asset;
pub mod clip;
pub mod export;
pub mod snapshot;
pub mod track;

pub use active::{
    resolve_active, upcoming_assets, ActiveClip, ActiveSet, IntegrityViolation, ViolationKind,
};
pub use asset::{AssetId, AssetKind, AssetLookup, MediaAsset};
pub use clip::{Clip, ClipId};
pub use export::{RenderSubmission, SubmittedClip, TimelineDocument, TimelineFile};
pub use snapshot::{Playhead, TimelineSnapshot};
pub use track::{Track, TrackId};
