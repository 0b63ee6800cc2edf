//! Active-clip resolution.
//!
//! Given the clip set and a playhead frame, determine which clips are
//! visible/audible, where each one reads from its source, and the order in
//! which they stack. Pure and allocation-light; called once per evaluation.

use cutline_core::Frame;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::asset::AssetId;
use crate::clip::{Clip, ClipId};
use crate::snapshot::TimelineSnapshot;
use crate::track::{Track, TrackId};

/// A clip that is active at the evaluated frame.
#[derive(Debug, Clone, Copy)]
pub struct ActiveClip<'a> {
    pub clip: &'a Clip,
    pub track: &'a Track,
    /// Source frame to display: `in_point + (frame - start_frame)`.
    pub local_frame: Frame,
}

/// Why a clip inside its window was left out of the active set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// The computed source frame lies beyond the clip's out-point.
    LocalFrameOutOfRange { local_frame: Frame, out_point: Frame },
    /// The trim window is inverted (`in_point > out_point`).
    InvertedTrim { in_point: Frame, out_point: Frame },
    /// The clip references a track that is not in the timeline.
    UnknownTrack(TrackId),
}

/// A data-integrity problem found while resolving. These indicate a bug in
/// the editing layer; the resolver excludes the clip and reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityViolation {
    pub clip_id: ClipId,
    pub frame: Frame,
    pub kind: ViolationKind,
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::LocalFrameOutOfRange {
                local_frame,
                out_point,
            } => write!(
                f,
                "clip {} at frame {}: local frame {} exceeds out-point {}",
                self.clip_id, self.frame, local_frame, out_point
            ),
            ViolationKind::InvertedTrim {
                in_point,
                out_point,
            } => write!(
                f,
                "clip {}: in-point {} is after out-point {}",
                self.clip_id, in_point, out_point
            ),
            ViolationKind::UnknownTrack(track) => {
                write!(f, "clip {}: unknown track {}", self.clip_id, track)
            }
        }
    }
}

/// Result of resolving a frame.
#[derive(Debug, Clone)]
pub struct ActiveSet<'a> {
    pub frame: Frame,
    /// Active clips, bottom-most first.
    pub clips: SmallVec<[ActiveClip<'a>; 8]>,
    pub violations: Vec<IntegrityViolation>,
}

impl<'a> ActiveSet<'a> {
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveClip<'a>> {
        self.clips.iter()
    }

    pub fn clip_ids(&self) -> Vec<ClipId> {
        self.clips.iter().map(|a| a.clip.id).collect()
    }

    pub fn contains_asset(&self, asset: &AssetId) -> bool {
        self.clips.iter().any(|a| &a.clip.asset_id == asset)
    }
}

/// Resolve the clips active at `frame`.
///
/// A clip is active iff `start_frame <= frame < start_frame + duration` and
/// its track is not hidden. Clips whose source frame would pass the
/// out-point are excluded and reported as violations.
///
/// Ordering: track order ascending, then effective layer ascending, then
/// clip id; the input order does not matter.
pub fn resolve_active<'a>(
    tracks: &'a [Track],
    clips: impl IntoIterator<Item = &'a Clip>,
    frame: Frame,
) -> ActiveSet<'a> {
    let tracks_by_id: HashMap<TrackId, &'a Track> = tracks.iter().map(|t| (t.id, t)).collect();

    let mut active: SmallVec<[ActiveClip<'a>; 8]> = SmallVec::new();
    let mut violations = Vec::new();

    for clip in clips {
        if !clip.is_active_at(frame) {
            continue;
        }

        let Some(&track) = tracks_by_id.get(&clip.track_id) else {
            violations.push(IntegrityViolation {
                clip_id: clip.id,
                frame,
                kind: ViolationKind::UnknownTrack(clip.track_id),
            });
            continue;
        };
        if track.hidden {
            continue;
        }

        debug_assert!(
            clip.in_point <= clip.out_point,
            "clip {} has in-point {} after out-point {}",
            clip.id,
            clip.in_point,
            clip.out_point
        );
        if clip.in_point > clip.out_point {
            violations.push(IntegrityViolation {
                clip_id: clip.id,
                frame,
                kind: ViolationKind::InvertedTrim {
                    in_point: clip.in_point,
                    out_point: clip.out_point,
                },
            });
            continue;
        }

        let local_frame = clip.local_frame_unchecked(frame);
        if local_frame > clip.out_point {
            violations.push(IntegrityViolation {
                clip_id: clip.id,
                frame,
                kind: ViolationKind::LocalFrameOutOfRange {
                    local_frame,
                    out_point: clip.out_point,
                },
            });
            continue;
        }

        active.push(ActiveClip {
            clip,
            track,
            local_frame,
        });
    }

    active.sort_by(|a, b| {
        a.track
            .order
            .cmp(&b.track.order)
            .then_with(|| {
                a.clip
                    .effective_layer(a.track.order)
                    .cmp(&b.clip.effective_layer(b.track.order))
            })
            .then_with(|| a.clip.id.cmp(&b.clip.id))
    });

    ActiveSet {
        frame,
        clips: active,
        violations,
    }
}

/// Assets of clips starting within `horizon` frames after `frame`, in start
/// order, without duplicates and without assets already active at `frame`.
pub fn upcoming_assets(snapshot: &TimelineSnapshot, frame: Frame, horizon: Frame) -> Vec<AssetId> {
    let hidden: HashSet<TrackId> = snapshot
        .tracks
        .iter()
        .filter(|t| t.hidden)
        .map(|t| t.id)
        .collect();

    let active: HashSet<&AssetId> = snapshot
        .clips
        .values()
        .filter(|c| c.is_active_at(frame) && !hidden.contains(&c.track_id))
        .map(|c| &c.asset_id)
        .collect();

    let mut upcoming: Vec<&Clip> = snapshot
        .clips
        .values()
        .filter(|c| {
            c.start_frame > frame
                && c.start_frame <= frame.saturating_add(horizon)
                && !hidden.contains(&c.track_id)
        })
        .collect();
    upcoming.sort_by(|a, b| a.start_frame.cmp(&b.start_frame).then(a.id.cmp(&b.id)));

    let mut seen = HashSet::new();
    upcoming
        .into_iter()
        .map(|c| &c.asset_id)
        .filter(|id| !active.contains(id) && seen.insert(*id))
        .cloned()
        .collect()
}
