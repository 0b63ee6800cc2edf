//! Timeline files and render-submission export.
//!
//! [`TimelineFile`] is the versioned JSON container the CLI reads.
//! [`RenderSubmission`] is the validated clip list handed to an external
//! render service; this crate only builds it, it never sends it.

use cutline_core::{CutlineError, Frame, FrameRate, Result, Transition, TransformState};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

use crate::asset::{AssetId, AssetKind, AssetLookup, MediaAsset};
use crate::clip::{Clip, ClipId};
use crate::snapshot::TimelineSnapshot;
use crate::track::{Track, TrackId};

/// Current timeline file schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Timeline contents as stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineDocument {
    #[serde(default)]
    pub fps: FrameRate,
    pub tracks: Vec<Track>,
    pub clips: Vec<Clip>,
    #[serde(default)]
    pub assets: Vec<MediaAsset>,
    /// Explicit timeline length; defaults to the end of the last clip.
    #[serde(default)]
    pub duration: Option<Frame>,
}

impl TimelineDocument {
    /// Reject values the engine cannot time against.
    pub fn validate(&self) -> Result<()> {
        if !self.fps.is_valid() {
            return Err(CutlineError::InvalidParameter(format!(
                "frame rate {}/{} must have non-zero terms",
                self.fps.numerator, self.fps.denominator
            )));
        }
        Ok(())
    }

    /// Split into a snapshot for the engine and an asset table for lookups.
    pub fn into_parts(self) -> (TimelineSnapshot, HashMap<AssetId, MediaAsset>) {
        let mut snapshot = TimelineSnapshot::new(self.fps, self.tracks, self.clips);
        if let Some(duration) = self.duration {
            snapshot = snapshot.with_duration(duration);
        }
        let assets = self
            .assets
            .into_iter()
            .map(|asset| (asset.id.clone(), asset))
            .collect();
        (snapshot, assets)
    }
}

/// Versioned timeline file wrapper.
#[derive(Debug, Serialize, Deserialize)]
pub struct TimelineFile {
    pub version: u32,
    pub timeline: TimelineDocument,
}

impl TimelineFile {
    pub fn new(timeline: TimelineDocument) -> Self {
        Self {
            version: CURRENT_VERSION,
            timeline,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| CutlineError::Serialization(format!("Failed to serialize timeline: {}", e)))
    }

    /// Parse JSON bytes, upgrading older layouts and rejecting timelines the
    /// engine cannot play.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let raw: Value = serde_json::from_slice(data)
            .map_err(|e| CutlineError::Serialization(format!("Invalid JSON: {}", e)))?;

        let version = raw.get("version").and_then(Value::as_u64).unwrap_or(0) as u32;
        if version > CURRENT_VERSION {
            return Err(CutlineError::Serialization(format!(
                "Timeline file version {} is newer than supported version {}",
                version, CURRENT_VERSION
            )));
        }

        let mut upgraded = raw;
        for from in version..CURRENT_VERSION {
            upgraded = match from {
                0 => upgrade_v0(upgraded)?,
                _ => {
                    return Err(CutlineError::Serialization(format!(
                        "No upgrade from timeline version {}",
                        from
                    )))
                }
            };
        }

        let file: Self = serde_json::from_value(upgraded)
            .map_err(|e| CutlineError::Serialization(format!("Failed to parse timeline: {}", e)))?;
        file.timeline.validate()?;
        Ok(file)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let data = self.to_json()?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }
}

/// v0 files are a bare document. Their `fps` may be a plain number, and a
/// clip without `out_point` uses its source up to where the clip ends.
fn upgrade_v0(mut data: Value) -> Result<Value> {
    let mut doc = if data.get("timeline").is_some() {
        data["timeline"].take()
    } else {
        data
    };
    let Some(fields) = doc.as_object_mut() else {
        return Err(CutlineError::Serialization(
            "v0 timeline must be a JSON object".into(),
        ));
    };

    if let Some(fps) = fields.get("fps").and_then(Value::as_f64) {
        let rate = serde_json::to_value(frame_rate_from_f64(fps)?)
            .map_err(|e| CutlineError::Serialization(e.to_string()))?;
        fields.insert("fps".into(), rate);
    }

    let clips = fields.get_mut("clips").and_then(Value::as_array_mut);
    for clip in clips.into_iter().flatten().filter_map(Value::as_object_mut) {
        if clip.contains_key("out_point") {
            continue;
        }
        let in_point = clip.get("in_point").and_then(Value::as_u64).unwrap_or(0);
        let duration = clip.get("duration").and_then(Value::as_u64).unwrap_or(0);
        clip.insert("in_point".into(), in_point.into());
        clip.insert("out_point".into(), in_point.saturating_add(duration).into());
    }

    let mut file = Map::new();
    file.insert("version".into(), 1.into());
    file.insert("timeline".into(), doc);
    Ok(Value::Object(file))
}

/// Map a decimal rate such as `25`, `29.97` or `23.976` onto a rational one.
fn frame_rate_from_f64(fps: f64) -> Result<FrameRate> {
    if !(fps.is_finite() && fps > 0.0 && fps < u32::MAX as f64 / 1001.0) {
        return Err(CutlineError::InvalidParameter(format!(
            "frame rate {} is out of range",
            fps
        )));
    }
    let whole = fps.round();
    if (fps - whole).abs() < 1e-3 {
        return Ok(FrameRate::new(whole as u32, 1));
    }
    // NTSC family: n * 1000 / 1001.
    let ntsc = (fps * 1.001).round();
    if (ntsc / 1.001 - fps).abs() < 5e-3 {
        return Ok(FrameRate::new(ntsc as u32 * 1000, 1001));
    }
    Ok(FrameRate::new((fps * 1000.0).round() as u32, 1000))
}

/// One clip as the render service expects it: absolute times in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedClip {
    pub clip_id: ClipId,
    pub track_id: TrackId,
    pub track_order: i32,
    pub layer: i32,
    pub asset_id: AssetId,
    pub kind: AssetKind,
    pub url: String,
    pub start: f64,
    pub end: f64,
    pub trim_start: f64,
    pub trim_end: f64,
    pub muted: bool,
    pub transform: TransformState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition_in: Option<Transition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition_out: Option<Transition>,
}

/// A validated, render-ready clip list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSubmission {
    pub fps: FrameRate,
    /// Total length in seconds.
    pub duration: f64,
    /// Bottom-most first.
    pub clips: Vec<SubmittedClip>,
}

impl RenderSubmission {
    /// Validate every clip and convert it into submission form.
    ///
    /// Clips on hidden tracks are left out. Any clip with an inverted or
    /// overlong trim window, zero duration, an out-point past the end of its
    /// asset, or an unknown track or asset rejects the whole submission.
    pub fn from_snapshot<A>(snapshot: &TimelineSnapshot, assets: &A) -> Result<Self>
    where
        A: AssetLookup + ?Sized,
    {
        let fps = snapshot.fps;
        if !fps.is_valid() {
            return Err(CutlineError::InvalidParameter(format!(
                "invalid frame rate {}",
                fps
            )));
        }

        let mut clips = Vec::with_capacity(snapshot.clips.len());
        for clip in snapshot.clips.values() {
            let track = snapshot.track(clip.track_id).ok_or_else(|| {
                CutlineError::Timeline(format!(
                    "clip {} references unknown track {}",
                    clip.id, clip.track_id
                ))
            })?;
            if track.hidden {
                continue;
            }
            validate_clip(clip)?;

            let asset = assets.get_asset(&clip.asset_id).ok_or_else(|| {
                CutlineError::NotFound(format!(
                    "asset {} used by clip {}",
                    clip.asset_id, clip.id
                ))
            })?;
            if let Some(secs) = asset.duration_secs {
                validate_source_length(clip, asset, secs, fps)?;
            }

            clips.push(SubmittedClip {
                clip_id: clip.id,
                track_id: track.id,
                track_order: track.order,
                layer: clip.effective_layer(track.order),
                asset_id: clip.asset_id.clone(),
                kind: asset.kind,
                url: asset.url.clone(),
                start: fps.frames_to_seconds(clip.start_frame),
                end: fps.frames_to_seconds(clip.end_frame()),
                trim_start: fps.frames_to_seconds(clip.in_point),
                trim_end: fps.frames_to_seconds(clip.out_point),
                muted: track.muted,
                transform: clip.transform,
                transition_in: clip.transition_in,
                transition_out: clip.transition_out,
            });
        }

        clips.sort_by(|a, b| {
            a.track_order
                .cmp(&b.track_order)
                .then(a.layer.cmp(&b.layer))
                .then(a.start.total_cmp(&b.start))
                .then(a.clip_id.cmp(&b.clip_id))
        });

        Ok(Self {
            fps,
            duration: snapshot.duration_secs(),
            clips,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            CutlineError::Serialization(format!("Failed to serialize submission: {}", e))
        })
    }
}

/// The out-point may not run past the asset's last frame.
fn validate_source_length(clip: &Clip, asset: &MediaAsset, secs: f64, fps: FrameRate) -> Result<()> {
    if !(secs.is_finite() && secs >= 0.0) {
        return Err(CutlineError::InvalidParameter(format!(
            "asset {} has invalid duration {}",
            asset.id, secs
        )));
    }
    // Float math: huge values would overflow the rational conversion.
    let available = (secs * fps.to_fps_f64() + 1e-6).floor();
    if clip.out_point as f64 > available {
        return Err(CutlineError::Timeline(format!(
            "clip {} trims to frame {} but asset {} is only {} frames long",
            clip.id, clip.out_point, asset.id, available
        )));
    }
    Ok(())
}

fn validate_clip(clip: &Clip) -> Result<()> {
    if clip.duration == 0 {
        return Err(CutlineError::Timeline(format!(
            "clip {} has zero duration",
            clip.id
        )));
    }
    if clip.in_point >= clip.out_point {
        return Err(CutlineError::Timeline(format!(
            "clip {} trim window {}..{} is empty or inverted",
            clip.id, clip.in_point, clip.out_point
        )));
    }
    // The last displayed source frame is in_point + duration - 1.
    if clip.in_point.saturating_add(clip.duration - 1) > clip.out_point {
        return Err(CutlineError::Timeline(format!(
            "clip {} plays {} frames but its trim window holds {}",
            clip.id,
            clip.duration,
            clip.out_point - clip.in_point
        )));
    }
    Ok(())
}
