//! Timeline files through resolution and export.

use cutline_core::{CutlineError, Frame, FrameRate};
use cutline_timeline::export::CURRENT_VERSION;
use cutline_timeline::{
    upcoming_assets, AssetId, AssetKind, MediaAsset, RenderSubmission, TimelineFile,
    TimelineSnapshot,
};
use std::collections::HashMap;

const DEMO: &str = include_str!("../../../demos/timeline.json");

fn demo() -> (TimelineSnapshot, HashMap<AssetId, MediaAsset>) {
    TimelineFile::from_json(DEMO.as_bytes())
        .unwrap()
        .timeline
        .into_parts()
}

fn asset_names(snapshot: &TimelineSnapshot, frame: Frame) -> Vec<String> {
    snapshot
        .active_at(frame)
        .iter()
        .map(|item| item.clip.asset_id.to_string())
        .collect()
}

// ── Loading ────────────────────────────────────────────────────

#[test]
fn demo_timeline_loads() {
    let file = TimelineFile::from_json(DEMO.as_bytes()).unwrap();
    assert_eq!(file.version, CURRENT_VERSION);

    let (snapshot, assets) = file.timeline.into_parts();
    assert_eq!(snapshot.fps, FrameRate::FPS_30);
    assert_eq!(snapshot.clips.len(), 4);
    assert_eq!(snapshot.duration, 360);
    assert_eq!(assets.len(), 4);
}

#[test]
fn bare_document_is_migrated() {
    let raw: serde_json::Value = serde_json::from_str(DEMO).unwrap();
    let bare = serde_json::to_vec(&raw["timeline"]).unwrap();

    let file = TimelineFile::from_json(&bare).unwrap();
    assert_eq!(file.version, CURRENT_VERSION);
    assert_eq!(file.timeline.clips.len(), 4);
}

#[test]
fn newer_file_version_is_rejected() {
    let mut raw: serde_json::Value = serde_json::from_str(DEMO).unwrap();
    raw["version"] = serde_json::json!(CURRENT_VERSION + 1);
    let data = serde_json::to_vec(&raw).unwrap();
    assert!(matches!(
        TimelineFile::from_json(&data),
        Err(CutlineError::Serialization(_))
    ));
}

// ── Resolution ─────────────────────────────────────────────────

#[test]
fn active_clips_stack_by_track_order() {
    let (snapshot, _) = demo();
    assert_eq!(asset_names(&snapshot, 0), vec!["intro", "score"]);
    assert_eq!(asset_names(&snapshot, 150), vec!["interview", "lower-third", "score"]);
    assert!(asset_names(&snapshot, 360).is_empty());
}

#[test]
fn trimmed_clip_maps_to_source_frame() {
    let (snapshot, _) = demo();
    let active = snapshot.active_at(150);
    let interview = active
        .iter()
        .find(|item| item.clip.asset_id.as_str() == "interview")
        .unwrap();
    assert_eq!(interview.local_frame, 120);
}

#[test]
fn keyframes_and_transitions_combine() {
    let (snapshot, _) = demo();
    let title = snapshot
        .clips
        .values()
        .find(|c| c.asset_id.as_str() == "lower-third")
        .unwrap();
    let entering = title.visual_state_at(150);
    assert_eq!(entering.opacity, 0.0);
    assert_eq!(entering.position.x, -0.5);
    assert!(title.is_animating_at(155));
    assert_eq!(title.visual_state_at(200).opacity, 1.0);

    let intro = snapshot
        .clips
        .values()
        .find(|c| c.asset_id.as_str() == "intro")
        .unwrap();
    // Fade-out over the last 15 frames, 105..120.
    assert_eq!(intro.visual_state_at(104).opacity, 1.0);
    assert!(intro.visual_state_at(112).opacity < 1.0);
}

#[test]
fn upcoming_assets_for_preload() {
    let (snapshot, _) = demo();
    let upcoming = upcoming_assets(&snapshot, 100, 60);
    assert_eq!(
        upcoming,
        vec![AssetId::from("interview"), AssetId::from("lower-third")]
    );
    assert!(upcoming_assets(&snapshot, 300, 60).is_empty());
}

// ── Export ─────────────────────────────────────────────────────

#[test]
fn submission_uses_seconds_and_stacking_order() {
    let (snapshot, assets) = demo();
    let submission = RenderSubmission::from_snapshot(&snapshot, &assets).unwrap();
    assert_eq!(submission.duration, 12.0);

    let order: Vec<&str> = submission
        .clips
        .iter()
        .map(|c| c.asset_id.as_str())
        .collect();
    assert_eq!(order, vec!["intro", "interview", "lower-third", "score"]);

    let interview = &submission.clips[1];
    assert_eq!(interview.kind, AssetKind::Video);
    assert_eq!(interview.start, 4.0);
    assert_eq!(interview.end, 12.0);
    assert_eq!(interview.trim_start, 3.0);
    assert_eq!(interview.trim_end, 11.0);
    assert!(interview.transition_in.is_some());
}

#[test]
fn hidden_tracks_are_left_out() {
    let (mut snapshot, assets) = demo();
    snapshot.tracks[1].hidden = true;

    assert_eq!(asset_names(&snapshot, 150), vec!["interview", "score"]);
    let submission = RenderSubmission::from_snapshot(&snapshot, &assets).unwrap();
    assert_eq!(submission.clips.len(), 3);
}

#[test]
fn submission_rejects_trim_past_source_end() {
    let (snapshot, mut assets) = demo();
    // The intro clip trims to frame 120, i.e. four seconds of source.
    if let Some(intro) = assets.get_mut(&AssetId::from("intro")) {
        intro.duration_secs = Some(2.0);
    }
    let err = RenderSubmission::from_snapshot(&snapshot, &assets).unwrap_err();
    assert!(matches!(err, CutlineError::Timeline(_)));
}

#[test]
fn submission_rejects_missing_asset() {
    let (snapshot, mut assets) = demo();
    assets.remove(&AssetId::from("score"));
    assert!(matches!(
        RenderSubmission::from_snapshot(&snapshot, &assets),
        Err(CutlineError::NotFound(_))
    ));
}
