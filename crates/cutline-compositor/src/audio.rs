//! Audio path: keep pooled elements in step with the transport.

use cutline_media::{MediaElement, MediaResult, PreparedHandle};
use cutline_playback::PlaybackState;
use cutline_timeline::Track;

/// Gain settings for one audible clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipGain {
    pub volume: f32,
    pub muted: bool,
}

impl ClipGain {
    /// Global volume, muted when either the transport or the track is.
    pub fn for_track(playback: &PlaybackState, track: &Track) -> Self {
        Self {
            volume: playback.volume,
            muted: playback.muted || track.muted,
        }
    }
}

/// Match play state, rate and gain of `handle` to the transport.
pub fn sync_audio<E: MediaElement>(
    handle: &PreparedHandle<E>,
    playback: &PlaybackState,
    track: &Track,
) -> MediaResult<()> {
    let gain = ClipGain::for_track(playback, track);
    handle.apply_gain(gain.volume, gain.muted);
    handle.sync_playback(playback.is_playing, playback.rate)
}
