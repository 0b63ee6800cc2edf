//! Prepared handles returned by the pool.

use cutline_timeline::AssetId;
use std::fmt;
use std::sync::Arc;

use crate::element::MediaElement;
use crate::error::MediaResult;

/// Rates closer than this are considered equal.
const RATE_EPSILON: f64 = 1e-3;

/// A pooled element that has been loaded and positioned for one request.
pub struct PreparedHandle<E> {
    pub(crate) element: Arc<E>,
    pub(crate) asset_id: AssetId,
    pub(crate) slot: usize,
    pub(crate) stale: bool,
}

impl<E: MediaElement> PreparedHandle<E> {
    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn asset_id(&self) -> &AssetId {
        &self.asset_id
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// The seek for this request timed out, so the element may still be
    /// showing an earlier frame.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Match the element's play state and rate to the transport.
    pub fn sync_playback(&self, is_playing: bool, rate: f64) -> MediaResult<()> {
        let element = &*self.element;
        if (element.playback_rate() - rate).abs() > RATE_EPSILON {
            element.set_playback_rate(rate);
        }
        match (is_playing, element.is_paused()) {
            (true, true) => element.play()?,
            (false, false) => element.pause(),
            _ => {}
        }
        Ok(())
    }

    /// Apply the global volume and the combined mute state.
    pub fn apply_gain(&self, volume: f32, muted: bool) {
        let element = &*self.element;
        if (element.volume() - volume).abs() > f32::EPSILON {
            element.set_volume(volume);
        }
        if element.is_muted() != muted {
            element.set_muted(muted);
        }
    }
}

impl<E> fmt::Debug for PreparedHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedHandle")
            .field("asset_id", &self.asset_id)
            .field("slot", &self.slot)
            .field("stale", &self.stale)
            .finish()
    }
}
