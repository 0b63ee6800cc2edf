//! Error types for media elements and the resource pool.

use cutline_core::CutlineError;
use cutline_timeline::AssetId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaError {
    #[error("Failed to load {url}: {reason}")]
    LoadFailed { url: String, reason: String },

    #[error("Asset {0} has no source URL")]
    MissingSource(AssetId),

    #[error("Operation on asset {0} was abandoned by a pool reset")]
    Abandoned(AssetId),

    #[error("No free pool slot for asset {0}")]
    PoolExhausted(AssetId),

    #[error("Media pool has been disposed")]
    Disposed,

    #[error("Playback rejected: {0}")]
    PlaybackRejected(String),

    #[error("Unknown asset: {0}")]
    UnknownAsset(AssetId),
}

impl From<MediaError> for CutlineError {
    fn from(err: MediaError) -> Self {
        CutlineError::Media(err.to_string())
    }
}

pub type MediaResult<T> = std::result::Result<T, MediaError>;
