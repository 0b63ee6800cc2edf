//! Media asset references.
//!
//! Assets are owned by the asset store outside the preview engine. Clips
//! refer to them by [`AssetId`] and the engine only ever looks them up.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of a media asset in the asset store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Kind of media behind an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Video,
    Audio,
    Image,
}

fn default_has_audio() -> bool {
    true
}

/// A decodable media resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: AssetId,
    pub kind: AssetKind,
    /// Resolvable source URL.
    pub url: String,
    /// Duration in seconds. Absent for still images.
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// Whether a video asset has an audio stream.
    #[serde(default = "default_has_audio")]
    pub has_audio: bool,
}

impl MediaAsset {
    pub fn video(id: impl Into<String>, url: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            id: AssetId::new(id),
            kind: AssetKind::Video,
            url: url.into(),
            duration_secs: Some(duration_secs),
            width: Some(1920),
            height: Some(1080),
            has_audio: true,
        }
    }

    pub fn audio(id: impl Into<String>, url: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            id: AssetId::new(id),
            kind: AssetKind::Audio,
            url: url.into(),
            duration_secs: Some(duration_secs),
            width: None,
            height: None,
            has_audio: true,
        }
    }

    pub fn image(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: AssetId::new(id),
            kind: AssetKind::Image,
            url: url.into(),
            duration_secs: None,
            width: None,
            height: None,
            has_audio: false,
        }
    }

    /// Whether previewing this asset needs a pooled media element.
    pub fn needs_element(&self) -> bool {
        matches!(self.kind, AssetKind::Video | AssetKind::Audio)
    }

    /// Whether this asset contributes to the visual output.
    pub fn is_visual(&self) -> bool {
        matches!(self.kind, AssetKind::Video | AssetKind::Image)
    }

    /// Whether this asset contributes to the audio output.
    pub fn carries_audio(&self) -> bool {
        match self.kind {
            AssetKind::Audio => true,
            AssetKind::Video => self.has_audio,
            AssetKind::Image => false,
        }
    }
}

/// Lookup-only access to the asset store.
pub trait AssetLookup {
    fn get_asset(&self, id: &AssetId) -> Option<&MediaAsset>;
}

impl AssetLookup for HashMap<AssetId, MediaAsset> {
    fn get_asset(&self, id: &AssetId) -> Option<&MediaAsset> {
        self.get(id)
    }
}

impl AssetLookup for [MediaAsset] {
    fn get_asset(&self, id: &AssetId) -> Option<&MediaAsset> {
        self.iter().find(|asset| &asset.id == id)
    }
}

impl AssetLookup for Vec<MediaAsset> {
    fn get_asset(&self, id: &AssetId) -> Option<&MediaAsset> {
        self.as_slice().get_asset(id)
    }
}
