//! Track types for the timeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique track identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Deterministic id, mostly useful for fixtures.
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn default_height() -> f32 {
    60.0
}

/// An ordered lane on the timeline.
///
/// `order` is the stacking order: lanes with a higher order are composited
/// on top of lanes with a lower order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    /// Display/stacking order; unique within a timeline.
    pub order: i32,
    /// Muted tracks still render but their audio is silenced.
    #[serde(default)]
    pub muted: bool,
    /// Hidden tracks contribute nothing to the preview.
    #[serde(default)]
    pub hidden: bool,
    /// Locked tracks reject edits; irrelevant to preview.
    #[serde(default)]
    pub locked: bool,
    /// Lane height in the editor (presentation only).
    #[serde(default = "default_height")]
    pub height: f32,
}

impl Track {
    pub fn new(name: impl Into<String>, order: i32) -> Self {
        Self {
            id: TrackId::new(),
            name: name.into(),
            order,
            muted: false,
            hidden: false,
            locked: false,
            height: default_height(),
        }
    }

    pub fn with_id(mut self, id: TrackId) -> Self {
        self.id = id;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn muted(mut self) -> Self {
        self.muted = true;
        self
    }
}
