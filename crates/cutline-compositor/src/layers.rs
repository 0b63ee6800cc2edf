//! Layer styles and the staged/applied layer tree.
//!
//! The compositor never writes to the output directly. Each evaluation
//! stages the layers it wants; when the scheduled frame arrives, the tree
//! diffs staged against applied and emits the minimal [`RenderBatch`].
//! Several evaluations between two frames collapse into one batch.

use cutline_core::{Frame, TransformState, Vec2};
use cutline_timeline::{AssetId, ClipId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pixel size of the output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn size(self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

/// Style written onto one layer node. Transforms are applied about the
/// layer's center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    /// Offset in container pixels.
    pub translate: Vec2,
    pub scale: Vec2,
    /// Degrees, clockwise.
    pub rotation: f32,
    pub opacity: f32,
    /// Stacking position; higher draws on top.
    pub z_index: i32,
    /// Render hint set while the layer is animating.
    pub will_change: bool,
}

impl LayerStyle {
    /// Project a resolved transform into container space.
    pub fn project(state: &TransformState, viewport: Viewport, z_index: i32, animating: bool) -> Self {
        Self {
            translate: state.position * viewport.size(),
            scale: state.scale,
            rotation: state.rotation,
            opacity: state.opacity.clamp(0.0, 1.0),
            z_index,
            will_change: animating,
        }
    }

    /// CSS-style transform string, handy for logging and DOM hosts.
    pub fn css_transform(&self) -> String {
        format!(
            "translate({:.2}px, {:.2}px) scale({:.4}, {:.4}) rotate({:.2}deg)",
            self.translate.x, self.translate.y, self.scale.x, self.scale.y, self.rotation
        )
    }
}

/// A layer the compositor wants on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub clip_id: ClipId,
    pub asset_id: AssetId,
    /// Pool slot whose element supplies the pixels; `None` for images.
    pub slot: Option<usize>,
    pub style: LayerStyle,
}

/// One write against the output tree.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerOp {
    Create {
        clip_id: ClipId,
        asset_id: AssetId,
        slot: Option<usize>,
        style: LayerStyle,
    },
    /// The node's style or its backing element changed.
    Update {
        clip_id: ClipId,
        slot: Option<usize>,
        style: LayerStyle,
    },
    Remove {
        clip_id: ClipId,
    },
}

/// Writes for one flush, bottom layer first, removals last.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderBatch {
    /// Playhead frame the staged layers were computed for.
    pub frame: Frame,
    pub ops: Vec<LayerOp>,
}

impl RenderBatch {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct LayerTree {
    applied: HashMap<ClipId, (AssetId, Option<usize>, LayerStyle)>,
    staged: Option<(Frame, Vec<Layer>)>,
}

impl LayerTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever was staged with the layers for `frame`.
    pub fn stage(&mut self, frame: Frame, layers: Vec<Layer>) {
        self.staged = Some((frame, layers));
    }

    pub fn has_staged(&self) -> bool {
        self.staged.is_some()
    }

    pub fn staged_frame(&self) -> Option<Frame> {
        self.staged.as_ref().map(|(frame, _)| *frame)
    }

    /// Layers currently on screen.
    pub fn applied_len(&self) -> usize {
        self.applied.len()
    }

    pub fn applied_style(&self, clip_id: ClipId) -> Option<&LayerStyle> {
        self.applied.get(&clip_id).map(|(_, _, style)| style)
    }

    pub fn applied_slot(&self, clip_id: ClipId) -> Option<usize> {
        self.applied.get(&clip_id).and_then(|(_, slot, _)| *slot)
    }

    /// Diff staged against applied, mark staged as applied, and return the
    /// writes. `None` when nothing was staged.
    pub fn take_batch(&mut self) -> Option<RenderBatch> {
        let (frame, layers) = self.staged.take()?;
        let mut ops = Vec::with_capacity(layers.len());
        let mut next = HashMap::with_capacity(layers.len());

        for layer in layers {
            match self.applied.get(&layer.clip_id) {
                Some((asset, slot, style)) if *asset == layer.asset_id => {
                    if *style != layer.style || *slot != layer.slot {
                        ops.push(LayerOp::Update {
                            clip_id: layer.clip_id,
                            slot: layer.slot,
                            style: layer.style,
                        });
                    }
                }
                Some(_) => {
                    // Same clip, different source: rebuild the node.
                    ops.push(LayerOp::Remove {
                        clip_id: layer.clip_id,
                    });
                    ops.push(LayerOp::Create {
                        clip_id: layer.clip_id,
                        asset_id: layer.asset_id.clone(),
                        slot: layer.slot,
                        style: layer.style,
                    });
                }
                None => ops.push(LayerOp::Create {
                    clip_id: layer.clip_id,
                    asset_id: layer.asset_id.clone(),
                    slot: layer.slot,
                    style: layer.style,
                }),
            }
            next.insert(layer.clip_id, (layer.asset_id, layer.slot, layer.style));
        }

        let mut removed: Vec<ClipId> = self
            .applied
            .keys()
            .filter(|id| !next.contains_key(id))
            .copied()
            .collect();
        removed.sort();
        ops.extend(removed.into_iter().map(|clip_id| LayerOp::Remove { clip_id }));

        self.applied = next;
        Some(RenderBatch { frame, ops })
    }

    /// Drop staged work and emit removals for everything on screen.
    pub fn clear(&mut self) -> RenderBatch {
        self.staged = None;
        let mut removed: Vec<ClipId> = self.applied.drain().map(|(id, _)| id).collect();
        removed.sort();
        RenderBatch {
            frame: 0,
            ops: removed
                .into_iter()
                .map(|clip_id| LayerOp::Remove { clip_id })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(id: u128, opacity: f32) -> Layer {
        Layer {
            clip_id: ClipId::from_u128(id),
            asset_id: AssetId::from("a"),
            slot: Some(0),
            style: LayerStyle::project(
                &TransformState::IDENTITY.with_opacity_factor(opacity),
                Viewport::default(),
                0,
                false,
            ),
        }
    }

    #[test]
    fn test_projection_scales_position_to_pixels() {
        let state = TransformState {
            position: Vec2::new(0.25, -0.5),
            rotation: 45.0,
            ..TransformState::IDENTITY
        };
        let style = LayerStyle::project(&state, Viewport::new(1280, 720), 3, true);
        assert_eq!(style.translate, Vec2::new(320.0, -360.0));
        assert_eq!(style.z_index, 3);
        assert!(style.will_change);
        assert_eq!(
            style.css_transform(),
            "translate(320.00px, -360.00px) scale(1.0000, 1.0000) rotate(45.00deg)"
        );
    }

    #[test]
    fn test_first_batch_creates_layers() {
        let mut tree = LayerTree::new();
        assert!(tree.take_batch().is_none());

        tree.stage(10, vec![layer(1, 1.0), layer(2, 1.0)]);
        let batch = tree.take_batch().unwrap();
        assert_eq!(batch.frame, 10);
        assert_eq!(batch.ops.len(), 2);
        assert!(matches!(batch.ops[0], LayerOp::Create { .. }));
        assert_eq!(tree.applied_len(), 2);
    }

    #[test]
    fn test_unchanged_layers_produce_no_writes() {
        let mut tree = LayerTree::new();
        tree.stage(1, vec![layer(1, 1.0)]);
        tree.take_batch();
        tree.stage(2, vec![layer(1, 1.0)]);
        assert!(tree.take_batch().unwrap().is_empty());
    }

    #[test]
    fn test_diff_updates_and_removes() {
        let mut tree = LayerTree::new();
        tree.stage(1, vec![layer(1, 1.0), layer(2, 1.0)]);
        tree.take_batch();

        tree.stage(2, vec![layer(1, 0.5)]);
        let batch = tree.take_batch().unwrap();
        assert_eq!(
            batch.ops,
            vec![
                LayerOp::Update {
                    clip_id: ClipId::from_u128(1),
                    slot: Some(0),
                    style: layer(1, 0.5).style,
                },
                LayerOp::Remove {
                    clip_id: ClipId::from_u128(2)
                },
            ]
        );
    }

    #[test]
    fn test_rebound_slot_is_an_update() {
        let mut tree = LayerTree::new();
        tree.stage(1, vec![layer(1, 1.0)]);
        tree.take_batch();

        let moved = Layer {
            slot: Some(2),
            ..layer(1, 1.0)
        };
        tree.stage(2, vec![moved]);
        let batch = tree.take_batch().unwrap();
        assert!(matches!(
            batch.ops.as_slice(),
            [LayerOp::Update { slot: Some(2), .. }]
        ));
        assert_eq!(tree.applied_slot(ClipId::from_u128(1)), Some(2));
    }

    #[test]
    fn test_restaging_coalesces() {
        let mut tree = LayerTree::new();
        tree.stage(1, vec![layer(1, 0.2)]);
        tree.stage(2, vec![layer(1, 0.8)]);
        let batch = tree.take_batch().unwrap();
        assert_eq!(batch.frame, 2);
        assert_eq!(batch.ops.len(), 1);
        assert_eq!(tree.applied_style(ClipId::from_u128(1)).unwrap().opacity, 0.8);
    }

    #[test]
    fn test_clear_removes_everything() {
        let mut tree = LayerTree::new();
        tree.stage(1, vec![layer(1, 1.0)]);
        tree.take_batch();
        let batch = tree.clear();
        assert_eq!(batch.ops.len(), 1);
        assert_eq!(tree.applied_len(), 0);
    }
}
