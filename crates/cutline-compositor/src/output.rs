//! Output targets that receive flushed layer batches.

use cutline_core::Frame;
use cutline_timeline::{AssetId, ClipId};
use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::layers::{LayerOp, LayerStyle, RenderBatch};

/// Host-side visual tree the compositor writes into.
pub trait OutputTarget: Send {
    fn apply(&mut self, batch: &RenderBatch);
}

#[derive(Debug, Clone, PartialEq)]
struct RecordedLayer {
    asset_id: AssetId,
    slot: Option<usize>,
    style: LayerStyle,
}

/// Keeps a materialized copy of the tree and counts writes.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    layers: BTreeMap<ClipId, RecordedLayer>,
    batches: usize,
    writes: usize,
    last_frame: Option<Frame>,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self, clip_id: ClipId) -> Option<&LayerStyle> {
        self.layers.get(&clip_id).map(|layer| &layer.style)
    }

    pub fn asset(&self, clip_id: ClipId) -> Option<&AssetId> {
        self.layers.get(&clip_id).map(|layer| &layer.asset_id)
    }

    /// Pool slot backing the layer, if it is element-backed.
    pub fn slot(&self, clip_id: ClipId) -> Option<usize> {
        self.layers.get(&clip_id).and_then(|layer| layer.slot)
    }

    /// Layers bottom-to-top.
    pub fn stack(&self) -> Vec<ClipId> {
        let mut stack: Vec<(&ClipId, &LayerStyle)> =
            self.layers.iter().map(|(id, layer)| (id, &layer.style)).collect();
        stack.sort_by_key(|(id, style)| (style.z_index, **id));
        stack.into_iter().map(|(id, _)| *id).collect()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Batches received so far.
    pub fn batch_count(&self) -> usize {
        self.batches
    }

    /// Individual layer writes received so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.last_frame
    }
}

impl OutputTarget for RecordingTarget {
    fn apply(&mut self, batch: &RenderBatch) {
        self.batches += 1;
        self.writes += batch.ops.len();
        self.last_frame = Some(batch.frame);
        for op in &batch.ops {
            match op {
                LayerOp::Create {
                    clip_id,
                    asset_id,
                    slot,
                    style,
                } => {
                    self.layers.insert(
                        *clip_id,
                        RecordedLayer {
                            asset_id: asset_id.clone(),
                            slot: *slot,
                            style: *style,
                        },
                    );
                }
                LayerOp::Update {
                    clip_id,
                    slot,
                    style,
                } => {
                    if let Some(layer) = self.layers.get_mut(clip_id) {
                        layer.slot = *slot;
                        layer.style = *style;
                    }
                }
                LayerOp::Remove { clip_id } => {
                    self.layers.remove(clip_id);
                }
            }
        }
    }
}

/// Logs every write through `tracing`; used by the headless CLI.
#[derive(Debug, Default)]
pub struct TracingTarget {
    live: usize,
}

impl TracingTarget {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputTarget for TracingTarget {
    fn apply(&mut self, batch: &RenderBatch) {
        for op in &batch.ops {
            match op {
                LayerOp::Create {
                    clip_id,
                    asset_id,
                    slot,
                    style,
                } => {
                    self.live += 1;
                    debug!(frame = batch.frame, clip = %clip_id, asset = %asset_id, ?slot, z = style.z_index, "Layer created");
                }
                LayerOp::Update {
                    clip_id,
                    slot,
                    style,
                } => {
                    trace!(
                        frame = batch.frame,
                        clip = %clip_id,
                        ?slot,
                        opacity = style.opacity,
                        transform = %style.css_transform(),
                        "Layer updated"
                    );
                }
                LayerOp::Remove { clip_id } => {
                    self.live = self.live.saturating_sub(1);
                    debug!(frame = batch.frame, clip = %clip_id, "Layer removed");
                }
            }
        }
        trace!(frame = batch.frame, writes = batch.ops.len(), live = self.live, "Batch flushed");
    }
}
