use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CanvasError, CanvasResult};
use crate::layer::{Layer, LayerState};

/// Ordered collection of layers, bottom to top. Later layers composite above
/// earlier ones.
///
/// Invariants: at least one layer always exists, and the active index is
/// always in range. Out-of-range indices from stale UI references are
/// tolerated as no-ops.
pub struct LayerStack {
    layers: Vec<Layer>,
    active: usize,
    width: u32,
    height: u32,
    /// Counts every layer ever created, for auto-generated names.
    created: usize,
}

impl LayerStack {
    /// Creates a stack with one transparent layer, which is active.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            layers: vec![Layer::new("Layer 1", width, height)],
            active: 0,
            width,
            height,
            created: 1,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        // The stack invariant keeps at least one layer at all times.
        false
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_layer(&self) -> &Layer {
        &self.layers[self.active]
    }

    pub fn active_layer_mut(&mut self) -> &mut Layer {
        &mut self.layers[self.active]
    }

    /// Appends a new transparent layer above all existing layers and makes it
    /// active. Returns the new layer's identity. Always succeeds.
    pub fn add_layer(&mut self, name: Option<&str>) -> Uuid {
        self.created += 1;
        let generated;
        let name = match name {
            Some(name) => name,
            None => {
                generated = format!("Layer {}", self.created);
                &generated
            }
        };
        let layer = Layer::new(name, self.width, self.height);
        let id = layer.id;
        self.layers.push(layer);
        self.active = self.layers.len() - 1;
        log::debug!("added layer {:?} ({})", name, id);
        id
    }

    /// Removes the layer at `index`. Deleting the only remaining layer, or an
    /// out-of-range index, is a no-op. The active index is clamped back into
    /// range.
    pub fn delete_layer(&mut self, index: usize) {
        if self.layers.len() <= 1 || index >= self.layers.len() {
            return;
        }
        let removed = self.layers.remove(index);
        if self.active >= index {
            self.active = self.active.saturating_sub(1);
        }
        log::debug!("deleted layer {:?} ({})", removed.name, removed.id);
    }

    pub fn toggle_visibility(&mut self, index: usize) {
        if let Some(layer) = self.layers.get_mut(index) {
            layer.visible = !layer.visible;
        }
    }

    pub fn set_opacity(&mut self, index: usize, opacity: f32) {
        if let Some(layer) = self.layers.get_mut(index) {
            layer.opacity = opacity.clamp(0.0, 1.0);
        }
    }

    pub fn set_locked(&mut self, index: usize, locked: bool) {
        if let Some(layer) = self.layers.get_mut(index) {
            layer.locked = locked;
        }
    }

    pub fn set_active(&mut self, index: usize) {
        if index < self.layers.len() {
            self.active = index;
        }
    }

    /// Composites the layer at `index` onto the layer below it, scaling the
    /// upper layer's pixels by its opacity (alpha-over, not pixel-replace),
    /// then removes the upper layer. No-op for index 0 or out of range.
    pub fn merge_down(&mut self, index: usize) {
        if index == 0 || index >= self.layers.len() {
            return;
        }
        let upper = self.layers.remove(index);
        let opacity = upper.opacity;
        let lower = &mut self.layers[index - 1];
        // Both buffers share the stack dimensions.
        let mut merged = lower.buffer().clone();
        blend_over(&mut merged, upper.buffer(), opacity);
        lower.replace_buffer(merged);
        if self.active >= index {
            self.active = self.active.saturating_sub(1);
        }
    }

    /// Flattens the stack into one RGBA image by painting visible layers
    /// bottom to top, each blended at its own opacity. Regions no layer
    /// covers stay transparent; no opaque background is assumed.
    pub fn composite(&self) -> RgbaImage {
        self.composite_impl(None)
    }

    /// Composite with the active layer's alpha knocked out wherever `mask`
    /// has coverage. Backs the eraser preview: only the active layer's
    /// contribution disappears, exactly as the committed erase will behave.
    pub(crate) fn composite_with_active_masked(&self, mask: &RgbaImage) -> RgbaImage {
        self.composite_impl(Some(mask))
    }

    fn composite_impl(&self, mask: Option<&RgbaImage>) -> RgbaImage {
        let mut out = RgbaImage::new(self.width, self.height);
        for (index, layer) in self.layers.iter().enumerate() {
            if !layer.visible || layer.opacity <= 0.0 {
                continue;
            }
            match mask {
                Some(mask) if index == self.active => {
                    let mut masked = layer.buffer().clone();
                    for (pixel, m) in masked.pixels_mut().zip(mask.pixels()) {
                        if m.0[3] > 0 {
                            pixel.0[3] = 0;
                        }
                    }
                    blend_over(&mut out, &masked, layer.opacity);
                }
                _ => blend_over(&mut out, layer.buffer(), layer.opacity),
            }
        }
        out
    }

    /// Resizes every layer (content anchored at the origin) and updates the
    /// stack dimensions. Zero dimensions are tolerated as a no-op.
    pub fn resize_all(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::warn!("ignoring resize to {}x{}", width, height);
            return;
        }
        for layer in &mut self.layers {
            layer.resize(width, height);
        }
        self.width = width;
        self.height = height;
    }

    /// Serializes the whole stack: every layer plus the active index.
    pub fn to_state(&self) -> CanvasResult<StackState> {
        let layers = self
            .layers
            .iter()
            .map(Layer::to_state)
            .collect::<CanvasResult<Vec<_>>>()?;
        Ok(StackState {
            layers,
            active_layer_index: self.active,
        })
    }

    /// Rebuilds a stack from its persisted form. All layers are loaded before
    /// anything is returned, so a corrupt layer fails the whole call and can
    /// never produce a half-loaded stack. Layers whose recorded dimensions
    /// disagree with the first layer are reframed to match.
    pub fn from_state(state: &StackState) -> CanvasResult<Self> {
        if state.layers.is_empty() {
            return Err(CanvasError::EmptyState);
        }
        let mut layers = state
            .layers
            .iter()
            .map(Layer::from_state)
            .collect::<CanvasResult<Vec<_>>>()?;
        let width = layers[0].width();
        let height = layers[0].height();
        for layer in &mut layers[1..] {
            layer.resize(width, height);
        }
        let created = layers.len();
        Ok(Self {
            active: state.active_layer_index.min(layers.len() - 1),
            layers,
            width,
            height,
            created,
        })
    }
}

/// Persisted form of the whole stack. This exact shape round-trips through
/// the host's save/restore cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackState {
    pub layers: Vec<LayerState>,
    pub active_layer_index: usize,
}

/// Standard src-over compositing of `src` onto `dst`, with `src` scaled by
/// `opacity`. Both images must have identical dimensions.
pub(crate) fn blend_over(dst: &mut RgbaImage, src: &RgbaImage, opacity: f32) {
    debug_assert_eq!(dst.dimensions(), src.dimensions());
    for (dst_px, src_px) in dst.pixels_mut().zip(src.pixels()) {
        blend_pixel(dst_px, src_px, opacity);
    }
}

pub(crate) fn blend_pixel(dst: &mut Rgba<u8>, src: &Rgba<u8>, opacity: f32) {
    let src_a = (src.0[3] as f32 / 255.0) * opacity;
    if src_a <= 0.0 {
        return;
    }
    let dst_a = dst.0[3] as f32 / 255.0;
    if dst_a <= 0.0 {
        // Nothing underneath: carry the source color through exactly.
        *dst = Rgba([src.0[0], src.0[1], src.0[2], (src_a * 255.0).round() as u8]);
        return;
    }
    let out_a = src_a + dst_a * (1.0 - src_a);
    for c in 0..3 {
        let s = src.0[c] as f32;
        let d = dst.0[c] as f32;
        dst.0[c] = ((s * src_a + d * dst_a * (1.0 - src_a)) / out_a).round() as u8;
    }
    dst.0[3] = (out_a * 255.0).round() as u8;
}
