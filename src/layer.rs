use std::fmt;
use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use egui::Pos2;
use image::{ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CanvasError, CanvasResult};
use crate::stroke::{BrushStyle, StrokeSample};

/// One transparent raster buffer in the layer stack.
///
/// The buffer always matches the stack's canvas dimensions; the stack resizes
/// every layer when the canvas is resized.
#[derive(Clone, PartialEq)]
pub struct Layer {
    /// Stable unique identifier, preserved across save/restore.
    pub id: Uuid,
    pub name: String,
    pub visible: bool,
    /// Blend factor used when compositing, 0.0..=1.0.
    pub opacity: f32,
    /// Locked layers refuse stroke capture.
    pub locked: bool,
    buffer: RgbaImage,
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("visible", &self.visible)
            .field("opacity", &self.opacity)
            .field("locked", &self.locked)
            .field("size", &[self.buffer.width(), self.buffer.height()])
            .finish()
    }
}

/// What a segment stamp does to the pixels it covers.
#[derive(Clone, Copy)]
enum Ink {
    /// Paint the color opaquely over existing content.
    Paint(Rgba<u8>),
    /// Knock existing alpha down to zero.
    Erase,
}

impl Layer {
    /// Creates a fully transparent layer of the given dimensions.
    pub fn new(name: &str, width: u32, height: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            visible: true,
            opacity: 1.0,
            locked: false,
            buffer: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn buffer(&self) -> &RgbaImage {
        &self.buffer
    }

    /// Swaps in a fully prepared buffer (used by merge-down).
    pub(crate) fn replace_buffer(&mut self, buffer: RgbaImage) {
        self.buffer = buffer;
    }

    /// Commits a brush stroke onto this layer. Fewer than two samples is a
    /// no-op. Each consecutive sample pair is drawn as a round-capped,
    /// round-joined segment whose width follows the brush's pressure curve.
    pub fn draw_stroke(&mut self, samples: &[StrokeSample], style: &BrushStyle) {
        if samples.len() < 2 {
            log::debug!("stroke with {} sample(s) ignored", samples.len());
            return;
        }
        let color = style.color;
        let ink = Ink::Paint(Rgba([color.r(), color.g(), color.b(), 255]));
        for pair in samples.windows(2) {
            let width = style.segment_width(&pair[0], &pair[1]);
            self.stamp_segment(pair[0].pos, pair[1].pos, width, ink);
        }
    }

    /// Removes pixel content along the stroke path at a constant width.
    /// Erasing reduces alpha to zero; it does not paint a background color.
    pub fn erase(&mut self, samples: &[StrokeSample], width: f32) {
        if samples.len() < 2 {
            return;
        }
        let width = width.max(1.0);
        for pair in samples.windows(2) {
            self.stamp_segment(pair[0].pos, pair[1].pos, width, Ink::Erase);
        }
    }

    /// Resets the entire buffer to fully transparent.
    pub fn clear(&mut self) {
        for pixel in self.buffer.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    /// Reframes the buffer to new dimensions, anchored at the origin.
    /// Existing content is neither rescaled nor recentered; pixels outside
    /// the new bounds are discarded and new area is transparent.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.buffer.width() && height == self.buffer.height() {
            return;
        }
        let mut next = RgbaImage::new(width, height);
        let copy_w = width.min(self.buffer.width());
        let copy_h = height.min(self.buffer.height());
        for y in 0..copy_h {
            for x in 0..copy_w {
                next.put_pixel(x, y, *self.buffer.get_pixel(x, y));
            }
        }
        self.buffer = next;
    }

    /// Paints a decoded image into this layer at the origin, clipped to the
    /// layer bounds. Used for host-provided seed images.
    pub fn load_image(&mut self, image: &RgbaImage) {
        let copy_w = self.buffer.width().min(image.width());
        let copy_h = self.buffer.height().min(image.height());
        for y in 0..copy_h {
            for x in 0..copy_w {
                self.buffer.put_pixel(x, y, *image.get_pixel(x, y));
            }
        }
    }

    /// Serializes the layer into its persisted form: metadata plus the full
    /// pixel buffer as base64-encoded PNG (lossless).
    pub fn to_state(&self) -> CanvasResult<LayerState> {
        let mut png = Vec::new();
        self.buffer
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(CanvasError::Encode)?;
        Ok(LayerState {
            id: self.id,
            name: self.name.clone(),
            visible: self.visible,
            opacity: self.opacity,
            locked: self.locked,
            data: BASE64.encode(&png),
        })
    }

    /// Rebuilds a layer from its persisted form. A corrupt raster fails the
    /// whole call; no partially-loaded layer is ever produced.
    pub fn from_state(state: &LayerState) -> CanvasResult<Self> {
        let png = BASE64.decode(&state.data)?;
        let buffer = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .map_err(CanvasError::Decode)?
            .into_rgba8();
        Ok(Self {
            id: state.id,
            name: state.name.clone(),
            visible: state.visible,
            opacity: state.opacity.clamp(0.0, 1.0),
            locked: state.locked,
            buffer,
        })
    }

    /// Stamps discs of the given width along the segment. Disc spacing is a
    /// fraction of the radius so coverage stays solid; the end discs give the
    /// round caps, overlapping discs at shared endpoints give round joins.
    fn stamp_segment(&mut self, from: Pos2, to: Pos2, width: f32, ink: Ink) {
        let radius = (width * 0.5).max(0.5);
        let step = (radius * 0.5).max(0.25);
        let steps = (from.distance(to) / step).ceil().max(1.0) as u32;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let cx = from.x + (to.x - from.x) * t;
            let cy = from.y + (to.y - from.y) * t;
            self.stamp_disc(cx, cy, radius, ink);
        }
    }

    fn stamp_disc(&mut self, cx: f32, cy: f32, radius: f32, ink: Ink) {
        let (w, h) = (self.buffer.width() as i64, self.buffer.height() as i64);
        let min_x = ((cx - radius).floor() as i64).clamp(0, w);
        let max_x = ((cx + radius).ceil() as i64).clamp(0, w);
        let min_y = ((cy - radius).floor() as i64).clamp(0, h);
        let max_y = ((cy + radius).ceil() as i64).clamp(0, h);
        let r_sq = radius * radius;
        for y in min_y..max_y {
            for x in min_x..max_x {
                // Sample at the pixel center.
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy > r_sq {
                    continue;
                }
                let pixel = self.buffer.get_pixel_mut(x as u32, y as u32);
                match ink {
                    Ink::Paint(color) => *pixel = color,
                    Ink::Erase => pixel.0[3] = 0,
                }
            }
        }
    }
}

/// Persisted form of a single layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerState {
    pub id: Uuid,
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub locked: bool,
    /// Base64-encoded PNG of the full pixel buffer.
    pub data: String,
}
