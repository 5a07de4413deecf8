use egui::Color32;
use image::RgbaImage;

use crate::layer::Layer;
use crate::stack::{LayerStack, blend_over};
use crate::stroke::{BrushStyle, StrokeSample};

/// The active tool. `Select` never captures strokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Brush,
    Eraser,
    Select,
}

/// Converts a pointer gesture into a committed mark on the active layer,
/// previewing live while the pointer is down.
///
/// Two states: Idle and Capturing. Capture begins on pointer-down (drawing
/// tool, unlocked active layer), accumulates samples on pointer-move with an
/// incremental preview of only the newest sample pair, and commits the full
/// sequence on pointer-up. There is no cap on capture length or duration;
/// memory grows linearly with the sample count for the life of the gesture.
pub struct StrokeRecorder {
    tool: Tool,
    brush: BrushStyle,
    eraser_width: f32,
    samples: Vec<StrokeSample>,
    capturing: bool,
    /// Transient overlay the preview renders into. For the brush it holds
    /// colored segments blended over the composite; for the eraser it is an
    /// alpha mask knocked out of the active layer's contribution. Never part
    /// of the stack and never exported.
    preview: Layer,
}

impl StrokeRecorder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            tool: Tool::Brush,
            brush: BrushStyle::default(),
            eraser_width: 10.0,
            samples: Vec::new(),
            capturing: false,
            preview: Layer::new("preview", width, height),
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Switching tools mid-capture discards the in-progress stroke.
    pub fn set_tool(&mut self, tool: Tool) {
        if self.capturing && tool != self.tool {
            self.cancel();
        }
        self.tool = tool;
    }

    pub fn brush(&self) -> &BrushStyle {
        &self.brush
    }

    pub fn set_brush(&mut self, brush: BrushStyle) {
        self.brush = brush;
    }

    pub fn set_eraser_width(&mut self, width: f32) {
        self.eraser_width = width.max(1.0);
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// Pointer-down: starts a capture and seeds it with the first sample.
    /// Refused (returns false) when the tool is `Select` or the active layer
    /// is locked.
    pub fn begin(&mut self, sample: StrokeSample, stack: &LayerStack) -> bool {
        if self.tool == Tool::Select {
            return false;
        }
        if stack.active_layer().locked {
            log::debug!("capture refused: active layer is locked");
            return false;
        }
        self.preview.clear();
        self.samples.clear();
        self.samples.push(sample);
        self.capturing = true;
        true
    }

    /// Pointer-move: appends a sample and stamps exactly the newest pair onto
    /// the preview overlay. Never redraws the whole stroke, so cost per move
    /// is independent of stroke length. Ignored while idle.
    pub fn append(&mut self, sample: StrokeSample) {
        if !self.capturing {
            return;
        }
        self.samples.push(sample);
        let pair = [self.samples[self.samples.len() - 2], sample];
        match self.tool {
            Tool::Brush => self.preview.draw_stroke(&pair, &self.brush),
            Tool::Eraser => {
                // The mask ignores pressure, matching the committed erase.
                let style = BrushStyle {
                    color: Color32::WHITE,
                    base_width: self.eraser_width,
                    pressure_sensitivity: 1.0,
                };
                let pair = pair.map(|s| StrokeSample { pressure: 1.0, ..s });
                self.preview.draw_stroke(&pair, &style);
            }
            Tool::Select => {}
        }
    }

    /// Pointer-up: ends the capture. Fewer than two samples is discarded
    /// silently; otherwise the full sequence is committed to the active layer
    /// (which is re-checked, in case it was locked while the pointer was
    /// down). Returns whether a commit happened, so the caller knows to
    /// recomposite and snapshot.
    pub fn finish(&mut self, stack: &mut LayerStack) -> bool {
        if !self.capturing {
            return false;
        }
        self.capturing = false;
        self.preview.clear();
        let samples = std::mem::take(&mut self.samples);
        if samples.len() < 2 || stack.active_layer().locked {
            return false;
        }
        match self.tool {
            Tool::Brush => stack.active_layer_mut().draw_stroke(&samples, &self.brush),
            Tool::Eraser => stack.active_layer_mut().erase(&samples, self.eraser_width),
            Tool::Select => return false,
        }
        log::debug!("committed {} sample stroke", samples.len());
        true
    }

    /// Discards any in-progress capture without committing. Used when the
    /// active layer is locked or deleted mid-gesture, or when the canvas is
    /// resized or reloaded under the pointer.
    pub fn cancel(&mut self) {
        if self.capturing {
            log::debug!("capture cancelled after {} samples", self.samples.len());
        }
        self.capturing = false;
        self.samples.clear();
        self.preview.clear();
    }

    /// Resizes the preview overlay to track the canvas. Cancels any capture,
    /// since its samples refer to the old coordinate frame.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.cancel();
        self.preview.resize(width, height);
    }

    /// Flattens the stack with the live preview applied: brush segments
    /// blend over the composite, eraser segments knock content out of the
    /// active layer's contribution only, exactly as the commit will. While
    /// idle this is the plain composite.
    pub fn composite_with_preview(&self, stack: &LayerStack) -> RgbaImage {
        if !self.capturing {
            return stack.composite();
        }
        match self.tool {
            Tool::Brush => {
                let mut image = stack.composite();
                blend_over(&mut image, self.preview.buffer(), 1.0);
                image
            }
            Tool::Eraser => stack.composite_with_active_masked(self.preview.buffer()),
            Tool::Select => stack.composite(),
        }
    }
}
