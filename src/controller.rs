use std::io::Cursor;

use image::{ImageFormat, RgbaImage};
use uuid::Uuid;

use crate::error::{CanvasError, CanvasResult};
use crate::history::HistoryManager;
use crate::recorder::{StrokeRecorder, Tool};
use crate::stack::{LayerStack, StackState};
use crate::stroke::{BrushStyle, StrokeSample};

/// The per-canvas handle the host drives.
///
/// Each controller owns an independent `LayerStack`, `HistoryManager` and
/// `StrokeRecorder`; nothing is shared between canvas instances and there is
/// no ambient registry. The host keeps the handle it got from construction
/// and passes every event to it directly.
pub struct CanvasController {
    stack: LayerStack,
    history: HistoryManager,
    recorder: StrokeRecorder,
}

impl CanvasController {
    /// Creates a canvas of the given dimensions with one transparent layer.
    /// The starting state is snapshotted so the first undo returns to it.
    pub fn new(width: u32, height: u32) -> CanvasResult<Self> {
        let stack = LayerStack::new(width, height);
        let history = HistoryManager::new(&stack)?;
        Ok(Self {
            recorder: StrokeRecorder::new(width, height),
            stack,
            history,
        })
    }

    /// Creates a canvas seeded with a host-provided image, painted into the
    /// active layer at the origin and clipped to the canvas bounds.
    pub fn with_seed_image(width: u32, height: u32, encoded: &[u8]) -> CanvasResult<Self> {
        let seed = image::load_from_memory(encoded)
            .map_err(CanvasError::Decode)?
            .into_rgba8();
        let mut stack = LayerStack::new(width, height);
        stack.active_layer_mut().load_image(&seed);
        let history = HistoryManager::new(&stack)?;
        log::info!("seeded {}x{} canvas from {}x{} image", width, height, seed.width(), seed.height());
        Ok(Self {
            recorder: StrokeRecorder::new(width, height),
            stack,
            history,
        })
    }

    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    pub fn width(&self) -> u32 {
        self.stack.width()
    }

    pub fn height(&self) -> u32 {
        self.stack.height()
    }

    pub fn is_capturing(&self) -> bool {
        self.recorder.is_capturing()
    }

    // ---- Tool configuration ------------------------------------------------

    pub fn tool(&self) -> Tool {
        self.recorder.tool()
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.recorder.set_tool(tool);
    }

    pub fn set_brush(&mut self, brush: BrushStyle) {
        self.recorder.set_brush(brush);
    }

    pub fn set_eraser_width(&mut self, width: f32) {
        self.recorder.set_eraser_width(width);
    }

    // ---- Pointer pipeline --------------------------------------------------

    /// Pointer-down. `pressure` is the device's normalized reading; `None`
    /// when the device reports no pressure. Returns whether a capture began.
    pub fn pointer_down(&mut self, x: f32, y: f32, pressure: Option<f32>) -> bool {
        let sample = StrokeSample::new(x, y, pressure.unwrap_or(1.0));
        self.recorder.begin(sample, &self.stack)
    }

    /// Pointer-move while the pointer is down; ignored otherwise.
    pub fn pointer_move(&mut self, x: f32, y: f32, pressure: Option<f32>) {
        let sample = StrokeSample::new(x, y, pressure.unwrap_or(1.0));
        self.recorder.append(sample);
    }

    /// Pointer-up. Commits the captured stroke to the active layer and
    /// snapshots the result; returns whether a commit happened (strokes of a
    /// single sample are discarded silently).
    pub fn pointer_up(&mut self) -> CanvasResult<bool> {
        let committed = self.recorder.finish(&mut self.stack);
        if committed {
            self.history.save_state(&self.stack)?;
        }
        Ok(committed)
    }

    // ---- Layer operations --------------------------------------------------

    /// Adds a layer on top of the stack and makes it active. Cancels any
    /// in-flight capture, since it targeted the previous active layer.
    pub fn add_layer(&mut self, name: Option<&str>) -> CanvasResult<Uuid> {
        self.recorder.cancel();
        let id = self.stack.add_layer(name);
        self.history.save_state(&self.stack)?;
        Ok(id)
    }

    /// Deletes the layer at `index` (no-op for the last remaining layer or an
    /// out-of-range index). Deleting the layer a capture is targeting
    /// discards that capture without committing.
    pub fn delete_layer(&mut self, index: usize) -> CanvasResult<()> {
        if self.recorder.is_capturing() && index == self.stack.active_index() {
            self.recorder.cancel();
        }
        let before = self.stack.len();
        self.stack.delete_layer(index);
        if self.stack.len() != before {
            self.history.save_state(&self.stack)?;
        }
        Ok(())
    }

    pub fn merge_down(&mut self, index: usize) -> CanvasResult<()> {
        let before = self.stack.len();
        self.stack.merge_down(index);
        if self.stack.len() != before {
            self.recorder.cancel();
            self.history.save_state(&self.stack)?;
        }
        Ok(())
    }

    pub fn toggle_visibility(&mut self, index: usize) -> CanvasResult<()> {
        if index < self.stack.len() {
            self.stack.toggle_visibility(index);
            self.history.save_state(&self.stack)?;
        }
        Ok(())
    }

    pub fn set_opacity(&mut self, index: usize, opacity: f32) -> CanvasResult<()> {
        if index < self.stack.len() {
            self.stack.set_opacity(index, opacity);
            self.history.save_state(&self.stack)?;
        }
        Ok(())
    }

    /// Locks or unlocks a layer. Locking the layer a capture is targeting
    /// discards that capture. Setting the flag a layer already carries is a
    /// no-op and records no history entry.
    pub fn set_layer_locked(&mut self, index: usize, locked: bool) -> CanvasResult<()> {
        match self.stack.layer(index) {
            Some(layer) if layer.locked != locked => {}
            _ => return Ok(()),
        }
        if locked && self.recorder.is_capturing() && index == self.stack.active_index() {
            self.recorder.cancel();
        }
        self.stack.set_locked(index, locked);
        self.history.save_state(&self.stack)?;
        Ok(())
    }

    /// Changes the active layer. Selection changes are not recorded in
    /// history; only content mutations are.
    pub fn set_active(&mut self, index: usize) {
        if index < self.stack.len() && index != self.stack.active_index() {
            self.recorder.cancel();
            self.stack.set_active(index);
        }
    }

    /// Clears the active layer to fully transparent.
    pub fn clear_active_layer(&mut self) -> CanvasResult<()> {
        self.recorder.cancel();
        self.stack.active_layer_mut().clear();
        self.history.save_state(&self.stack)
    }

    // ---- Canvas operations -------------------------------------------------

    /// Resizes the canvas to the host-requested dimensions, reframing every
    /// layer at the origin. Content outside the new bounds is discarded.
    pub fn set_resize_target(&mut self, width: u32, height: u32) -> CanvasResult<()> {
        if width == 0 || height == 0 {
            log::warn!("ignoring resize request to {}x{}", width, height);
            return Ok(());
        }
        if (width, height) == (self.stack.width(), self.stack.height()) {
            return Ok(());
        }
        self.recorder.resize(width, height);
        self.stack.resize_all(width, height);
        self.history.save_state(&self.stack)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Steps history back one snapshot, discarding any in-flight capture.
    /// Returns whether an undo occurred.
    pub fn undo(&mut self) -> CanvasResult<bool> {
        self.recorder.cancel();
        let undone = self.history.undo(&mut self.stack)?;
        if undone {
            // The restored snapshot may predate a resize.
            self.recorder.resize(self.stack.width(), self.stack.height());
        }
        Ok(undone)
    }

    pub fn redo(&mut self) -> CanvasResult<bool> {
        self.recorder.cancel();
        let redone = self.history.redo(&mut self.stack)?;
        if redone {
            self.recorder.resize(self.stack.width(), self.stack.height());
        }
        Ok(redone)
    }

    // ---- Output ------------------------------------------------------------

    /// The on-screen image: the flattened stack with the live stroke preview
    /// applied on top. Individual layer buffers are never displayed directly.
    pub fn composite(&self) -> RgbaImage {
        self.recorder.composite_with_preview(&self.stack)
    }

    /// The export image: the flattened stack, losslessly PNG-encoded, without
    /// any preview. Regions no layer covers stay transparent.
    pub fn export_png(&self) -> CanvasResult<Vec<u8>> {
        let composite = self.stack.composite();
        let mut png = Vec::new();
        composite
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(CanvasError::Encode)?;
        Ok(png)
    }

    // ---- Persistence -------------------------------------------------------

    /// Serializes the full layer stack into the opaque blob the host persists.
    pub fn serialize(&self) -> CanvasResult<String> {
        Ok(serde_json::to_string(&self.stack.to_state()?)?)
    }

    /// Restores a previously serialized blob. The replacement is atomic: all
    /// layers decode into a staging stack first, and any failure leaves the
    /// current stack fully intact. On success history restarts from the
    /// loaded state.
    pub fn deserialize(&mut self, blob: &str) -> CanvasResult<()> {
        let state: StackState = serde_json::from_str(blob)?;
        let stack = LayerStack::from_state(&state)?;
        let history = HistoryManager::new(&stack)?;
        self.recorder.resize(stack.width(), stack.height());
        log::info!(
            "restored {} layer(s) at {}x{}",
            stack.len(),
            stack.width(),
            stack.height()
        );
        self.stack = stack;
        self.history = history;
        Ok(())
    }
}
