#![warn(clippy::all, rust_2018_idioms)]

//! Layered raster drawing engine: a bounded RGBA canvas composed of
//! independent transparent layers, pressure-sensitive brush and eraser
//! strokes with live preview, and bounded linear undo/redo over full
//! layer-stack snapshots. Headless: the host owns pointer capture and widget
//! placement and drives a [`CanvasController`] per canvas instance.

pub mod controller;
pub mod error;
pub mod history;
pub mod layer;
pub mod recorder;
pub mod stack;
pub mod stroke;

pub use controller::CanvasController;
pub use error::{CanvasError, CanvasResult};
pub use history::{DEFAULT_HISTORY_LIMIT, HistoryManager, HistorySnapshot};
pub use layer::{Layer, LayerState};
pub use recorder::{StrokeRecorder, Tool};
pub use stack::{LayerStack, StackState};
pub use stroke::{BrushStyle, StrokeSample};
