use egui::{Color32, Pos2};

/// A single pointer sample captured during a gesture.
///
/// Samples exist only between pointer-down and pointer-up; they are never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeSample {
    /// Position in canvas pixel coordinates.
    pub pos: Pos2,
    /// Normalized pressure in 0.0..=1.0.
    pub pressure: f32,
}

impl StrokeSample {
    pub fn new(x: f32, y: f32, pressure: f32) -> Self {
        Self {
            pos: Pos2::new(x, y),
            pressure: pressure.clamp(0.0, 1.0),
        }
    }

    /// Sample from a device that reports no pressure (defaults to 1.0).
    pub fn without_pressure(x: f32, y: f32) -> Self {
        Self::new(x, y, 1.0)
    }
}

/// Brush configuration shared by the live preview and the final commit, so
/// both render with identical widths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushStyle {
    pub color: Color32,
    pub base_width: f32,
    /// Divisor of the pressure exponent: pressure is mapped through
    /// `p^(1 / pressure_sensitivity)` before scaling the width. 1.0 is a
    /// linear response; values above 1 flatten the curve toward full
    /// pressure, values below 1 exaggerate light touches. Must be > 0.
    pub pressure_sensitivity: f32,
}

impl Default for BrushStyle {
    fn default() -> Self {
        Self {
            color: Color32::BLACK,
            base_width: 5.0,
            pressure_sensitivity: 1.0,
        }
    }
}

impl BrushStyle {
    /// Effective width of the segment between two samples: each endpoint's
    /// pressure goes through the response curve, and the average scales the
    /// base width. Never narrower than one pixel.
    pub fn segment_width(&self, a: &StrokeSample, b: &StrokeSample) -> f32 {
        let pa = pressure_curve(a.pressure, self.pressure_sensitivity);
        let pb = pressure_curve(b.pressure, self.pressure_sensitivity);
        (self.base_width * (pa + pb) * 0.5).max(1.0)
    }
}

/// The non-linear pressure response: `p^(1 / sensitivity)`.
pub fn pressure_curve(pressure: f32, sensitivity: f32) -> f32 {
    debug_assert!(sensitivity > 0.0);
    pressure.clamp(0.0, 1.0).powf(1.0 / sensitivity)
}
