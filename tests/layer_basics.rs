use image::{Rgba, RgbaImage};
use layer_paint::layer::Layer;
use layer_paint::stroke::{BrushStyle, StrokeSample, pressure_curve};

fn black_brush(base_width: f32, pressure_sensitivity: f32) -> BrushStyle {
    BrushStyle {
        color: egui::Color32::BLACK,
        base_width,
        pressure_sensitivity,
    }
}

fn horizontal_stroke(y: f32, x0: f32, x1: f32, pressure: f32) -> Vec<StrokeSample> {
    vec![
        StrokeSample::new(x0, y, pressure),
        StrokeSample::new(x1, y, pressure),
    ]
}

fn alpha_at(layer: &Layer, x: u32, y: u32) -> u8 {
    layer.buffer().get_pixel(x, y).0[3]
}

#[test]
fn test_short_strokes_are_noops() {
    let mut layer = Layer::new("test", 32, 32);
    let brush = black_brush(5.0, 1.0);

    // Zero and one sample must leave the buffer untouched, without erroring.
    layer.draw_stroke(&[], &brush);
    layer.draw_stroke(&[StrokeSample::new(10.0, 10.0, 1.0)], &brush);
    layer.erase(&[StrokeSample::new(10.0, 10.0, 1.0)], 5.0);

    assert!(layer.buffer().pixels().all(|p| p.0[3] == 0));
}

#[test]
fn test_two_sample_stroke_has_base_width_at_full_pressure() {
    let mut layer = Layer::new("test", 300, 300);
    layer.draw_stroke(
        &horizontal_stroke(100.0, 100.0, 200.0, 1.0),
        &black_brush(5.0, 1.0),
    );

    // A solid band of roughly the base width along the segment, including the
    // round caps at both endpoints.
    for x in [100, 150, 200] {
        assert_eq!(*layer.buffer().get_pixel(x, 100), Rgba([0, 0, 0, 255]));
        assert_eq!(alpha_at(&layer, x, 98), 255);
        assert_eq!(alpha_at(&layer, x, 101), 255);
        assert_eq!(alpha_at(&layer, x, 95), 0);
        assert_eq!(alpha_at(&layer, x, 105), 0);
    }
    // Nothing beyond the caps.
    assert_eq!(alpha_at(&layer, 94, 100), 0);
    assert_eq!(alpha_at(&layer, 206, 100), 0);
}

#[test]
fn test_pressure_curve_boundary_sensitivities() {
    // sensitivity 2.0 flattens: 0.25^(1/2) = 0.5
    assert!((pressure_curve(0.25, 2.0) - 0.5).abs() < 1e-6);
    // sensitivity 0.2 exaggerates light touches: 0.25^5 is nearly zero
    assert!(pressure_curve(0.25, 0.2) < 0.001);
    // sensitivity 1.0 is linear
    assert!((pressure_curve(0.25, 1.0) - 0.25).abs() < 1e-6);
}

#[test]
fn test_sensitivity_widens_low_pressure_stroke() {
    // At sensitivity 2.0, pressure 0.25 maps to 0.5, so a base width of 10
    // yields an effective width of 5.
    let mut flattened = Layer::new("test", 300, 300);
    flattened.draw_stroke(
        &horizontal_stroke(100.5, 100.0, 200.0, 0.25),
        &black_brush(10.0, 2.0),
    );
    assert_eq!(alpha_at(&flattened, 150, 101), 255);
    assert_eq!(alpha_at(&flattened, 150, 98), 255);
    assert_eq!(alpha_at(&flattened, 150, 94), 0);
    assert_eq!(alpha_at(&flattened, 150, 106), 0);

    // At sensitivity 0.2 the same pressure collapses to the one-pixel floor.
    let mut exaggerated = Layer::new("test", 300, 300);
    exaggerated.draw_stroke(
        &horizontal_stroke(100.5, 100.0, 200.0, 0.25),
        &black_brush(10.0, 0.2),
    );
    assert_eq!(alpha_at(&exaggerated, 150, 100), 255);
    assert_eq!(alpha_at(&exaggerated, 150, 98), 0);
    assert_eq!(alpha_at(&exaggerated, 150, 103), 0);
}

#[test]
fn test_erase_zeroes_alpha_along_path() {
    let mut layer = Layer::new("test", 300, 300);
    layer.draw_stroke(
        &horizontal_stroke(100.0, 100.0, 200.0, 1.0),
        &black_brush(20.0, 1.0),
    );
    assert_eq!(alpha_at(&layer, 150, 100), 255);

    layer.erase(&horizontal_stroke(100.0, 120.0, 180.0, 1.0), 10.0);

    // Erased along the path, untouched outside it.
    assert_eq!(alpha_at(&layer, 150, 100), 0);
    assert_eq!(alpha_at(&layer, 105, 100), 255);
    assert_eq!(alpha_at(&layer, 195, 100), 255);
}

#[test]
fn test_clear_resets_to_transparent() {
    let mut layer = Layer::new("test", 64, 64);
    layer.draw_stroke(
        &horizontal_stroke(30.0, 10.0, 50.0, 1.0),
        &black_brush(8.0, 1.0),
    );
    layer.clear();
    assert!(layer.buffer().pixels().all(|p| *p == Rgba([0, 0, 0, 0])));
}

#[test]
fn test_resize_clips_permanently() {
    let mut layer = Layer::new("test", 32, 32);
    let brush = black_brush(3.0, 1.0);
    // One mark inside the smaller bound, one outside it.
    layer.draw_stroke(&horizontal_stroke(8.0, 6.0, 10.0, 1.0), &brush);
    layer.draw_stroke(&horizontal_stroke(24.0, 22.0, 26.0, 1.0), &brush);
    assert_eq!(alpha_at(&layer, 8, 8), 255);
    assert_eq!(alpha_at(&layer, 24, 24), 255);

    layer.resize(16, 16);
    assert_eq!(layer.width(), 16);
    assert_eq!(alpha_at(&layer, 8, 8), 255);

    // Growing back does not resurrect the clipped mark.
    layer.resize(32, 32);
    assert_eq!(alpha_at(&layer, 8, 8), 255);
    assert_eq!(alpha_at(&layer, 24, 24), 0);
}

#[test]
fn test_load_image_is_clipped_to_bounds() {
    let mut layer = Layer::new("test", 16, 16);
    let seed = RgbaImage::from_pixel(32, 32, Rgba([10, 20, 30, 255]));
    layer.load_image(&seed);

    assert_eq!(layer.width(), 16);
    assert_eq!(*layer.buffer().get_pixel(15, 15), Rgba([10, 20, 30, 255]));
}

#[test]
fn test_state_round_trip_is_lossless() {
    let mut layer = Layer::new("inks", 48, 48);
    layer.opacity = 0.7;
    layer.visible = false;
    layer.locked = true;
    layer.draw_stroke(
        &horizontal_stroke(20.0, 5.0, 40.0, 0.6),
        &BrushStyle {
            color: egui::Color32::from_rgb(200, 50, 25),
            base_width: 6.0,
            pressure_sensitivity: 1.3,
        },
    );

    let state = layer.to_state().unwrap();
    let restored = Layer::from_state(&state).unwrap();

    assert_eq!(restored.id, layer.id);
    assert_eq!(restored.name, "inks");
    assert!(!restored.visible);
    assert!(restored.locked);
    assert_eq!(restored.opacity, 0.7);
    assert_eq!(restored.buffer().as_raw(), layer.buffer().as_raw());
}

#[test]
fn test_corrupt_state_is_a_typed_error() {
    let layer = Layer::new("test", 8, 8);
    let mut state = layer.to_state().unwrap();

    state.data = "!!not base64!!".to_string();
    assert!(Layer::from_state(&state).is_err());

    // Valid base64, but not a PNG.
    state.data = "AAAA".to_string();
    assert!(Layer::from_state(&state).is_err());
}
