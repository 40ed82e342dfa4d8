//! Stroke alpha compensation and boundary behaviors.

use std::sync::{Arc, Mutex};

use verve_canvas::testutil::{BackendLog, FixedFontSystem, RecordingBackend};
use verve_canvas::{
    image_flags, Color, Context, ContextConfig, FillFlags, StrokeFlags,
};

fn new_context() -> (Context, Arc<Mutex<BackendLog>>) {
    let backend = RecordingBackend::new();
    let log = backend.log();
    let ctx = Context::new(
        Box::new(backend),
        Box::new(FixedFontSystem::new()),
        ContextConfig::default(),
    )
    .expect("context creation");
    (ctx, log)
}

fn uploaded_alpha(log: &Arc<Mutex<BackendLog>>) -> u8 {
    let log = log.lock().unwrap();
    let (_, colors) = &log.vertex_colors[0];
    let first = Color::from_packed(colors[0]);
    assert!(
        colors
            .iter()
            .all(|&c| Color::from_packed(c).alpha() == first.alpha()),
        "expected uniform alpha"
    );
    first.alpha()
}

#[test]
fn test_thin_stroke_alpha_scales_quadratically() {
    let (mut ctx, log) = new_context();

    // Fringe width is 1px at dpr 1; a 0.5px stroke renders at fringe
    // width with alpha scaled by 0.5^2.
    ctx.begin(0, 100, 100, 1.0);
    ctx.begin_path();
    ctx.move_to(0.0, 0.0);
    ctx.line_to(50.0, 0.0);
    ctx.stroke_path_color(Color::RED, 0.5, StrokeFlags::default());
    ctx.end();

    assert_eq!(uploaded_alpha(&log), 63);
}

#[test]
fn test_wide_stroke_keeps_full_alpha() {
    let (mut ctx, log) = new_context();

    ctx.begin(0, 100, 100, 1.0);
    ctx.begin_path();
    ctx.move_to(0.0, 0.0);
    ctx.line_to(50.0, 0.0);
    ctx.stroke_path_color(Color::RED, 4.0, StrokeFlags::default());
    ctx.end();

    assert_eq!(uploaded_alpha(&log), 255);
}

#[test]
fn test_thin_image_pattern_stroke_skips_quadratic_factor() {
    // The image-pattern variant historically applies the quadratic
    // factor on the not-thin branch, so a thin pattern stroke keeps
    // full alpha where the color variant attenuates.
    let (mut ctx, log) = new_context();

    ctx.begin(0, 100, 100, 1.0);
    let image = ctx.create_image(4, 4, image_flags::FILTER_BILINEAR, None);
    let pattern = ctx.create_image_pattern(0.0, 0.0, 4.0, 4.0, 0.0, image);
    ctx.begin_path();
    ctx.move_to(0.0, 0.0);
    ctx.line_to(50.0, 0.0);
    ctx.stroke_path_image_pattern(pattern, Color::RED, 0.5, StrokeFlags::default());
    ctx.end();

    assert_eq!(uploaded_alpha(&log), 255);
}

#[test]
fn test_transform_scale_affects_stroke_thinness() {
    let (mut ctx, log) = new_context();

    // A 0.25px stroke under 4x scale is a 1px stroke: not attenuated
    // below the fringe.
    ctx.begin(0, 100, 100, 1.0);
    ctx.transform_scale(4.0, 4.0);
    ctx.begin_path();
    ctx.move_to(0.0, 0.0);
    ctx.line_to(10.0, 0.0);
    ctx.stroke_path_color(Color::RED, 0.25, StrokeFlags::default());
    ctx.end();

    assert_eq!(uploaded_alpha(&log), 255);
}

#[test]
fn test_fixed_width_ignores_transform_scale() {
    let (mut ctx, log) = new_context();

    // Fixed width 0.5 stays thin even under 4x scale.
    ctx.begin(0, 100, 100, 1.0);
    ctx.transform_scale(4.0, 4.0);
    ctx.begin_path();
    ctx.move_to(0.0, 0.0);
    ctx.line_to(10.0, 0.0);
    ctx.stroke_path_color(Color::RED, 0.5, StrokeFlags::default().with_fixed_width());
    ctx.end();

    assert_eq!(uploaded_alpha(&log), 63);
}

#[test]
fn test_stroke_single_vertex_emits_nothing() {
    let (mut ctx, _log) = new_context();

    ctx.begin(0, 100, 100, 1.0);
    let before = ctx.stats().tessellations;
    ctx.begin_path();
    ctx.move_to(10.0, 10.0);
    ctx.stroke_path_color(Color::RED, 2.0, StrokeFlags::default());
    assert!(ctx.draw_commands().is_empty());
    assert_eq!(ctx.stats().tessellations, before);
    ctx.end();
}

#[test]
fn test_fill_two_vertices_emits_nothing() {
    let (mut ctx, _log) = new_context();

    ctx.begin(0, 100, 100, 1.0);
    ctx.begin_path();
    ctx.move_to(10.0, 10.0);
    ctx.line_to(20.0, 20.0);
    ctx.fill_path_color(Color::RED, FillFlags::default());
    assert!(ctx.draw_commands().is_empty());
    ctx.end();
}

#[test]
fn test_transparent_color_emits_nothing() {
    let (mut ctx, _log) = new_context();

    ctx.begin(0, 100, 100, 1.0);
    ctx.begin_path();
    ctx.rect(0.0, 0.0, 10.0, 10.0);
    ctx.fill_path_color(Color::RED.with_alpha(0), FillFlags::default());
    ctx.set_global_alpha(0.0);
    ctx.begin_path();
    ctx.rect(0.0, 0.0, 10.0, 10.0);
    ctx.fill_path_color(Color::RED, FillFlags::default());
    assert!(ctx.draw_commands().is_empty());
    ctx.end();
}

#[test]
fn test_global_alpha_multiplies_fill_color() {
    let (mut ctx, log) = new_context();

    ctx.begin(0, 100, 100, 1.0);
    ctx.set_global_alpha(0.5);
    ctx.begin_path();
    ctx.rect(0.0, 0.0, 10.0, 10.0);
    ctx.fill_path_color(Color::RED, FillFlags::default());
    ctx.end();

    assert_eq!(uploaded_alpha(&log), 127);
}

#[test]
fn test_aa_fill_carries_fringe_colors() {
    let (mut ctx, log) = new_context();

    ctx.begin(0, 100, 100, 1.0);
    ctx.begin_path();
    ctx.rect(0.0, 0.0, 20.0, 20.0);
    ctx.fill_path_color(Color::RED, FillFlags::convex_aa());
    ctx.end();

    let log = log.lock().unwrap();
    let (_, colors) = &log.vertex_colors[0];
    // Inner ring opaque, outer fringe transparent.
    assert_eq!(colors.len(), 8);
    assert_eq!(Color::from_packed(colors[0]).alpha(), 255);
    assert_eq!(Color::from_packed(colors[7]).alpha(), 0);
}
