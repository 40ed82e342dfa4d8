//! Shape-cache behavior: replay without tessellation, scale
//! invalidation, and inverse-transform-aware mesh replay.

use std::sync::{Arc, Mutex};

use verve_canvas::testutil::{BackendLog, FixedFontSystem, RecordingBackend};
use verve_canvas::{
    cmd_list_flags, Color, Context, ContextConfig, DrawCommand, DrawCommandType, FillFlags,
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

fn record_circles(ctx: &mut Context, count: usize) -> verve_canvas::CommandListHandle {
    let list = ctx.create_command_list(cmd_list_flags::CACHEABLE);
    for i in 0..count {
        ctx.cl_begin_path(list);
        ctx.cl_circle(list, 20.0 + i as f32 * 10.0, 20.0, 8.0);
        ctx.cl_fill_path_color(list, Color::RED, FillFlags::default());
    }
    list
}

fn command_tuples(commands: &[DrawCommand]) -> Vec<(DrawCommandType, u16, u32, u32, [u16; 4])> {
    commands
        .iter()
        .map(|c| (c.kind, c.handle, c.num_vertices, c.num_indices, c.scissor))
        .collect()
}

#[test]
fn test_cached_replay_skips_tessellation() {
    let (mut ctx, _log) = new_context();
    let list = record_circles(&mut ctx, 10);

    // Frame 1 builds the cache.
    ctx.begin(0, 200, 200, 1.0);
    let before_first = ctx.stats().tessellations;
    ctx.submit_command_list(list);
    assert_eq!(ctx.stats().tessellations - before_first, 10);
    let first_tuples = command_tuples(ctx.draw_commands());
    ctx.end();
    ctx.frame();

    // Frame 2 replays it: no path or stroker work, identical output.
    ctx.begin(0, 200, 200, 1.0);
    let before_second = ctx.stats().tessellations;
    ctx.submit_command_list(list);
    assert_eq!(ctx.stats().tessellations, before_second);
    assert_eq!(command_tuples(ctx.draw_commands()), first_tuples);
    ctx.end();
}

#[test]
fn test_scale_change_invalidates_cache() {
    let (mut ctx, _log) = new_context();
    let list = record_circles(&mut ctx, 4);

    ctx.begin(0, 200, 200, 1.0);
    ctx.submit_command_list(list);
    let after_build = ctx.stats().tessellations;

    // Same scale: cached.
    ctx.submit_command_list(list);
    assert_eq!(ctx.stats().tessellations, after_build);

    // Scaling changes the average scale: the cache resets and rebuilds.
    ctx.transform_scale(2.0, 2.0);
    ctx.submit_command_list(list);
    assert_eq!(ctx.stats().tessellations, after_build + 4);

    // And the rebuilt cache replays at the new scale.
    ctx.submit_command_list(list);
    assert_eq!(ctx.stats().tessellations, after_build + 4);

    ctx.end();
}

#[test]
fn test_translation_does_not_invalidate_cache() {
    let (mut ctx, log) = new_context();

    let list = ctx.create_command_list(cmd_list_flags::CACHEABLE);
    ctx.cl_begin_path(list);
    ctx.cl_rect(list, 0.0, 0.0, 10.0, 10.0);
    ctx.cl_fill_path_color(list, Color::GREEN, FillFlags::default());

    // Build the cache at translate(5, 5).
    ctx.begin(0, 200, 200, 1.0);
    ctx.transform_translate(5.0, 5.0);
    ctx.submit_command_list(list);
    ctx.end();
    ctx.frame();
    log.lock().unwrap().clear();

    // Replay at translate(20, 20): the average scale is unchanged, so
    // the cached object-space mesh replays forward-transformed.
    ctx.begin(0, 200, 200, 1.0);
    let before = ctx.stats().tessellations;
    ctx.transform_translate(20.0, 20.0);
    ctx.submit_command_list(list);
    assert_eq!(ctx.stats().tessellations, before);
    ctx.end();

    let log = log.lock().unwrap();
    let (_, positions) = &log.vertex_positions[0];
    let xs: Vec<f32> = positions.chunks_exact(2).map(|p| p[0]).collect();
    let ys: Vec<f32> = positions.chunks_exact(2).map(|p| p[1]).collect();
    let min_x = xs.iter().cloned().fold(f32::MAX, f32::min);
    let max_x = xs.iter().cloned().fold(f32::MIN, f32::max);
    let min_y = ys.iter().cloned().fold(f32::MAX, f32::min);
    let max_y = ys.iter().cloned().fold(f32::MIN, f32::max);
    assert!((min_x - 20.0).abs() < 1e-3, "min_x = {min_x}");
    assert!((max_x - 30.0).abs() < 1e-3, "max_x = {max_x}");
    assert!((min_y - 20.0).abs() < 1e-3, "min_y = {min_y}");
    assert!((max_y - 30.0).abs() < 1e-3, "max_y = {max_y}");
}

#[test]
fn test_non_cacheable_list_always_tessellates() {
    let (mut ctx, _log) = new_context();

    let list = ctx.create_command_list(0);
    ctx.cl_begin_path(list);
    ctx.cl_circle(list, 20.0, 20.0, 8.0);
    ctx.cl_fill_path_color(list, Color::RED, FillFlags::default());

    ctx.begin(0, 200, 200, 1.0);
    let before = ctx.stats().tessellations;
    ctx.submit_command_list(list);
    ctx.submit_command_list(list);
    assert_eq!(ctx.stats().tessellations - before, 2);
    ctx.end();
}

#[test]
fn test_reset_command_list_drops_cache() {
    let (mut ctx, _log) = new_context();
    let list = record_circles(&mut ctx, 2);

    ctx.begin(0, 200, 200, 1.0);
    ctx.submit_command_list(list);
    let after_build = ctx.stats().tessellations;

    // Reset wipes both the recording and the cache.
    ctx.reset_command_list(list);
    ctx.submit_command_list(list);
    assert_eq!(ctx.stats().tessellations, after_build);
    assert_eq!(ctx.draw_commands().len(), 1);
    ctx.end();
}

#[test]
fn test_cached_replay_respects_new_gradient_ids() {
    let (mut ctx, _log) = new_context();

    let list = ctx.create_command_list(cmd_list_flags::CACHEABLE);
    let gradient = ctx.cl_create_linear_gradient(
        list,
        0.0,
        0.0,
        30.0,
        0.0,
        Color::RED,
        Color::BLUE,
    );
    ctx.cl_begin_path(list);
    ctx.cl_rect(list, 0.0, 0.0, 30.0, 30.0);
    ctx.cl_fill_path_gradient(list, gradient, FillFlags::default());

    ctx.begin(0, 200, 200, 1.0);
    ctx.submit_command_list(list);
    ctx.submit_command_list(list);

    // Both the recording pass and the cached replay create their own
    // gradient and draw with it.
    assert_eq!(ctx.num_gradients(), 2);
    let handles: Vec<u16> = ctx
        .draw_commands()
        .iter()
        .map(|c| c.handle)
        .collect();
    assert_eq!(handles, vec![0, 1]);
    ctx.end();
}
