//! Command-list recording and replay: idempotence against direct calls,
//! local-handle relocation, nesting, culling, and lifecycle.

use std::sync::{Arc, Mutex};

use verve_canvas::testutil::{BackendLog, FixedFontSystem, RecordingBackend};
use verve_canvas::{
    cmd_list_flags, Color, Context, ContextConfig, DrawCommand, DrawCommandType, FillFlags,
};

fn new_context(config: ContextConfig) -> (Context, Arc<Mutex<BackendLog>>) {
    let backend = RecordingBackend::new();
    let log = backend.log();
    let ctx = Context::new(
        Box::new(backend),
        Box::new(FixedFontSystem::new()),
        config,
    )
    .expect("context creation");
    (ctx, log)
}

fn command_tuples(commands: &[DrawCommand]) -> Vec<(DrawCommandType, u16, u32, u32, [u16; 4])> {
    commands
        .iter()
        .map(|c| (c.kind, c.handle, c.num_vertices, c.num_indices, c.scissor))
        .collect()
}

#[test]
fn test_record_then_play_matches_direct_calls() {
    let (mut ctx, _log) = new_context(ContextConfig::default());

    let list = ctx.create_command_list(0);
    assert!(list.is_valid());
    ctx.cl_begin_path(list);
    ctx.cl_rect(list, 5.0, 5.0, 20.0, 20.0);
    ctx.cl_fill_path_color(list, Color::RED, FillFlags::default());
    ctx.cl_set_scissor(list, 0.0, 0.0, 40.0, 40.0);
    ctx.cl_begin_path(list);
    ctx.cl_circle(list, 30.0, 30.0, 10.0);
    ctx.cl_fill_path_color(list, Color::BLUE, FillFlags::convex_aa());

    // Frame 1: replay the list.
    ctx.begin(0, 100, 100, 1.0);
    ctx.submit_command_list(list);
    let replayed = command_tuples(ctx.draw_commands());
    ctx.end();
    ctx.frame();

    // Frame 2: the same primitives, called directly.
    ctx.begin(0, 100, 100, 1.0);
    ctx.begin_path();
    ctx.rect(5.0, 5.0, 20.0, 20.0);
    ctx.fill_path_color(Color::RED, FillFlags::default());
    ctx.set_scissor(0.0, 0.0, 40.0, 40.0);
    ctx.begin_path();
    ctx.circle(30.0, 30.0, 10.0);
    ctx.fill_path_color(Color::BLUE, FillFlags::convex_aa());
    let direct = command_tuples(ctx.draw_commands());
    ctx.end();

    assert_eq!(replayed, direct);
}

#[test]
fn test_local_gradient_relocation() {
    let (mut ctx, _log) = new_context(ContextConfig::default());

    let list = ctx.create_command_list(0);
    let gradient = ctx.cl_create_linear_gradient(
        list,
        0.0,
        0.0,
        50.0,
        0.0,
        Color::RED,
        Color::BLUE,
    );
    assert!(gradient.is_local());
    assert_eq!(gradient.idx, 0);
    ctx.cl_begin_path(list);
    ctx.cl_rect(list, 0.0, 0.0, 50.0, 50.0);
    ctx.cl_fill_path_gradient(list, gradient, FillFlags::default());

    ctx.begin(0, 100, 100, 1.0);
    ctx.submit_command_list(list);
    assert_eq!(ctx.num_gradients(), 1);
    ctx.submit_command_list(list);
    assert_eq!(ctx.num_gradients(), 2);

    // Each submission fills with the gradient it created: local index 0
    // maps to global 0 on the first replay and 1 on the second.
    let handles: Vec<u16> = ctx
        .draw_commands()
        .iter()
        .filter(|c| c.kind == DrawCommandType::ColorGradient)
        .map(|c| c.handle)
        .collect();
    assert_eq!(handles, vec![0, 1]);
    ctx.end();
}

#[test]
fn test_relocation_with_preexisting_gradients() {
    let (mut ctx, _log) = new_context(ContextConfig::default());

    let list = ctx.create_command_list(0);
    let g0 = ctx.cl_create_linear_gradient(list, 0.0, 0.0, 10.0, 0.0, Color::RED, Color::BLUE);
    let g1 = ctx.cl_create_radial_gradient(list, 5.0, 5.0, 1.0, 8.0, Color::WHITE, Color::BLACK);
    assert_eq!((g0.idx, g1.idx), (0, 1));
    ctx.cl_begin_path(list);
    ctx.cl_rect(list, 0.0, 0.0, 10.0, 10.0);
    ctx.cl_fill_path_gradient(list, g1, FillFlags::default());

    ctx.begin(0, 100, 100, 1.0);
    // Three gradients already issued directly this frame.
    for _ in 0..3 {
        ctx.create_linear_gradient(0.0, 0.0, 5.0, 0.0, Color::RED, Color::GREEN);
    }
    ctx.submit_command_list(list);

    // Local 0..2 relocated to global 3..5; the fill used local 1 -> 4.
    assert_eq!(ctx.num_gradients(), 5);
    assert_eq!(ctx.draw_commands()[0].handle, 4);
    ctx.end();
}

#[test]
fn test_nested_submission() {
    let (mut ctx, _log) = new_context(ContextConfig::default());

    let inner = ctx.create_command_list(0);
    ctx.cl_begin_path(inner);
    ctx.cl_rect(inner, 0.0, 0.0, 10.0, 10.0);
    ctx.cl_fill_path_color(inner, Color::RED, FillFlags::default());

    let outer = ctx.create_command_list(0);
    ctx.cl_begin_path(outer);
    ctx.cl_rect(outer, 20.0, 0.0, 10.0, 10.0);
    ctx.cl_fill_path_color(outer, Color::GREEN, FillFlags::default());
    ctx.cl_submit_command_list(outer, inner);

    ctx.begin(0, 100, 100, 1.0);
    ctx.submit_command_list(outer);
    // Outer rect and inner rect, same batch key, coalesced.
    assert_eq!(ctx.draw_commands().len(), 1);
    assert_eq!(ctx.draw_commands()[0].num_vertices, 8);
    ctx.end();
}

#[test]
fn test_recursion_depth_capped() {
    let config = ContextConfig {
        max_command_list_depth: 3,
        ..ContextConfig::default()
    };
    let (mut ctx, _log) = new_context(config);

    // A chain of five lists, each drawing a rect and submitting the
    // next. Depth 3 cuts the chain after three fills.
    let lists: Vec<_> = (0..5).map(|_| ctx.create_command_list(0)).collect();
    for (i, &list) in lists.iter().enumerate() {
        ctx.cl_begin_path(list);
        ctx.cl_rect(list, 0.0, 0.0, 10.0, 10.0);
        ctx.cl_fill_path_color(list, Color::RED, FillFlags::default());
        if i + 1 < lists.len() {
            ctx.cl_submit_command_list(list, lists[i + 1]);
        }
    }

    ctx.begin(0, 100, 100, 1.0);
    let before = ctx.stats().tessellations;
    ctx.submit_command_list(lists[0]);
    assert_eq!(ctx.stats().tessellations - before, 3);
    ctx.end();
}

#[test]
fn test_command_culling_skips_stroker_work() {
    let (mut ctx, _log) = new_context(ContextConfig::default());

    let list = ctx.create_command_list(cmd_list_flags::ALLOW_COMMAND_CULLING);
    ctx.cl_set_scissor(list, 0.0, 0.0, 0.0, 0.0);
    ctx.cl_begin_path(list);
    ctx.cl_rect(list, 0.0, 0.0, 10.0, 10.0);
    ctx.cl_fill_path_color(list, Color::RED, FillFlags::default());
    ctx.cl_reset_scissor(list);
    ctx.cl_begin_path(list);
    ctx.cl_rect(list, 20.0, 0.0, 10.0, 10.0);
    ctx.cl_fill_path_color(list, Color::GREEN, FillFlags::default());

    ctx.begin(0, 100, 100, 1.0);
    let before = ctx.stats().tessellations;
    ctx.submit_command_list(list);

    // The first fill was culled before tessellation; only the second
    // ran.
    assert_eq!(ctx.stats().tessellations - before, 1);
    assert_eq!(ctx.draw_commands().len(), 1);
    ctx.end();
}

#[test]
fn test_state_preserved_across_submission() {
    let (mut ctx, _log) = new_context(ContextConfig::default());

    let list = ctx.create_command_list(0);
    ctx.cl_transform_translate(list, 50.0, 50.0);
    ctx.cl_set_scissor(list, 0.0, 0.0, 10.0, 10.0);

    ctx.begin(0, 100, 100, 1.0);
    ctx.submit_command_list(list);
    // The submitted list's transform and scissor do not leak out.
    assert_eq!(ctx.get_transform(), verve_canvas::Affine2D::IDENTITY);
    assert_eq!(ctx.get_scissor(), [0.0, 0.0, 100.0, 100.0]);
    ctx.end();
}

#[test]
fn test_reset_command_list_clears_recording() {
    let (mut ctx, _log) = new_context(ContextConfig::default());

    let list = ctx.create_command_list(0);
    ctx.cl_begin_path(list);
    ctx.cl_rect(list, 0.0, 0.0, 10.0, 10.0);
    ctx.cl_fill_path_color(list, Color::RED, FillFlags::default());
    ctx.reset_command_list(list);

    ctx.begin(0, 100, 100, 1.0);
    ctx.submit_command_list(list);
    assert!(ctx.draw_commands().is_empty());
    ctx.end();
}

#[test]
fn test_destroy_and_reuse_handle() {
    let (mut ctx, _log) = new_context(ContextConfig::default());

    let a = ctx.create_command_list(0);
    ctx.destroy_command_list(a);
    assert!(!ctx.is_command_list_valid(a));

    // The freed slot is reused with a fresh recording.
    let b = ctx.create_command_list(0);
    assert_eq!(a.idx, b.idx);
    assert!(ctx.is_command_list_valid(b));
}

#[test]
fn test_command_list_capacity_exhaustion() {
    let config = ContextConfig {
        max_command_lists: 2,
        ..ContextConfig::default()
    };
    let (mut ctx, _log) = new_context(config);

    assert!(ctx.create_command_list(0).is_valid());
    assert!(ctx.create_command_list(0).is_valid());
    assert!(!ctx.create_command_list(0).is_valid());
}

#[test]
fn test_text_roundtrip_through_list() {
    let (mut ctx, _log) = new_context(ContextConfig::default());
    let font = ctx.create_font("test", vec![0u8; 4]);
    let cfg = verve_canvas::TextConfig::new(font, 10.0, Color::WHITE);

    let list = ctx.create_command_list(0);
    ctx.cl_text(list, &cfg, 10.0, 20.0, "abc");

    ctx.begin(0, 100, 100, 1.0);
    ctx.submit_command_list(list);
    // Three glyph quads.
    assert_eq!(ctx.draw_commands().len(), 1);
    assert_eq!(ctx.draw_commands()[0].num_vertices, 12);
    assert_eq!(ctx.draw_commands()[0].num_indices, 18);
    ctx.end();
}
