//! Draw-command batching behavior: coalescing, batch breaks, arena
//! rollover, and the command/arena invariants.

use std::sync::{Arc, Mutex};

use verve_canvas::testutil::{BackendLog, FixedFontSystem, RecordingBackend};
use verve_canvas::{
    Color, Context, ContextConfig, DrawCommandType, FillFlags, Program, StencilMode,
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

fn fill_rect(ctx: &mut Context, x: f32, y: f32, w: f32, h: f32, color: Color) {
    ctx.begin_path();
    ctx.rect(x, y, w, h);
    ctx.fill_path_color(color, FillFlags::default());
}

#[test]
fn test_single_red_rectangle() {
    let (mut ctx, log) = new_context(ContextConfig::default());

    ctx.begin(0, 100, 100, 1.0);
    fill_rect(&mut ctx, 10.0, 10.0, 20.0, 20.0, Color::from_rgba8(0xff, 0x00, 0x00, 0xff));

    let commands = ctx.draw_commands();
    assert_eq!(commands.len(), 1);
    let cmd = &commands[0];
    assert_eq!(cmd.kind, DrawCommandType::Textured);
    assert_eq!(cmd.num_vertices, 4);
    assert_eq!(cmd.num_indices, 6);
    assert_eq!(cmd.scissor, [0, 0, 100, 100]);

    ctx.end();

    let log = log.lock().unwrap();
    assert_eq!(log.submissions.len(), 1);
    let sub = &log.submissions[0];
    assert_eq!(sub.program, Program::Textured);
    assert_eq!(sub.num_vertices, 4);
    assert_eq!(sub.num_indices, 6);
    assert_eq!(sub.scissor, [0, 0, 100, 100]);
    assert_eq!(sub.stencil, StencilMode::None);

    // The fan over the rect, arena-relative.
    assert_eq!(log.index_uploads[0].1, vec![0, 1, 2, 0, 2, 3]);
    // Uniform color stream.
    let (_, colors) = &log.vertex_colors[0];
    assert!(colors.iter().all(|&c| c == 0xff0000ff));
}

#[test]
fn test_two_rects_same_color_coalesce() {
    let (mut ctx, log) = new_context(ContextConfig::default());

    ctx.begin(0, 100, 100, 1.0);
    fill_rect(&mut ctx, 0.0, 0.0, 10.0, 10.0, Color::RED);
    fill_rect(&mut ctx, 20.0, 20.0, 10.0, 10.0, Color::RED);

    let commands = ctx.draw_commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].num_vertices, 8);
    assert_eq!(commands[0].num_indices, 12);

    ctx.end();
    assert_eq!(log.lock().unwrap().submissions.len(), 1);
}

#[test]
fn test_different_colors_still_coalesce() {
    // Color lives in the vertex stream, so it does not break batching.
    let (mut ctx, _log) = new_context(ContextConfig::default());

    ctx.begin(0, 100, 100, 1.0);
    fill_rect(&mut ctx, 0.0, 0.0, 10.0, 10.0, Color::RED);
    fill_rect(&mut ctx, 20.0, 20.0, 10.0, 10.0, Color::BLUE);
    assert_eq!(ctx.draw_commands().len(), 1);
    ctx.end();
}

#[test]
fn test_scissor_change_breaks_batch() {
    let (mut ctx, log) = new_context(ContextConfig::default());

    ctx.begin(0, 100, 100, 1.0);
    fill_rect(&mut ctx, 0.0, 0.0, 10.0, 10.0, Color::RED);
    ctx.set_scissor(0.0, 0.0, 50.0, 50.0);
    fill_rect(&mut ctx, 0.0, 0.0, 10.0, 10.0, Color::RED);

    let commands = ctx.draw_commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].scissor, [0, 0, 100, 100]);
    assert_eq!(commands[1].scissor, [0, 0, 50, 50]);

    ctx.end();
    let log = log.lock().unwrap();
    assert_eq!(log.submissions.len(), 2);
    assert_eq!(log.submissions[0].scissor, [0, 0, 100, 100]);
    assert_eq!(log.submissions[1].scissor, [0, 0, 50, 50]);
}

#[test]
fn test_pop_state_scissor_change_breaks_batch() {
    let (mut ctx, _log) = new_context(ContextConfig::default());

    ctx.begin(0, 100, 100, 1.0);
    ctx.push_state();
    ctx.set_scissor(0.0, 0.0, 40.0, 40.0);
    fill_rect(&mut ctx, 0.0, 0.0, 10.0, 10.0, Color::RED);
    ctx.pop_state();
    fill_rect(&mut ctx, 0.0, 0.0, 10.0, 10.0, Color::RED);

    let commands = ctx.draw_commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].scissor, [0, 0, 40, 40]);
    assert_eq!(commands[1].scissor, [0, 0, 100, 100]);
    ctx.end();
}

#[test]
fn test_zero_scissor_culls_emission_but_updates_state() {
    let (mut ctx, _log) = new_context(ContextConfig::default());

    ctx.begin(0, 100, 100, 1.0);
    ctx.set_scissor(0.0, 0.0, 0.0, 0.0);
    fill_rect(&mut ctx, 0.0, 0.0, 10.0, 10.0, Color::RED);
    assert!(ctx.draw_commands().is_empty());
    assert_eq!(ctx.get_scissor(), [0.0, 0.0, 0.0, 0.0]);

    ctx.reset_scissor();
    fill_rect(&mut ctx, 0.0, 0.0, 10.0, 10.0, Color::RED);
    assert_eq!(ctx.draw_commands().len(), 1);
    ctx.end();
}

#[test]
fn test_arena_overflow_opens_new_arena_and_command() {
    let config = ContextConfig {
        max_vb_vertices: 16,
        ..ContextConfig::default()
    };
    let (mut ctx, log) = new_context(config);

    ctx.begin(0, 100, 100, 1.0);
    // Four quads fill the 16-vertex arena exactly; the fifth rolls over.
    for i in 0..5 {
        fill_rect(&mut ctx, i as f32 * 10.0, 0.0, 5.0, 5.0, Color::RED);
    }

    let commands = ctx.draw_commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].arena_id, 0);
    assert_eq!(commands[0].num_vertices, 16);
    assert_eq!(commands[1].arena_id, 1);
    assert_eq!(commands[1].num_vertices, 4);
    assert_eq!(commands[1].first_vertex, 0);

    ctx.end();
    let log = log.lock().unwrap();
    // Both arenas upload.
    assert_eq!(log.vertex_uploads.len(), 2);
    assert_eq!(log.vertex_uploads[0].1, 16);
    assert_eq!(log.vertex_uploads[1].1, 4);
}

#[test]
fn test_command_invariants_hold() {
    let (mut ctx, log) = new_context(ContextConfig::default());

    ctx.begin(0, 200, 200, 1.0);
    fill_rect(&mut ctx, 0.0, 0.0, 10.0, 10.0, Color::RED);
    ctx.set_scissor(0.0, 0.0, 80.0, 80.0);
    ctx.begin_path();
    ctx.circle(50.0, 50.0, 20.0);
    ctx.fill_path_color(Color::GREEN, FillFlags::convex_aa());
    ctx.begin_path();
    ctx.move_to(0.0, 0.0);
    ctx.line_to(100.0, 100.0);
    ctx.stroke_path_color(Color::BLUE, 3.0, verve_canvas::StrokeFlags::default_aa());

    let commands: Vec<_> = ctx.draw_commands().to_vec();
    ctx.end();

    let log = log.lock().unwrap();
    let indices = &log.index_uploads[0].1;
    let arena_counts: Vec<u32> = log.vertex_uploads.iter().map(|(_, n)| *n).collect();

    for window in commands.windows(2) {
        let (a, b) = (&window[0], &window[1]);
        // Adjacent commands differ somewhere, else they would have
        // merged.
        assert!(
            a.arena_id != b.arena_id
                || a.kind != b.kind
                || a.handle != b.handle
                || a.scissor != b.scissor
                || a.clip != b.clip
        );
    }

    for cmd in &commands {
        // Vertex ranges stay inside their arena.
        assert!(cmd.first_vertex + cmd.num_vertices <= arena_counts[cmd.arena_id as usize]);
        // Indices are relative to the command's vertex range.
        let range =
            &indices[cmd.first_index as usize..(cmd.first_index + cmd.num_indices) as usize];
        assert!(range.iter().all(|&i| (i as u32) < cmd.num_vertices));
    }
}

#[test]
fn test_empty_frame_releases_buffers() {
    let (mut ctx, log) = new_context(ContextConfig::default());

    ctx.begin(0, 100, 100, 1.0);
    ctx.end();
    ctx.frame();

    let log = log.lock().unwrap();
    assert!(log.submissions.is_empty());
    assert!(log.vertex_uploads.is_empty());
}

#[test]
fn test_device_pixel_ratio_scales_scissor() {
    let (mut ctx, log) = new_context(ContextConfig::default());

    ctx.begin(0, 100, 100, 2.0);
    ctx.set_scissor(0.0, 0.0, 50.0, 40.0);
    fill_rect(&mut ctx, 0.0, 0.0, 10.0, 10.0, Color::RED);
    ctx.end();

    let log = log.lock().unwrap();
    assert_eq!(log.submissions[0].scissor, [0, 0, 100, 80]);
}
