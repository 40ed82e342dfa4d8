//! Stencil clip protocol: clip-command recording, clip-state snapshots,
//! and the render-time stencil transitions.

use std::sync::{Arc, Mutex};

use verve_canvas::testutil::{BackendLog, FixedFontSystem, RecordingBackend};
use verve_canvas::{
    ClipRule, Color, Context, ContextConfig, DrawCommandType, FillFlags, Program, StencilMode,
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

fn fill_rect(ctx: &mut Context, x: f32, y: f32, w: f32, h: f32, color: Color) {
    ctx.begin_path();
    ctx.rect(x, y, w, h);
    ctx.fill_path_color(color, FillFlags::default());
}

#[test]
fn test_nested_clip_scenario() {
    let (mut ctx, log) = new_context();

    ctx.begin(0, 100, 100, 1.0);
    ctx.begin_clip(ClipRule::In);
    fill_rect(&mut ctx, 0.0, 0.0, 50.0, 50.0, Color::BLACK);
    ctx.end_clip();
    fill_rect(&mut ctx, 10.0, 10.0, 30.0, 30.0, Color::RED);
    ctx.reset_clip();

    assert_eq!(ctx.clip_commands().len(), 1);
    assert_eq!(ctx.clip_commands()[0].kind, DrawCommandType::Clip);
    assert_eq!(ctx.draw_commands().len(), 1);
    let draw = &ctx.draw_commands()[0];
    assert_eq!(draw.clip.first_cmd, 0);
    assert_eq!(draw.clip.num_cmds, 1);
    assert_eq!(draw.clip.rule, ClipRule::In);

    ctx.end();

    let log = log.lock().unwrap();
    assert_eq!(log.submissions.len(), 2);

    // First the clip shape stamps the stencil plane with color writes
    // off...
    let clip_sub = &log.submissions[0];
    assert_eq!(clip_sub.program, Program::Stencil);
    assert_eq!(clip_sub.stencil, StencilMode::Write { reference: 1 });

    // ...then the draw runs under EQUAL against the fresh reference.
    let draw_sub = &log.submissions[1];
    assert_eq!(draw_sub.program, Program::Textured);
    assert_eq!(
        draw_sub.stencil,
        StencilMode::Test {
            reference: 1,
            rule: ClipRule::In
        }
    );
}

#[test]
fn test_stencil_reference_increments_per_region() {
    let (mut ctx, log) = new_context();

    ctx.begin(0, 100, 100, 1.0);

    ctx.begin_clip(ClipRule::In);
    fill_rect(&mut ctx, 0.0, 0.0, 50.0, 50.0, Color::BLACK);
    ctx.end_clip();
    fill_rect(&mut ctx, 0.0, 0.0, 10.0, 10.0, Color::RED);

    ctx.begin_clip(ClipRule::NotIn);
    fill_rect(&mut ctx, 20.0, 20.0, 50.0, 50.0, Color::BLACK);
    ctx.end_clip();
    fill_rect(&mut ctx, 0.0, 0.0, 10.0, 10.0, Color::GREEN);

    ctx.end();

    let log = log.lock().unwrap();
    let stencils: Vec<StencilMode> = log.submissions.iter().map(|s| s.stencil).collect();
    assert_eq!(
        stencils,
        vec![
            StencilMode::Write { reference: 1 },
            StencilMode::Test {
                reference: 1,
                rule: ClipRule::In
            },
            StencilMode::Write { reference: 2 },
            StencilMode::Test {
                reference: 2,
                rule: ClipRule::NotIn
            },
        ]
    );
}

#[test]
fn test_reset_clip_returns_to_no_stencil() {
    let (mut ctx, log) = new_context();

    ctx.begin(0, 100, 100, 1.0);
    ctx.begin_clip(ClipRule::In);
    fill_rect(&mut ctx, 0.0, 0.0, 50.0, 50.0, Color::BLACK);
    ctx.end_clip();
    fill_rect(&mut ctx, 0.0, 0.0, 10.0, 10.0, Color::RED);
    ctx.reset_clip();
    fill_rect(&mut ctx, 0.0, 0.0, 10.0, 10.0, Color::GREEN);
    ctx.end();

    let log = log.lock().unwrap();
    assert_eq!(log.submissions.len(), 3);
    assert_eq!(log.submissions[2].stencil, StencilMode::None);
}

#[test]
fn test_clip_state_is_monotonic_across_draws() {
    let (mut ctx, _log) = new_context();

    ctx.begin(0, 100, 100, 1.0);
    fill_rect(&mut ctx, 0.0, 0.0, 5.0, 5.0, Color::RED);
    ctx.begin_clip(ClipRule::In);
    fill_rect(&mut ctx, 0.0, 0.0, 50.0, 50.0, Color::BLACK);
    ctx.end_clip();
    fill_rect(&mut ctx, 0.0, 0.0, 5.0, 5.0, Color::RED);
    ctx.begin_clip(ClipRule::In);
    fill_rect(&mut ctx, 10.0, 10.0, 50.0, 50.0, Color::BLACK);
    ctx.end_clip();
    fill_rect(&mut ctx, 0.0, 0.0, 5.0, 5.0, Color::RED);

    let firsts: Vec<u32> = ctx
        .draw_commands()
        .iter()
        .filter(|c| c.clip.is_active())
        .map(|c| c.clip.first_cmd)
        .collect();
    let mut sorted = firsts.clone();
    sorted.sort_unstable();
    assert_eq!(firsts, sorted);
    ctx.end();
}

#[test]
fn test_clip_shapes_do_not_enter_draw_stream() {
    let (mut ctx, _log) = new_context();

    ctx.begin(0, 100, 100, 1.0);
    ctx.begin_clip(ClipRule::In);
    fill_rect(&mut ctx, 0.0, 0.0, 50.0, 50.0, Color::RED);
    fill_rect(&mut ctx, 10.0, 10.0, 50.0, 50.0, Color::GREEN);
    ctx.end_clip();

    // Both shapes coalesced into the clip stream; the draw stream is
    // untouched.
    assert_eq!(ctx.clip_commands().len(), 1);
    assert_eq!(ctx.clip_commands()[0].num_vertices, 8);
    assert!(ctx.draw_commands().is_empty());
    ctx.reset_clip();
    ctx.end();
}

#[test]
fn test_clip_uses_stroke_shapes_too() {
    let (mut ctx, _log) = new_context();

    ctx.begin(0, 100, 100, 1.0);
    ctx.begin_clip(ClipRule::In);
    ctx.begin_path();
    ctx.move_to(0.0, 0.0);
    ctx.line_to(80.0, 80.0);
    ctx.stroke_path_color(Color::WHITE, 4.0, verve_canvas::StrokeFlags::default_aa());
    ctx.end_clip();
    fill_rect(&mut ctx, 0.0, 0.0, 10.0, 10.0, Color::RED);
    ctx.reset_clip();

    assert_eq!(ctx.clip_commands().len(), 1);
    assert!(ctx.clip_commands()[0].num_vertices >= 4);
    ctx.end();
}
