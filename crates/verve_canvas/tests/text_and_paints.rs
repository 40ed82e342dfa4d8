//! Text rendering, measurement, images, and paint handle issuance.

use std::sync::{Arc, Mutex};

use verve_canvas::testutil::{BackendLog, FixedFontSystem, RecordingBackend};
use verve_canvas::{
    image_flags, Color, Context, ContextConfig, DrawCommandType, FillFlags, TextAlignHor,
    TextConfig,
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

fn text_cfg(ctx: &mut Context, size: f32) -> TextConfig {
    let font = ctx.create_font("sans", Vec::new());
    TextConfig::new(font, size, Color::WHITE)
}

#[test]
fn test_text_emits_quads_against_atlas() {
    let (mut ctx, log) = new_context(ContextConfig::default());
    let cfg = text_cfg(&mut ctx, 10.0);

    ctx.begin(0, 200, 200, 1.0);
    ctx.text(&cfg, 10.0, 50.0, "abcd");

    let commands = ctx.draw_commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].kind, DrawCommandType::Textured);
    assert_eq!(commands[0].num_vertices, 16);
    assert_eq!(commands[0].num_indices, 24);
    assert_eq!(commands[0].handle, ctx.font_atlas_image().idx);
    ctx.end();

    // Drawing text dirtied the atlas, so the frame uploads it.
    assert_eq!(log.lock().unwrap().textures_updated, 1);
}

#[test]
fn test_text_and_fills_share_a_batch() {
    let (mut ctx, _log) = new_context(ContextConfig::default());
    let cfg = text_cfg(&mut ctx, 10.0);

    ctx.begin(0, 200, 200, 1.0);
    ctx.begin_path();
    ctx.rect(0.0, 0.0, 10.0, 10.0);
    ctx.fill_path_color(Color::RED, FillFlags::default());
    ctx.text(&cfg, 10.0, 50.0, "ab");

    // Solid fills sample the atlas white pixel, so fills and glyphs
    // batch together.
    assert_eq!(ctx.draw_commands().len(), 1);
    assert_eq!(ctx.draw_commands()[0].num_vertices, 4 + 8);
    ctx.end();
}

#[test]
fn test_text_box_wraps_lines() {
    let (mut ctx, _log) = new_context(ContextConfig::default());
    let cfg = text_cfg(&mut ctx, 10.0);

    // Advance is 5px per char; 25px fits five chars per row.
    ctx.begin(0, 200, 200, 1.0);
    ctx.text_box(&cfg, 0.0, 20.0, 25.0, "hello world");

    // 11 chars over 3 rows, all coalesced into one textured batch.
    assert_eq!(ctx.draw_commands().len(), 1);
    assert_eq!(ctx.draw_commands()[0].num_vertices, 44);
    ctx.end();
}

#[test]
fn test_measure_text() {
    let (mut ctx, _log) = new_context(ContextConfig::default());
    let cfg = text_cfg(&mut ctx, 10.0);

    let (width, bounds) = ctx.measure_text(&cfg, 10.0, 20.0, "abcd");
    assert_eq!(width, 20.0);
    assert_eq!(bounds[0], 10.0);
    assert!(bounds[1] < 20.0);

    let (empty_width, empty_bounds) = ctx.measure_text(&cfg, 0.0, 0.0, "");
    assert_eq!(empty_width, 0.0);
    assert_eq!(empty_bounds, [0.0; 4]);
}

#[test]
fn test_text_glyph_positions() {
    let (mut ctx, _log) = new_context(ContextConfig::default());
    let cfg = text_cfg(&mut ctx, 10.0);

    let positions = ctx.text_glyph_positions(&cfg, 100.0, 0.0, "abc", 16);
    assert_eq!(positions.len(), 3);
    assert_eq!(positions[0].byte_offset, 0);
    assert_eq!(positions[0].x, 100.0);
    assert_eq!(positions[1].byte_offset, 1);
    assert!(positions[1].x > positions[0].x);

    let capped = ctx.text_glyph_positions(&cfg, 0.0, 0.0, "abcdef", 2);
    assert_eq!(capped.len(), 2);
}

#[test]
fn test_text_break_lines() {
    let (mut ctx, _log) = new_context(ContextConfig::default());
    let cfg = text_cfg(&mut ctx, 10.0);

    let rows = ctx.text_break_lines(&cfg, "aaaaabbbbbcc", 25.0, 8);
    assert_eq!(rows.len(), 3);
    assert_eq!(&"aaaaabbbbbcc"[rows[0].start..rows[0].end], "aaaaa");
    assert_eq!(&"aaaaabbbbbcc"[rows[1].start..rows[1].end], "bbbbb");
    assert_eq!(&"aaaaabbbbbcc"[rows[2].start..rows[2].end], "cc");
}

#[test]
fn test_text_alignment_configuration() {
    let cfg = TextConfig::new(verve_canvas::FontHandle::new(0), 12.0, Color::WHITE)
        .with_alignment(TextAlignHor::Center, verve_canvas::TextAlignVer::Middle);
    let bits = cfg.alignment_bits();
    let (hor, ver) = TextConfig::alignment_from_bits(bits);
    assert_eq!(hor, TextAlignHor::Center);
    assert_eq!(ver, verve_canvas::TextAlignVer::Middle);
}

#[test]
fn test_image_lifecycle() {
    let (mut ctx, log) = new_context(ContextConfig::default());

    let image = ctx.create_image(8, 4, image_flags::FILTER_BILINEAR, Some(&[0u8; 8 * 4 * 4]));
    assert!(ctx.is_image_valid(image));
    assert_eq!(ctx.image_size(image), Some((8, 4)));

    assert!(ctx.update_image(image, 0, 0, 4, 2, &[0xffu8; 4 * 2 * 4]));
    assert_eq!(log.lock().unwrap().textures_updated, 1);

    assert!(ctx.destroy_image(image));
    assert!(!ctx.is_image_valid(image));
    assert!(!ctx.destroy_image(image));
    assert_eq!(log.lock().unwrap().textures_destroyed, 1);
}

#[test]
fn test_image_capacity_exhaustion() {
    // The font atlas occupies one slot.
    let config = ContextConfig {
        max_images: 2,
        ..ContextConfig::default()
    };
    let (mut ctx, _log) = new_context(config);

    let first = ctx.create_image(4, 4, 0, None);
    assert!(first.is_valid());
    let second = ctx.create_image(4, 4, 0, None);
    assert!(!second.is_valid());

    // Freeing a slot makes creation possible again.
    ctx.destroy_image(first);
    assert!(ctx.create_image(4, 4, 0, None).is_valid());
}

#[test]
fn test_gradient_capacity_resets_per_frame() {
    let config = ContextConfig {
        max_gradients: 2,
        ..ContextConfig::default()
    };
    let (mut ctx, _log) = new_context(config);

    ctx.begin(0, 100, 100, 1.0);
    assert!(ctx
        .create_linear_gradient(0.0, 0.0, 10.0, 0.0, Color::RED, Color::BLUE)
        .is_valid());
    assert!(ctx
        .create_radial_gradient(5.0, 5.0, 1.0, 4.0, Color::RED, Color::BLUE)
        .is_valid());
    assert!(!ctx
        .create_box_gradient(0.0, 0.0, 10.0, 10.0, 2.0, 4.0, Color::RED, Color::BLUE)
        .is_valid());
    ctx.end();
    ctx.frame();

    // Fresh frame, fresh counters.
    ctx.begin(0, 100, 100, 1.0);
    assert!(ctx
        .create_linear_gradient(0.0, 0.0, 10.0, 0.0, Color::RED, Color::BLUE)
        .is_valid());
    ctx.end();
}

#[test]
fn test_image_pattern_requires_valid_image() {
    let (mut ctx, _log) = new_context(ContextConfig::default());

    ctx.begin(0, 100, 100, 1.0);
    let invalid = ctx.create_image_pattern(
        0.0,
        0.0,
        4.0,
        4.0,
        0.0,
        verve_canvas::ImageHandle::INVALID,
    );
    assert!(!invalid.is_valid());

    let image = ctx.create_image(4, 4, 0, None);
    let pattern = ctx.create_image_pattern(0.0, 0.0, 4.0, 4.0, 0.0, image);
    assert!(pattern.is_valid());
    ctx.end();
}

#[test]
fn test_gradient_matrix_accounts_for_transform() {
    let (mut ctx, _log) = new_context(ContextConfig::default());

    ctx.begin(0, 100, 100, 1.0);
    ctx.transform_translate(10.0, 0.0);
    let gradient = ctx.create_linear_gradient(0.0, 0.0, 50.0, 0.0, Color::RED, Color::BLUE);
    let uniforms = ctx.gradient(gradient).unwrap();
    // The inverse pattern matrix undoes the translation: mapping the
    // gradient start (at canvas x=10) into gradient-local space lands
    // on the large-extent baseline.
    let m = uniforms.matrix;
    let local_y = m[1] * 10.0 + m[4] * 0.0 + m[7];
    assert!((local_y - 1e5).abs() < 1.0, "local_y = {local_y}");
    ctx.end();
}

#[test]
fn test_indexed_tri_list() {
    let (mut ctx, _log) = new_context(ContextConfig::default());

    ctx.begin(0, 100, 100, 1.0);
    ctx.indexed_tri_list(
        &[0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0],
        Some(&[0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]),
        &[Color::WHITE],
        &[0, 1, 2, 0, 2, 3],
        verve_canvas::ImageHandle::INVALID,
    );

    // An invalid image falls back to the font atlas.
    assert_eq!(ctx.draw_commands().len(), 1);
    assert_eq!(ctx.draw_commands()[0].handle, ctx.font_atlas_image().idx);
    assert_eq!(ctx.draw_commands()[0].num_vertices, 4);
    ctx.end();
}
