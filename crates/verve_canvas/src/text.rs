//! Text rendering and measurement
//!
//! The context quantizes the font size by the state's font scale times
//! the device pixel ratio, asks the font system for glyph quads in
//! pixel units, and batches them as textured geometry against the font
//! atlas. The transform applied to the quads has its scale divided out
//! (the quads are already scaled); only the translation survives.

use verve_core::{
    math, Affine2D, Color, FontHandle, TextAlignHor, TextConfig, TextQuad,
};
use verve_path::Mesh;

use crate::batch::UvSource;
use crate::context::Context;

/// Per-glyph position info returned by
/// [`Context::text_glyph_positions`]
#[derive(Clone, Copy, Debug)]
pub struct GlyphPosition {
    /// Byte offset of the glyph's codepoint in the measured string
    pub byte_offset: usize,
    /// Pen x position before the glyph
    pub x: f32,
    /// Left edge of the glyph's quad
    pub min_x: f32,
    /// Right edge of the glyph's quad
    pub max_x: f32,
}

impl Context {
    // ── Font management ──────────────────────────────────────────────

    /// Register a font from raw TTF/OTF bytes.
    pub fn create_font(&mut self, name: &str, data: Vec<u8>) -> FontHandle {
        self.font_system.add_font(name, data)
    }

    pub fn font_by_name(&self, name: &str) -> FontHandle {
        self.font_system.find_font(name)
    }

    pub fn set_fallback_font(&mut self, base: FontHandle, fallback: FontHandle) -> bool {
        debug_assert!(base.is_valid() && fallback.is_valid(), "invalid font handle");
        self.font_system.add_fallback_font(base, fallback)
    }

    // ── Drawing ──────────────────────────────────────────────────────

    /// Draw a single line of text at `(x, y)`.
    pub fn text(&mut self, cfg: &TextConfig, x: f32, y: f32, text: &str) {
        let state = self.state();
        let scale = state.font_scale * self.device_pixel_ratio;

        let color = cfg.color.scale_alpha(state.global_alpha);
        if color.is_transparent() {
            return;
        }

        let scaled_cfg = TextConfig {
            size: cfg.size * scale,
            color,
            blur: cfg.blur * scale,
            spacing: cfg.spacing * scale,
            ..*cfg
        };

        let Some(mesh) = self.font_system.text(&scaled_cfg, text, true) else {
            return;
        };
        if mesh.quads.is_empty() {
            return;
        }

        self.push_state();
        self.transform_translate(x + mesh.alignment[0] / scale, y + mesh.alignment[1] / scale);
        self.render_text_quads(&mesh.quads, color);
        self.pop_state();
    }

    /// Draw text wrapped to `break_width`, honoring the config's
    /// horizontal alignment per line.
    pub fn text_box(
        &mut self,
        cfg: &TextConfig,
        x: f32,
        y: f32,
        break_width: f32,
        text: &str,
    ) {
        let line_height = self.font_system.line_height(cfg);
        let halign = cfg.align_hor;
        let row_cfg = TextConfig {
            align_hor: TextAlignHor::Left,
            ..*cfg
        };

        let mut pen_y = y;
        let mut start = 0usize;
        loop {
            let rows = self
                .font_system
                .break_lines(cfg, &text[start..], break_width, 4);
            if rows.is_empty() {
                break;
            }

            for row in &rows {
                let dx = match halign {
                    TextAlignHor::Left => 0.0,
                    TextAlignHor::Center => (break_width - row.width) * 0.5,
                    TextAlignHor::Right => break_width - row.width,
                };
                let line = &text[start + row.start..start + row.end];
                self.text(&row_cfg, x + dx, pen_y, line);
                pen_y += line_height;
            }

            let advance = rows.last().map(|r| r.next).unwrap_or(0);
            if advance == 0 {
                break;
            }
            start += advance;
            if start >= text.len() {
                break;
            }
        }
    }

    /// Expand glyph quads into the textured batch against the atlas.
    fn render_text_quads(&mut self, quads: &[TextQuad], color: Color) {
        let num_quads = quads.len();
        let state = self.state();
        let scale = state.font_scale * self.device_pixel_ratio;
        let inv_scale = 1.0 / scale;

        // The quads are already in pixel units: divide the scale out of
        // the transform and keep its translation.
        let t = &state.transform.elements;
        let mtx = Affine2D {
            elements: [
                t[0] * inv_scale,
                t[1] * inv_scale,
                t[2] * inv_scale,
                t[3] * inv_scale,
                t[4],
                t[5],
            ],
        };

        let pos_quads: Vec<[f32; 4]> = quads.iter().map(|q| q.pos).collect();
        let mut positions = vec![0.0f32; num_quads * 8];
        math::batch_transform_text_quads(&pos_quads, &mtx, &mut positions);

        let mut uvs = Vec::with_capacity(num_quads * 8);
        for q in quads {
            let [s0, t0, s1, t1] = q.uv;
            uvs.extend_from_slice(&[s0, t0, s1, t0, s1, t1, s0, t1]);
        }

        let mut indices = vec![0u16; num_quads * 6];
        math::gen_quad_indices(&mut indices, num_quads as u32, 0);

        let mesh = Mesh {
            positions,
            colors: Vec::new(),
            indices,
        };
        let atlas = self.font_atlas_image;
        self.emit_textured(atlas.idx, &mesh, color.packed(), UvSource::Stream(&uvs));
    }

    // ── Measurement ──────────────────────────────────────────────────

    /// Measure a single line. Returns the advance width and the bounds
    /// `[min_x, min_y, max_x, max_y]` anchored at `(x, y)`.
    pub fn measure_text(&mut self, cfg: &TextConfig, x: f32, y: f32, text: &str) -> (f32, [f32; 4]) {
        let Some(mesh) = self.font_system.text(cfg, text, false) else {
            return (0.0, [0.0; 4]);
        };
        let (min_y, max_y) = self.font_system.line_bounds(cfg, 0.0);
        let bounds = [
            x + mesh.bounds[0],
            y + min_y,
            x + mesh.bounds[2],
            y + max_y,
        ];
        (mesh.width, bounds)
    }

    /// Measure wrapped text. Returns `[min_x, min_y, max_x, max_y]`.
    pub fn measure_text_box(
        &mut self,
        cfg: &TextConfig,
        x: f32,
        y: f32,
        break_width: f32,
        text: &str,
    ) -> [f32; 4] {
        let halign = cfg.align_hor;
        let (top, bottom) = self.font_system.line_bounds(cfg, y);
        let line_height = bottom - top;

        let mut bounds = [x, top, x, top];
        let mut start = 0usize;
        loop {
            let rows = self
                .font_system
                .break_lines(cfg, &text[start..], break_width, 4);
            if rows.is_empty() {
                break;
            }

            for row in &rows {
                let dx = match halign {
                    TextAlignHor::Left => 0.0,
                    TextAlignHor::Center => (break_width - row.width) * 0.5,
                    TextAlignHor::Right => break_width - row.width,
                };
                bounds[0] = bounds[0].min(x + dx + row.min_x);
                bounds[2] = bounds[2].max(x + dx + row.max_x);
            }
            bounds[3] += line_height * rows.len() as f32;

            let advance = rows.last().map(|r| r.next).unwrap_or(0);
            if advance == 0 {
                break;
            }
            start += advance;
            if start >= text.len() {
                break;
            }
        }

        bounds
    }

    /// Break text into rows no wider than `break_width`.
    pub fn text_break_lines(
        &mut self,
        cfg: &TextConfig,
        text: &str,
        break_width: f32,
        max_rows: usize,
    ) -> Vec<verve_core::TextRow> {
        self.font_system.break_lines(cfg, text, break_width, max_rows)
    }

    /// Per-glyph positions of a single line, up to `max_positions`.
    pub fn text_glyph_positions(
        &mut self,
        cfg: &TextConfig,
        x: f32,
        _y: f32,
        text: &str,
        max_positions: usize,
    ) -> Vec<GlyphPosition> {
        let Some(mesh) = self.font_system.text(cfg, text, false) else {
            return Vec::new();
        };

        let mut positions = Vec::new();
        let mut cur_x = x;
        let mut cursor = 0usize;
        for (i, quad) in mesh.quads.iter().take(max_positions).enumerate() {
            positions.push(GlyphPosition {
                byte_offset: cursor,
                x: cur_x,
                min_x: x + quad.pos[0],
                max_x: x + quad.pos[2],
            });
            cur_x += quad.pos[2] - quad.pos[0];
            cursor += mesh.codepoint_sizes.get(i).copied().unwrap_or(1) as usize;
        }
        positions
    }

    pub fn text_line_height(&mut self, cfg: &TextConfig) -> f32 {
        self.font_system.line_height(cfg)
    }
}
