//! The atlas-backed font system
//!
//! Implements the renderer's `FontSystem` collaborator: registered
//! fonts, fallback chains, advance-based glyph layout into quads, greedy
//! word-wrap line breaking, and the atlas flush protocol. Quads are laid
//! out in pixel units relative to the baseline at the pen origin; the
//! drawing context positions and scales them.

use rustc_hash::FxHashMap;

use verve_core::{
    AtlasUpdate, FontHandle, FontSystem, TextAlignHor, TextAlignVer, TextConfig, TextMesh,
    TextQuad, TextRow,
};

use crate::atlas::GlyphAtlas;
use crate::font::FontFace;
use crate::rasterizer::GlyphRasterizer;

const DEFAULT_ATLAS_SIZE: u32 = 512;

/// Production font system over ttf-parser + swash + a shelf atlas
pub struct AtlasFontSystem {
    faces: Vec<FontFace>,
    names: FxHashMap<String, u16>,
    fallbacks: FxHashMap<u16, Vec<u16>>,
    atlas: GlyphAtlas,
    rasterizer: GlyphRasterizer,
    max_fonts: u16,
}

impl AtlasFontSystem {
    pub fn new() -> Self {
        Self::with_atlas_size(DEFAULT_ATLAS_SIZE, DEFAULT_ATLAS_SIZE)
    }

    pub fn with_atlas_size(width: u32, height: u32) -> Self {
        AtlasFontSystem {
            faces: Vec::new(),
            names: FxHashMap::default(),
            fallbacks: FxHashMap::default(),
            atlas: GlyphAtlas::new(width, height),
            rasterizer: GlyphRasterizer::new(),
            max_fonts: 8,
        }
    }

    pub fn with_max_fonts(mut self, max_fonts: u16) -> Self {
        self.max_fonts = max_fonts;
        self
    }

    /// Resolve a codepoint to `(face index, glyph id)`, walking the
    /// fallback chain of the requested face.
    fn resolve_glyph(&self, font_idx: u16, ch: char) -> Option<(u16, u16)> {
        let face = self.faces.get(font_idx as usize)?;
        if let Some(glyph) = face.glyph_index(ch) {
            return Some((font_idx, glyph));
        }
        if let Some(chain) = self.fallbacks.get(&font_idx) {
            for &fallback_idx in chain {
                if let Some(face) = self.faces.get(fallback_idx as usize) {
                    if let Some(glyph) = face.glyph_index(ch) {
                        return Some((fallback_idx, glyph));
                    }
                }
            }
        }
        None
    }

    /// Advance of one codepoint, falling back to a third of the font
    /// size for uncovered codepoints.
    fn char_advance(&self, font_idx: u16, ch: char, cfg: &TextConfig) -> f32 {
        match self.resolve_glyph(font_idx, ch) {
            Some((face_idx, glyph)) => {
                self.faces[face_idx as usize].glyph_advance(glyph, cfg.size) + cfg.spacing
            }
            None => cfg.size / 3.0 + cfg.spacing,
        }
    }

    fn alignment_offset(&self, cfg: &TextConfig, width: f32) -> [f32; 2] {
        let ax = match cfg.align_hor {
            TextAlignHor::Left => 0.0,
            TextAlignHor::Center => -width * 0.5,
            TextAlignHor::Right => -width,
        };
        let ay = match (self.faces.get(cfg.font.idx as usize), cfg.align_ver) {
            (_, TextAlignVer::Baseline) => 0.0,
            (Some(face), TextAlignVer::Top) => face.metrics().ascender_px(cfg.size),
            (Some(face), TextAlignVer::Middle) => {
                (face.metrics().ascender_px(cfg.size) + face.metrics().descender_px(cfg.size)) * 0.5
            }
            (Some(face), TextAlignVer::Bottom) => face.metrics().descender_px(cfg.size),
            (None, _) => 0.0,
        };
        [ax, ay]
    }
}

impl Default for AtlasFontSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FontSystem for AtlasFontSystem {
    fn add_font(&mut self, name: &str, data: Vec<u8>) -> FontHandle {
        if self.faces.len() >= self.max_fonts as usize {
            return FontHandle::INVALID;
        }
        match FontFace::from_data(data, 0) {
            Ok(face) => {
                let idx = self.faces.len() as u16;
                self.faces.push(face);
                self.names.insert(name.to_string(), idx);
                FontHandle::new(idx)
            }
            Err(err) => {
                tracing::warn!("failed to parse font '{name}': {err}");
                FontHandle::INVALID
            }
        }
    }

    fn find_font(&self, name: &str) -> FontHandle {
        self.names
            .get(name)
            .map(|&idx| FontHandle::new(idx))
            .unwrap_or(FontHandle::INVALID)
    }

    fn add_fallback_font(&mut self, base: FontHandle, fallback: FontHandle) -> bool {
        if base.idx as usize >= self.faces.len() || fallback.idx as usize >= self.faces.len() {
            return false;
        }
        self.fallbacks.entry(base.idx).or_default().push(fallback.idx);
        true
    }

    fn text(&mut self, cfg: &TextConfig, text: &str, build_bitmaps: bool) -> Option<TextMesh> {
        if text.is_empty() || cfg.font.idx as usize >= self.faces.len() {
            return None;
        }

        let mut quads = Vec::new();
        let mut codepoint_sizes = Vec::new();
        let mut pen_x = 0.0f32;
        let mut bounds = [f32::MAX, f32::MAX, f32::MIN, f32::MIN];
        let (atlas_w, atlas_h) = self.atlas.dimensions();

        for ch in text.chars() {
            let Some((face_idx, glyph)) = self.resolve_glyph(cfg.font.idx, ch) else {
                pen_x += self.char_advance(cfg.font.idx, ch, cfg);
                continue;
            };

            let (quad, advance) = if build_bitmaps {
                let info = match self.atlas.get_glyph(face_idx, glyph, cfg.size) {
                    Some(info) => *info,
                    None => {
                        let raster = self
                            .rasterizer
                            .rasterize(&self.faces[face_idx as usize], glyph, cfg.size)
                            .ok()?;
                        let inserted = self.atlas.insert_glyph(
                            face_idx,
                            glyph,
                            cfg.size,
                            &raster.bitmap,
                            raster.width,
                            raster.height,
                            raster.bearing_x,
                            raster.bearing_y,
                            raster.advance,
                        );
                        match inserted {
                            Ok(info) => info,
                            Err(_) => {
                                // Atlas exhausted: restart packing; the
                                // dropped glyphs re-rasterize on demand.
                                tracing::warn!("glyph atlas full, clearing");
                                self.atlas.clear();
                                self.atlas
                                    .insert_glyph(
                                        face_idx,
                                        glyph,
                                        cfg.size,
                                        &raster.bitmap,
                                        raster.width,
                                        raster.height,
                                        raster.bearing_x,
                                        raster.bearing_y,
                                        raster.advance,
                                    )
                                    .ok()?
                            }
                        }
                    }
                };

                let x0 = pen_x + info.bearing_x as f32;
                let y0 = -(info.bearing_y as f32);
                let quad = TextQuad {
                    pos: [
                        x0,
                        y0,
                        x0 + info.region.width as f32,
                        y0 + info.region.height as f32,
                    ],
                    uv: info.region.uv_bounds(atlas_w, atlas_h),
                };
                (quad, info.advance + cfg.spacing)
            } else {
                // Measurement pass: outline bounds only, no raster work.
                let face = &self.faces[face_idx as usize];
                let advance = face.glyph_advance(glyph, cfg.size) + cfg.spacing;
                let quad = match face.glyph_bounds(glyph, cfg.size) {
                    Some(b) => TextQuad {
                        pos: [pen_x + b[0], -b[3], pen_x + b[2], -b[1]],
                        uv: [0.0; 4],
                    },
                    None => TextQuad {
                        pos: [pen_x, 0.0, pen_x + advance, 0.0],
                        uv: [0.0; 4],
                    },
                };
                (quad, advance)
            };

            bounds[0] = bounds[0].min(quad.pos[0]);
            bounds[1] = bounds[1].min(quad.pos[1]);
            bounds[2] = bounds[2].max(quad.pos[2]);
            bounds[3] = bounds[3].max(quad.pos[3]);

            quads.push(quad);
            codepoint_sizes.push(ch.len_utf8() as u8);
            pen_x += advance;
        }

        if quads.is_empty() {
            return None;
        }
        let alignment = self.alignment_offset(cfg, pen_x);

        Some(TextMesh {
            quads,
            codepoint_sizes,
            alignment,
            width: pen_x,
            bounds,
        })
    }

    fn break_lines(
        &mut self,
        cfg: &TextConfig,
        text: &str,
        break_width: f32,
        max_rows: usize,
    ) -> Vec<TextRow> {
        let mut rows = Vec::new();
        let mut start = 0usize;

        while start < text.len() && rows.len() < max_rows {
            let mut width = 0.0f32;
            let mut end = start;
            let mut last_break: Option<(usize, f32)> = None;
            let mut next = text.len();
            let mut hit_newline = false;

            for (off, ch) in text[start..].char_indices() {
                let at = start + off;
                if ch == '\n' {
                    next = at + 1;
                    hit_newline = true;
                    break;
                }

                let advance = self.char_advance(cfg.font.idx, ch, cfg);
                if width + advance > break_width && end > start {
                    // Prefer the last whitespace break inside the row.
                    if let Some((break_at, break_width_px)) = last_break {
                        end = break_at;
                        width = break_width_px;
                        next = break_at;
                        // Skip the breaking space itself.
                        if text[break_at..].starts_with(' ') {
                            next = break_at + 1;
                        }
                    } else {
                        next = at;
                    }
                    break;
                }

                if ch == ' ' {
                    last_break = Some((at, width));
                }
                width += advance;
                end = at + ch.len_utf8();
                next = end;
            }

            if hit_newline {
                end = next - 1;
            }

            rows.push(TextRow {
                start,
                end,
                next,
                width,
                min_x: 0.0,
                max_x: width,
            });

            if next <= start {
                break;
            }
            start = next;
        }

        rows
    }

    fn line_bounds(&mut self, cfg: &TextConfig, y: f32) -> (f32, f32) {
        match self.faces.get(cfg.font.idx as usize) {
            Some(face) => {
                let m = face.metrics();
                (y - m.ascender_px(cfg.size), y - m.descender_px(cfg.size))
            }
            None => (y, y),
        }
    }

    fn line_height(&mut self, cfg: &TextConfig) -> f32 {
        self.faces
            .get(cfg.font.idx as usize)
            .map(|face| face.metrics().line_height_px(cfg.size))
            .unwrap_or(0.0)
    }

    fn white_pixel_uv(&self) -> [f32; 2] {
        self.atlas.white_pixel_uv()
    }

    fn atlas_size(&self) -> (u16, u16) {
        let (w, h) = self.atlas.dimensions();
        (w as u16, h as u16)
    }

    fn flush_atlas(&mut self) -> Option<AtlasUpdate> {
        if !self.atlas.is_dirty() {
            return None;
        }
        let (width, height) = self.atlas.dimensions();

        // Expand coverage to white RGBA so the textured shader can
        // multiply vertex color straight through.
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for &a in self.atlas.pixels() {
            pixels.extend_from_slice(&[0xff, 0xff, 0xff, a]);
        }
        self.atlas.mark_clean();

        Some(AtlasUpdate {
            width: width as u16,
            height: height as u16,
            pixels,
        })
    }

    fn frame(&mut self) {}
}
