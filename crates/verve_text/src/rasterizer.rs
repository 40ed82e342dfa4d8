//! Glyph rasterization via swash

use swash::scale::{Render, ScaleContext, Source, StrikeWith};
use swash::zeno::Format;

use crate::font::FontFace;
use crate::{Result, TextError};

/// Rasterized coverage bitmap with placement metrics
#[derive(Debug, Clone)]
pub struct RasterizedGlyph {
    /// 8-bit coverage, row-major
    pub bitmap: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Offset from origin to left edge
    pub bearing_x: i16,
    /// Offset from baseline to top edge
    pub bearing_y: i16,
    /// Horizontal advance in pixels
    pub advance: f32,
}

/// Glyph rasterizer; the scale context caches scaling state across
/// glyphs.
pub struct GlyphRasterizer {
    scale_context: ScaleContext,
}

impl GlyphRasterizer {
    pub fn new() -> Self {
        GlyphRasterizer {
            scale_context: ScaleContext::new(),
        }
    }

    /// Rasterize one glyph at `font_size` pixels.
    pub fn rasterize(
        &mut self,
        font: &FontFace,
        glyph_id: u16,
        font_size: f32,
    ) -> Result<RasterizedGlyph> {
        let swash_font = swash::FontRef::from_index(font.data(), font.face_index() as usize)
            .ok_or(TextError::InvalidFontData)?;

        let mut scaler = self
            .scale_context
            .builder(swash_font)
            .size(font_size)
            .build();

        let metrics = swash_font.metrics(&[]);
        let glyph_metrics = swash_font.glyph_metrics(&[]);
        let scale = font_size / metrics.units_per_em as f32;
        let advance = glyph_metrics.advance_width(glyph_id) * scale;

        let mut render = Render::new(&[
            Source::ColorOutline(0),
            Source::ColorBitmap(StrikeWith::BestFit),
            Source::Outline,
        ]);
        render.format(Format::Alpha);

        match render.render(&mut scaler, glyph_id) {
            Some(image) => Ok(RasterizedGlyph {
                bearing_x: image.placement.left as i16,
                bearing_y: image.placement.top as i16,
                width: image.placement.width,
                height: image.placement.height,
                bitmap: image.data,
                advance,
            }),
            // Empty glyphs (spaces) carry an advance but no bitmap.
            None => Ok(RasterizedGlyph {
                bitmap: Vec::new(),
                width: 0,
                height: 0,
                bearing_x: 0,
                bearing_y: 0,
                advance,
            }),
        }
    }
}

impl Default for GlyphRasterizer {
    fn default() -> Self {
        Self::new()
    }
}
