//! Font loading and metrics via ttf-parser

use std::sync::Arc;

use crate::{Result, TextError};

/// Vertical font metrics in font units
#[derive(Debug, Clone, Copy)]
pub struct FontMetrics {
    pub units_per_em: u16,
    pub ascender: i16,
    /// Typically negative
    pub descender: i16,
    pub line_gap: i16,
}

impl FontMetrics {
    /// Scale a font-unit value to pixels at `font_size`
    pub fn scale(&self, value: i16, font_size: f32) -> f32 {
        value as f32 * font_size / self.units_per_em as f32
    }

    pub fn ascender_px(&self, font_size: f32) -> f32 {
        self.scale(self.ascender, font_size)
    }

    pub fn descender_px(&self, font_size: f32) -> f32 {
        self.scale(self.descender, font_size)
    }

    pub fn line_height_px(&self, font_size: f32) -> f32 {
        self.scale(self.ascender - self.descender + self.line_gap, font_size)
    }
}

/// A parsed font face. The raw data stays alive for ttf-parser and
/// swash, which both borrow it per operation.
pub struct FontFace {
    data: Arc<Vec<u8>>,
    face_index: u32,
    metrics: FontMetrics,
}

impl FontFace {
    /// Parse a face from raw TTF/OTF bytes.
    pub fn from_data(data: Vec<u8>, face_index: u32) -> Result<Self> {
        let face = ttf_parser::Face::parse(&data, face_index)
            .map_err(|e| TextError::FontParseError(e.to_string()))?;

        let metrics = FontMetrics {
            units_per_em: face.units_per_em(),
            ascender: face.ascender(),
            descender: face.descender(),
            line_gap: face.line_gap(),
        };

        Ok(FontFace {
            data: Arc::new(data),
            face_index,
            metrics,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn face_index(&self) -> u32 {
        self.face_index
    }

    pub fn metrics(&self) -> &FontMetrics {
        &self.metrics
    }

    pub(crate) fn as_ttf_face(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.data, self.face_index).ok()
    }

    /// Glyph id for a codepoint, if the face covers it
    pub fn glyph_index(&self, ch: char) -> Option<u16> {
        self.as_ttf_face()
            .and_then(|face| face.glyph_index(ch))
            .map(|id| id.0)
    }

    /// Horizontal advance in pixels at `font_size`
    pub fn glyph_advance(&self, glyph_id: u16, font_size: f32) -> f32 {
        self.as_ttf_face()
            .and_then(|face| face.glyph_hor_advance(ttf_parser::GlyphId(glyph_id)))
            .map(|adv| adv as f32 * font_size / self.metrics.units_per_em as f32)
            .unwrap_or(0.0)
    }

    /// Glyph bounding box in pixels, y-up relative to the baseline
    pub fn glyph_bounds(&self, glyph_id: u16, font_size: f32) -> Option<[f32; 4]> {
        let face = self.as_ttf_face()?;
        let bbox = face.glyph_bounding_box(ttf_parser::GlyphId(glyph_id))?;
        let s = font_size / self.metrics.units_per_em as f32;
        Some([
            bbox.x_min as f32 * s,
            bbox.y_min as f32 * s,
            bbox.x_max as f32 * s,
            bbox.y_max as f32 * s,
        ])
    }
}
