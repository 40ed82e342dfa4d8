//! Shelf-packed glyph atlas
//!
//! Single-channel coverage atlas with a solid white rect at the origin;
//! every solid-color draw in the renderer samples that rect so plain
//! fills and glyphs batch into the same texture.

use rustc_hash::FxHashMap;

use crate::{Result, TextError};

/// Side of the always-white rect at the atlas origin
pub const WHITE_RECT_SIZE: u32 = 2;

/// Region in the atlas texture (pixels)
#[derive(Debug, Clone, Copy)]
pub struct AtlasRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl AtlasRegion {
    /// `[u_min, v_min, u_max, v_max]` for this region
    pub fn uv_bounds(&self, atlas_width: u32, atlas_height: u32) -> [f32; 4] {
        [
            self.x as f32 / atlas_width as f32,
            self.y as f32 / atlas_height as f32,
            (self.x + self.width) as f32 / atlas_width as f32,
            (self.y + self.height) as f32 / atlas_height as f32,
        ]
    }
}

/// Cached glyph placement and metrics
#[derive(Debug, Clone, Copy)]
pub struct GlyphInfo {
    pub region: AtlasRegion,
    pub bearing_x: i16,
    pub bearing_y: i16,
    pub advance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GlyphKey {
    font: u16,
    glyph_id: u16,
    /// Font size quantized to 0.5px
    size_key: u16,
}

impl GlyphKey {
    fn new(font: u16, glyph_id: u16, font_size: f32) -> Self {
        GlyphKey {
            font,
            glyph_id,
            size_key: (font_size * 2.0).round() as u16,
        }
    }
}

struct Shelf {
    y: u32,
    height: u32,
    x: u32,
}

/// Glyph atlas with shelf packing and dirty tracking
pub struct GlyphAtlas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    glyphs: FxHashMap<GlyphKey, GlyphInfo>,
    shelves: Vec<Shelf>,
    padding: u32,
    dirty: bool,
}

impl GlyphAtlas {
    pub fn new(width: u32, height: u32) -> Self {
        let mut atlas = GlyphAtlas {
            width,
            height,
            pixels: vec![0; (width * height) as usize],
            glyphs: FxHashMap::default(),
            shelves: Vec::new(),
            padding: 1,
            dirty: true,
        };
        atlas.write_white_rect();
        atlas
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// UV of the white rect's center
    pub fn white_pixel_uv(&self) -> [f32; 2] {
        [
            WHITE_RECT_SIZE as f32 * 0.5 / self.width as f32,
            WHITE_RECT_SIZE as f32 * 0.5 / self.height as f32,
        ]
    }

    pub fn get_glyph(&self, font: u16, glyph_id: u16, font_size: f32) -> Option<&GlyphInfo> {
        self.glyphs.get(&GlyphKey::new(font, glyph_id, font_size))
    }

    /// Insert a rasterized glyph bitmap, packing it onto a shelf.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_glyph(
        &mut self,
        font: u16,
        glyph_id: u16,
        font_size: f32,
        bitmap: &[u8],
        width: u32,
        height: u32,
        bearing_x: i16,
        bearing_y: i16,
        advance: f32,
    ) -> Result<GlyphInfo> {
        let region = self.allocate(width.max(1), height.max(1))?;

        for row in 0..height {
            let src = (row * width) as usize;
            let dst = ((region.y + row) * self.width + region.x) as usize;
            self.pixels[dst..dst + width as usize]
                .copy_from_slice(&bitmap[src..src + width as usize]);
        }
        self.dirty = true;

        let info = GlyphInfo {
            region: AtlasRegion {
                x: region.x,
                y: region.y,
                width,
                height,
            },
            bearing_x,
            bearing_y,
            advance,
        };
        self.glyphs
            .insert(GlyphKey::new(font, glyph_id, font_size), info);
        Ok(info)
    }

    /// Drop every glyph and start packing over (the white rect stays).
    pub fn clear(&mut self) {
        self.pixels.fill(0);
        self.glyphs.clear();
        self.shelves.clear();
        self.write_white_rect();
        self.dirty = true;
    }

    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    fn allocate(&mut self, width: u32, height: u32) -> Result<AtlasRegion> {
        let padded_width = width + self.padding;
        let padded_height = height + self.padding;

        // Best shelf: lowest one tall enough with room left
        let mut best: Option<usize> = None;
        for (i, shelf) in self.shelves.iter().enumerate() {
            if shelf.height >= padded_height && shelf.x + padded_width <= self.width {
                if best.map(|b| shelf.y < self.shelves[b].y).unwrap_or(true) {
                    best = Some(i);
                }
            }
        }

        if let Some(i) = best {
            let shelf = &mut self.shelves[i];
            let region = AtlasRegion {
                x: shelf.x,
                y: shelf.y,
                width,
                height,
            };
            shelf.x += padded_width;
            return Ok(region);
        }

        // Open a new shelf under the last one (the first shelf starts
        // below the white rect).
        let next_y = self
            .shelves
            .last()
            .map(|s| s.y + s.height)
            .unwrap_or(WHITE_RECT_SIZE + self.padding);
        if next_y + padded_height > self.height || padded_width > self.width {
            return Err(TextError::AtlasFull);
        }
        self.shelves.push(Shelf {
            y: next_y,
            height: padded_height,
            x: padded_width,
        });
        Ok(AtlasRegion {
            x: 0,
            y: next_y,
            width,
            height,
        })
    }

    fn write_white_rect(&mut self) {
        for y in 0..WHITE_RECT_SIZE {
            for x in 0..WHITE_RECT_SIZE {
                self.pixels[(y * self.width + x) as usize] = 0xff;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_rect_present() {
        let atlas = GlyphAtlas::new(64, 64);
        assert_eq!(atlas.pixels()[0], 0xff);
        assert_eq!(atlas.pixels()[1], 0xff);
        let uv = atlas.white_pixel_uv();
        assert!(uv[0] > 0.0 && uv[0] < 0.1);
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut atlas = GlyphAtlas::new(64, 64);
        let bitmap = vec![0x80u8; 16];
        let info = atlas
            .insert_glyph(0, 42, 16.0, &bitmap, 4, 4, 1, 3, 5.0)
            .unwrap();
        assert_eq!(info.region.width, 4);

        let found = atlas.get_glyph(0, 42, 16.0).unwrap();
        assert_eq!(found.bearing_x, 1);
        assert_eq!(found.advance, 5.0);
        // Same glyph at a clearly different size is a different entry
        assert!(atlas.get_glyph(0, 42, 32.0).is_none());
    }

    #[test]
    fn test_atlas_full() {
        let mut atlas = GlyphAtlas::new(16, 16);
        let bitmap = vec![0xffu8; 15 * 15];
        assert!(atlas.insert_glyph(0, 1, 16.0, &bitmap, 15, 15, 0, 0, 1.0).is_err());
    }

    #[test]
    fn test_clear_keeps_white_rect() {
        let mut atlas = GlyphAtlas::new(64, 64);
        let bitmap = vec![0x80u8; 16];
        atlas.insert_glyph(0, 1, 12.0, &bitmap, 4, 4, 0, 0, 4.0).unwrap();
        atlas.clear();
        assert_eq!(atlas.glyph_count(), 0);
        assert_eq!(atlas.pixels()[0], 0xff);
    }

    #[test]
    fn test_shelves_pack_multiple_rows() {
        let mut atlas = GlyphAtlas::new(32, 64);
        let bitmap = vec![0xffu8; 10 * 10];
        for i in 0..6 {
            atlas
                .insert_glyph(0, i, 12.0, &bitmap, 10, 10, 0, 0, 10.0)
                .unwrap();
        }
        assert_eq!(atlas.glyph_count(), 6);
    }
}
