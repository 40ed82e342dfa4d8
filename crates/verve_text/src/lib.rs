//! Text shaping and glyph atlas management for Verve
//!
//! This crate provides [`AtlasFontSystem`], the production
//! [`FontSystem`](verve_core::FontSystem) implementation:
//! - Font parsing and metrics via ttf-parser
//! - Glyph rasterization via swash
//! - A shelf-packed alpha glyph atlas with a solid white rect for
//!   solid-color fills
//! - Advance-based layout and greedy word-wrap line breaking

pub mod atlas;
pub mod font;
pub mod rasterizer;
pub mod system;

pub use atlas::{AtlasRegion, GlyphAtlas, GlyphInfo};
pub use font::{FontFace, FontMetrics};
pub use rasterizer::{GlyphRasterizer, RasterizedGlyph};
pub use system::AtlasFontSystem;

use thiserror::Error;

/// Text subsystem errors
#[derive(Error, Debug)]
pub enum TextError {
    #[error("failed to parse font: {0}")]
    FontParseError(String),

    #[error("invalid font data")]
    InvalidFontData,

    #[error("glyph atlas is full")]
    AtlasFull,
}

pub type Result<T> = std::result::Result<T, TextError>;
