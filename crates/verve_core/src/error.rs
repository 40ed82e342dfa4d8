//! Error types shared by the renderer crates

use thiserror::Error;

/// Errors raised during context construction and configuration
#[derive(Error, Debug)]
pub enum CoreError {
    /// Indices are 16-bit and arena-relative, so an arena can never hold
    /// more than 65536 vertices.
    #[error("max_vb_vertices is {0} but vertex arenas are limited to 65536 vertices (16-bit indices)")]
    VertexArenaTooLarge(u32),

    #[error("max_vb_vertices must be non-zero")]
    VertexArenaEmpty,

    #[error("state stack needs room for at least one entry")]
    StateStackTooSmall,
}
