//! Verve core types
//!
//! Shared foundation for the Verve renderer crates:
//! - Packed colors and 2x3 affine transforms
//! - Batch math helpers used by the draw-command batcher
//! - Typed handles and the dense handle allocator
//! - Fixed-chunk buffer pools with drop-guard slices
//! - Bit-packed fill/stroke flags
//! - Context configuration
//! - The `GpuBackend` and `FontSystem` collaborator traits

pub mod color;
pub mod config;
pub mod error;
pub mod flags;
pub mod font;
pub mod gpu;
pub mod handle;
pub mod math;
pub mod pool;
pub mod transform;

pub use color::Color;
pub use config::{image_flags, ContextConfig};
pub use error::CoreError;
pub use flags::{
    ClipRule, FillFlags, FillRule, LineCap, LineJoin, PathType, StrokeFlags, TransformOrder,
    Winding,
};
pub use font::{
    AtlasUpdate, FontSystem, TextAlignHor, TextAlignVer, TextConfig, TextMesh, TextQuad, TextRow,
};
pub use gpu::{
    BufferSetId, GpuBackend, GradientUniforms, IndexBufferId, PaintData, Program, StencilMode,
    TextureId, ViewId,
};
pub use handle::{
    CommandListHandle, FontHandle, GradientHandle, HandleAlloc, ImageHandle, ImagePatternHandle,
};
pub use pool::{ChunkPool, PoolSlice};
pub use transform::Affine2D;
