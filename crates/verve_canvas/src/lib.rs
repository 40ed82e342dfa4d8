//! Verve drawing context
//!
//! An immediate-mode 2D vector graphics renderer. Callers issue drawing
//! commands between [`Context::begin`] and [`Context::end`]; the context
//! batches the resulting geometry into pooled vertex/index arenas,
//! coalesces compatible draws, maintains the stencil-based nested-clip
//! protocol, and walks the batched stream into an abstract
//! [`GpuBackend`](verve_core::GpuBackend).
//!
//! Drawing calls can also be recorded into replayable command lists;
//! cacheable lists additionally memoize their tessellated meshes so
//! re-submission under an unchanged average scale skips path and stroker
//! work entirely.

mod arena;
mod batch;
mod cache;
mod clip;
mod cmdlist;
mod context;
mod image;
mod paint;
mod player;
mod primitives;
mod state;
mod stats;
mod text;

pub mod testutil;

pub use batch::{ClipCmdState, DrawCommand, DrawCommandType};
pub use cmdlist::{cmd_list_flags, CommandType};
pub use context::Context;
pub use image::Image;
pub use state::DrawingState;
pub use stats::Stats;
pub use text::GlyphPosition;

pub use verve_core::{
    image_flags, Affine2D, AtlasUpdate, BufferSetId, ClipRule, Color, CommandListHandle,
    ContextConfig, CoreError, FillFlags, FillRule, FontHandle, FontSystem, GpuBackend,
    GradientHandle, GradientUniforms, ImageHandle, ImagePatternHandle, IndexBufferId, LineCap,
    LineJoin, PaintData, PathType, Program, StencilMode, StrokeFlags, TextAlignHor, TextAlignVer,
    TextConfig, TextMesh, TextQuad, TextRow, TextureId, TransformOrder, Winding,
};
