//! The GPU backend collaborator interface
//!
//! The drawing context batches geometry on the CPU and walks the batched
//! command streams at frame end, driving a [`GpuBackend`] through a
//! bind/set/submit protocol: bind buffer slices, set scissor, stencil,
//! and paint, then submit one draw. Backends accumulate that state and
//! translate it into their API's draw calls.
//!
//! Vertex memory is co-owned with the backend for one frame: the context
//! moves [`PoolSlice`](crate::pool::PoolSlice) chunks into
//! [`GpuBackend::update_buffer_set`] and the backend drops them once the
//! GPU no longer reads the data, which returns the chunks to their pool.

use crate::flags::ClipRule;
use crate::pool::PoolSlice;

/// Render view identifier; draws submitted to the same view keep their
/// submission order.
pub type ViewId = u16;

/// Identifier of a position/color/UV vertex buffer triple
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferSetId(pub u32);

/// Identifier of an index buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IndexBufferId(pub u32);

/// Identifier of a backend texture
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u16);

impl TextureId {
    pub const INVALID: TextureId = TextureId(u16::MAX);

    pub const fn is_valid(self) -> bool {
        self.0 != u16::MAX
    }
}

/// The fixed shader programs the renderer draws with
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Program {
    /// Position + color + UV, samples a texture (solid fills use the
    /// font atlas white pixel)
    Textured,
    /// Position + color, gradient factor computed from a paint matrix
    ColorGradient,
    /// Position + color, UVs computed from a paint matrix, samples a
    /// texture with repeat addressing
    ImagePattern,
    /// Position only, writes the stencil plane with color writes off
    Stencil,
}

/// Stencil configuration for a submission
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StencilMode {
    /// Stencil test disabled
    None,
    /// Always pass, REPLACE with `reference`; used while stamping clip
    /// shapes. Color writes are off for the Stencil program.
    Write { reference: u8 },
    /// Compare against `reference`: EQUAL for [`ClipRule::In`],
    /// NOT_EQUAL for [`ClipRule::NotIn`]; all ops KEEP.
    Test { reference: u8, rule: ClipRule },
}

/// Gradient shader uniforms
///
/// `matrix` maps screen positions into the gradient's local space;
/// `params` is `[extent.x, extent.y, radius, feather]`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GradientUniforms {
    pub matrix: [f32; 9],
    pub params: [f32; 4],
    pub inner_color: [f32; 4],
    pub outer_color: [f32; 4],
}

/// Per-draw paint bindings
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PaintData {
    /// Sample `texture` with the vertex UV stream
    Texture { texture: TextureId, sampler_flags: u32 },
    /// Evaluate a gradient in the fragment shader
    Gradient(GradientUniforms),
    /// Compute UVs from `matrix` (pattern scale baked in) and sample
    /// `texture`
    Pattern {
        matrix: [f32; 9],
        texture: TextureId,
        sampler_flags: u32,
    },
    /// No paint; the stencil program ignores color output
    Stencil,
}

/// Abstract GPU device consumed by the frame orchestrator.
///
/// Blend state is implied: every color-writing program draws with
/// premultiplied-alpha "over"; the stencil program writes no color.
pub trait GpuBackend {
    /// Create a (position, color, UV) dynamic vertex buffer triple sized
    /// for one arena.
    fn create_buffer_set(&mut self, max_vertices: u32) -> BufferSetId;

    /// Upload one frame's worth of arena data. The slices are owned by
    /// the backend until the GPU is done with them; dropping them
    /// returns the memory to the context's pools.
    fn update_buffer_set(
        &mut self,
        set: BufferSetId,
        positions: PoolSlice<f32>,
        colors: PoolSlice<u32>,
        uvs: PoolSlice<f32>,
        num_vertices: u32,
    );

    fn create_index_buffer(&mut self) -> IndexBufferId;

    /// Upload the frame's index data. Backends copy synchronously; the
    /// arena is reset at the next `frame()`.
    fn update_index_buffer(&mut self, buffer: IndexBufferId, indices: &[u16]);

    /// Create a RGBA8 texture, optionally with initial contents.
    fn create_texture(
        &mut self,
        width: u16,
        height: u16,
        sampler_flags: u32,
        data: Option<&[u8]>,
    ) -> TextureId;

    /// Update a sub-rectangle of a texture with tightly packed RGBA8
    /// pixels.
    fn update_texture(&mut self, texture: TextureId, x: u16, y: u16, w: u16, h: u16, data: &[u8]);

    fn destroy_texture(&mut self, texture: TextureId);

    /// Set the view's projection matrix (column-major 4x4).
    fn set_view_transform(&mut self, view: ViewId, proj: [f32; 16]);

    /// Bind a vertex range of a buffer set for the next submission.
    fn set_vertex_slice(&mut self, set: BufferSetId, first_vertex: u32, num_vertices: u32);

    /// Bind an index range for the next submission.
    fn set_index_slice(&mut self, buffer: IndexBufferId, first_index: u32, num_indices: u32);

    /// Scissor in device pixels for the next submission.
    fn set_scissor(&mut self, x: u16, y: u16, w: u16, h: u16);

    fn set_stencil(&mut self, mode: StencilMode);

    fn set_paint(&mut self, paint: PaintData);

    /// Submit one draw with the currently bound state.
    fn submit(&mut self, view: ViewId, program: Program);
}
