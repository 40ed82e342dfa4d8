//! wgpu backend for the Verve renderer
//!
//! Implements the [`GpuBackend`](verve_core::GpuBackend) collaborator
//! over wgpu: four fixed WGSL programs (textured, color gradient, image
//! pattern, stencil), dynamic vertex/index buffers per arena, and a
//! stencil-plane clip protocol realized through per-stencil-mode
//! pipeline variants.
//!
//! The backend records the context's bind/set/submit protocol into an
//! internal command stream during the frame; [`WgpuBackend::render`]
//! executes the whole stream in one render pass against a caller
//! provided color/depth-stencil target.

pub mod backend;
pub mod shaders;

pub use backend::{RendererConfig, RendererError, WgpuBackend, DEPTH_STENCIL_FORMAT};
