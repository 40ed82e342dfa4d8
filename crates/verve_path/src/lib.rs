//! Path construction and mesh generation
//!
//! Two collaborators of the drawing context live here:
//!
//! - [`Path`]: records path commands and flattens curves into per-subpath
//!   polylines at the context's tessellation tolerance.
//! - [`Stroker`]: turns flattened (and already transformed) polylines into
//!   triangle meshes for fills, AA fills, and strokes.

pub mod path;
pub mod stroker;

pub use path::{Path, SubPath};
pub use stroker::{Mesh, Stroker};
