//! Draw-command batcher
//!
//! Two parallel ordered lists (clip commands and draw commands) with a
//! coalescing rule: a new primitive extends the previous command when it
//! shares the arena, type, handle, and scissor and no force-new flag is
//! set. Geometry is authored with indices rebased onto the command's
//! vertex range, so merged primitives form one contiguous submission.

use verve_core::{math, ClipRule};
use verve_path::Mesh;

use crate::context::Context;
use crate::state::quantize_scissor;

/// What a draw command binds when submitted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawCommandType {
    /// Textured geometry (solid fills via the atlas white pixel);
    /// `handle` is an image
    Textured,
    /// Gradient-shaded geometry; `handle` is a gradient
    ColorGradient,
    /// Pattern-mapped geometry; `handle` is an image pattern
    ImagePattern,
    /// Stencil-only geometry recorded between `begin_clip`/`end_clip`
    Clip,
}

/// Snapshot of the active clip range, attached to every draw command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipCmdState {
    pub rule: ClipRule,
    /// First entry of the clip-command range, `u32::MAX` when unclipped
    pub first_cmd: u32,
    pub num_cmds: u32,
}

impl ClipCmdState {
    pub fn none() -> Self {
        ClipCmdState {
            rule: ClipRule::In,
            first_cmd: u32::MAX,
            num_cmds: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.first_cmd != u32::MAX
    }
}

/// One batched GPU submission
#[derive(Clone, Copy, Debug)]
pub struct DrawCommand {
    pub kind: DrawCommandType,
    pub clip: ClipCmdState,
    pub arena_id: u32,
    pub first_vertex: u32,
    pub first_index: u32,
    pub num_vertices: u32,
    pub num_indices: u32,
    /// Scissor in whole canvas units
    pub scissor: [u16; 4],
    /// Image / gradient / pattern index, by `kind`
    pub handle: u16,
}

pub(crate) const CLIP_HANDLE_SENTINEL: u16 = u16::MAX;

/// Where a textured draw's UV stream comes from
#[derive(Clone, Copy)]
pub(crate) enum UvSource<'a> {
    /// Fill with the atlas white pixel (solid colors)
    WhitePixel,
    /// Copy a caller-provided stream (text quads, indexed tri lists)
    Stream(&'a [f32]),
    /// Leave the UV range untouched (gradients, patterns, clips)
    Untouched,
}

impl Context {
    /// Batched draw commands of the current frame
    pub fn draw_commands(&self) -> &[DrawCommand] {
        &self.draw_commands
    }

    /// Batched clip commands of the current frame
    pub fn clip_commands(&self) -> &[DrawCommand] {
        &self.clip_commands
    }

    /// Allocate vertex/index space and return the index of the draw
    /// command to extend: the previous command when it is compatible,
    /// a fresh one otherwise.
    pub(crate) fn alloc_draw_command(
        &mut self,
        num_vertices: u32,
        num_indices: u32,
        kind: DrawCommandType,
        handle: u16,
    ) -> usize {
        let (arena_id, first_vertex) = self.alloc_vertices(num_vertices);
        let first_index = self.alloc_indices(num_indices);
        let scissor = quantize_scissor(&self.state().scissor);

        if !self.force_new_draw_command {
            if let Some(prev) = self.draw_commands.last() {
                debug_assert_eq!(
                    prev.arena_id, arena_id,
                    "cannot merge draw commands across arenas"
                );
                debug_assert_eq!(prev.scissor, scissor, "scissor changed without force-new");
                if prev.kind == kind && prev.handle == handle {
                    return self.draw_commands.len() - 1;
                }
            }
        }

        self.draw_commands.push(DrawCommand {
            kind,
            clip: self.clip_state,
            arena_id,
            first_vertex,
            first_index,
            num_vertices: 0,
            num_indices: 0,
            scissor,
            handle,
        });
        self.stats.draw_commands += 1;
        self.force_new_draw_command = false;
        self.draw_commands.len() - 1
    }

    /// Clip-command variant: always type Clip, sentinel handle, no inner
    /// clip state, and coalescing governed only by the force-new flag.
    pub(crate) fn alloc_clip_command(&mut self, num_vertices: u32, num_indices: u32) -> usize {
        let (arena_id, first_vertex) = self.alloc_vertices(num_vertices);
        let first_index = self.alloc_indices(num_indices);
        let scissor = quantize_scissor(&self.state().scissor);

        if !self.force_new_clip_command {
            if let Some(prev) = self.clip_commands.last() {
                debug_assert_eq!(
                    prev.arena_id, arena_id,
                    "cannot merge clip commands across arenas"
                );
                debug_assert_eq!(prev.scissor, scissor, "scissor changed without force-new");
                debug_assert_eq!(prev.kind, DrawCommandType::Clip);
                return self.clip_commands.len() - 1;
            }
        }

        self.clip_commands.push(DrawCommand {
            kind: DrawCommandType::Clip,
            clip: ClipCmdState::none(),
            arena_id,
            first_vertex,
            first_index,
            num_vertices: 0,
            num_indices: 0,
            scissor,
            handle: CLIP_HANDLE_SENTINEL,
        });
        self.stats.clip_commands += 1;
        self.force_new_clip_command = false;
        self.clip_commands.len() - 1
    }

    /// Write a mesh as textured geometry sampling the atlas white pixel
    /// (solid fills and AA fringes). `uniform_color` applies when the
    /// mesh carries no per-vertex colors.
    pub(crate) fn emit_vertex_color(&mut self, mesh: &Mesh, uniform_color: u32) {
        let atlas = self.font_atlas_image;
        self.emit_textured(atlas.idx, mesh, uniform_color, UvSource::WhitePixel);
    }

    /// An empty scissor culls emission entirely; state changes still
    /// apply upstream.
    fn scissor_is_empty(&self) -> bool {
        let scissor = self.state().scissor;
        scissor[2] < 1.0 || scissor[3] < 1.0
    }

    /// Write a mesh as textured geometry against an arbitrary image.
    pub(crate) fn emit_textured(
        &mut self,
        image: u16,
        mesh: &Mesh,
        uniform_color: u32,
        uvs: UvSource<'_>,
    ) {
        if mesh.is_empty() || self.scissor_is_empty() {
            return;
        }
        let cmd_idx = self.alloc_draw_command(
            mesh.num_vertices(),
            mesh.indices.len() as u32,
            DrawCommandType::Textured,
            image,
        );
        self.write_mesh(cmd_idx, false, mesh, uniform_color, uvs);
    }

    /// Write a mesh for a gradient draw; vertex colors are carried for
    /// cached AA meshes but the shader derives the paint.
    pub(crate) fn emit_gradient(&mut self, handle: u16, mesh: &Mesh, uniform_color: u32) {
        if mesh.is_empty() || self.scissor_is_empty() {
            return;
        }
        let cmd_idx = self.alloc_draw_command(
            mesh.num_vertices(),
            mesh.indices.len() as u32,
            DrawCommandType::ColorGradient,
            handle,
        );
        self.write_mesh(cmd_idx, false, mesh, uniform_color, UvSource::Untouched);
    }

    /// Write a mesh for an image-pattern draw.
    pub(crate) fn emit_image_pattern(&mut self, handle: u16, mesh: &Mesh, uniform_color: u32) {
        if mesh.is_empty() || self.scissor_is_empty() {
            return;
        }
        let cmd_idx = self.alloc_draw_command(
            mesh.num_vertices(),
            mesh.indices.len() as u32,
            DrawCommandType::ImagePattern,
            handle,
        );
        self.write_mesh(cmd_idx, false, mesh, uniform_color, UvSource::Untouched);
    }

    /// Write position-only stencil geometry into the clip stream.
    pub(crate) fn emit_clip(&mut self, mesh: &Mesh) {
        if mesh.is_empty() || self.scissor_is_empty() {
            return;
        }
        let cmd_idx = self.alloc_clip_command(mesh.num_vertices(), mesh.indices.len() as u32);
        self.write_mesh(cmd_idx, true, mesh, 0, UvSource::Untouched);
    }

    /// Copy mesh streams into the command's arena ranges and extend the
    /// command. Indices land rebased by the command's current vertex
    /// count, i.e. relative to the arena slice bound at submission.
    fn write_mesh(
        &mut self,
        cmd_idx: usize,
        is_clip: bool,
        mesh: &Mesh,
        uniform_color: u32,
        uvs: UvSource<'_>,
    ) {
        let cmd = if is_clip {
            self.clip_commands[cmd_idx]
        } else {
            self.draw_commands[cmd_idx]
        };
        let white_uv = match uvs {
            UvSource::WhitePixel => Some(self.font_system.white_pixel_uv()),
            _ => None,
        };

        let num_vertices = mesh.num_vertices();
        let num_indices = mesh.indices.len() as u32;
        let offset = (cmd.first_vertex + cmd.num_vertices) as usize;

        let arena = &mut self.vertex_arenas[cmd.arena_id as usize];
        arena.positions_mut()[offset * 2..offset * 2 + mesh.positions.len()]
            .copy_from_slice(&mesh.positions);

        if !is_clip {
            let colors = &mut arena.colors_mut()[offset..offset + num_vertices as usize];
            if mesh.colors.len() == num_vertices as usize {
                colors.copy_from_slice(&mesh.colors);
            } else {
                debug_assert!(mesh.colors.is_empty(), "color stream length mismatch");
                colors.fill(uniform_color);
            }

            match uvs {
                UvSource::WhitePixel => {
                    let uv = white_uv.unwrap_or_default();
                    for pair in arena.uvs_mut()
                        [offset * 2..offset * 2 + num_vertices as usize * 2]
                        .chunks_exact_mut(2)
                    {
                        pair[0] = uv[0];
                        pair[1] = uv[1];
                    }
                }
                UvSource::Stream(data) => {
                    debug_assert_eq!(data.len(), num_vertices as usize * 2);
                    arena.uvs_mut()[offset * 2..offset * 2 + data.len()].copy_from_slice(data);
                }
                UvSource::Untouched => {}
            }
        }

        let base = cmd.num_vertices as u16;
        let index_arena = &mut self.index_arenas[self.active_index_arena];
        math::batch_offset_indices(
            &mesh.indices,
            index_arena.slice_mut(cmd.first_index + cmd.num_indices, num_indices),
            base,
        );

        let stored = if is_clip {
            &mut self.clip_commands[cmd_idx]
        } else {
            &mut self.draw_commands[cmd_idx]
        };
        stored.num_vertices += num_vertices;
        stored.num_indices += num_indices;
    }
}
