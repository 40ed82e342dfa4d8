//! Shape cache
//!
//! A cacheable command list memoizes the meshes its stroker commands
//! produce, stored in object space through the inverse of the transform
//! active at record time and keyed by the list's average scale. Replay
//! at the same scale skips path construction and tessellation entirely,
//! batch-transforming the cached positions through the current
//! transform instead.

use verve_core::{math, Affine2D, Color, GradientHandle, ImagePatternHandle};
use verve_path::Mesh;

use crate::cmdlist::{CmdReader, CommandType, CL_HEADER_SIZE};
use crate::context::Context;
use crate::player::HandleReloc;

/// One stroker command's worth of cached meshes
#[derive(Clone, Debug)]
pub(crate) struct CachedCommand {
    pub first_mesh: u16,
    pub num_meshes: u16,
    /// Maps record-time screen space back to object space
    pub inv_transform: Affine2D,
}

/// One memoized mesh. `colors` is `None` for uniform-color meshes; the
/// replay-time paint color applies instead.
#[derive(Clone, Debug)]
pub(crate) struct CachedMesh {
    pub positions: Vec<f32>,
    pub colors: Option<Vec<u32>>,
    pub indices: Vec<u16>,
}

/// Memoized meshes of one command list
pub(crate) struct CommandListCache {
    pub commands: Vec<CachedCommand>,
    pub meshes: Vec<CachedMesh>,
    /// Valid only while the context's average scale matches
    pub avg_scale: f32,
}

impl Default for CommandListCache {
    fn default() -> Self {
        CommandListCache {
            commands: Vec::new(),
            meshes: Vec::new(),
            avg_scale: f32::NAN,
        }
    }
}

impl CommandListCache {
    pub fn reset(&mut self) {
        self.commands.clear();
        self.meshes.clear();
        self.avg_scale = f32::NAN;
    }
}

impl Context {
    /// Whether a bound cache is currently recording (top of the cache
    /// stack during command-list submission)
    pub(crate) fn has_active_cache(&self) -> bool {
        self.cache_stack
            .last()
            .map(|cache| cache.is_some())
            .unwrap_or(false)
    }

    /// Open a cached command capturing the inverse of the current
    /// transform; every mesh until `end_cached_command` belongs to it.
    pub(crate) fn begin_cached_command(&mut self) {
        let inv_transform = self.state().transform.inverse();
        let cache = self
            .cache_stack
            .last_mut()
            .and_then(|c| c.as_mut())
            .expect("no cache bound");
        let first_mesh = cache.meshes.len() as u16;
        cache.commands.push(CachedCommand {
            first_mesh,
            num_meshes: 0,
            inv_transform,
        });
    }

    pub(crate) fn end_cached_command(&mut self) {
        let cache = self
            .cache_stack
            .last_mut()
            .and_then(|c| c.as_mut())
            .expect("no cache bound");
        let num_meshes = cache.meshes.len() as u16;
        let last = cache
            .commands
            .last_mut()
            .expect("begin_cached_command() missing");
        last.num_meshes = num_meshes - last.first_mesh;
    }

    /// Store a produced mesh in object space.
    pub(crate) fn add_cached_command(&mut self, mesh: &Mesh) {
        let cache = self
            .cache_stack
            .last_mut()
            .and_then(|c| c.as_mut())
            .expect("no cache bound");
        let inv = cache
            .commands
            .last()
            .expect("begin_cached_command() missing")
            .inv_transform;

        let mut positions = vec![0.0f32; mesh.positions.len()];
        math::batch_transform_positions(&mesh.positions, &mut positions, &inv);

        let colors = if mesh.colors.len() == mesh.num_vertices() as usize {
            Some(mesh.colors.clone())
        } else {
            None
        };

        cache.meshes.push(CachedMesh {
            positions,
            colors,
            indices: mesh.indices.clone(),
        });
    }

    // ── Cached replay ────────────────────────────────────────────────

    /// Replay a command list from its cache: path commands contribute
    /// nothing and are skipped, stroker commands re-emit the memoized
    /// meshes, and state/paint/clip/text commands execute normally. The
    /// cached-command cursor advances even for culled stroker commands.
    pub(crate) fn cl_cache_render(
        &mut self,
        buffer: &[u8],
        strings: &[u8],
        cache: &CommandListCache,
        flags: u32,
        reloc: HandleReloc,
    ) {
        let cull_cmds = (flags & crate::cmdlist::cmd_list_flags::ALLOW_COMMAND_CULLING) != 0;
        let preserve_state = self.config.preserve_state_on_submit;

        if preserve_state {
            self.push_state();
        }

        let mut next_cached_command = 0usize;
        let mut skip_cmds = false;
        let mut pos = 0usize;

        while pos + CL_HEADER_SIZE <= buffer.len() {
            let mut header = CmdReader::new(buffer, pos);
            let raw_type = header.read_u32();
            let size = header.read_u32() as usize;
            let next = pos + CL_HEADER_SIZE + size;

            let cmd_type = match CommandType::from_u32(raw_type) {
                Some(t) => t,
                None => {
                    debug_assert!(false, "unknown command in list");
                    break;
                }
            };

            if cmd_type.is_path_command() {
                pos = next;
                continue;
            }
            if skip_cmds && cmd_type.is_stroker_command() {
                next_cached_command += 1;
                pos = next;
                continue;
            }

            let mut r = CmdReader::new(buffer, pos + CL_HEADER_SIZE);
            match cmd_type {
                CommandType::FillPathColor => {
                    let _flags = r.read_u32();
                    let color = r.read_color();
                    self.submit_cached_color(cache, next_cached_command, color);
                    next_cached_command += 1;
                }
                CommandType::FillPathGradient => {
                    let _flags = r.read_u32();
                    let idx = r.read_u16();
                    let hflags = r.read_u16();
                    let gradient = reloc.gradient(idx, hflags);
                    self.submit_cached_gradient(cache, next_cached_command, gradient);
                    next_cached_command += 1;
                }
                CommandType::FillPathImagePattern => {
                    let _flags = r.read_u32();
                    let color = r.read_color();
                    let idx = r.read_u16();
                    let hflags = r.read_u16();
                    let pattern = reloc.pattern(idx, hflags);
                    self.submit_cached_pattern(cache, next_cached_command, pattern, color);
                    next_cached_command += 1;
                }
                CommandType::StrokePathColor => {
                    let _width = r.read_f32();
                    let _flags = r.read_u32();
                    let color = r.read_color();
                    self.submit_cached_color(cache, next_cached_command, color);
                    next_cached_command += 1;
                }
                CommandType::StrokePathGradient => {
                    let _width = r.read_f32();
                    let _flags = r.read_u32();
                    let idx = r.read_u16();
                    let hflags = r.read_u16();
                    let gradient = reloc.gradient(idx, hflags);
                    self.submit_cached_gradient(cache, next_cached_command, gradient);
                    next_cached_command += 1;
                }
                CommandType::StrokePathImagePattern => {
                    let _width = r.read_f32();
                    let _flags = r.read_u32();
                    let color = r.read_color();
                    let idx = r.read_u16();
                    let hflags = r.read_u16();
                    let pattern = reloc.pattern(idx, hflags);
                    self.submit_cached_pattern(cache, next_cached_command, pattern, color);
                    next_cached_command += 1;
                }
                other => {
                    self.dispatch_state_command(other, &mut r, strings, reloc, cull_cmds, &mut skip_cmds);
                }
            }

            pos = next;
        }

        if preserve_state {
            self.pop_state();
            self.reset_clip();
        }
    }

    fn cached_meshes<'a>(
        &self,
        cache: &'a CommandListCache,
        command: usize,
    ) -> &'a [CachedMesh] {
        let Some(cmd) = cache.commands.get(command) else {
            return &[];
        };
        let first = cmd.first_mesh as usize;
        &cache.meshes[first..first + cmd.num_meshes as usize]
    }

    fn submit_cached_color(&mut self, cache: &CommandListCache, command: usize, color: Color) {
        let record_clip = self.record_clip_commands;
        let transform = self.state().transform;
        let meshes = self.cached_meshes(cache, command);

        for cached in meshes {
            let mesh = forward_transform(cached, &transform);
            if record_clip {
                self.emit_clip(&mesh);
            } else {
                self.emit_vertex_color(&mesh, color.packed());
            }
        }
    }

    fn submit_cached_gradient(
        &mut self,
        cache: &CommandListCache,
        command: usize,
        gradient: GradientHandle,
    ) {
        debug_assert!(!self.record_clip_commands, "gradients cannot define clip shapes");
        debug_assert!(gradient.is_valid() && !gradient.is_local());
        if self.record_clip_commands || !gradient.is_valid() {
            return;
        }

        let transform = self.state().transform;
        let meshes = self.cached_meshes(cache, command);
        for cached in meshes {
            let mesh = forward_transform(cached, &transform);
            self.emit_gradient(gradient.idx, &mesh, Color::BLACK.packed());
        }
    }

    fn submit_cached_pattern(
        &mut self,
        cache: &CommandListCache,
        command: usize,
        pattern: ImagePatternHandle,
        color: Color,
    ) {
        debug_assert!(!self.record_clip_commands, "patterns cannot define clip shapes");
        debug_assert!(pattern.is_valid() && !pattern.is_local());
        if self.record_clip_commands || !pattern.is_valid() {
            return;
        }

        let transform = self.state().transform;
        let meshes = self.cached_meshes(cache, command);
        for cached in meshes {
            let mesh = forward_transform(cached, &transform);
            self.emit_image_pattern(pattern.idx, &mesh, color.packed());
        }
    }
}

/// Bring a cached object-space mesh back to screen space
fn forward_transform(cached: &CachedMesh, transform: &Affine2D) -> Mesh {
    let mut positions = vec![0.0f32; cached.positions.len()];
    math::batch_transform_positions(&cached.positions, &mut positions, transform);
    Mesh {
        positions,
        colors: cached.colors.clone().unwrap_or_default(),
        indices: cached.indices.clone(),
    }
}
