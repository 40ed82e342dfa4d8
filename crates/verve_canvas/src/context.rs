//! The drawing context and frame orchestrator

use verve_core::{
    BufferSetId, ChunkPool, ContextConfig, CoreError, FontSystem, GpuBackend, GradientUniforms,
    HandleAlloc, ImageHandle, IndexBufferId, PaintData, Program, StencilMode, ViewId,
};
use verve_path::{Path, Stroker};

use crate::arena::{IndexArena, VertexArena};
use crate::batch::{ClipCmdState, DrawCommand, DrawCommandType};
use crate::cache::CommandListCache;
use crate::cmdlist::CommandList;
use crate::image::Image;
use crate::paint::ImagePattern;
use crate::state::DrawingState;
use crate::stats::Stats;

/// Immediate-mode drawing context.
///
/// Owns every arena, pool, handle table, and collaborator. All public
/// drawing calls execute on the owning thread; only the buffer pools are
/// shared with the GPU backend (release may happen on a submission
/// worker).
pub struct Context {
    pub(crate) config: ContextConfig,
    pub(crate) stats: Stats,
    pub(crate) backend: Box<dyn GpuBackend>,
    pub(crate) font_system: Box<dyn FontSystem>,

    // Per-frame parameters
    pub(crate) view_id: ViewId,
    pub(crate) canvas_width: u16,
    pub(crate) canvas_height: u16,
    pub(crate) device_pixel_ratio: f32,
    pub(crate) tess_tolerance: f32,
    pub(crate) fringe_width: f32,

    // Path / stroker collaborators
    pub(crate) path: Path,
    pub(crate) stroker: Stroker,
    pub(crate) path_transformed: bool,
    pub(crate) transformed_vertices: Vec<f32>,

    // Vertex / index arenas
    pub(crate) pos_pool: ChunkPool<f32>,
    pub(crate) color_pool: ChunkPool<u32>,
    pub(crate) uv_pool: ChunkPool<f32>,
    pub(crate) vertex_arenas: Vec<VertexArena>,
    pub(crate) gpu_buffer_sets: Vec<BufferSetId>,
    pub(crate) first_vertex_arena: usize,
    pub(crate) index_arenas: Vec<IndexArena>,
    pub(crate) gpu_index_buffers: Vec<IndexBufferId>,
    pub(crate) active_index_arena: usize,

    // Batched command streams
    pub(crate) draw_commands: Vec<DrawCommand>,
    pub(crate) clip_commands: Vec<DrawCommand>,
    pub(crate) clip_state: ClipCmdState,
    pub(crate) record_clip_commands: bool,
    pub(crate) force_new_draw_command: bool,
    pub(crate) force_new_clip_command: bool,

    // Drawing state stack; the last entry is the active state
    pub(crate) state_stack: Vec<DrawingState>,

    // Per-frame paints
    pub(crate) gradients: Vec<GradientUniforms>,
    pub(crate) next_gradient_id: u32,
    pub(crate) image_patterns: Vec<ImagePattern>,
    pub(crate) next_image_pattern_id: u32,

    // Images
    pub(crate) images: Vec<Image>,
    pub(crate) image_handles: HandleAlloc,
    pub(crate) font_atlas_image: ImageHandle,

    // Command lists
    pub(crate) cmd_lists: Vec<CommandList>,
    pub(crate) cmd_list_handles: HandleAlloc,
    pub(crate) submit_depth: u32,
    pub(crate) cache_stack: Vec<Option<CommandListCache>>,
}

impl Context {
    /// Create a context over the given GPU backend and font system.
    pub fn new(
        backend: Box<dyn GpuBackend>,
        font_system: Box<dyn FontSystem>,
        config: ContextConfig,
    ) -> Result<Self, CoreError> {
        if config.max_vb_vertices == 0 {
            return Err(CoreError::VertexArenaEmpty);
        }
        if config.max_vb_vertices > 65536 {
            return Err(CoreError::VertexArenaTooLarge(config.max_vb_vertices));
        }
        if config.max_state_stack_size < 2 {
            return Err(CoreError::StateStackTooSmall);
        }

        let max_vertices = config.max_vb_vertices as usize;
        let mut ctx = Context {
            stats: Stats::default(),
            view_id: 0,
            canvas_width: 0,
            canvas_height: 0,
            device_pixel_ratio: 1.0,
            tess_tolerance: 0.25,
            fringe_width: 1.0,
            path: Path::new(),
            stroker: Stroker::new(),
            path_transformed: false,
            transformed_vertices: Vec::new(),
            pos_pool: ChunkPool::new(max_vertices * 2),
            color_pool: ChunkPool::new(max_vertices),
            uv_pool: ChunkPool::new(max_vertices * 2),
            vertex_arenas: Vec::new(),
            gpu_buffer_sets: Vec::new(),
            first_vertex_arena: 0,
            index_arenas: Vec::new(),
            gpu_index_buffers: Vec::new(),
            active_index_arena: 0,
            draw_commands: Vec::new(),
            clip_commands: Vec::new(),
            clip_state: ClipCmdState::none(),
            record_clip_commands: false,
            force_new_draw_command: true,
            force_new_clip_command: true,
            state_stack: vec![DrawingState::default()],
            gradients: vec![GradientUniforms::default(); config.max_gradients as usize],
            next_gradient_id: 0,
            image_patterns: vec![ImagePattern::default(); config.max_image_patterns as usize],
            next_image_pattern_id: 0,
            images: Vec::new(),
            image_handles: HandleAlloc::new(config.max_images),
            font_atlas_image: ImageHandle::INVALID,
            cmd_lists: Vec::new(),
            cmd_list_handles: HandleAlloc::new(config.max_command_lists),
            submit_depth: 0,
            cache_stack: Vec::new(),
            backend,
            font_system,
            config,
        };

        // The atlas image backs every solid-color draw (white pixel UV),
        // so it exists from the start.
        let (aw, ah) = ctx.font_system.atlas_size();
        ctx.font_atlas_image =
            ctx.create_image_internal(aw, ah, ctx.config.font_atlas_image_flags, None, true);

        Ok(ctx)
    }

    /// Begin a frame. The state stack must be balanced from the previous
    /// frame.
    pub fn begin(
        &mut self,
        view_id: ViewId,
        canvas_width: u16,
        canvas_height: u16,
        device_pixel_ratio: f32,
    ) {
        debug_assert_eq!(
            self.state_stack.len(),
            1,
            "state stack was not unwound before begin()"
        );
        debug_assert!(
            !self.record_clip_commands,
            "begin_clip()/end_clip() pair left open"
        );

        self.view_id = view_id;
        self.canvas_width = canvas_width;
        self.canvas_height = canvas_height;
        self.device_pixel_ratio = device_pixel_ratio;
        self.tess_tolerance = 0.25 / device_pixel_ratio;
        self.fringe_width = 1.0 / device_pixel_ratio;
        self.submit_depth = 0;
        self.cache_stack.clear();

        self.reset_scissor();
        self.transform_identity();

        self.first_vertex_arena = self.vertex_arenas.len();
        self.alloc_vertex_arena();
        self.active_index_arena = self.alloc_index_arena();

        self.draw_commands.clear();
        self.force_new_draw_command = true;

        self.clip_commands.clear();
        self.force_new_clip_command = true;
        self.clip_state = ClipCmdState::none();
        self.record_clip_commands = false;

        self.next_gradient_id = 0;
        self.next_image_pattern_id = 0;
    }

    /// End the frame: upload arenas, then walk the batched draw commands
    /// into the backend in order with correct clip-plane transitions.
    pub fn end(&mut self) {
        debug_assert_eq!(self.state_stack.len(), 1, "push_state()/pop_state() mismatch");
        debug_assert!(!self.record_clip_commands, "end_clip() missing before end()");

        if self.draw_commands.is_empty() {
            // Return the unused arena chunks straight to their pools.
            if let Some(arena) = self.vertex_arenas.get_mut(self.first_vertex_arena) {
                arena.release();
            }
            return;
        }

        self.flush_font_atlas();

        // Upload every arena used this frame.
        for i in self.first_vertex_arena..self.vertex_arenas.len() {
            while self.gpu_buffer_sets.len() <= i {
                let set = self.backend.create_buffer_set(self.config.max_vb_vertices);
                self.gpu_buffer_sets.push(set);
            }
            let arena = &mut self.vertex_arenas[i];
            let count = arena.count;
            let (pos, color, uv) = arena.take_chunks();
            self.backend
                .update_buffer_set(self.gpu_buffer_sets[i], pos, color, uv, count);
        }

        // Upload the active index arena.
        while self.gpu_index_buffers.len() <= self.active_index_arena {
            let ib = self.backend.create_index_buffer();
            self.gpu_index_buffers.push(ib);
        }
        let ib_id = self.gpu_index_buffers[self.active_index_arena];
        let index_arena = &self.index_arenas[self.active_index_arena];
        self.backend
            .update_index_buffer(ib_id, index_arena.used());

        self.backend.set_view_transform(
            self.view_id,
            ortho_projection(self.canvas_width as f32, self.canvas_height as f32),
        );

        self.render_commands(ib_id);
    }

    /// Per-frame housekeeping: recycle arena bookkeeping and pulse the
    /// font system. Pool memory itself returns when the backend drops
    /// its `PoolSlice`s.
    pub fn frame(&mut self) {
        self.vertex_arenas.clear();
        self.first_vertex_arena = 0;
        for arena in &mut self.index_arenas {
            arena.reset();
        }
        self.stats.draw_commands = 0;
        self.stats.clip_commands = 0;
        self.stats.vertex_arenas = 0;
        self.font_system.frame();
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// The image handle of the font atlas; solid fills sample its white
    /// pixel.
    pub fn font_atlas_image(&self) -> ImageHandle {
        self.font_atlas_image
    }

    fn flush_font_atlas(&mut self) {
        if let Some(update) = self.font_system.flush_atlas() {
            let img = self.font_atlas_image;
            let resized = self
                .image(img)
                .map(|i| i.width != update.width || i.height != update.height)
                .unwrap_or(true);
            if resized {
                self.realloc_image(img, update.width, update.height);
            }
            self.update_image(img, 0, 0, update.width, update.height, &update.pixels);
        }
    }

    /// Walk `draw_commands` in order, stamping clip ranges into the
    /// stencil plane on clip transitions.
    fn render_commands(&mut self, ib_id: IndexBufferId) {
        let view_id = self.view_id;
        let dpr = self.device_pixel_ratio;

        let mut prev_scissor = [0u16, 0, self.canvas_width, self.canvas_height];
        let mut scissor_bound = false;
        let mut prev_clip_first = u32::MAX - 1;
        let mut stencil = StencilMode::None;
        let mut next_stencil_value: u8 = 1;

        for cmd_idx in 0..self.draw_commands.len() {
            let cmd = self.draw_commands[cmd_idx];

            if cmd.clip.first_cmd != prev_clip_first {
                prev_clip_first = cmd.clip.first_cmd;
                if cmd.clip.num_cmds != 0 {
                    for i in 0..cmd.clip.num_cmds {
                        let clip_cmd = self.clip_commands[(cmd.clip.first_cmd + i) as usize];
                        debug_assert_eq!(clip_cmd.kind, DrawCommandType::Clip);

                        self.backend.set_vertex_slice(
                            self.gpu_buffer_sets[clip_cmd.arena_id as usize],
                            clip_cmd.first_vertex,
                            clip_cmd.num_vertices,
                        );
                        self.backend
                            .set_index_slice(ib_id, clip_cmd.first_index, clip_cmd.num_indices);
                        bind_scissor(
                            self.backend.as_mut(),
                            &clip_cmd.scissor,
                            dpr,
                            &mut prev_scissor,
                            &mut scissor_bound,
                        );
                        self.backend.set_stencil(StencilMode::Write {
                            reference: next_stencil_value,
                        });
                        self.backend.set_paint(PaintData::Stencil);
                        self.backend.submit(view_id, Program::Stencil);
                    }

                    stencil = StencilMode::Test {
                        reference: next_stencil_value,
                        rule: cmd.clip.rule,
                    };
                    // The stencil plane is 8 bits and never cleared
                    // mid-frame; more than 254 clip transitions per
                    // frame is unsupported.
                    next_stencil_value = next_stencil_value.wrapping_add(1);
                } else {
                    stencil = StencilMode::None;
                }
            }

            self.backend.set_vertex_slice(
                self.gpu_buffer_sets[cmd.arena_id as usize],
                cmd.first_vertex,
                cmd.num_vertices,
            );
            self.backend
                .set_index_slice(ib_id, cmd.first_index, cmd.num_indices);
            bind_scissor(
                self.backend.as_mut(),
                &cmd.scissor,
                dpr,
                &mut prev_scissor,
                &mut scissor_bound,
            );

            let program = match cmd.kind {
                DrawCommandType::Textured => {
                    let image = &self.images[cmd.handle as usize];
                    self.backend.set_paint(PaintData::Texture {
                        texture: image.texture,
                        sampler_flags: image.sampler_flags,
                    });
                    Program::Textured
                }
                DrawCommandType::ColorGradient => {
                    let gradient = self.gradients[cmd.handle as usize];
                    self.backend.set_paint(PaintData::Gradient(gradient));
                    Program::ColorGradient
                }
                DrawCommandType::ImagePattern => {
                    let pattern = &self.image_patterns[cmd.handle as usize];
                    let image = &self.images[pattern.image.idx as usize];
                    self.backend.set_paint(PaintData::Pattern {
                        matrix: pattern.matrix,
                        texture: image.texture,
                        sampler_flags: image.sampler_flags,
                    });
                    Program::ImagePattern
                }
                DrawCommandType::Clip => {
                    debug_assert!(false, "clip commands never enter the draw stream");
                    continue;
                }
            };

            self.backend.set_stencil(stencil);
            self.backend.submit(view_id, program);
        }
    }
}

/// Rebind the scissor only when it changes between submissions
fn bind_scissor(
    backend: &mut dyn GpuBackend,
    scissor: &[u16; 4],
    dpr: f32,
    prev: &mut [u16; 4],
    bound: &mut bool,
) {
    if *bound && scissor == prev {
        return;
    }
    backend.set_scissor(
        (scissor[0] as f32 * dpr) as u16,
        (scissor[1] as f32 * dpr) as u16,
        (scissor[2] as f32 * dpr) as u16,
        (scissor[3] as f32 * dpr) as u16,
    );
    *prev = *scissor;
    *bound = true;
}

/// Column-major orthographic projection mapping the canvas rect to clip
/// space with y down.
fn ortho_projection(width: f32, height: f32) -> [f32; 16] {
    let mut m = [0.0f32; 16];
    m[0] = 2.0 / width;
    m[5] = -2.0 / height;
    m[10] = -1.0;
    m[12] = -1.0;
    m[13] = 1.0;
    m[15] = 1.0;
    m
}
