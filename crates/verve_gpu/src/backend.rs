//! The wgpu GPU backend
//!
//! Translates the context's bind/set/submit protocol into wgpu draws.
//! Because a wgpu render pass borrows its encoder, the per-draw protocol
//! is recorded into an internal command stream during the frame and
//! executed in a single pass by [`WgpuBackend::render`].

use std::borrow::Cow;
use std::sync::Arc;

use verve_core::{
    image_flags, BufferSetId, ClipRule, GpuBackend, IndexBufferId, PaintData, PoolSlice, Program,
    StencilMode, TextureId, ViewId,
};

use crate::shaders::{
    COLOR_GRADIENT_SHADER, IMAGE_PATTERN_SHADER, STENCIL_SHADER, TEXTURED_SHADER,
};

/// Depth-stencil attachment format the pipelines are built against
pub const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// Dynamic-offset stride for the per-draw uniform blocks
const UNIFORM_STRIDE: u64 = 256;

/// Error type for backend construction
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("no suitable GPU adapter found")]
    AdapterNotFound,
    #[error("failed to request GPU device: {0}")]
    DeviceError(#[from] wgpu::RequestDeviceError),
}

/// Configuration for creating a [`WgpuBackend`]
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Color target format (None = Bgra8UnormSrgb)
    pub texture_format: Option<wgpu::TextureFormat>,
    /// Uniform blocks reserved per frame (one per submitted draw)
    pub max_draws_per_frame: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            texture_format: None,
            max_draws_per_frame: 4096,
        }
    }
}

/// Per-draw uniform block (std140-compatible layout)
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    view_proj: [f32; 16],
    /// mat3x3 with 16-byte column alignment
    paint_mat: [[f32; 4]; 3],
    params: [f32; 4],
    inner_color: [f32; 4],
    outer_color: [f32; 4],
}

fn mat3_columns(m: &[f32; 9]) -> [[f32; 4]; 3] {
    [
        [m[0], m[1], m[2], 0.0],
        [m[3], m[4], m[5], 0.0],
        [m[6], m[7], m[8], 0.0],
    ]
}

struct BufferSet {
    positions: wgpu::Buffer,
    colors: wgpu::Buffer,
    uvs: wgpu::Buffer,
}

struct IndexBuffer {
    buffer: Option<wgpu::Buffer>,
    capacity: u64,
}

struct TextureEntry {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler_flags: u32,
    width: u32,
    height: u32,
}

/// Pipeline variants per color program: one per stencil comparison
struct ProgramPipelines {
    no_stencil: wgpu::RenderPipeline,
    stencil_equal: wgpu::RenderPipeline,
    stencil_not_equal: wgpu::RenderPipeline,
}

#[derive(Clone, Copy, Default)]
struct BoundState {
    buffer_set: u32,
    first_vertex: u32,
    num_vertices: u32,
    index_buffer: u32,
    first_index: u32,
    num_indices: u32,
    scissor: [u16; 4],
    stencil_reference: u8,
    stencil_compare: StencilCompare,
    texture: Option<TextureId>,
    uniform_index: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum StencilCompare {
    #[default]
    None,
    Write,
    Equal,
    NotEqual,
}

struct DrawCall {
    program: Program,
    state: BoundState,
}

/// GPU backend over wgpu
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    color_format: wgpu::TextureFormat,

    bind_group_layout: wgpu::BindGroupLayout,
    textured: ProgramPipelines,
    gradient: ProgramPipelines,
    pattern: ProgramPipelines,
    stencil_write: wgpu::RenderPipeline,

    uniform_buffer: wgpu::Buffer,
    sampler_linear: wgpu::Sampler,
    sampler_nearest: wgpu::Sampler,
    sampler_repeat: wgpu::Sampler,
    white_texture: TextureEntry,

    buffer_sets: Vec<BufferSet>,
    index_buffers: Vec<IndexBuffer>,
    textures: Vec<Option<TextureEntry>>,

    bound: BoundState,
    draws: Vec<DrawCall>,
    uniform_blocks: Vec<u8>,
    view_proj: [f32; 16],
    max_draws: u32,
}

impl WgpuBackend {
    /// Create a backend over an existing device and queue.
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        config: RendererConfig,
    ) -> Self {
        let color_format = config
            .texture_format
            .unwrap_or(wgpu::TextureFormat::Bgra8UnormSrgb);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Verve Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<Uniforms>() as u64),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Verve Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let textured_module = create_shader(&device, "verve_textured", TEXTURED_SHADER);
        let gradient_module = create_shader(&device, "verve_gradient", COLOR_GRADIENT_SHADER);
        let pattern_module = create_shader(&device, "verve_pattern", IMAGE_PATTERN_SHADER);
        let stencil_module = create_shader(&device, "verve_stencil", STENCIL_SHADER);

        let textured = build_program_pipelines(
            &device,
            &pipeline_layout,
            &textured_module,
            color_format,
            VertexStreams::PosColorUv,
        );
        let gradient = build_program_pipelines(
            &device,
            &pipeline_layout,
            &gradient_module,
            color_format,
            VertexStreams::PosColor,
        );
        let pattern = build_program_pipelines(
            &device,
            &pipeline_layout,
            &pattern_module,
            color_format,
            VertexStreams::PosColor,
        );
        let stencil_write = build_pipeline(
            &device,
            &pipeline_layout,
            &stencil_module,
            color_format,
            VertexStreams::PosOnly,
            StencilCompare::Write,
        );

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Verve Uniforms"),
            size: UNIFORM_STRIDE * config.max_draws_per_frame as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler_linear = create_sampler(&device, wgpu::FilterMode::Linear, wgpu::AddressMode::ClampToEdge);
        let sampler_nearest = create_sampler(&device, wgpu::FilterMode::Nearest, wgpu::AddressMode::ClampToEdge);
        let sampler_repeat = create_sampler(&device, wgpu::FilterMode::Linear, wgpu::AddressMode::Repeat);

        let white_texture = create_texture_entry(&device, &queue, 1, 1, 0, Some(&[0xff; 4]));

        WgpuBackend {
            device,
            queue,
            color_format,
            bind_group_layout,
            textured,
            gradient,
            pattern,
            stencil_write,
            uniform_buffer,
            sampler_linear,
            sampler_nearest,
            sampler_repeat,
            white_texture,
            buffer_sets: Vec::new(),
            index_buffers: Vec::new(),
            textures: Vec::new(),
            bound: BoundState::default(),
            draws: Vec::new(),
            uniform_blocks: Vec::new(),
            view_proj: [0.0; 16],
            max_draws: config.max_draws_per_frame,
        }
    }

    /// Create a headless backend: instance, adapter, and device included.
    pub async fn request(config: RendererConfig) -> Result<Self, RendererError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RendererError::AdapterNotFound)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Verve GPU Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    memory_hints: wgpu::MemoryHints::MemoryUsage,
                },
                None,
            )
            .await?;

        Ok(Self::new(Arc::new(device), Arc::new(queue), config))
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    /// Execute the recorded frame into `target` and clear the stream.
    /// `depth_stencil` must be a [`DEPTH_STENCIL_FORMAT`] view matching
    /// the target size; `(width, height)` bounds the scissor rects.
    pub fn render(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        depth_stencil: &wgpu::TextureView,
        width: u32,
        height: u32,
    ) {
        if self.draws.len() as u32 > self.max_draws {
            tracing::warn!(
                "draw count {} exceeds uniform capacity {}, truncating",
                self.draws.len(),
                self.max_draws
            );
            self.draws.truncate(self.max_draws as usize);
        }
        if !self.uniform_blocks.is_empty() {
            let limit = (self.max_draws as usize * UNIFORM_STRIDE as usize)
                .min(self.uniform_blocks.len());
            self.queue
                .write_buffer(&self.uniform_buffer, 0, &self.uniform_blocks[..limit]);
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Verve Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_stencil,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0),
                    store: wgpu::StoreOp::Discard,
                }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for draw in &self.draws {
            let state = &draw.state;
            let Some(set) = self.buffer_sets.get(state.buffer_set as usize) else {
                continue;
            };
            let Some(index_buffer) = self
                .index_buffers
                .get(state.index_buffer as usize)
                .and_then(|ib| ib.buffer.as_ref())
            else {
                continue;
            };

            let pipeline = match draw.program {
                Program::Textured => self.textured.select(state.stencil_compare),
                Program::ColorGradient => self.gradient.select(state.stencil_compare),
                Program::ImagePattern => self.pattern.select(state.stencil_compare),
                Program::Stencil => &self.stencil_write,
            };
            pass.set_pipeline(pipeline);
            pass.set_stencil_reference(state.stencil_reference as u32);

            let (x, y, w, h) = clamp_scissor(state.scissor, width, height);
            if w == 0 || h == 0 {
                continue;
            }
            pass.set_scissor_rect(x, y, w, h);

            let (texture_view, sampler) = self.resolve_texture(draw.program, state.texture);
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Verve Draw Bind Group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: &self.uniform_buffer,
                            offset: 0,
                            size: wgpu::BufferSize::new(std::mem::size_of::<Uniforms>() as u64),
                        }),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(texture_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                ],
            });
            pass.set_bind_group(0, &bind_group, &[state.uniform_index * UNIFORM_STRIDE as u32]);

            pass.set_vertex_buffer(0, set.positions.slice(..));
            match draw.program {
                Program::Textured => {
                    pass.set_vertex_buffer(1, set.colors.slice(..));
                    pass.set_vertex_buffer(2, set.uvs.slice(..));
                }
                Program::ColorGradient | Program::ImagePattern => {
                    pass.set_vertex_buffer(1, set.colors.slice(..));
                }
                Program::Stencil => {}
            }
            pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(
                state.first_index..state.first_index + state.num_indices,
                state.first_vertex as i32,
                0..1,
            );
        }

        drop(pass);
        self.draws.clear();
        self.uniform_blocks.clear();
    }

    fn resolve_texture(
        &self,
        program: Program,
        texture: Option<TextureId>,
    ) -> (&wgpu::TextureView, &wgpu::Sampler) {
        let entry = texture
            .and_then(|id| self.textures.get(id.0 as usize))
            .and_then(|slot| slot.as_ref())
            .unwrap_or(&self.white_texture);

        let sampler = match program {
            Program::ImagePattern => &self.sampler_repeat,
            _ => {
                if entry.sampler_flags & image_flags::FILTER_NEAREST_UV != 0 {
                    &self.sampler_nearest
                } else {
                    &self.sampler_linear
                }
            }
        };
        (&entry.view, sampler)
    }

    fn push_uniform_block(&mut self, paint: &PaintData) -> u32 {
        let uniforms = match paint {
            PaintData::Gradient(g) => Uniforms {
                view_proj: self.view_proj,
                paint_mat: mat3_columns(&g.matrix),
                params: g.params,
                inner_color: g.inner_color,
                outer_color: g.outer_color,
            },
            PaintData::Pattern { matrix, .. } => Uniforms {
                view_proj: self.view_proj,
                paint_mat: mat3_columns(matrix),
                params: [0.0; 4],
                inner_color: [1.0; 4],
                outer_color: [1.0; 4],
            },
            PaintData::Texture { .. } | PaintData::Stencil => Uniforms {
                view_proj: self.view_proj,
                paint_mat: mat3_columns(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]),
                params: [0.0; 4],
                inner_color: [1.0; 4],
                outer_color: [1.0; 4],
            },
        };

        let index = (self.uniform_blocks.len() as u64 / UNIFORM_STRIDE) as u32;
        let mut block = [0u8; UNIFORM_STRIDE as usize];
        block[..std::mem::size_of::<Uniforms>()].copy_from_slice(bytemuck::bytes_of(&uniforms));
        self.uniform_blocks.extend_from_slice(&block);
        index
    }
}

impl GpuBackend for WgpuBackend {
    fn create_buffer_set(&mut self, max_vertices: u32) -> BufferSetId {
        let make = |label: &str, size: u64| {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let set = BufferSet {
            positions: make("Verve Positions", max_vertices as u64 * 8),
            colors: make("Verve Colors", max_vertices as u64 * 4),
            uvs: make("Verve UVs", max_vertices as u64 * 8),
        };
        self.buffer_sets.push(set);
        BufferSetId(self.buffer_sets.len() as u32 - 1)
    }

    fn update_buffer_set(
        &mut self,
        set: BufferSetId,
        positions: PoolSlice<f32>,
        colors: PoolSlice<u32>,
        uvs: PoolSlice<f32>,
        num_vertices: u32,
    ) {
        let Some(buffers) = self.buffer_sets.get(set.0 as usize) else {
            return;
        };
        let n = num_vertices as usize;
        self.queue.write_buffer(
            &buffers.positions,
            0,
            bytemuck::cast_slice(&positions[..n * 2]),
        );
        self.queue
            .write_buffer(&buffers.colors, 0, bytemuck::cast_slice(&colors[..n]));
        self.queue
            .write_buffer(&buffers.uvs, 0, bytemuck::cast_slice(&uvs[..n * 2]));
        // write_buffer copies immediately; dropping the slices returns
        // the chunks to the context's pools.
    }

    fn create_index_buffer(&mut self) -> IndexBufferId {
        self.index_buffers.push(IndexBuffer {
            buffer: None,
            capacity: 0,
        });
        IndexBufferId(self.index_buffers.len() as u32 - 1)
    }

    fn update_index_buffer(&mut self, buffer: IndexBufferId, indices: &[u16]) {
        let Some(entry) = self.index_buffers.get_mut(buffer.0 as usize) else {
            return;
        };
        let needed = (indices.len() * 2) as u64;
        if entry.buffer.is_none() || entry.capacity < needed {
            entry.capacity = needed.next_power_of_two().max(1024);
            entry.buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Verve Indices"),
                size: entry.capacity,
                usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
        if let Some(gpu_buffer) = &entry.buffer {
            self.queue
                .write_buffer(gpu_buffer, 0, bytemuck::cast_slice(indices));
        }
    }

    fn create_texture(
        &mut self,
        width: u16,
        height: u16,
        sampler_flags: u32,
        data: Option<&[u8]>,
    ) -> TextureId {
        let entry = create_texture_entry(
            &self.device,
            &self.queue,
            width as u32,
            height as u32,
            sampler_flags,
            data,
        );

        for (i, slot) in self.textures.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(entry);
                return TextureId(i as u16);
            }
        }
        self.textures.push(Some(entry));
        TextureId(self.textures.len() as u16 - 1)
    }

    fn update_texture(&mut self, texture: TextureId, x: u16, y: u16, w: u16, h: u16, data: &[u8]) {
        let Some(entry) = self
            .textures
            .get(texture.0 as usize)
            .and_then(|slot| slot.as_ref())
        else {
            return;
        };
        write_texture_region(
            &self.queue,
            &entry.texture,
            x as u32,
            y as u32,
            (w as u32).min(entry.width.saturating_sub(x as u32)),
            (h as u32).min(entry.height.saturating_sub(y as u32)),
            data,
        );
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if let Some(slot) = self.textures.get_mut(texture.0 as usize) {
            *slot = None;
        }
    }

    fn set_view_transform(&mut self, _view: ViewId, proj: [f32; 16]) {
        self.view_proj = proj;
    }

    fn set_vertex_slice(&mut self, set: BufferSetId, first_vertex: u32, num_vertices: u32) {
        self.bound.buffer_set = set.0;
        self.bound.first_vertex = first_vertex;
        self.bound.num_vertices = num_vertices;
    }

    fn set_index_slice(&mut self, buffer: IndexBufferId, first_index: u32, num_indices: u32) {
        self.bound.index_buffer = buffer.0;
        self.bound.first_index = first_index;
        self.bound.num_indices = num_indices;
    }

    fn set_scissor(&mut self, x: u16, y: u16, w: u16, h: u16) {
        self.bound.scissor = [x, y, w, h];
    }

    fn set_stencil(&mut self, mode: StencilMode) {
        match mode {
            StencilMode::None => {
                self.bound.stencil_compare = StencilCompare::None;
                self.bound.stencil_reference = 0;
            }
            StencilMode::Write { reference } => {
                self.bound.stencil_compare = StencilCompare::Write;
                self.bound.stencil_reference = reference;
            }
            StencilMode::Test { reference, rule } => {
                self.bound.stencil_compare = match rule {
                    ClipRule::In => StencilCompare::Equal,
                    ClipRule::NotIn => StencilCompare::NotEqual,
                };
                self.bound.stencil_reference = reference;
            }
        }
    }

    fn set_paint(&mut self, paint: PaintData) {
        self.bound.texture = match paint {
            PaintData::Texture { texture, .. } | PaintData::Pattern { texture, .. } => {
                Some(texture)
            }
            _ => None,
        };
        self.bound.uniform_index = self.push_uniform_block(&paint);
    }

    fn submit(&mut self, _view: ViewId, program: Program) {
        self.draws.push(DrawCall {
            program,
            state: self.bound,
        });
    }
}

impl ProgramPipelines {
    fn select(&self, compare: StencilCompare) -> &wgpu::RenderPipeline {
        match compare {
            StencilCompare::Equal => &self.stencil_equal,
            StencilCompare::NotEqual => &self.stencil_not_equal,
            _ => &self.no_stencil,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VertexStreams {
    PosOnly,
    PosColor,
    PosColorUv,
}

fn create_shader(device: &wgpu::Device, label: &str, source: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
    })
}

fn create_sampler(
    device: &wgpu::Device,
    filter: wgpu::FilterMode,
    address_mode: wgpu::AddressMode,
) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Verve Sampler"),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

fn build_program_pipelines(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    color_format: wgpu::TextureFormat,
    streams: VertexStreams,
) -> ProgramPipelines {
    ProgramPipelines {
        no_stencil: build_pipeline(device, layout, module, color_format, streams, StencilCompare::None),
        stencil_equal: build_pipeline(
            device,
            layout,
            module,
            color_format,
            streams,
            StencilCompare::Equal,
        ),
        stencil_not_equal: build_pipeline(
            device,
            layout,
            module,
            color_format,
            streams,
            StencilCompare::NotEqual,
        ),
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    color_format: wgpu::TextureFormat,
    streams: VertexStreams,
    stencil: StencilCompare,
) -> wgpu::RenderPipeline {
    let position_layout = wgpu::VertexBufferLayout {
        array_stride: 8,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: 0,
        }],
    };
    let color_layout = wgpu::VertexBufferLayout {
        array_stride: 4,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Unorm8x4,
            offset: 0,
            shader_location: 1,
        }],
    };
    let uv_layout = wgpu::VertexBufferLayout {
        array_stride: 8,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: 2,
        }],
    };

    let buffers: Vec<wgpu::VertexBufferLayout> = match streams {
        VertexStreams::PosOnly => vec![position_layout],
        VertexStreams::PosColor => vec![position_layout, color_layout],
        VertexStreams::PosColorUv => vec![position_layout, color_layout, uv_layout],
    };

    let (stencil_face, write_mask, color_writes) = match stencil {
        StencilCompare::None => (
            wgpu::StencilFaceState {
                compare: wgpu::CompareFunction::Always,
                fail_op: wgpu::StencilOperation::Keep,
                depth_fail_op: wgpu::StencilOperation::Keep,
                pass_op: wgpu::StencilOperation::Keep,
            },
            0x00,
            wgpu::ColorWrites::ALL,
        ),
        StencilCompare::Write => (
            wgpu::StencilFaceState {
                compare: wgpu::CompareFunction::Always,
                fail_op: wgpu::StencilOperation::Replace,
                depth_fail_op: wgpu::StencilOperation::Replace,
                pass_op: wgpu::StencilOperation::Replace,
            },
            0xff,
            wgpu::ColorWrites::empty(),
        ),
        StencilCompare::Equal => (
            wgpu::StencilFaceState {
                compare: wgpu::CompareFunction::Equal,
                fail_op: wgpu::StencilOperation::Keep,
                depth_fail_op: wgpu::StencilOperation::Keep,
                pass_op: wgpu::StencilOperation::Keep,
            },
            0x00,
            wgpu::ColorWrites::ALL,
        ),
        StencilCompare::NotEqual => (
            wgpu::StencilFaceState {
                compare: wgpu::CompareFunction::NotEqual,
                fail_op: wgpu::StencilOperation::Keep,
                depth_fail_op: wgpu::StencilOperation::Keep,
                pass_op: wgpu::StencilOperation::Keep,
            },
            0x00,
            wgpu::ColorWrites::ALL,
        ),
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Verve Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &buffers,
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState {
                    color: wgpu::BlendComponent {
                        src_factor: wgpu::BlendFactor::SrcAlpha,
                        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                        operation: wgpu::BlendOperation::Add,
                    },
                    alpha: wgpu::BlendComponent {
                        src_factor: wgpu::BlendFactor::One,
                        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                        operation: wgpu::BlendOperation::Add,
                    },
                }),
                write_mask: color_writes,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_STENCIL_FORMAT,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
            stencil: wgpu::StencilState {
                front: stencil_face,
                back: stencil_face,
                read_mask: 0xff,
                write_mask,
            },
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn create_texture_entry(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
    sampler_flags: u32,
    data: Option<&[u8]>,
) -> TextureEntry {
    let max_dim = device.limits().max_texture_dimension_2d;
    let width = width.clamp(1, max_dim);
    let height = height.clamp(1, max_dim);

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Verve Image"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    if let Some(pixels) = data {
        write_texture_region(queue, &texture, 0, 0, width, height, pixels);
    }

    TextureEntry {
        texture,
        view,
        sampler_flags,
        width,
        height,
    }
}

/// Upload tightly packed RGBA8 pixels into a texture sub-rect, padding
/// rows to wgpu's copy alignment as needed.
fn write_texture_region(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    pixels: &[u8],
) {
    if width == 0 || height == 0 {
        return;
    }
    let row_bytes = width as usize * 4;
    let required = row_bytes * height as usize;
    if pixels.len() < required {
        return;
    }

    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
    let padded_row_bytes = (row_bytes + align - 1) / align * align;

    let data: Cow<'_, [u8]> = if padded_row_bytes == row_bytes {
        Cow::Borrowed(&pixels[..required])
    } else {
        let mut padded = vec![0u8; padded_row_bytes * height as usize];
        for row in 0..height as usize {
            let src = row * row_bytes;
            let dst = row * padded_row_bytes;
            padded[dst..dst + row_bytes].copy_from_slice(&pixels[src..src + row_bytes]);
        }
        Cow::Owned(padded)
    };

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x, y, z: 0 },
            aspect: wgpu::TextureAspect::All,
        },
        &data,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(padded_row_bytes as u32),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

fn clamp_scissor(scissor: [u16; 4], width: u32, height: u32) -> (u32, u32, u32, u32) {
    let x = (scissor[0] as u32).min(width);
    let y = (scissor[1] as u32).min(height);
    let w = (scissor[2] as u32).min(width - x);
    let h = (scissor[3] as u32).min(height - y);
    (x, y, w, h)
}
