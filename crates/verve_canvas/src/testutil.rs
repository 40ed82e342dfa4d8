//! Headless test support
//!
//! [`RecordingBackend`] logs every GPU backend call so tests can assert
//! on the exact submission stream; [`FixedFontSystem`] shapes text with
//! fixed-metric synthetic glyphs so no font files are needed. Both run
//! entirely on the CPU.

use std::sync::{Arc, Mutex};

use verve_core::{
    AtlasUpdate, BufferSetId, FontHandle, FontSystem, GpuBackend, IndexBufferId, PaintData,
    PoolSlice, Program, StencilMode, TextConfig, TextMesh, TextQuad, TextRow, TextureId, ViewId,
};

/// One submitted draw with the state bound at submission time
#[derive(Clone, Debug)]
pub struct Submission {
    pub view: ViewId,
    pub program: Program,
    pub buffer_set: BufferSetId,
    pub first_vertex: u32,
    pub num_vertices: u32,
    pub first_index: u32,
    pub num_indices: u32,
    pub scissor: [u16; 4],
    pub stencil: StencilMode,
    pub paint: Option<PaintData>,
}

/// Everything a frame pushed into the backend
#[derive(Default)]
pub struct BackendLog {
    pub submissions: Vec<Submission>,
    /// `(buffer_set, num_vertices)` per arena upload
    pub vertex_uploads: Vec<(BufferSetId, u32)>,
    /// Used portion of the position stream per arena upload
    pub vertex_positions: Vec<(BufferSetId, Vec<f32>)>,
    /// Used portion of the color stream per arena upload
    pub vertex_colors: Vec<(BufferSetId, Vec<u32>)>,
    /// Uploaded index data per index buffer
    pub index_uploads: Vec<(IndexBufferId, Vec<u16>)>,
    pub textures_created: u32,
    pub textures_updated: u32,
    pub textures_destroyed: u32,
    pub view_transforms: Vec<ViewId>,
}

impl BackendLog {
    /// Drop everything recorded so far (e.g. between frames)
    pub fn clear(&mut self) {
        self.submissions.clear();
        self.vertex_uploads.clear();
        self.vertex_positions.clear();
        self.vertex_colors.clear();
        self.index_uploads.clear();
        self.view_transforms.clear();
    }
}

#[derive(Clone, Copy, Debug)]
struct BoundState {
    buffer_set: BufferSetId,
    first_vertex: u32,
    num_vertices: u32,
    index_buffer: IndexBufferId,
    first_index: u32,
    num_indices: u32,
    scissor: [u16; 4],
    stencil: StencilMode,
    paint: Option<PaintData>,
}

impl Default for BoundState {
    fn default() -> Self {
        BoundState {
            buffer_set: BufferSetId(0),
            first_vertex: 0,
            num_vertices: 0,
            index_buffer: IndexBufferId(0),
            first_index: 0,
            num_indices: 0,
            scissor: [0; 4],
            stencil: StencilMode::None,
            paint: None,
        }
    }
}

/// GPU backend that records calls instead of rendering
pub struct RecordingBackend {
    log: Arc<Mutex<BackendLog>>,
    state: BoundState,
    next_buffer_set: u32,
    next_index_buffer: u32,
    next_texture: u16,
}

impl RecordingBackend {
    pub fn new() -> Self {
        RecordingBackend {
            log: Arc::new(Mutex::new(BackendLog::default())),
            state: BoundState::default(),
            next_buffer_set: 0,
            next_index_buffer: 0,
            next_texture: 0,
        }
    }

    /// Shared handle to the log; clone before boxing the backend.
    pub fn log(&self) -> Arc<Mutex<BackendLog>> {
        Arc::clone(&self.log)
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for RecordingBackend {
    fn create_buffer_set(&mut self, _max_vertices: u32) -> BufferSetId {
        let id = BufferSetId(self.next_buffer_set);
        self.next_buffer_set += 1;
        id
    }

    fn update_buffer_set(
        &mut self,
        set: BufferSetId,
        positions: PoolSlice<f32>,
        colors: PoolSlice<u32>,
        uvs: PoolSlice<f32>,
        num_vertices: u32,
    ) {
        let n = num_vertices as usize;
        let mut log = self.log.lock().unwrap();
        log.vertex_uploads.push((set, num_vertices));
        log.vertex_positions.push((set, positions[..n * 2].to_vec()));
        log.vertex_colors.push((set, colors[..n].to_vec()));
        // Dropping the slices models the GPU release callback.
        drop(log);
        drop(positions);
        drop(colors);
        drop(uvs);
    }

    fn create_index_buffer(&mut self) -> IndexBufferId {
        let id = IndexBufferId(self.next_index_buffer);
        self.next_index_buffer += 1;
        id
    }

    fn update_index_buffer(&mut self, buffer: IndexBufferId, indices: &[u16]) {
        self.log
            .lock()
            .unwrap()
            .index_uploads
            .push((buffer, indices.to_vec()));
    }

    fn create_texture(
        &mut self,
        _width: u16,
        _height: u16,
        _sampler_flags: u32,
        _data: Option<&[u8]>,
    ) -> TextureId {
        self.log.lock().unwrap().textures_created += 1;
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        id
    }

    fn update_texture(&mut self, _texture: TextureId, _x: u16, _y: u16, _w: u16, _h: u16, _data: &[u8]) {
        self.log.lock().unwrap().textures_updated += 1;
    }

    fn destroy_texture(&mut self, _texture: TextureId) {
        self.log.lock().unwrap().textures_destroyed += 1;
    }

    fn set_view_transform(&mut self, view: ViewId, _proj: [f32; 16]) {
        self.log.lock().unwrap().view_transforms.push(view);
    }

    fn set_vertex_slice(&mut self, set: BufferSetId, first_vertex: u32, num_vertices: u32) {
        self.state.buffer_set = set;
        self.state.first_vertex = first_vertex;
        self.state.num_vertices = num_vertices;
    }

    fn set_index_slice(&mut self, buffer: IndexBufferId, first_index: u32, num_indices: u32) {
        self.state.index_buffer = buffer;
        self.state.first_index = first_index;
        self.state.num_indices = num_indices;
    }

    fn set_scissor(&mut self, x: u16, y: u16, w: u16, h: u16) {
        self.state.scissor = [x, y, w, h];
    }

    fn set_stencil(&mut self, mode: StencilMode) {
        self.state.stencil = mode;
    }

    fn set_paint(&mut self, paint: PaintData) {
        self.state.paint = Some(paint);
    }

    fn submit(&mut self, view: ViewId, program: Program) {
        let s = &self.state;
        self.log.lock().unwrap().submissions.push(Submission {
            view,
            program,
            buffer_set: s.buffer_set,
            first_vertex: s.first_vertex,
            num_vertices: s.num_vertices,
            first_index: s.first_index,
            num_indices: s.num_indices,
            scissor: s.scissor,
            stencil: s.stencil,
            paint: s.paint,
        });
    }
}

const STUB_ATLAS_SIZE: u16 = 512;

/// Font system stub with fixed-metric glyphs: every codepoint advances
/// half the font size and fills a quad from the baseline up.
pub struct FixedFontSystem {
    fonts: Vec<String>,
    atlas_dirty: bool,
}

impl FixedFontSystem {
    pub fn new() -> Self {
        FixedFontSystem {
            fonts: Vec::new(),
            atlas_dirty: false,
        }
    }

    fn advance(cfg: &TextConfig) -> f32 {
        cfg.size * 0.5 + cfg.spacing
    }
}

impl Default for FixedFontSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FontSystem for FixedFontSystem {
    fn add_font(&mut self, name: &str, _data: Vec<u8>) -> FontHandle {
        self.fonts.push(name.to_string());
        FontHandle::new((self.fonts.len() - 1) as u16)
    }

    fn find_font(&self, name: &str) -> FontHandle {
        self.fonts
            .iter()
            .position(|f| f == name)
            .map(|i| FontHandle::new(i as u16))
            .unwrap_or(FontHandle::INVALID)
    }

    fn add_fallback_font(&mut self, _base: FontHandle, _fallback: FontHandle) -> bool {
        true
    }

    fn text(&mut self, cfg: &TextConfig, text: &str, build_bitmaps: bool) -> Option<TextMesh> {
        if text.is_empty() {
            return None;
        }
        if build_bitmaps {
            self.atlas_dirty = true;
        }

        let advance = Self::advance(cfg);
        let mut quads = Vec::new();
        let mut codepoint_sizes = Vec::new();
        let mut pen_x = 0.0f32;
        for ch in text.chars() {
            quads.push(TextQuad {
                pos: [pen_x, -cfg.size, pen_x + advance, 0.0],
                uv: [0.25, 0.25, 0.75, 0.75],
            });
            codepoint_sizes.push(ch.len_utf8() as u8);
            pen_x += advance;
        }

        Some(TextMesh {
            alignment: [0.0, 0.0],
            width: pen_x,
            bounds: [0.0, -cfg.size, pen_x, 0.0],
            quads,
            codepoint_sizes,
        })
    }

    fn break_lines(
        &mut self,
        cfg: &TextConfig,
        text: &str,
        break_width: f32,
        max_rows: usize,
    ) -> Vec<TextRow> {
        let advance = Self::advance(cfg);
        let max_chars = ((break_width / advance).floor() as usize).max(1);

        let mut rows = Vec::new();
        let mut start = 0usize;
        while start < text.len() && rows.len() < max_rows {
            let mut end = start;
            let mut count = 0usize;
            let mut saw_newline = false;
            for (off, ch) in text[start..].char_indices() {
                if ch == '\n' {
                    saw_newline = true;
                    break;
                }
                if count == max_chars {
                    break;
                }
                end = start + off + ch.len_utf8();
                count += 1;
            }

            let next = if saw_newline { end + 1 } else { end };
            let width = count as f32 * advance;
            rows.push(TextRow {
                start,
                end,
                next,
                width,
                min_x: 0.0,
                max_x: width,
            });
            if next <= start {
                break;
            }
            start = next;
        }
        rows
    }

    fn line_bounds(&mut self, cfg: &TextConfig, y: f32) -> (f32, f32) {
        (y - cfg.size, y + cfg.size * 0.2)
    }

    fn line_height(&mut self, cfg: &TextConfig) -> f32 {
        cfg.size * 1.2
    }

    fn white_pixel_uv(&self) -> [f32; 2] {
        [0.5 / STUB_ATLAS_SIZE as f32, 0.5 / STUB_ATLAS_SIZE as f32]
    }

    fn atlas_size(&self) -> (u16, u16) {
        (STUB_ATLAS_SIZE, STUB_ATLAS_SIZE)
    }

    fn flush_atlas(&mut self) -> Option<AtlasUpdate> {
        if !self.atlas_dirty {
            return None;
        }
        self.atlas_dirty = false;
        Some(AtlasUpdate {
            width: STUB_ATLAS_SIZE,
            height: STUB_ATLAS_SIZE,
            pixels: vec![0xff; STUB_ATLAS_SIZE as usize * STUB_ATLAS_SIZE as usize * 4],
        })
    }

    fn frame(&mut self) {}
}
