//! Vertex and index arenas
//!
//! Vertex arenas are append-only regions over pooled chunks; when a
//! primitive would overflow the active arena a new one opens and batching
//! cannot span the boundary. The index arena registry grows 1.5x on
//! demand and is reused across frames.

use verve_core::PoolSlice;

use crate::context::Context;

/// Per-frame vertex arena: separate position/color/UV streams over
/// pooled chunks, handed to the GPU at frame end.
pub(crate) struct VertexArena {
    pos: Option<PoolSlice<f32>>,
    color: Option<PoolSlice<u32>>,
    uv: Option<PoolSlice<f32>>,
    pub(crate) count: u32,
}

impl VertexArena {
    pub(crate) fn positions_mut(&mut self) -> &mut [f32] {
        self.pos.as_deref_mut().expect("vertex arena already uploaded")
    }

    pub(crate) fn colors_mut(&mut self) -> &mut [u32] {
        self.color
            .as_deref_mut()
            .expect("vertex arena already uploaded")
    }

    pub(crate) fn uvs_mut(&mut self) -> &mut [f32] {
        self.uv.as_deref_mut().expect("vertex arena already uploaded")
    }

    /// Move the chunks out for GPU upload
    pub(crate) fn take_chunks(&mut self) -> (PoolSlice<f32>, PoolSlice<u32>, PoolSlice<f32>) {
        (
            self.pos.take().expect("vertex arena already uploaded"),
            self.color.take().expect("vertex arena already uploaded"),
            self.uv.take().expect("vertex arena already uploaded"),
        )
    }

    /// Drop the chunks straight back to their pools (frame had no draws)
    pub(crate) fn release(&mut self) {
        self.pos = None;
        self.color = None;
        self.uv = None;
        self.count = 0;
    }
}

/// Growable 16-bit index storage, one active per frame
pub(crate) struct IndexArena {
    indices: Vec<u16>,
    pub(crate) count: u32,
}

impl IndexArena {
    fn new() -> Self {
        IndexArena {
            indices: Vec::new(),
            count: 0,
        }
    }

    pub(crate) fn used(&self) -> &[u16] {
        &self.indices[..self.count as usize]
    }

    pub(crate) fn slice_mut(&mut self, first: u32, len: u32) -> &mut [u16] {
        &mut self.indices[first as usize..(first + len) as usize]
    }

    pub(crate) fn reset(&mut self) {
        self.count = 0;
    }
}

impl Context {
    /// Open a fresh vertex arena from the pools
    pub(crate) fn alloc_vertex_arena(&mut self) -> usize {
        self.vertex_arenas.push(VertexArena {
            pos: Some(self.pos_pool.acquire()),
            color: Some(self.color_pool.acquire()),
            uv: Some(self.uv_pool.acquire()),
            count: 0,
        });
        self.stats.vertex_arenas += 1;
        self.vertex_arenas.len() - 1
    }

    /// Find an index arena that is free this frame, or create one
    pub(crate) fn alloc_index_arena(&mut self) -> usize {
        for (i, arena) in self.index_arenas.iter().enumerate() {
            if arena.count == 0 {
                return i;
            }
        }
        self.index_arenas.push(IndexArena::new());
        self.index_arenas.len() - 1
    }

    /// Reserve `num_vertices` in the active arena, opening a new arena
    /// (and forcing new draw/clip commands) when it would overflow.
    /// Returns `(arena_id, first_vertex)`.
    pub(crate) fn alloc_vertices(&mut self, num_vertices: u32) -> (u32, u32) {
        debug_assert!(
            num_vertices < self.config.max_vb_vertices,
            "a single draw cannot hold more vertices than an arena"
        );

        let max = self.config.max_vb_vertices;
        let active = self.vertex_arenas.len() - 1;
        let arena_id = if self.vertex_arenas[active].count + num_vertices > max {
            let id = self.alloc_vertex_arena();
            self.force_new_draw_command = true;
            self.force_new_clip_command = true;
            id
        } else {
            active
        };

        let arena = &mut self.vertex_arenas[arena_id];
        let first_vertex = arena.count;
        arena.count += num_vertices;
        (arena_id as u32, first_vertex)
    }

    /// Reserve `num_indices` in the active index arena, growing it 1.5x
    /// as needed. Returns the first index slot.
    pub(crate) fn alloc_indices(&mut self, num_indices: u32) -> u32 {
        let arena = &mut self.index_arenas[self.active_index_arena];
        let needed = (arena.count + num_indices) as usize;
        if needed > arena.indices.len() {
            let grown = if arena.indices.is_empty() {
                32
            } else {
                arena.indices.len() * 3 / 2
            };
            arena.indices.resize(grown.max(needed), 0);
        }
        let first_index = arena.count;
        arena.count += num_indices;
        first_index
    }
}
