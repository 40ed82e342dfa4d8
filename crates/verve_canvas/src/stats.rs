//! Context statistics

/// Counters exposed through [`Context::stats`](crate::Context::stats).
///
/// `tessellations` counts stroker mesh generations; a cached command
/// list replayed at an unchanged scale leaves it untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct Stats {
    /// Bytes currently reserved by command-list buffers
    pub cmd_list_memory_total: u32,
    /// Bytes currently recorded into command-list buffers
    pub cmd_list_memory_used: u32,
    /// Draw commands batched in the current frame
    pub draw_commands: u32,
    /// Clip commands batched in the current frame
    pub clip_commands: u32,
    /// Vertex arenas opened in the current frame
    pub vertex_arenas: u32,
    /// Cumulative stroker mesh generations
    pub tessellations: u64,
}
