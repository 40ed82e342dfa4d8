//! Context configuration

/// Sampler/wrap flags for images and the font atlas
pub mod image_flags {
    /// Bilinear filtering (the default)
    pub const FILTER_BILINEAR: u32 = 0;
    /// Nearest-neighbor filtering in U/V
    pub const FILTER_NEAREST_UV: u32 = 1 << 0;
    /// Nearest-neighbor filtering across mips
    pub const FILTER_NEAREST_W: u32 = 1 << 1;
    /// Clamp texture addressing in U
    pub const CLAMP_U: u32 = 1 << 2;
    /// Clamp texture addressing in V
    pub const CLAMP_V: u32 = 1 << 3;
}

/// Configuration for creating a drawing context
#[derive(Clone, Debug)]
pub struct ContextConfig {
    /// Maximum gradients per frame
    pub max_gradients: u16,
    /// Maximum image patterns per frame
    pub max_image_patterns: u16,
    /// Maximum registered fonts
    pub max_fonts: u16,
    /// Drawing state stack depth
    pub max_state_stack_size: u32,
    /// Maximum live images
    pub max_images: u16,
    /// Maximum live command lists
    pub max_command_lists: u16,
    /// Vertices per vertex arena. Must not exceed 65536 because indices
    /// are 16-bit and arena-relative.
    pub max_vb_vertices: u32,
    /// Sampler flags for the font atlas image
    pub font_atlas_image_flags: u32,
    /// Recursion limit for nested command-list submission
    pub max_command_list_depth: u32,
    /// Push state on command-list entry and restore it on exit so a
    /// submitted list cannot leak transform/scissor changes.
    pub preserve_state_on_submit: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_gradients: 64,
            max_image_patterns: 64,
            max_fonts: 8,
            max_state_stack_size: 32,
            max_images: 16,
            max_command_lists: 256,
            max_vb_vertices: 65536,
            font_atlas_image_flags: image_flags::FILTER_BILINEAR,
            max_command_list_depth: 16,
            preserve_state_on_submit: true,
        }
    }
}
