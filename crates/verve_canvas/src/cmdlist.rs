//! Command-list recorder
//!
//! Drawing calls serialize into an aligned byte buffer of
//! self-describing commands: a 16-byte header (type, payload size)
//! followed by a 16-byte-aligned little-endian payload. Strings go to a
//! side buffer and are referenced by offset. Gradients and image
//! patterns created during recording get *local* handles that the
//! player relocates onto the context's per-frame counters.

use verve_core::{
    Color, CommandListHandle, FillFlags, GradientHandle, ImageHandle, ImagePatternHandle,
    StrokeFlags, TextConfig, TransformOrder, Winding,
};

use crate::cache::CommandListCache;
use crate::context::Context;

/// Command-list behavior flags
pub mod cmd_list_flags {
    /// Memoize tessellated meshes and replay them while the average
    /// scale is unchanged
    pub const CACHEABLE: u32 = 1 << 0;
    /// Skip stroker commands while the recorded scissor is empty
    pub const ALLOW_COMMAND_CULLING: u32 = 1 << 1;
}

pub(crate) const CL_ALIGNMENT: usize = 16;
pub(crate) const CL_HEADER_SIZE: usize = 16;

pub(crate) fn align_size(size: usize) -> usize {
    (size + (CL_ALIGNMENT - 1)) & !(CL_ALIGNMENT - 1)
}

/// Serialized command kinds. Order matters: the path and stroker ranges
/// are tested during cached replay and command culling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum CommandType {
    // Path commands
    BeginPath = 0,
    MoveTo,
    LineTo,
    CubicTo,
    QuadraticTo,
    ArcTo,
    Arc,
    Rect,
    RoundedRect,
    RoundedRectVarying,
    Circle,
    Ellipse,
    Polyline,
    ClosePath,

    // Stroker commands
    FillPathColor,
    FillPathGradient,
    FillPathImagePattern,
    StrokePathColor,
    StrokePathGradient,
    StrokePathImagePattern,

    IndexedTriList,

    // State commands
    BeginClip,
    EndClip,
    ResetClip,
    CreateLinearGradient,
    CreateBoxGradient,
    CreateRadialGradient,
    CreateImagePattern,
    PushState,
    PopState,
    ResetScissor,
    SetScissor,
    IntersectScissor,
    TransformIdentity,
    TransformScale,
    TransformTranslate,
    TransformRotate,
    TransformMult,
    SetViewBox,

    // Text
    Text,
    TextBox,

    // Nested lists
    SubmitCommandList,
}

impl CommandType {
    pub(crate) fn from_u32(value: u32) -> Option<CommandType> {
        use CommandType::*;
        const TABLE: [CommandType; 41] = [
            BeginPath,
            MoveTo,
            LineTo,
            CubicTo,
            QuadraticTo,
            ArcTo,
            Arc,
            Rect,
            RoundedRect,
            RoundedRectVarying,
            Circle,
            Ellipse,
            Polyline,
            ClosePath,
            FillPathColor,
            FillPathGradient,
            FillPathImagePattern,
            StrokePathColor,
            StrokePathGradient,
            StrokePathImagePattern,
            IndexedTriList,
            BeginClip,
            EndClip,
            ResetClip,
            CreateLinearGradient,
            CreateBoxGradient,
            CreateRadialGradient,
            CreateImagePattern,
            PushState,
            PopState,
            ResetScissor,
            SetScissor,
            IntersectScissor,
            TransformIdentity,
            TransformScale,
            TransformTranslate,
            TransformRotate,
            TransformMult,
            SetViewBox,
            Text,
            TextBox,
        ];
        if value as usize == TABLE.len() {
            return Some(SubmitCommandList);
        }
        TABLE.get(value as usize).copied()
    }

    pub(crate) fn is_path_command(self) -> bool {
        (self as u32) >= (CommandType::BeginPath as u32)
            && (self as u32) <= (CommandType::ClosePath as u32)
    }

    pub(crate) fn is_stroker_command(self) -> bool {
        (self as u32) >= (CommandType::FillPathColor as u32)
            && (self as u32) <= (CommandType::StrokePathImagePattern as u32)
    }
}

/// One recorded command list
#[derive(Default)]
pub(crate) struct CommandList {
    pub cmd_buffer: Vec<u8>,
    pub string_buffer: Vec<u8>,
    pub flags: u32,
    pub num_gradients: u16,
    pub num_image_patterns: u16,
    pub cache: Option<CommandListCache>,
}

/// Sequential little-endian writer over a pre-reserved payload region
pub(crate) struct CmdWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> CmdWriter<'a> {
    pub fn write_u16(&mut self, value: u16) {
        self.buf[self.pos..self.pos + 2].copy_from_slice(&value.to_le_bytes());
        self.pos += 2;
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf[self.pos..self.pos + 4].copy_from_slice(&value.to_le_bytes());
        self.pos += 4;
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf[self.pos..self.pos + 4].copy_from_slice(&value.to_le_bytes());
        self.pos += 4;
    }

    pub fn write_color(&mut self, color: Color) {
        self.write_u32(color.packed());
    }

    pub fn write_f32_slice(&mut self, values: &[f32]) {
        for v in values {
            self.write_f32(*v);
        }
    }

    pub fn write_u16_slice(&mut self, values: &[u16]) {
        for v in values {
            self.write_u16(*v);
        }
    }

    pub fn write_text_config(&mut self, cfg: &TextConfig) {
        self.write_u16(cfg.font.idx);
        self.write_u16(0);
        self.write_f32(cfg.size);
        self.write_u32(cfg.alignment_bits());
        self.write_color(cfg.color);
        self.write_f32(cfg.blur);
        self.write_f32(cfg.spacing);
    }
}

/// Byte size of a serialized [`TextConfig`]
pub(crate) const TEXT_CONFIG_SIZE: usize = 24;

/// Sequential little-endian reader over a command payload
#[derive(Clone, Copy)]
pub(crate) struct CmdReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> CmdReader<'a> {
    pub fn new(buf: &'a [u8], pos: usize) -> Self {
        CmdReader { buf, pos }
    }

    pub fn read_u16(&mut self) -> u16 {
        let v = u16::from_le_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        v
    }

    pub fn read_u32(&mut self) -> u32 {
        let v = u32::from_le_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        v
    }

    pub fn read_f32(&mut self) -> f32 {
        f32::from_bits(self.read_u32())
    }

    pub fn read_color(&mut self) -> Color {
        Color::from_packed(self.read_u32())
    }

    pub fn read_f32_vec(&mut self, count: usize) -> Vec<f32> {
        (0..count).map(|_| self.read_f32()).collect()
    }

    pub fn read_u16_vec(&mut self, count: usize) -> Vec<u16> {
        (0..count).map(|_| self.read_u16()).collect()
    }

    pub fn read_text_config(&mut self) -> TextConfig {
        let font = verve_core::FontHandle::new(self.read_u16());
        let _pad = self.read_u16();
        let size = self.read_f32();
        let (align_hor, align_ver) = TextConfig::alignment_from_bits(self.read_u32());
        let color = self.read_color();
        let blur = self.read_f32();
        let spacing = self.read_f32();
        TextConfig {
            font,
            size,
            align_hor,
            align_ver,
            color,
            blur,
            spacing,
        }
    }
}

impl Context {
    // ── List lifecycle ───────────────────────────────────────────────

    /// Create a command list. Returns an invalid handle at capacity.
    pub fn create_command_list(&mut self, flags: u32) -> CommandListHandle {
        let idx = self.cmd_list_handles.alloc();
        if idx == u16::MAX {
            return CommandListHandle::INVALID;
        }
        while self.cmd_lists.len() <= idx as usize {
            self.cmd_lists.push(CommandList::default());
        }
        self.cmd_lists[idx as usize] = CommandList {
            flags,
            ..CommandList::default()
        };
        CommandListHandle::new(idx)
    }

    pub fn destroy_command_list(&mut self, handle: CommandListHandle) {
        debug_assert!(self.is_command_list_valid(handle), "invalid command list handle");
        if !self.is_command_list_valid(handle) {
            return;
        }

        let list = &mut self.cmd_lists[handle.idx as usize];
        self.stats.cmd_list_memory_total = self
            .stats
            .cmd_list_memory_total
            .saturating_sub(list.cmd_buffer.capacity() as u32);
        self.stats.cmd_list_memory_used = self
            .stats
            .cmd_list_memory_used
            .saturating_sub(list.cmd_buffer.len() as u32);
        *list = CommandList::default();
        self.cmd_list_handles.free(handle.idx);
    }

    /// Clear a list's recorded commands, local-handle counters, and
    /// shape cache.
    pub fn reset_command_list(&mut self, handle: CommandListHandle) {
        debug_assert!(self.is_command_list_valid(handle), "invalid command list handle");
        if !self.is_command_list_valid(handle) {
            return;
        }

        let list = &mut self.cmd_lists[handle.idx as usize];
        self.stats.cmd_list_memory_used = self
            .stats
            .cmd_list_memory_used
            .saturating_sub(list.cmd_buffer.len() as u32);
        list.cmd_buffer.clear();
        list.string_buffer.clear();
        list.num_gradients = 0;
        list.num_image_patterns = 0;
        if let Some(cache) = &mut list.cache {
            cache.reset();
        }
    }

    pub fn is_command_list_valid(&self, handle: CommandListHandle) -> bool {
        handle.is_valid() && self.cmd_list_handles.is_valid(handle.idx)
    }

    // ── Recording primitives ─────────────────────────────────────────

    /// Reserve an aligned command and return a writer over its payload.
    pub(crate) fn cl_alloc_command(
        &mut self,
        list_idx: u16,
        cmd_type: CommandType,
        data_size: usize,
    ) -> CmdWriter<'_> {
        let aligned = align_size(data_size);
        let total = CL_HEADER_SIZE + aligned;

        let list = &mut self.cmd_lists[list_idx as usize];
        let pos = list.cmd_buffer.len();
        debug_assert_eq!(pos % CL_ALIGNMENT, 0, "unaligned command buffer position");

        let old_capacity = list.cmd_buffer.capacity();
        if pos + total > old_capacity {
            list.cmd_buffer.reserve((total).max(256));
        }
        list.cmd_buffer.resize(pos + total, 0);
        self.stats.cmd_list_memory_total +=
            (list.cmd_buffer.capacity() - old_capacity) as u32;
        self.stats.cmd_list_memory_used += total as u32;

        let buf = &mut list.cmd_buffer[pos..pos + total];
        buf[0..4].copy_from_slice(&(cmd_type as u32).to_le_bytes());
        buf[4..8].copy_from_slice(&(aligned as u32).to_le_bytes());

        CmdWriter {
            buf: &mut list.cmd_buffer[pos + CL_HEADER_SIZE..pos + total],
            pos: 0,
        }
    }

    /// Append to the string side-buffer, returning the offset.
    pub(crate) fn cl_store_string(&mut self, list_idx: u16, text: &str) -> u32 {
        let list = &mut self.cmd_lists[list_idx as usize];
        let offset = list.string_buffer.len() as u32;
        list.string_buffer.extend_from_slice(text.as_bytes());
        offset
    }

    fn cl_check(&self, handle: CommandListHandle) -> bool {
        debug_assert!(self.is_command_list_valid(handle), "invalid command list handle");
        self.is_command_list_valid(handle)
    }

    // ── Path recording ───────────────────────────────────────────────

    pub fn cl_begin_path(&mut self, list: CommandListHandle) {
        if !self.cl_check(list) {
            return;
        }
        self.cl_alloc_command(list.idx, CommandType::BeginPath, 0);
    }

    pub fn cl_move_to(&mut self, list: CommandListHandle, x: f32, y: f32) {
        if !self.cl_check(list) {
            return;
        }
        let mut w = self.cl_alloc_command(list.idx, CommandType::MoveTo, 8);
        w.write_f32(x);
        w.write_f32(y);
    }

    pub fn cl_line_to(&mut self, list: CommandListHandle, x: f32, y: f32) {
        if !self.cl_check(list) {
            return;
        }
        let mut w = self.cl_alloc_command(list.idx, CommandType::LineTo, 8);
        w.write_f32(x);
        w.write_f32(y);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn cl_cubic_to(
        &mut self,
        list: CommandListHandle,
        c1x: f32,
        c1y: f32,
        c2x: f32,
        c2y: f32,
        x: f32,
        y: f32,
    ) {
        if !self.cl_check(list) {
            return;
        }
        let mut w = self.cl_alloc_command(list.idx, CommandType::CubicTo, 24);
        w.write_f32_slice(&[c1x, c1y, c2x, c2y, x, y]);
    }

    pub fn cl_quadratic_to(&mut self, list: CommandListHandle, cx: f32, cy: f32, x: f32, y: f32) {
        if !self.cl_check(list) {
            return;
        }
        let mut w = self.cl_alloc_command(list.idx, CommandType::QuadraticTo, 16);
        w.write_f32_slice(&[cx, cy, x, y]);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn cl_arc(
        &mut self,
        list: CommandListHandle,
        cx: f32,
        cy: f32,
        r: f32,
        a0: f32,
        a1: f32,
        dir: Winding,
    ) {
        if !self.cl_check(list) {
            return;
        }
        let mut w = self.cl_alloc_command(list.idx, CommandType::Arc, 24);
        w.write_f32_slice(&[cx, cy, r, a0, a1]);
        w.write_u32(dir as u32);
    }

    pub fn cl_arc_to(&mut self, list: CommandListHandle, x1: f32, y1: f32, x2: f32, y2: f32, r: f32) {
        if !self.cl_check(list) {
            return;
        }
        let mut w = self.cl_alloc_command(list.idx, CommandType::ArcTo, 20);
        w.write_f32_slice(&[x1, y1, x2, y2, r]);
    }

    pub fn cl_rect(&mut self, list: CommandListHandle, x: f32, y: f32, w: f32, h: f32) {
        if !self.cl_check(list) {
            return;
        }
        let mut wr = self.cl_alloc_command(list.idx, CommandType::Rect, 16);
        wr.write_f32_slice(&[x, y, w, h]);
    }

    pub fn cl_rounded_rect(
        &mut self,
        list: CommandListHandle,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        r: f32,
    ) {
        if !self.cl_check(list) {
            return;
        }
        let mut wr = self.cl_alloc_command(list.idx, CommandType::RoundedRect, 20);
        wr.write_f32_slice(&[x, y, w, h, r]);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn cl_rounded_rect_varying(
        &mut self,
        list: CommandListHandle,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        rtl: f32,
        rtr: f32,
        rbr: f32,
        rbl: f32,
    ) {
        if !self.cl_check(list) {
            return;
        }
        let mut wr = self.cl_alloc_command(list.idx, CommandType::RoundedRectVarying, 32);
        wr.write_f32_slice(&[x, y, w, h, rtl, rtr, rbr, rbl]);
    }

    pub fn cl_circle(&mut self, list: CommandListHandle, cx: f32, cy: f32, radius: f32) {
        if !self.cl_check(list) {
            return;
        }
        let mut w = self.cl_alloc_command(list.idx, CommandType::Circle, 12);
        w.write_f32_slice(&[cx, cy, radius]);
    }

    pub fn cl_ellipse(&mut self, list: CommandListHandle, cx: f32, cy: f32, rx: f32, ry: f32) {
        if !self.cl_check(list) {
            return;
        }
        let mut w = self.cl_alloc_command(list.idx, CommandType::Ellipse, 16);
        w.write_f32_slice(&[cx, cy, rx, ry]);
    }

    pub fn cl_polyline(&mut self, list: CommandListHandle, coords: &[f32]) {
        if !self.cl_check(list) {
            return;
        }
        let num_points = (coords.len() / 2) as u32;
        let mut w = self.cl_alloc_command(list.idx, CommandType::Polyline, 4 + coords.len() * 4);
        w.write_u32(num_points);
        w.write_f32_slice(coords);
    }

    pub fn cl_close_path(&mut self, list: CommandListHandle) {
        if !self.cl_check(list) {
            return;
        }
        self.cl_alloc_command(list.idx, CommandType::ClosePath, 0);
    }

    // ── Paint recording ──────────────────────────────────────────────

    pub fn cl_fill_path_color(&mut self, list: CommandListHandle, color: Color, flags: FillFlags) {
        if !self.cl_check(list) {
            return;
        }
        let mut w = self.cl_alloc_command(list.idx, CommandType::FillPathColor, 8);
        w.write_u32(flags.bits());
        w.write_color(color);
    }

    pub fn cl_fill_path_gradient(
        &mut self,
        list: CommandListHandle,
        gradient: GradientHandle,
        flags: FillFlags,
    ) {
        if !self.cl_check(list) {
            return;
        }
        debug_assert!(gradient.is_valid(), "invalid gradient handle");
        let mut w = self.cl_alloc_command(list.idx, CommandType::FillPathGradient, 8);
        w.write_u32(flags.bits());
        w.write_u16(gradient.idx);
        w.write_u16(gradient.flags);
    }

    pub fn cl_fill_path_image_pattern(
        &mut self,
        list: CommandListHandle,
        pattern: ImagePatternHandle,
        color: Color,
        flags: FillFlags,
    ) {
        if !self.cl_check(list) {
            return;
        }
        debug_assert!(pattern.is_valid(), "invalid image pattern handle");
        let mut w = self.cl_alloc_command(list.idx, CommandType::FillPathImagePattern, 12);
        w.write_u32(flags.bits());
        w.write_color(color);
        w.write_u16(pattern.idx);
        w.write_u16(pattern.flags);
    }

    pub fn cl_stroke_path_color(
        &mut self,
        list: CommandListHandle,
        color: Color,
        width: f32,
        flags: StrokeFlags,
    ) {
        if !self.cl_check(list) {
            return;
        }
        let mut w = self.cl_alloc_command(list.idx, CommandType::StrokePathColor, 12);
        w.write_f32(width);
        w.write_u32(flags.bits());
        w.write_color(color);
    }

    pub fn cl_stroke_path_gradient(
        &mut self,
        list: CommandListHandle,
        gradient: GradientHandle,
        width: f32,
        flags: StrokeFlags,
    ) {
        if !self.cl_check(list) {
            return;
        }
        debug_assert!(gradient.is_valid(), "invalid gradient handle");
        let mut w = self.cl_alloc_command(list.idx, CommandType::StrokePathGradient, 12);
        w.write_f32(width);
        w.write_u32(flags.bits());
        w.write_u16(gradient.idx);
        w.write_u16(gradient.flags);
    }

    pub fn cl_stroke_path_image_pattern(
        &mut self,
        list: CommandListHandle,
        pattern: ImagePatternHandle,
        color: Color,
        width: f32,
        flags: StrokeFlags,
    ) {
        if !self.cl_check(list) {
            return;
        }
        debug_assert!(pattern.is_valid(), "invalid image pattern handle");
        let mut w = self.cl_alloc_command(list.idx, CommandType::StrokePathImagePattern, 16);
        w.write_f32(width);
        w.write_u32(flags.bits());
        w.write_color(color);
        w.write_u16(pattern.idx);
        w.write_u16(pattern.flags);
    }

    pub fn cl_indexed_tri_list(
        &mut self,
        list: CommandListHandle,
        positions: &[f32],
        uvs: Option<&[f32]>,
        colors: &[Color],
        indices: &[u16],
        image: ImageHandle,
    ) {
        if !self.cl_check(list) {
            return;
        }
        let num_vertices = (positions.len() / 2) as u32;
        let num_uvs = uvs.map(|u| (u.len() / 2) as u32).unwrap_or(0);
        let data_size = 4
            + positions.len() * 4
            + 4
            + num_uvs as usize * 2 * 4
            + 4
            + colors.len() * 4
            + 4
            + indices.len() * 2
            + 2;
        let mut w = self.cl_alloc_command(list.idx, CommandType::IndexedTriList, data_size);
        w.write_u32(num_vertices);
        w.write_f32_slice(positions);
        w.write_u32(num_uvs);
        if let Some(uv) = uvs {
            w.write_f32_slice(uv);
        }
        w.write_u32(colors.len() as u32);
        for c in colors {
            w.write_color(*c);
        }
        w.write_u32(indices.len() as u32);
        w.write_u16_slice(indices);
        w.write_u16(image.idx);
    }

    // ── Clip / state recording ───────────────────────────────────────

    pub fn cl_begin_clip(&mut self, list: CommandListHandle, rule: verve_core::ClipRule) {
        if !self.cl_check(list) {
            return;
        }
        let mut w = self.cl_alloc_command(list.idx, CommandType::BeginClip, 4);
        w.write_u32(rule as u32);
    }

    pub fn cl_end_clip(&mut self, list: CommandListHandle) {
        if !self.cl_check(list) {
            return;
        }
        self.cl_alloc_command(list.idx, CommandType::EndClip, 0);
    }

    pub fn cl_reset_clip(&mut self, list: CommandListHandle) {
        if !self.cl_check(list) {
            return;
        }
        self.cl_alloc_command(list.idx, CommandType::ResetClip, 0);
    }

    /// Record a linear gradient; returns a local handle valid only
    /// inside this list.
    #[allow(clippy::too_many_arguments)]
    pub fn cl_create_linear_gradient(
        &mut self,
        list: CommandListHandle,
        sx: f32,
        sy: f32,
        ex: f32,
        ey: f32,
        inner_color: Color,
        outer_color: Color,
    ) -> GradientHandle {
        if !self.cl_check(list) {
            return GradientHandle::INVALID;
        }
        let mut w = self.cl_alloc_command(list.idx, CommandType::CreateLinearGradient, 24);
        w.write_f32_slice(&[sx, sy, ex, ey]);
        w.write_color(inner_color);
        w.write_color(outer_color);

        let local_idx = self.cmd_lists[list.idx as usize].num_gradients;
        self.cmd_lists[list.idx as usize].num_gradients += 1;
        GradientHandle::local(local_idx)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn cl_create_box_gradient(
        &mut self,
        list: CommandListHandle,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        radius: f32,
        feather: f32,
        inner_color: Color,
        outer_color: Color,
    ) -> GradientHandle {
        if !self.cl_check(list) {
            return GradientHandle::INVALID;
        }
        let mut wr = self.cl_alloc_command(list.idx, CommandType::CreateBoxGradient, 32);
        wr.write_f32_slice(&[x, y, w, h, radius, feather]);
        wr.write_color(inner_color);
        wr.write_color(outer_color);

        let local_idx = self.cmd_lists[list.idx as usize].num_gradients;
        self.cmd_lists[list.idx as usize].num_gradients += 1;
        GradientHandle::local(local_idx)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn cl_create_radial_gradient(
        &mut self,
        list: CommandListHandle,
        cx: f32,
        cy: f32,
        inner_radius: f32,
        outer_radius: f32,
        inner_color: Color,
        outer_color: Color,
    ) -> GradientHandle {
        if !self.cl_check(list) {
            return GradientHandle::INVALID;
        }
        let mut w = self.cl_alloc_command(list.idx, CommandType::CreateRadialGradient, 24);
        w.write_f32_slice(&[cx, cy, inner_radius, outer_radius]);
        w.write_color(inner_color);
        w.write_color(outer_color);

        let local_idx = self.cmd_lists[list.idx as usize].num_gradients;
        self.cmd_lists[list.idx as usize].num_gradients += 1;
        GradientHandle::local(local_idx)
    }

    /// Record an image pattern; returns a local handle valid only
    /// inside this list.
    pub fn cl_create_image_pattern(
        &mut self,
        list: CommandListHandle,
        cx: f32,
        cy: f32,
        w: f32,
        h: f32,
        angle: f32,
        image: ImageHandle,
    ) -> ImagePatternHandle {
        if !self.cl_check(list) {
            return ImagePatternHandle::INVALID;
        }
        debug_assert!(image.is_valid(), "invalid image handle");
        let mut wr = self.cl_alloc_command(list.idx, CommandType::CreateImagePattern, 22);
        wr.write_f32_slice(&[cx, cy, w, h, angle]);
        wr.write_u16(image.idx);

        let local_idx = self.cmd_lists[list.idx as usize].num_image_patterns;
        self.cmd_lists[list.idx as usize].num_image_patterns += 1;
        ImagePatternHandle::local(local_idx)
    }

    pub fn cl_push_state(&mut self, list: CommandListHandle) {
        if !self.cl_check(list) {
            return;
        }
        self.cl_alloc_command(list.idx, CommandType::PushState, 0);
    }

    pub fn cl_pop_state(&mut self, list: CommandListHandle) {
        if !self.cl_check(list) {
            return;
        }
        self.cl_alloc_command(list.idx, CommandType::PopState, 0);
    }

    pub fn cl_reset_scissor(&mut self, list: CommandListHandle) {
        if !self.cl_check(list) {
            return;
        }
        self.cl_alloc_command(list.idx, CommandType::ResetScissor, 0);
    }

    pub fn cl_set_scissor(&mut self, list: CommandListHandle, x: f32, y: f32, w: f32, h: f32) {
        if !self.cl_check(list) {
            return;
        }
        let mut wr = self.cl_alloc_command(list.idx, CommandType::SetScissor, 16);
        wr.write_f32_slice(&[x, y, w, h]);
    }

    pub fn cl_intersect_scissor(&mut self, list: CommandListHandle, x: f32, y: f32, w: f32, h: f32) {
        if !self.cl_check(list) {
            return;
        }
        let mut wr = self.cl_alloc_command(list.idx, CommandType::IntersectScissor, 16);
        wr.write_f32_slice(&[x, y, w, h]);
    }

    pub fn cl_transform_identity(&mut self, list: CommandListHandle) {
        if !self.cl_check(list) {
            return;
        }
        self.cl_alloc_command(list.idx, CommandType::TransformIdentity, 0);
    }

    pub fn cl_transform_scale(&mut self, list: CommandListHandle, x: f32, y: f32) {
        if !self.cl_check(list) {
            return;
        }
        let mut w = self.cl_alloc_command(list.idx, CommandType::TransformScale, 8);
        w.write_f32(x);
        w.write_f32(y);
    }

    pub fn cl_transform_translate(&mut self, list: CommandListHandle, x: f32, y: f32) {
        if !self.cl_check(list) {
            return;
        }
        let mut w = self.cl_alloc_command(list.idx, CommandType::TransformTranslate, 8);
        w.write_f32(x);
        w.write_f32(y);
    }

    pub fn cl_transform_rotate(&mut self, list: CommandListHandle, angle: f32) {
        if !self.cl_check(list) {
            return;
        }
        let mut w = self.cl_alloc_command(list.idx, CommandType::TransformRotate, 4);
        w.write_f32(angle);
    }

    pub fn cl_transform_mult(
        &mut self,
        list: CommandListHandle,
        mtx: &verve_core::Affine2D,
        order: TransformOrder,
    ) {
        if !self.cl_check(list) {
            return;
        }
        let mut w = self.cl_alloc_command(list.idx, CommandType::TransformMult, 28);
        w.write_f32_slice(&mtx.elements);
        w.write_u32(order as u32);
    }

    pub fn cl_set_view_box(&mut self, list: CommandListHandle, x: f32, y: f32, w: f32, h: f32) {
        if !self.cl_check(list) {
            return;
        }
        let mut wr = self.cl_alloc_command(list.idx, CommandType::SetViewBox, 16);
        wr.write_f32_slice(&[x, y, w, h]);
    }

    // ── Text recording ───────────────────────────────────────────────

    pub fn cl_text(&mut self, list: CommandListHandle, cfg: &TextConfig, x: f32, y: f32, text: &str) {
        if !self.cl_check(list) {
            return;
        }
        if text.is_empty() {
            return;
        }
        let offset = self.cl_store_string(list.idx, text);
        let mut w = self.cl_alloc_command(list.idx, CommandType::Text, TEXT_CONFIG_SIZE + 16);
        w.write_text_config(cfg);
        w.write_f32(x);
        w.write_f32(y);
        w.write_u32(offset);
        w.write_u32(text.len() as u32);
    }

    pub fn cl_text_box(
        &mut self,
        list: CommandListHandle,
        cfg: &TextConfig,
        x: f32,
        y: f32,
        break_width: f32,
        text: &str,
    ) {
        if !self.cl_check(list) {
            return;
        }
        if text.is_empty() {
            return;
        }
        let offset = self.cl_store_string(list.idx, text);
        let mut w = self.cl_alloc_command(list.idx, CommandType::TextBox, TEXT_CONFIG_SIZE + 20);
        w.write_text_config(cfg);
        w.write_f32(x);
        w.write_f32(y);
        w.write_f32(break_width);
        w.write_u32(offset);
        w.write_u32(text.len() as u32);
    }

    /// Record a nested submission of `child` into `parent`.
    pub fn cl_submit_command_list(&mut self, parent: CommandListHandle, child: CommandListHandle) {
        if !self.cl_check(parent) {
            return;
        }
        let mut w = self.cl_alloc_command(parent.idx, CommandType::SubmitCommandList, 2);
        w.write_u16(child.idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_size() {
        assert_eq!(align_size(0), 0);
        assert_eq!(align_size(1), 16);
        assert_eq!(align_size(16), 16);
        assert_eq!(align_size(17), 32);
    }

    #[test]
    fn test_command_type_roundtrip() {
        for raw in 0..=CommandType::SubmitCommandList as u32 {
            let ty = CommandType::from_u32(raw).expect("valid command type");
            assert_eq!(ty as u32, raw);
        }
        assert!(CommandType::from_u32(CommandType::SubmitCommandList as u32 + 1).is_none());
    }

    #[test]
    fn test_command_type_ranges() {
        assert!(CommandType::BeginPath.is_path_command());
        assert!(CommandType::ClosePath.is_path_command());
        assert!(!CommandType::FillPathColor.is_path_command());

        assert!(CommandType::FillPathColor.is_stroker_command());
        assert!(CommandType::StrokePathImagePattern.is_stroker_command());
        assert!(!CommandType::IndexedTriList.is_stroker_command());
        assert!(!CommandType::Text.is_stroker_command());
    }

    #[test]
    fn test_reader_reads_writer_output() {
        let mut buf = vec![0u8; 32];
        let mut writer = CmdWriter { buf: &mut buf[..], pos: 0 };
        writer.write_f32(1.5);
        writer.write_u32(0xdead_beef);
        writer.write_u16(42);
        writer.write_color(Color::from_rgba8(1, 2, 3, 4));

        let mut reader = CmdReader::new(&buf, 0);
        assert_eq!(reader.read_f32(), 1.5);
        assert_eq!(reader.read_u32(), 0xdead_beef);
        assert_eq!(reader.read_u16(), 42);
        assert_eq!(reader.read_color(), Color::from_rgba8(1, 2, 3, 4));
    }

    #[test]
    fn test_text_config_roundtrip() {
        let cfg = TextConfig::new(verve_core::FontHandle::new(3), 14.0, Color::WHITE)
            .with_alignment(
                verve_core::TextAlignHor::Right,
                verve_core::TextAlignVer::Top,
            );
        let mut buf = vec![0u8; TEXT_CONFIG_SIZE];
        let mut writer = CmdWriter { buf: &mut buf[..], pos: 0 };
        writer.write_text_config(&cfg);

        let mut reader = CmdReader::new(&buf, 0);
        assert_eq!(reader.read_text_config(), cfg);
    }
}
