//! Command-list player
//!
//! Walks a recorded buffer and dispatches each command to the same
//! primitive entry points direct calls use. Local gradient/pattern
//! handles relocate onto the context's per-frame counters; nested
//! submissions recurse up to the configured depth. With culling enabled,
//! stroker commands are skipped while the recorded scissor is empty.

use verve_core::{
    Affine2D, ClipRule, Color, CommandListHandle, FillFlags, GradientHandle, ImageHandle,
    ImagePatternHandle, StrokeFlags, TransformOrder, Winding,
};

use crate::cmdlist::{cmd_list_flags, CmdReader, CommandType, CL_HEADER_SIZE};
use crate::context::Context;

/// Base indices for relocating local handles recorded in a list
#[derive(Clone, Copy, Debug)]
pub(crate) struct HandleReloc {
    pub first_gradient: u16,
    pub first_image_pattern: u16,
}

impl HandleReloc {
    pub(crate) fn gradient(&self, idx: u16, flags: u16) -> GradientHandle {
        if flags & verve_core::handle::HANDLE_FLAG_LOCAL != 0 {
            GradientHandle::new(idx + self.first_gradient)
        } else {
            GradientHandle::new(idx)
        }
    }

    pub(crate) fn pattern(&self, idx: u16, flags: u16) -> ImagePatternHandle {
        if flags & verve_core::handle::HANDLE_FLAG_LOCAL != 0 {
            ImagePatternHandle::new(idx + self.first_image_pattern)
        } else {
            ImagePatternHandle::new(idx)
        }
    }
}

impl Context {
    /// Replay a recorded command list into the current frame.
    ///
    /// When the list is cacheable and its cache matches the current
    /// average scale, tessellation is skipped and the cached meshes
    /// replay instead; otherwise the cache is rebuilt while the list
    /// plays normally.
    pub fn submit_command_list(&mut self, handle: CommandListHandle) {
        debug_assert!(self.is_command_list_valid(handle), "invalid command list handle");
        if !self.is_command_list_valid(handle) {
            return;
        }

        if self.submit_depth >= self.config.max_command_list_depth {
            tracing::warn!("command list recursion depth limit reached; submission skipped");
            return;
        }
        self.submit_depth += 1;

        let list_idx = handle.idx as usize;
        let flags = self.cmd_lists[list_idx].flags;
        let cacheable = (flags & cmd_list_flags::CACHEABLE) != 0;

        let reloc = HandleReloc {
            first_gradient: self.next_gradient_id as u16,
            first_image_pattern: self.next_image_pattern_id as u16,
        };
        debug_assert!(
            reloc.first_gradient as u32 + self.cmd_lists[list_idx].num_gradients as u32
                <= self.config.max_gradients as u32,
            "not enough free gradients for command list"
        );
        debug_assert!(
            reloc.first_image_pattern as u32 + self.cmd_lists[list_idx].num_image_patterns as u32
                <= self.config.max_image_patterns as u32,
            "not enough free image patterns for command list"
        );

        // Decide between cached replay and (re)recording.
        let mut cache = if cacheable {
            Some(self.cmd_lists[list_idx].cache.take().unwrap_or_default())
        } else {
            None
        };
        if let Some(c) = &mut cache {
            let avg_scale = self.state().avg_scale;
            if c.avg_scale == avg_scale {
                let buffer = std::mem::take(&mut self.cmd_lists[list_idx].cmd_buffer);
                let strings = std::mem::take(&mut self.cmd_lists[list_idx].string_buffer);
                self.cl_cache_render(&buffer, &strings, c, flags, reloc);
                let list = &mut self.cmd_lists[list_idx];
                list.cmd_buffer = buffer;
                list.string_buffer = strings;
                list.cache = cache;
                self.submit_depth -= 1;
                return;
            }
            c.reset();
            c.avg_scale = avg_scale;
        }

        // Never cull while (re)building the cache: a culled stroker
        // command would leave a hole in the cached sequence.
        let cull_cmds = cache.is_none() && (flags & cmd_list_flags::ALLOW_COMMAND_CULLING) != 0;

        let buffer = std::mem::take(&mut self.cmd_lists[list_idx].cmd_buffer);
        let strings = std::mem::take(&mut self.cmd_lists[list_idx].string_buffer);
        if buffer.is_empty() {
            let list = &mut self.cmd_lists[list_idx];
            list.cmd_buffer = buffer;
            list.string_buffer = strings;
            if cacheable {
                list.cache = cache;
            }
            self.submit_depth -= 1;
            return;
        }

        self.cache_stack.push(cache);
        if self.config.preserve_state_on_submit {
            self.push_state();
        }

        let mut skip_cmds = false;
        let mut pos = 0usize;
        while pos + CL_HEADER_SIZE <= buffer.len() {
            let mut header = CmdReader::new(&buffer, pos);
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

            if skip_cmds && cmd_type.is_stroker_command() {
                pos = next;
                continue;
            }

            let mut r = CmdReader::new(&buffer, pos + CL_HEADER_SIZE);
            match cmd_type {
                CommandType::BeginPath => self.begin_path(),
                CommandType::ClosePath => self.close_path(),
                CommandType::MoveTo => {
                    let x = r.read_f32();
                    let y = r.read_f32();
                    self.move_to(x, y);
                }
                CommandType::LineTo => {
                    let x = r.read_f32();
                    let y = r.read_f32();
                    self.line_to(x, y);
                }
                CommandType::CubicTo => {
                    let c = r.read_f32_vec(6);
                    self.cubic_to(c[0], c[1], c[2], c[3], c[4], c[5]);
                }
                CommandType::QuadraticTo => {
                    let c = r.read_f32_vec(4);
                    self.quadratic_to(c[0], c[1], c[2], c[3]);
                }
                CommandType::Arc => {
                    let c = r.read_f32_vec(5);
                    let dir = if r.read_u32() == Winding::Cw as u32 {
                        Winding::Cw
                    } else {
                        Winding::Ccw
                    };
                    self.arc(c[0], c[1], c[2], c[3], c[4], dir);
                }
                CommandType::ArcTo => {
                    let c = r.read_f32_vec(5);
                    self.arc_to(c[0], c[1], c[2], c[3], c[4]);
                }
                CommandType::Rect => {
                    let c = r.read_f32_vec(4);
                    self.rect(c[0], c[1], c[2], c[3]);
                }
                CommandType::RoundedRect => {
                    let c = r.read_f32_vec(5);
                    self.rounded_rect(c[0], c[1], c[2], c[3], c[4]);
                }
                CommandType::RoundedRectVarying => {
                    let c = r.read_f32_vec(8);
                    self.rounded_rect_varying(c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]);
                }
                CommandType::Circle => {
                    let c = r.read_f32_vec(3);
                    self.circle(c[0], c[1], c[2]);
                }
                CommandType::Ellipse => {
                    let c = r.read_f32_vec(4);
                    self.ellipse(c[0], c[1], c[2], c[3]);
                }
                CommandType::Polyline => {
                    let num_points = r.read_u32() as usize;
                    let coords = r.read_f32_vec(num_points * 2);
                    self.polyline(&coords);
                }
                CommandType::FillPathColor => {
                    let fill_flags = FillFlags::from_bits(r.read_u32());
                    let color = r.read_color();
                    self.fill_path_color(color, fill_flags);
                }
                CommandType::FillPathGradient => {
                    let fill_flags = FillFlags::from_bits(r.read_u32());
                    let idx = r.read_u16();
                    let hflags = r.read_u16();
                    self.fill_path_gradient(reloc.gradient(idx, hflags), fill_flags);
                }
                CommandType::FillPathImagePattern => {
                    let fill_flags = FillFlags::from_bits(r.read_u32());
                    let color = r.read_color();
                    let idx = r.read_u16();
                    let hflags = r.read_u16();
                    self.fill_path_image_pattern(reloc.pattern(idx, hflags), color, fill_flags);
                }
                CommandType::StrokePathColor => {
                    let width = r.read_f32();
                    let stroke_flags = StrokeFlags::from_bits(r.read_u32());
                    let color = r.read_color();
                    self.stroke_path_color(color, width, stroke_flags);
                }
                CommandType::StrokePathGradient => {
                    let width = r.read_f32();
                    let stroke_flags = StrokeFlags::from_bits(r.read_u32());
                    let idx = r.read_u16();
                    let hflags = r.read_u16();
                    self.stroke_path_gradient(reloc.gradient(idx, hflags), width, stroke_flags);
                }
                CommandType::StrokePathImagePattern => {
                    let width = r.read_f32();
                    let stroke_flags = StrokeFlags::from_bits(r.read_u32());
                    let color = r.read_color();
                    let idx = r.read_u16();
                    let hflags = r.read_u16();
                    self.stroke_path_image_pattern(
                        reloc.pattern(idx, hflags),
                        color,
                        width,
                        stroke_flags,
                    );
                }
                other => {
                    self.dispatch_state_command(other, &mut r, &strings, reloc, cull_cmds, &mut skip_cmds);
                }
            }

            pos = next;
        }

        if self.config.preserve_state_on_submit {
            self.pop_state();
            self.reset_clip();
        }

        let cache = self.cache_stack.pop().flatten();
        let list = &mut self.cmd_lists[list_idx];
        list.cmd_buffer = buffer;
        list.string_buffer = strings;
        if cacheable {
            list.cache = cache;
        }
        self.submit_depth -= 1;
    }

    /// Shared dispatch for state, paint-creation, text, clip, and
    /// nested-submission commands (everything that behaves identically
    /// in normal and cached replay).
    pub(crate) fn dispatch_state_command(
        &mut self,
        cmd_type: CommandType,
        r: &mut CmdReader<'_>,
        strings: &[u8],
        _reloc: HandleReloc,
        cull_cmds: bool,
        skip_cmds: &mut bool,
    ) {
        match cmd_type {
            CommandType::IndexedTriList => {
                let num_vertices = r.read_u32() as usize;
                let positions = r.read_f32_vec(num_vertices * 2);
                let num_uvs = r.read_u32() as usize;
                let uvs = r.read_f32_vec(num_uvs * 2);
                let num_colors = r.read_u32() as usize;
                let colors: Vec<Color> = (0..num_colors).map(|_| r.read_color()).collect();
                let num_indices = r.read_u32() as usize;
                let indices = r.read_u16_vec(num_indices);
                let image = ImageHandle::new(r.read_u16());
                self.indexed_tri_list(
                    &positions,
                    if num_uvs != 0 { Some(&uvs) } else { None },
                    &colors,
                    &indices,
                    image,
                );
            }
            CommandType::CreateLinearGradient => {
                let p = r.read_f32_vec(4);
                let inner = r.read_color();
                let outer = r.read_color();
                self.create_linear_gradient(p[0], p[1], p[2], p[3], inner, outer);
            }
            CommandType::CreateBoxGradient => {
                let p = r.read_f32_vec(6);
                let inner = r.read_color();
                let outer = r.read_color();
                self.create_box_gradient(p[0], p[1], p[2], p[3], p[4], p[5], inner, outer);
            }
            CommandType::CreateRadialGradient => {
                let p = r.read_f32_vec(4);
                let inner = r.read_color();
                let outer = r.read_color();
                self.create_radial_gradient(p[0], p[1], p[2], p[3], inner, outer);
            }
            CommandType::CreateImagePattern => {
                let p = r.read_f32_vec(5);
                let image = ImageHandle::new(r.read_u16());
                self.create_image_pattern(p[0], p[1], p[2], p[3], p[4], image);
            }
            CommandType::Text => {
                let cfg = r.read_text_config();
                let x = r.read_f32();
                let y = r.read_f32();
                let offset = r.read_u32() as usize;
                let len = r.read_u32() as usize;
                if let Ok(text) = std::str::from_utf8(&strings[offset..offset + len]) {
                    self.text(&cfg, x, y, text);
                }
            }
            CommandType::TextBox => {
                let cfg = r.read_text_config();
                let x = r.read_f32();
                let y = r.read_f32();
                let break_width = r.read_f32();
                let offset = r.read_u32() as usize;
                let len = r.read_u32() as usize;
                if let Ok(text) = std::str::from_utf8(&strings[offset..offset + len]) {
                    self.text_box(&cfg, x, y, break_width, text);
                }
            }
            CommandType::BeginClip => {
                let rule = if r.read_u32() == ClipRule::NotIn as u32 {
                    ClipRule::NotIn
                } else {
                    ClipRule::In
                };
                self.begin_clip(rule);
            }
            CommandType::EndClip => self.end_clip(),
            CommandType::ResetClip => self.reset_clip(),
            CommandType::PushState => self.push_state(),
            CommandType::PopState => {
                self.pop_state();
                if cull_cmds {
                    let scissor = self.state().scissor;
                    *skip_cmds = scissor[2] < 1.0 || scissor[3] < 1.0;
                }
            }
            CommandType::ResetScissor => {
                self.reset_scissor();
                *skip_cmds = false;
            }
            CommandType::SetScissor => {
                let c = r.read_f32_vec(4);
                self.set_scissor(c[0], c[1], c[2], c[3]);
                if cull_cmds {
                    let scissor = self.state().scissor;
                    *skip_cmds = scissor[2] < 1.0 || scissor[3] < 1.0;
                }
            }
            CommandType::IntersectScissor => {
                let c = r.read_f32_vec(4);
                let non_empty = self.intersect_scissor(c[0], c[1], c[2], c[3]);
                if cull_cmds {
                    *skip_cmds = !non_empty;
                }
            }
            CommandType::TransformIdentity => self.transform_identity(),
            CommandType::TransformScale => {
                let x = r.read_f32();
                let y = r.read_f32();
                self.transform_scale(x, y);
            }
            CommandType::TransformTranslate => {
                let x = r.read_f32();
                let y = r.read_f32();
                self.transform_translate(x, y);
            }
            CommandType::TransformRotate => {
                let angle = r.read_f32();
                self.transform_rotate(angle);
            }
            CommandType::TransformMult => {
                let m = r.read_f32_vec(6);
                let mtx = Affine2D {
                    elements: [m[0], m[1], m[2], m[3], m[4], m[5]],
                };
                let order = if r.read_u32() == TransformOrder::Pre as u32 {
                    TransformOrder::Pre
                } else {
                    TransformOrder::Post
                };
                self.transform_mult(&mtx, order);
            }
            CommandType::SetViewBox => {
                let c = r.read_f32_vec(4);
                self.set_view_box(c[0], c[1], c[2], c[3]);
            }
            CommandType::SubmitCommandList => {
                let child = CommandListHandle::new(r.read_u16());
                if self.is_command_list_valid(child) {
                    self.submit_command_list(child);
                }
            }
            _ => {
                debug_assert!(false, "command not handled by shared dispatch");
            }
        }
    }
}
