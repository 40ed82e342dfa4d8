//! Drawing state stack
//!
//! Transform, scissor, and global alpha, plus the derived average scale
//! and quantized font scale. `push_state` copies the top entry;
//! `pop_state` drops it and forces new batch boundaries when the
//! restored scissor differs from the last emitted command.

use verve_core::{math, Affine2D, TransformOrder};

use crate::context::Context;

const FONT_SCALE_QUANTUM: f32 = 0.1;
const MIN_FONT_SCALE: f32 = 0.1;
const MAX_FONT_SCALE: f32 = 4.0;

/// One entry of the drawing state stack
#[derive(Clone, Copy, Debug)]
pub struct DrawingState {
    pub transform: Affine2D,
    /// Scissor rect in canvas space: `[x, y, w, h]`
    pub scissor: [f32; 4],
    pub global_alpha: f32,
    /// Average of the transform's two axis scales
    pub avg_scale: f32,
    /// `avg_scale` quantized to 0.1 steps, clamped to [0.1, 4.0]
    pub font_scale: f32,
}

impl Default for DrawingState {
    fn default() -> Self {
        DrawingState {
            transform: Affine2D::IDENTITY,
            scissor: [0.0; 4],
            global_alpha: 1.0,
            avg_scale: 1.0,
            font_scale: 1.0,
        }
    }
}

impl DrawingState {
    /// Refresh the derived scales after a transform change
    fn update_derived(&mut self) {
        let avg_scale = self.transform.average_scale();
        self.avg_scale = avg_scale;
        self.font_scale =
            math::quantize(avg_scale, FONT_SCALE_QUANTUM).clamp(MIN_FONT_SCALE, MAX_FONT_SCALE);
    }
}

impl Context {
    pub(crate) fn state(&self) -> &DrawingState {
        self.state_stack.last().expect("state stack is never empty")
    }

    pub(crate) fn state_mut(&mut self) -> &mut DrawingState {
        self.state_stack
            .last_mut()
            .expect("state stack is never empty")
    }

    pub fn push_state(&mut self) {
        debug_assert!(
            self.state_stack.len() < self.config.max_state_stack_size as usize,
            "state stack overflow"
        );
        if self.state_stack.len() >= self.config.max_state_stack_size as usize {
            return;
        }
        let top = *self.state();
        self.state_stack.push(top);
    }

    pub fn pop_state(&mut self) {
        debug_assert!(self.state_stack.len() > 1, "state stack underflow");
        if self.state_stack.len() <= 1 {
            return;
        }
        self.state_stack.pop();

        // A restored scissor that differs from the last emitted command
        // must break batching.
        if let Some(last) = self.draw_commands.last() {
            let scissor = quantize_scissor(&self.state().scissor);
            if last.scissor != scissor {
                self.force_new_draw_command = true;
                self.force_new_clip_command = true;
            }
        }
    }

    pub fn set_global_alpha(&mut self, alpha: f32) {
        self.state_mut().global_alpha = alpha.clamp(0.0, 1.0);
    }

    pub fn get_transform(&self) -> Affine2D {
        self.state().transform
    }

    pub fn get_scissor(&self) -> [f32; 4] {
        self.state().scissor
    }

    // ── Scissor ──────────────────────────────────────────────────────

    pub fn reset_scissor(&mut self) {
        let w = self.canvas_width as f32;
        let h = self.canvas_height as f32;
        let state = self.state_mut();
        state.scissor = [0.0, 0.0, w, h];
        self.force_new_draw_command = true;
        self.force_new_clip_command = true;
    }

    /// Set the scissor to a transformed rect, clamped to the canvas.
    /// Only the transform's scale/translation apply; the scissor stays
    /// axis-aligned.
    pub fn set_scissor(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let canvas_w = self.canvas_width as f32;
        let canvas_h = self.canvas_height as f32;
        let state = self.state_mut();
        let pos = state.transform.transform_point(x, y);
        let size = state.transform.transform_vector(w, h);

        let min_x = pos[0].clamp(0.0, canvas_w);
        let min_y = pos[1].clamp(0.0, canvas_h);
        let max_x = (pos[0] + size[0]).clamp(0.0, canvas_w);
        let max_y = (pos[1] + size[1]).clamp(0.0, canvas_h);

        state.scissor = [min_x, min_y, max_x - min_x, max_y - min_y];
        self.force_new_draw_command = true;
        self.force_new_clip_command = true;
    }

    /// Intersect the current scissor with a transformed rect. Returns
    /// false when the result is under one pixel in either dimension.
    pub fn intersect_scissor(&mut self, x: f32, y: f32, w: f32, h: f32) -> bool {
        let state = self.state_mut();
        let pos = state.transform.transform_point(x, y);
        let size = state.transform.transform_vector(w, h);
        let scissor = state.scissor;

        let min_x = pos[0].max(scissor[0]);
        let min_y = pos[1].max(scissor[1]);
        let max_x = (pos[0] + size[0]).min(scissor[0] + scissor[2]);
        let max_y = (pos[1] + size[1]).min(scissor[1] + scissor[3]);

        let new_w = (max_x - min_x).max(0.0);
        let new_h = (max_y - min_y).max(0.0);
        state.scissor = [min_x, min_y, new_w, new_h];

        self.force_new_draw_command = true;
        self.force_new_clip_command = true;

        new_w >= 1.0 && new_h >= 1.0
    }

    // ── Transform ────────────────────────────────────────────────────

    pub fn transform_identity(&mut self) {
        let state = self.state_mut();
        state.transform = Affine2D::IDENTITY;
        state.update_derived();
    }

    pub fn transform_scale(&mut self, x: f32, y: f32) {
        let state = self.state_mut();
        state.transform = state.transform.multiply(&Affine2D::scale(x, y));
        state.update_derived();
    }

    pub fn transform_translate(&mut self, x: f32, y: f32) {
        let state = self.state_mut();
        state.transform = state.transform.multiply(&Affine2D::translation(x, y));
        state.update_derived();
    }

    pub fn transform_rotate(&mut self, angle: f32) {
        let state = self.state_mut();
        state.transform = state.transform.multiply(&Affine2D::rotation(angle));
        state.update_derived();
    }

    pub fn transform_mult(&mut self, mtx: &Affine2D, order: TransformOrder) {
        let state = self.state_mut();
        state.transform = match order {
            TransformOrder::Post => state.transform.multiply(mtx),
            TransformOrder::Pre => mtx.multiply(&state.transform),
        };
        state.update_derived();
    }

    /// Map the box `[x, y, w, h]` onto the full canvas
    pub fn set_view_box(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let scale_x = self.canvas_width as f32 / w;
        let scale_y = self.canvas_height as f32 / h;
        self.transform_scale(scale_x, scale_y);
        self.transform_translate(-x, -y);
    }
}

/// Scissor rects are compared and stored as whole canvas units
pub(crate) fn quantize_scissor(scissor: &[f32; 4]) -> [u16; 4] {
    [
        scissor[0] as u16,
        scissor[1] as u16,
        scissor[2] as u16,
        scissor[3] as u16,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_scissor_truncates() {
        assert_eq!(quantize_scissor(&[0.9, 1.1, 49.7, 50.2]), [0, 1, 49, 50]);
    }

    #[test]
    fn test_font_scale_quantization_bounds() {
        let mut state = DrawingState::default();
        state.transform = Affine2D::scale(0.01, 0.01);
        state.update_derived();
        assert_eq!(state.font_scale, 0.1);

        state.transform = Affine2D::scale(10.0, 10.0);
        state.update_derived();
        assert_eq!(state.font_scale, 4.0);

        state.transform = Affine2D::scale(1.23, 1.23);
        state.update_derived();
        assert!((state.font_scale - 1.2).abs() < 1e-6);
    }
}
