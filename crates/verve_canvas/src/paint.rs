//! Gradient and image-pattern issuance
//!
//! Paints are ephemeral: the dense counters reset every `begin()` and
//! each create call composes the primitive-local placement with the
//! current transform, inverts it, and stores the shader-ready matrix.

use verve_core::{Affine2D, Color, GradientHandle, GradientUniforms, ImageHandle, ImagePatternHandle};

use crate::context::Context;

/// Large lateral extent used to turn a linear gradient into a box
/// gradient the shader can evaluate
const LINEAR_GRADIENT_EXTENT: f32 = 1e5;

/// Per-frame image pattern: inverse placement matrix with the texel
/// scale baked in
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ImagePattern {
    pub matrix: [f32; 9],
    pub image: ImageHandle,
}

impl Context {
    /// Gradient along the segment `(sx, sy) -> (ex, ey)`.
    pub fn create_linear_gradient(
        &mut self,
        sx: f32,
        sy: f32,
        ex: f32,
        ey: f32,
        inner_color: Color,
        outer_color: Color,
    ) -> GradientHandle {
        if self.next_gradient_id >= self.config.max_gradients as u32 {
            return GradientHandle::INVALID;
        }
        let handle = GradientHandle::new(self.next_gradient_id as u16);
        self.next_gradient_id += 1;

        let mut dx = ex - sx;
        let mut dy = ey - sy;
        let d = (dx * dx + dy * dy).sqrt();
        if d > 1e-4 {
            dx /= d;
            dy /= d;
        } else {
            dx = 0.0;
            dy = 1.0;
        }

        let large = LINEAR_GRADIENT_EXTENT;
        let gradient_mtx = Affine2D {
            elements: [dy, -dx, dx, dy, sx - dx * large, sy - dy * large],
        };

        let params = [large, large + d * 0.5, 0.0, d.max(1.0)];
        self.gradients[handle.idx as usize] =
            self.gradient_uniforms(&gradient_mtx, params, inner_color, outer_color);
        handle
    }

    /// Gradient shaped like a rounded box, useful for soft shadows.
    #[allow(clippy::too_many_arguments)]
    pub fn create_box_gradient(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        radius: f32,
        feather: f32,
        inner_color: Color,
        outer_color: Color,
    ) -> GradientHandle {
        if self.next_gradient_id >= self.config.max_gradients as u32 {
            return GradientHandle::INVALID;
        }
        let handle = GradientHandle::new(self.next_gradient_id as u16);
        self.next_gradient_id += 1;

        let gradient_mtx = Affine2D::translation(x + w * 0.5, y + h * 0.5);
        let params = [w * 0.5, h * 0.5, radius, feather.max(1.0)];
        self.gradients[handle.idx as usize] =
            self.gradient_uniforms(&gradient_mtx, params, inner_color, outer_color);
        handle
    }

    /// Radial gradient between the inner and outer radius.
    pub fn create_radial_gradient(
        &mut self,
        cx: f32,
        cy: f32,
        inner_radius: f32,
        outer_radius: f32,
        inner_color: Color,
        outer_color: Color,
    ) -> GradientHandle {
        if self.next_gradient_id >= self.config.max_gradients as u32 {
            return GradientHandle::INVALID;
        }
        let handle = GradientHandle::new(self.next_gradient_id as u16);
        self.next_gradient_id += 1;

        let r = (inner_radius + outer_radius) * 0.5;
        let f = outer_radius - inner_radius;
        let gradient_mtx = Affine2D::translation(cx, cy);
        let params = [r, r, r, f.max(1.0)];
        self.gradients[handle.idx as usize] =
            self.gradient_uniforms(&gradient_mtx, params, inner_color, outer_color);
        handle
    }

    /// Pattern placing `image` in a `w x h` rect centered at
    /// `(cx, cy)`, rotated by `angle`.
    pub fn create_image_pattern(
        &mut self,
        cx: f32,
        cy: f32,
        w: f32,
        h: f32,
        angle: f32,
        image: ImageHandle,
    ) -> ImagePatternHandle {
        if !image.is_valid() {
            return ImagePatternHandle::INVALID;
        }
        if self.next_image_pattern_id >= self.config.max_image_patterns as u32 {
            return ImagePatternHandle::INVALID;
        }
        let handle = ImagePatternHandle::new(self.next_image_pattern_id as u16);
        self.next_image_pattern_id += 1;

        let placement = Affine2D::translation(cx, cy).multiply(&Affine2D::rotation(angle));
        let pattern = self.state().transform.multiply(&placement);
        let mut inv = pattern.inverse().elements;

        // Bake 1/size so the shader lands directly in UV space.
        inv[0] /= w;
        inv[1] /= h;
        inv[2] /= w;
        inv[3] /= h;
        inv[4] /= w;
        inv[5] /= h;

        self.image_patterns[handle.idx as usize] = ImagePattern {
            matrix: Affine2D { elements: inv }.to_mat3(),
            image,
        };
        handle
    }

    fn gradient_uniforms(
        &self,
        placement: &Affine2D,
        params: [f32; 4],
        inner_color: Color,
        outer_color: Color,
    ) -> GradientUniforms {
        let pattern = self.state().transform.multiply(placement);
        GradientUniforms {
            matrix: pattern.inverse().to_mat3(),
            params,
            inner_color: inner_color.to_rgba_f32(),
            outer_color: outer_color.to_rgba_f32(),
        }
    }

    /// Gradient count issued so far this frame
    pub fn num_gradients(&self) -> u32 {
        self.next_gradient_id
    }

    /// Image-pattern count issued so far this frame
    pub fn num_image_patterns(&self) -> u32 {
        self.next_image_pattern_id
    }

    /// Uniforms of a gradient issued this frame
    pub fn gradient(&self, handle: GradientHandle) -> Option<&GradientUniforms> {
        if !handle.is_valid() || handle.idx as u32 >= self.next_gradient_id {
            return None;
        }
        self.gradients.get(handle.idx as usize)
    }
}
