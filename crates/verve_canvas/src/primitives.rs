//! Primitive routing: path construction forwarding and the
//! fill/stroke/indexed-tri-list entry points
//!
//! Every paint routine follows the same shape: resolve the effective
//! color (global alpha, thin-stroke compensation), transform the
//! flattened path once, run the stroker per subpath, then either record
//! into the bound shape cache and/or emit draw (or clip) commands.

use smallvec::SmallVec;
use verve_core::{
    math, Color, FillFlags, GradientHandle, ImageHandle, ImagePatternHandle, PathType,
    StrokeFlags, Winding,
};
use verve_path::{Mesh, SubPath};

use crate::batch::UvSource;
use crate::context::Context;

/// Stroke widths are clamped after scaling to keep meshes bounded
const MAX_SCALED_STROKE_WIDTH: f32 = 200.0;

impl Context {
    // ── Path construction ────────────────────────────────────────────

    pub fn begin_path(&mut self) {
        let avg_scale = self.state().avg_scale;
        let tolerance = self.tess_tolerance;
        let fringe = self.fringe_width;
        self.path.reset(avg_scale, tolerance);
        self.stroker.reset(avg_scale, tolerance, fringe);
        self.path_transformed = false;
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        debug_assert!(!self.path_transformed, "begin_path() before extending a painted path");
        self.path.move_to(x, y);
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        debug_assert!(!self.path_transformed, "begin_path() before extending a painted path");
        self.path.line_to(x, y);
    }

    pub fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
        debug_assert!(!self.path_transformed, "begin_path() before extending a painted path");
        self.path.cubic_to(c1x, c1y, c2x, c2y, x, y);
    }

    pub fn quadratic_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        debug_assert!(!self.path_transformed, "begin_path() before extending a painted path");
        self.path.quadratic_to(cx, cy, x, y);
    }

    pub fn arc(&mut self, cx: f32, cy: f32, r: f32, a0: f32, a1: f32, dir: Winding) {
        debug_assert!(!self.path_transformed, "begin_path() before extending a painted path");
        self.path.arc(cx, cy, r, a0, a1, dir);
    }

    pub fn arc_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, r: f32) {
        debug_assert!(!self.path_transformed, "begin_path() before extending a painted path");
        self.path.arc_to(x1, y1, x2, y2, r);
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        debug_assert!(!self.path_transformed, "begin_path() before extending a painted path");
        self.path.rect(x, y, w, h);
    }

    pub fn rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, r: f32) {
        debug_assert!(!self.path_transformed, "begin_path() before extending a painted path");
        self.path.rounded_rect(x, y, w, h, r);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn rounded_rect_varying(
        &mut self,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        rtl: f32,
        rtr: f32,
        rbr: f32,
        rbl: f32,
    ) {
        debug_assert!(!self.path_transformed, "begin_path() before extending a painted path");
        self.path.rounded_rect_varying(x, y, w, h, rtl, rtr, rbr, rbl);
    }

    pub fn circle(&mut self, cx: f32, cy: f32, radius: f32) {
        debug_assert!(!self.path_transformed, "begin_path() before extending a painted path");
        self.path.circle(cx, cy, radius);
    }

    pub fn ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32) {
        debug_assert!(!self.path_transformed, "begin_path() before extending a painted path");
        self.path.ellipse(cx, cy, rx, ry);
    }

    pub fn polyline(&mut self, coords: &[f32]) {
        debug_assert!(!self.path_transformed, "begin_path() before extending a painted path");
        self.path.polyline(coords);
    }

    pub fn close_path(&mut self) {
        debug_assert!(!self.path_transformed, "begin_path() before extending a painted path");
        self.path.close();
    }

    /// Transform the flattened path into screen space once per path;
    /// repeated paints reuse the result until the next `begin_path`.
    pub(crate) fn transform_path(&mut self) {
        if self.path_transformed {
            return;
        }
        let num = self.path.num_vertices() as usize;
        self.transformed_vertices.resize(num * 2, 0.0);
        let transform = self.state().transform;
        math::batch_transform_positions(
            self.path.vertices(),
            &mut self.transformed_vertices,
            &transform,
        );
        self.path_transformed = true;
    }

    // ── Fills ────────────────────────────────────────────────────────

    /// Fill the current path with a solid color. Inside a clip block the
    /// geometry goes to the stencil stream instead (color ignored).
    pub fn fill_path_color(&mut self, color: Color, flags: FillFlags) {
        let record_clip = self.record_clip_commands;
        let has_cache = self.has_active_cache();

        let global_alpha = if has_cache {
            1.0
        } else {
            self.state().global_alpha
        };
        let col = if record_clip {
            Color::BLACK
        } else {
            color.scale_alpha(global_alpha)
        };
        if !has_cache && col.is_transparent() {
            return;
        }

        let aa = !record_clip && flags.aa();
        self.fill_path_impl(flags, aa, col, PaintTarget::VertexColor { record_clip })
    }

    /// Fill the current path with a gradient. Rejected inside clip
    /// blocks; local (command-list) handles must be relocated first.
    pub fn fill_path_gradient(&mut self, gradient: GradientHandle, flags: FillFlags) {
        debug_assert!(
            !self.record_clip_commands,
            "only solid-color fills may define clip shapes"
        );
        debug_assert!(gradient.is_valid() && !gradient.is_local(), "invalid gradient handle");
        if self.record_clip_commands || !gradient.is_valid() || gradient.is_local() {
            return;
        }

        self.fill_path_impl(
            flags,
            flags.aa(),
            Color::BLACK,
            PaintTarget::Gradient(gradient.idx),
        )
    }

    /// Fill the current path with an image pattern tinted by `color`.
    pub fn fill_path_image_pattern(
        &mut self,
        pattern: ImagePatternHandle,
        color: Color,
        flags: FillFlags,
    ) {
        debug_assert!(
            !self.record_clip_commands,
            "only solid-color fills may define clip shapes"
        );
        debug_assert!(pattern.is_valid() && !pattern.is_local(), "invalid image pattern handle");
        if self.record_clip_commands || !pattern.is_valid() || pattern.is_local() {
            return;
        }

        let has_cache = self.has_active_cache();
        let global_alpha = if has_cache {
            1.0
        } else {
            self.state().global_alpha
        };
        let col = color.scale_alpha(global_alpha);
        if !has_cache && col.is_transparent() {
            return;
        }

        self.fill_path_impl(flags, flags.aa(), col, PaintTarget::Pattern(pattern.idx))
    }

    fn fill_path_impl(&mut self, flags: FillFlags, aa: bool, col: Color, target: PaintTarget) {
        let has_cache = self.has_active_cache();

        self.transform_path();

        if has_cache {
            self.begin_cached_command();
        }

        match flags.path_type() {
            PathType::Convex => {
                let sub_paths: SmallVec<[SubPath; 8]> =
                    SmallVec::from_slice(self.path.sub_paths());
                for sp in sub_paths {
                    if sp.num_vertices < 3 {
                        continue;
                    }
                    let first = sp.first_vertex as usize * 2;
                    let len = sp.num_vertices as usize * 2;
                    let mesh = if aa {
                        self.stroker
                            .convex_fill_aa(&self.transformed_vertices[first..first + len], col)
                    } else {
                        self.stroker
                            .convex_fill(&self.transformed_vertices[first..first + len])
                    };
                    self.stats.tessellations += 1;
                    self.dispatch_mesh(&mesh, col, target);
                }
            }
            PathType::Concave => {
                self.stroker.concave_fill_begin();
                let sub_paths: SmallVec<[SubPath; 8]> =
                    SmallVec::from_slice(self.path.sub_paths());
                let mut degenerate = false;
                for sp in &sub_paths {
                    if sp.num_vertices < 3 {
                        degenerate = true;
                        break;
                    }
                    let first = sp.first_vertex as usize * 2;
                    let len = sp.num_vertices as usize * 2;
                    self.stroker
                        .concave_fill_add_contour(&self.transformed_vertices[first..first + len]);
                }

                if !degenerate && !sub_paths.is_empty() {
                    let mesh = if aa {
                        self.stroker.concave_fill_end_aa(col, flags.fill_rule())
                    } else {
                        self.stroker.concave_fill_end(flags.fill_rule())
                    };
                    self.stats.tessellations += 1;
                    match mesh {
                        Some(mesh) => self.dispatch_mesh(&mesh, col, target),
                        None => {
                            tracing::warn!("failed to triangulate concave polygon; fill skipped")
                        }
                    }
                }
            }
        }

        if has_cache {
            self.end_cached_command();
        }
    }

    // ── Strokes ──────────────────────────────────────────────────────

    /// Stroke the current path with a solid color.
    ///
    /// Strokes that scale below the fringe width render at fringe width
    /// with alpha scaled by the square of the clamped width, which
    /// approximates sub-pixel coverage.
    pub fn stroke_path_color(&mut self, color: Color, width: f32, flags: StrokeFlags) {
        let record_clip = self.record_clip_commands;
        let has_cache = self.has_active_cache();

        let avg_scale = self.state().avg_scale;
        let global_alpha = if has_cache {
            1.0
        } else {
            self.state().global_alpha
        };
        let fringe = self.fringe_width;

        let scaled_width = if flags.fixed_width() {
            width
        } else {
            (width * avg_scale).clamp(0.0, MAX_SCALED_STROKE_WIDTH)
        };
        let is_thin = scaled_width <= fringe;

        let alpha_scale = if is_thin {
            let t = scaled_width.clamp(0.0, fringe);
            global_alpha * t * t
        } else {
            global_alpha
        };
        let col = if record_clip {
            Color::BLACK
        } else {
            color.scale_alpha(alpha_scale)
        };
        if !has_cache && col.is_transparent() {
            return;
        }

        let stroke_width = if is_thin { fringe } else { scaled_width };
        let aa = !record_clip && flags.aa();
        self.stroke_path_impl(
            flags,
            aa,
            is_thin,
            stroke_width,
            col,
            PaintTarget::VertexColor { record_clip },
        )
    }

    /// Stroke the current path with a gradient.
    pub fn stroke_path_gradient(
        &mut self,
        gradient: GradientHandle,
        width: f32,
        flags: StrokeFlags,
    ) {
        debug_assert!(
            !self.record_clip_commands,
            "only solid-color strokes may define clip shapes"
        );
        debug_assert!(gradient.is_valid() && !gradient.is_local(), "invalid gradient handle");
        if self.record_clip_commands || !gradient.is_valid() || gradient.is_local() {
            return;
        }

        let avg_scale = self.state().avg_scale;
        let mut stroke_width = if flags.fixed_width() {
            width
        } else {
            (width * avg_scale).clamp(0.0, MAX_SCALED_STROKE_WIDTH)
        };
        let mut is_thin = false;
        if stroke_width <= self.fringe_width {
            stroke_width = self.fringe_width;
            is_thin = true;
        }

        self.stroke_path_impl(
            flags,
            flags.aa(),
            is_thin,
            stroke_width,
            Color::BLACK,
            PaintTarget::Gradient(gradient.idx),
        )
    }

    /// Stroke the current path with an image pattern tinted by `color`.
    ///
    /// Note the alpha compensation here applies the quadratic factor on
    /// the *not-thin* branch, unlike the color variant; this mirrors the
    /// historical behavior.
    pub fn stroke_path_image_pattern(
        &mut self,
        pattern: ImagePatternHandle,
        color: Color,
        width: f32,
        flags: StrokeFlags,
    ) {
        debug_assert!(
            !self.record_clip_commands,
            "only solid-color strokes may define clip shapes"
        );
        debug_assert!(pattern.is_valid() && !pattern.is_local(), "invalid image pattern handle");
        if self.record_clip_commands || !pattern.is_valid() || pattern.is_local() {
            return;
        }

        let has_cache = self.has_active_cache();
        let avg_scale = self.state().avg_scale;
        let global_alpha = if has_cache {
            1.0
        } else {
            self.state().global_alpha
        };
        let fringe = self.fringe_width;

        let scaled_width = if flags.fixed_width() {
            width
        } else {
            (width * avg_scale).clamp(0.0, MAX_SCALED_STROKE_WIDTH)
        };
        let is_thin = scaled_width <= fringe;

        let alpha_scale = if is_thin {
            global_alpha
        } else {
            let t = scaled_width.clamp(0.0, fringe);
            global_alpha * t * t
        };
        let col = color.scale_alpha(alpha_scale);
        if !has_cache && col.is_transparent() {
            return;
        }

        let stroke_width = if is_thin { fringe } else { scaled_width };
        self.stroke_path_impl(
            flags,
            flags.aa(),
            is_thin,
            stroke_width,
            col,
            PaintTarget::Pattern(pattern.idx),
        )
    }

    fn stroke_path_impl(
        &mut self,
        flags: StrokeFlags,
        aa: bool,
        is_thin: bool,
        stroke_width: f32,
        col: Color,
        target: PaintTarget,
    ) {
        let has_cache = self.has_active_cache();

        self.transform_path();

        if has_cache {
            self.begin_cached_command();
        }

        let sub_paths: SmallVec<[SubPath; 8]> = SmallVec::from_slice(self.path.sub_paths());
        for sp in sub_paths {
            if sp.num_vertices < 2 {
                continue;
            }
            let first = sp.first_vertex as usize * 2;
            let len = sp.num_vertices as usize * 2;
            let pos = &self.transformed_vertices[first..first + len];

            let mesh = if aa {
                if is_thin {
                    self.stroker
                        .polyline_stroke_aa_thin(pos, sp.is_closed, col, flags.cap(), flags.join())
                } else {
                    self.stroker.polyline_stroke_aa(
                        pos,
                        sp.is_closed,
                        col,
                        stroke_width,
                        flags.cap(),
                        flags.join(),
                    )
                }
            } else {
                self.stroker.polyline_stroke(
                    pos,
                    sp.is_closed,
                    stroke_width,
                    flags.cap(),
                    flags.join(),
                )
            };
            self.stats.tessellations += 1;
            self.dispatch_mesh(&mesh, col, target);
        }

        if has_cache {
            self.end_cached_command();
        }
    }

    // ── Raw triangle lists ───────────────────────────────────────────

    /// Submit pre-built triangles. Positions transform through the
    /// current state; missing UVs fall back to the atlas white pixel and
    /// a missing image falls back to the font atlas.
    #[allow(clippy::too_many_arguments)]
    pub fn indexed_tri_list(
        &mut self,
        positions: &[f32],
        uvs: Option<&[f32]>,
        colors: &[Color],
        indices: &[u16],
        image: ImageHandle,
    ) {
        let image = if image.is_valid() {
            image
        } else {
            self.font_atlas_image
        };

        let num_vertices = positions.len() / 2;
        let transform = self.state().transform;
        let mut transformed = vec![0.0f32; positions.len()];
        math::batch_transform_positions(positions, &mut transformed, &transform);

        let mesh_colors = if colors.len() == num_vertices {
            colors.iter().map(|c| c.packed()).collect()
        } else {
            debug_assert!(colors.len() <= 1, "color count must be 1 or match vertices");
            Vec::new()
        };
        let uniform = colors.first().copied().unwrap_or(Color::WHITE).packed();

        let mesh = Mesh {
            positions: transformed,
            colors: mesh_colors,
            indices: indices.to_vec(),
        };
        let uv_source = match uvs {
            Some(data) => UvSource::Stream(data),
            None => UvSource::WhitePixel,
        };
        self.emit_textured(image.idx, &mesh, uniform, uv_source);
    }

    /// Route one produced mesh to the cache and the right command
    /// stream.
    fn dispatch_mesh(&mut self, mesh: &Mesh, col: Color, target: PaintTarget) {
        if self.has_active_cache() {
            self.add_cached_command(mesh);
        }
        match target {
            PaintTarget::VertexColor { record_clip } => {
                if record_clip {
                    self.emit_clip(mesh);
                } else {
                    self.emit_vertex_color(mesh, col.packed());
                }
            }
            PaintTarget::Gradient(handle) => self.emit_gradient(handle, mesh, col.packed()),
            PaintTarget::Pattern(handle) => self.emit_image_pattern(handle, mesh, col.packed()),
        }
    }
}

/// Which command stream / paint a produced mesh lands in
#[derive(Clone, Copy)]
enum PaintTarget {
    VertexColor { record_clip: bool },
    Gradient(u16),
    Pattern(u16),
}
