//! Fill and stroke mesh generation
//!
//! Consumes flattened, screen-space polylines and produces triangle
//! meshes. Convex fills are triangle fans (with an optional one-pixel AA
//! fringe ring); concave fills and strokes go through lyon's
//! tessellators.

use lyon::lyon_tessellation::{
    BuffersBuilder, FillOptions, FillTessellator, FillVertex, StrokeOptions, StrokeTessellator,
    StrokeVertex, VertexBuffers,
};
use lyon::math::point;
use verve_core::{Color, FillRule, LineCap, LineJoin};

/// A triangle mesh ready for the draw-command batcher.
///
/// `colors` is either empty (uniform color, supplied by the caller at
/// submission time) or one packed color per vertex (AA meshes bake their
/// fringe alpha).
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub positions: Vec<f32>,
    pub colors: Vec<u32>,
    pub indices: Vec<u16>,
}

impl Mesh {
    pub fn num_vertices(&self) -> u32 {
        self.positions.len() as u32 / 2
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Mesh generator for fills and strokes
pub struct Stroker {
    tolerance: f32,
    fringe: f32,
    contours: Vec<Vec<f32>>,
    fill_tess: FillTessellator,
    stroke_tess: StrokeTessellator,
}

impl Stroker {
    pub fn new() -> Self {
        Stroker {
            tolerance: 0.25,
            fringe: 1.0,
            contours: Vec::new(),
            fill_tess: FillTessellator::new(),
            stroke_tess: StrokeTessellator::new(),
        }
    }

    /// Reset per-path parameters. Positions handed to the stroker are
    /// already in screen space, so the tolerance is used as-is.
    pub fn reset(&mut self, _avg_scale: f32, tolerance: f32, fringe: f32) {
        self.tolerance = tolerance;
        self.fringe = fringe;
        self.contours.clear();
    }

    pub fn fringe_width(&self) -> f32 {
        self.fringe
    }

    /// Triangle fan over a convex polygon. Positions are copied
    /// verbatim; color is uniform.
    pub fn convex_fill(&mut self, pos: &[f32]) -> Mesh {
        let n = pos.len() / 2;
        debug_assert!(n >= 3);

        let mut indices = Vec::with_capacity((n - 2) * 3);
        for i in 2..n as u16 {
            indices.extend_from_slice(&[0, i - 1, i]);
        }

        Mesh {
            positions: pos.to_vec(),
            colors: Vec::new(),
            indices,
        }
    }

    /// Convex fill with a one-pixel AA fringe: an inner opaque ring
    /// fanned into triangles plus an outer ring at alpha zero, joined by
    /// a quad strip.
    pub fn convex_fill_aa(&mut self, pos: &[f32], color: Color) -> Mesh {
        let n = pos.len() / 2;
        debug_assert!(n >= 3);

        let offsets = miter_offsets(pos);
        let half_fringe = self.fringe * 0.5;

        let mut positions = Vec::with_capacity(n * 4);
        let mut colors = Vec::with_capacity(n * 2);
        let inner_color = color.packed();
        let outer_color = color.with_alpha(0).packed();

        // Inner ring [0, n), outer ring [n, 2n)
        for i in 0..n {
            positions.push(pos[i * 2] - offsets[i][0] * half_fringe);
            positions.push(pos[i * 2 + 1] - offsets[i][1] * half_fringe);
            colors.push(inner_color);
        }
        for i in 0..n {
            positions.push(pos[i * 2] + offsets[i][0] * half_fringe);
            positions.push(pos[i * 2 + 1] + offsets[i][1] * half_fringe);
            colors.push(outer_color);
        }

        let mut indices = Vec::with_capacity((n - 2) * 3 + n * 6);
        for i in 2..n as u16 {
            indices.extend_from_slice(&[0, i - 1, i]);
        }
        for i in 0..n as u16 {
            let j = (i + 1) % n as u16;
            let oi = i + n as u16;
            let oj = j + n as u16;
            indices.extend_from_slice(&[i, oi, oj, i, oj, j]);
        }

        Mesh {
            positions,
            colors,
            indices,
        }
    }

    pub fn concave_fill_begin(&mut self) {
        self.contours.clear();
    }

    pub fn concave_fill_add_contour(&mut self, pos: &[f32]) {
        self.contours.push(pos.to_vec());
    }

    /// Tessellate the collected contours. `None` when decomposition
    /// fails (degenerate input or vertex overflow).
    pub fn concave_fill_end(&mut self, fill_rule: FillRule) -> Option<Mesh> {
        self.tessellate_contours(fill_rule)
    }

    /// AA variant: same geometry with per-vertex colors so cached
    /// replays keep the baked color.
    pub fn concave_fill_end_aa(&mut self, color: Color, fill_rule: FillRule) -> Option<Mesh> {
        let mut mesh = self.tessellate_contours(fill_rule)?;
        mesh.colors = vec![color.packed(); mesh.num_vertices() as usize];
        Some(mesh)
    }

    /// Stroke a polyline at `width` with the given caps and joins.
    pub fn polyline_stroke(
        &mut self,
        pos: &[f32],
        closed: bool,
        width: f32,
        cap: LineCap,
        join: LineJoin,
    ) -> Mesh {
        self.tessellate_stroke(pos, closed, width, cap, join, None)
    }

    /// AA stroke: widened by the fringe, per-vertex colors baked.
    pub fn polyline_stroke_aa(
        &mut self,
        pos: &[f32],
        closed: bool,
        color: Color,
        width: f32,
        cap: LineCap,
        join: LineJoin,
    ) -> Mesh {
        self.tessellate_stroke(pos, closed, width + self.fringe, cap, join, Some(color))
    }

    /// Sub-pixel stroke: geometry at fringe width, alpha compensation is
    /// the caller's job.
    pub fn polyline_stroke_aa_thin(
        &mut self,
        pos: &[f32],
        closed: bool,
        color: Color,
        cap: LineCap,
        join: LineJoin,
    ) -> Mesh {
        self.tessellate_stroke(pos, closed, self.fringe, cap, join, Some(color))
    }

    fn tessellate_contours(&mut self, fill_rule: FillRule) -> Option<Mesh> {
        let mut builder = lyon::path::Path::builder();
        let mut any = false;
        for contour in &self.contours {
            if contour.len() < 6 {
                continue;
            }
            builder.begin(point(contour[0], contour[1]));
            for p in contour[2..].chunks_exact(2) {
                builder.line_to(point(p[0], p[1]));
            }
            builder.end(true);
            any = true;
        }
        if !any {
            return None;
        }
        let path = builder.build();

        let options = FillOptions::tolerance(self.tolerance).with_fill_rule(match fill_rule {
            FillRule::NonZero => lyon::lyon_tessellation::FillRule::NonZero,
            FillRule::EvenOdd => lyon::lyon_tessellation::FillRule::EvenOdd,
        });

        let mut geometry: VertexBuffers<[f32; 2], u16> = VertexBuffers::new();
        let result = self.fill_tess.tessellate_path(
            &path,
            &options,
            &mut BuffersBuilder::new(&mut geometry, |vertex: FillVertex| {
                vertex.position().to_array()
            }),
        );
        if result.is_err() {
            return None;
        }
        if geometry.indices.is_empty() {
            return None;
        }

        Some(Mesh {
            positions: geometry.vertices.iter().flatten().copied().collect(),
            colors: Vec::new(),
            indices: geometry.indices,
        })
    }

    fn tessellate_stroke(
        &mut self,
        pos: &[f32],
        closed: bool,
        width: f32,
        cap: LineCap,
        join: LineJoin,
        color: Option<Color>,
    ) -> Mesh {
        debug_assert!(pos.len() >= 4);

        let mut builder = lyon::path::Path::builder();
        builder.begin(point(pos[0], pos[1]));
        for p in pos[2..].chunks_exact(2) {
            builder.line_to(point(p[0], p[1]));
        }
        builder.end(closed);
        let path = builder.build();

        let options = StrokeOptions::default()
            .with_line_width(width)
            .with_tolerance(self.tolerance)
            .with_line_cap(match cap {
                LineCap::Butt => lyon::lyon_tessellation::LineCap::Butt,
                LineCap::Round => lyon::lyon_tessellation::LineCap::Round,
                LineCap::Square => lyon::lyon_tessellation::LineCap::Square,
            })
            .with_line_join(match join {
                LineJoin::Miter => lyon::lyon_tessellation::LineJoin::Miter,
                LineJoin::Round => lyon::lyon_tessellation::LineJoin::Round,
                LineJoin::Bevel => lyon::lyon_tessellation::LineJoin::Bevel,
            });

        let mut geometry: VertexBuffers<[f32; 2], u16> = VertexBuffers::new();
        let result = self.stroke_tess.tessellate_path(
            &path,
            &options,
            &mut BuffersBuilder::new(&mut geometry, |vertex: StrokeVertex| {
                vertex.position().to_array()
            }),
        );
        if let Err(err) = result {
            tracing::warn!("stroke tessellation failed: {err:?}");
            return Mesh::default();
        }

        let colors = match color {
            Some(c) => vec![c.packed(); geometry.vertices.len()],
            None => Vec::new(),
        };

        Mesh {
            positions: geometry.vertices.iter().flatten().copied().collect(),
            colors,
            indices: geometry.indices,
        }
    }
}

impl Default for Stroker {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-vertex miter offset directions pointing out of the polygon
fn miter_offsets(pos: &[f32]) -> Vec<[f32; 2]> {
    let n = pos.len() / 2;
    let mut offsets = Vec::with_capacity(n);

    // Signed area decides which side is "out"
    let mut area = 0.0f32;
    for i in 0..n {
        let j = (i + 1) % n;
        area += pos[i * 2] * pos[j * 2 + 1] - pos[j * 2] * pos[i * 2 + 1];
    }
    let flip = if area < 0.0 { -1.0 } else { 1.0 };

    for i in 0..n {
        let prev = (i + n - 1) % n;
        let next = (i + 1) % n;
        let d0 = edge_dir(pos, prev, i);
        let d1 = edge_dir(pos, i, next);
        let n0 = [d0[1], -d0[0]];
        let n1 = [d1[1], -d1[0]];
        let mut dm = [(n0[0] + n1[0]) * 0.5, (n0[1] + n1[1]) * 0.5];
        let dmr2 = dm[0] * dm[0] + dm[1] * dm[1];
        if dmr2 > 1e-6 {
            let s = (1.0 / dmr2).min(600.0);
            dm[0] *= s;
            dm[1] *= s;
        }
        offsets.push([dm[0] * flip, dm[1] * flip]);
    }

    offsets
}

fn edge_dir(pos: &[f32], from: usize, to: usize) -> [f32; 2] {
    let dx = pos[to * 2] - pos[from * 2];
    let dy = pos[to * 2 + 1] - pos[from * 2 + 1];
    let len = (dx * dx + dy * dy).sqrt();
    if len > 1e-6 {
        [dx / len, dy / len]
    } else {
        [0.0, 0.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: [f32; 8] = [0.0, 0.0, 0.0, 10.0, 10.0, 10.0, 10.0, 0.0];

    #[test]
    fn test_convex_fill_quad() {
        let mut stroker = Stroker::new();
        stroker.reset(1.0, 0.25, 1.0);
        let mesh = stroker.convex_fill(&QUAD);
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert!(mesh.colors.is_empty());
    }

    #[test]
    fn test_convex_fill_aa_adds_fringe_ring() {
        let mut stroker = Stroker::new();
        stroker.reset(1.0, 0.25, 1.0);
        let mesh = stroker.convex_fill_aa(&QUAD, Color::RED);
        assert_eq!(mesh.num_vertices(), 8);
        assert_eq!(mesh.colors.len(), 8);
        // Inner ring opaque, outer ring transparent
        assert_eq!(Color::from_packed(mesh.colors[0]).alpha(), 255);
        assert_eq!(Color::from_packed(mesh.colors[4]).alpha(), 0);
        // Fan (2 tris) + fringe strip (8 tris)
        assert_eq!(mesh.indices.len(), 6 + 24);
    }

    #[test]
    fn test_concave_fill() {
        let mut stroker = Stroker::new();
        stroker.reset(1.0, 0.25, 1.0);
        stroker.concave_fill_begin();
        // L-shape (concave)
        stroker.concave_fill_add_contour(&[
            0.0, 0.0, 0.0, 20.0, 20.0, 20.0, 20.0, 10.0, 10.0, 10.0, 10.0, 0.0,
        ]);
        let mesh = stroker.concave_fill_end(FillRule::NonZero).unwrap();
        assert!(mesh.num_vertices() >= 6);
        assert_eq!(mesh.indices.len() % 3, 0);
        assert!(mesh.colors.is_empty());
    }

    #[test]
    fn test_concave_fill_aa_has_vertex_colors() {
        let mut stroker = Stroker::new();
        stroker.reset(1.0, 0.25, 1.0);
        stroker.concave_fill_begin();
        stroker.concave_fill_add_contour(&[
            0.0, 0.0, 0.0, 20.0, 20.0, 20.0, 20.0, 10.0, 10.0, 10.0, 10.0, 0.0,
        ]);
        let mesh = stroker
            .concave_fill_end_aa(Color::GREEN, FillRule::EvenOdd)
            .unwrap();
        assert_eq!(mesh.colors.len(), mesh.num_vertices() as usize);
    }

    #[test]
    fn test_concave_fill_empty_contours() {
        let mut stroker = Stroker::new();
        stroker.reset(1.0, 0.25, 1.0);
        stroker.concave_fill_begin();
        assert!(stroker.concave_fill_end(FillRule::NonZero).is_none());
    }

    #[test]
    fn test_stroke_open_line() {
        let mut stroker = Stroker::new();
        stroker.reset(1.0, 0.25, 1.0);
        let mesh = stroker.polyline_stroke(
            &[0.0, 0.0, 100.0, 0.0],
            false,
            4.0,
            LineCap::Butt,
            LineJoin::Miter,
        );
        assert!(!mesh.is_empty());
        assert!(mesh.colors.is_empty());
        // A straight butt-capped segment is a quad (or strip thereof)
        assert!(mesh.num_vertices() >= 4);
        assert_eq!(mesh.indices.len() % 3, 0);
    }

    #[test]
    fn test_stroke_aa_bakes_colors() {
        let mut stroker = Stroker::new();
        stroker.reset(1.0, 0.25, 1.0);
        let mesh = stroker.polyline_stroke_aa(
            &[0.0, 0.0, 50.0, 50.0, 100.0, 0.0],
            false,
            Color::BLUE,
            2.0,
            LineCap::Round,
            LineJoin::Round,
        );
        assert!(!mesh.is_empty());
        assert_eq!(mesh.colors.len(), mesh.num_vertices() as usize);
    }
}
