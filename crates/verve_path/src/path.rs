//! Path construction and curve flattening
//!
//! Paths are recorded in local (untransformed) coordinates and flattened
//! immediately: curves become polyline vertices at a tolerance derived
//! from the context's tessellation tolerance and the current average
//! scale, so screen-space error stays bounded after the transform.

use verve_core::Winding;

/// Bezier circle approximation constant
const KAPPA90: f32 = 0.552_284_8;

/// Recursion limit for adaptive bezier subdivision
const MAX_BEZIER_DEPTH: u32 = 10;

/// A maximal run of vertices between `move_to`s
#[derive(Clone, Copy, Debug)]
pub struct SubPath {
    pub first_vertex: u32,
    pub num_vertices: u32,
    pub is_closed: bool,
}

/// Flattened path: interleaved x/y vertices plus subpath ranges
pub struct Path {
    vertices: Vec<f32>,
    sub_paths: Vec<SubPath>,
    /// Local-space flattening tolerance
    tess_tol: f32,
    /// Minimum distance between consecutive vertices
    dist_tol: f32,
}

impl Path {
    pub fn new() -> Self {
        Path {
            vertices: Vec::new(),
            sub_paths: Vec::new(),
            tess_tol: 0.25,
            dist_tol: 0.01,
        }
    }

    /// Start a fresh path. `tolerance` is the screen-space tessellation
    /// tolerance; `avg_scale` maps it back into local space.
    pub fn reset(&mut self, avg_scale: f32, tolerance: f32) {
        let scale = avg_scale.max(1e-4);
        self.tess_tol = tolerance / scale;
        self.dist_tol = 0.01 / scale;
        self.vertices.clear();
        self.sub_paths.clear();
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        let first = self.vertices.len() as u32 / 2;
        self.sub_paths.push(SubPath {
            first_vertex: first,
            num_vertices: 0,
            is_closed: false,
        });
        self.push_vertex(x, y);
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        self.ensure_sub_path(x, y);
        self.push_vertex(x, y);
    }

    pub fn cubic_to(&mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) {
        let [sx, sy] = match self.last_vertex() {
            Some(p) => p,
            None => {
                self.move_to(x, y);
                return;
            }
        };
        self.flatten_cubic(sx, sy, c1x, c1y, c2x, c2y, x, y, 0);
        self.push_vertex(x, y);
    }

    pub fn quadratic_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        let [sx, sy] = match self.last_vertex() {
            Some(p) => p,
            None => {
                self.move_to(x, y);
                return;
            }
        };
        // Elevate to cubic
        let c1x = sx + (2.0 / 3.0) * (cx - sx);
        let c1y = sy + (2.0 / 3.0) * (cy - sy);
        let c2x = x + (2.0 / 3.0) * (cx - x);
        let c2y = y + (2.0 / 3.0) * (cy - y);
        self.cubic_to(c1x, c1y, c2x, c2y, x, y);
    }

    pub fn arc(&mut self, cx: f32, cy: f32, r: f32, a0: f32, a1: f32, dir: Winding) {
        if r < 1e-5 {
            return;
        }

        let two_pi = std::f32::consts::TAU;
        let mut da = a1 - a0;
        match dir {
            Winding::Ccw => {
                if da.abs() >= two_pi {
                    da = two_pi;
                } else {
                    while da < 0.0 {
                        da += two_pi;
                    }
                }
            }
            Winding::Cw => {
                if da.abs() >= two_pi {
                    da = -two_pi;
                } else {
                    while da > 0.0 {
                        da -= two_pi;
                    }
                }
            }
        }

        // Angular step bounded by the chord error tolerance
        let dtheta = 2.0 * (1.0 - (self.tess_tol / r).clamp(0.0, 0.5)).acos().max(1e-3);
        let num_steps = ((da.abs() / dtheta).ceil() as u32).clamp(2, 5000);

        for i in 0..=num_steps {
            let a = a0 + da * (i as f32 / num_steps as f32);
            let x = cx + a.cos() * r;
            let y = cy + a.sin() * r;
            if i == 0 {
                if self.sub_paths.is_empty() {
                    self.move_to(x, y);
                } else {
                    self.line_to(x, y);
                }
            } else {
                self.line_to(x, y);
            }
        }
    }

    /// Arc between the tangents to `(x1, y1)` and `(x2, y2)` with radius
    /// `r`, starting from the current point.
    pub fn arc_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, r: f32) {
        let [x0, y0] = match self.last_vertex() {
            Some(p) => p,
            None => return,
        };

        if pt_equals(x0, y0, x1, y1, self.dist_tol)
            || pt_equals(x1, y1, x2, y2, self.dist_tol)
            || dist_pt_seg(x1, y1, x0, y0, x2, y2) < self.dist_tol * self.dist_tol
            || r < self.dist_tol
        {
            self.line_to(x1, y1);
            return;
        }

        let d0 = normalize(x0 - x1, y0 - y1);
        let d1 = normalize(x2 - x1, y2 - y1);
        let a = (d0[0] * d1[0] + d0[1] * d1[1]).clamp(-1.0, 1.0).acos();
        let d = r / (a / 2.0).tan();

        if d > 10000.0 {
            self.line_to(x1, y1);
            return;
        }

        let cross = d1[0] * d0[1] - d0[0] * d1[1];
        let (cx, cy, a0, a1, dir) = if cross > 0.0 {
            let cx = x1 + d0[0] * d + d0[1] * r;
            let cy = y1 + d0[1] * d - d0[0] * r;
            let a0 = d0[0].atan2(-d0[1]);
            let a1 = (-d1[0]).atan2(d1[1]);
            (cx, cy, a0, a1, Winding::Cw)
        } else {
            let cx = x1 + d0[0] * d - d0[1] * r;
            let cy = y1 + d0[1] * d + d0[0] * r;
            let a0 = (-d0[0]).atan2(d0[1]);
            let a1 = d1[0].atan2(-d1[1]);
            (cx, cy, a0, a1, Winding::Ccw)
        };

        self.arc(cx, cy, r, a0, a1, dir);
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.move_to(x, y);
        self.line_to(x, y + h);
        self.line_to(x + w, y + h);
        self.line_to(x + w, y);
        self.close();
    }

    pub fn rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, r: f32) {
        self.rounded_rect_varying(x, y, w, h, r, r, r, r);
    }

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
        if rtl < 0.1 && rtr < 0.1 && rbr < 0.1 && rbl < 0.1 {
            self.rect(x, y, w, h);
            return;
        }

        let half_w = w.abs() * 0.5;
        let half_h = h.abs() * 0.5;
        let sign_w = w.signum();
        let sign_h = h.signum();
        let rx_tl = rtl.min(half_w) * sign_w;
        let ry_tl = rtl.min(half_h) * sign_h;
        let rx_tr = rtr.min(half_w) * sign_w;
        let ry_tr = rtr.min(half_h) * sign_h;
        let rx_br = rbr.min(half_w) * sign_w;
        let ry_br = rbr.min(half_h) * sign_h;
        let rx_bl = rbl.min(half_w) * sign_w;
        let ry_bl = rbl.min(half_h) * sign_h;

        self.move_to(x, y + ry_tl);
        self.line_to(x, y + h - ry_bl);
        self.cubic_to(
            x,
            y + h - ry_bl * (1.0 - KAPPA90),
            x + rx_bl * (1.0 - KAPPA90),
            y + h,
            x + rx_bl,
            y + h,
        );
        self.line_to(x + w - rx_br, y + h);
        self.cubic_to(
            x + w - rx_br * (1.0 - KAPPA90),
            y + h,
            x + w,
            y + h - ry_br * (1.0 - KAPPA90),
            x + w,
            y + h - ry_br,
        );
        self.line_to(x + w, y + ry_tr);
        self.cubic_to(
            x + w,
            y + ry_tr * (1.0 - KAPPA90),
            x + w - rx_tr * (1.0 - KAPPA90),
            y,
            x + w - rx_tr,
            y,
        );
        self.line_to(x + rx_tl, y);
        self.cubic_to(
            x + rx_tl * (1.0 - KAPPA90),
            y,
            x,
            y + ry_tl * (1.0 - KAPPA90),
            x,
            y + ry_tl,
        );
        self.close();
    }

    pub fn circle(&mut self, cx: f32, cy: f32, radius: f32) {
        self.ellipse(cx, cy, radius, radius);
    }

    pub fn ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32) {
        self.move_to(cx - rx, cy);
        self.cubic_to(
            cx - rx,
            cy + ry * KAPPA90,
            cx - rx * KAPPA90,
            cy + ry,
            cx,
            cy + ry,
        );
        self.cubic_to(
            cx + rx * KAPPA90,
            cy + ry,
            cx + rx,
            cy + ry * KAPPA90,
            cx + rx,
            cy,
        );
        self.cubic_to(
            cx + rx,
            cy - ry * KAPPA90,
            cx + rx * KAPPA90,
            cy - ry,
            cx,
            cy - ry,
        );
        self.cubic_to(
            cx - rx * KAPPA90,
            cy - ry,
            cx - rx,
            cy - ry * KAPPA90,
            cx - rx,
            cy,
        );
        self.close();
    }

    /// Append raw polyline points (interleaved x/y) to the current
    /// subpath.
    pub fn polyline(&mut self, coords: &[f32]) {
        debug_assert_eq!(coords.len() % 2, 0);
        for p in coords.chunks_exact(2) {
            self.line_to(p[0], p[1]);
        }
    }

    pub fn close(&mut self) {
        let dist_tol = self.dist_tol;
        let verts = &mut self.vertices;
        if let Some(sp) = self.sub_paths.last_mut() {
            // Drop a final vertex that duplicates the first.
            if sp.num_vertices > 1 {
                let first = sp.first_vertex as usize * 2;
                let last = (sp.first_vertex + sp.num_vertices - 1) as usize * 2;
                if pt_equals(
                    verts[first],
                    verts[first + 1],
                    verts[last],
                    verts[last + 1],
                    dist_tol,
                ) {
                    verts.truncate(last);
                    sp.num_vertices -= 1;
                }
            }
            sp.is_closed = true;
        }
    }

    pub fn sub_paths(&self) -> &[SubPath] {
        &self.sub_paths
    }

    pub fn num_sub_paths(&self) -> u32 {
        self.sub_paths.len() as u32
    }

    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    pub fn num_vertices(&self) -> u32 {
        self.vertices.len() as u32 / 2
    }

    fn ensure_sub_path(&mut self, x: f32, y: f32) {
        if self.sub_paths.is_empty() {
            self.move_to(x, y);
        }
    }

    fn last_vertex(&self) -> Option<[f32; 2]> {
        let sp = self.sub_paths.last()?;
        if sp.num_vertices == 0 {
            return None;
        }
        let i = (sp.first_vertex + sp.num_vertices - 1) as usize * 2;
        Some([self.vertices[i], self.vertices[i + 1]])
    }

    fn push_vertex(&mut self, x: f32, y: f32) {
        if let Some([lx, ly]) = self.last_vertex() {
            if pt_equals(lx, ly, x, y, self.dist_tol) {
                return;
            }
        }
        self.vertices.push(x);
        self.vertices.push(y);
        if let Some(sp) = self.sub_paths.last_mut() {
            sp.num_vertices += 1;
        }
    }

    /// Adaptive subdivision; emits interior vertices only (the caller
    /// pushes the endpoint).
    #[allow(clippy::too_many_arguments)]
    fn flatten_cubic(
        &mut self,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        x3: f32,
        y3: f32,
        x4: f32,
        y4: f32,
        depth: u32,
    ) {
        if depth >= MAX_BEZIER_DEPTH {
            return;
        }

        // Flatness: distance of the control points from the chord
        let dx = x4 - x1;
        let dy = y4 - y1;
        let d2 = ((x2 - x4) * dy - (y2 - y4) * dx).abs();
        let d3 = ((x3 - x4) * dy - (y3 - y4) * dx).abs();
        if (d2 + d3) * (d2 + d3) < self.tess_tol * (dx * dx + dy * dy) {
            return;
        }

        let x12 = (x1 + x2) * 0.5;
        let y12 = (y1 + y2) * 0.5;
        let x23 = (x2 + x3) * 0.5;
        let y23 = (y2 + y3) * 0.5;
        let x34 = (x3 + x4) * 0.5;
        let y34 = (y3 + y4) * 0.5;
        let x123 = (x12 + x23) * 0.5;
        let y123 = (y12 + y23) * 0.5;
        let x234 = (x23 + x34) * 0.5;
        let y234 = (y23 + y34) * 0.5;
        let x1234 = (x123 + x234) * 0.5;
        let y1234 = (y123 + y234) * 0.5;

        self.flatten_cubic(x1, y1, x12, y12, x123, y123, x1234, y1234, depth + 1);
        self.push_vertex(x1234, y1234);
        self.flatten_cubic(x1234, y1234, x234, y234, x34, y34, x4, y4, depth + 1);
    }
}

impl Default for Path {
    fn default() -> Self {
        Self::new()
    }
}

fn pt_equals(x0: f32, y0: f32, x1: f32, y1: f32, tol: f32) -> bool {
    let dx = x1 - x0;
    let dy = y1 - y0;
    dx * dx + dy * dy < tol * tol
}

fn dist_pt_seg(x: f32, y: f32, px: f32, py: f32, qx: f32, qy: f32) -> f32 {
    let pqx = qx - px;
    let pqy = qy - py;
    let dx = x - px;
    let dy = y - py;
    let d = pqx * pqx + pqy * pqy;
    let mut t = pqx * dx + pqy * dy;
    if d > 0.0 {
        t /= d;
    }
    let t = t.clamp(0.0, 1.0);
    let ex = px + t * pqx - x;
    let ey = py + t * pqy - y;
    ex * ex + ey * ey
}

fn normalize(x: f32, y: f32) -> [f32; 2] {
    let len = (x * x + y * y).sqrt();
    if len > 1e-6 {
        [x / len, y / len]
    } else {
        [0.0, 0.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Path {
        let mut p = Path::new();
        p.reset(1.0, 0.25);
        p
    }

    #[test]
    fn test_rect_is_one_closed_subpath_of_four() {
        let mut p = fresh();
        p.rect(10.0, 10.0, 20.0, 20.0);
        assert_eq!(p.num_sub_paths(), 1);
        let sp = p.sub_paths()[0];
        assert_eq!(sp.num_vertices, 4);
        assert!(sp.is_closed);
    }

    #[test]
    fn test_move_to_starts_new_subpath() {
        let mut p = fresh();
        p.move_to(0.0, 0.0);
        p.line_to(10.0, 0.0);
        p.move_to(20.0, 0.0);
        p.line_to(30.0, 0.0);
        assert_eq!(p.num_sub_paths(), 2);
        assert_eq!(p.sub_paths()[0].num_vertices, 2);
        assert_eq!(p.sub_paths()[1].num_vertices, 2);
    }

    #[test]
    fn test_circle_flattens_to_many_vertices() {
        let mut p = fresh();
        p.circle(50.0, 50.0, 25.0);
        assert_eq!(p.num_sub_paths(), 1);
        assert!(p.sub_paths()[0].num_vertices > 8);
        assert!(p.sub_paths()[0].is_closed);
    }

    #[test]
    fn test_finer_tolerance_adds_vertices() {
        let mut coarse = Path::new();
        coarse.reset(1.0, 1.0);
        coarse.circle(0.0, 0.0, 100.0);

        let mut fine = Path::new();
        fine.reset(1.0, 0.01);
        fine.circle(0.0, 0.0, 100.0);

        assert!(fine.num_vertices() > coarse.num_vertices());
    }

    #[test]
    fn test_duplicate_vertices_dropped() {
        let mut p = fresh();
        p.move_to(5.0, 5.0);
        p.line_to(5.0, 5.0);
        p.line_to(5.0, 5.0);
        assert_eq!(p.sub_paths()[0].num_vertices, 1);
    }

    #[test]
    fn test_close_drops_duplicate_endpoint() {
        let mut p = fresh();
        p.move_to(0.0, 0.0);
        p.line_to(10.0, 0.0);
        p.line_to(10.0, 10.0);
        p.line_to(0.0, 0.0);
        p.close();
        let sp = p.sub_paths()[0];
        assert_eq!(sp.num_vertices, 3);
        assert!(sp.is_closed);
    }

    #[test]
    fn test_arc_line_connects_from_current_point() {
        let mut p = fresh();
        p.move_to(0.0, 0.0);
        p.arc(50.0, 0.0, 10.0, 0.0, std::f32::consts::PI, Winding::Ccw);
        // Arc appended to the existing subpath rather than starting a new
        // one.
        assert_eq!(p.num_sub_paths(), 1);
        assert!(p.sub_paths()[0].num_vertices > 3);
    }
}
