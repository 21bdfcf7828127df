//! Memoized geometric queries shared by the filler, builder and selector.
//!
//! A [`Context`] lives for one run. Its caches are append-only maps behind
//! mutexes: pair workers read concurrently and insert results they compute;
//! a repeated query for the same quantized point is a lookup.

use crate::intersect;
use lathe_geom::{Curve3, Line3, Surface};
use lathe_math::{precision, Dir3, Point2, Point3, Vec3};
use lathe_topo::{EdgeId, FaceId, Model, SolidId};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Mutex;

/// Where a point sits relative to a face or solid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Strictly inside.
    In,
    /// Strictly outside.
    Out,
    /// On the boundary within tolerance. Numerically ambiguous queries
    /// land here, never in an error.
    On,
}

fn quantize(p: &Point3) -> [i64; 3] {
    [
        (p.x / precision::CONFUSION).round() as i64,
        (p.y / precision::CONFUSION).round() as i64,
        (p.z / precision::CONFUSION).round() as i64,
    ]
}

fn cross_2d(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    ax * by - ay * bx
}

/// Winding-number point-in-polygon test in UV space.
pub fn point_in_polygon(point: &Point2, polygon: &[Point2]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut winding = 0i32;
    for i in 0..n {
        let j = (i + 1) % n;
        let yi = polygon[i].y;
        let yj = polygon[j].y;
        if yi <= point.y {
            if yj > point.y {
                let val = cross_2d(
                    polygon[j].x - polygon[i].x,
                    polygon[j].y - polygon[i].y,
                    point.x - polygon[i].x,
                    point.y - polygon[i].y,
                );
                if val > 0.0 {
                    winding += 1;
                }
            }
        } else if yj <= point.y {
            let val = cross_2d(
                polygon[j].x - polygon[i].x,
                polygon[j].y - polygon[i].y,
                point.x - polygon[i].x,
                point.y - polygon[i].y,
            );
            if val < 0.0 {
                winding -= 1;
            }
        }
    }
    winding != 0
}

/// Signed area of a UV polygon (positive when counter-clockwise).
pub fn polygon_area(polygon: &[Point2]) -> f64 {
    let n = polygon.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += polygon[i].x * polygon[j].y - polygon[j].x * polygon[i].y;
    }
    area * 0.5
}

/// Sample one wire of a face into a UV polygon.
///
/// On periodic surfaces the u coordinate is unwrapped so consecutive
/// samples stay continuous across the seam.
pub fn wire_uv_polygon(model: &Model, face: FaceId, wire: &lathe_topo::Wire) -> Vec<Point2> {
    let surface = &model.faces[face].surface;
    let periodic = !matches!(surface, Surface::Plane(_));
    let mut pts: Vec<Point2> = Vec::new();
    for &eu in &wire.edges {
        let mut poly = model.edge_polyline(eu, 16);
        poly.pop();
        for p in &poly {
            let mut uv = surface.project(p);
            if periodic {
                if let Some(prev) = pts.last() {
                    while uv.x - prev.x > PI {
                        uv.x -= 2.0 * PI;
                    }
                    while uv.x - prev.x < -PI {
                        uv.x += 2.0 * PI;
                    }
                }
            }
            pts.push(uv);
        }
    }
    reanchor_polar_loop(surface, &mut pts);
    pts
}

/// Close a UV polygon that wraps the sphere's seam through a pole.
///
/// A loop crossing the seam on both sides of a pole unwraps to samples a
/// full period apart, because the pole chord that joins the two seam runs
/// carries no u of its own. Shifting everything past the last polar sample
/// back by the accumulated period restores a closed polygon.
pub(crate) fn reanchor_polar_loop(surface: &Surface, pts: &mut [Point2]) {
    if !matches!(surface, Surface::Sphere(_)) || pts.len() < 2 {
        return;
    }
    let period = 2.0 * PI;
    let k = ((pts[pts.len() - 1].x - pts[0].x) / period).round();
    if k == 0.0 {
        return;
    }
    let polar = 0.5 * PI - 1e-3;
    if let Some(cut) = pts.iter().rposition(|q| q.y.abs() >= polar) {
        for q in &mut pts[cut + 1..] {
            q.x -= k * period;
        }
    }
}

/// Memoized query context for one run.
#[derive(Debug, Default)]
pub struct Context {
    face_cache: Mutex<HashMap<(FaceId, [i64; 3]), Position>>,
    solid_cache: Mutex<HashMap<(SolidId, [i64; 3]), Position>>,
}

impl Context {
    /// Fresh context with empty caches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameter and distance of the closest point on a bounded edge.
    pub fn project_point_on_edge(&self, model: &Model, edge: EdgeId, p: &Point3) -> (f64, f64) {
        let e = &model.edges[edge];
        let mut t = e.curve.project(p);
        if e.curve.is_periodic() {
            // Fold into the edge's parameter window.
            while t > e.t_end {
                t -= 2.0 * PI;
            }
            while t < e.t_start {
                t += 2.0 * PI;
            }
            if t > e.t_end {
                // Doesn't fit the window; clamp to the nearer end.
                let d_start = (e.curve.evaluate(e.t_start) - p).norm();
                let d_end = (e.curve.evaluate(e.t_end) - p).norm();
                t = if d_start < d_end { e.t_start } else { e.t_end };
            }
        } else {
            t = t.clamp(e.t_start, e.t_end);
        }
        (t, (e.curve.evaluate(t) - p).norm())
    }

    /// Classify a point against a bounded face.
    ///
    /// `tol` is the full matching tolerance. Points further than `tol`
    /// from the supporting surface are Out regardless of UV.
    pub fn classify_point_on_face(
        &self,
        model: &Model,
        face: FaceId,
        p: &Point3,
        tol: f64,
    ) -> Position {
        let key = (face, quantize(p));
        if let Ok(cache) = self.face_cache.lock() {
            if let Some(&pos) = cache.get(&key) {
                return pos;
            }
        }
        let pos = self.classify_point_on_face_uncached(model, face, p, tol);
        if let Ok(mut cache) = self.face_cache.lock() {
            cache.insert(key, pos);
        }
        pos
    }

    fn classify_point_on_face_uncached(
        &self,
        model: &Model,
        face: FaceId,
        p: &Point3,
        tol: f64,
    ) -> Position {
        let f = &model.faces[face];
        if f.surface.distance(p) > tol {
            return Position::Out;
        }
        // On any boundary edge -> On.
        for edge in model.face_edges(face) {
            let edge_tol = model.edges[edge].tolerance;
            let (_, dist) = self.project_point_on_edge(model, edge, p);
            if dist <= tol.max(edge_tol) {
                return Position::On;
            }
        }
        let outer = wire_uv_polygon(model, face, &f.outer);
        // A face whose outer wire collapses in UV (a seam traversed both
        // ways) covers the whole closed surface.
        if polygon_area(&outer).abs() < precision::SQUARE_CONFUSION {
            return Position::In;
        }
        let uv = f.surface.project(p);
        let inside_outer = uv_in_polygon(&f.surface, &uv, &outer);
        if !inside_outer {
            return Position::Out;
        }
        for inner in &f.inners {
            let hole = wire_uv_polygon(model, face, inner);
            if uv_in_polygon(&f.surface, &uv, &hole) {
                return Position::Out;
            }
        }
        Position::In
    }

    /// Classify a point against a solid by parity ray casting.
    pub fn point_in_solid(
        &self,
        model: &Model,
        solid: SolidId,
        p: &Point3,
        tol: f64,
    ) -> Position {
        let key = (solid, quantize(p));
        if let Ok(cache) = self.solid_cache.lock() {
            if let Some(&pos) = cache.get(&key) {
                return pos;
            }
        }
        let pos = self.point_in_solid_uncached(model, solid, p, tol);
        if let Ok(mut cache) = self.solid_cache.lock() {
            cache.insert(key, pos);
        }
        pos
    }

    fn point_in_solid_uncached(
        &self,
        model: &Model,
        solid: SolidId,
        p: &Point3,
        tol: f64,
    ) -> Position {
        let faces = model.solid_faces(solid);
        for &face in &faces {
            if self.classify_point_on_face_uncached(model, face, p, tol) != Position::Out {
                return Position::On;
            }
        }
        // Tilted directions; retried when a ray grazes a boundary.
        let dirs = [
            Vec3::new(1.0, 1e-4, 1.3e-4),
            Vec3::new(0.13, 1.0, 2.9e-4),
            Vec3::new(3.1e-4, 0.21, 1.0),
        ];
        'dirs: for dir in dirs {
            let ray = Curve3::Line(Line3 {
                origin: *p,
                direction: Dir3::new_normalize(dir),
            });
            let mut crossings = 0u32;
            for &face in &faces {
                let surface = &model.faces[face].surface;
                let hits =
                    intersect::curve_surface(&ray, (tol, precision::INFINITE), surface, tol);
                for hit in hits {
                    match self.classify_point_on_face_uncached(model, face, &hit.point, tol) {
                        Position::In => crossings += 1,
                        Position::On => continue 'dirs, // grazing; retry
                        Position::Out => {}
                    }
                }
            }
            return if crossings % 2 == 1 {
                Position::In
            } else {
                Position::Out
            };
        }
        // Every ray grazed a boundary; the point is effectively on it.
        Position::On
    }

    /// A representative interior point of a face, in UV and 3D.
    pub fn face_sample_point(&self, model: &Model, face: FaceId) -> Option<(Point2, Point3)> {
        let f = &model.faces[face];
        let outer = wire_uv_polygon(model, face, &f.outer);
        if polygon_area(&outer).abs() < precision::SQUARE_CONFUSION {
            // Whole closed surface; any point off the seam works.
            let uv = Point2::new(PI, 0.0);
            return Some((uv, f.surface.evaluate(uv)));
        }
        let holes: Vec<Vec<Point2>> = f
            .inners
            .iter()
            .map(|w| wire_uv_polygon(model, face, w))
            .collect();
        let inside = |uv: &Point2| {
            point_in_polygon(uv, &outer) && holes.iter().all(|h| !point_in_polygon(uv, h))
        };

        // Centroid first, then midpoints of boundary segments nudged inward.
        let n = outer.len() as f64;
        let centroid = Point2::new(
            outer.iter().map(|q| q.x).sum::<f64>() / n,
            outer.iter().map(|q| q.y).sum::<f64>() / n,
        );
        if inside(&centroid) {
            return Some((centroid, f.surface.evaluate(centroid)));
        }
        for i in 0..outer.len() {
            let j = (i + 1) % outer.len();
            let mid = Point2::new(
                0.5 * (outer[i].x + outer[j].x),
                0.5 * (outer[i].y + outer[j].y),
            );
            let seg = outer[j] - outer[i];
            let len = seg.norm();
            if len < precision::CONFUSION {
                continue;
            }
            // Inward is to the left of a CCW boundary.
            let normal = lathe_math::Vec2::new(-seg.y, seg.x) / len;
            for scale in [1e-3, 1e-2, 1e-1] {
                let cand = Point2::new(mid.x + normal.x * len * scale, mid.y + normal.y * len * scale);
                if inside(&cand) {
                    return Some((cand, f.surface.evaluate(cand)));
                }
                let cand = Point2::new(mid.x - normal.x * len * scale, mid.y - normal.y * len * scale);
                if inside(&cand) {
                    return Some((cand, f.surface.evaluate(cand)));
                }
            }
        }
        None
    }
}

/// Point-in-polygon with periodic u candidates for closed surfaces.
fn uv_in_polygon(surface: &Surface, uv: &Point2, polygon: &[Point2]) -> bool {
    if matches!(surface, Surface::Plane(_)) {
        return point_in_polygon(uv, polygon);
    }
    for k in [-1.0, 0.0, 1.0] {
        let cand = Point2::new(uv.x + k * 2.0 * PI, uv.y);
        if point_in_polygon(&cand, polygon) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use lathe_primitives::{make_box, make_sphere};

    #[test]
    fn test_point_in_polygon_square() {
        let square = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        assert!(point_in_polygon(&Point2::new(0.5, 0.5), &square));
        assert!(!point_in_polygon(&Point2::new(1.5, 0.5), &square));
        assert!(!point_in_polygon(&Point2::new(-0.1, 0.9), &square));
    }

    #[test]
    fn test_polygon_area_sign() {
        let ccw = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        assert!((polygon_area(&ccw) - 2.0).abs() < 1e-12);
        let cw: Vec<_> = ccw.iter().rev().copied().collect();
        assert!((polygon_area(&cw) + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_classify_on_box_face() {
        let b = make_box(2.0, 2.0, 2.0);
        let ctx = Context::new();
        // The z=0 face.
        let face = b
            .model
            .solid_faces(b.solid)
            .into_iter()
            .find(|&f| {
                let (_, p) = ctx.face_sample_point(&b.model, f).unwrap();
                p.z.abs() < 1e-9
            })
            .unwrap();
        let tol = precision::CONFUSION;
        assert_eq!(
            ctx.classify_point_on_face(&b.model, face, &Point3::new(1.0, 1.0, 0.0), tol),
            Position::In
        );
        assert_eq!(
            ctx.classify_point_on_face(&b.model, face, &Point3::new(5.0, 1.0, 0.0), tol),
            Position::Out
        );
        assert_eq!(
            ctx.classify_point_on_face(&b.model, face, &Point3::new(1.0, 1.0, 1.0), tol),
            Position::Out
        );
        assert_eq!(
            ctx.classify_point_on_face(&b.model, face, &Point3::new(0.0, 1.0, 0.0), tol),
            Position::On
        );
    }

    #[test]
    fn test_point_in_box_solid() {
        let b = make_box(2.0, 2.0, 2.0);
        let ctx = Context::new();
        let tol = precision::CONFUSION;
        assert_eq!(
            ctx.point_in_solid(&b.model, b.solid, &Point3::new(1.0, 1.0, 1.0), tol),
            Position::In
        );
        assert_eq!(
            ctx.point_in_solid(&b.model, b.solid, &Point3::new(3.0, 1.0, 1.0), tol),
            Position::Out
        );
        assert_eq!(
            ctx.point_in_solid(&b.model, b.solid, &Point3::new(2.0, 1.0, 1.0), tol),
            Position::On
        );
        assert_eq!(
            ctx.point_in_solid(&b.model, b.solid, &Point3::new(-0.5, 1.0, 1.0), tol),
            Position::Out
        );
    }

    #[test]
    fn test_point_in_sphere_solid() {
        let s = make_sphere(Point3::origin(), 2.0);
        let ctx = Context::new();
        let tol = precision::CONFUSION;
        assert_eq!(
            ctx.point_in_solid(&s.model, s.solid, &Point3::new(0.5, 0.3, -0.2), tol),
            Position::In
        );
        assert_eq!(
            ctx.point_in_solid(&s.model, s.solid, &Point3::new(3.0, 0.0, 0.0), tol),
            Position::Out
        );
    }

    #[test]
    fn test_face_sample_point_is_interior() {
        let b = make_box(3.0, 1.0, 2.0);
        let ctx = Context::new();
        let tol = precision::CONFUSION;
        for face in b.model.solid_faces(b.solid) {
            let (_, p) = ctx.face_sample_point(&b.model, face).unwrap();
            assert_eq!(
                ctx.classify_point_on_face(&b.model, face, &p, tol),
                Position::In
            );
        }
    }

    #[test]
    fn test_project_point_on_edge_clamps() {
        let b = make_box(2.0, 1.0, 1.0);
        let ctx = Context::new();
        let (eid, _) = b
            .model
            .edges
            .iter()
            .find(|(_, e)| {
                let p0 = e.curve.evaluate(e.t_start);
                let p1 = e.curve.evaluate(e.t_end);
                p0.y.abs() < 1e-9 && p0.z.abs() < 1e-9 && p1.y.abs() < 1e-9 && p1.z.abs() < 1e-9
            })
            .unwrap();
        let (t, dist) = ctx.project_point_on_edge(&b.model, eid, &Point3::new(1.0, 0.5, 0.0));
        assert!((t - 1.0).abs() < 1e-9);
        assert!((dist - 0.5).abs() < 1e-9);
        let (t, _) = ctx.project_point_on_edge(&b.model, eid, &Point3::new(5.0, 0.0, 0.0));
        assert!((t - 2.0).abs() < 1e-9);
    }
}
