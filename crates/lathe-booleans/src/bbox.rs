//! Shape bounding boxes for the interference broad phase.
//!
//! Every sub-shape in the intersection data structure carries a box
//! inflated by its tolerance plus the run's fuzzy value; only pairs with
//! overlapping boxes reach the exact narrow-phase tests.

use lathe_geom::{Curve3, Surface};
use lathe_math::{Point3, Vec3};
use lathe_topo::{EdgeId, FaceId, Model, VertexId};

/// Axis-aligned box, kept as one closed interval per axis.
#[derive(Debug, Clone, Copy)]
pub struct Aabb3 {
    lo: [f64; 3],
    hi: [f64; 3],
}

impl Aabb3 {
    /// The degenerate box around a single point.
    pub fn around(p: &Point3) -> Self {
        Self {
            lo: [p.x, p.y, p.z],
            hi: [p.x, p.y, p.z],
        }
    }

    /// The smallest box holding every point of the iterator.
    ///
    /// An empty iterator yields the inverted box, which overlaps nothing
    /// and absorbs the first point added to it.
    pub fn hull(points: impl IntoIterator<Item = Point3>) -> Self {
        let mut b = Self {
            lo: [f64::INFINITY; 3],
            hi: [f64::NEG_INFINITY; 3],
        };
        for p in points {
            b.add(&p);
        }
        b
    }

    /// Stretch the box to hold `p`.
    pub fn add(&mut self, p: &Point3) {
        for (axis, c) in [p.x, p.y, p.z].into_iter().enumerate() {
            self.lo[axis] = self.lo[axis].min(c);
            self.hi[axis] = self.hi[axis].max(c);
        }
    }

    /// The union of this box and `other`.
    pub fn union(mut self, other: &Aabb3) -> Self {
        for axis in 0..3 {
            self.lo[axis] = self.lo[axis].min(other.lo[axis]);
            self.hi[axis] = self.hi[axis].max(other.hi[axis]);
        }
        self
    }

    /// The box padded by `pad` on every side.
    pub fn inflated(mut self, pad: f64) -> Self {
        for axis in 0..3 {
            self.lo[axis] -= pad;
            self.hi[axis] += pad;
        }
        self
    }

    /// True when the boxes share at least one point; touching counts.
    pub fn overlaps(&self, other: &Aabb3) -> bool {
        (0..3).all(|axis| self.lo[axis] <= other.hi[axis] && other.lo[axis] <= self.hi[axis])
    }

    /// Clip an infinite line against the box's three slabs.
    ///
    /// Returns the parameter interval of the line inside the box, or
    /// `None` when the line misses it.
    pub fn clip_line(&self, origin: &Point3, dir: &Vec3) -> Option<(f64, f64)> {
        let mut enter = f64::NEG_INFINITY;
        let mut exit = f64::INFINITY;
        for axis in 0..3 {
            let o = origin.coords[axis];
            let d = dir[axis];
            if d.abs() < 1e-14 {
                if o < self.lo[axis] || o > self.hi[axis] {
                    return None;
                }
                continue;
            }
            let t1 = (self.lo[axis] - o) / d;
            let t2 = (self.hi[axis] - o) / d;
            enter = enter.max(t1.min(t2));
            exit = exit.min(t1.max(t2));
        }
        (enter <= exit).then_some((enter, exit))
    }
}

/// Box of one vertex: its point padded by tolerance.
pub fn vertex_aabb(model: &Model, vertex: VertexId, margin: f64) -> Aabb3 {
    let v = &model.vertices[vertex];
    Aabb3::around(&v.point).inflated(v.tolerance + margin)
}

/// Box of one edge from sampled curve points.
///
/// Exact for lines; conservative for arcs by including enough samples and
/// the tolerance margin.
pub fn edge_aabb(model: &Model, edge: EdgeId, margin: f64) -> Aabb3 {
    let e = &model.edges[edge];
    let n = match e.curve {
        Curve3::Line(_) => 1,
        Curve3::Circle(_) => 16,
    };
    let mut b = Aabb3::hull(
        (0..=n).map(|i| e.curve.evaluate(e.t_start + (e.t_end - e.t_start) * i as f64 / n as f64)),
    );
    // An arc bulges beyond its chord samples by at most r * (1 - cos(h/2))
    // per half-step h; with 16 samples over a full circle this is tiny, but
    // keep a curvature pad proportional to the radius.
    if let Curve3::Circle(ref c) = e.curve {
        let half_step = (e.t_end - e.t_start).abs() / (2.0 * n as f64);
        b = b.inflated(c.radius * (1.0 - half_step.cos()).max(0.0));
    }
    b.inflated(e.tolerance + margin)
}

/// Box of one face: union of its wire edge boxes, padded for surface bulge.
pub fn face_aabb(model: &Model, face: FaceId, margin: f64) -> Aabb3 {
    let f = &model.faces[face];
    let b = model
        .face_edges(face)
        .into_iter()
        .map(|e| edge_aabb(model, e, 0.0))
        .reduce(|a, b| a.union(&b))
        .unwrap_or_else(|| Aabb3::hull(None));
    let bulge = match f.surface {
        Surface::Plane(_) => 0.0,
        // A curved face can stick out beyond its boundary wires by up to
        // the surface radius (a spherical cap's pole, a half-cylinder's
        // crown).
        Surface::Cylinder(ref c) => c.radius,
        Surface::Sphere(ref s) => s.radius,
    };
    b.inflated(bulge + f.tolerance + margin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lathe_primitives::{make_box, translate_solid};

    fn span(lo: Point3, hi: Point3) -> Aabb3 {
        Aabb3::hull([lo, hi])
    }

    #[test]
    fn test_overlap_is_symmetric_and_touching_counts() {
        let a = span(Point3::new(-1.0, -1.0, -1.0), Point3::new(2.0, 2.0, 2.0));
        let b = span(Point3::new(1.0, 1.0, 1.0), Point3::new(4.0, 4.0, 4.0));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        let apart = span(Point3::new(7.0, 0.0, 0.0), Point3::new(9.0, 1.0, 1.0));
        assert!(!a.overlaps(&apart));
        let touching = span(Point3::new(2.0, 0.0, 0.0), Point3::new(3.0, 1.0, 1.0));
        assert!(a.overlaps(&touching));
    }

    #[test]
    fn test_empty_hull_overlaps_nothing() {
        let empty = Aabb3::hull(None);
        let b = span(Point3::new(-10.0, -10.0, -10.0), Point3::new(10.0, 10.0, 10.0));
        assert!(!empty.overlaps(&b));
        assert!(!b.overlaps(&empty));
    }

    #[test]
    fn test_clip_line_hits_and_misses() {
        let b = span(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        let (t0, t1) = b
            .clip_line(&Point3::new(-1.0, 0.5, 0.5), &Vec3::x())
            .unwrap();
        assert!((t0 - 1.0).abs() < 1e-12);
        assert!((t1 - 3.0).abs() < 1e-12);
        // Parallel to the box, off to the side.
        assert!(b
            .clip_line(&Point3::new(-1.0, 5.0, 0.5), &Vec3::x())
            .is_none());
    }

    #[test]
    fn test_box_face_boxes_span_solid() {
        let solid = translate_solid(&make_box(10.0, 10.0, 10.0), 1.0, 2.0, 3.0);
        let b = solid
            .model
            .solid_faces(solid.solid)
            .into_iter()
            .map(|f| face_aabb(&solid.model, f, 0.0))
            .reduce(|a, b| a.union(&b))
            .unwrap();
        let (lo, hi) = b
            .clip_line(&Point3::new(0.0, 7.0, 8.0), &Vec3::x())
            .unwrap();
        assert!(lo <= 1.0 + 1e-6 && hi >= 11.0 - 1e-6);
    }

    #[test]
    fn test_edge_aabb_line_exact() {
        let solid = make_box(2.0, 3.0, 4.0);
        for (eid, e) in &solid.model.edges {
            let b = edge_aabb(&solid.model, eid, 0.0);
            let p0 = e.curve.evaluate(e.t_start);
            let p1 = e.curve.evaluate(e.t_end);
            assert!(b.overlaps(&Aabb3::around(&p0)));
            assert!(b.overlaps(&Aabb3::around(&p1)));
            // A point one percent past the end lies outside.
            let beyond = p1 + (p1 - p0) * 0.01;
            assert!(!b.overlaps(&Aabb3::around(&beyond)));
        }
    }
}
