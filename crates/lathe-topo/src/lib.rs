#![warn(missing_docs)]

//! Boundary-representation topology for the lathe kernel.
//!
//! Topological entities live in slotmap arenas inside a [`Model`]; entities
//! refer to each other by id, never by reference. Geometry (curves, surfaces)
//! is attached to edges and faces via [`lathe_geom`] enums.

use lathe_geom::{Curve3, Surface};
use lathe_math::{precision, Point2, Point3, Vec3};
use slotmap::{new_key_type, SlotMap};
use std::f64::consts::PI;

new_key_type! {
    /// Id of a [`Vertex`] in a [`Model`].
    pub struct VertexId;
    /// Id of an [`Edge`] in a [`Model`].
    pub struct EdgeId;
    /// Id of a [`Face`] in a [`Model`].
    pub struct FaceId;
    /// Id of a [`Shell`] in a [`Model`].
    pub struct ShellId;
    /// Id of a [`Solid`] in a [`Model`].
    pub struct SolidId;
}

/// A topological vertex: a point with a tolerance sphere around it.
#[derive(Debug, Clone)]
pub struct Vertex {
    /// Position in 3D space.
    pub point: Point3,
    /// Radius of the tolerance sphere; the true point lies within it.
    pub tolerance: f64,
}

/// A topological edge: a bounded piece of a 3D curve between two vertices.
///
/// Closed edges (full circles) have `start == end`.
#[derive(Debug, Clone)]
pub struct Edge {
    /// The supporting curve.
    pub curve: Curve3,
    /// Curve parameter at the start vertex.
    pub t_start: f64,
    /// Curve parameter at the end vertex.
    pub t_end: f64,
    /// Start vertex.
    pub start: VertexId,
    /// End vertex.
    pub end: VertexId,
    /// Tolerance tube radius around the curve.
    pub tolerance: f64,
}

/// One use of an edge inside a wire, with orientation.
#[derive(Debug, Clone, Copy)]
pub struct EdgeUse {
    /// The edge being used.
    pub edge: EdgeId,
    /// True if the wire traverses the edge from `start` to `end`.
    pub forward: bool,
}

/// A closed loop of edge uses bounding a face.
#[derive(Debug, Clone, Default)]
pub struct Wire {
    /// Ordered, oriented edges; consecutive edges share a vertex.
    pub edges: Vec<EdgeUse>,
}

/// A topological face: a bounded piece of a surface.
#[derive(Debug, Clone)]
pub struct Face {
    /// The supporting surface.
    pub surface: Surface,
    /// Outer boundary, counter-clockwise in UV when `same_sense`.
    pub outer: Wire,
    /// Inner boundaries (holes), clockwise in UV when `same_sense`.
    pub inners: Vec<Wire>,
    /// True if the face normal agrees with the surface normal.
    pub same_sense: bool,
    /// Tolerance shell thickness around the surface.
    pub tolerance: f64,
}

/// A connected set of faces forming (part of) a solid boundary.
#[derive(Debug, Clone, Default)]
pub struct Shell {
    /// Member faces.
    pub faces: Vec<FaceId>,
}

/// A solid region bounded by one outer shell and optional void shells.
#[derive(Debug, Clone, Default)]
pub struct Solid {
    /// Bounding shells; the first is the outer shell.
    pub shells: Vec<ShellId>,
}

/// Arena container for all topological entities of one model.
#[derive(Debug, Clone, Default)]
pub struct Model {
    /// Vertex arena.
    pub vertices: SlotMap<VertexId, Vertex>,
    /// Edge arena.
    pub edges: SlotMap<EdgeId, Edge>,
    /// Face arena.
    pub faces: SlotMap<FaceId, Face>,
    /// Shell arena.
    pub shells: SlotMap<ShellId, Shell>,
    /// Solid arena.
    pub solids: SlotMap<SolidId, Solid>,
}

impl Model {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex with the default point tolerance.
    pub fn add_vertex(&mut self, point: Point3) -> VertexId {
        self.vertices.insert(Vertex {
            point,
            tolerance: precision::CONFUSION,
        })
    }

    /// Add an edge between two existing vertices.
    pub fn add_edge(
        &mut self,
        curve: Curve3,
        t_start: f64,
        t_end: f64,
        start: VertexId,
        end: VertexId,
    ) -> EdgeId {
        self.edges.insert(Edge {
            curve,
            t_start,
            t_end,
            start,
            end,
            tolerance: precision::CONFUSION,
        })
    }

    /// Add a face with an outer wire and no holes.
    pub fn add_face(&mut self, surface: Surface, outer: Wire, same_sense: bool) -> FaceId {
        self.faces.insert(Face {
            surface,
            outer,
            inners: Vec::new(),
            same_sense,
            tolerance: precision::CONFUSION,
        })
    }

    /// Add a shell from a list of faces.
    pub fn add_shell(&mut self, faces: Vec<FaceId>) -> ShellId {
        self.shells.insert(Shell { faces })
    }

    /// Add a solid from a list of shells (outer first).
    pub fn add_solid(&mut self, shells: Vec<ShellId>) -> SolidId {
        self.solids.insert(Solid { shells })
    }

    /// Midpoint of an edge in 3D space.
    pub fn edge_midpoint(&self, edge: EdgeId) -> Point3 {
        let e = &self.edges[edge];
        e.curve.evaluate(0.5 * (e.t_start + e.t_end))
    }

    /// All vertex ids used by an edge (one id if the edge is closed).
    pub fn edge_vertices(&self, edge: EdgeId) -> Vec<VertexId> {
        let e = &self.edges[edge];
        if e.start == e.end {
            vec![e.start]
        } else {
            vec![e.start, e.end]
        }
    }

    /// All edge ids used by a face, outer wire first, duplicates removed.
    pub fn face_edges(&self, face: FaceId) -> Vec<EdgeId> {
        let f = &self.faces[face];
        let mut out = Vec::new();
        for wire in std::iter::once(&f.outer).chain(f.inners.iter()) {
            for eu in &wire.edges {
                if !out.contains(&eu.edge) {
                    out.push(eu.edge);
                }
            }
        }
        out
    }

    /// All face ids of a solid, across all its shells.
    pub fn solid_faces(&self, solid: SolidId) -> Vec<FaceId> {
        let mut out = Vec::new();
        for &shell in &self.solids[solid].shells {
            for &face in &self.shells[shell].faces {
                if !out.contains(&face) {
                    out.push(face);
                }
            }
        }
        out
    }

    /// Polyline approximation of an edge, respecting orientation.
    ///
    /// Lines get two points; circular arcs are sampled at `samples_per_arc`.
    pub fn edge_polyline(&self, eu: EdgeUse, samples_per_arc: usize) -> Vec<Point3> {
        let e = &self.edges[eu.edge];
        let n = match e.curve {
            Curve3::Line(_) => 1,
            Curve3::Circle(_) => samples_per_arc.max(2),
        };
        let (a, b) = if eu.forward {
            (e.t_start, e.t_end)
        } else {
            (e.t_end, e.t_start)
        };
        (0..=n)
            .map(|i| e.curve.evaluate(a + (b - a) * i as f64 / n as f64))
            .collect()
    }

    /// Boundary polygon of a face's outer wire, in traversal order.
    pub fn face_polygon(&self, face: FaceId, samples_per_arc: usize) -> Vec<Point3> {
        let f = &self.faces[face];
        let mut pts = Vec::new();
        for &eu in &f.outer.edges {
            let mut poly = self.edge_polyline(eu, samples_per_arc);
            poly.pop();
            pts.append(&mut poly);
        }
        pts
    }

    /// Signed volume of a solid via the divergence theorem.
    ///
    /// The flux of the position field through each face reduces, by
    /// Green's theorem in the surface's UV plane, to a line integral of a
    /// closed-form antiderivative along the boundary wires. Planar faces
    /// with straight edges come out exact; curved boundaries are sampled.
    pub fn solid_volume(&self, solid: SolidId) -> f64 {
        let mut flux = 0.0;
        for face_id in self.solid_faces(solid) {
            flux += self.face_flux(face_id);
        }
        flux / 3.0
    }

    /// Position-field flux through one bounded face.
    ///
    /// Orientation comes from the wire traversal itself: the wires of a
    /// reversed face run the other way in UV and negate the integral. On
    /// periodic surfaces the part of the flux that grows linearly in u is
    /// invisible to a boundary with no v variation (a latitude circle, a
    /// seam traversed both ways); such wires are settled separately from
    /// their winding number around the period.
    fn face_flux(&self, face_id: FaceId) -> f64 {
        let f = &self.faces[face_id];
        let mut flux = 0.0;
        let mut area = 0.0;
        // (winding number, anchor latitude) of each wrapping wire.
        let mut winding: Vec<(f64, f64)> = Vec::new();
        for wire in std::iter::once(&f.outer).chain(f.inners.iter()) {
            let path = self.wire_uv_path(&f.surface, wire);
            if path.len() < 2 {
                continue;
            }
            for w in path.windows(2) {
                let (a, b) = (w[0], w[1]);
                let dv = b.y - a.y;
                if dv == 0.0 {
                    continue;
                }
                let mid = Point2::new(0.5 * (a.x + b.x), 0.5 * (a.y + b.y));
                // Simpson over the segment.
                let q = flux_antiderivative(&f.surface, a)
                    + 4.0 * flux_antiderivative(&f.surface, mid)
                    + flux_antiderivative(&f.surface, b);
                flux += q / 6.0 * dv;
                area += 0.5 * (a.x + b.x) * dv;
            }
            let k = ((path[path.len() - 1].x - path[0].x) / (2.0 * PI)).round();
            if k != 0.0 {
                winding.push((k, path[0].y));
            }
        }
        let sign = if f.same_sense { 1.0 } else { -1.0 };
        if winding.is_empty() {
            // A spherical face whose wires enclose no UV area is bounded
            // only by the seam; it covers the whole sphere.
            if let Surface::Sphere(s) = &f.surface {
                if sign * area < precision::CONFUSION {
                    flux += sign * 4.0 * PI * s.radius.powi(3);
                }
            }
        } else {
            // Each wrapping wire closes through the pole on the side the
            // face lies on; the net winding picks that pole.
            let net: f64 = winding.iter().map(|&(k, _)| k).sum::<f64>() * sign;
            let pole = match &f.surface {
                Surface::Sphere(_) if net > 0.0 => {
                    secular_antiderivative(&f.surface, 0.5 * PI)
                }
                Surface::Sphere(_) if net < 0.0 => {
                    secular_antiderivative(&f.surface, -0.5 * PI)
                }
                _ => 0.0,
            };
            for (k, v) in winding {
                flux += 2.0 * PI * k * (pole - secular_antiderivative(&f.surface, v));
            }
        }
        flux
    }

    /// UV samples of one wire, the periodic coordinate unwrapped along
    /// the traversal.
    fn wire_uv_path(&self, surface: &Surface, wire: &Wire) -> Vec<Point2> {
        let periodic = !matches!(surface, Surface::Plane(_));
        let mut path: Vec<Point2> = Vec::new();
        for &eu in &wire.edges {
            for p in self.edge_polyline(eu, 4096) {
                let mut uv = surface.project(&p);
                if periodic {
                    if let Some(prev) = path.last() {
                        uv.x -= ((uv.x - prev.x) / (2.0 * PI)).round() * 2.0 * PI;
                    }
                }
                path.push(uv);
            }
        }
        path
    }

    /// Outward normal of a face at UV, accounting for `same_sense`.
    pub fn face_normal(&self, face: FaceId, uv: lathe_math::Point2) -> Vec3 {
        let f = &self.faces[face];
        let n = f.surface.normal(uv);
        if f.same_sense {
            *n.as_ref()
        } else {
            -*n.as_ref()
        }
    }
}

/// Antiderivative in u of the position-field flux density
/// `x · (x_u × x_v)` of a surface, evaluated at a UV point. Green's
/// theorem turns the face flux into the line integral of this quantity
/// against dv along the boundary.
fn flux_antiderivative(surface: &Surface, uv: Point2) -> f64 {
    match surface {
        Surface::Plane(p) => uv.x * p.origin.coords.dot(p.normal.as_ref()),
        Surface::Cylinder(c) => {
            let (sin_u, cos_u) = uv.x.sin_cos();
            let alpha = c.center.coords.dot(c.ref_dir.as_ref());
            let beta = c.center.coords.dot(&c.y_dir());
            c.radius * (c.radius * uv.x + alpha * sin_u - beta * cos_u)
        }
        Surface::Sphere(s) => {
            let (sin_u, cos_u) = uv.x.sin_cos();
            let (sin_v, cos_v) = uv.y.sin_cos();
            let alpha = s.center.coords.dot(s.ref_dir.as_ref());
            let beta = s.center.coords.dot(&s.y_dir());
            let axial = s.center.coords.dot(s.axis.as_ref());
            let r2 = s.radius * s.radius;
            r2 * cos_v * cos_v * (alpha * sin_u - beta * cos_u)
                + uv.x * cos_v * r2 * (axial * sin_v + s.radius)
        }
    }
}

/// Antiderivative in v of the u-linear (secular) part of the flux
/// density, integrated over one full period in u. Wires that wind around
/// a periodic surface contribute this part between their anchor latitude
/// and the pole they close through.
fn secular_antiderivative(surface: &Surface, v: f64) -> f64 {
    match surface {
        Surface::Plane(_) => 0.0,
        Surface::Cylinder(c) => c.radius * c.radius * v,
        Surface::Sphere(s) => {
            let sin_v = v.sin();
            let axial = s.center.coords.dot(s.axis.as_ref());
            s.radius * s.radius * (0.5 * axial * sin_v * sin_v + s.radius * sin_v)
        }
    }
}

/// A solid together with the model that owns its entities.
#[derive(Debug, Clone)]
pub struct BrepSolid {
    /// Owning model.
    pub model: Model,
    /// The solid within `model`.
    pub solid: SolidId,
}

impl BrepSolid {
    /// Signed volume of the solid.
    pub fn volume(&self) -> f64 {
        self.model.solid_volume(self.solid)
    }

    /// Number of faces in the solid.
    pub fn face_count(&self) -> usize {
        self.model.solid_faces(self.solid).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lathe_geom::{Circle3, Cylinder, Line3, Plane, Sphere};
    use lathe_math::Dir3;

    fn quad_face(model: &mut Model, pts: [Point3; 4], surface: Surface, same_sense: bool) -> FaceId {
        let vids: Vec<_> = pts.iter().map(|p| model.add_vertex(*p)).collect();
        let mut wire = Wire::default();
        for i in 0..4 {
            let a = vids[i];
            let b = vids[(i + 1) % 4];
            let line = Line3::through(model.vertices[a].point, model.vertices[b].point);
            let len = (model.vertices[b].point - model.vertices[a].point).norm();
            let eid = model.add_edge(Curve3::Line(line), 0.0, len, a, b);
            wire.edges.push(EdgeUse {
                edge: eid,
                forward: true,
            });
        }
        model.add_face(surface, wire, same_sense)
    }

    fn cube_faces() -> [([Point3; 4], Plane); 6] {
        [
            // z = 0, normal -z: traverse clockwise seen from +z
            (
                [
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(0.0, 1.0, 0.0),
                    Point3::new(1.0, 1.0, 0.0),
                    Point3::new(1.0, 0.0, 0.0),
                ],
                Plane::new(Point3::origin(), Vec3::y(), Vec3::x()),
            ),
            // z = 1, normal +z
            (
                [
                    Point3::new(0.0, 0.0, 1.0),
                    Point3::new(1.0, 0.0, 1.0),
                    Point3::new(1.0, 1.0, 1.0),
                    Point3::new(0.0, 1.0, 1.0),
                ],
                Plane::new(Point3::new(0.0, 0.0, 1.0), Vec3::x(), Vec3::y()),
            ),
            // y = 0, normal -y
            (
                [
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(1.0, 0.0, 1.0),
                    Point3::new(0.0, 0.0, 1.0),
                ],
                Plane::new(Point3::origin(), Vec3::x(), Vec3::z()),
            ),
            // y = 1, normal +y
            (
                [
                    Point3::new(0.0, 1.0, 0.0),
                    Point3::new(0.0, 1.0, 1.0),
                    Point3::new(1.0, 1.0, 1.0),
                    Point3::new(1.0, 1.0, 0.0),
                ],
                Plane::new(Point3::new(0.0, 1.0, 0.0), Vec3::z(), Vec3::x()),
            ),
            // x = 0, normal -x
            (
                [
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(0.0, 0.0, 1.0),
                    Point3::new(0.0, 1.0, 1.0),
                    Point3::new(0.0, 1.0, 0.0),
                ],
                Plane::new(Point3::origin(), Vec3::z(), Vec3::y()),
            ),
            // x = 1, normal +x
            (
                [
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(1.0, 1.0, 0.0),
                    Point3::new(1.0, 1.0, 1.0),
                    Point3::new(1.0, 0.0, 1.0),
                ],
                Plane::new(Point3::new(1.0, 0.0, 0.0), Vec3::y(), Vec3::z()),
            ),
        ]
    }

    #[test]
    fn test_edge_midpoint() {
        let mut model = Model::new();
        let a = model.add_vertex(Point3::origin());
        let b = model.add_vertex(Point3::new(2.0, 0.0, 0.0));
        let line = Line3::through(model.vertices[a].point, model.vertices[b].point);
        let e = model.add_edge(Curve3::Line(line), 0.0, 2.0, a, b);
        let mid = model.edge_midpoint(e);
        assert!((mid.x - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_face_polygon_order() {
        let mut model = Model::new();
        let face = quad_face(
            &mut model,
            [
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            Surface::Plane(Plane::xy()),
            true,
        );
        let poly = model.face_polygon(face, 8);
        assert_eq!(poly.len(), 4);
        assert!((poly[2] - Point3::new(1.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_unit_cube_volume() {
        // Hand-built axis-aligned unit cube; all faces oriented outward.
        let mut model = Model::new();
        let mut face_ids = Vec::new();
        for (pts, plane) in cube_faces() {
            face_ids.push(quad_face(&mut model, pts, Surface::Plane(plane), true));
        }
        let shell = model.add_shell(face_ids);
        let solid = model.add_solid(vec![shell]);
        assert!((model.solid_volume(solid) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_reversed_cube_volume_is_negative() {
        // Same cube with every wire reversed and same_sense off: all
        // normals point inward, so the signed volume flips.
        let mut model = Model::new();
        let mut face_ids = Vec::new();
        for (pts, plane) in cube_faces() {
            let rev = [pts[0], pts[3], pts[2], pts[1]];
            face_ids.push(quad_face(&mut model, rev, Surface::Plane(plane), false));
        }
        let shell = model.add_shell(face_ids);
        let solid = model.add_solid(vec![shell]);
        assert!((model.solid_volume(solid) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cylinder_can_volume() {
        let (r, h) = (0.7, 2.0);
        let mut model = Model::new();
        let vb = model.add_vertex(Point3::new(r, 0.0, 0.0));
        let vt = model.add_vertex(Point3::new(r, 0.0, h));
        let seam = model.add_edge(
            Curve3::Line(Line3::through(
                Point3::new(r, 0.0, 0.0),
                Point3::new(r, 0.0, h),
            )),
            0.0,
            h,
            vb,
            vt,
        );
        let rim = |z: f64| Circle3 {
            center: Point3::new(0.0, 0.0, z),
            radius: r,
            x_dir: Dir3::new_normalize(Vec3::x()),
            y_dir: Dir3::new_normalize(Vec3::y()),
            normal: Dir3::new_normalize(Vec3::z()),
        };
        let bottom = model.add_edge(Curve3::Circle(rim(0.0)), 0.0, 2.0 * PI, vb, vb);
        let top = model.add_edge(Curve3::Circle(rim(h)), 0.0, 2.0 * PI, vt, vt);
        // Barrel boundary: bottom rim, seam up, top rim back, seam down.
        let barrel_wire = Wire {
            edges: vec![
                EdgeUse { edge: bottom, forward: true },
                EdgeUse { edge: seam, forward: true },
                EdgeUse { edge: top, forward: false },
                EdgeUse { edge: seam, forward: false },
            ],
        };
        let barrel = model.add_face(
            Surface::Cylinder(Cylinder::with_axis(Point3::origin(), Vec3::z(), r)),
            barrel_wire,
            true,
        );
        let top_cap = model.add_face(
            Surface::Plane(Plane::new(Point3::new(0.0, 0.0, h), Vec3::x(), Vec3::y())),
            Wire { edges: vec![EdgeUse { edge: top, forward: true }] },
            true,
        );
        let bottom_cap = model.add_face(
            Surface::Plane(Plane::new(Point3::origin(), Vec3::y(), Vec3::x())),
            Wire { edges: vec![EdgeUse { edge: bottom, forward: false }] },
            true,
        );
        let shell = model.add_shell(vec![barrel, top_cap, bottom_cap]);
        let solid = model.add_solid(vec![shell]);
        assert!((model.solid_volume(solid) - PI * r * r * h).abs() < 1e-5);
    }

    fn seam_sphere_solid(center: Point3, r: f64, outward: bool) -> (Model, SolidId) {
        // One face bounded by its seam meridian traversed both ways.
        let mut model = Model::new();
        let south = model.add_vertex(center + Vec3::new(0.0, 0.0, -r));
        let north = model.add_vertex(center + Vec3::new(0.0, 0.0, r));
        let seam = Circle3 {
            center,
            radius: r,
            x_dir: Dir3::new_normalize(Vec3::x()),
            y_dir: Dir3::new_normalize(Vec3::z()),
            normal: Dir3::new_normalize(-Vec3::y()),
        };
        let e = model.add_edge(Curve3::Circle(seam), -0.5 * PI, 0.5 * PI, south, north);
        let wire = Wire {
            edges: vec![
                EdgeUse { edge: e, forward: true },
                EdgeUse { edge: e, forward: false },
            ],
        };
        let face = model.add_face(
            Surface::Sphere(Sphere::with_center(center, r)),
            wire,
            outward,
        );
        let shell = model.add_shell(vec![face]);
        let solid = model.add_solid(vec![shell]);
        (model, solid)
    }

    #[test]
    fn test_seam_bounded_sphere_volume() {
        let r = 1.5;
        let (model, solid) = seam_sphere_solid(Point3::new(0.5, -0.3, 1.0), r, true);
        let want = 4.0 / 3.0 * PI * r * r * r;
        assert!((model.solid_volume(solid) - want).abs() < 1e-9);
        let (model, solid) = seam_sphere_solid(Point3::new(0.5, -0.3, 1.0), r, false);
        assert!((model.solid_volume(solid) + want).abs() < 1e-9);
    }

    #[test]
    fn test_dome_volume() {
        // Upper hemisphere bounded only by its equator, closed by a disk.
        // The cap wire has no v variation; its flux comes entirely from
        // the winding closure through the north pole.
        let r = 1.0;
        let mut model = Model::new();
        let veq = model.add_vertex(Point3::new(r, 0.0, 0.0));
        let equator = Circle3 {
            center: Point3::origin(),
            radius: r,
            x_dir: Dir3::new_normalize(Vec3::x()),
            y_dir: Dir3::new_normalize(Vec3::y()),
            normal: Dir3::new_normalize(Vec3::z()),
        };
        let e = model.add_edge(Curve3::Circle(equator), 0.0, 2.0 * PI, veq, veq);
        let cap = model.add_face(
            Surface::Sphere(Sphere::with_center(Point3::origin(), r)),
            Wire { edges: vec![EdgeUse { edge: e, forward: true }] },
            true,
        );
        let disk = model.add_face(
            Surface::Plane(Plane::new(Point3::origin(), Vec3::y(), Vec3::x())),
            Wire { edges: vec![EdgeUse { edge: e, forward: false }] },
            true,
        );
        let shell = model.add_shell(vec![cap, disk]);
        let solid = model.add_solid(vec![shell]);
        assert!((model.solid_volume(solid) - 2.0 / 3.0 * PI * r * r * r).abs() < 1e-9);
    }
}
