#![warn(missing_docs)]

//! Primitive solid constructors.
//!
//! Primitives are built directly as boundary representations with outward
//! face orientation, so their signed volume is positive.

use lathe_geom::{Circle3, Curve3, Line3, Plane, Sphere, Surface};
use lathe_math::{Point3, Transform, Vec3};
use lathe_topo::{BrepSolid, EdgeUse, Model, Wire};
use std::f64::consts::PI;

/// An axis-aligned box with one corner at the origin and the opposite
/// corner at `(dx, dy, dz)`.
///
/// Vertices and edges are shared between adjacent faces, as a sewn solid
/// would have them.
pub fn make_box(dx: f64, dy: f64, dz: f64) -> BrepSolid {
    let mut model = Model::new();
    // Corner indices: bit 0 = x, bit 1 = y, bit 2 = z.
    let corners: Vec<_> = (0..8)
        .map(|i| {
            Point3::new(
                if i & 1 != 0 { dx } else { 0.0 },
                if i & 2 != 0 { dy } else { 0.0 },
                if i & 4 != 0 { dz } else { 0.0 },
            )
        })
        .collect();
    let vids: Vec<_> = corners.iter().map(|p| model.add_vertex(*p)).collect();

    let mut edge_of = std::collections::HashMap::new();
    let mut get_edge = |model: &mut Model, a: usize, b: usize| {
        let key = (a.min(b), a.max(b));
        if let Some(&e) = edge_of.get(&key) {
            return e;
        }
        let pa = corners[key.0];
        let pb = corners[key.1];
        let e = model.add_edge(
            Curve3::Line(Line3::through(pa, pb)),
            0.0,
            (pb - pa).norm(),
            vids[key.0],
            vids[key.1],
        );
        edge_of.insert(key, e);
        e
    };

    // Each face: four corner indices, counter-clockwise seen from outside.
    let face_loops: [[usize; 4]; 6] = [
        [0, 2, 3, 1], // bottom, outward -z
        [4, 5, 7, 6], // top, outward +z
        [0, 1, 5, 4], // front, outward -y
        [2, 6, 7, 3], // back, outward +y
        [0, 4, 6, 2], // left, outward -x
        [1, 3, 7, 5], // right, outward +x
    ];
    let mut faces = Vec::new();
    for corners_ccw in face_loops {
        let p0 = corners[corners_ccw[0]];
        let p1 = corners[corners_ccw[1]];
        let p3 = corners[corners_ccw[3]];
        let plane = Plane::new(p0, p1 - p0, p3 - p0);
        let mut wire = Wire::default();
        for i in 0..4 {
            let a = corners_ccw[i];
            let b = corners_ccw[(i + 1) % 4];
            let edge = get_edge(&mut model, a, b);
            wire.edges.push(EdgeUse {
                edge,
                // Edges are stored from the lower corner index.
                forward: a < b,
            });
        }
        faces.push(model.add_face(Surface::Plane(plane), wire, true));
    }
    let shell = model.add_shell(faces);
    let solid = model.add_solid(vec![shell]);
    BrepSolid { model, solid }
}

/// A full sphere centered at `center` with the given radius.
///
/// Modeled as a single spherical face whose boundary is a seam meridian
/// through both poles, traversed once in each direction.
pub fn make_sphere(center: Point3, radius: f64) -> BrepSolid {
    let mut model = Model::new();
    let sphere = Sphere::with_center(center, radius);
    let north = model.add_vertex(center + radius * Vec3::z());
    let south = model.add_vertex(center - radius * Vec3::z());
    // Seam meridian in the XZ plane, from south pole up to north pole.
    let seam_circle = Circle3 {
        center,
        radius,
        x_dir: sphere.ref_dir,
        y_dir: sphere.axis,
        normal: nalgebra::Unit::new_normalize(-sphere.y_dir()),
    };
    let seam = model.add_edge(
        Curve3::Circle(seam_circle),
        -PI / 2.0,
        PI / 2.0,
        south,
        north,
    );
    let wire = Wire {
        edges: vec![
            EdgeUse {
                edge: seam,
                forward: true,
            },
            EdgeUse {
                edge: seam,
                forward: false,
            },
        ],
    };
    let face = model.add_face(Surface::Sphere(sphere), wire, true);
    let shell = model.add_shell(vec![face]);
    let solid = model.add_solid(vec![shell]);
    BrepSolid { model, solid }
}

/// Translate a solid by `(dx, dy, dz)`, moving all geometry.
pub fn translate_solid(solid: &BrepSolid, dx: f64, dy: f64, dz: f64) -> BrepSolid {
    transform_solid(solid, &Transform::translation(dx, dy, dz))
}

/// Apply a rigid transform to every vertex, curve and surface of a solid.
pub fn transform_solid(solid: &BrepSolid, t: &Transform) -> BrepSolid {
    let mut model = solid.model.clone();
    for (_, v) in &mut model.vertices {
        v.point = t.apply_point(&v.point);
    }
    for (_, e) in &mut model.edges {
        e.curve = e.curve.transformed(t);
    }
    for (_, f) in &mut model.faces {
        f.surface = f.surface.transformed(t);
    }
    BrepSolid {
        model,
        solid: solid.solid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_volume_and_faces() {
        let b = make_box(2.0, 3.0, 4.0);
        assert_eq!(b.face_count(), 6);
        assert!((b.volume() - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_box_shares_subshapes() {
        let b = make_box(1.0, 1.0, 1.0);
        assert_eq!(b.model.edges.len(), 12);
        assert_eq!(b.model.vertices.len(), 8);
    }

    #[test]
    fn test_translate_moves_volume_not_size() {
        let b = make_box(1.0, 1.0, 1.0);
        let t = translate_solid(&b, 10.0, -5.0, 0.5);
        assert!((t.volume() - 1.0).abs() < 1e-9);
        let any_vertex = t.model.vertices.iter().next().map(|(_, v)| v.point);
        assert!(any_vertex.is_some_and(|p| p.x >= 10.0 - 1e-12));
    }

    #[test]
    fn test_sphere_volume() {
        let s = make_sphere(Point3::new(0.3, -1.0, 2.0), 0.5);
        assert!((s.volume() - 4.0 / 3.0 * PI * 0.125).abs() < 1e-9);
    }

    #[test]
    fn test_sphere_structure() {
        let s = make_sphere(Point3::origin(), 2.0);
        assert_eq!(s.face_count(), 1);
        assert_eq!(s.model.edges.len(), 1);
        assert_eq!(s.model.vertices.len(), 2);
        // Seam endpoints sit at the poles.
        let (_, e) = s.model.edges.iter().next().unwrap();
        let start = e.curve.evaluate(e.t_start);
        assert!((start.z + 2.0).abs() < 1e-12);
        let end = e.curve.evaluate(e.t_end);
        assert!((end.z - 2.0).abs() < 1e-12);
    }
}
