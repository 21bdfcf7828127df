#![warn(missing_docs)]

//! Math types for the lathe B-rep kernel.
//!
//! Thin wrappers around nalgebra providing domain-specific types
//! for 3D CAD geometry: points, vectors, directions, transforms,
//! and the precision constants used by every geometric comparison.

use nalgebra::{Matrix4, Unit, Vector2, Vector3};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A point in 2D parameter space.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D space.
pub type Vec2 = Vector2<f64>;

/// Precision constants for geometric comparisons.
///
/// Two points closer than [`precision::CONFUSION`] are the same point;
/// two directions within [`precision::ANGULAR`] radians are parallel.
pub mod precision {
    /// Tolerance for coincidence of two points in real space.
    pub const CONFUSION: f64 = 1.0e-7;

    /// Square of [`CONFUSION`].
    pub const SQUARE_CONFUSION: f64 = CONFUSION * CONFUSION;

    /// Angular tolerance (radians) for parallelism checks.
    pub const ANGULAR: f64 = 1.0e-12;

    /// Tolerance for iterative intersection algorithms.
    pub const INTERSECTION: f64 = CONFUSION * 0.01;

    /// "Infinite" bound for algorithms that need a finite infinity.
    /// Not `f64::INFINITY`, so arithmetic on it stays NaN-free.
    pub const INFINITE: f64 = 1.0e100;
}

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Rotation about the Z axis by `angle` radians.
    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 1)] = -s;
        m[(1, 0)] = s;
        m[(1, 1)] = c;
        Self { matrix: m }
    }

    /// Compose: `self` then `other` (self * other).
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: other.matrix * self.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * nalgebra::Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a vector (no translation component).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * nalgebra::Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }
}

/// Test whether two points coincide within `tol`.
pub fn points_coincide(a: &Point3, b: &Point3, tol: f64) -> bool {
    (a - b).norm_squared() <= tol * tol
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation() {
        let t = Transform::translation(1.0, 2.0, 3.0);
        let p = t.apply_point(&Point3::new(1.0, 1.0, 1.0));
        assert!((p.x - 2.0).abs() < 1e-12);
        assert!((p.y - 3.0).abs() < 1e-12);
        assert!((p.z - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_vec_ignores_translation() {
        let t = Transform::translation(10.0, 0.0, 0.0);
        let v = t.apply_vec(&Vec3::new(0.0, 1.0, 0.0));
        assert!((v.x).abs() < 1e-12);
        assert!((v.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rotation_z() {
        let t = Transform::rotation_z(std::f64::consts::FRAC_PI_2);
        let p = t.apply_point(&Point3::new(1.0, 0.0, 0.0));
        assert!(p.x.abs() < 1e-12);
        assert!((p.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_then_applies_in_order() {
        let t = Transform::rotation_z(std::f64::consts::FRAC_PI_2)
            .then(&Transform::translation(10.0, 0.0, 0.0));
        let p = t.apply_point(&Point3::new(1.0, 0.0, 0.0));
        assert!((p.x - 10.0).abs() < 1e-12);
        assert!((p.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_points_coincide() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(0.0, 0.0, precision::CONFUSION / 2.0);
        assert!(points_coincide(&a, &b, precision::CONFUSION));
        let c = Point3::new(0.0, 0.0, 1.0);
        assert!(!points_coincide(&a, &c, precision::CONFUSION));
    }
}
