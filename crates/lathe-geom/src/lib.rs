#![warn(missing_docs)]

//! Analytic curve and surface types for the lathe kernel.
//!
//! Curves and surfaces are closed enums with pattern-matching dispatch:
//! the set of analytic types the intersection engine understands is fixed,
//! so a sum type is both cheaper and safer than trait objects.

use lathe_math::{precision, Dir3, Point2, Point3, Transform, Vec3};
use std::f64::consts::PI;

// =============================================================================
// Surfaces
// =============================================================================

/// The kind of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Infinite plane.
    Plane,
    /// Cylindrical surface (infinite extent along axis).
    Cylinder,
    /// Spherical surface.
    Sphere,
}

/// An infinite plane defined by an origin point and a coordinate frame.
///
/// Parameterization: `P(u, v) = origin + u * x_dir + v * y_dir`
#[derive(Debug, Clone)]
pub struct Plane {
    /// Origin point on the plane.
    pub origin: Point3,
    /// Unit vector along the u direction.
    pub x_dir: Dir3,
    /// Unit vector along the v direction.
    pub y_dir: Dir3,
    /// Unit normal (x_dir × y_dir).
    pub normal: Dir3,
}

impl Plane {
    /// Create a plane from origin and two (not necessarily unit) directions.
    pub fn new(origin: Point3, x_dir: Vec3, y_dir: Vec3) -> Self {
        let x = Dir3::new_normalize(x_dir);
        let n = Dir3::new_normalize(x_dir.cross(&y_dir));
        let y = Dir3::new_normalize(n.as_ref().cross(x.as_ref()));
        Self {
            origin,
            x_dir: x,
            y_dir: y,
            normal: n,
        }
    }

    /// Create a plane from origin and normal; in-plane axes are arbitrary.
    pub fn from_normal(origin: Point3, normal: Vec3) -> Self {
        let n = Dir3::new_normalize(normal);
        let arbitrary = if n.as_ref().x.abs() < 0.9 {
            Vec3::x()
        } else {
            Vec3::y()
        };
        let x = Dir3::new_normalize(arbitrary.cross(n.as_ref()));
        let y = Dir3::new_normalize(n.as_ref().cross(x.as_ref()));
        Self {
            origin,
            x_dir: x,
            y_dir: y,
            normal: n,
        }
    }

    /// XY plane at the origin.
    pub fn xy() -> Self {
        Self::new(Point3::origin(), Vec3::x(), Vec3::y())
    }

    /// Project a 3D point into this plane's (u, v) parameter space.
    pub fn project(&self, p: &Point3) -> Point2 {
        let d = p - self.origin;
        Point2::new(d.dot(self.x_dir.as_ref()), d.dot(self.y_dir.as_ref()))
    }

    /// Signed distance from a point to this plane.
    pub fn signed_distance(&self, p: &Point3) -> f64 {
        (p - self.origin).dot(self.normal.as_ref())
    }
}

/// A cylindrical surface defined by an axis line and radius.
///
/// Parameterization:
/// `P(u, v) = center + radius * (cos(u) * ref_dir + sin(u) * y_dir) + v * axis`
#[derive(Debug, Clone)]
pub struct Cylinder {
    /// Point on the cylinder axis.
    pub center: Point3,
    /// Unit direction along the axis.
    pub axis: Dir3,
    /// Reference direction for u = 0 (perpendicular to axis).
    pub ref_dir: Dir3,
    /// Radius of the cylinder.
    pub radius: f64,
}

impl Cylinder {
    /// Create a cylinder with a custom center and axis.
    pub fn with_axis(center: Point3, axis: Vec3, radius: f64) -> Self {
        let a = Dir3::new_normalize(axis);
        let arbitrary = if a.as_ref().x.abs() < 0.9 {
            Vec3::x()
        } else {
            Vec3::y()
        };
        let ref_dir = Dir3::new_normalize(arbitrary - arbitrary.dot(a.as_ref()) * a.as_ref());
        Self {
            center,
            axis: a,
            ref_dir,
            radius,
        }
    }

    /// Second in-plane direction (axis × ref_dir).
    pub fn y_dir(&self) -> Vec3 {
        self.axis.as_ref().cross(self.ref_dir.as_ref())
    }

    /// Project a 3D point onto the cylinder's (u, v) parameter space.
    pub fn project(&self, p: &Point3) -> Point2 {
        let d = p - self.center;
        let u = d.dot(&self.y_dir()).atan2(d.dot(self.ref_dir.as_ref()));
        let u = if u < 0.0 { u + 2.0 * PI } else { u };
        let v = d.dot(self.axis.as_ref());
        Point2::new(u, v)
    }

    /// Distance from a point to the cylinder surface (unsigned).
    pub fn distance(&self, p: &Point3) -> f64 {
        let d = p - self.center;
        let radial = d - d.dot(self.axis.as_ref()) * self.axis.as_ref();
        (radial.norm() - self.radius).abs()
    }
}

/// A spherical surface defined by center and radius.
///
/// Parameterization: longitude `u ∈ [0, 2π)`, latitude `v ∈ [-π/2, π/2]`.
#[derive(Debug, Clone)]
pub struct Sphere {
    /// Center of the sphere.
    pub center: Point3,
    /// Radius of the sphere.
    pub radius: f64,
    /// Reference direction for u = 0.
    pub ref_dir: Dir3,
    /// Axis direction (north pole).
    pub axis: Dir3,
}

impl Sphere {
    /// Create a sphere with the given center and radius.
    pub fn with_center(center: Point3, radius: f64) -> Self {
        Self {
            center,
            radius,
            ref_dir: Dir3::new_normalize(Vec3::x()),
            axis: Dir3::new_normalize(Vec3::z()),
        }
    }

    /// Second in-plane direction (axis × ref_dir).
    pub fn y_dir(&self) -> Vec3 {
        self.axis.as_ref().cross(self.ref_dir.as_ref())
    }

    /// Project a 3D point onto the sphere's (u, v) parameter space.
    pub fn project(&self, p: &Point3) -> Point2 {
        let d = p - self.center;
        let len = d.norm();
        if len < precision::CONFUSION {
            return Point2::origin();
        }
        let d = d / len;
        let v = d.dot(self.axis.as_ref()).clamp(-1.0, 1.0).asin();
        let cos_v = v.cos();
        let u = if cos_v.abs() < 1e-12 {
            0.0
        } else {
            let du = d.dot(self.ref_dir.as_ref()) / cos_v;
            let dv = d.dot(&self.y_dir()) / cos_v;
            let u = dv.atan2(du);
            if u < 0.0 {
                u + 2.0 * PI
            } else {
                u
            }
        };
        Point2::new(u, v)
    }
}

/// A parametric surface: closed enum over the analytic types.
#[derive(Debug, Clone)]
pub enum Surface {
    /// Infinite plane.
    Plane(Plane),
    /// Cylinder, infinite along its axis.
    Cylinder(Cylinder),
    /// Full sphere.
    Sphere(Sphere),
}

impl Surface {
    /// The kind of this surface.
    pub fn kind(&self) -> SurfaceKind {
        match self {
            Surface::Plane(_) => SurfaceKind::Plane,
            Surface::Cylinder(_) => SurfaceKind::Cylinder,
            Surface::Sphere(_) => SurfaceKind::Sphere,
        }
    }

    /// Evaluate the surface at parameter `(u, v)`.
    pub fn evaluate(&self, uv: Point2) -> Point3 {
        match self {
            Surface::Plane(p) => {
                p.origin + uv.x * p.x_dir.as_ref() + uv.y * p.y_dir.as_ref()
            }
            Surface::Cylinder(c) => {
                let (sin_u, cos_u) = uv.x.sin_cos();
                c.center
                    + c.radius * (cos_u * c.ref_dir.as_ref() + sin_u * c.y_dir())
                    + uv.y * c.axis.as_ref()
            }
            Surface::Sphere(s) => {
                let (sin_u, cos_u) = uv.x.sin_cos();
                let (sin_v, cos_v) = uv.y.sin_cos();
                s.center
                    + s.radius
                        * (cos_v * (cos_u * s.ref_dir.as_ref() + sin_u * s.y_dir())
                            + sin_v * s.axis.as_ref())
            }
        }
    }

    /// Surface normal at parameter `(u, v)`.
    pub fn normal(&self, uv: Point2) -> Dir3 {
        match self {
            Surface::Plane(p) => p.normal,
            Surface::Cylinder(c) => {
                let (sin_u, cos_u) = uv.x.sin_cos();
                Dir3::new_normalize(cos_u * c.ref_dir.as_ref() + sin_u * c.y_dir())
            }
            Surface::Sphere(s) => {
                let p = self.evaluate(uv);
                Dir3::new_normalize(p - s.center)
            }
        }
    }

    /// Project a 3D point into the surface's (u, v) parameter space.
    pub fn project(&self, p: &Point3) -> Point2 {
        match self {
            Surface::Plane(pl) => pl.project(p),
            Surface::Cylinder(c) => c.project(p),
            Surface::Sphere(s) => s.project(p),
        }
    }

    /// Unsigned distance from a point to the surface.
    pub fn distance(&self, p: &Point3) -> f64 {
        match self {
            Surface::Plane(pl) => pl.signed_distance(p).abs(),
            Surface::Cylinder(c) => c.distance(p),
            Surface::Sphere(s) => ((p - s.center).norm() - s.radius).abs(),
        }
    }

    /// Apply an affine transform to the surface.
    ///
    /// Only rigid transforms preserve the analytic types; the caller is
    /// responsible for not feeding in shears or non-uniform scales.
    pub fn transformed(&self, t: &Transform) -> Self {
        let dir = |d: &Dir3| Dir3::new_normalize(t.apply_vec(d.as_ref()));
        match self {
            Surface::Plane(p) => Surface::Plane(Plane {
                origin: t.apply_point(&p.origin),
                x_dir: dir(&p.x_dir),
                y_dir: dir(&p.y_dir),
                normal: dir(&p.normal),
            }),
            Surface::Cylinder(c) => Surface::Cylinder(Cylinder {
                center: t.apply_point(&c.center),
                axis: dir(&c.axis),
                ref_dir: dir(&c.ref_dir),
                radius: c.radius,
            }),
            Surface::Sphere(s) => Surface::Sphere(Sphere {
                center: t.apply_point(&s.center),
                radius: s.radius,
                ref_dir: dir(&s.ref_dir),
                axis: dir(&s.axis),
            }),
        }
    }
}

// =============================================================================
// Curves
// =============================================================================

/// The kind of a curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    /// Straight line.
    Line,
    /// Circle.
    Circle,
}

/// A 3D line, `P(t) = origin + t * direction`.
///
/// `direction` is kept unit-length so the parameter is arc length.
#[derive(Debug, Clone)]
pub struct Line3 {
    /// A point on the line.
    pub origin: Point3,
    /// Unit direction.
    pub direction: Dir3,
}

impl Line3 {
    /// Create a line through two points, parameterized by distance from `start`.
    pub fn through(start: Point3, end: Point3) -> Self {
        Self {
            origin: start,
            direction: Dir3::new_normalize(end - start),
        }
    }

    /// Parameter of the closest point on the line to `p`.
    pub fn project(&self, p: &Point3) -> f64 {
        (p - self.origin).dot(self.direction.as_ref())
    }
}

/// A circle in 3D space, `P(t) = center + r * (cos(t)*x_dir + sin(t)*y_dir)`,
/// `t ∈ [0, 2π)`.
#[derive(Debug, Clone)]
pub struct Circle3 {
    /// Center of the circle.
    pub center: Point3,
    /// Radius.
    pub radius: f64,
    /// Reference direction for t = 0.
    pub x_dir: Dir3,
    /// Second in-plane direction.
    pub y_dir: Dir3,
    /// Normal to the circle plane.
    pub normal: Dir3,
}

impl Circle3 {
    /// Create a circle with a given plane normal; in-plane axes are arbitrary.
    pub fn with_normal(center: Point3, radius: f64, normal: Vec3) -> Self {
        let n = Dir3::new_normalize(normal);
        let arbitrary = if n.as_ref().x.abs() < 0.9 {
            Vec3::x()
        } else {
            Vec3::y()
        };
        let x = Dir3::new_normalize(arbitrary.cross(n.as_ref()));
        let y = Dir3::new_normalize(n.as_ref().cross(x.as_ref()));
        Self {
            center,
            radius,
            x_dir: x,
            y_dir: y,
            normal: n,
        }
    }

    /// Parameter in `[0, 2π)` of the point on the circle closest to `p`.
    pub fn project(&self, p: &Point3) -> f64 {
        let d = p - self.center;
        let t = d.dot(self.y_dir.as_ref()).atan2(d.dot(self.x_dir.as_ref()));
        if t < 0.0 {
            t + 2.0 * PI
        } else {
            t
        }
    }
}

/// A parametric 3D curve: closed enum over the analytic types.
#[derive(Debug, Clone)]
pub enum Curve3 {
    /// Straight line.
    Line(Line3),
    /// Circle.
    Circle(Circle3),
}

impl Curve3 {
    /// The kind of this curve.
    pub fn kind(&self) -> CurveKind {
        match self {
            Curve3::Line(_) => CurveKind::Line,
            Curve3::Circle(_) => CurveKind::Circle,
        }
    }

    /// Evaluate the curve at parameter `t`.
    pub fn evaluate(&self, t: f64) -> Point3 {
        match self {
            Curve3::Line(l) => l.origin + t * l.direction.as_ref(),
            Curve3::Circle(c) => {
                let (sin_t, cos_t) = t.sin_cos();
                c.center + c.radius * (cos_t * c.x_dir.as_ref() + sin_t * c.y_dir.as_ref())
            }
        }
    }

    /// Tangent vector at parameter `t` (not necessarily unit length).
    pub fn tangent(&self, t: f64) -> Vec3 {
        match self {
            Curve3::Line(l) => *l.direction.as_ref(),
            Curve3::Circle(c) => {
                let (sin_t, cos_t) = t.sin_cos();
                c.radius * (-sin_t * c.x_dir.as_ref() + cos_t * c.y_dir.as_ref())
            }
        }
    }

    /// Parameter of the point on the curve closest to `p`.
    pub fn project(&self, p: &Point3) -> f64 {
        match self {
            Curve3::Line(l) => l.project(p),
            Curve3::Circle(c) => c.project(p),
        }
    }

    /// Natural domain of the full curve.
    pub fn domain(&self) -> (f64, f64) {
        match self {
            Curve3::Line(_) => (-precision::INFINITE, precision::INFINITE),
            Curve3::Circle(_) => (0.0, 2.0 * PI),
        }
    }

    /// True if the curve is periodic (closed onto itself).
    pub fn is_periodic(&self) -> bool {
        matches!(self, Curve3::Circle(_))
    }

    /// Apply a rigid affine transform to the curve.
    pub fn transformed(&self, t: &Transform) -> Self {
        let dir = |d: &Dir3| Dir3::new_normalize(t.apply_vec(d.as_ref()));
        match self {
            Curve3::Line(l) => Curve3::Line(Line3 {
                origin: t.apply_point(&l.origin),
                direction: dir(&l.direction),
            }),
            Curve3::Circle(c) => Curve3::Circle(Circle3 {
                center: t.apply_point(&c.center),
                radius: c.radius,
                x_dir: dir(&c.x_dir),
                y_dir: dir(&c.y_dir),
                normal: dir(&c.normal),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_project_roundtrip() {
        let p = Plane::xy();
        let uv = p.project(&Point3::new(3.0, 4.0, 99.0));
        assert!((uv.x - 3.0).abs() < 1e-12);
        assert!((uv.y - 4.0).abs() < 1e-12);
        let back = Surface::Plane(p).evaluate(uv);
        assert!(back.z.abs() < 1e-12);
    }

    #[test]
    fn test_cylinder_evaluate_and_project() {
        let c = Cylinder::with_axis(Point3::origin(), Vec3::z(), 5.0);
        let s = Surface::Cylinder(c.clone());
        let pt = s.evaluate(Point2::new(0.0, 3.0));
        assert!((pt.coords.xy().norm() - 5.0).abs() < 1e-12);
        assert!((pt.z - 3.0).abs() < 1e-12);
        let uv = c.project(&pt);
        assert!(uv.x.abs() < 1e-12 || (uv.x - 2.0 * PI).abs() < 1e-12);
        assert!((uv.y - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_sphere_project_roundtrip() {
        let sp = Sphere::with_center(Point3::new(1.0, 2.0, 3.0), 4.0);
        let s = Surface::Sphere(sp.clone());
        let uv = Point2::new(1.2, 0.7);
        let pt = s.evaluate(uv);
        let uv2 = sp.project(&pt);
        assert!((uv.x - uv2.x).abs() < 1e-9);
        assert!((uv.y - uv2.y).abs() < 1e-9);
    }

    #[test]
    fn test_sphere_normal_points_outward() {
        let sp = Sphere::with_center(Point3::origin(), 2.0);
        let s = Surface::Sphere(sp);
        let n = s.normal(Point2::new(0.0, 0.0));
        assert!((n.as_ref().x - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_line_project() {
        let l = Line3::through(Point3::origin(), Point3::new(10.0, 0.0, 0.0));
        assert!((l.project(&Point3::new(4.0, 5.0, 0.0)) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_circle_project() {
        let c = Circle3::with_normal(Point3::origin(), 5.0, Vec3::z());
        let t = 1.0;
        let pt = Curve3::Circle(c.clone()).evaluate(t);
        assert!((c.project(&pt) - t).abs() < 1e-12);
    }

    #[test]
    fn test_curve_tangent_perpendicular_to_radius() {
        let c = Circle3::with_normal(Point3::origin(), 5.0, Vec3::z());
        let curve = Curve3::Circle(c.clone());
        let t = 0.8;
        let p = curve.evaluate(t);
        let tan = curve.tangent(t);
        assert!(tan.dot(&(p - c.center)).abs() < 1e-9);
    }

    #[test]
    fn test_surface_distance() {
        let s = Surface::Sphere(Sphere::with_center(Point3::origin(), 5.0));
        assert!((s.distance(&Point3::new(7.0, 0.0, 0.0)) - 2.0).abs() < 1e-12);
        let c = Surface::Cylinder(Cylinder::with_axis(Point3::origin(), Vec3::z(), 5.0));
        assert!((c.distance(&Point3::new(0.0, 3.0, 9.0)) - 2.0).abs() < 1e-12);
    }
}
