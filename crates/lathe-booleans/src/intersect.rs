//! Narrow-phase intersection of analytic curves and surfaces.
//!
//! Closed-form solutions cover every pair the primitive surfaces can
//! produce except oblique quadric-quadric sections; those fall back to a
//! sampled marching solve and come back as polylines.

use lathe_geom::{Circle3, Curve3, Line3, Surface};
use lathe_math::{precision, Dir3, Point3, Vec3};
use std::f64::consts::PI;

/// One curve-curve intersection event.
#[derive(Debug, Clone)]
pub enum CurveCurve {
    /// Transversal crossing at a single point.
    Point {
        /// Parameter on the first curve.
        t1: f64,
        /// Parameter on the second curve.
        t2: f64,
        /// The intersection point.
        point: Point3,
    },
    /// Tangential overlap along a shared sub-range.
    Overlap {
        /// Overlapping range on the first curve.
        range1: (f64, f64),
        /// Overlapping range on the second curve.
        range2: (f64, f64),
    },
}

/// One curve-surface piercing point.
#[derive(Debug, Clone)]
pub struct CurveSurfacePoint {
    /// Parameter on the curve.
    pub t: f64,
    /// The piercing point.
    pub point: Point3,
}

/// Geometry of one surface-surface section curve.
#[derive(Debug, Clone)]
pub enum SectionGeometry {
    /// Exact analytic section.
    Analytic(Curve3),
    /// Sampled polyline approximation (oblique quadric sections).
    Sampled(Vec<Point3>),
}

/// Result of a surface-surface intersection.
#[derive(Debug, Clone)]
pub enum SurfaceSurface {
    /// Surfaces do not meet.
    None,
    /// Surfaces coincide over their common region.
    Coincident,
    /// Surfaces touch tangentially at one point.
    Touch(Point3),
    /// One or more section curves.
    Curves(Vec<SectionGeometry>),
    /// The marching fallback found sign changes but could not link them
    /// into a section curve; the caller should skip the pair and warn.
    NotConverged,
}

fn in_range(t: f64, range: (f64, f64), slack: f64) -> bool {
    t >= range.0 - slack && t <= range.1 + slack
}

/// Fold a periodic parameter into `range` if some `t + 2πk` fits.
fn fold_periodic(t: f64, range: (f64, f64), slack: f64) -> Option<f64> {
    for k in [-1.0, 0.0, 1.0] {
        let tk = t + k * 2.0 * PI;
        if in_range(tk, range, slack) {
            return Some(tk);
        }
    }
    None
}

// =============================================================================
// curve-curve
// =============================================================================

/// Intersect two bounded curves. `tol` is the full matching tolerance
/// (both shape tolerances plus fuzzy already summed by the caller).
pub fn curve_curve(
    c1: &Curve3,
    range1: (f64, f64),
    c2: &Curve3,
    range2: (f64, f64),
    tol: f64,
) -> Vec<CurveCurve> {
    match (c1, c2) {
        (Curve3::Line(l1), Curve3::Line(l2)) => line_line(l1, range1, l2, range2, tol),
        (Curve3::Line(l), Curve3::Circle(c)) => line_circle(l, range1, c, range2, tol, false),
        (Curve3::Circle(c), Curve3::Line(l)) => line_circle(l, range2, c, range1, tol, true),
        (Curve3::Circle(a), Curve3::Circle(b)) => circle_circle(a, range1, b, range2, tol),
    }
}

fn line_line(
    l1: &Line3,
    range1: (f64, f64),
    l2: &Line3,
    range2: (f64, f64),
    tol: f64,
) -> Vec<CurveCurve> {
    let d1 = l1.direction.as_ref();
    let d2 = l2.direction.as_ref();
    let cross = d1.cross(d2);
    let w = l2.origin - l1.origin;

    if cross.norm() < precision::ANGULAR {
        // Parallel. Offset between the lines decides overlap vs nothing.
        let offset = (w - w.dot(d1) * d1).norm();
        if offset > tol {
            return Vec::new();
        }
        // Project l2's range onto l1 and intersect the intervals.
        let a2 = l1.project(&l2.origin) + range2.0 * d1.dot(d2);
        let b2 = l1.project(&l2.origin) + range2.1 * d1.dot(d2);
        let (lo2, hi2) = (a2.min(b2), a2.max(b2));
        let lo = range1.0.max(lo2);
        let hi = range1.1.min(hi2);
        if hi - lo <= tol {
            return Vec::new();
        }
        // Map the overlap back onto l2.
        let s = d1.dot(d2);
        let base = l2.project(&l1.origin);
        let ta = base + lo * s;
        let tb = base + hi * s;
        return vec![CurveCurve::Overlap {
            range1: (lo, hi),
            range2: (ta.min(tb), ta.max(tb)),
        }];
    }

    // Skew or crossing: closest point pair.
    let a = d1.dot(d1);
    let b = d1.dot(d2);
    let c = d2.dot(d2);
    let d = d1.dot(&w);
    let e = d2.dot(&w);
    let denom = a * c - b * b;
    let t1 = (d * c - b * e) / denom;
    let t2 = (d * b - a * e) / denom;
    let p1 = l1.origin + t1 * d1;
    let p2 = l2.origin + t2 * d2;
    if (p1 - p2).norm() <= tol && in_range(t1, range1, tol) && in_range(t2, range2, tol) {
        vec![CurveCurve::Point {
            t1,
            t2,
            point: Point3::from((p1.coords + p2.coords) * 0.5),
        }]
    } else {
        Vec::new()
    }
}

fn line_circle(
    l: &Line3,
    lrange: (f64, f64),
    c: &Circle3,
    crange: (f64, f64),
    tol: f64,
    swapped: bool,
) -> Vec<CurveCurve> {
    let n = c.normal.as_ref();
    let d = l.direction.as_ref();
    let denom = d.dot(n);
    let mut hits: Vec<(f64, Point3)> = Vec::new();

    if denom.abs() < precision::ANGULAR {
        // Line parallel to the circle plane.
        let h = (l.origin - c.center).dot(n);
        if h.abs() > tol {
            return Vec::new();
        }
        // Solve in-plane: |o' + t d' - center|^2 = r^2.
        let o = l.origin - h * n;
        let m = o - c.center;
        let a = d.dot(d);
        let b = 2.0 * m.dot(d);
        let cc = m.dot(&m) - c.radius * c.radius;
        let disc = b * b - 4.0 * a * cc;
        if disc < -tol {
            return Vec::new();
        }
        let sq = disc.max(0.0).sqrt();
        for t in [(-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)] {
            let p = l.origin + t * d;
            if hits.iter().all(|(ht, _)| (ht - t).abs() > tol) {
                hits.push((t, p));
            }
        }
    } else {
        // Line pierces the plane once; on the circle only if that point is.
        let t = (c.center - l.origin).dot(n) / denom;
        let p = l.origin + t * d;
        if (((p - c.center).norm()) - c.radius).abs() <= tol {
            hits.push((t, p));
        }
    }

    let mut out = Vec::new();
    for (tl, p) in hits {
        if !in_range(tl, lrange, tol) {
            continue;
        }
        let slack = tol / c.radius.max(precision::CONFUSION);
        let Some(tc) = fold_periodic(c.project(&p), crange, slack) else {
            continue;
        };
        let (t1, t2) = if swapped { (tc, tl) } else { (tl, tc) };
        out.push(CurveCurve::Point { t1, t2, point: p });
    }
    out
}

fn circle_circle(
    c1: &Circle3,
    range1: (f64, f64),
    c2: &Circle3,
    range2: (f64, f64),
    tol: f64,
) -> Vec<CurveCurve> {
    let n1 = c1.normal.as_ref();
    let n2 = c2.normal.as_ref();
    let coplanar = n1.cross(n2).norm() < precision::ANGULAR
        && ((c2.center - c1.center).dot(n1)).abs() <= tol;

    if coplanar {
        let d = (c2.center - c1.center).norm();
        if d <= tol && (c1.radius - c2.radius).abs() <= tol {
            // Coincident circles: the overlap is the common angular range.
            let a2 = fold_periodic(c1.project(&c2.evaluate_at(range2.0)), range1, 1.0)
                .unwrap_or(range1.0);
            let b2 = fold_periodic(c1.project(&c2.evaluate_at(range2.1)), range1, 1.0)
                .unwrap_or(range1.1);
            let lo = range1.0.max(a2.min(b2));
            let hi = range1.1.min(a2.max(b2));
            if hi - lo > tol / c1.radius.max(tol) {
                return vec![CurveCurve::Overlap {
                    range1: (lo, hi),
                    range2,
                }];
            }
            return Vec::new();
        }
        // Two coplanar circles: classic two-point construction.
        if d > c1.radius + c2.radius + tol || d < (c1.radius - c2.radius).abs() - tol {
            return Vec::new();
        }
        let u = (c2.center - c1.center) / d;
        let a = (d * d + c1.radius * c1.radius - c2.radius * c2.radius) / (2.0 * d);
        let h2 = c1.radius * c1.radius - a * a;
        let h = h2.max(0.0).sqrt();
        let v = n1.cross(&u);
        let base = c1.center + a * u;
        let mut pts = vec![base + h * v];
        if h > tol {
            pts.push(base - h * v);
        }
        return points_on_both_circles(pts, c1, range1, c2, range2, tol);
    }

    // Non-coplanar: cut c2 by c1's plane, keep points on c1.
    let mut pts = Vec::new();
    for t in solve_circle_plane(c2, &c1.center, n1, tol) {
        let p = c2.evaluate_at(t);
        if ((p - c1.center).norm() - c1.radius).abs() <= tol {
            pts.push(p);
        }
    }
    points_on_both_circles(pts, c1, range1, c2, range2, tol)
}

fn points_on_both_circles(
    pts: Vec<Point3>,
    c1: &Circle3,
    range1: (f64, f64),
    c2: &Circle3,
    range2: (f64, f64),
    tol: f64,
) -> Vec<CurveCurve> {
    let mut out = Vec::new();
    for p in pts {
        let s1 = tol / c1.radius.max(precision::CONFUSION);
        let s2 = tol / c2.radius.max(precision::CONFUSION);
        let (Some(t1), Some(t2)) = (
            fold_periodic(c1.project(&p), range1, s1),
            fold_periodic(c2.project(&p), range2, s2),
        ) else {
            continue;
        };
        out.push(CurveCurve::Point { t1, t2, point: p });
    }
    out
}

/// Roots of `(circle(t) - plane_origin) . n = 0` in `[0, 2π)`.
fn solve_circle_plane(c: &Circle3, origin: &Point3, n: &Vec3, tol: f64) -> Vec<f64> {
    // f(t) = A cos t + B sin t + C
    let a = c.radius * c.x_dir.as_ref().dot(n);
    let b = c.radius * c.y_dir.as_ref().dot(n);
    let cc = (c.center - origin).dot(n);
    let r = (a * a + b * b).sqrt();
    if r < precision::ANGULAR {
        return Vec::new(); // circle parallel to the plane
    }
    if cc.abs() > r + tol {
        return Vec::new();
    }
    let phi = b.atan2(a);
    let x = (-cc / r).clamp(-1.0, 1.0);
    let base = x.acos();
    let mut roots = vec![phi + base, phi - base];
    for t in &mut roots {
        *t = t.rem_euclid(2.0 * PI);
    }
    roots.dedup_by(|a, b| (*a - *b).abs() < precision::ANGULAR);
    roots
}

trait CircleEval {
    fn evaluate_at(&self, t: f64) -> Point3;
}

impl CircleEval for Circle3 {
    fn evaluate_at(&self, t: f64) -> Point3 {
        let (s, c) = t.sin_cos();
        self.center + self.radius * (c * self.x_dir.as_ref() + s * self.y_dir.as_ref())
    }
}

// =============================================================================
// curve-surface
// =============================================================================

/// Piercing points of a bounded curve against a surface.
///
/// Tangential "lying" configurations produce no points here; use
/// [`curve_on_surface`] to detect them.
pub fn curve_surface(
    curve: &Curve3,
    range: (f64, f64),
    surface: &Surface,
    tol: f64,
) -> Vec<CurveSurfacePoint> {
    let raw: Vec<f64> = match (curve, surface) {
        (Curve3::Line(l), Surface::Plane(p)) => {
            let denom = l.direction.as_ref().dot(p.normal.as_ref());
            if denom.abs() < precision::ANGULAR {
                Vec::new()
            } else {
                vec![(p.origin - l.origin).dot(p.normal.as_ref()) / denom]
            }
        }
        (Curve3::Line(l), Surface::Sphere(s)) => {
            let m = l.origin - s.center;
            let d = l.direction.as_ref();
            solve_quadratic(1.0, 2.0 * m.dot(d), m.dot(&m) - s.radius * s.radius, tol)
        }
        (Curve3::Line(l), Surface::Cylinder(c)) => {
            let a = c.axis.as_ref();
            let m = l.origin - c.center;
            let m = m - m.dot(a) * a;
            let d = l.direction.as_ref();
            let d = d - d.dot(a) * a;
            if d.norm() < precision::ANGULAR {
                Vec::new() // parallel to the axis: no transversal hit
            } else {
                solve_quadratic(
                    d.dot(&d),
                    2.0 * m.dot(&d),
                    m.dot(&m) - c.radius * c.radius,
                    tol,
                )
            }
        }
        (Curve3::Circle(c), Surface::Plane(p)) => {
            solve_circle_plane(c, &p.origin, p.normal.as_ref(), tol)
        }
        (Curve3::Circle(c), Surface::Sphere(s)) => {
            // |circle(t) - center|^2 = r^2 reduces to A cos + B sin = C.
            let m = c.center - s.center;
            let a = 2.0 * c.radius * m.dot(c.x_dir.as_ref());
            let b = 2.0 * c.radius * m.dot(c.y_dir.as_ref());
            let rhs = s.radius * s.radius - m.dot(&m) - c.radius * c.radius;
            solve_harmonic(a, b, rhs, tol)
        }
        (Curve3::Circle(_), Surface::Cylinder(cy)) => {
            let cy = cy.clone();
            sample_roots(range, 64, tol, |t| {
                let p = curve.evaluate(t);
                let m = p - cy.center;
                let radial = m - m.dot(cy.axis.as_ref()) * cy.axis.as_ref();
                radial.norm() - cy.radius
            })
        }
    };

    let mut out = Vec::new();
    for mut t in raw {
        if curve.is_periodic() {
            let r = match curve {
                Curve3::Circle(c) => c.radius,
                Curve3::Line(_) => 1.0,
            };
            match fold_periodic(t, range, tol / r.max(precision::CONFUSION)) {
                Some(tt) => t = tt,
                None => continue,
            }
        } else if !in_range(t, range, tol) {
            continue;
        }
        let point = curve.evaluate(t);
        if out
            .iter()
            .all(|h: &CurveSurfacePoint| (h.point - point).norm() > tol)
        {
            out.push(CurveSurfacePoint { t, point });
        }
    }
    out.sort_by(|a, b| a.t.total_cmp(&b.t));
    out
}

/// True if the whole bounded curve lies on the surface within `tol`.
pub fn curve_on_surface(curve: &Curve3, range: (f64, f64), surface: &Surface, tol: f64) -> bool {
    const SAMPLES: usize = 8;
    (0..=SAMPLES).all(|i| {
        let t = range.0 + (range.1 - range.0) * i as f64 / SAMPLES as f64;
        surface.distance(&curve.evaluate(t)) <= tol
    })
}

/// Real roots of `a t^2 + b t + c = 0`, tolerant of near-tangency.
fn solve_quadratic(a: f64, b: f64, c: f64, tol: f64) -> Vec<f64> {
    if a.abs() < precision::ANGULAR {
        if b.abs() < precision::ANGULAR {
            return Vec::new();
        }
        return vec![-c / b];
    }
    let disc = b * b - 4.0 * a * c;
    if disc < -tol {
        return Vec::new();
    }
    let sq = disc.max(0.0).sqrt();
    let r1 = (-b - sq) / (2.0 * a);
    let r2 = (-b + sq) / (2.0 * a);
    if (r1 - r2).abs() < precision::ANGULAR {
        vec![r1]
    } else {
        vec![r1, r2]
    }
}

/// Roots of `A cos t + B sin t = C` in `[0, 2π)`.
fn solve_harmonic(a: f64, b: f64, c: f64, tol: f64) -> Vec<f64> {
    let r = (a * a + b * b).sqrt();
    if r < precision::ANGULAR || c.abs() > r + tol {
        return Vec::new();
    }
    let phi = b.atan2(a);
    let base = (c / r).clamp(-1.0, 1.0).acos();
    let mut roots = vec![phi + base, phi - base];
    for t in &mut roots {
        *t = t.rem_euclid(2.0 * PI);
    }
    roots.dedup_by(|a, b| (*a - *b).abs() < precision::ANGULAR);
    roots
}

/// Sign-change sampling plus bisection refinement of `f(t) = 0`.
fn sample_roots(range: (f64, f64), samples: usize, tol: f64, f: impl Fn(f64) -> f64) -> Vec<f64> {
    let mut roots = Vec::new();
    let step = (range.1 - range.0) / samples as f64;
    let mut prev_t = range.0;
    let mut prev_v = f(prev_t);
    for i in 1..=samples {
        let t = range.0 + step * i as f64;
        let v = f(t);
        if prev_v == 0.0 {
            roots.push(prev_t);
        } else if prev_v * v < 0.0 {
            // Bisect to convergence.
            let (mut lo, mut hi) = (prev_t, t);
            let (mut flo, _) = (prev_v, v);
            for _ in 0..64 {
                let mid = 0.5 * (lo + hi);
                let fm = f(mid);
                if fm.abs() <= tol * 0.01 || hi - lo < precision::ANGULAR {
                    break;
                }
                if flo * fm < 0.0 {
                    hi = mid;
                } else {
                    lo = mid;
                    flo = fm;
                }
            }
            roots.push(0.5 * (lo + hi));
        }
        prev_t = t;
        prev_v = v;
    }
    roots
}

// =============================================================================
// surface-surface
// =============================================================================

/// Intersect two surfaces into section geometry.
pub fn surface_surface(s1: &Surface, s2: &Surface, tol: f64) -> SurfaceSurface {
    match (s1, s2) {
        (Surface::Plane(a), Surface::Plane(b)) => plane_plane(a, b, tol),
        (Surface::Plane(p), Surface::Sphere(s)) | (Surface::Sphere(s), Surface::Plane(p)) => {
            plane_sphere(p, s, tol)
        }
        (Surface::Plane(p), Surface::Cylinder(c)) | (Surface::Cylinder(c), Surface::Plane(p)) => {
            plane_cylinder(p, c, tol)
        }
        (Surface::Sphere(a), Surface::Sphere(b)) => sphere_sphere(a, b, tol),
        (Surface::Sphere(s), Surface::Cylinder(c)) | (Surface::Cylinder(c), Surface::Sphere(s)) => {
            sphere_cylinder(s, c, tol)
        }
        (Surface::Cylinder(a), Surface::Cylinder(b)) => cylinder_cylinder(a, b, tol),
    }
}

fn plane_plane(a: &lathe_geom::Plane, b: &lathe_geom::Plane, tol: f64) -> SurfaceSurface {
    let n1 = a.normal.as_ref();
    let n2 = b.normal.as_ref();
    let cross = n1.cross(n2);
    if cross.norm() < precision::ANGULAR {
        return if a.signed_distance(&b.origin).abs() <= tol {
            SurfaceSurface::Coincident
        } else {
            SurfaceSurface::None
        };
    }
    // A point on both planes: walk from a.origin within plane a toward b.
    let m = n2 - n2.dot(n1) * n1;
    let step = (b.origin - a.origin).dot(n2) / n2.dot(&m);
    let origin = a.origin + step * m;
    SurfaceSurface::Curves(vec![SectionGeometry::Analytic(Curve3::Line(Line3 {
        origin,
        direction: Dir3::new_normalize(cross),
    }))])
}

fn plane_sphere(p: &lathe_geom::Plane, s: &lathe_geom::Sphere, tol: f64) -> SurfaceSurface {
    let h = p.signed_distance(&s.center);
    if h.abs() > s.radius + tol {
        return SurfaceSurface::None;
    }
    if (h.abs() - s.radius).abs() <= tol {
        return SurfaceSurface::Touch(s.center - h * p.normal.as_ref());
    }
    let radius = (s.radius * s.radius - h * h).sqrt();
    let center = s.center - h * p.normal.as_ref();
    SurfaceSurface::Curves(vec![SectionGeometry::Analytic(Curve3::Circle(
        Circle3::with_normal(center, radius, *p.normal.as_ref()),
    ))])
}

fn plane_cylinder(p: &lathe_geom::Plane, c: &lathe_geom::Cylinder, tol: f64) -> SurfaceSurface {
    let n = p.normal.as_ref();
    let a = c.axis.as_ref();
    let cos = n.dot(a).abs();

    if cos < precision::ANGULAR {
        // Axis parallel to the plane: zero, one or two generator lines.
        let h = p.signed_distance(&c.center);
        if h.abs() > c.radius + tol {
            return SurfaceSurface::None;
        }
        let foot = c.center - h * n;
        if (h.abs() - c.radius).abs() <= tol {
            return SurfaceSurface::Curves(vec![SectionGeometry::Analytic(Curve3::Line(Line3 {
                origin: foot,
                direction: c.axis,
            }))]);
        }
        let half = (c.radius * c.radius - h * h).sqrt();
        let w = Dir3::new_normalize(a.cross(n));
        let mk = |origin: Point3| {
            SectionGeometry::Analytic(Curve3::Line(Line3 {
                origin,
                direction: c.axis,
            }))
        };
        return SurfaceSurface::Curves(vec![
            mk(foot + half * w.as_ref()),
            mk(foot - half * w.as_ref()),
        ]);
    }

    if cos > 1.0 - precision::ANGULAR {
        // Axis normal to the plane: a circle.
        let v = (p.origin - c.center).dot(a);
        let center = c.center + v * a;
        return SurfaceSurface::Curves(vec![SectionGeometry::Analytic(Curve3::Circle(
            Circle3::with_normal(center, c.radius, *a),
        ))]);
    }

    // Oblique: an ellipse, sampled.
    let denom = a.dot(n);
    let mut pts = Vec::with_capacity(65);
    for i in 0..=64 {
        let u = 2.0 * PI * i as f64 / 64.0;
        let (s, co) = u.sin_cos();
        let rim = c.center + c.radius * (co * c.ref_dir.as_ref() + s * c.y_dir());
        let v = (p.origin - rim).dot(n) / denom;
        pts.push(rim + v * a);
    }
    SurfaceSurface::Curves(vec![SectionGeometry::Sampled(pts)])
}

fn sphere_sphere(a: &lathe_geom::Sphere, b: &lathe_geom::Sphere, tol: f64) -> SurfaceSurface {
    let d = (b.center - a.center).norm();
    if d <= tol {
        return if (a.radius - b.radius).abs() <= tol {
            SurfaceSurface::Coincident
        } else {
            SurfaceSurface::None
        };
    }
    if d > a.radius + b.radius + tol || d < (a.radius - b.radius).abs() - tol {
        return SurfaceSurface::None;
    }
    let u = (b.center - a.center) / d;
    if (d - (a.radius + b.radius)).abs() <= tol {
        return SurfaceSurface::Touch(a.center + a.radius * u);
    }
    if (d - (a.radius - b.radius).abs()).abs() <= tol {
        let sign = if a.radius >= b.radius { 1.0 } else { -1.0 };
        return SurfaceSurface::Touch(a.center + sign * a.radius * u);
    }
    let x = (d * d + a.radius * a.radius - b.radius * b.radius) / (2.0 * d);
    let r2 = a.radius * a.radius - x * x;
    if r2 <= 0.0 {
        return SurfaceSurface::None;
    }
    SurfaceSurface::Curves(vec![SectionGeometry::Analytic(Curve3::Circle(
        Circle3::with_normal(a.center + x * u, r2.sqrt(), u),
    ))])
}

fn sphere_cylinder(s: &lathe_geom::Sphere, c: &lathe_geom::Cylinder, tol: f64) -> SurfaceSurface {
    let a = c.axis.as_ref();
    let m = s.center - c.center;
    let axial_offset = (m - m.dot(a) * a).norm();
    if axial_offset <= tol {
        // Sphere centered on the axis: zero, one or two latitude circles.
        if s.radius < c.radius - tol {
            return SurfaceSurface::None;
        }
        let foot = c.center + m.dot(a) * a;
        if (s.radius - c.radius).abs() <= tol {
            return SurfaceSurface::Curves(vec![SectionGeometry::Analytic(Curve3::Circle(
                Circle3::with_normal(foot, c.radius, *a),
            ))]);
        }
        let h = (s.radius * s.radius - c.radius * c.radius).sqrt();
        return SurfaceSurface::Curves(vec![
            SectionGeometry::Analytic(Curve3::Circle(Circle3::with_normal(
                foot + h * a,
                c.radius,
                *a,
            ))),
            SectionGeometry::Analytic(Curve3::Circle(Circle3::with_normal(
                foot - h * a,
                c.radius,
                *a,
            ))),
        ]);
    }

    // Off-axis: march the cylinder generators against the sphere.
    let v_center = (s.center - c.center).dot(a);
    let half = s.radius + c.radius + tol + 1.0;
    march_generators(c, (v_center - half, v_center + half), tol, |q| {
        (q - s.center).norm() - s.radius
    })
}

fn cylinder_cylinder(
    c1: &lathe_geom::Cylinder,
    c2: &lathe_geom::Cylinder,
    tol: f64,
) -> SurfaceSurface {
    let a1 = c1.axis.as_ref();
    let a2 = c2.axis.as_ref();
    if a1.cross(a2).norm() < precision::ANGULAR {
        // Parallel axes: reduce to two circles in a cross-section plane.
        let m = c2.center - c1.center;
        let offset = m - m.dot(a1) * a1;
        let d = offset.norm();
        if d <= tol && (c1.radius - c2.radius).abs() <= tol {
            return SurfaceSurface::Coincident;
        }
        if d > c1.radius + c2.radius + tol || d < (c1.radius - c2.radius).abs() - tol {
            return SurfaceSurface::None;
        }
        let u = offset / d;
        if (d - (c1.radius + c2.radius)).abs() <= tol
            || (d - (c1.radius - c2.radius).abs()).abs() <= tol
        {
            return SurfaceSurface::Curves(vec![SectionGeometry::Analytic(Curve3::Line(Line3 {
                origin: c1.center + c1.radius * u,
                direction: c1.axis,
            }))]);
        }
        let x = (d * d + c1.radius * c1.radius - c2.radius * c2.radius) / (2.0 * d);
        let h = (c1.radius * c1.radius - x * x).max(0.0).sqrt();
        let v = a1.cross(&u);
        let base = c1.center + x * u;
        let mk = |origin: Point3| {
            SectionGeometry::Analytic(Curve3::Line(Line3 {
                origin,
                direction: c1.axis,
            }))
        };
        return SurfaceSurface::Curves(vec![mk(base + h * v), mk(base - h * v)]);
    }

    // Skew or crossing axes: march c1's generators against c2. The axial
    // extent of the intersection grows as the axes approach parallel.
    let sin = a1.cross(a2).norm();
    let v_center = (c2.center - c1.center).dot(a1);
    let half = ((c2.center - c1.center).norm() + c1.radius + c2.radius) / sin.max(0.05) + 1.0;
    let c2 = c2.clone();
    march_generators(c1, (v_center - half, v_center + half), tol, move |q| {
        let m = q - c2.center;
        let radial = m - m.dot(c2.axis.as_ref()) * c2.axis.as_ref();
        radial.norm() - c2.radius
    })
}

/// March around a cylinder's angular parameter; at each generator line
/// solve `f(point on generator) = 0` for the axial parameter, then link
/// the per-generator roots into polyline branches by proximity.
fn march_generators(
    c: &lathe_geom::Cylinder,
    v_range: (f64, f64),
    tol: f64,
    f: impl Fn(Point3) -> f64,
) -> SurfaceSurface {
    const STEPS: usize = 96;
    let mut branches: Vec<Vec<Point3>> = Vec::new();
    let mut any = false;
    for i in 0..=STEPS {
        let u = 2.0 * PI * i as f64 / STEPS as f64;
        let (su, cu) = u.sin_cos();
        let rim = c.center + c.radius * (cu * c.ref_dir.as_ref() + su * c.y_dir());
        let axis = *c.axis.as_ref();
        let roots = sample_roots(v_range, 512, tol, |v| f(rim + v * axis));
        let jump = 8.0 * (PI * c.radius / STEPS as f64 + (v_range.1 - v_range.0) / 512.0) + tol;
        for v in roots {
            any = true;
            let p = rim + v * axis;
            // Attach to the nearest open branch end, else start a new one.
            let mut best: Option<(usize, f64)> = None;
            for (bi, br) in branches.iter().enumerate() {
                if let Some(q) = br.last() {
                    let dist = (q - p).norm();
                    if dist < jump && best.map_or(true, |(_, bd)| dist < bd) {
                        best = Some((bi, dist));
                    }
                }
            }
            match best {
                Some((bi, _)) => branches[bi].push(p),
                None => branches.push(vec![p]),
            }
        }
    }
    if !any {
        return SurfaceSurface::None;
    }
    let curves: Vec<SectionGeometry> = branches
        .into_iter()
        .filter(|b| b.len() >= 2)
        .map(SectionGeometry::Sampled)
        .collect();
    if curves.is_empty() {
        // Roots were found but none linked into a branch; the contact is
        // too degenerate for the sampling to resolve.
        SurfaceSurface::NotConverged
    } else {
        SurfaceSurface::Curves(curves)
    }
}
