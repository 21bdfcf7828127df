#![warn(missing_docs)]

//! Boolean operations on boundary-representation solids.
//!
//! The pipeline follows the classic pave-filler architecture:
//!
//! 1. [`DataStructure`] flattens every sub-shape of every operand into one
//!    index space and merges their topology into a single model.
//! 2. [`PaveFiller`] intersects sub-shape pairs in strict dimensional
//!    order (vertex/vertex through face/face), recording interferences,
//!    paves, common blocks and trimmed section curves.
//! 3. [`Builder`] splits edges at their paves and faces along their
//!    section curves and lying edges.
//! 4. [`perform`] classifies the split fragments against the operand
//!    solids and stitches the kept ones into the result of a
//!    [`BooleanOp`]; [`CellsBuilder`] and [`MakerVolume`] expose the same
//!    fragments for custom compositions.
//!
//! Pair dispatch runs through rayon unless [`RunSettings::run_parallel`]
//! is off; results are merged single-threaded, so parallel and serial
//! runs produce identical data. All tolerances are explicit: every
//! proximity test uses the sum of the two shapes' stored tolerances plus
//! the run's fuzzy value.

mod alert;
mod bbox;
mod builder;
mod context;
mod ds;
mod filler;
mod intersect;
mod ops;
mod settings;

pub use alert::{Alert, AlertKind, AlertList, BooleanError, Result, Severity};
pub use builder::Builder;
pub use context::{Context, Position};
pub use ds::{
    CommonBlock, DataStructure, EeArtifact, FaceInfo, IndexRange, Interference, Pave, PaveBlock,
    SectionCurve, ShapeInfo, ShapeKind, ShapeOrigin, TopoRef,
};
pub use filler::PaveFiller;
pub use intersect::{CurveCurve, CurveSurfacePoint, SectionGeometry, SurfaceSurface};
pub use ops::{
    perform, BooleanOp, CellsBuilder, Fragment, FragmentState, MakerVolume, OperationOutcome,
    OperationStatus, SectionResult,
};
pub use settings::{CancelToken, RunSettings};

#[cfg(test)]
mod tests {
    use super::*;
    use lathe_math::Point3;
    use lathe_primitives::{make_box, make_sphere, translate_solid};
    use lathe_topo::BrepSolid;
    use std::f64::consts::PI;

    fn run(a: &BrepSolid, b: &BrepSolid, op: BooleanOp) -> OperationOutcome {
        perform(&[a, b], op, &RunSettings::default()).unwrap()
    }

    fn volume(outcome: &OperationOutcome) -> f64 {
        outcome.result.as_ref().expect("non-empty result").volume()
    }

    #[test]
    fn test_boolean_volumes_add_up() {
        // Inclusion-exclusion: vol(Fuse) = vol(A) + vol(B) - vol(Common),
        // vol(Cut) = vol(A) - vol(Common).
        let a = make_box(2.0, 1.0, 1.0);
        let b = translate_solid(&make_box(1.0, 1.0, 2.0), 1.5, 0.0, 0.5);
        let common = volume(&run(&a, &b, BooleanOp::Common));
        let fuse = volume(&run(&a, &b, BooleanOp::Fuse));
        let cut = volume(&run(&a, &b, BooleanOp::Cut));
        assert!(common > 0.0);
        assert!((fuse - (a.volume() + b.volume() - common)).abs() < 1e-6);
        assert!((cut - (a.volume() - common)).abs() < 1e-6);
    }

    #[test]
    fn test_result_is_independent_of_operand_order_for_common_and_fuse() {
        let a = make_box(1.0, 1.0, 1.0);
        let b = translate_solid(&make_box(1.0, 1.0, 1.0), 0.5, 0.5, 0.0);
        for op in [BooleanOp::Common, BooleanOp::Fuse] {
            let ab = volume(&run(&a, &b, op));
            let ba = volume(&run(&b, &a, op));
            assert!((ab - ba).abs() < 1e-6, "{op:?}: {ab} vs {ba}");
        }
    }

    #[test]
    fn test_corner_overlap_volumes() {
        // Overlap an eighth of each cube: the common region is 0.125.
        let a = make_box(1.0, 1.0, 1.0);
        let b = translate_solid(&make_box(1.0, 1.0, 1.0), 0.5, 0.5, 0.5);
        assert!((volume(&run(&a, &b, BooleanOp::Common)) - 0.125).abs() < 1e-6);
        assert!((volume(&run(&a, &b, BooleanOp::Fuse)) - 1.875).abs() < 1e-6);
        assert!((volume(&run(&a, &b, BooleanOp::Cut)) - 0.875).abs() < 1e-6);
    }

    #[test]
    fn test_contained_operand() {
        // B strictly inside A: Common is B, Cut hollows A out.
        let a = make_box(4.0, 4.0, 4.0);
        let b = translate_solid(&make_box(2.0, 2.0, 2.0), 1.0, 1.0, 1.0);
        let common = run(&a, &b, BooleanOp::Common);
        assert!((volume(&common) - 8.0).abs() < 1e-6);
        let fuse = run(&a, &b, BooleanOp::Fuse);
        assert!((volume(&fuse) - 64.0).abs() < 1e-6);
        let cut = run(&a, &b, BooleanOp::Cut);
        assert!((volume(&cut) - 56.0).abs() < 1e-6);
        // The hollow result carries the cavity as a second, inner shell.
        let solid = cut.result.unwrap();
        assert_eq!(solid.model.solids[solid.solid].shells.len(), 2);
    }

    #[test]
    fn test_sphere_straddling_box_top() {
        // Sphere centered on the box's top face: the section circle is a
        // full great circle crossing the sphere's seam, and the result
        // keeps exactly one hemisphere per side.
        let a = make_box(1.0, 1.0, 1.0);
        let b = make_sphere(Point3::new(0.5, 0.5, 1.0), 0.4);
        let half_ball = 2.0 / 3.0 * PI * 0.4f64.powi(3);
        let common = volume(&run(&a, &b, BooleanOp::Common));
        assert!((common - half_ball).abs() < 1e-5);
        let fuse = volume(&run(&a, &b, BooleanOp::Fuse));
        assert!((fuse - (1.0 + half_ball)).abs() < 1e-5);
        let cut = volume(&run(&a, &b, BooleanOp::Cut));
        assert!((cut - (1.0 - half_ball)).abs() < 1e-5);
    }

    #[test]
    fn test_fuzzy_value_closes_near_miss() {
        let a = make_box(1.0, 1.0, 1.0);
        let b = translate_solid(&make_box(1.0, 1.0, 1.0), 1.00001, 0.0, 0.0);
        // Exact: disjoint, fuse keeps two shells.
        let exact = perform(&[&a, &b], BooleanOp::Fuse, &RunSettings::default()).unwrap();
        let solid = exact.result.unwrap();
        assert_eq!(solid.model.solids[solid.solid].shells.len(), 2);
        // Fuzzy wide enough to swallow the gap: the solids merge.
        let fuzzy = perform(&[&a, &b], BooleanOp::Fuse, &RunSettings::with_fuzzy(1e-4)).unwrap();
        let solid = fuzzy.result.unwrap();
        assert_eq!(solid.model.solids[solid.solid].shells.len(), 1);
    }

    #[test]
    fn test_cancellation_surfaces_as_aborted() {
        let a = make_box(1.0, 1.0, 1.0);
        let b = translate_solid(&make_box(1.0, 1.0, 1.0), 0.5, 0.0, 0.0);
        let settings = RunSettings::default();
        settings.cancel.cancel();
        let err = perform(&[&a, &b], BooleanOp::Common, &settings);
        assert!(matches!(err, Err(BooleanError::Aborted)));
    }

    #[test]
    fn test_result_solids_are_reusable_as_operands() {
        // Chain two cuts: (A - B) - C.
        let a = make_box(3.0, 1.0, 1.0);
        let b = translate_solid(&make_box(1.0, 1.0, 1.0), 0.0, 0.0, 0.0);
        let c = translate_solid(&make_box(1.0, 1.0, 1.0), 2.0, 0.0, 0.0);
        let ab = run(&a, &b, BooleanOp::Cut).result.unwrap();
        let abc = run(&ab, &c, BooleanOp::Cut).result.unwrap();
        assert!((abc.volume() - 1.0).abs() < 1e-6);
        let lo = Point3::new(1.5, 0.5, 0.5);
        let ctx = Context::new();
        assert_eq!(
            ctx.point_in_solid(&abc.model, abc.solid, &lo, 1e-7),
            Position::In
        );
        assert_eq!(
            ctx.point_in_solid(&abc.model, abc.solid, &Point3::new(0.5, 0.5, 0.5), 1e-7),
            Position::Out
        );
    }
}
