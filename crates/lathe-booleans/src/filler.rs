//! The pave filler: runs the intersection stages in strict order and
//! populates the DS with interferences, paves, common blocks and section
//! curves.
//!
//! Each stage first computes pure geometric results for its candidate
//! pairs (through rayon when enabled, with pair-local buffers), then
//! merges them into the DS single-threaded. Cancellation is polled
//! between pairs and between stages.

use crate::alert::{AlertKind, AlertList, BooleanError, Result};
use crate::bbox;
use crate::context::{Context, Position};
use crate::ds::{
    DataStructure, EeArtifact, Interference, Pave, SectionCurve, ShapeKind, TopoRef,
};
use crate::intersect::{self, CurveCurve, SectionGeometry, SurfaceSurface};
use crate::settings::RunSettings;
use lathe_geom::{Curve3, Line3};
use lathe_math::{precision, Point3};
use lathe_topo::BrepSolid;
use rayon::prelude::*;
use std::f64::consts::PI;

/// Debug logging macro - only prints when debug-boolean feature is enabled
#[allow(unused_macros)]
#[cfg(feature = "debug-boolean")]
macro_rules! debug_bool {
    ($($arg:tt)*) => {
        eprintln!($($arg)*)
    };
}

/// No-op version when debug-boolean feature is disabled
#[allow(unused_macros)]
#[cfg(not(feature = "debug-boolean"))]
macro_rules! debug_bool {
    ($($arg:tt)*) => {};
}

pub(crate) use debug_bool;

/// Owns the DS, context and settings for one run.
pub struct PaveFiller {
    /// The populated intersection data structure.
    pub ds: DataStructure,
    /// Memoized query context, shared with the builder afterwards.
    pub context: Context,
    /// Warnings collected during the run.
    pub warnings: AlertList,
    settings: RunSettings,
    pending_overlaps: Vec<PendingOverlap>,
    pending_on_face: Vec<PendingOnFace>,
}

struct PendingOverlap {
    e1: usize,
    e2: usize,
    range1: (f64, f64),
    tol: f64,
}

struct PendingOnFace {
    edge: usize,
    face: usize,
    tol: f64,
}

impl PaveFiller {
    /// Build the DS from the operands and run all stages.
    pub fn run(operands: &[&BrepSolid], settings: RunSettings) -> Result<PaveFiller> {
        if operands.len() < 2 {
            return Err(BooleanError::TooFewOperands(operands.len()));
        }
        let mut filler = PaveFiller {
            ds: DataStructure::new(operands),
            context: Context::new(),
            warnings: AlertList::new(),
            settings,
            pending_overlaps: Vec::new(),
            pending_on_face: Vec::new(),
        };
        filler.perform()?;
        Ok(filler)
    }

    fn perform(&mut self) -> Result<()> {
        self.init_boxes();
        self.check_self_interference()?;
        self.perform_vv()?;
        self.perform_ve()?;
        self.perform_ee()?;
        self.perform_vf()?;
        self.perform_ef()?;
        self.perform_ff()?;
        self.consolidate()?;
        debug_bool!(
            "filler: {} interferences, {} pave blocks, {} section curves",
            self.ds.interferences.len(),
            self.ds.pave_block_count(),
            self.ds.section_curve_count()
        );
        Ok(())
    }

    fn checkpoint(&self) -> Result<()> {
        if self.settings.cancel.is_cancelled() {
            return Err(BooleanError::Aborted);
        }
        Ok(())
    }

    // --- helpers ----------------------------------------------------------

    fn shape_tolerance(&self, index: usize) -> f64 {
        match self.ds.shape(index).topo {
            TopoRef::Vertex(v) => self.ds.model.vertices[v].tolerance,
            TopoRef::Edge(e) => self.ds.model.edges[e].tolerance,
            TopoRef::Face(f) => self.ds.model.faces[f].tolerance,
            TopoRef::Shell(_) | TopoRef::Solid(_) => precision::CONFUSION,
        }
    }

    fn pair_tolerance(&self, a: usize, b: usize) -> f64 {
        self.shape_tolerance(a) + self.shape_tolerance(b) + self.settings.fuzzy()
    }

    fn edge_range(&self, edge: usize) -> (f64, f64) {
        let e = &self.ds.model.edges[self.ds.edge_id(edge)];
        (e.t_start, e.t_end)
    }

    fn edge_curve(&self, edge: usize) -> Curve3 {
        self.ds.model.edges[self.ds.edge_id(edge)].curve.clone()
    }

    fn find_or_make_vertex(&mut self, point: Point3, tol: f64) -> usize {
        match self.ds.find_vertex_near(&point, tol) {
            Some(v) => v,
            None => self.ds.append_vertex(point, tol.max(precision::CONFUSION)),
        }
    }

    fn init_boxes(&mut self) {
        let fuzzy = self.settings.fuzzy();
        for i in 0..self.ds.nb_source_shapes() {
            let b = match self.ds.shape(i).topo {
                TopoRef::Vertex(v) => Some(bbox::vertex_aabb(&self.ds.model, v, fuzzy)),
                TopoRef::Edge(e) => Some(bbox::edge_aabb(&self.ds.model, e, fuzzy)),
                TopoRef::Face(f) => Some(bbox::face_aabb(&self.ds.model, f, fuzzy)),
                TopoRef::Shell(_) | TopoRef::Solid(_) => None,
            };
            self.ds.shape_mut(i).bbox = b;
        }
    }

    fn boxes_overlap(&self, a: usize, b: usize) -> bool {
        match (&self.ds.shape(a).bbox, &self.ds.shape(b).bbox) {
            (Some(ba), Some(bb)) => ba.overlaps(bb),
            _ => false,
        }
    }

    /// Candidate pairs of the same kind across different operands.
    fn pairs_symmetric(&self, kind: ShapeKind) -> Vec<(usize, usize)> {
        let n = self.ds.operand_count();
        let mut out = Vec::new();
        for oi in 0..n {
            for oj in oi + 1..n {
                for &a in &self.ds.shapes_of_kind(oi, kind) {
                    for &b in &self.ds.shapes_of_kind(oj, kind) {
                        if self.boxes_overlap(a, b) {
                            out.push((a, b));
                        }
                    }
                }
            }
        }
        out
    }

    /// Candidate pairs of two kinds, both operand orders.
    fn pairs_asymmetric(&self, ka: ShapeKind, kb: ShapeKind) -> Vec<(usize, usize)> {
        let n = self.ds.operand_count();
        let mut out = Vec::new();
        for oi in 0..n {
            for oj in 0..n {
                if oi == oj {
                    continue;
                }
                for &a in &self.ds.shapes_of_kind(oi, ka) {
                    for &b in &self.ds.shapes_of_kind(oj, kb) {
                        if self.boxes_overlap(a, b) {
                            out.push((a, b));
                        }
                    }
                }
            }
        }
        out
    }

    fn map_pairs<T: Send>(
        &self,
        pairs: &[(usize, usize)],
        f: impl Fn(usize, usize) -> Vec<T> + Sync,
    ) -> Result<Vec<T>> {
        self.checkpoint()?;
        let cancel = &self.settings.cancel;
        let out: Vec<T> = if self.settings.run_parallel {
            pairs
                .par_iter()
                .filter(|_| !cancel.is_cancelled())
                .flat_map_iter(|&(a, b)| f(a, b))
                .collect()
        } else {
            let mut acc = Vec::new();
            for &(a, b) in pairs {
                if cancel.is_cancelled() {
                    break;
                }
                acc.extend(f(a, b));
            }
            acc
        };
        self.checkpoint()?;
        Ok(out)
    }

    // --- stage 0: operand validity ---------------------------------------

    /// Non-adjacent sub-shapes of one operand must not intersect; a
    /// self-intersecting operand cannot be paved.
    fn check_self_interference(&self) -> Result<()> {
        for op in 0..self.ds.operand_count() {
            let edges = self.ds.shapes_of_kind(op, ShapeKind::Edge);
            for (i, &e1) in edges.iter().enumerate() {
                for &e2 in &edges[i + 1..] {
                    if !self.boxes_overlap(e1, e2) || self.edges_adjacent(e1, e2) {
                        continue;
                    }
                    let tol = self.pair_tolerance(e1, e2);
                    let hits = intersect::curve_curve(
                        &self.edge_curve(e1),
                        self.edge_range(e1),
                        &self.edge_curve(e2),
                        self.edge_range(e2),
                        tol,
                    );
                    if !hits.is_empty() {
                        return Err(BooleanError::SelfIntersection { operand: op });
                    }
                }
            }
            let faces = self.ds.shapes_of_kind(op, ShapeKind::Face);
            for &e in &edges {
                for &f in &faces {
                    if !self.boxes_overlap(e, f) || self.edge_in_face(e, f) {
                        continue;
                    }
                    let tol = self.pair_tolerance(e, f);
                    let fid = self.ds.face_id(f);
                    let surface = &self.ds.model.faces[fid].surface;
                    if intersect::curve_on_surface(
                        &self.edge_curve(e),
                        self.edge_range(e),
                        surface,
                        tol,
                    ) {
                        continue;
                    }
                    for hit in intersect::curve_surface(
                        &self.edge_curve(e),
                        self.edge_range(e),
                        surface,
                        tol,
                    ) {
                        let pos = self
                            .context
                            .classify_point_on_face(&self.ds.model, fid, &hit.point, tol);
                        if pos == Position::In {
                            return Err(BooleanError::SelfIntersection { operand: op });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn edges_adjacent(&self, e1: usize, e2: usize) -> bool {
        let a = &self.ds.model.edges[self.ds.edge_id(e1)];
        let b = &self.ds.model.edges[self.ds.edge_id(e2)];
        a.start == b.start || a.start == b.end || a.end == b.start || a.end == b.end
    }

    fn edge_in_face(&self, edge: usize, face: usize) -> bool {
        let eid = self.ds.edge_id(edge);
        self.ds.model.face_edges(self.ds.face_id(face)).contains(&eid)
    }

    // --- stage: vertex-vertex ---------------------------------------------

    fn perform_vv(&mut self) -> Result<()> {
        let pairs = self.pairs_symmetric(ShapeKind::Vertex);
        let hits = self.map_pairs(&pairs, |a, b| {
            let tol = self.pair_tolerance(a, b);
            let pa = self.ds.vertex_point(a);
            let pb = self.ds.vertex_point(b);
            let d = (pa - pb).norm();
            if d <= tol {
                vec![(a, b, d, tol)]
            } else {
                Vec::new()
            }
        })?;
        for (a, b, d, tol) in hits {
            self.ds.interferences.push(Interference::Vv { v1: a, v2: b, tol });
            self.ds.set_same_domain(a, b);
            // The survivor's tolerance sphere must cover both originals.
            let rep = self.ds.same_domain(a);
            let grow = d * 0.5 + self.ds.vertex_tolerance(if rep == a { b } else { a });
            if let TopoRef::Vertex(vid) = self.ds.shape(rep).topo {
                let v = &mut self.ds.model.vertices[vid];
                v.tolerance = v.tolerance.max(grow);
            }
        }
        Ok(())
    }

    // --- stage: vertex-edge -----------------------------------------------

    fn perform_ve(&mut self) -> Result<()> {
        let pairs = self.pairs_asymmetric(ShapeKind::Vertex, ShapeKind::Edge);
        let hits = self.map_pairs(&pairs, |v, e| {
            let tol = self.pair_tolerance(v, e);
            let eid = self.ds.edge_id(e);
            let edge = &self.ds.model.edges[eid];
            let v_rep = self.ds.same_domain(v);
            // Endpoint coincidences belong to the VV stage.
            for end in [edge.start, edge.end] {
                if self.ds.index_of(TopoRef::Vertex(end)).map(|i| self.ds.same_domain(i))
                    == Some(v_rep)
                {
                    return Vec::new();
                }
            }
            let p = self.ds.vertex_point(v);
            let (t, dist) = self.context.project_point_on_edge(&self.ds.model, eid, &p);
            if dist <= tol {
                vec![(v_rep, e, t, tol)]
            } else {
                Vec::new()
            }
        })?;
        for (v, e, t, tol) in hits {
            self.ds
                .interferences
                .push(Interference::Ve { vertex: v, edge: e, t, tol });
            self.ds.add_pave(e, Pave { vertex: v, t });
        }
        Ok(())
    }

    // --- stage: edge-edge -------------------------------------------------

    fn perform_ee(&mut self) -> Result<()> {
        enum EeHit {
            Point {
                e1: usize,
                e2: usize,
                t1: f64,
                t2: f64,
                point: Point3,
                tol: f64,
            },
            Overlap {
                e1: usize,
                e2: usize,
                range1: (f64, f64),
                tol: f64,
            },
        }

        let pairs = self.pairs_symmetric(ShapeKind::Edge);
        let hits = self.map_pairs(&pairs, |e1, e2| {
            let tol = self.pair_tolerance(e1, e2);
            intersect::curve_curve(
                &self.edge_curve(e1),
                self.edge_range(e1),
                &self.edge_curve(e2),
                self.edge_range(e2),
                tol,
            )
            .into_iter()
            .map(|hit| match hit {
                CurveCurve::Point { t1, t2, point } => EeHit::Point { e1, e2, t1, t2, point, tol },
                CurveCurve::Overlap { range1, .. } => EeHit::Overlap { e1, e2, range1, tol },
            })
            .collect::<Vec<_>>()
        })?;

        for hit in hits {
            match hit {
                EeHit::Point { e1, e2, t1, t2, point, tol } => {
                    let vertex = self.find_or_make_vertex(point, tol);
                    self.ds.add_pave(e1, Pave { vertex, t: t1 });
                    self.ds.add_pave(e2, Pave { vertex, t: t2 });
                    self.ds.interferences.push(Interference::Ee {
                        e1,
                        e2,
                        artifact: EeArtifact::Point { t1, t2, vertex },
                        tol,
                    });
                }
                EeHit::Overlap { e1, e2, range1, tol } => {
                    // Pave both edges at the overlap bounds; the common
                    // block itself is built after consolidation.
                    let c1 = self.edge_curve(e1);
                    for t in [range1.0, range1.1] {
                        let p = c1.evaluate(t);
                        let vertex = self.find_or_make_vertex(p, tol);
                        self.ds.add_pave(e1, Pave { vertex, t });
                        let (t2, _) = self.context.project_point_on_edge(
                            &self.ds.model,
                            self.ds.edge_id(e2),
                            &p,
                        );
                        self.ds.add_pave(e2, Pave { vertex, t: t2 });
                    }
                    self.pending_overlaps.push(PendingOverlap { e1, e2, range1, tol });
                }
            }
        }
        Ok(())
    }

    // --- stage: vertex-face -----------------------------------------------

    fn perform_vf(&mut self) -> Result<()> {
        let pairs = self.pairs_asymmetric(ShapeKind::Vertex, ShapeKind::Face);
        let hits = self.map_pairs(&pairs, |v, f| {
            let tol = self.pair_tolerance(v, f);
            let v_rep = self.ds.same_domain(v);
            let p = self.ds.vertex_point(v);
            let fid = self.ds.face_id(f);
            match self.context.classify_point_on_face(&self.ds.model, fid, &p, tol) {
                Position::In => vec![(v_rep, f, tol, true)],
                Position::On => vec![(v_rep, f, tol, false)],
                Position::Out => Vec::new(),
            }
        })?;
        for (v, f, tol, interior) in hits {
            let info = self.ds.face_info_mut(f);
            if !info.verts_on.contains(&v) {
                info.verts_on.push(v);
            }
            if interior {
                self.ds
                    .interferences
                    .push(Interference::Vf { vertex: v, face: f, tol });
            }
        }
        Ok(())
    }

    // --- stage: edge-face -------------------------------------------------

    fn perform_ef(&mut self) -> Result<()> {
        enum EfHit {
            Pierce {
                edge: usize,
                face: usize,
                t: f64,
                point: Point3,
                tol: f64,
            },
            Lying {
                edge: usize,
                face: usize,
                tol: f64,
            },
        }

        let pairs = self.pairs_asymmetric(ShapeKind::Edge, ShapeKind::Face);
        let hits = self.map_pairs(&pairs, |e, f| {
            let tol = self.pair_tolerance(e, f);
            let fid = self.ds.face_id(f);
            let surface = &self.ds.model.faces[fid].surface;
            let curve = self.edge_curve(e);
            let range = self.edge_range(e);
            if intersect::curve_on_surface(&curve, range, surface, tol) {
                return vec![EfHit::Lying { edge: e, face: f, tol }];
            }
            intersect::curve_surface(&curve, range, surface, tol)
                .into_iter()
                .filter_map(|hit| {
                    let pos = self
                        .context
                        .classify_point_on_face(&self.ds.model, fid, &hit.point, tol);
                    (pos != Position::Out).then_some(EfHit::Pierce {
                        edge: e,
                        face: f,
                        t: hit.t,
                        point: hit.point,
                        tol,
                    })
                })
                .collect()
        })?;

        for hit in hits {
            match hit {
                EfHit::Pierce { edge, face, t, point, tol } => {
                    let vertex = self.find_or_make_vertex(point, tol);
                    self.ds.add_pave(edge, Pave { vertex, t });
                    let info = self.ds.face_info_mut(face);
                    if !info.verts_on.contains(&vertex) {
                        info.verts_on.push(vertex);
                    }
                    self.ds
                        .interferences
                        .push(Interference::Ef { edge, face, t, vertex, tol });
                }
                EfHit::Lying { edge, face, tol } => {
                    // The edge may carry no internal paves; it still needs
                    // pave blocks so the common block can form.
                    self.ds.mark_paved(edge);
                    self.pending_on_face.push(PendingOnFace { edge, face, tol });
                }
            }
        }
        Ok(())
    }

    // --- stage: face-face -------------------------------------------------

    fn perform_ff(&mut self) -> Result<()> {
        let pairs = self.pairs_symmetric(ShapeKind::Face);
        let results = self.map_pairs(&pairs, |f1, f2| {
            let tol = self.pair_tolerance(f1, f2);
            let items = self.intersect_face_pair(f1, f2, tol);
            if items.is_empty() {
                Vec::new()
            } else {
                vec![(f1, f2, tol, items)]
            }
        })?;

        for (f1, f2, tol, items) in results {
            let mut curve_ids = Vec::new();
            let mut point_ids = Vec::new();
            let mut approximated = false;
            for item in items {
                match item {
                    FfRaw::NotConverged => {
                        self.warnings.add(
                            AlertKind::IntersectionNotConverged,
                            Some(f1),
                            format!(
                                "intersection of faces {f1} and {f2} did not converge; pair skipped"
                            ),
                        );
                    }
                    FfRaw::Touch { point } => {
                        let v = self.find_or_make_vertex(point, tol);
                        point_ids.push(v);
                        for f in [f1, f2] {
                            let info = self.ds.face_info_mut(f);
                            if !info.verts_on.contains(&v) {
                                info.verts_on.push(v);
                            }
                        }
                    }
                    FfRaw::Section { curve, t1, t2, closed } => {
                        let p1 = curve.evaluate(t1);
                        let v1 = self.find_or_make_vertex(p1, tol);
                        let v2 = if closed {
                            v1
                        } else {
                            let p2 = curve.evaluate(t2);
                            self.find_or_make_vertex(p2, tol)
                        };
                        let id = self.ds.add_section_curve(SectionCurve {
                            curve,
                            t1,
                            t2,
                            v1,
                            v2,
                            faces: (f1, f2),
                            split_edge: None,
                        });
                        curve_ids.push(id);
                    }
                    FfRaw::Polyline { chain } => {
                        approximated = true;
                        let mut prev: Option<usize> = None;
                        for pair in chain.windows(2) {
                            let len = (pair[1] - pair[0]).norm();
                            if len <= tol {
                                continue;
                            }
                            let v1 = match prev {
                                Some(v) => v,
                                None => self.find_or_make_vertex(pair[0], tol),
                            };
                            let v2 = self.find_or_make_vertex(pair[1], tol);
                            let id = self.ds.add_section_curve(SectionCurve {
                                curve: Curve3::Line(Line3::through(pair[0], pair[1])),
                                t1: 0.0,
                                t2: len,
                                v1,
                                v2,
                                faces: (f1, f2),
                                split_edge: None,
                            });
                            curve_ids.push(id);
                            prev = Some(v2);
                        }
                    }
                }
            }
            if approximated {
                self.warnings.add(
                    AlertKind::SectionApproximated,
                    Some(f1),
                    format!("section between faces {f1} and {f2} approximated by a polyline"),
                );
            }
            if !curve_ids.is_empty() || !point_ids.is_empty() {
                self.ds.interferences.push(Interference::Ff {
                    f1,
                    f2,
                    curves: curve_ids,
                    points: point_ids,
                    tol,
                });
            }
        }
        Ok(())
    }

    /// Intersect one face pair into raw section items, trimmed to the
    /// common domain of both faces.
    fn intersect_face_pair(&self, f1: usize, f2: usize, tol: f64) -> Vec<FfRaw> {
        let fid1 = self.ds.face_id(f1);
        let fid2 = self.ds.face_id(f2);
        let s1 = &self.ds.model.faces[fid1].surface;
        let s2 = &self.ds.model.faces[fid2].surface;

        let both_in = |p: &Point3| {
            self.context.classify_point_on_face(&self.ds.model, fid1, p, tol) == Position::In
                && self.context.classify_point_on_face(&self.ds.model, fid2, p, tol)
                    == Position::In
        };
        let both_in_or_on = |p: &Point3| {
            self.context.classify_point_on_face(&self.ds.model, fid1, p, tol) != Position::Out
                && self.context.classify_point_on_face(&self.ds.model, fid2, p, tol)
                    != Position::Out
        };

        match intersect::surface_surface(s1, s2, tol) {
            SurfaceSurface::None => Vec::new(),
            // Coincident faces produce no section; the selector resolves
            // them through ON classification.
            SurfaceSurface::Coincident => Vec::new(),
            SurfaceSurface::NotConverged => vec![FfRaw::NotConverged],
            SurfaceSurface::Touch(point) => {
                if both_in_or_on(&point) {
                    vec![FfRaw::Touch { point }]
                } else {
                    Vec::new()
                }
            }
            SurfaceSurface::Curves(geoms) => {
                let mut out = Vec::new();
                for geom in geoms {
                    match geom {
                        SectionGeometry::Analytic(curve) => {
                            let Some(domain) = self.section_domain(&curve, f1, f2) else {
                                continue;
                            };
                            let mut events = self.section_events(&curve, domain, f1, f2, tol);
                            if curve.is_periodic() && events.is_empty() {
                                // Untouched closed section: keep whole.
                                let sample = curve.evaluate(domain.0);
                                if both_in(&sample) {
                                    out.push(FfRaw::Section {
                                        curve,
                                        t1: 0.0,
                                        t2: 2.0 * PI,
                                        closed: true,
                                    });
                                }
                                continue;
                            }
                            events.push(domain.0);
                            events.push(domain.1);
                            events.sort_by(|a, b| a.total_cmp(b));
                            events.dedup_by(|a, b| (*a - *b).abs() < precision::ANGULAR);
                            for w in events.windows(2) {
                                let (a, b) = (w[0], w[1]);
                                if b - a <= tol {
                                    continue;
                                }
                                let mid = curve.evaluate(0.5 * (a + b));
                                if both_in(&mid) {
                                    out.push(FfRaw::Section {
                                        curve: curve.clone(),
                                        t1: a,
                                        t2: b,
                                        closed: false,
                                    });
                                }
                            }
                        }
                        SectionGeometry::Sampled(points) => {
                            let mut chain: Vec<Point3> = Vec::new();
                            for pair in points.windows(2) {
                                let mid = Point3::from((pair[0].coords + pair[1].coords) * 0.5);
                                if both_in(&mid) {
                                    if chain.is_empty() {
                                        chain.push(pair[0]);
                                    }
                                    chain.push(pair[1]);
                                } else if chain.len() >= 2 {
                                    out.push(FfRaw::Polyline {
                                        chain: std::mem::take(&mut chain),
                                    });
                                } else {
                                    chain.clear();
                                }
                            }
                            if chain.len() >= 2 {
                                out.push(FfRaw::Polyline { chain });
                            }
                        }
                    }
                }
                out
            }
        }
    }

    /// Parameter window of a section curve worth examining: the whole
    /// period for circles, the clip against both face boxes for lines.
    fn section_domain(&self, curve: &Curve3, f1: usize, f2: usize) -> Option<(f64, f64)> {
        match curve {
            Curve3::Circle(_) => Some((0.0, 2.0 * PI)),
            Curve3::Line(l) => {
                let mut window: Option<(f64, f64)> = None;
                for f in [f1, f2] {
                    let b = self.ds.shape(f).bbox?;
                    let (lo, hi) = b.clip_line(&l.origin, l.direction.as_ref())?;
                    window = Some(match window {
                        None => (lo, hi),
                        Some((a, b2)) => (a.max(lo), b2.min(hi)),
                    });
                }
                window.filter(|(a, b)| a < b)
            }
        }
    }

    /// Parameters where the section curve crosses any boundary edge of
    /// either face.
    fn section_events(
        &self,
        curve: &Curve3,
        domain: (f64, f64),
        f1: usize,
        f2: usize,
        tol: f64,
    ) -> Vec<f64> {
        let mut events = Vec::new();
        for f in [f1, f2] {
            for eid in self.ds.model.face_edges(self.ds.face_id(f)) {
                let e = &self.ds.model.edges[eid];
                for hit in intersect::curve_curve(
                    curve,
                    domain,
                    &e.curve,
                    (e.t_start, e.t_end),
                    tol,
                ) {
                    match hit {
                        CurveCurve::Point { t1, .. } => events.push(t1),
                        CurveCurve::Overlap { range1, .. } => {
                            events.push(range1.0);
                            events.push(range1.1);
                        }
                    }
                }
            }
        }
        events
    }

    // --- consolidation ----------------------------------------------------

    fn consolidate(&mut self) -> Result<()> {
        self.checkpoint()?;
        self.ds.update_pave_blocks();

        // Edge-edge tangential overlaps become shared common blocks.
        let pending = std::mem::take(&mut self.pending_overlaps);
        for p in pending {
            let b1 = self.blocks_in_range(p.e1, p.range1, p.tol);
            let c2 = self.edge_curve(p.e2);
            let eid1 = self.ds.edge_id(p.e1);
            let b2: Vec<usize> = self
                .ds
                .pave_blocks_of_edge(p.e2)
                .iter()
                .copied()
                .filter(|&b| {
                    let blk = self.ds.pave_block(b);
                    let mid = c2.evaluate(0.5 * (blk.pave1.t + blk.pave2.t));
                    let (t1, _) = self.context.project_point_on_edge(&self.ds.model, eid1, &mid);
                    t1 >= p.range1.0 - p.tol && t1 <= p.range1.1 + p.tol
                })
                .collect();
            if b1.is_empty() || b2.is_empty() {
                continue;
            }
            let mut members = b1.clone();
            members.extend(&b2);
            let cb = self.ds.add_common_block(members, Vec::new());
            self.ds.interferences.push(Interference::Ee {
                e1: p.e1,
                e2: p.e2,
                artifact: EeArtifact::Overlap { common_block: cb },
                tol: p.tol,
            });
        }

        // Edges lying on a face: their blocks inside the face become a
        // common block bound to the face and are filed in its FaceInfo.
        let pending = std::mem::take(&mut self.pending_on_face);
        for p in pending {
            self.checkpoint()?;
            let fid = self.ds.face_id(p.face);
            let blocks: Vec<usize> = {
                let curve = self.edge_curve(p.edge);
                self.ds
                    .pave_blocks_of_edge(p.edge)
                    .iter()
                    .copied()
                    .filter(|&b| {
                        let blk = self.ds.pave_block(b);
                        let mid = curve.evaluate(0.5 * (blk.pave1.t + blk.pave2.t));
                        self.context
                            .classify_point_on_face(&self.ds.model, fid, &mid, p.tol)
                            == Position::In
                    })
                    .collect()
            };
            if blocks.is_empty() {
                continue;
            }
            self.ds.add_common_block(blocks.clone(), vec![p.face]);
            let info = self.ds.face_info_mut(p.face);
            for b in blocks {
                if !info.on.contains(&b) {
                    info.on.push(b);
                }
            }
        }
        Ok(())
    }

    fn blocks_in_range(&self, edge: usize, range: (f64, f64), tol: f64) -> Vec<usize> {
        self.ds
            .pave_blocks_of_edge(edge)
            .iter()
            .copied()
            .filter(|&b| {
                let blk = self.ds.pave_block(b);
                let mid = 0.5 * (blk.pave1.t + blk.pave2.t);
                mid >= range.0 - tol && mid <= range.1 + tol
            })
            .collect()
    }
}

enum FfRaw {
    Touch {
        point: Point3,
    },
    Section {
        curve: Curve3,
        t1: f64,
        t2: f64,
        closed: bool,
    },
    Polyline {
        chain: Vec<Point3>,
    },
    /// The pair's surfaces intersect but no section could be built.
    NotConverged,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ds::ShapeKind;
    use lathe_geom::{Circle3, Cylinder, Plane, Surface};
    use lathe_math::{Dir3, Vec3};
    use lathe_topo::{EdgeUse, Model, Wire};
    use lathe_primitives::{make_box, make_sphere, translate_solid};

    fn offset_boxes() -> (BrepSolid, BrepSolid) {
        let a = make_box(1.0, 1.0, 1.0);
        let b = translate_solid(&make_box(1.0, 1.0, 1.0), 0.5, 0.0, 0.0);
        (a, b)
    }

    fn can_solid(radius: f64, half_height: f64) -> BrepSolid {
        let mut model = Model::new();
        let pb = Point3::new(radius, 0.0, -half_height);
        let pt = Point3::new(radius, 0.0, half_height);
        let vb = model.add_vertex(pb);
        let vt = model.add_vertex(pt);
        let seam = model.add_edge(
            Curve3::Line(Line3::through(pb, pt)),
            0.0,
            2.0 * half_height,
            vb,
            vt,
        );
        let rim = |z: f64| Circle3 {
            center: Point3::new(0.0, 0.0, z),
            radius,
            x_dir: Dir3::new_normalize(Vec3::x()),
            y_dir: Dir3::new_normalize(Vec3::y()),
            normal: Dir3::new_normalize(Vec3::z()),
        };
        let bottom = model.add_edge(Curve3::Circle(rim(-half_height)), 0.0, 2.0 * PI, vb, vb);
        let top = model.add_edge(Curve3::Circle(rim(half_height)), 0.0, 2.0 * PI, vt, vt);
        let barrel = model.add_face(
            Surface::Cylinder(Cylinder::with_axis(Point3::origin(), Vec3::z(), radius)),
            Wire {
                edges: vec![
                    EdgeUse { edge: bottom, forward: true },
                    EdgeUse { edge: seam, forward: true },
                    EdgeUse { edge: top, forward: false },
                    EdgeUse { edge: seam, forward: false },
                ],
            },
            true,
        );
        let top_cap = model.add_face(
            Surface::Plane(Plane::new(
                Point3::new(0.0, 0.0, half_height),
                Vec3::x(),
                Vec3::y(),
            )),
            Wire { edges: vec![EdgeUse { edge: top, forward: true }] },
            true,
        );
        let bottom_cap = model.add_face(
            Surface::Plane(Plane::new(
                Point3::new(0.0, 0.0, -half_height),
                Vec3::y(),
                Vec3::x(),
            )),
            Wire { edges: vec![EdgeUse { edge: bottom, forward: false }] },
            true,
        );
        let shell = model.add_shell(vec![barrel, top_cap, bottom_cap]);
        let solid = model.add_solid(vec![shell]);
        BrepSolid { model, solid }
    }

    #[test]
    fn test_too_few_operands() {
        let a = make_box(1.0, 1.0, 1.0);
        let err = PaveFiller::run(&[&a], RunSettings::default());
        assert!(matches!(err, Err(BooleanError::TooFewOperands(1))));
    }

    #[test]
    fn test_disjoint_boxes_no_interferences() {
        let a = make_box(1.0, 1.0, 1.0);
        let b = translate_solid(&make_box(1.0, 1.0, 1.0), 10.0, 0.0, 0.0);
        let filler = PaveFiller::run(&[&a, &b], RunSettings::default()).unwrap();
        assert!(filler.ds.interferences.is_empty());
        assert_eq!(filler.ds.section_curve_count(), 0);
    }

    #[test]
    fn test_offset_boxes_produce_paves_and_blocks() {
        let (a, b) = offset_boxes();
        let filler = PaveFiller::run(&[&a, &b], RunSettings::default()).unwrap();
        assert!(!filler.ds.interferences.is_empty());
        assert!(filler.ds.pave_block_count() > 0);
        // Every block honors the ordering invariant.
        for i in 0..filler.ds.pave_block_count() {
            let blk = filler.ds.pave_block(i);
            assert!(blk.pave1.t < blk.pave2.t);
        }
        // The x-edges of operand 0 are cut at x = 0.5 into two blocks.
        let cut_edges = filler
            .ds
            .shapes_of_kind(0, ShapeKind::Edge)
            .into_iter()
            .filter(|&e| filler.ds.pave_blocks_of_edge(e).len() == 2)
            .count();
        assert_eq!(cut_edges, 4);
    }

    #[test]
    fn test_offset_boxes_serial_matches_parallel() {
        let (a, b) = offset_boxes();
        let par = PaveFiller::run(&[&a, &b], RunSettings::default()).unwrap();
        let ser = PaveFiller::run(
            &[&a, &b],
            RunSettings {
                run_parallel: false,
                ..RunSettings::default()
            },
        )
        .unwrap();
        assert_eq!(par.ds.interferences.len(), ser.ds.interferences.len());
        assert_eq!(par.ds.pave_block_count(), ser.ds.pave_block_count());
        assert_eq!(par.ds.section_curve_count(), ser.ds.section_curve_count());
    }

    #[test]
    fn test_cancellation_aborts() {
        let (a, b) = offset_boxes();
        let settings = RunSettings::default();
        settings.cancel.cancel();
        let err = PaveFiller::run(&[&a, &b], settings);
        assert!(matches!(err, Err(BooleanError::Aborted)));
    }

    #[test]
    fn test_touching_boxes_have_no_interior_sections() {
        // Stacked boxes sharing the z = 1 plane.
        let a = make_box(1.0, 1.0, 1.0);
        let b = translate_solid(&make_box(1.0, 1.0, 1.0), 0.0, 0.0, 1.0);
        let filler = PaveFiller::run(&[&a, &b], RunSettings::default()).unwrap();
        assert_eq!(filler.ds.section_curve_count(), 0);
    }

    #[test]
    fn test_fuzzy_value_bridges_small_gap() {
        let a = make_box(1.0, 1.0, 1.0);
        // A gap of 1e-5 between the solids along x.
        let b = translate_solid(&make_box(1.0, 1.0, 1.0), 1.00001, 0.0, 0.0);
        let tight = PaveFiller::run(&[&a, &b], RunSettings::default()).unwrap();
        assert!(tight.ds.interferences.is_empty());
        let fuzzy = PaveFiller::run(&[&a, &b], RunSettings::with_fuzzy(1e-4)).unwrap();
        assert!(!fuzzy.ds.interferences.is_empty());
    }

    #[test]
    fn test_tangent_pair_warns_and_is_skipped() {
        // A sphere internally tangent to the can's barrel along one
        // generator; the pair yields no section curve, only a warning.
        let can = can_solid(1.0, 1.0);
        let s = make_sphere(Point3::new(-0.5, 0.0, 0.0), 0.5);
        let filler = PaveFiller::run(&[&can, &s], RunSettings::default()).unwrap();
        assert!(filler.warnings.has(AlertKind::IntersectionNotConverged));
        assert_eq!(filler.ds.section_curve_count(), 0);
    }

    #[test]
    fn test_self_intersecting_operand_is_fatal() {
        // Sabotage one box by pulling a vertex through the opposite side.
        let mut a = make_box(1.0, 1.0, 1.0);
        let (vid, _) = a
            .model
            .vertices
            .iter()
            .find(|(_, v)| v.point == Point3::new(1.0, 1.0, 1.0))
            .unwrap();
        a.model.vertices[vid].point = Point3::new(-2.0, -2.0, 0.5);
        for (_, e) in &mut a.model.edges {
            let p0 = a.model.vertices[e.start].point;
            let p1 = a.model.vertices[e.end].point;
            if (p1 - p0).norm() > precision::CONFUSION {
                e.curve = Curve3::Line(Line3::through(p0, p1));
                e.t_start = 0.0;
                e.t_end = (p1 - p0).norm();
            }
        }
        let b = translate_solid(&make_box(1.0, 1.0, 1.0), 0.5, 0.0, 0.0);
        let err = PaveFiller::run(&[&a, &b], RunSettings::default());
        assert!(matches!(
            err,
            Err(BooleanError::SelfIntersection { operand: 0 })
        ));
    }
}
