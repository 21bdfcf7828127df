//! Operation selectors on top of the filler and builder.
//!
//! Every split face fragment is classified against each operand solid,
//! which yields the two regions the fragment separates (as operand-set
//! bitmasks). Common, Fuse and Cut are then pure region predicates over
//! the fragments; [`CellsBuilder`] exposes the same machinery for
//! arbitrary picks and [`MakerVolume`] enumerates every region.

use crate::alert::{AlertKind, AlertList, Result, Severity};
use crate::builder::{extract_faces, Builder};
use crate::context::Position;
use crate::ds::{Interference, ShapeKind};
use crate::filler::{debug_bool, PaveFiller};
use crate::settings::RunSettings;
use lathe_math::precision;
use lathe_topo::{BrepSolid, Edge, EdgeId, EdgeUse, FaceId, Model, VertexId, Wire};
use std::collections::HashMap;

/// The boolean operation to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    /// Intersection of the operands.
    Common,
    /// Union of the operands.
    Fuse,
    /// First operand minus the union of the others.
    Cut,
    /// The 1D intersection curves between the operands' boundaries.
    Section,
}

/// How the run ended, derived from the collected alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// Clean result.
    Done,
    /// Result produced, with degradations.
    DoneWithWarnings,
    /// Result produced, but part of it is invalid.
    DoneWithErrors,
}

/// Edges and vertices of a [`BooleanOp::Section`] result, with the model
/// owning them.
#[derive(Debug, Clone)]
pub struct SectionResult {
    /// Model holding the section edges and their vertices.
    pub model: Model,
    /// The section edges.
    pub edges: Vec<EdgeId>,
    /// Isolated tangency vertices where the boundaries touch without
    /// crossing.
    pub vertices: Vec<VertexId>,
}

/// Everything a boolean run hands back.
#[derive(Debug)]
pub struct OperationOutcome {
    /// The result solid, if the operation produced one.
    pub result: Option<BrepSolid>,
    /// Section edges, for [`BooleanOp::Section`] only.
    pub section: Option<SectionResult>,
    /// Alerts collected across all stages.
    pub alerts: AlertList,
    /// Aggregate status.
    pub status: OperationStatus,
}

/// State of a face fragment relative to one other operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentState {
    /// Strictly inside the operand.
    In,
    /// Strictly outside the operand.
    Out,
    /// On the operand's boundary, normals agreeing.
    OnSame,
    /// On the operand's boundary, normals opposed.
    OnOpposite,
}

/// One split face with its classification against every operand.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// The face, in the owning DS model.
    pub face: FaceId,
    /// Operand whose boundary this fragment came from.
    pub operand: usize,
    /// State per operand; the entry for `operand` itself is `In`.
    pub states: Vec<FragmentState>,
}

impl Fragment {
    /// Bitmask of the operands containing the region on the fragment's
    /// inner side (the side its face normal points away from).
    pub fn inside_mask(&self) -> u64 {
        let mut mask = 1u64 << self.operand;
        for (j, s) in self.states.iter().enumerate() {
            if j != self.operand && matches!(s, FragmentState::In | FragmentState::OnSame) {
                mask |= 1 << j;
            }
        }
        mask
    }

    /// Bitmask of the operands containing the region on the outer side.
    pub fn outside_mask(&self) -> u64 {
        let mut mask = 0u64;
        for (j, s) in self.states.iter().enumerate() {
            if j != self.operand && matches!(s, FragmentState::In | FragmentState::OnOpposite) {
                mask |= 1 << j;
            }
        }
        mask
    }

    /// True if a lower-ranked operand carries a coincident fragment; one
    /// copy of each shared boundary piece is enough.
    pub fn duplicated(&self) -> bool {
        self.states[..self.operand]
            .iter()
            .any(|s| matches!(s, FragmentState::OnSame | FragmentState::OnOpposite))
    }
}

/// Run a boolean operation on two or more solids.
///
/// For [`BooleanOp::Cut`] the first operand is the one the others are
/// subtracted from; Common, Fuse and Section are symmetric.
pub fn perform(
    operands: &[&BrepSolid],
    op: BooleanOp,
    settings: &RunSettings,
) -> Result<OperationOutcome> {
    let mut filler = PaveFiller::run(operands, settings.clone())?;
    let mut alerts = std::mem::take(&mut filler.warnings);
    let builder = Builder::build(&mut filler.ds, &mut alerts);

    let mut result = None;
    let mut section = None;
    match op {
        BooleanOp::Section => {
            section = Some(build_section(&filler));
        }
        _ => {
            let fragments = classify_fragments(&filler, &builder, settings, &mut alerts);
            let all = (1u64 << operands.len()) - 1;
            let mut faces = Vec::new();
            for frag in &fragments {
                if frag.duplicated() {
                    continue;
                }
                let rin = frag.inside_mask();
                let rout = frag.outside_mask();
                let (forward, reversed) = match op {
                    BooleanOp::Common => (rin == all, rout == all),
                    BooleanOp::Fuse => (rout == 0, rin == 0),
                    BooleanOp::Cut => (rin == 0b01, rout == 0b01),
                    BooleanOp::Section => unreachable!(),
                };
                if forward {
                    faces.push(frag.face);
                } else if reversed {
                    faces.push(reversed_face(&mut filler.ds.model, frag.face));
                }
            }
            debug_bool!("ops: {:?} keeps {} face(s)", op, faces.len());
            result = assemble_solid(&filler.ds.model, &faces);
            if result.is_none() {
                alerts.add(
                    AlertKind::EmptyResult,
                    None,
                    "the operation produced no faces",
                );
            }
        }
    }
    let status = status_of(&alerts);
    Ok(OperationOutcome {
        result,
        section,
        alerts,
        status,
    })
}

fn status_of(alerts: &AlertList) -> OperationStatus {
    if alerts.iter().any(|a| a.kind.severity() == Severity::Error) {
        OperationStatus::DoneWithErrors
    } else if !alerts.is_empty() {
        OperationStatus::DoneWithWarnings
    } else {
        OperationStatus::Done
    }
}

/// Classify every split face of every operand against all other operands.
fn classify_fragments(
    filler: &PaveFiller,
    builder: &Builder,
    settings: &RunSettings,
    alerts: &mut AlertList,
) -> Vec<Fragment> {
    let ds = &filler.ds;
    let n = ds.operand_count();
    let tol = precision::CONFUSION + settings.fuzzy();
    let solids: Vec<_> = ds.operand_solids.iter().map(|&i| ds.solid_id(i)).collect();

    let mut fragments = Vec::new();
    for op in 0..n {
        for f in ds.shapes_of_kind(op, ShapeKind::Face) {
            for &img in builder.images_of(f) {
                let Some((uv, p)) = filler.context.face_sample_point(&ds.model, img) else {
                    alerts.add(
                        AlertKind::DegenerateFace,
                        Some(f),
                        "split face has no interior sample point",
                    );
                    continue;
                };
                let normal = ds.model.face_normal(img, uv);
                let mut states = vec![FragmentState::In; n];
                for other in 0..n {
                    if other == op {
                        continue;
                    }
                    states[other] =
                        match filler
                            .context
                            .point_in_solid(&ds.model, solids[other], &p, tol)
                        {
                            Position::In => FragmentState::In,
                            Position::Out => FragmentState::Out,
                            Position::On => on_orientation(filler, other, &p, &normal, tol),
                        };
                }
                fragments.push(Fragment {
                    face: img,
                    operand: op,
                    states,
                });
            }
        }
    }
    fragments
}

/// Compare the fragment normal with the other operand's boundary normal
/// at a shared point.
fn on_orientation(
    filler: &PaveFiller,
    other: usize,
    p: &lathe_math::Point3,
    normal: &lathe_math::Vec3,
    tol: f64,
) -> FragmentState {
    let ds = &filler.ds;
    for f in ds.shapes_of_kind(other, ShapeKind::Face) {
        let fid = ds.face_id(f);
        if filler.context.classify_point_on_face(&ds.model, fid, p, tol) != Position::Out {
            let uv = ds.model.faces[fid].surface.project(p);
            let n2 = ds.model.face_normal(fid, uv);
            return if normal.dot(&n2) >= 0.0 {
                FragmentState::OnSame
            } else {
                FragmentState::OnOpposite
            };
        }
    }
    FragmentState::OnSame
}

/// Insert a copy of `face` with opposite orientation.
fn reversed_face(model: &mut Model, face: FaceId) -> FaceId {
    let f = model.faces[face].clone();
    let rev = |w: &Wire| Wire {
        edges: w
            .edges
            .iter()
            .rev()
            .map(|eu| EdgeUse {
                edge: eu.edge,
                forward: !eu.forward,
            })
            .collect(),
    };
    model.faces.insert(lathe_topo::Face {
        surface: f.surface.clone(),
        outer: rev(&f.outer),
        inners: f.inners.iter().map(rev).collect(),
        same_sense: !f.same_sense,
        tolerance: f.tolerance,
    })
}

/// Stitch kept faces into shells by shared edges, then into one solid.
///
/// Returns `None` when no faces were kept.
fn assemble_solid(src: &Model, faces: &[FaceId]) -> Option<BrepSolid> {
    if faces.is_empty() {
        return None;
    }
    let (mut model, new_faces) = extract_faces(src, faces);

    let mut faces_of_edge: HashMap<EdgeId, Vec<usize>> = HashMap::new();
    for (i, &f) in new_faces.iter().enumerate() {
        for e in model.face_edges(f) {
            faces_of_edge.entry(e).or_default().push(i);
        }
    }
    let mut component = vec![usize::MAX; new_faces.len()];
    let mut count = 0;
    for start in 0..new_faces.len() {
        if component[start] != usize::MAX {
            continue;
        }
        let mut stack = vec![start];
        component[start] = count;
        while let Some(i) = stack.pop() {
            for e in model.face_edges(new_faces[i]) {
                for &j in &faces_of_edge[&e] {
                    if component[j] == usize::MAX {
                        component[j] = count;
                        stack.push(j);
                    }
                }
            }
        }
        count += 1;
    }

    let mut shells = Vec::new();
    for c in 0..count {
        let members: Vec<FaceId> = (0..new_faces.len())
            .filter(|&i| component[i] == c)
            .map(|i| new_faces[i])
            .collect();
        let shell = model.add_shell(members);
        let probe = model.add_solid(vec![shell]);
        let volume = model.solid_volume(probe);
        model.solids.remove(probe);
        shells.push((shell, volume));
    }
    // Outer shell first.
    shells.sort_by(|a, b| b.1.total_cmp(&a.1));
    let solid = model.add_solid(shells.into_iter().map(|(s, _)| s).collect());
    Some(BrepSolid { model, solid })
}

/// Collect the 1D section: trimmed section curves plus edges shared
/// between the operands' boundaries.
fn build_section(filler: &PaveFiller) -> SectionResult {
    let ds = &filler.ds;
    let mut ids: Vec<EdgeId> = Vec::new();
    for s in 0..ds.section_curve_count() {
        if let Some(e) = ds.section_curve(s).split_edge {
            if !ids.contains(&e) {
                ids.push(e);
            }
        }
    }
    for c in 0..ds.common_block_count() {
        if let Some(&b) = ds.common_block(c).blocks.first() {
            if let Some(e) = ds.pave_block(b).split_edge {
                if !ids.contains(&e) {
                    ids.push(e);
                }
            }
        }
    }

    let mut model = Model::new();
    let mut vmap: HashMap<VertexId, VertexId> = HashMap::new();
    let mut edges = Vec::new();
    for id in ids {
        let e = &ds.model.edges[id];
        let start = *vmap
            .entry(e.start)
            .or_insert_with(|| model.vertices.insert(ds.model.vertices[e.start].clone()));
        let end = *vmap
            .entry(e.end)
            .or_insert_with(|| model.vertices.insert(ds.model.vertices[e.end].clone()));
        edges.push(model.edges.insert(Edge {
            curve: e.curve.clone(),
            t_start: e.t_start,
            t_end: e.t_end,
            start,
            end,
            tolerance: e.tolerance,
        }));
    }

    // Tangency points never make it into a section curve; carry them over
    // as standalone vertices.
    let mut vertices = Vec::new();
    for itf in &ds.interferences {
        if let Interference::Ff { points, .. } = itf {
            for &p in points {
                let vid = ds.vertex_id(p);
                let new = *vmap
                    .entry(vid)
                    .or_insert_with(|| model.vertices.insert(ds.model.vertices[vid].clone()));
                if !vertices.contains(&new) {
                    vertices.push(new);
                }
            }
        }
    }
    SectionResult {
        model,
        edges,
        vertices,
    }
}

/// Fragment-level selector: run the filler and builder once, then compose
/// a result from any subset of the classified fragments.
pub struct CellsBuilder {
    model: Model,
    fragments: Vec<Fragment>,
    /// Selection entries: source fragment index and the face to stitch in
    /// (the fragment's own face, or a reversed copy of it).
    selected: Vec<(usize, FaceId)>,
    /// Alerts from the underlying run.
    pub alerts: AlertList,
}

impl CellsBuilder {
    /// Intersect and split the operands, classifying every fragment.
    pub fn new(operands: &[&BrepSolid], settings: &RunSettings) -> Result<CellsBuilder> {
        let mut filler = PaveFiller::run(operands, settings.clone())?;
        let mut alerts = std::mem::take(&mut filler.warnings);
        let builder = Builder::build(&mut filler.ds, &mut alerts);
        let fragments = classify_fragments(&filler, &builder, settings, &mut alerts);
        Ok(CellsBuilder {
            model: filler.ds.model,
            fragments,
            selected: Vec::new(),
            alerts,
        })
    }

    /// The classified fragments.
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Select matching fragments with their own orientation.
    pub fn add(&mut self, pred: impl Fn(&Fragment) -> bool) {
        for i in 0..self.fragments.len() {
            if pred(&self.fragments[i]) {
                self.selected.push((i, self.fragments[i].face));
            }
        }
    }

    /// Select matching fragments with reversed orientation.
    pub fn add_reversed(&mut self, pred: impl Fn(&Fragment) -> bool) {
        for i in 0..self.fragments.len() {
            if pred(&self.fragments[i]) {
                let rev = reversed_face(&mut self.model, self.fragments[i].face);
                self.selected.push((i, rev));
            }
        }
    }

    /// Deselect fragments matching the predicate, whichever orientation
    /// they were selected with.
    pub fn remove(&mut self, pred: impl Fn(&Fragment) -> bool) {
        let fragments = &self.fragments;
        self.selected.retain(|&(i, _)| !pred(&fragments[i]));
    }

    /// Drop the current selection.
    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Assemble the selection into a solid, or `None` if nothing is
    /// selected.
    pub fn result(&self) -> Option<BrepSolid> {
        let faces: Vec<FaceId> = self.selected.iter().map(|&(_, f)| f).collect();
        assemble_solid(&self.model, &faces)
    }
}

/// Decompose the operands into every connected region of space they
/// bound.
pub struct MakerVolume;

impl MakerVolume {
    /// All non-empty regions, one solid each.
    pub fn build(operands: &[&BrepSolid], settings: &RunSettings) -> Result<Vec<BrepSolid>> {
        let mut cells = CellsBuilder::new(operands, settings)?;
        let n = operands.len();
        let mut out = Vec::new();
        for region in 1..(1u64 << n) {
            cells.clear();
            cells.add(|f| !f.duplicated() && f.inside_mask() == region);
            cells.add_reversed(|f| !f.duplicated() && f.outside_mask() == region);
            if let Some(solid) = cells.result() {
                out.push(solid);
            }
        }
        Ok(out)
    }
}
