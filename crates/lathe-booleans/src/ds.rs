//! The intersection data structure (DS).
//!
//! All sub-shapes of all operands are flattened into one index space; the
//! pave filler records interferences, paves, common blocks and section
//! curves against those indices, and the builder reads them back to split
//! topology. The DS owns a merged topology [`Model`] holding every
//! operand's entities plus the new vertices and edges the run creates.

use crate::bbox::Aabb3;
use lathe_geom::Curve3;
use lathe_math::{points_coincide, Point3};
use lathe_topo::{
    BrepSolid, EdgeId, EdgeUse, FaceId, Model, ShellId, SolidId, VertexId, Wire,
};
use std::collections::HashMap;

/// Kind of a DS shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// Topological vertex.
    Vertex,
    /// Topological edge.
    Edge,
    /// Topological face.
    Face,
    /// Shell of faces.
    Shell,
    /// Solid region.
    Solid,
}

/// Reference from a DS shape into the topology arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopoRef {
    /// A vertex.
    Vertex(VertexId),
    /// An edge.
    Edge(EdgeId),
    /// A face.
    Face(FaceId),
    /// A shell.
    Shell(ShellId),
    /// A solid.
    Solid(SolidId),
}

/// Where a DS shape came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeOrigin {
    /// Present in an input operand.
    Input,
    /// Created during the run (intersection vertex, split edge).
    New,
}

/// Bookkeeping for one DS shape.
#[derive(Debug, Clone)]
pub struct ShapeInfo {
    /// Immutable kind.
    pub kind: ShapeKind,
    /// Reference into [`DataStructure::model`].
    pub topo: TopoRef,
    /// Bounding box, inflated by tolerance and fuzzy value. Computed at
    /// init for input shapes; `None` for new shapes.
    pub bbox: Option<Aabb3>,
    /// Input or created during the run.
    pub origin: ShapeOrigin,
    /// Operand index for input shapes.
    pub operand: Option<usize>,
}

/// Contiguous slice of the flat index space belonging to one operand.
#[derive(Debug, Clone, Copy)]
pub struct IndexRange {
    /// First index (inclusive).
    pub first: usize,
    /// Last index (exclusive).
    pub last: usize,
    /// The operand these indices belong to.
    pub operand: usize,
}

impl IndexRange {
    /// True if `index` falls in this range.
    pub fn contains(&self, index: usize) -> bool {
        index >= self.first && index < self.last
    }
}

/// A point on an edge: a DS vertex index and the curve parameter at it.
#[derive(Debug, Clone, Copy)]
pub struct Pave {
    /// DS index of the vertex.
    pub vertex: usize,
    /// Parameter on the edge's curve.
    pub t: f64,
}

/// A maximal parameter interval of an edge free of internal paves.
///
/// After consolidation `pave1.t < pave2.t` strictly.
#[derive(Debug, Clone)]
pub struct PaveBlock {
    /// DS index of the original edge.
    pub edge: usize,
    /// Lower bound pave.
    pub pave1: Pave,
    /// Upper bound pave.
    pub pave2: Pave,
    /// Common block membership, if this block coincides with others.
    pub common_block: Option<usize>,
    /// Split edge built for this block by the builder.
    pub split_edge: Option<EdgeId>,
}

/// A set of pave blocks from different edges that occupy the same curve
/// in space; built once and shared.
#[derive(Debug, Clone, Default)]
pub struct CommonBlock {
    /// Member pave blocks.
    pub blocks: Vec<usize>,
    /// DS faces the common curve lies on, if any.
    pub faces: Vec<usize>,
}

/// A trimmed intersection curve between two faces.
#[derive(Debug, Clone)]
pub struct SectionCurve {
    /// Supporting curve.
    pub curve: Curve3,
    /// Lower parameter bound.
    pub t1: f64,
    /// Upper parameter bound.
    pub t2: f64,
    /// DS vertex at `t1`.
    pub v1: usize,
    /// DS vertex at `t2`.
    pub v2: usize,
    /// The two DS faces this curve separates.
    pub faces: (usize, usize),
    /// Split edge built for this curve by the builder.
    pub split_edge: Option<EdgeId>,
}

/// Interference state of one face, filled lazily during the run.
#[derive(Debug, Clone, Default)]
pub struct FaceInfo {
    /// Pave blocks lying on this face's boundary.
    pub on: Vec<usize>,
    /// Section curves crossing this face's interior.
    pub section_curves: Vec<usize>,
    /// DS vertices lying on the face (boundary or interior).
    pub verts_on: Vec<usize>,
}

/// Artifact of an edge-edge interference.
#[derive(Debug, Clone)]
pub enum EeArtifact {
    /// Transversal crossing at one point.
    Point {
        /// Parameter on the first edge.
        t1: f64,
        /// Parameter on the second edge.
        t2: f64,
        /// DS index of the intersection vertex.
        vertex: usize,
    },
    /// Tangential overlap along a sub-range of both edges.
    Overlap {
        /// Common block recording the shared interval.
        common_block: usize,
    },
}

/// One recorded interference between two DS shapes.
///
/// Closed enum; every variant carries the two DS indices and the tolerance
/// that established the match.
#[derive(Debug, Clone)]
pub enum Interference {
    /// Vertex-vertex coincidence.
    Vv {
        /// First vertex (lower operand).
        v1: usize,
        /// Second vertex.
        v2: usize,
        /// Matching tolerance.
        tol: f64,
    },
    /// Vertex lying on an edge.
    Ve {
        /// The vertex.
        vertex: usize,
        /// The edge.
        edge: usize,
        /// Parameter of the vertex on the edge's curve.
        t: f64,
        /// Matching tolerance.
        tol: f64,
    },
    /// Vertex lying on a face interior.
    Vf {
        /// The vertex.
        vertex: usize,
        /// The face.
        face: usize,
        /// Matching tolerance.
        tol: f64,
    },
    /// Edge-edge crossing or overlap.
    Ee {
        /// First edge.
        e1: usize,
        /// Second edge.
        e2: usize,
        /// Point hit or tangential overlap.
        artifact: EeArtifact,
        /// Matching tolerance.
        tol: f64,
    },
    /// Edge piercing a face.
    Ef {
        /// The edge.
        edge: usize,
        /// The face.
        face: usize,
        /// Parameter of the piercing point on the edge.
        t: f64,
        /// DS index of the piercing vertex.
        vertex: usize,
        /// Matching tolerance.
        tol: f64,
    },
    /// Face-face intersection.
    Ff {
        /// First face.
        f1: usize,
        /// Second face.
        f2: usize,
        /// Section curves produced (DS section curve ids).
        curves: Vec<usize>,
        /// Isolated touch points (DS vertex ids).
        points: Vec<usize>,
        /// Matching tolerance.
        tol: f64,
    },
}

/// The intersection data structure for one run.
#[derive(Debug, Clone, Default)]
pub struct DataStructure {
    /// Merged topology of all operands plus shapes created by the run.
    pub model: Model,
    shapes: Vec<ShapeInfo>,
    ranges: Vec<IndexRange>,
    index_of: HashMap<TopoRef, usize>,
    source_shapes: usize,

    paves_of_edge: HashMap<usize, Vec<Pave>>,
    pave_blocks: Vec<PaveBlock>,
    blocks_of_edge: HashMap<usize, Vec<usize>>,
    common_blocks: Vec<CommonBlock>,
    section_curves: Vec<SectionCurve>,
    face_info: HashMap<usize, FaceInfo>,
    shapes_sd: HashMap<usize, usize>,

    /// All interferences in the order found.
    pub interferences: Vec<Interference>,
    /// Solid DS index per operand.
    pub operand_solids: Vec<usize>,
}

impl DataStructure {
    /// Build the DS by merging the operands' models and flattening their
    /// sub-shapes into the index space, one contiguous range per operand.
    pub fn new(operands: &[&BrepSolid]) -> Self {
        let mut ds = DataStructure::default();
        for (rank, operand) in operands.iter().enumerate() {
            let first = ds.shapes.len();
            let solid_index = ds.merge_operand(operand, rank);
            ds.ranges.push(IndexRange {
                first,
                last: ds.shapes.len(),
                operand: rank,
            });
            ds.operand_solids.push(solid_index);
        }
        ds.source_shapes = ds.shapes.len();
        ds
    }

    fn register(&mut self, kind: ShapeKind, topo: TopoRef, operand: Option<usize>) -> usize {
        let index = self.shapes.len();
        self.shapes.push(ShapeInfo {
            kind,
            topo,
            bbox: None,
            origin: if operand.is_some() {
                ShapeOrigin::Input
            } else {
                ShapeOrigin::New
            },
            operand,
        });
        self.index_of.insert(topo, index);
        index
    }

    /// Copy one operand's entities into the merged model and register
    /// them; returns the DS index of the operand's solid.
    fn merge_operand(&mut self, operand: &BrepSolid, rank: usize) -> usize {
        let src = &operand.model;
        let mut vmap: HashMap<VertexId, VertexId> = HashMap::new();
        let mut emap: HashMap<EdgeId, EdgeId> = HashMap::new();
        let mut fmap: HashMap<FaceId, FaceId> = HashMap::new();

        for (vid, v) in &src.vertices {
            let new = self.model.vertices.insert(v.clone());
            vmap.insert(vid, new);
            self.register(ShapeKind::Vertex, TopoRef::Vertex(new), Some(rank));
        }
        for (eid, e) in &src.edges {
            let mut e = e.clone();
            e.start = vmap[&e.start];
            e.end = vmap[&e.end];
            let new = self.model.edges.insert(e);
            emap.insert(eid, new);
            self.register(ShapeKind::Edge, TopoRef::Edge(new), Some(rank));
        }
        let remap_wire = |w: &Wire, emap: &HashMap<EdgeId, EdgeId>| Wire {
            edges: w
                .edges
                .iter()
                .map(|eu| EdgeUse {
                    edge: emap[&eu.edge],
                    forward: eu.forward,
                })
                .collect(),
        };
        for (fid, f) in &src.faces {
            let mut f = f.clone();
            f.outer = remap_wire(&f.outer, &emap);
            f.inners = f.inners.iter().map(|w| remap_wire(w, &emap)).collect();
            let new = self.model.faces.insert(f);
            fmap.insert(fid, new);
            self.register(ShapeKind::Face, TopoRef::Face(new), Some(rank));
        }
        let mut smap: HashMap<ShellId, ShellId> = HashMap::new();
        for (sid, s) in &src.shells {
            let new = self.model.shells.insert(lathe_topo::Shell {
                faces: s.faces.iter().map(|f| fmap[f]).collect(),
            });
            smap.insert(sid, new);
            self.register(ShapeKind::Shell, TopoRef::Shell(new), Some(rank));
        }
        let solid = &src.solids[operand.solid];
        let new_solid = self.model.solids.insert(lathe_topo::Solid {
            shells: solid.shells.iter().map(|s| smap[s]).collect(),
        });
        self.register(ShapeKind::Solid, TopoRef::Solid(new_solid), Some(rank))
    }

    /// Number of DS shapes, input and new.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// True if the DS holds no shapes.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Number of input shapes (new shapes have indices at or above this).
    pub fn nb_source_shapes(&self) -> usize {
        self.source_shapes
    }

    /// True if `index` refers to a shape created during the run.
    pub fn is_new_shape(&self, index: usize) -> bool {
        index >= self.source_shapes
    }

    /// Info for one DS shape.
    pub fn shape(&self, index: usize) -> &ShapeInfo {
        &self.shapes[index]
    }

    /// Mutable info for one DS shape.
    pub fn shape_mut(&mut self, index: usize) -> &mut ShapeInfo {
        &mut self.shapes[index]
    }

    /// DS index of a topology entity, if registered.
    pub fn index_of(&self, topo: TopoRef) -> Option<usize> {
        self.index_of.get(&topo).copied()
    }

    /// Operand of an input shape; `None` for new shapes.
    pub fn rank(&self, index: usize) -> Option<usize> {
        self.shapes[index].operand
    }

    /// Index range of one operand.
    pub fn range(&self, operand: usize) -> IndexRange {
        self.ranges[operand]
    }

    /// Number of operands.
    pub fn operand_count(&self) -> usize {
        self.ranges.len()
    }

    /// All input DS indices of one kind belonging to one operand.
    pub fn shapes_of_kind(&self, operand: usize, kind: ShapeKind) -> Vec<usize> {
        let range = self.ranges[operand];
        (range.first..range.last)
            .filter(|&i| self.shapes[i].kind == kind)
            .collect()
    }

    // --- new shapes -------------------------------------------------------

    /// Create a new vertex in the model and register it as a new DS shape.
    pub fn append_vertex(&mut self, point: Point3, tolerance: f64) -> usize {
        let vid = self.model.vertices.insert(lathe_topo::Vertex {
            point,
            tolerance,
        });
        self.register(ShapeKind::Vertex, TopoRef::Vertex(vid), None)
    }

    /// Insert an edge into the model and register it as a new DS shape.
    pub fn append_edge(&mut self, edge: lathe_topo::Edge) -> usize {
        let eid = self.model.edges.insert(edge);
        self.register(ShapeKind::Edge, TopoRef::Edge(eid), None)
    }

    /// Point of a DS vertex.
    pub fn vertex_point(&self, index: usize) -> Point3 {
        match self.shapes[index].topo {
            TopoRef::Vertex(v) => self.model.vertices[v].point,
            _ => unreachable!("DS index {index} is not a vertex"),
        }
    }

    /// Tolerance of a DS vertex.
    pub fn vertex_tolerance(&self, index: usize) -> f64 {
        match self.shapes[index].topo {
            TopoRef::Vertex(v) => self.model.vertices[v].tolerance,
            _ => unreachable!("DS index {index} is not a vertex"),
        }
    }

    /// Topology id of a DS vertex.
    pub fn vertex_id(&self, index: usize) -> VertexId {
        match self.shapes[index].topo {
            TopoRef::Vertex(v) => v,
            _ => unreachable!("DS index {index} is not a vertex"),
        }
    }

    /// Topology id of a DS edge.
    pub fn edge_id(&self, index: usize) -> EdgeId {
        match self.shapes[index].topo {
            TopoRef::Edge(e) => e,
            _ => unreachable!("DS index {index} is not an edge"),
        }
    }

    /// Topology id of a DS face.
    pub fn face_id(&self, index: usize) -> FaceId {
        match self.shapes[index].topo {
            TopoRef::Face(f) => f,
            _ => unreachable!("DS index {index} is not a face"),
        }
    }

    /// Topology id of a DS solid.
    pub fn solid_id(&self, index: usize) -> SolidId {
        match self.shapes[index].topo {
            TopoRef::Solid(s) => s,
            _ => unreachable!("DS index {index} is not a solid"),
        }
    }

    /// Find an existing DS vertex within `tol` of `point`, preferring
    /// input shapes; used to snap new intersection points onto existing
    /// topology.
    pub fn find_vertex_near(&self, point: &Point3, tol: f64) -> Option<usize> {
        (0..self.shapes.len())
            .filter(|&i| self.shapes[i].kind == ShapeKind::Vertex)
            .find(|&i| {
                let p = self.vertex_point(i);
                points_coincide(&p, point, tol + self.vertex_tolerance(i))
            })
            .map(|i| self.same_domain(i))
    }

    // --- same-domain map --------------------------------------------------

    /// Record that `a` and `b` are the same shape; `b` becomes (part of)
    /// `a`'s same-domain group.
    pub fn set_same_domain(&mut self, a: usize, b: usize) {
        let ra = self.same_domain(a);
        let rb = self.same_domain(b);
        if ra != rb {
            // The smaller index wins as representative.
            let (rep, other) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.shapes_sd.insert(other, rep);
        }
    }

    /// Representative of a shape's same-domain group (itself if alone).
    pub fn same_domain(&self, mut index: usize) -> usize {
        while let Some(&next) = self.shapes_sd.get(&index) {
            index = next;
        }
        index
    }

    // --- paves and pave blocks --------------------------------------------

    /// Record a pave on a DS edge. Duplicates are tolerated; consolidation
    /// merges them.
    pub fn add_pave(&mut self, edge: usize, pave: Pave) {
        self.paves_of_edge.entry(edge).or_default().push(pave);
    }

    /// True if any pave was recorded on the edge.
    pub fn has_paves(&self, edge: usize) -> bool {
        self.paves_of_edge.contains_key(&edge)
    }

    /// Ensure the edge takes part in pave block construction even when it
    /// carries no internal paves (a whole edge lying on a face).
    pub fn mark_paved(&mut self, edge: usize) {
        self.paves_of_edge.entry(edge).or_default();
    }

    /// Rebuild the pave block chain of every paved edge.
    ///
    /// Per edge: add the end paves, map vertices through the same-domain
    /// map, sort by parameter, merge paves closer than the edge tolerance,
    /// then emit one block per consecutive pair. Blocks come out sorted by
    /// parameter.
    pub fn update_pave_blocks(&mut self) {
        let edges: Vec<usize> = self.paves_of_edge.keys().copied().collect();
        for edge in edges {
            let eid = self.edge_id(edge);
            let (t_start, t_end, v_start, v_end, tol) = {
                let e = &self.model.edges[eid];
                (e.t_start, e.t_end, e.start, e.end, e.tolerance)
            };
            // Edge endpoints are always registered at init.
            let ds_start = match self.index_of(TopoRef::Vertex(v_start)) {
                Some(i) => i,
                None => unreachable!("unregistered edge start vertex"),
            };
            let ds_end = match self.index_of(TopoRef::Vertex(v_end)) {
                Some(i) => i,
                None => unreachable!("unregistered edge end vertex"),
            };

            let mut paves = self.paves_of_edge.get(&edge).cloned().unwrap_or_default();
            paves.push(Pave {
                vertex: ds_start,
                t: t_start,
            });
            paves.push(Pave {
                vertex: ds_end,
                t: t_end,
            });
            for p in &mut paves {
                p.vertex = self.same_domain(p.vertex);
            }
            paves.sort_by(|a, b| a.t.total_cmp(&b.t));

            // Merge near-duplicates: same vertex, or parameters within the
            // edge tolerance of each other.
            let mut merged: Vec<Pave> = Vec::new();
            for p in paves {
                match merged.last() {
                    Some(last) if p.vertex == last.vertex => {}
                    Some(last) if (p.t - last.t).abs() <= tol => {}
                    _ => merged.push(p),
                }
            }

            let mut block_ids = Vec::new();
            for pair in merged.windows(2) {
                let id = self.pave_blocks.len();
                self.pave_blocks.push(PaveBlock {
                    edge,
                    pave1: pair[0],
                    pave2: pair[1],
                    common_block: None,
                    split_edge: None,
                });
                block_ids.push(id);
            }
            self.blocks_of_edge.insert(edge, block_ids);
        }
    }

    /// Pave block ids of an edge, sorted by parameter. Empty if the edge
    /// was never paved.
    pub fn pave_blocks_of_edge(&self, edge: usize) -> &[usize] {
        self.blocks_of_edge
            .get(&edge)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// One pave block.
    pub fn pave_block(&self, id: usize) -> &PaveBlock {
        &self.pave_blocks[id]
    }

    /// Mutable pave block.
    pub fn pave_block_mut(&mut self, id: usize) -> &mut PaveBlock {
        &mut self.pave_blocks[id]
    }

    /// Number of pave blocks.
    pub fn pave_block_count(&self) -> usize {
        self.pave_blocks.len()
    }

    // --- common blocks ----------------------------------------------------

    /// Group pave blocks into a common block; members get back-links.
    pub fn add_common_block(&mut self, blocks: Vec<usize>, faces: Vec<usize>) -> usize {
        let id = self.common_blocks.len();
        for &b in &blocks {
            self.pave_blocks[b].common_block = Some(id);
        }
        self.common_blocks.push(CommonBlock { blocks, faces });
        id
    }

    /// One common block.
    pub fn common_block(&self, id: usize) -> &CommonBlock {
        &self.common_blocks[id]
    }

    /// Number of common blocks.
    pub fn common_block_count(&self) -> usize {
        self.common_blocks.len()
    }

    // --- section curves ---------------------------------------------------

    /// Record a section curve; also files it in both faces' FaceInfo.
    pub fn add_section_curve(&mut self, curve: SectionCurve) -> usize {
        let id = self.section_curves.len();
        let (f1, f2) = curve.faces;
        self.section_curves.push(curve);
        self.face_info_mut(f1).section_curves.push(id);
        self.face_info_mut(f2).section_curves.push(id);
        id
    }

    /// One section curve.
    pub fn section_curve(&self, id: usize) -> &SectionCurve {
        &self.section_curves[id]
    }

    /// Mutable section curve.
    pub fn section_curve_mut(&mut self, id: usize) -> &mut SectionCurve {
        &mut self.section_curves[id]
    }

    /// Number of section curves.
    pub fn section_curve_count(&self) -> usize {
        self.section_curves.len()
    }

    // --- face info --------------------------------------------------------

    /// FaceInfo for a DS face, created on first access.
    pub fn face_info_mut(&mut self, face: usize) -> &mut FaceInfo {
        self.face_info.entry(face).or_default()
    }

    /// FaceInfo for a DS face, if any interference touched it.
    pub fn face_info(&self, face: usize) -> Option<&FaceInfo> {
        self.face_info.get(&face)
    }
}
