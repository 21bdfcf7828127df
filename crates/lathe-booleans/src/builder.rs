//! Splitting operand topology along the filler's results.
//!
//! Edge splitting turns every pave block into a split edge in the DS
//! model, with common blocks sharing one representative edge. Face
//! splitting rebuilds each face's wires from split pieces, injects the
//! in-face edges (section curves and lying edges), and reassembles the
//! regions by walking the resulting UV graph with a leftmost-turn rule.

use crate::alert::{AlertKind, AlertList};
use crate::context::{point_in_polygon, polygon_area, reanchor_polar_loop};
use crate::ds::{DataStructure, ShapeKind, TopoRef};
use crate::filler::debug_bool;
use lathe_geom::Surface;
use lathe_math::{precision, Point2, Vec2};
use lathe_topo::{Edge, EdgeId, EdgeUse, FaceId, Model, VertexId, Wire};
use std::collections::{HashMap, HashSet};

/// Result of the splitting pass: the image faces of every input face.
pub struct Builder {
    /// Split images of each input DS face, as faces in the DS model. An
    /// unchanged face maps to itself.
    pub face_images: HashMap<usize, Vec<FaceId>>,
    /// DS faces whose splits could not be assembled; kept unsplit.
    pub invalid_faces: Vec<usize>,
}

impl Builder {
    /// Split all edges and faces of every operand.
    pub fn build(ds: &mut DataStructure, alerts: &mut AlertList) -> Builder {
        split_edges(ds, alerts);
        let mut builder = Builder {
            face_images: HashMap::new(),
            invalid_faces: Vec::new(),
        };
        let mut faces = Vec::new();
        for op in 0..ds.operand_count() {
            faces.extend(ds.shapes_of_kind(op, ShapeKind::Face));
        }
        for f in faces {
            match split_face(ds, f) {
                Some(images) => {
                    debug_bool!("builder: face {} -> {} image(s)", f, images.len());
                    builder.face_images.insert(f, images);
                }
                None => {
                    alerts.add(
                        AlertKind::UnclosableWire,
                        Some(f),
                        format!("could not close split wires of face {f}; kept unsplit"),
                    );
                    builder.invalid_faces.push(f);
                    builder.face_images.insert(f, vec![ds.face_id(f)]);
                }
            }
        }
        builder
    }

    /// Images of one DS face.
    pub fn images_of(&self, face: usize) -> &[FaceId] {
        self.face_images
            .get(&face)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Build one split edge per pave block and per section curve.
///
/// Blocks of a common block share a single representative edge so that
/// neighboring faces of both operands stitch to the same topology.
fn split_edges(ds: &mut DataStructure, alerts: &mut AlertList) {
    for b in 0..ds.pave_block_count() {
        if ds.pave_block(b).split_edge.is_some() {
            continue;
        }
        let shared = ds.pave_block(b).common_block.and_then(|cb| {
            ds.common_block(cb)
                .blocks
                .iter()
                .find_map(|&m| ds.pave_block(m).split_edge)
        });
        let eid = match shared {
            Some(e) => e,
            None => {
                let blk = ds.pave_block(b).clone();
                let (curve, tolerance) = {
                    let src = &ds.model.edges[ds.edge_id(blk.edge)];
                    (src.curve.clone(), src.tolerance)
                };
                let start = ds.vertex_id(blk.pave1.vertex);
                let end = ds.vertex_id(blk.pave2.vertex);
                if start != end {
                    let v1 = &ds.model.vertices[start];
                    let v2 = &ds.model.vertices[end];
                    if (v2.point - v1.point).norm() <= v1.tolerance + v2.tolerance {
                        alerts.add(
                            AlertKind::TooSmallEdge,
                            Some(blk.edge),
                            format!(
                                "split of edge {} is shorter than its end vertex tolerances",
                                blk.edge
                            ),
                        );
                    }
                }
                let idx = ds.append_edge(Edge {
                    curve,
                    t_start: blk.pave1.t,
                    t_end: blk.pave2.t,
                    start,
                    end,
                    tolerance,
                });
                ds.edge_id(idx)
            }
        };
        ds.pave_block_mut(b).split_edge = Some(eid);
        if let Some(cb) = ds.pave_block(b).common_block {
            for m in ds.common_block(cb).blocks.clone() {
                ds.pave_block_mut(m).split_edge = Some(eid);
            }
        }
    }
    for s in 0..ds.section_curve_count() {
        if ds.section_curve(s).split_edge.is_some() {
            continue;
        }
        let sc = ds.section_curve(s).clone();
        let idx = ds.append_edge(Edge {
            curve: sc.curve,
            t_start: sc.t1,
            t_end: sc.t2,
            start: ds.vertex_id(sc.v1),
            end: ds.vertex_id(sc.v2),
            tolerance: precision::CONFUSION,
        });
        let eid = ds.edge_id(idx);
        ds.section_curve_mut(s).split_edge = Some(eid);
    }
}

fn block_split_edge(ds: &DataStructure, block: usize) -> EdgeId {
    match ds.pave_block(block).split_edge {
        Some(e) => e,
        None => unreachable!("split edges are built before face splitting"),
    }
}

/// Pieces replacing one wire edge use, in traversal order and direction.
fn edge_pieces(ds: &DataStructure, eu: EdgeUse) -> Vec<EdgeUse> {
    let Some(e_ds) = ds.index_of(TopoRef::Edge(eu.edge)) else {
        return vec![eu];
    };
    let blocks = ds.pave_blocks_of_edge(e_ds);
    if blocks.is_empty() {
        return vec![eu];
    }
    let piece = |&b: &usize| {
        let blk = ds.pave_block(b);
        let se = block_split_edge(ds, b);
        // A shared representative may run against this edge's parameter.
        let aligned = ds.model.edges[se].start == ds.vertex_id(blk.pave1.vertex);
        (se, aligned)
    };
    if eu.forward {
        blocks
            .iter()
            .map(piece)
            .map(|(edge, aligned)| EdgeUse {
                edge,
                forward: aligned,
            })
            .collect()
    } else {
        blocks
            .iter()
            .rev()
            .map(piece)
            .map(|(edge, aligned)| EdgeUse {
                edge,
                forward: !aligned,
            })
            .collect()
    }
}

struct DirEdge {
    eu: EdgeUse,
    from: VertexId,
    to: VertexId,
    /// UV direction leaving `from`.
    dir_out: Vec2,
    /// UV direction arriving at `to`.
    dir_in: Vec2,
    /// Chord length in UV, used to break angle ties.
    chord: f64,
}

/// Project an edge use into UV samples on `surface`, unwrapping the
/// periodic coordinate for continuity.
fn edge_uv_samples(model: &Model, surface: &Surface, eu: EdgeUse, mirror: bool) -> Vec<Point2> {
    let periodic = !matches!(surface, Surface::Plane(_));
    let mut out: Vec<Point2> = Vec::new();
    for p in model.edge_polyline(eu, 16) {
        let mut uv = surface.project(&p);
        if periodic {
            if let Some(prev) = out.last() {
                let prev_x = prev.x;
                while uv.x - prev_x > std::f64::consts::PI {
                    uv.x -= 2.0 * std::f64::consts::PI;
                }
                while uv.x - prev_x < -std::f64::consts::PI {
                    uv.x += 2.0 * std::f64::consts::PI;
                }
            }
        }
        if mirror {
            uv.y = -uv.y;
        }
        out.push(uv);
    }
    out
}

fn dir_edge(model: &Model, surface: &Surface, eu: EdgeUse, mirror: bool) -> DirEdge {
    let e = &model.edges[eu.edge];
    let (from, to) = if eu.forward {
        (e.start, e.end)
    } else {
        (e.end, e.start)
    };
    let uv = edge_uv_samples(model, surface, eu, mirror);
    let first = uv[1] - uv[0];
    let n = uv.len();
    let last = uv[n - 1] - uv[n - 2];
    DirEdge {
        eu,
        from,
        to,
        dir_out: first,
        dir_in: last,
        chord: (uv[n - 1] - uv[0]).norm(),
    }
}

fn turn_angle(incoming: &Vec2, outgoing: &Vec2) -> f64 {
    let cross = incoming.x * outgoing.y - incoming.y * outgoing.x;
    let dot = incoming.x * outgoing.x + incoming.y * outgoing.y;
    cross.atan2(dot)
}

/// Extract closed loops from the directed UV graph by always taking the
/// most counter-clockwise turn. Returns `None` when a walk dead-ends.
fn extract_loops(dir: &[DirEdge]) -> Option<Vec<Vec<usize>>> {
    let mut outgoing: HashMap<VertexId, Vec<usize>> = HashMap::new();
    for (i, d) in dir.iter().enumerate() {
        outgoing.entry(d.from).or_default().push(i);
    }
    let mut used = vec![false; dir.len()];
    let mut loops = Vec::new();
    for start in 0..dir.len() {
        if used[start] {
            continue;
        }
        let mut path = vec![start];
        used[start] = true;
        loop {
            if path.len() > dir.len() {
                return None;
            }
            let cur = *path.last()?;
            let node = dir[cur].to;
            let candidates = outgoing.get(&node)?;
            let mut best: Option<usize> = None;
            let mut best_turn = f64::NEG_INFINITY;
            let mut reverse: Option<usize> = None;
            for &c in candidates {
                if c == start && dir[cur].to == dir[start].from {
                    // Closing the loop is always allowed.
                } else if used[c] {
                    continue;
                }
                let is_reverse = dir[c].eu.edge == dir[cur].eu.edge
                    && dir[c].eu.forward != dir[cur].eu.forward;
                if is_reverse {
                    reverse = Some(c);
                    continue;
                }
                let turn = turn_angle(&dir[cur].dir_in, &dir[c].dir_out);
                let better = turn > best_turn + precision::ANGULAR
                    || (turn > best_turn - precision::ANGULAR
                        && best.map_or(true, |b| dir[c].chord < dir[b].chord));
                if better {
                    best = Some(c);
                    best_turn = turn;
                }
            }
            // A dead-end spur is walked back along its own reverse.
            let next = best.or(reverse)?;
            if next == start {
                break;
            }
            used[next] = true;
            path.push(next);
        }
        loops.push(path);
    }
    Some(loops)
}

fn loop_polygon(model: &Model, surface: &Surface, dir: &[DirEdge], lp: &[usize], mirror: bool) -> Vec<Point2> {
    let mut pts: Vec<Point2> = Vec::new();
    for &i in lp {
        let mut uv = edge_uv_samples(model, surface, dir[i].eu, mirror);
        uv.pop();
        // Re-anchor each edge's unwrap to the running polygon.
        if let Some(prev) = pts.last() {
            if let Some(first) = uv.first() {
                let shift = ((first.x - prev.x) / (2.0 * std::f64::consts::PI)).round()
                    * 2.0
                    * std::f64::consts::PI;
                if shift != 0.0 {
                    for q in &mut uv {
                        q.x -= shift;
                    }
                }
            }
        }
        pts.extend(uv);
    }
    reanchor_polar_loop(surface, &mut pts);
    pts
}

fn loop_edge_set(dir: &[DirEdge], lp: &[usize]) -> HashSet<EdgeId> {
    lp.iter().map(|&i| dir[i].eu.edge).collect()
}

/// Split one DS face along its paves, section curves and lying edges.
///
/// Returns `None` when the split wires cannot be closed.
fn split_face(ds: &mut DataStructure, face_ds: usize) -> Option<Vec<FaceId>> {
    let fid = ds.face_id(face_ds);
    let face = ds.model.faces[fid].clone();

    let mut boundary_changed = false;
    let mut rebuild_wire = |wire: &Wire, ds: &DataStructure| -> Vec<EdgeUse> {
        let mut out = Vec::new();
        for &eu in &wire.edges {
            let pieces = edge_pieces(ds, eu);
            if pieces.len() != 1 || pieces[0].edge != eu.edge {
                boundary_changed = true;
            }
            out.extend(pieces);
        }
        out
    };
    let outer_pieces = rebuild_wire(&face.outer, ds);
    let inner_pieces: Vec<Vec<EdgeUse>> =
        face.inners.iter().map(|w| rebuild_wire(w, ds)).collect();

    // In-face edges: trimmed section curves plus blocks of edges lying on
    // this face.
    let mut interior: Vec<EdgeId> = Vec::new();
    if let Some(info) = ds.face_info(face_ds) {
        for &sc in &info.section_curves {
            if let Some(e) = ds.section_curve(sc).split_edge {
                if !interior.contains(&e) {
                    interior.push(e);
                }
            }
        }
        for &blk in &info.on {
            let e = block_split_edge(ds, blk);
            if !interior.contains(&e) {
                interior.push(e);
            }
        }
    }

    if interior.is_empty() && !boundary_changed {
        return Some(vec![fid]);
    }

    let (closed, open): (Vec<EdgeId>, Vec<EdgeId>) = interior
        .into_iter()
        .partition(|&e| ds.model.edges[e].start == ds.model.edges[e].end);

    let mirror = !face.same_sense;
    let surface = face.surface.clone();

    let mut region_faces: Vec<(Wire, Vec<Wire>, Vec<Point2>)> = Vec::new();
    if open.is_empty() {
        // No graph needed; the face keeps its rebuilt boundary.
        let outer = Wire {
            edges: outer_pieces,
        };
        let inners: Vec<Wire> = inner_pieces
            .into_iter()
            .map(|edges| Wire { edges })
            .collect();
        let polygon = wire_polygon(&ds.model, &surface, &outer, mirror);
        region_faces.push((outer, inners, polygon));
    } else {
        let mut dir: Vec<DirEdge> = Vec::new();
        for eu in outer_pieces
            .iter()
            .chain(inner_pieces.iter().flatten())
            .copied()
        {
            dir.push(dir_edge(&ds.model, &surface, eu, mirror));
        }
        for e in open {
            for forward in [true, false] {
                dir.push(dir_edge(
                    &ds.model,
                    &surface,
                    EdgeUse { edge: e, forward },
                    mirror,
                ));
            }
        }
        let loops = extract_loops(&dir)?;

        // Positive loops bound regions; negative loops are holes of the
        // smallest containing region that shares no edge with them.
        let mut positives: Vec<(Vec<usize>, Vec<Point2>, f64)> = Vec::new();
        let mut negatives: Vec<(Vec<usize>, Vec<Point2>)> = Vec::new();
        for lp in loops {
            let polygon = loop_polygon(&ds.model, &surface, &dir, &lp, mirror);
            let area = polygon_area(&polygon);
            if area > precision::SQUARE_CONFUSION {
                positives.push((lp, polygon, area));
            } else if area < -precision::SQUARE_CONFUSION {
                negatives.push((lp, polygon));
            }
        }
        if positives.is_empty() {
            return None;
        }
        let mut holes_of: Vec<Vec<Wire>> = vec![Vec::new(); positives.len()];
        for (lp, polygon) in negatives {
            let edges = loop_edge_set(&dir, &lp);
            let sample = polygon.first().copied()?;
            let mut target: Option<usize> = None;
            for (i, (plp, ppoly, parea)) in positives.iter().enumerate() {
                if !loop_edge_set(&dir, plp).is_disjoint(&edges) {
                    continue;
                }
                if point_in_polygon(&sample, ppoly)
                    && target.map_or(true, |t| *parea < positives[t].2)
                {
                    target = Some(i);
                }
            }
            let wire = Wire {
                edges: lp.iter().map(|&i| dir[i].eu).collect(),
            };
            match target {
                Some(t) => holes_of[t].push(wire),
                // On a closed surface a stray negative loop bounds the
                // complement region; make it a face of its own.
                None if !matches!(surface, Surface::Plane(_)) => {
                    region_faces.push((wire, Vec::new(), Vec::new()));
                }
                None => return None,
            }
        }
        for (i, (lp, polygon, _)) in positives.into_iter().enumerate() {
            let wire = Wire {
                edges: lp.iter().map(|&j| dir[j].eu).collect(),
            };
            region_faces.push((wire, std::mem::take(&mut holes_of[i]), polygon));
        }
    }

    // Closed in-face curves cut a hole in their containing region and add
    // a cap face bounded by the curve alone.
    let mut caps: Vec<Wire> = Vec::new();
    for e in closed {
        let fwd = EdgeUse {
            edge: e,
            forward: true,
        };
        let polygon = edge_loop_polygon(&ds.model, &surface, fwd, mirror);
        let ccw = polygon_area(&polygon) > 0.0;
        let cap_use = EdgeUse {
            edge: e,
            forward: ccw,
        };
        let hole_use = EdgeUse {
            edge: e,
            forward: !ccw,
        };
        caps.push(Wire {
            edges: vec![cap_use],
        });
        let sample = polygon.first().copied()?;
        let degenerate = |poly: &[Point2]| {
            poly.is_empty() || polygon_area(poly).abs() <= precision::SQUARE_CONFUSION
        };
        let mut target: Option<usize> = None;
        for (i, (_, _, ppoly)) in region_faces.iter().enumerate() {
            if degenerate(ppoly) {
                // Degenerate outer; covers the whole closed surface.
                target = target.or(Some(i));
                continue;
            }
            if point_in_polygon(&sample, ppoly) {
                match target {
                    Some(t) if degenerate(&region_faces[t].2) => target = Some(i),
                    Some(t) => {
                        if polygon_area(ppoly) < polygon_area(&region_faces[t].2) {
                            target = Some(i);
                        }
                    }
                    None => target = Some(i),
                }
            }
        }
        let t = target?;
        region_faces[t].1.push(Wire {
            edges: vec![hole_use],
        });
    }

    let mut images = Vec::new();
    for (outer, inners, _) in region_faces {
        let new = ds.model.faces.insert(lathe_topo::Face {
            surface: surface.clone(),
            outer,
            inners,
            same_sense: face.same_sense,
            tolerance: face.tolerance,
        });
        images.push(new);
    }
    for outer in caps {
        let new = ds.model.faces.insert(lathe_topo::Face {
            surface: surface.clone(),
            outer,
            inners: Vec::new(),
            same_sense: face.same_sense,
            tolerance: face.tolerance,
        });
        images.push(new);
    }
    Some(images)
}

fn wire_polygon(model: &Model, surface: &Surface, wire: &Wire, mirror: bool) -> Vec<Point2> {
    let mut pts: Vec<Point2> = Vec::new();
    for &eu in &wire.edges {
        let mut uv = edge_uv_samples(model, surface, eu, mirror);
        uv.pop();
        pts.extend(uv);
    }
    reanchor_polar_loop(surface, &mut pts);
    pts
}

fn edge_loop_polygon(model: &Model, surface: &Surface, eu: EdgeUse, mirror: bool) -> Vec<Point2> {
    let mut uv = edge_uv_samples(model, surface, eu, mirror);
    uv.pop();
    uv
}

/// Deep-copy a set of faces into a fresh model, remapping every entity.
pub fn extract_faces(src: &Model, faces: &[FaceId]) -> (Model, Vec<FaceId>) {
    let mut model = Model::new();
    let mut vmap: HashMap<VertexId, VertexId> = HashMap::new();
    let mut emap: HashMap<EdgeId, EdgeId> = HashMap::new();
    let mut out = Vec::new();
    for &f in faces {
        let face = &src.faces[f];
        let mut copy_wire = |wire: &Wire, model: &mut Model| Wire {
            edges: wire
                .edges
                .iter()
                .map(|eu| {
                    let edge = *emap.entry(eu.edge).or_insert_with(|| {
                        let e = &src.edges[eu.edge];
                        let start = *vmap
                            .entry(e.start)
                            .or_insert_with(|| model.vertices.insert(src.vertices[e.start].clone()));
                        let end = *vmap
                            .entry(e.end)
                            .or_insert_with(|| model.vertices.insert(src.vertices[e.end].clone()));
                        model.edges.insert(Edge {
                            curve: e.curve.clone(),
                            t_start: e.t_start,
                            t_end: e.t_end,
                            start,
                            end,
                            tolerance: e.tolerance,
                        })
                    });
                    EdgeUse {
                        edge,
                        forward: eu.forward,
                    }
                })
                .collect(),
        };
        let outer = copy_wire(&face.outer, &mut model);
        let inners = face
            .inners
            .iter()
            .map(|w| copy_wire(w, &mut model))
            .collect();
        let new = model.faces.insert(lathe_topo::Face {
            surface: face.surface.clone(),
            outer,
            inners,
            same_sense: face.same_sense,
            tolerance: face.tolerance,
        });
        out.push(new);
    }
    (model, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertList;
    use crate::ds::Pave;
    use crate::filler::PaveFiller;
    use crate::settings::RunSettings;
    use lathe_math::Point3;
    use lathe_primitives::{make_box, make_sphere, translate_solid};

    fn split(a: &lathe_topo::BrepSolid, b: &lathe_topo::BrepSolid) -> (PaveFiller, Builder, AlertList) {
        let mut filler = PaveFiller::run(&[a, b], RunSettings::default()).unwrap();
        let mut alerts = AlertList::new();
        let builder = Builder::build(&mut filler.ds, &mut alerts);
        (filler, builder, alerts)
    }

    #[test]
    fn test_disjoint_faces_are_identity_images() {
        let a = make_box(1.0, 1.0, 1.0);
        let b = translate_solid(&make_box(1.0, 1.0, 1.0), 5.0, 0.0, 0.0);
        let (filler, builder, alerts) = split(&a, &b);
        assert!(alerts.is_empty());
        for op in 0..2 {
            for f in filler.ds.shapes_of_kind(op, ShapeKind::Face) {
                assert_eq!(builder.images_of(f), &[filler.ds.face_id(f)]);
            }
        }
    }

    #[test]
    fn test_offset_boxes_split_side_faces() {
        let a = make_box(1.0, 1.0, 1.0);
        let b = translate_solid(&make_box(1.0, 1.0, 1.0), 0.5, 0.0, 0.0);
        let (filler, builder, alerts) = split(&a, &b);
        assert!(!alerts.has_errors());
        let mut counts: Vec<usize> = filler
            .ds
            .shapes_of_kind(0, ShapeKind::Face)
            .into_iter()
            .map(|f| builder.images_of(f).len())
            .collect();
        counts.sort_unstable();
        // Four side faces split at x = 0.5; the x = 0 and x = 1 faces stay
        // whole.
        assert_eq!(counts, vec![1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn test_split_faces_share_split_edges() {
        let a = make_box(1.0, 1.0, 1.0);
        let b = translate_solid(&make_box(1.0, 1.0, 1.0), 0.5, 0.0, 0.0);
        let (filler, builder, _) = split(&a, &b);
        // Every edge of every image face of A is also used by some image
        // face of A or B; the split topology is shared, not duplicated.
        let mut usage: HashMap<EdgeId, usize> = HashMap::new();
        for op in 0..2 {
            for f in filler.ds.shapes_of_kind(op, ShapeKind::Face) {
                for &img in builder.images_of(f) {
                    for e in filler.ds.model.face_edges(img) {
                        *usage.entry(e).or_default() += 1;
                    }
                }
            }
        }
        // A watertight two-operand split uses each edge at least twice.
        assert!(usage.values().all(|&n| n >= 2));
    }

    #[test]
    fn test_split_edge_below_tolerance_warns() {
        let a = make_box(2.0, 1.0, 1.0);
        let b = translate_solid(&make_box(1.0, 1.0, 1.0), 5.0, 0.0, 0.0);
        let mut ds = DataStructure::new(&[&a, &b]);
        let edge = ds
            .shapes_of_kind(0, ShapeKind::Edge)
            .into_iter()
            .find(|&e| {
                let ed = &ds.model.edges[ds.edge_id(e)];
                (ed.t_end - ed.t_start - 2.0).abs() < 1e-9
            })
            .unwrap();
        // Two distinct paves whose vertices sit closer together than the
        // sum of their tolerance spheres, but further apart in parameter
        // than the edge tolerance, so consolidation keeps them both.
        let v1 = ds.append_vertex(Point3::new(1.0, 0.0, 0.0), 1e-7);
        let v2 = ds.append_vertex(Point3::new(1.0 + 1.5e-7, 0.0, 0.0), 1e-7);
        ds.add_pave(edge, Pave { vertex: v1, t: 1.0 });
        ds.add_pave(edge, Pave { vertex: v2, t: 1.0 + 1.5e-7 });
        ds.update_pave_blocks();
        assert_eq!(ds.pave_blocks_of_edge(edge).len(), 3);

        let mut alerts = AlertList::new();
        Builder::build(&mut ds, &mut alerts);
        assert!(alerts.has(AlertKind::TooSmallEdge));
        assert!(!alerts.has_errors());
    }

    #[test]
    fn test_closed_section_cuts_hole_and_cap() {
        let a = make_box(1.0, 1.0, 1.0);
        let b = make_sphere(Point3::new(0.5, 0.5, 1.3), 0.5);
        let (filler, builder, _) = split(&a, &b);
        assert!(filler.ds.section_curve_count() >= 1);
        // The top face of the box gains a circular hole plus a cap disk.
        let top = filler
            .ds
            .shapes_of_kind(0, ShapeKind::Face)
            .into_iter()
            .find(|&f| {
                let fid = filler.ds.face_id(f);
                filler
                    .ds
                    .model
                    .face_polygon(fid, 8)
                    .iter()
                    .all(|p| (p.z - 1.0).abs() < 1e-9)
            })
            .unwrap();
        let images = builder.images_of(top);
        assert_eq!(images.len(), 2);
        let holed = images
            .iter()
            .filter(|&&f| !filler.ds.model.faces[f].inners.is_empty())
            .count();
        assert_eq!(holed, 1);
    }
}
