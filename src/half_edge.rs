//! # Half-Edge Hull Mesh
//!
//! The mesh substrate for QuickHull: vertices, directed half-edges, and
//! polygonal faces stored in dense arenas and cross-referenced by typed
//! indices.
//!
//! ## Why arenas?
//!
//! Every mesh entity references several others (a half-edge knows its face,
//! its ring neighbors, and its twin; a face knows one edge of its ring; a
//! vertex knows the face that currently claims it). Owning references would
//! form cycles, so all links are indices into `Vec` arenas owned by
//! [`HullMesh`]. Entities are never freed mid-build: faces absorbed by a
//! merge are marked [`FaceMark::Deleted`] and pruned once construction ends,
//! which keeps every index stable for the whole run.
//!
//! ## Orientation convention
//!
//! A face ring is counter-clockwise when viewed from outside the hull, and
//! [`plane_normal`] follows the same convention: the normal of a freshly
//! created triangle `(v0, v1, v2)` points away from the hull interior.

use glam::DVec3;

use crate::quick_hull::HullError;

// TYPE-SAFE INDICES - Prevent mixing up different index types at compile time

/// Index into the vertex arena. Vertices are allocated once, in input order,
/// so a `VertexIdx` is also the original index of the input point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexIdx(pub usize);

/// Index into the half-edge arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeIdx(pub usize);

/// Index into the face arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceIdx(pub usize);

// VECTOR KERNEL - the two operations glam does not provide

/// Unnormalized normal of the triangle `(a, b, c)`, computed as
/// `(b - c) × (b - a)`.
///
/// The sign convention matches [`HullMesh::create_triangle`]: for a ring with
/// head sequence `a, b, c` the result points to the outside of the hull.
#[must_use]
pub fn plane_normal(a: DVec3, b: DVec3, c: DVec3) -> DVec3 {
    (b - c).cross(b - a)
}

/// Euclidean distance from `p` to the infinite line through `l1` and `l2`.
///
/// Returns `0.0` when `l1 == l2` (the line is underdetermined).
#[must_use]
pub fn point_line_distance(p: DVec3, l1: DVec3, l2: DVec3) -> f64 {
    let direction = l2 - l1;
    let length_sq = direction.length_squared();
    if length_sq == 0.0 {
        return 0.0;
    }
    (p - l1).cross(direction).length() / length_sq.sqrt()
}

// MESH ENTITIES

/// An input point wrapped with its intrusive list links.
///
/// `prev`/`next` thread the vertex through at most one of the builder's
/// global lists (claimed or unclaimed) at a time; `face` is the face that
/// currently claims the vertex as an outside point, if any.
#[derive(Clone, Debug)]
pub struct Vertex {
    pub point: DVec3,
    pub prev: Option<VertexIdx>,
    pub next: Option<VertexIdx>,
    pub face: Option<FaceIdx>,
}

impl Vertex {
    #[must_use]
    pub const fn new(point: DVec3) -> Self {
        Self {
            point,
            prev: None,
            next: None,
            face: None,
        }
    }
}

/// A directed edge of one face ring.
///
/// `opposite` is the twin half-edge in the neighboring face, traversed in the
/// reverse direction; it is `None` only while a face is being stitched in.
#[derive(Clone, Debug)]
pub struct HalfEdge {
    /// The vertex this edge points at. The tail is `prev`'s head.
    pub head: VertexIdx,
    /// The face owning this edge.
    pub face: FaceIdx,
    pub next: EdgeIdx,
    pub prev: EdgeIdx,
    pub opposite: Option<EdgeIdx>,
}

/// Face lifecycle marks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceMark {
    /// Part of the current hull boundary.
    Visible,
    /// Flagged concave by the first merge pass; revisited by the second.
    NonConvex,
    /// Absorbed by a merge or swallowed by a horizon; not part of the hull.
    Deleted,
}

/// A planar polygonal face of the hull.
#[derive(Clone, Debug)]
pub struct Face {
    /// One edge of the ring. Kept pointing at a surviving edge across merges.
    pub edge: EdgeIdx,
    /// Ring length, recomputed alongside the normal. Always ≥ 3.
    pub n_vertices: usize,
    /// Outward unit normal.
    pub normal: DVec3,
    /// Arithmetic mean of the ring's head points.
    pub centroid: DVec3,
    /// `normal · centroid`, so `normal · p - offset` is the signed plane
    /// distance of `p` (positive = outside).
    pub offset: f64,
    /// Length of the Newell sum (twice the true area for a triangle). Only
    /// used for relative comparison between neighboring faces.
    pub area: f64,
    pub mark: FaceMark,
    /// Head of this face's run inside the builder's claimed list.
    pub outside: Option<VertexIdx>,
}

// INTRUSIVE VERTEX LIST

/// Doubly linked list threaded through the vertex arena.
///
/// The links live in the [`Vertex`] nodes themselves, so every operation
/// takes the arena as a parameter. `remove` leaves the unlinked node's own
/// pointers dangling; consumers that iterate while unlinking must cache
/// `next` before mutating (the removal discipline of the claim lists).
#[derive(Clone, Copy, Debug, Default)]
pub struct VertexList {
    head: Option<VertexIdx>,
    tail: Option<VertexIdx>,
}

impl VertexList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn first(&self) -> Option<VertexIdx> {
        self.head
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub const fn clear(&mut self) {
        self.head = None;
        self.tail = None;
    }

    /// Append `v` at the tail.
    pub fn add(&mut self, verts: &mut [Vertex], v: VertexIdx) {
        match self.tail {
            None => self.head = Some(v),
            Some(tail) => verts[tail.0].next = Some(v),
        }
        verts[v.0].prev = self.tail;
        verts[v.0].next = None;
        self.tail = Some(v);
    }

    /// Splice `v` immediately before `target`.
    pub fn insert_before(&mut self, verts: &mut [Vertex], target: VertexIdx, v: VertexIdx) {
        let before = verts[target.0].prev;
        verts[v.0].prev = before;
        verts[v.0].next = Some(target);
        match before {
            None => self.head = Some(v),
            Some(b) => verts[b.0].next = Some(v),
        }
        verts[target.0].prev = Some(v);
    }

    /// Unlink `v`. The node's own `prev`/`next` are left dangling.
    pub fn remove(&mut self, verts: &mut [Vertex], v: VertexIdx) {
        let prev = verts[v.0].prev;
        let next = verts[v.0].next;
        match prev {
            None => self.head = next,
            Some(p) => verts[p.0].next = next,
        }
        match next {
            None => self.tail = prev,
            Some(n) => verts[n.0].prev = prev,
        }
    }

    /// Detach the contiguous subchain from `head` through `tail` inclusive.
    ///
    /// The chain becomes standalone: `head.prev` and `tail.next` are nulled.
    pub fn remove_chain(&mut self, verts: &mut [Vertex], head: VertexIdx, tail: VertexIdx) {
        let before = verts[head.0].prev;
        let after = verts[tail.0].next;
        match before {
            None => self.head = after,
            Some(b) => verts[b.0].next = after,
        }
        match after {
            None => self.tail = before,
            Some(a) => verts[a.0].prev = before,
        }
        verts[head.0].prev = None;
        verts[tail.0].next = None;
    }

    /// Absorb a standalone chain at the tail. O(chain length).
    pub fn add_all(&mut self, verts: &mut [Vertex], chain: VertexIdx) {
        match self.tail {
            None => self.head = Some(chain),
            Some(tail) => verts[tail.0].next = Some(chain),
        }
        verts[chain.0].prev = self.tail;
        let mut end = chain;
        while let Some(n) = verts[end.0].next {
            end = n;
        }
        self.tail = Some(end);
    }
}

// HULL MESH - the arena container and its face-level operations

/// Arena storage for the hull under construction.
#[derive(Clone, Debug, Default)]
pub struct HullMesh {
    pub verts: Vec<Vertex>,
    pub edges: Vec<HalfEdge>,
    pub faces: Vec<Face>,
}

impl HullMesh {
    /// Wrap every input point in a vertex, preserving input order.
    #[must_use]
    pub fn from_points(points: Vec<DVec3>) -> Self {
        Self {
            verts: points.into_iter().map(Vertex::new).collect(),
            edges: Vec::new(),
            faces: Vec::new(),
        }
    }

    // Edge navigation

    /// The twin half-edge, or an invariant error where the mesh demands one.
    pub fn opposite(&self, e: EdgeIdx) -> Result<EdgeIdx, HullError> {
        self.edges[e.0]
            .opposite
            .ok_or_else(|| HullError::InternalInvariant {
                detail: format!("half-edge {} has no opposite", e.0),
            })
    }

    /// Tail vertex of `e` (the head of its ring predecessor).
    #[inline]
    #[must_use]
    pub fn tail(&self, e: EdgeIdx) -> VertexIdx {
        self.edges[self.edges[e.0].prev.0].head
    }

    /// Squared length between tail and head.
    #[must_use]
    pub fn edge_length_squared(&self, e: EdgeIdx) -> f64 {
        let head = self.verts[self.edges[e.0].head.0].point;
        let tail = self.verts[self.tail(e).0].point;
        head.distance_squared(tail)
    }

    /// Link `a` and `b` as twins, in both directions.
    pub fn set_opposite(&mut self, a: EdgeIdx, b: EdgeIdx) {
        self.edges[a.0].opposite = Some(b);
        self.edges[b.0].opposite = Some(a);
    }

    /// Walk `steps` signed steps along the ring from `f`'s anchor edge
    /// (`next` for positive, `prev` for negative).
    #[must_use]
    pub fn get_edge(&self, f: FaceIdx, steps: i32) -> EdgeIdx {
        let mut edge = self.faces[f.0].edge;
        let mut remaining = steps;
        while remaining > 0 {
            edge = self.edges[edge.0].next;
            remaining -= 1;
        }
        while remaining < 0 {
            edge = self.edges[edge.0].prev;
            remaining += 1;
        }
        edge
    }

    // Face construction & geometry

    /// Build a triangular face with ring `e0 → e1 → e2 → e0` and head
    /// sequence `v0, v1, v2`. The normal follows [`plane_normal`]'s
    /// convention for `(v0, v1, v2)`.
    pub fn create_triangle(
        &mut self,
        v0: VertexIdx,
        v1: VertexIdx,
        v2: VertexIdx,
        min_area: f64,
    ) -> FaceIdx {
        let f = FaceIdx(self.faces.len());
        let base = self.edges.len();
        let (e0, e1, e2) = (EdgeIdx(base), EdgeIdx(base + 1), EdgeIdx(base + 2));
        self.edges.push(HalfEdge {
            head: v0,
            face: f,
            next: e1,
            prev: e2,
            opposite: None,
        });
        self.edges.push(HalfEdge {
            head: v1,
            face: f,
            next: e2,
            prev: e0,
            opposite: None,
        });
        self.edges.push(HalfEdge {
            head: v2,
            face: f,
            next: e0,
            prev: e1,
            opposite: None,
        });
        self.faces.push(Face {
            edge: e0,
            n_vertices: 3,
            normal: DVec3::ZERO,
            centroid: DVec3::ZERO,
            offset: 0.0,
            area: 0.0,
            mark: FaceMark::Visible,
            outside: None,
        });
        self.compute_normal_and_centroid_min_area(f, min_area);
        f
    }

    /// Newell-style normal: accumulate the fan of cross products anchored at
    /// the ring's first head. Recomputes `n_vertices` and `area` in the same
    /// pass; `area` is the length of the unnormalized sum.
    pub fn compute_normal(&mut self, f: FaceIdx) {
        let e0 = self.faces[f.0].edge;
        let e1 = self.edges[e0.0].next;
        let p0 = self.verts[self.edges[e0.0].head.0].point;
        let mut prev_offset = self.verts[self.edges[e1.0].head.0].point - p0;
        let mut normal = DVec3::ZERO;
        let mut n_vertices = 2;
        let mut edge = self.edges[e1.0].next;
        while edge != e0 {
            let offset = self.verts[self.edges[edge.0].head.0].point - p0;
            normal += prev_offset.cross(offset);
            prev_offset = offset;
            n_vertices += 1;
            edge = self.edges[edge.0].next;
        }
        let area = normal.length();
        let face = &mut self.faces[f.0];
        face.n_vertices = n_vertices;
        face.area = area;
        face.normal = normal / area;
    }

    /// [`Self::compute_normal`] with a sliver correction: when the Newell sum
    /// is shorter than `min_area`, the ring's longest edge dominates the
    /// numerics, so its component is subtracted from the normal before
    /// renormalizing — as if that edge were absent.
    pub fn compute_normal_min_area(&mut self, f: FaceIdx, min_area: f64) {
        self.compute_normal(f);
        if self.faces[f.0].area < min_area {
            let e0 = self.faces[f.0].edge;
            let mut max_edge = e0;
            let mut max_length_sq = 0.0;
            let mut edge = e0;
            loop {
                let length_sq = self.edge_length_squared(edge);
                if length_sq > max_length_sq {
                    max_length_sq = length_sq;
                    max_edge = edge;
                }
                edge = self.edges[edge.0].next;
                if edge == e0 {
                    break;
                }
            }
            let head = self.verts[self.edges[max_edge.0].head.0].point;
            let tail = self.verts[self.tail(max_edge).0].point;
            let direction = (head - tail) / max_length_sq.sqrt();
            let face = &mut self.faces[f.0];
            let projection = face.normal.dot(direction);
            face.normal = (face.normal - projection * direction).normalize_or_zero();
        }
    }

    /// Arithmetic mean of the ring's head points.
    pub fn compute_centroid(&mut self, f: FaceIdx) {
        let e0 = self.faces[f.0].edge;
        let mut centroid = DVec3::ZERO;
        let mut edge = e0;
        loop {
            centroid += self.verts[self.edges[edge.0].head.0].point;
            edge = self.edges[edge.0].next;
            if edge == e0 {
                break;
            }
        }
        #[expect(clippy::cast_precision_loss)]
        let n = self.faces[f.0].n_vertices as f64;
        self.faces[f.0].centroid = centroid / n;
    }

    pub fn compute_normal_and_centroid(&mut self, f: FaceIdx) {
        self.compute_normal(f);
        self.compute_centroid(f);
        let face = &mut self.faces[f.0];
        face.offset = face.normal.dot(face.centroid);
    }

    pub fn compute_normal_and_centroid_min_area(&mut self, f: FaceIdx, min_area: f64) {
        self.compute_normal_min_area(f, min_area);
        self.compute_centroid(f);
        let face = &mut self.faces[f.0];
        face.offset = face.normal.dot(face.centroid);
    }

    /// Signed distance from `f`'s plane to `p`. Positive = outside.
    #[inline]
    #[must_use]
    pub fn distance_to_plane(&self, f: FaceIdx, p: DVec3) -> f64 {
        let face = &self.faces[f.0];
        face.normal.dot(p) - face.offset
    }

    /// Original input indices around the ring, ccw from outside.
    #[must_use]
    pub fn collect_indices(&self, f: FaceIdx) -> Vec<usize> {
        let e0 = self.faces[f.0].edge;
        let mut indices = Vec::with_capacity(self.faces[f.0].n_vertices);
        let mut edge = e0;
        loop {
            indices.push(self.edges[edge.0].head.0);
            edge = self.edges[edge.0].next;
            if edge == e0 {
                break;
            }
        }
        indices
    }

    // Merging

    /// Absorb the face on the other side of `adjacent_edge` into `face`.
    ///
    /// The shared boundary may span several consecutive edges; it is grown in
    /// both directions before the neighbor's remaining edges are adopted and
    /// the two extremities stitched with [`Self::connect_half_edges`]. Each
    /// stitch may collapse a further neighbor; every face destroyed here is
    /// appended to `discarded` (the absorbed neighbor first).
    pub fn merge_adjacent_faces(
        &mut self,
        face: FaceIdx,
        adjacent_edge: EdgeIdx,
        discarded: &mut Vec<FaceIdx>,
    ) -> Result<(), HullError> {
        let opposite_edge = self.opposite(adjacent_edge)?;
        let opposite_face = self.edges[opposite_edge.0].face;
        discarded.push(opposite_face);
        self.faces[opposite_face.0].mark = FaceMark::Deleted;

        let mut adjacent_edge_prev = self.edges[adjacent_edge.0].prev;
        let mut adjacent_edge_next = self.edges[adjacent_edge.0].next;
        let mut opposite_edge_prev = self.edges[opposite_edge.0].prev;
        let mut opposite_edge_next = self.edges[opposite_edge.0].next;

        // Grow the run of shared edges in both directions. The two rings
        // advance in lockstep because shared edges are twins in reverse order.
        while self.edges[self.opposite(adjacent_edge_prev)?.0].face == opposite_face {
            adjacent_edge_prev = self.edges[adjacent_edge_prev.0].prev;
            opposite_edge_next = self.edges[opposite_edge_next.0].next;
        }
        while self.edges[self.opposite(adjacent_edge_next)?.0].face == opposite_face {
            adjacent_edge_next = self.edges[adjacent_edge_next.0].next;
            opposite_edge_prev = self.edges[opposite_edge_prev.0].prev;
        }

        // Adopt every neighbor edge outside the shared run.
        let stop = self.edges[opposite_edge_prev.0].next;
        let mut edge = opposite_edge_next;
        while edge != stop {
            self.edges[edge.0].face = face;
            edge = self.edges[edge.0].next;
        }

        // The anchor must survive the stitches; `prev`-side edges may not.
        self.faces[face.0].edge = adjacent_edge_next;

        if let Some(d) = self.connect_half_edges(face, opposite_edge_prev, adjacent_edge_next)? {
            discarded.push(d);
        }
        if let Some(d) = self.connect_half_edges(face, adjacent_edge_prev, opposite_edge_next)? {
            discarded.push(d);
        }

        self.compute_normal_and_centroid(face);
        Ok(())
    }

    /// Relink `prev → next` inside `face`'s ring after a merge.
    ///
    /// Precondition: `prev`'s head equals `next`'s tail. When both extremes
    /// point into the same neighbor, two parallel edges into that neighbor
    /// would result; `prev` is redundant and the neighbor loses one edge. A
    /// triangular neighbor collapses entirely and is returned as discarded; a
    /// larger neighbor has the redundant edge spliced out of its ring, with
    /// its `edge` anchor kept valid.
    pub fn connect_half_edges(
        &mut self,
        face: FaceIdx,
        prev: EdgeIdx,
        next: EdgeIdx,
    ) -> Result<Option<FaceIdx>, HullError> {
        let mut discarded_face = None;
        let prev_opposite = self.opposite(prev)?;
        let next_opposite = self.opposite(next)?;
        if self.edges[prev_opposite.0].face == self.edges[next_opposite.0].face {
            let opposite_face = self.edges[next_opposite.0].face;
            if prev == self.faces[face.0].edge {
                self.faces[face.0].edge = next;
            }
            let opposite_edge;
            if self.faces[opposite_face.0].n_vertices == 3 {
                // The neighbor is a triangle: nothing is left of it once the
                // shared edge pair collapses.
                opposite_edge = self.opposite(self.edges[next_opposite.0].prev)?;
                self.faces[opposite_face.0].mark = FaceMark::Deleted;
                discarded_face = Some(opposite_face);
            } else {
                opposite_edge = self.edges[next_opposite.0].next;
                if self.faces[opposite_face.0].edge == self.edges[opposite_edge.0].prev {
                    self.faces[opposite_face.0].edge = opposite_edge;
                }
                let spliced_prev = self.edges[self.edges[opposite_edge.0].prev.0].prev;
                self.edges[opposite_edge.0].prev = spliced_prev;
                self.edges[spliced_prev.0].next = opposite_edge;
            }
            let prev_prev = self.edges[prev.0].prev;
            self.edges[next.0].prev = prev_prev;
            self.edges[prev_prev.0].next = next;
            self.set_opposite(next, opposite_edge);
            self.compute_normal_and_centroid(opposite_face);
        } else {
            self.edges[prev.0].next = next;
            self.edges[next.0].prev = prev;
        }
        Ok(discarded_face)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena(n: usize) -> Vec<Vertex> {
        #[expect(clippy::cast_precision_loss)]
        let make = |i: usize| Vertex::new(DVec3::new(i as f64, 0.0, 0.0));
        (0..n).map(make).collect()
    }

    fn collect(list: &VertexList, verts: &[Vertex]) -> Vec<usize> {
        let mut out = Vec::new();
        let mut cur = list.first();
        while let Some(v) = cur {
            out.push(v.0);
            cur = verts[v.0].next;
        }
        out
    }

    #[test]
    fn test_vertex_list_add_and_remove() {
        let mut verts = arena(4);
        let mut list = VertexList::new();
        assert!(list.is_empty());

        for i in 0..4 {
            list.add(&mut verts, VertexIdx(i));
        }
        assert_eq!(collect(&list, &verts), vec![0, 1, 2, 3]);

        // interior, head, and tail removal
        list.remove(&mut verts, VertexIdx(2));
        assert_eq!(collect(&list, &verts), vec![0, 1, 3]);
        list.remove(&mut verts, VertexIdx(0));
        assert_eq!(collect(&list, &verts), vec![1, 3]);
        list.remove(&mut verts, VertexIdx(3));
        assert_eq!(collect(&list, &verts), vec![1]);
        list.remove(&mut verts, VertexIdx(1));
        assert!(list.is_empty());
    }

    #[test]
    fn test_vertex_list_insert_before() {
        let mut verts = arena(3);
        let mut list = VertexList::new();
        list.add(&mut verts, VertexIdx(0));
        list.add(&mut verts, VertexIdx(1));

        list.insert_before(&mut verts, VertexIdx(0), VertexIdx(2));
        assert_eq!(collect(&list, &verts), vec![2, 0, 1]);
        assert_eq!(list.first(), Some(VertexIdx(2)));
    }

    #[test]
    fn test_vertex_list_chain_splicing() {
        let mut verts = arena(6);
        let mut list = VertexList::new();
        for i in 0..5 {
            list.add(&mut verts, VertexIdx(i));
        }

        // detach the run 1..=3 and verify it is standalone
        list.remove_chain(&mut verts, VertexIdx(1), VertexIdx(3));
        assert_eq!(collect(&list, &verts), vec![0, 4]);
        assert_eq!(verts[1].prev, None);
        assert_eq!(verts[3].next, None);

        // absorb it into a fresh list, then append a loose node
        let mut other = VertexList::new();
        other.add(&mut verts, VertexIdx(5));
        other.add_all(&mut verts, VertexIdx(1));
        assert_eq!(collect(&other, &verts), vec![5, 1, 2, 3]);
    }

    #[test]
    fn test_point_line_distance() {
        let l1 = DVec3::new(0.0, 0.0, 0.0);
        let l2 = DVec3::new(2.0, 0.0, 0.0);
        let d = point_line_distance(DVec3::new(1.0, 3.0, 0.0), l1, l2);
        assert!((d - 3.0).abs() < 1e-12);

        // degenerate line
        assert_eq!(point_line_distance(DVec3::new(1.0, 1.0, 1.0), l1, l1), 0.0);
    }

    #[test]
    fn test_triangle_ring_invariants() {
        let points = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        ];
        let mut mesh = HullMesh::from_points(points);
        let f = mesh.create_triangle(VertexIdx(0), VertexIdx(1), VertexIdx(2), 0.0);

        let e0 = mesh.faces[f.0].edge;
        let e1 = mesh.edges[e0.0].next;
        let e2 = mesh.edges[e1.0].next;
        assert_eq!(mesh.edges[e2.0].next, e0);
        assert_eq!(mesh.edges[e0.0].prev, e2);
        assert_eq!(mesh.faces[f.0].n_vertices, 3);

        // head sequence v0, v1, v2; tails shifted by one
        assert_eq!(mesh.edges[e0.0].head, VertexIdx(0));
        assert_eq!(mesh.edges[e1.0].head, VertexIdx(1));
        assert_eq!(mesh.edges[e2.0].head, VertexIdx(2));
        assert_eq!(mesh.tail(e0), VertexIdx(2));
        assert_eq!(mesh.tail(e1), VertexIdx(0));

        assert_eq!(mesh.get_edge(f, 2), e2);
        assert_eq!(mesh.get_edge(f, -1), e2);
        assert_eq!(mesh.get_edge(f, -2), e1);
    }

    #[test]
    fn test_triangle_normal_and_area() {
        let points = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        ];
        let mut mesh = HullMesh::from_points(points);
        let f = mesh.create_triangle(VertexIdx(0), VertexIdx(1), VertexIdx(2), 0.0);

        let face = &mesh.faces[f.0];
        // ccw in the xy plane → +z normal, Newell length = 2 × area
        assert!((face.normal - DVec3::Z).length() < 1e-12);
        assert!((face.area - 1.0).abs() < 1e-12);
        let expected_centroid = DVec3::new(1.0 / 3.0, 1.0 / 3.0, 0.0);
        assert!((face.centroid - expected_centroid).length() < 1e-12);
        assert!((face.offset - face.normal.dot(face.centroid)).abs() < 1e-15);

        // plane distance sign: above the triangle is outside
        assert!(mesh.distance_to_plane(f, DVec3::new(0.2, 0.2, 1.0)) > 0.0);
        assert!(mesh.distance_to_plane(f, DVec3::new(0.2, 0.2, -1.0)) < 0.0);
    }

    #[test]
    fn test_plane_normal_matches_triangle_convention() {
        let a = DVec3::new(0.0, 0.0, 0.0);
        let b = DVec3::new(1.0, 0.0, 0.0);
        let c = DVec3::new(0.0, 1.0, 0.0);
        let n = plane_normal(a, b, c);

        let mut mesh = HullMesh::from_points(vec![a, b, c]);
        let f = mesh.create_triangle(VertexIdx(0), VertexIdx(1), VertexIdx(2), 0.0);
        assert!((n.normalize() - mesh.faces[f.0].normal).length() < 1e-12);
    }

    #[test]
    fn test_sliver_normal_correction() {
        // A sliver: the third point is barely off the long edge, so the plain
        // Newell normal is numerically dominated by the longest edge.
        let points = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(10.0, 0.0, 0.0),
            DVec3::new(5.0, 1e-12, 0.0),
        ];
        let mut mesh = HullMesh::from_points(points);
        let f = mesh.create_triangle(VertexIdx(0), VertexIdx(1), VertexIdx(2), 0.0);

        // force the correction with a generous threshold
        mesh.compute_normal_min_area(f, 1.0);
        let n = mesh.faces[f.0].normal;
        // the corrected normal is still unit length and orthogonal to the
        // longest edge (the x axis)
        assert!((n.length() - 1.0).abs() < 1e-9);
        assert!(n.x.abs() < 1e-9);
    }

    #[test]
    fn test_collect_indices_order() {
        let points = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        ];
        let mut mesh = HullMesh::from_points(points);
        let f = mesh.create_triangle(VertexIdx(2), VertexIdx(0), VertexIdx(1), 0.0);
        assert_eq!(mesh.collect_indices(f), vec![2, 0, 1]);
    }
}
