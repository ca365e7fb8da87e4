//! # QuickHull Builder
//!
//! One-shot 3D convex hull construction over a point cloud.
//!
//! ## Algorithm Overview
//!
//! 1. **Tolerance**: derive the plane-side classification threshold from the
//!    axis-aligned extremes of the input (machine epsilon scaled by extent)
//! 2. **Initial tetrahedron**: pick four affinely independent extreme points
//!    and stitch the first four faces with outward normals
//! 3. **Iterate**: claim every remaining point for a face that sees it, then
//!    repeatedly add the farthest claimed point to the hull — compute the
//!    horizon of visible faces, fan new triangles from the point to the
//!    horizon, and merge neighbors that became coplanar or concave
//! 4. **Emit**: prune deleted faces and collect each surviving ring as a
//!    polygon or a triangle fan
//!
//! ## Complexity
//!
//! | Operation            | Complexity        | Notes                        |
//! |----------------------|-------------------|------------------------------|
//! | Build                | O(n log n) typical | O(n²) adversarial worst case |
//! | Horizon per point    | O(visible faces)  | explicit-stack DFS           |
//! | Merge passes         | O(ring length)    | bounded by face vertex count |

#![allow(clippy::missing_errors_doc)]

use glam::DVec3;
use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::half_edge::{
    EdgeIdx, FaceIdx, FaceMark, HullMesh, VertexIdx, VertexList, plane_normal, point_line_distance,
};

/// Scale factor applied to machine epsilon when deriving the tolerance.
const TOLERANCE_SCALE: f64 = 3.0;

/// Multiple of the tolerance beyond which an orphaned vertex is assigned to
/// the current best face without scanning the remaining candidates.
const FAST_ACCEPT_FACTOR: f64 = 1000.0;

// INPUT ADAPTER

/// Capability for feeding arbitrary point representations to the builder.
///
/// The core only ever sees `DVec3`; this trait is the boundary where ordered
/// triples and records with named components are normalized. Implementations
/// are provided for `DVec3`, `[f64; 3]` and `(f64, f64, f64)`; types with
/// named fields implement it in one line:
///
/// ```
/// use hull_surge::{HullPoint, math::DVec3};
///
/// struct Sample {
///     x: f64,
///     y: f64,
///     z: f64,
/// }
///
/// impl HullPoint for Sample {
///     fn coords(&self) -> DVec3 {
///         DVec3::new(self.x, self.y, self.z)
///     }
/// }
/// ```
pub trait HullPoint {
    /// The point as an ordered triple of doubles.
    fn coords(&self) -> DVec3;
}

impl HullPoint for DVec3 {
    #[inline]
    fn coords(&self) -> DVec3 {
        *self
    }
}

impl HullPoint for [f64; 3] {
    #[inline]
    fn coords(&self) -> DVec3 {
        DVec3::from_array(*self)
    }
}

impl HullPoint for (f64, f64, f64) {
    #[inline]
    fn coords(&self) -> DVec3 {
        DVec3::new(self.0, self.1, self.2)
    }
}

impl<P: HullPoint> HullPoint for &P {
    #[inline]
    fn coords(&self) -> DVec3 {
        (*self).coords()
    }
}

// ERRORS

/// How a degenerate input failed to span three dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DegenerateInput {
    /// All points lie on one line: no third point clears the tolerance off
    /// the segment between the two extremes.
    Collinear,
    /// All points lie on one plane: no fourth point clears the tolerance off
    /// the base triangle's plane.
    Coplanar,
}

/// Errors surfaced by hull construction.
#[derive(Clone, Debug, PartialEq)]
pub enum HullError {
    /// An input coordinate is NaN or infinite.
    BadInput { index: usize, value: f64 },
    /// Fewer than four input points were supplied.
    TooFewPoints { actual: usize },
    /// The input does not span three dimensions, so no initial tetrahedron
    /// exists.
    Degenerate {
        kind: DegenerateInput,
        tolerance: f64,
    },
    /// A runtime consistency check failed. This indicates a bug in the
    /// builder, not a problem with the input; it is not recoverable.
    InternalInvariant { detail: String },
}

impl std::fmt::Display for HullError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadInput { index, value } => {
                write!(f, "input point {index} has a non-finite coordinate ({value})")
            }
            Self::TooFewPoints { actual } => {
                write!(f, "cannot build a 3D hull from {actual} points (need at least 4)")
            }
            Self::Degenerate { kind, tolerance } => {
                let shape = match kind {
                    DegenerateInput::Collinear => "collinear",
                    DegenerateInput::Coplanar => "coplanar",
                };
                write!(f, "degenerate input: all points are {shape} within tolerance {tolerance:e}")
            }
            Self::InternalInvariant { detail } => {
                write!(f, "internal invariant violated: {detail}")
            }
        }
    }
}

impl std::error::Error for HullError {}

impl HullError {
    fn internal(detail: String) -> Self {
        Self::InternalInvariant { detail }
    }
}

// MERGE POLICIES

/// Which concavities a merge pass is allowed to resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MergePolicy {
    /// Merge only when the larger face of the pair sees the smaller face's
    /// centroid at or above its plane. A pair that is concave only from the
    /// smaller side is flagged [`FaceMark::NonConvex`] for the second pass.
    NonConvexWrtLargerFace,
    /// Merge when either side sees the other's centroid at or above its
    /// plane.
    NonConvex,
}

// CONVENIENCE ENTRY POINTS

/// Convex hull of `points` as a triangle list over input indices.
///
/// Polygonal faces are fan-triangulated; see [`QuickHull::triangles`].
///
/// ```
/// use hull_surge::convex_hull;
///
/// let points = [
///     (0.0, 0.0, 0.0),
///     (1.0, 0.0, 0.0),
///     (0.0, 1.0, 0.0),
///     (0.0, 0.0, 1.0),
/// ];
/// let triangles = convex_hull(&points).unwrap();
/// assert_eq!(triangles.len(), 4);
/// ```
pub fn convex_hull<P: HullPoint>(points: &[P]) -> Result<Vec<[usize; 3]>, HullError> {
    QuickHull::build(points)?.triangles()
}

/// Convex hull of `points` as polygonal faces over input indices, without
/// triangulation. Coplanar regions come out as single n-gons.
pub fn convex_hull_faces<P: HullPoint>(points: &[P]) -> Result<Vec<Vec<usize>>, HullError> {
    QuickHull::build(points)?.polygon_faces()
}

// BUILDER

/// One-shot QuickHull builder over a half-edge mesh.
///
/// Construction happens entirely in [`QuickHull::build`]; the finished value
/// only serves emission queries. The builder owns every vertex, half-edge and
/// face it creates — callers keep nothing but the emitted index vectors.
///
/// # Duplicate points
///
/// Duplicated input points are accepted. A duplicate is within tolerance of
/// every face plane its twin touches, so it is never claimed as an outside
/// point and never appears in the emitted hull; only the occurrence picked
/// during construction (in practice the first) can show up in faces.
#[derive(Debug)]
pub struct QuickHull {
    mesh: HullMesh,
    /// Plane-side classification threshold derived from the input extent.
    tolerance: f64,
    /// Every face created, in creation order; pruned to visible faces by the
    /// final reindex.
    faces: Vec<FaceIdx>,
    /// Faces fanned from the point currently being added.
    new_faces: Vec<FaceIdx>,
    /// All vertices outside the current hull, in contiguous per-face runs.
    claimed: VertexList,
    /// Vertices orphaned by face deletion, awaiting reassignment.
    unclaimed: VertexList,
    /// Horizon scratch, reused across iterations.
    horizon: Vec<EdgeIdx>,
}

impl QuickHull {
    /// Build the convex hull of `input`.
    ///
    /// Fails with [`HullError::BadInput`] on non-finite coordinates,
    /// [`HullError::TooFewPoints`] on fewer than four points, and
    /// [`HullError::Degenerate`] when the input is collinear or coplanar
    /// within the derived tolerance.
    pub fn build<P: HullPoint>(input: &[P]) -> Result<Self, HullError> {
        let mut points = Vec::with_capacity(input.len());
        for (index, candidate) in input.iter().enumerate() {
            let point = candidate.coords();
            for value in point.to_array() {
                if !value.is_finite() {
                    return Err(HullError::BadInput { index, value });
                }
            }
            points.push(point);
        }
        if points.len() < 4 {
            return Err(HullError::TooFewPoints {
                actual: points.len(),
            });
        }

        let mut hull = Self {
            mesh: HullMesh::from_points(points),
            tolerance: 0.0,
            faces: Vec::new(),
            new_faces: Vec::new(),
            claimed: VertexList::new(),
            unclaimed: VertexList::new(),
            horizon: Vec::new(),
        };
        hull.create_initial_simplex()?;

        let mut iterations = 0_usize;
        while let Some(eye) = hull.next_vertex_to_add() {
            iterations += 1;
            log::trace!("iteration {iterations}: adding point {} to the hull", eye.0);
            hull.add_vertex_to_hull(eye)?;
        }
        hull.reindex();
        log::debug!(
            "hull complete: {} faces from {} points in {iterations} iterations",
            hull.faces.len(),
            hull.mesh.verts.len(),
        );
        Ok(hull)
    }

    // Emission

    /// The classification tolerance derived from the input extent.
    #[inline]
    #[must_use]
    pub const fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Number of polygonal faces on the finished hull.
    #[inline]
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// The hull as polygonal faces: for each face, the input indices of its
    /// boundary in ccw order viewed from outside.
    pub fn polygon_faces(&self) -> Result<Vec<Vec<usize>>, HullError> {
        self.faces
            .iter()
            .map(|&f| {
                self.check_emittable(f)?;
                Ok(self.mesh.collect_indices(f))
            })
            .collect()
    }

    /// The hull as triangles: each n-gon face is emitted as `n - 2` fan
    /// triangles from its first boundary vertex.
    pub fn triangles(&self) -> Result<Vec<[usize; 3]>, HullError> {
        let mut out = Vec::with_capacity(self.faces.len());
        for &f in &self.faces {
            self.check_emittable(f)?;
            let ring = self.mesh.collect_indices(f);
            let anchor = ring[0];
            for (a, b) in ring[1..].iter().copied().tuple_windows() {
                out.push([anchor, a, b]);
            }
        }
        Ok(out)
    }

    /// Sorted original indices of the input points that lie on the hull
    /// boundary.
    #[must_use]
    pub fn hull_vertices(&self) -> Vec<usize> {
        let mut set = FxHashSet::default();
        for &f in &self.faces {
            set.extend(self.mesh.collect_indices(f));
        }
        let mut out: Vec<usize> = set.into_iter().collect();
        out.sort_unstable();
        out
    }

    fn check_emittable(&self, f: FaceIdx) -> Result<(), HullError> {
        if self.mesh.faces[f.0].mark == FaceMark::Visible {
            Ok(())
        } else {
            Err(HullError::internal(format!(
                "attempt to emit destroyed face {}",
                f.0
            )))
        }
    }

    /// Post-build consistency diagnostic.
    ///
    /// Checks that every emitted face is visible with a closed ring of at
    /// least three edges owned by it, that twin links are symmetric, never
    /// cross into a deleted face and reverse the edge direction, that every
    /// directed boundary edge is paired with its reverse exactly once, and
    /// that the Euler characteristic `V - E + F` is 2.
    pub fn validate_topology(&self) -> Result<(), HullError> {
        let mesh = &self.mesh;
        let mut directed: FxHashMap<(usize, usize), usize> = FxHashMap::default();
        let mut on_hull: FxHashSet<usize> = FxHashSet::default();
        let mut half_edge_count = 0_usize;

        for &f in &self.faces {
            let face = &mesh.faces[f.0];
            if face.mark != FaceMark::Visible {
                return Err(HullError::internal(format!(
                    "face {} in the hull is not visible",
                    f.0
                )));
            }
            if face.n_vertices < 3 {
                return Err(HullError::internal(format!(
                    "face {} has {} vertices",
                    f.0, face.n_vertices
                )));
            }
            let e0 = face.edge;
            let mut edge = e0;
            let mut steps = 0_usize;
            loop {
                if steps > face.n_vertices {
                    return Err(HullError::internal(format!(
                        "ring of face {} does not close after {} edges",
                        f.0, steps
                    )));
                }
                let he = &mesh.edges[edge.0];
                if he.face != f {
                    return Err(HullError::internal(format!(
                        "edge {} in the ring of face {} is owned by face {}",
                        edge.0, f.0, he.face.0
                    )));
                }
                if mesh.edges[he.next.0].prev != edge {
                    return Err(HullError::internal(format!(
                        "ring links of edge {} are asymmetric",
                        edge.0
                    )));
                }
                let opposite = mesh.opposite(edge)?;
                let twin = &mesh.edges[opposite.0];
                if twin.opposite != Some(edge) {
                    return Err(HullError::internal(format!(
                        "twin links of edge {} are asymmetric",
                        edge.0
                    )));
                }
                if mesh.faces[twin.face.0].mark != FaceMark::Visible {
                    return Err(HullError::internal(format!(
                        "edge {} crosses into deleted face {}",
                        edge.0, twin.face.0
                    )));
                }
                if twin.head != mesh.tail(edge) {
                    return Err(HullError::internal(format!(
                        "twin of edge {} does not reverse it",
                        edge.0
                    )));
                }
                let tail = mesh.tail(edge).0;
                let head = he.head.0;
                *directed.entry((tail, head)).or_insert(0) += 1;
                on_hull.insert(head);
                half_edge_count += 1;
                steps += 1;
                edge = he.next;
                if edge == e0 {
                    break;
                }
            }
            if steps != face.n_vertices {
                return Err(HullError::internal(format!(
                    "face {} has ring length {} but records {} vertices",
                    f.0, steps, face.n_vertices
                )));
            }
        }

        for (&(tail, head), &count) in &directed {
            if count != 1 {
                return Err(HullError::internal(format!(
                    "directed edge ({tail}, {head}) appears {count} times"
                )));
            }
            if directed.get(&(head, tail)) != Some(&1) {
                return Err(HullError::internal(format!(
                    "directed edge ({tail}, {head}) is unpaired"
                )));
            }
        }

        #[expect(clippy::cast_possible_wrap)]
        let euler = on_hull.len() as i64 - (half_edge_count / 2) as i64 + self.faces.len() as i64;
        if euler != 2 {
            return Err(HullError::internal(format!(
                "Euler characteristic is {euler}, expected 2"
            )));
        }
        Ok(())
    }

    // CLAIM BOOKKEEPING

    /// Claim `v` for `f`: the vertex joins the front of the face's outside
    /// run inside the global claimed list.
    fn add_vertex_to_face(&mut self, v: VertexIdx, f: FaceIdx) {
        self.mesh.verts[v.0].face = Some(f);
        let run_head = self.mesh.faces[f.0].outside;
        match run_head {
            None => self.claimed.add(&mut self.mesh.verts, v),
            Some(first) => self
                .claimed
                .insert_before(&mut self.mesh.verts, first, v),
        }
        self.mesh.faces[f.0].outside = Some(v);
    }

    /// Unclaim `v` from `f`, advancing the face's run head if `v` led it.
    fn remove_vertex_from_face(&mut self, v: VertexIdx, f: FaceIdx) {
        if self.mesh.faces[f.0].outside == Some(v) {
            let next = self.mesh.verts[v.0].next;
            self.mesh.faces[f.0].outside = match next {
                Some(n) if self.mesh.verts[n.0].face == Some(f) => Some(n),
                _ => None,
            };
        }
        self.claimed.remove(&mut self.mesh.verts, v);
    }

    /// Detach `f`'s whole outside run from the claimed list and return the
    /// standalone chain's head.
    fn remove_all_vertices_from_face(&mut self, f: FaceIdx) -> Option<VertexIdx> {
        let first = self.mesh.faces[f.0].outside?;
        let mut end = first;
        while let Some(n) = self.mesh.verts[end.0].next {
            if self.mesh.verts[n.0].face != Some(f) {
                break;
            }
            end = n;
        }
        self.claimed
            .remove_chain(&mut self.mesh.verts, first, end);
        self.mesh.faces[f.0].outside = None;
        Some(first)
    }

    /// Release the outside vertices of a face that is being destroyed.
    ///
    /// With an `absorbing` face, vertices that still see it are claimed for
    /// it immediately; everything else goes to the unclaimed list for
    /// [`Self::resolve_unclaimed_points`].
    fn delete_face_vertices(&mut self, f: FaceIdx, absorbing: Option<FaceIdx>) {
        let Some(chain) = self.remove_all_vertices_from_face(f) else {
            return;
        };
        match absorbing {
            None => self.unclaimed.add_all(&mut self.mesh.verts, chain),
            Some(absorbing_face) => {
                // cache `next` — both destinations relink the node
                let mut cursor = Some(chain);
                while let Some(v) = cursor {
                    cursor = self.mesh.verts[v.0].next;
                    let point = self.mesh.verts[v.0].point;
                    if self.mesh.distance_to_plane(absorbing_face, point) > self.tolerance {
                        self.add_vertex_to_face(v, absorbing_face);
                    } else {
                        self.unclaimed.add(&mut self.mesh.verts, v);
                    }
                }
            }
        }
    }

    /// Reassign orphaned vertices to the best new face that sees them;
    /// vertices inside every new face are dropped for good.
    fn resolve_unclaimed_points(&mut self) {
        let mut cursor = self.unclaimed.first();
        while let Some(v) = cursor {
            cursor = self.mesh.verts[v.0].next;
            let point = self.mesh.verts[v.0].point;
            let mut max_distance = self.tolerance;
            let mut max_face = None;
            for &f in &self.new_faces {
                if self.mesh.faces[f.0].mark == FaceMark::Visible {
                    let distance = self.mesh.distance_to_plane(f, point);
                    if distance > max_distance {
                        max_distance = distance;
                        max_face = Some(f);
                    }
                    if max_distance > FAST_ACCEPT_FACTOR * self.tolerance {
                        break;
                    }
                }
            }
            if let Some(f) = max_face {
                self.add_vertex_to_face(v, f);
            }
        }
        self.unclaimed.clear();
    }

    // INITIAL SIMPLEX

    /// Axis extremes, tolerance, and the first four faces.
    #[expect(clippy::too_many_lines)]
    fn create_initial_simplex(&mut self) -> Result<(), HullError> {
        let n = self.mesh.verts.len();
        let mut min_v = [VertexIdx(0); 3];
        let mut max_v = [VertexIdx(0); 3];
        let mut min = self.mesh.verts[0].point.to_array();
        let mut max = min;
        for i in 1..n {
            let p = self.mesh.verts[i].point.to_array();
            for axis in 0..3 {
                if p[axis] < min[axis] {
                    min[axis] = p[axis];
                    min_v[axis] = VertexIdx(i);
                }
                if p[axis] > max[axis] {
                    max[axis] = p[axis];
                    max_v[axis] = VertexIdx(i);
                }
            }
        }
        self.tolerance = TOLERANCE_SCALE
            * f64::EPSILON
            * (min[0].abs().max(max[0].abs())
                + min[1].abs().max(max[1].abs())
                + min[2].abs().max(max[2].abs()));
        log::trace!("tolerance {:e}", self.tolerance);

        // v0, v1: the extremes along the axis of greatest extent
        let mut max_extent = 0.0;
        let mut widest_axis = 0;
        for axis in 0..3 {
            let extent = max[axis] - min[axis];
            if extent > max_extent {
                max_extent = extent;
                widest_axis = axis;
            }
        }
        let v0 = min_v[widest_axis];
        let v1 = max_v[widest_axis];
        let p0 = self.mesh.verts[v0.0].point;
        let p1 = self.mesh.verts[v1.0].point;

        // v2: farthest from the line v0-v1
        let mut max_distance = self.tolerance;
        let mut v2 = None;
        for i in 0..n {
            let candidate = VertexIdx(i);
            if candidate == v0 || candidate == v1 {
                continue;
            }
            let distance = point_line_distance(self.mesh.verts[i].point, p0, p1);
            if distance > max_distance {
                max_distance = distance;
                v2 = Some(candidate);
            }
        }
        let v2 = v2.ok_or(HullError::Degenerate {
            kind: DegenerateInput::Collinear,
            tolerance: self.tolerance,
        })?;
        let p2 = self.mesh.verts[v2.0].point;

        // v3: farthest from the plane v0-v1-v2, on either side
        let normal = plane_normal(p0, p1, p2);
        let plane_offset = normal.dot(p0);
        let mut max_distance = self.tolerance;
        let mut v3 = None;
        for i in 0..n {
            let candidate = VertexIdx(i);
            if candidate == v0 || candidate == v1 || candidate == v2 {
                continue;
            }
            let distance = (normal.dot(self.mesh.verts[i].point) - plane_offset).abs();
            if distance > max_distance {
                max_distance = distance;
                v3 = Some(candidate);
            }
        }
        let v3 = v3.ok_or(HullError::Degenerate {
            kind: DegenerateInput::Coplanar,
            tolerance: self.tolerance,
        })?;
        let p3 = self.mesh.verts[v3.0].point;

        // Orient the tetrahedron so every normal points outward, then stitch
        // the twelve twin pairs. The two branches enumerate the same faces
        // with opposite winding; the stitch tables differ accordingly.
        let simplex: [FaceIdx; 4];
        if normal.dot(p3) - plane_offset < 0.0 {
            simplex = [
                self.mesh.create_triangle(v0, v1, v2, 0.0),
                self.mesh.create_triangle(v3, v1, v0, 0.0),
                self.mesh.create_triangle(v3, v2, v1, 0.0),
                self.mesh.create_triangle(v3, v0, v2, 0.0),
            ];
            for i in 0..3 {
                let j = (i + 1) % 3;
                #[expect(clippy::cast_possible_truncation)]
                let base_edge = self.mesh.get_edge(simplex[0], j as i32);
                let side = self.mesh.get_edge(simplex[i + 1], 2);
                self.mesh.set_opposite(side, base_edge);
                let lateral = self.mesh.get_edge(simplex[i + 1], 1);
                let neighbor = self.mesh.get_edge(simplex[j + 1], 0);
                self.mesh.set_opposite(lateral, neighbor);
            }
        } else {
            simplex = [
                self.mesh.create_triangle(v0, v2, v1, 0.0),
                self.mesh.create_triangle(v3, v0, v1, 0.0),
                self.mesh.create_triangle(v3, v1, v2, 0.0),
                self.mesh.create_triangle(v3, v2, v0, 0.0),
            ];
            for i in 0..3 {
                let j = (i + 1) % 3;
                #[expect(clippy::cast_possible_truncation)]
                let base_edge = self.mesh.get_edge(simplex[0], ((3 - i) % 3) as i32);
                let side = self.mesh.get_edge(simplex[i + 1], 2);
                self.mesh.set_opposite(side, base_edge);
                let lateral = self.mesh.get_edge(simplex[i + 1], 0);
                let neighbor = self.mesh.get_edge(simplex[j + 1], 1);
                self.mesh.set_opposite(lateral, neighbor);
            }
        }
        self.faces.extend(simplex);

        // Claim every remaining point for the simplex face that sees it
        // farthest; ties go to the first face scanned. Points inside all four
        // planes are already inside the hull.
        for i in 0..n {
            let vertex = VertexIdx(i);
            if vertex == v0 || vertex == v1 || vertex == v2 || vertex == v3 {
                continue;
            }
            let point = self.mesh.verts[i].point;
            let mut max_distance = self.tolerance;
            let mut max_face = None;
            for &f in &simplex {
                let distance = self.mesh.distance_to_plane(f, point);
                if distance > max_distance {
                    max_distance = distance;
                    max_face = Some(f);
                }
            }
            if let Some(f) = max_face {
                self.add_vertex_to_face(vertex, f);
            }
        }
        Ok(())
    }

    // MAIN LOOP

    /// The farthest outside point of the face leading the claimed list.
    fn next_vertex_to_add(&self) -> Option<VertexIdx> {
        let first = self.claimed.first()?;
        let eye_face = self.mesh.verts[first.0].face?;
        let mut eye = None;
        let mut max_distance = 0.0;
        let mut cursor = self.mesh.faces[eye_face.0].outside;
        while let Some(v) = cursor {
            if self.mesh.verts[v.0].face != Some(eye_face) {
                break;
            }
            let distance = self
                .mesh
                .distance_to_plane(eye_face, self.mesh.verts[v.0].point);
            if distance > max_distance {
                max_distance = distance;
                eye = Some(v);
            }
            cursor = self.mesh.verts[v.0].next;
        }
        eye
    }

    /// One QuickHull iteration: remove the eye vertex from its face, carve
    /// out every face it sees, fan new faces to the horizon, restore strict
    /// convexity with two merge passes, and re-home orphaned points.
    fn add_vertex_to_hull(&mut self, eye: VertexIdx) -> Result<(), HullError> {
        let mut horizon = std::mem::take(&mut self.horizon);
        horizon.clear();
        self.unclaimed.clear();

        let eye_face = self.mesh.verts[eye.0].face.ok_or_else(|| {
            HullError::internal(format!("eye vertex {} has no claiming face", eye.0))
        })?;
        // Off the claimed list first, so the horizon sweep cannot move the
        // eye vertex into `unclaimed`.
        self.remove_vertex_from_face(eye, eye_face);
        let eye_point = self.mesh.verts[eye.0].point;
        self.compute_horizon(eye_point, eye_face, &mut horizon)?;
        log::trace!("horizon of {} edges around point {}", horizon.len(), eye.0);

        self.add_adjoining_faces(eye, &horizon)?;
        self.horizon = horizon;

        for i in 0..self.new_faces.len() {
            let face = self.new_faces[i];
            if self.mesh.faces[face.0].mark == FaceMark::Visible {
                while self.do_adjacent_merge(face, MergePolicy::NonConvexWrtLargerFace)? {}
            }
        }
        for i in 0..self.new_faces.len() {
            let face = self.new_faces[i];
            if self.mesh.faces[face.0].mark == FaceMark::NonConvex {
                self.mesh.faces[face.0].mark = FaceMark::Visible;
                while self.do_adjacent_merge(face, MergePolicy::NonConvex)? {}
            }
        }

        self.resolve_unclaimed_points();
        Ok(())
    }

    /// Collect the closed ccw loop of edges separating the faces that see
    /// `eye_point` from those that do not, deleting the visible faces along
    /// the way.
    ///
    /// The traversal is the depth-first walk of the visible region expressed
    /// with an explicit stack; each frame resumes its ring walk where it
    /// recursed, so horizon edges are appended in the same ccw order the
    /// recursive formulation produces.
    fn compute_horizon(
        &mut self,
        eye_point: DVec3,
        start: FaceIdx,
        horizon: &mut Vec<EdgeIdx>,
    ) -> Result<(), HullError> {
        struct Frame {
            /// The edge the walk stops at. For the seed face this is the ring
            /// anchor itself; for entered faces it is the crossed edge, which
            /// leads back where we came from and is skipped.
            anchor: EdgeIdx,
            cursor: EdgeIdx,
            entered: bool,
        }

        self.delete_face_vertices(start, None);
        self.mesh.faces[start.0].mark = FaceMark::Deleted;
        let seed = self.mesh.faces[start.0].edge;
        let mut stack = vec![Frame {
            anchor: seed,
            cursor: seed,
            entered: false,
        }];

        while let Some(top) = stack.last_mut() {
            if top.entered && top.cursor == top.anchor {
                stack.pop();
                continue;
            }
            top.entered = true;
            let edge = top.cursor;
            top.cursor = self.mesh.edges[edge.0].next;

            let opposite = self.mesh.opposite(edge)?;
            let neighbor = self.mesh.edges[opposite.0].face;
            if self.mesh.faces[neighbor.0].mark == FaceMark::Visible {
                if self.mesh.distance_to_plane(neighbor, eye_point) > self.tolerance {
                    // the neighbor also sees the eye point: descend into it
                    // through the crossed edge
                    self.delete_face_vertices(neighbor, None);
                    self.mesh.faces[neighbor.0].mark = FaceMark::Deleted;
                    let entry = self.mesh.edges[opposite.0].next;
                    stack.push(Frame {
                        anchor: opposite,
                        cursor: entry,
                        entered: true,
                    });
                } else {
                    horizon.push(edge);
                }
            }
        }
        Ok(())
    }

    /// Fan a triangle from `eye` to every horizon edge and stitch the fan:
    /// each base onto the horizon neighbor, each lateral side onto the
    /// previous new face, and the first onto the last to close the loop.
    fn add_adjoining_faces(&mut self, eye: VertexIdx, horizon: &[EdgeIdx]) -> Result<(), HullError> {
        self.new_faces.clear();
        let mut first = None;
        let mut previous: Option<FaceIdx> = None;
        for &horizon_edge in horizon {
            let outer = self.mesh.opposite(horizon_edge)?;
            let tail = self.mesh.tail(horizon_edge);
            let head = self.mesh.edges[horizon_edge.0].head;

            let face = self.mesh.create_triangle(eye, tail, head, 0.0);
            self.faces.push(face);
            let base = self.mesh.get_edge(face, -1);
            self.mesh.set_opposite(base, outer);

            if let Some(previous_face) = previous {
                let lateral = self.mesh.get_edge(face, 1);
                let neighbor = self.mesh.get_edge(previous_face, 0);
                self.mesh.set_opposite(lateral, neighbor);
            } else {
                first = Some(face);
            }
            self.new_faces.push(face);
            previous = Some(face);
        }
        if let (Some(first_face), Some(last_face)) = (first, previous) {
            let lateral = self.mesh.get_edge(first_face, 1);
            let neighbor = self.mesh.get_edge(last_face, 0);
            self.mesh.set_opposite(lateral, neighbor);
        }
        Ok(())
    }

    /// Walk `face`'s ring once looking for a neighbor to absorb under
    /// `policy`. Returns `true` after a merge so the caller re-enters on the
    /// enlarged ring; marks the face [`FaceMark::NonConvex`] when a concave
    /// pair was seen that this pass may not resolve.
    fn do_adjacent_merge(&mut self, face: FaceIdx, policy: MergePolicy) -> Result<bool, HullError> {
        let first_edge = self.mesh.faces[face.0].edge;
        let mut edge = first_edge;
        let mut convex = true;
        let mut iteration = 0_usize;
        loop {
            let bound = self.mesh.faces[face.0].n_vertices;
            if iteration >= bound {
                return Err(HullError::internal(format!(
                    "merge walk of face {} exceeded its {} vertices",
                    face.0, bound
                )));
            }
            let opposite = self.mesh.opposite(edge)?;
            let opposite_face = self.mesh.edges[opposite.0].face;

            // signed height of each centroid above the other face's plane
            let d1 = self
                .mesh
                .distance_to_plane(face, self.mesh.faces[opposite_face.0].centroid);
            let d2 = self
                .mesh
                .distance_to_plane(opposite_face, self.mesh.faces[face.0].centroid);

            let mut merge = false;
            match policy {
                MergePolicy::NonConvex => {
                    if d1 > -self.tolerance || d2 > -self.tolerance {
                        merge = true;
                    }
                }
                MergePolicy::NonConvexWrtLargerFace => {
                    if self.mesh.faces[face.0].area > self.mesh.faces[opposite_face.0].area {
                        if d1 > -self.tolerance {
                            merge = true;
                        } else if d2 > -self.tolerance {
                            convex = false;
                        }
                    } else if d2 > -self.tolerance {
                        merge = true;
                    } else if d1 > -self.tolerance {
                        convex = false;
                    }
                }
            }

            if merge {
                log::debug!("merging face {} into face {}", opposite_face.0, face.0);
                let mut discarded = Vec::new();
                self.mesh.merge_adjacent_faces(face, edge, &mut discarded)?;
                for d in discarded {
                    self.delete_face_vertices(d, Some(face));
                }
                return Ok(true);
            }

            edge = self.mesh.edges[edge.0].next;
            iteration += 1;
            if edge == first_edge {
                break;
            }
        }
        if !convex {
            self.mesh.faces[face.0].mark = FaceMark::NonConvex;
        }
        Ok(false)
    }

    /// Drop every face that did not survive to the finished hull.
    fn reindex(&mut self) {
        let mesh = &self.mesh;
        self.faces
            .retain(|&f| mesh.faces[f.0].mark == FaceMark::Visible);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::{HashMap, HashSet};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    // Fixtures

    fn cube_corners() -> Vec<DVec3> {
        let mut corners = Vec::with_capacity(8);
        for &x in &[0.0, 1.0] {
            for &y in &[0.0, 1.0] {
                for &z in &[0.0, 1.0] {
                    corners.push(DVec3::new(x, y, z));
                }
            }
        }
        corners
    }

    fn tetrahedron() -> Vec<DVec3> {
        vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
        ]
    }

    fn sphere_cloud(seed: u64, n: usize) -> Vec<DVec3> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut points = Vec::with_capacity(n);
        while points.len() < n {
            let p = DVec3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            );
            let len = p.length();
            if len > 1e-3 {
                points.push(p / len);
            }
        }
        points
    }

    fn cube_cloud(seed: u64, n: usize) -> Vec<DVec3> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                DVec3::new(
                    rng.random_range(-1.0..1.0),
                    rng.random_range(-1.0..1.0),
                    rng.random_range(-1.0..1.0),
                )
            })
            .collect()
    }

    fn sorted_triple(t: [usize; 3]) -> [usize; 3] {
        let mut t = t;
        t.sort_unstable();
        t
    }

    fn triangle_set(triangles: &[[usize; 3]]) -> HashSet<[usize; 3]> {
        triangles.iter().map(|&t| sorted_triple(t)).collect()
    }

    // Quantified hull invariants over an arbitrary build

    fn assert_hull_invariants(hull: &QuickHull, points: &[DVec3]) {
        hull.validate_topology().expect("topology is consistent");
        let faces = hull.polygon_faces().expect("faces are emittable");
        assert!(!faces.is_empty());

        // containment: no input point lies meaningfully outside any face
        let slack = 10.0 * hull.tolerance();
        for &f in &hull.faces {
            for p in points {
                assert!(
                    hull.mesh.distance_to_plane(f, *p) <= slack,
                    "input point outside face plane by more than {slack:e}"
                );
            }
        }

        // the axis extremes of the input are hull vertices
        let on_hull = hull.hull_vertices();
        for axis in 0..3 {
            let mut lowest = 0;
            let mut highest = 0;
            for (i, p) in points.iter().enumerate() {
                if p.to_array()[axis] < points[lowest].to_array()[axis] {
                    lowest = i;
                }
                if p.to_array()[axis] > points[highest].to_array()[axis] {
                    highest = i;
                }
            }
            assert!(on_hull.binary_search(&lowest).is_ok());
            assert!(on_hull.binary_search(&highest).is_ok());
        }

        // closedness: every directed boundary edge is paired with its reverse
        let mut directed: HashMap<(usize, usize), usize> = HashMap::new();
        for face in &faces {
            assert!(face.len() >= 3);
            for (&a, &b) in face.iter().circular_tuple_windows() {
                *directed.entry((a, b)).or_insert(0) += 1;
            }
        }
        for (&(a, b), &count) in &directed {
            assert_eq!(count, 1, "directed edge ({a}, {b}) repeated");
            assert_eq!(directed.get(&(b, a)), Some(&1), "edge ({a}, {b}) unpaired");
        }

        // Euler characteristic of the polygonal (pre-triangulation) hull
        let vertex_count = on_hull.len() as i64;
        let edge_count = (directed.len() / 2) as i64;
        let face_count = faces.len() as i64;
        assert_eq!(vertex_count - edge_count + face_count, 2);

        // orientation: every normal points away from the hull's interior
        let inner = on_hull.iter().map(|&i| points[i]).sum::<DVec3>() / on_hull.len() as f64;
        for &f in &hull.faces {
            assert!(hull.mesh.distance_to_plane(f, inner) < 0.0);
        }

        // convexity: no neighbor's centroid rises above a face's plane
        for &f in &hull.faces {
            let e0 = hull.mesh.faces[f.0].edge;
            let mut edge = e0;
            loop {
                let opposite = hull.mesh.opposite(edge).expect("twin exists");
                let neighbor = hull.mesh.edges[opposite.0].face;
                let height = hull
                    .mesh
                    .distance_to_plane(f, hull.mesh.faces[neighbor.0].centroid);
                assert!(height <= hull.tolerance(), "reflex edge on face {}", f.0);
                edge = hull.mesh.edges[edge.0].next;
                if edge == e0 {
                    break;
                }
            }
        }
    }

    // End-to-end scenarios

    #[test]
    fn test_cube() {
        let points = cube_corners();
        let hull = QuickHull::build(&points).unwrap();
        assert_hull_invariants(&hull, &points);

        // six square faces, twelve triangles, all corners on the hull
        let faces = hull.polygon_faces().unwrap();
        assert_eq!(faces.len(), 6);
        assert!(faces.iter().all(|f| f.len() == 4));
        assert_eq!(hull.triangles().unwrap().len(), 12);
        assert_eq!(hull.hull_vertices(), vec![0, 1, 2, 3, 4, 5, 6, 7]);

        // six distinct axis-aligned planes
        let mut planes = HashSet::new();
        for &f in &hull.faces {
            let n = hull.mesh.faces[f.0].normal;
            let snapped = n.to_array().map(|c| c.round() as i64);
            assert!((n - DVec3::new(snapped[0] as f64, snapped[1] as f64, snapped[2] as f64))
                .length()
                < 1e-9);
            planes.insert(snapped);
        }
        assert_eq!(planes.len(), 6);
    }

    #[test]
    fn test_tetrahedron_exact_faces() {
        let points = tetrahedron();
        let hull = QuickHull::build(&points).unwrap();
        assert_hull_invariants(&hull, &points);

        let triangles = hull.triangles().unwrap();
        assert_eq!(triangles.len(), 4);
        let expected: HashSet<[usize; 3]> =
            [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]].into_iter().collect();
        assert_eq!(triangle_set(&triangles), expected);
    }

    #[test]
    fn test_interior_point_is_ignored() {
        let mut points = cube_corners();
        points.push(DVec3::new(0.5, 0.5, 0.5));
        let hull = QuickHull::build(&points).unwrap();
        assert_hull_invariants(&hull, &points);

        let faces = hull.polygon_faces().unwrap();
        assert_eq!(faces.len(), 6);
        assert_eq!(hull.triangles().unwrap().len(), 12);
        // the interior point appears in no face
        assert!(faces.iter().all(|f| !f.contains(&8)));
        assert_eq!(hull.hull_vertices(), vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_coplanar_base_pyramid() {
        let points = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.5, 0.5, 1.0),
        ];
        let hull = QuickHull::build(&points).unwrap();
        assert_hull_invariants(&hull, &points);

        // one merged square base plus four side triangles
        let faces = hull.polygon_faces().unwrap();
        assert_eq!(faces.len(), 5);
        let quads: Vec<_> = faces.iter().filter(|f| f.len() == 4).collect();
        assert_eq!(quads.len(), 1);
        assert_eq!(faces.iter().filter(|f| f.len() == 3).count(), 4);
        assert_eq!(hull.triangles().unwrap().len(), 6);

        // the base faces straight down
        let base = hull
            .faces
            .iter()
            .find(|&&f| hull.mesh.faces[f.0].n_vertices == 4)
            .copied()
            .unwrap();
        assert!((hull.mesh.faces[base.0].normal - DVec3::new(0.0, 0.0, -1.0)).length() < 1e-9);
    }

    #[test]
    fn test_duplicate_point_is_omitted() {
        let mut points = tetrahedron();
        points.push(DVec3::new(0.0, 0.0, 0.0));
        let hull = QuickHull::build(&points).unwrap();
        assert_hull_invariants(&hull, &points);

        let triangles = hull.triangles().unwrap();
        let expected: HashSet<[usize; 3]> =
            [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]].into_iter().collect();
        assert_eq!(triangle_set(&triangles), expected);
        assert!(!hull.hull_vertices().contains(&4));
    }

    #[test]
    fn test_too_few_points() {
        let points = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
        ];
        assert_eq!(
            QuickHull::build(&points).unwrap_err(),
            HullError::TooFewPoints { actual: 3 }
        );
    }

    #[test]
    fn test_non_finite_coordinate_is_rejected() {
        let points = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, f64::NAN, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
        ];
        match QuickHull::build(&points).unwrap_err() {
            HullError::BadInput { index, .. } => assert_eq!(index, 1),
            other => panic!("expected BadInput, got {other:?}"),
        }
    }

    #[test]
    fn test_collinear_input_is_degenerate() {
        let points: Vec<DVec3> = (0..5).map(|i| DVec3::new(f64::from(i), 0.0, 0.0)).collect();
        match QuickHull::build(&points).unwrap_err() {
            HullError::Degenerate { kind, .. } => assert_eq!(kind, DegenerateInput::Collinear),
            other => panic!("expected Degenerate, got {other:?}"),
        }
    }

    #[test]
    fn test_coplanar_input_is_degenerate() {
        let points = vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(0.3, 0.7, 0.0),
        ];
        match QuickHull::build(&points).unwrap_err() {
            HullError::Degenerate { kind, .. } => assert_eq!(kind, DegenerateInput::Coplanar),
            other => panic!("expected Degenerate, got {other:?}"),
        }
    }

    #[test]
    fn test_heterogeneous_inputs() {
        let arrays = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        let tuples = [
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (0.0, 1.0, 0.0),
            (0.0, 0.0, 1.0),
        ];
        let from_arrays = convex_hull(&arrays).unwrap();
        let from_tuples = convex_hull(&tuples).unwrap();
        assert_eq!(triangle_set(&from_arrays), triangle_set(&from_tuples));
    }

    // Property sweeps over random clouds

    #[test]
    fn test_sphere_clouds() {
        for seed in 0..5 {
            let points = sphere_cloud(seed, 100);
            let hull = QuickHull::build(&points).unwrap();
            assert_hull_invariants(&hull, &points);
            // every point of a strictly convex cloud is a hull vertex
            assert_eq!(hull.hull_vertices().len(), points.len());
        }
    }

    #[test]
    fn test_cube_clouds() {
        for seed in 0..5 {
            let points = cube_cloud(seed, 200);
            let hull = QuickHull::build(&points).unwrap();
            assert_hull_invariants(&hull, &points);
        }
    }

    #[test]
    fn test_interior_grid_never_on_hull() {
        let mut points = cube_corners();
        for &x in &[0.25, 0.5, 0.75] {
            for &y in &[0.25, 0.5, 0.75] {
                for &z in &[0.25, 0.5, 0.75] {
                    points.push(DVec3::new(x, y, z));
                }
            }
        }
        let hull = QuickHull::build(&points).unwrap();
        assert_hull_invariants(&hull, &points);
        assert_eq!(hull.hull_vertices(), vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_rehull_is_idempotent() {
        fn position_key(p: DVec3) -> [u64; 3] {
            p.to_array().map(f64::to_bits)
        }
        fn face_keys(triangles: &[[usize; 3]], points: &[DVec3]) -> HashSet<[[u64; 3]; 3]> {
            triangles
                .iter()
                .map(|&t| {
                    let mut key = t.map(|i| position_key(points[i]));
                    key.sort_unstable();
                    key
                })
                .collect()
        }

        let points = sphere_cloud(42, 40);
        let hull = QuickHull::build(&points).unwrap();
        let first = face_keys(&hull.triangles().unwrap(), &points);

        let survivors: Vec<DVec3> = hull.hull_vertices().iter().map(|&i| points[i]).collect();
        let rehull = QuickHull::build(&survivors).unwrap();
        let second = face_keys(&rehull.triangles().unwrap(), &survivors);

        assert_eq!(first, second);
    }

    #[test]
    fn test_polygon_and_triangle_emission_agree() {
        let points = cube_cloud(7, 50);
        let hull = QuickHull::build(&points).unwrap();
        let faces = hull.polygon_faces().unwrap();
        let triangles = hull.triangles().unwrap();
        let expected: usize = faces.iter().map(|f| f.len() - 2).sum();
        assert_eq!(triangles.len(), expected);
    }

    #[test]
    fn test_error_display() {
        let err = HullError::TooFewPoints { actual: 2 };
        assert!(err.to_string().contains("2 points"));
        let err = HullError::Degenerate {
            kind: DegenerateInput::Coplanar,
            tolerance: 1e-12,
        };
        assert!(err.to_string().contains("coplanar"));
    }
}
