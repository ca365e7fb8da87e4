//! # `hull_surge`
//!
//! Fast 3D convex hulls via **QuickHull** on a half-edge mesh.
//!
//! ## What is this?
//!
//! Given at least four points in 3D, this crate computes the boundary of
//! their convex hull as faces over the *input indices*: every emitted face
//! names the points that support it, in counter-clockwise order viewed from
//! outside. The hull is convex, closed (every edge is shared by exactly two
//! faces), and contains every input point on its boundary or inside.
//!
//! Construction is the classic QuickHull sweep: start from a tetrahedron of
//! extreme points, repeatedly add the outside point farthest from the face
//! that claims it, and re-stitch the boundary along the horizon of faces
//! visible from that point. Near-coplanar neighbors are merged under a
//! tolerance derived from the input extent, so flat regions come out as
//! single polygons instead of triangle shards.
//!
//! ## Quick Start
//!
//! ```rust
//! use hull_surge::convex_hull;
//!
//! // the eight corners of the unit cube, in no particular order
//! let points = [
//!     [0.0, 0.0, 0.0],
//!     [0.0, 0.0, 1.0],
//!     [0.0, 1.0, 0.0],
//!     [0.0, 1.0, 1.0],
//!     [1.0, 0.0, 0.0],
//!     [1.0, 0.0, 1.0],
//!     [1.0, 1.0, 0.0],
//!     [1.0, 1.0, 1.0],
//! ];
//!
//! // six square faces, fan-triangulated into twelve triangles
//! let triangles = convex_hull(&points).unwrap();
//! assert_eq!(triangles.len(), 12);
//!
//! // every triangle indexes into the input
//! assert!(triangles.iter().flatten().all(|&i| i < points.len()));
//! ```
//!
//! Keep polygonal faces instead of triangles with [`convex_hull_faces`], or
//! hold on to a [`QuickHull`] for the richer queries (`hull_vertices`,
//! `tolerance`, `validate_topology`):
//!
//! ```rust
//! use hull_surge::QuickHull;
//! use hull_surge::math::DVec3;
//!
//! let points = vec![
//!     DVec3::new(0.0, 0.0, 0.0),
//!     DVec3::new(1.0, 0.0, 0.0),
//!     DVec3::new(0.0, 1.0, 0.0),
//!     DVec3::new(0.0, 0.0, 1.0),
//! ];
//! let hull = QuickHull::build(&points).unwrap();
//! assert_eq!(hull.face_count(), 4);
//! assert_eq!(hull.hull_vertices(), vec![0, 1, 2, 3]);
//! ```
//!
//! ## Key Features
//!
//! - **Index-based output**: faces reference input positions, never copies
//! - **Tolerance-based robustness**: plane classification scales with the
//!   input extent; coplanar patches merge into polygons
//! - **Polymorphic input**: `DVec3`, `[f64; 3]`, `(f64, f64, f64)`, or any
//!   type implementing [`HullPoint`]
//! - **Diagnostics**: [`QuickHull::validate_topology`] re-checks the emitted
//!   mesh, and construction traces through the [`log`] facade
//!
//! ## When NOT to Use
//!
//! - 2D or ≥4D hulls (this crate is strictly 3D)
//! - Exact predicates required (classification is floating point with an
//!   epsilon-scaled tolerance)
//! - Online point insertion after construction (the builder is one-shot)

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod half_edge;
mod quick_hull;

pub use half_edge::{EdgeIdx, FaceIdx, VertexIdx};
pub use quick_hull::{
    DegenerateInput, HullError, HullPoint, QuickHull, convex_hull, convex_hull_faces,
};

/// Re-export glam types for convenience
pub mod math {
    pub use glam::DVec3;
}
