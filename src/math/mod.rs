//! Mathematical utilities: seeded randomness, bases, segment queries

pub mod aabb;
pub mod rng;
pub mod segment;
pub mod vector;

pub use aabb::Aabb;
pub use rng::Mulberry32;
pub use segment::{nearest_on_polyline, segment_distance, PolylineHit, SegmentDistance};
pub use vector::{normalize_or_y, orthonormal_basis};
