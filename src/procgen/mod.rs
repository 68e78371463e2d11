//! Procedural tree generation
//!
//! [`generate_tree`] turns a [`GenerationParams`] record into a flat list of
//! [`Primitive`]s: one unified bark mesh plus leaf instances. Output is a pure
//! function of the parameters, so the same seed always yields the same bytes.

pub mod curve;
pub mod engine;
pub mod leaves;
pub mod mesh;
pub mod params;
pub mod primitive;
pub mod scoring;
pub mod tube;

pub use engine::{
    generate_batch, generate_batch_with_stats, generate_tree, generate_tree_with_stats, GenerationStats, TreeBuilder,
};
pub use mesh::{MeshVertex, UnifiedMesh};
pub use params::{GenerationParams, LeafPlacement, LeafShape, LeafTiltMode, TreeMaterials, TreeStyle};
pub use primitive::{LeafInstance, MeshPrimitive, Primitive, TrunkSegment};
pub use tube::{build_tube, TubeMeshResult, TubeOptions};
