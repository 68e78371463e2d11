//! Arborist - A deterministic procedural tree mesh generator

pub mod core;
pub mod math;
pub mod procgen;

pub use procgen::{generate_tree, GenerationParams, Primitive, TreeMaterials};
