//! Unified woody mesh accumulator.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use serde::Serialize;

use crate::core::types::{Vec2, Vec3};
use crate::math::Aabb;

use super::tube::TubeMeshResult;

/// Interleaved vertex for direct upload.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// All trunk and branch geometry of one tree, in separate attribute buffers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnifiedMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
}

impl UnifiedMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tube, remapping its indices past the current vertices.
    ///
    /// Returns the vertex range the tube occupies.
    pub fn append(&mut self, tube: &TubeMeshResult) -> Range<u32> {
        let offset = self.positions.len() as u32;
        self.positions.extend_from_slice(&tube.positions);
        self.normals.extend_from_slice(&tube.normals);
        self.uvs.extend_from_slice(&tube.uvs);
        self.indices.extend(tube.indices.iter().map(|i| i + offset));
        offset..self.positions.len() as u32
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.positions.iter().copied())
    }

    /// True when every index references a vertex of this mesh
    pub fn indices_in_bounds(&self) -> bool {
        let count = self.positions.len() as u32;
        self.indices.iter().all(|&i| i < count)
    }

    pub fn interleaved(&self) -> Vec<MeshVertex> {
        self.positions
            .iter()
            .zip(&self.normals)
            .zip(&self.uvs)
            .map(|((p, n), uv)| MeshVertex {
                position: p.to_array(),
                normal: n.to_array(),
                uv: uv.to_array(),
            })
            .collect()
    }

    /// Raw bytes of every buffer, in order: positions, normals, uvs, indices
    pub fn as_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(
            self.positions.len() * 32 + self.indices.len() * 4,
        );
        bytes.extend_from_slice(bytemuck::cast_slice(&self.positions));
        bytes.extend_from_slice(bytemuck::cast_slice(&self.normals));
        bytes.extend_from_slice(bytemuck::cast_slice(&self.uvs));
        bytes.extend_from_slice(bytemuck::cast_slice(&self.indices));
        bytes
    }
}
