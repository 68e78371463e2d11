//! Output records of one generation call

use serde::Serialize;

use crate::core::types::Vec3;
use crate::math::Aabb;

use super::mesh::UnifiedMesh;
use super::params::LeafShape;

/// Tapered cylinder proxy for one trunk chain link
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrunkSegment {
    /// Midpoint of the cylinder axis
    pub center: Vec3,
    /// Euler XYZ rotation taking +Y onto the axis, radians
    pub rotation: Vec3,
    pub radius_bottom: f32,
    pub radius_top: f32,
    pub height: f32,
    pub radial_segments: u32,
    pub cap_bottom: bool,
    pub cap_top: bool,
    pub material: String,
}

/// The unified trunk and branch mesh
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshPrimitive {
    pub mesh: UnifiedMesh,
    pub bounds: Aabb,
    pub material: String,
}

/// One leaf placement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafInstance {
    pub position: Vec3,
    /// Euler XYZ rotation, radians
    pub rotation: Vec3,
    pub radius: f32,
    pub shape: LeafShape,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sprite: Option<String>,
    pub uv_scale: f32,
    pub material: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Primitive {
    Trunk(TrunkSegment),
    Mesh(MeshPrimitive),
    Leaf(LeafInstance),
}

impl Primitive {
    pub fn as_mesh(&self) -> Option<&MeshPrimitive> {
        match self {
            Primitive::Mesh(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafInstance> {
        match self {
            Primitive::Leaf(l) => Some(l),
            _ => None,
        }
    }

    pub fn material(&self) -> &str {
        match self {
            Primitive::Trunk(t) => &t.material,
            Primitive::Mesh(m) => &m.material,
            Primitive::Leaf(l) => &l.material,
        }
    }
}
