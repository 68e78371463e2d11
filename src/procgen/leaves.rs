//! Leaf placement on terminal branches
//!
//! Leaves sit on the wood surface: radially offset from the branch axis by
//! the local tube radius plus a small epsilon. Every leaf draws from the
//! generation stream in a fixed order (azimuth, along-mode shift, size,
//! orientation, sprite), so leaf lists are reproducible per seed.

use std::f32::consts::PI;

use crate::core::types::{EulerRot, Mat3, Quat, Vec3};
use crate::math::rng::Mulberry32;
use crate::math::vector::{normalize_or_y, orthonormal_basis, ring_direction};

pub use super::params::{LeafPlacement, LeafShape, LeafTiltMode};

use super::curve::CatmullRomCurve;
use super::params::GenerationParams;
use super::primitive::LeafInstance;

/// Distal fraction of a branch that along-mode leaves cover
const ALONG_START: f32 = 0.3;
/// Parameter beyond which a leaf counts as sitting at the tip
const TIP_T: f32 = 0.98;

/// Euler XYZ angles of a rotation
fn euler_xyz(q: Quat) -> Vec3 {
    let (x, y, z) = q.to_euler(EulerRot::XYZ);
    Vec3::new(x, y, z)
}

/// Euler XYZ rotation taking +Y onto `dir`.
pub fn euler_from_dir(dir: Vec3) -> Vec3 {
    euler_xyz(Quat::from_rotation_arc(Vec3::Y, normalize_or_y(dir)))
}

/// Orientation of one leaf as Euler XYZ radians.
///
/// Billboards and spheres turn +Y onto `facing`, rolled about it by a random
/// angle (one draw).
/// Textured leaves get a plane normal tilted from the radial direction
/// toward the branch axis by `leaf_tilt_deg`, then an in-plane rotation
/// toward ±Y when a global tilt mode is set (no draws).
pub fn leaf_rotation(params: &GenerationParams, axis: Vec3, radial: Vec3, facing: Vec3, rng: &mut Mulberry32) -> Vec3 {
    if params.leaf_shape != LeafShape::Texture {
        let roll = (rng.next_f32() - 0.5) * PI;
        let q = Quat::from_rotation_arc(Vec3::Y, normalize_or_y(facing)) * Quat::from_rotation_y(roll);
        return euler_xyz(q);
    }

    let r = normalize_or_y(radial);
    let t = normalize_or_y(axis);
    let phi = params.leaf_tilt_deg.clamp(0.0, 90.0).to_radians();
    let mut z = normalize_or_y(r * phi.cos() + t * phi.sin());
    if params.leaf_global_tilt_level <= 0.0 && z.dot(r) < 0.0 {
        z = -z;
    }

    let mut x = t.cross(z);
    if x.length_squared() < 1e-10 {
        x = r.cross(z);
    }
    let mut x = x.normalize_or_zero();
    let mut y = z.cross(x).normalize_or_zero();

    let level = params.leaf_global_tilt_level.clamp(0.0, 1.0);
    let target = match params.leaf_global_tilt_mode {
        LeafTiltMode::None => None,
        LeafTiltMode::Up => Some(Vec3::Y),
        LeafTiltMode::Down => Some(Vec3::NEG_Y),
    };
    if let Some(target) = target.filter(|_| level > 0.0) {
        let projected = target - z * target.dot(z);
        if projected.length_squared() > 1e-12 && y.length_squared() > 1e-12 {
            let projected = projected.normalize();
            let angle = y.dot(projected).clamp(-1.0, 1.0).acos();
            if angle > 1e-5 {
                let sign = if y.cross(projected).dot(z) < 0.0 { -1.0 } else { 1.0 };
                let q = Quat::from_axis_angle(z, angle * level * sign);
                x = (q * x).normalize();
                y = (q * y).normalize();
            }
        }
    }

    euler_xyz(Quat::from_mat3(&Mat3::from_cols(x, y, z)))
}

/// Sprite name for a textured leaf.
///
/// Draws once only when picking from the sprite list.
pub fn select_sprite(params: &GenerationParams, rng: &mut Mulberry32) -> Option<String> {
    if params.leaf_shape != LeafShape::Texture {
        return None;
    }
    let names = &params.leaf_sprite_names;
    if params.use_all_leaf_sprites && !names.is_empty() {
        let idx = (rng.next_f32() * names.len() as f32) as usize % names.len();
        return Some(names[idx].clone());
    }
    params.leaf_texture_sprite_name.clone().filter(|s| !s.is_empty())
}

fn leaf_size(params: &GenerationParams, rng: &mut Mulberry32) -> f32 {
    (params.leaf_size * (0.7 + 0.6 * rng.next_f32())).max(0.01)
}

#[inline]
fn surface_offset(radius: f32) -> f32 {
    radius + (radius * 0.08).max(0.003)
}

/// `leaves_per_branch` leaves around the tip ring of a terminal branch.
pub fn place_end_leaves(
    params: &GenerationParams,
    tip: Vec3,
    axis: Vec3,
    radius: f32,
    material: &str,
    rng: &mut Mulberry32,
) -> Vec<LeafInstance> {
    (0..params.leaves_per_branch)
        .map(|_| end_leaf(params, tip, axis, radius, material, rng))
        .collect()
}

fn end_leaf(params: &GenerationParams, tip: Vec3, axis: Vec3, radius: f32, material: &str, rng: &mut Mulberry32) -> LeafInstance {
    let axis = normalize_or_y(axis);
    let (o1, o2) = orthonormal_basis(axis);
    let radial = ring_direction(o1, o2, rng.angle());
    let position = tip + radial * surface_offset(radius);
    let size = leaf_size(params, rng);
    let rotation = leaf_rotation(params, axis, radial, axis, rng);
    let sprite = select_sprite(params, rng);
    LeafInstance {
        position,
        rotation,
        radius: size,
        shape: params.leaf_shape,
        sprite,
        uv_scale: params.leaf_uv_scale,
        material: material.to_string(),
    }
}

/// Leaves spread over the distal 70% of a terminal branch.
///
/// Count is `max(1, round(leaves_per_meter · length))`. When no sample lands
/// at the tip, one more leaf is placed there.
pub fn place_along_leaves(
    params: &GenerationParams,
    curve: &CatmullRomCurve,
    length: f32,
    radius_at: impl Fn(f32) -> f32,
    material: &str,
    rng: &mut Mulberry32,
) -> Vec<LeafInstance> {
    let density = params.leaves_per_meter.max(0.5);
    let count = ((density * length).round() as u32).max(1);
    let mut leaves = Vec::with_capacity(count as usize + 1);
    let mut reached_tip = false;

    for j in 0..count {
        let t = ALONG_START + (1.0 - ALONG_START) * ((j as f32 + rng.next_f32() * 0.3) / count as f32);
        reached_tip |= t >= TIP_T;
        let axis = curve.tangent(t);
        let (o1, o2) = orthonormal_basis(axis);
        let radial = ring_direction(o1, o2, rng.angle());
        let rad = radius_at(t);

        // Small shift around the ring so leaves do not line up
        let around = axis.cross(radial).normalize_or_zero();
        let shift = (rng.next_f32() - 0.5) * (rad * 0.3).min(0.02 * length);
        let position = curve.point(t) + radial * surface_offset(rad) + around * shift;

        let size = leaf_size(params, rng);
        let rotation = leaf_rotation(params, axis, radial, axis, rng);
        let sprite = select_sprite(params, rng);
        leaves.push(LeafInstance {
            position,
            rotation,
            radius: size,
            shape: params.leaf_shape,
            sprite,
            uv_scale: params.leaf_uv_scale,
            material: material.to_string(),
        });
    }

    if !reached_tip {
        leaves.push(end_leaf(params, curve.point(1.0), curve.tangent(1.0), radius_at(1.0), material, rng));
    }
    leaves
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch() -> CatmullRomCurve {
        CatmullRomCurve::new(vec![
            Vec3::ZERO,
            Vec3::new(0.32, 0.0, 0.0),
            Vec3::new(0.66, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
        ])
    }

    fn rotation_matrix(euler: Vec3) -> Mat3 {
        Mat3::from_quat(Quat::from_euler(EulerRot::XYZ, euler.x, euler.y, euler.z))
    }

    #[test]
    fn test_end_leaves_sit_on_surface() {
        let params = GenerationParams { leaves_per_branch: 5, ..Default::default() };
        let mut rng = Mulberry32::new(1);
        let tip = Vec3::new(1.0, 3.0, 0.0);
        let leaves = place_end_leaves(&params, tip, Vec3::X, 0.05, "leaves", &mut rng);
        assert_eq!(leaves.len(), 5);
        for leaf in &leaves {
            let offset = leaf.position - tip;
            assert!(offset.dot(Vec3::X).abs() < 1e-5);
            assert!((offset.length() - (0.05 + 0.004)).abs() < 1e-5);
            assert!(leaf.radius >= 0.01);
            assert!(leaf.sprite.is_none());
        }
    }

    #[test]
    fn test_zero_leaves_per_branch() {
        let params = GenerationParams { leaves_per_branch: 0, ..Default::default() };
        let mut rng = Mulberry32::new(1);
        assert!(place_end_leaves(&params, Vec3::ZERO, Vec3::Y, 0.1, "l", &mut rng).is_empty());
    }

    #[test]
    fn test_along_leaf_count_and_range() {
        let params = GenerationParams {
            leaf_placement: LeafPlacement::Along,
            leaves_per_meter: 10.0,
            ..Default::default()
        };
        let mut rng = Mulberry32::new(2);
        let leaves = place_along_leaves(&params, &branch(), 1.0, |_| 0.02, "leaves", &mut rng);
        // Ten samples plus the guaranteed tip leaf
        assert_eq!(leaves.len(), 11);
        for leaf in &leaves {
            assert!(leaf.position.x >= ALONG_START - 0.05, "leaf too close to base: {:?}", leaf.position);
        }
        let tip = leaves[10].position;
        assert!((tip.x - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_texture_leaf_normal_tilts_toward_axis() {
        let params = GenerationParams {
            leaf_shape: LeafShape::Texture,
            leaf_tilt_deg: 30.0,
            ..Default::default()
        };
        let mut rng = Mulberry32::new(3);
        let before = rng.clone().next_u32();
        let euler = leaf_rotation(&params, Vec3::X, Vec3::Y, Vec3::X, &mut rng);
        // Textured orientation draws nothing
        assert_eq!(rng.next_u32(), before);

        let normal = rotation_matrix(euler).z_axis;
        let expected = Vec3::Y * 30f32.to_radians().cos() + Vec3::X * 30f32.to_radians().sin();
        assert!((normal - expected).length() < 1e-4, "normal {:?}", normal);
    }

    #[test]
    fn test_global_tilt_rotates_in_plane() {
        let base = GenerationParams { leaf_shape: LeafShape::Texture, ..Default::default() };
        let tilted = GenerationParams {
            leaf_global_tilt_mode: LeafTiltMode::Down,
            leaf_global_tilt_level: 1.0,
            ..base.clone()
        };
        let mut rng = Mulberry32::new(4);
        let radial = Vec3::Z;
        let a = rotation_matrix(leaf_rotation(&base, Vec3::X, radial, Vec3::X, &mut rng));
        let b = rotation_matrix(leaf_rotation(&tilted, Vec3::X, radial, Vec3::X, &mut rng));
        // Same plane normal, in-plane up axis turned toward -Y
        assert!((a.z_axis - b.z_axis).length() < 1e-4);
        let projected = Vec3::NEG_Y - b.z_axis * Vec3::NEG_Y.dot(b.z_axis);
        assert!((b.y_axis - projected.normalize()).length() < 1e-3);
    }

    #[test]
    fn test_billboard_faces_direction() {
        let params = GenerationParams::default();
        let mut rng = Mulberry32::new(5);
        let dir = Vec3::new(1.0, 1.0, 0.0).normalize();
        let a = rotation_matrix(leaf_rotation(&params, dir, Vec3::Z, dir, &mut rng));
        let b = rotation_matrix(leaf_rotation(&params, dir, Vec3::Z, dir, &mut rng));
        assert!((a.y_axis - dir).length() < 1e-4);
        assert!((b.y_axis - dir).length() < 1e-4);
        // Rolls differ between draws
        assert!((a.x_axis - b.x_axis).length() > 1e-4);
    }

    #[test]
    fn test_sprite_selection() {
        let mut params = GenerationParams {
            leaf_shape: LeafShape::Texture,
            leaf_texture_sprite_name: Some("oak".to_string()),
            ..Default::default()
        };
        let mut rng = Mulberry32::new(6);
        assert_eq!(select_sprite(&params, &mut rng).as_deref(), Some("oak"));

        params.use_all_leaf_sprites = true;
        params.leaf_sprite_names = vec!["a".into(), "b".into(), "c".into()];
        for _ in 0..50 {
            let name = select_sprite(&params, &mut rng).unwrap();
            assert!(params.leaf_sprite_names.contains(&name));
        }

        params.leaf_shape = LeafShape::Sphere;
        assert!(select_sprite(&params, &mut rng).is_none());
    }

    #[test]
    fn test_euler_from_dir() {
        let m = rotation_matrix(euler_from_dir(Vec3::X));
        assert!((m.y_axis - Vec3::X).length() < 1e-5);
    }
}
