//! Vector helpers shared by every basis construction
//!
//! World frame: right-handed, Y-up, meters.

use crate::core::types::Vec3;

/// Below this length a vector is treated as zero.
pub const DEGENERATE_LENGTH: f32 = 1e-6;

/// Normalize, falling back to +Y for (near) zero-length input.
pub fn normalize_or_y(v: Vec3) -> Vec3 {
    let len = v.length();
    if len < DEGENERATE_LENGTH {
        Vec3::Y
    } else {
        v / len
    }
}

/// Reference "up" used to build a basis around `axis`.
///
/// +Y unless the axis is itself close to vertical, then +X.
pub fn basis_reference(axis: Vec3) -> Vec3 {
    if axis.y.abs() < 0.95 {
        Vec3::Y
    } else {
        Vec3::X
    }
}

/// Two unit vectors perpendicular to `axis` and to each other.
pub fn orthonormal_basis(axis: Vec3) -> (Vec3, Vec3) {
    let axis = normalize_or_y(axis);
    let o1 = axis.cross(basis_reference(axis)).normalize();
    let o2 = axis.cross(o1).normalize();
    (o1, o2)
}

/// Direction at `angle` in the plane spanned by `o1`/`o2`.
#[inline]
pub fn ring_direction(o1: Vec3, o2: Vec3, angle: f32) -> Vec3 {
    o1 * angle.cos() + o2 * angle.sin()
}

/// Tilt `axis` by `alpha` toward the in-plane direction at azimuth `theta`.
pub fn tilt_axis(axis: Vec3, alpha: f32, theta: f32) -> Vec3 {
    let axis = normalize_or_y(axis);
    let (o1, o2) = orthonormal_basis(axis);
    let ortho = ring_direction(o1, o2, theta);
    normalize_or_y(axis * alpha.cos() + ortho * alpha.sin())
}

/// Cubic smoothstep on [0, 1].
#[inline]
pub fn smoothstep(k: f32) -> f32 {
    let k = k.clamp(0.0, 1.0);
    k * k * (3.0 - 2.0 * k)
}

/// Component of `v` perpendicular to unit `axis`, normalized.
///
/// Returns `None` when `v` is (nearly) parallel to the axis.
pub fn perpendicular_to(v: Vec3, axis: Vec3) -> Option<Vec3> {
    let p = v - axis * v.dot(axis);
    let len = p.length();
    if len < DEGENERATE_LENGTH {
        None
    } else {
        Some(p / len)
    }
}
