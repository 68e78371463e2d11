//! Ring-swept tapered tube meshing
//!
//! A tube follows a [`CatmullRomCurve`] through its control points. Each
//! sample carries a ring of `radial_segments + 1` vertices (the seam column
//! is duplicated so U runs 0..1). A tube can start from a literal copy of
//! another tube's last ring, which is how branches weld to their parents
//! without a seam.

use std::f32::consts::TAU;

use crate::core::types::{Quat, Vec2, Vec3};
use crate::math::vector::{orthonormal_basis, perpendicular_to, smoothstep, DEGENERATE_LENGTH};

use super::curve::CatmullRomCurve;

/// Smallest ring radius ever emitted
pub const MIN_RING_RADIUS: f32 = 0.003;
/// Smallest taper scale applied to the base radius
pub const MIN_TAPER_SCALE: f32 = 0.05;

/// Radius scale along the tube
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Taper {
    Constant,
    /// `1 - k·t`
    Linear(f32),
}

impl Default for Taper {
    fn default() -> Self {
        Taper::Linear(0.35)
    }
}

impl Taper {
    pub fn eval(&self, t: f32) -> f32 {
        match *self {
            Taper::Constant => 1.0,
            Taper::Linear(k) => 1.0 - k * t,
        }
    }
}

/// Radius bulge at the start of a tube, easing back to 1 over `frac`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collar {
    /// Fraction of the curve parameter covered by the bulge
    pub frac: f32,
    /// Peak radius scale at t = 0; values ≤ 1 disable the bulge
    pub scale: f32,
    /// Additional relative bulge on top of `scale`
    pub bulge_extra: f32,
}

impl Collar {
    /// Radius multiplier at `t`
    pub fn multiplier(&self, t: f32) -> f32 {
        if self.frac <= 0.0 || t >= self.frac {
            return 1.0;
        }
        let k = t / self.frac.max(1e-4);
        let start = if self.scale > 1.0 {
            self.scale * (1.0 + 0.5 * self.bulge_extra)
        } else {
            1.0
        };
        let s = smoothstep(k);
        start * (1.0 - s) + s
    }
}

/// Ring frame propagation along the curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameMode {
    #[default]
    Frenet,
    /// Minimal rotation between samples; no flips on near-straight curves
    ParallelTransport,
}

/// Literal first-ring data copied from another tube's end ring
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RingOverride {
    pub positions: Vec<Vec3>,
    /// Optional; computed from the U/V policy when absent
    pub uvs: Option<Vec<Vec2>>,
}

/// Options for [`build_tube`]
#[derive(Debug, Clone)]
pub struct TubeOptions {
    pub tubular_segments: u32,
    pub radial_segments: u32,
    pub taper: Taper,
    pub collar: Option<Collar>,
    pub cap_start: bool,
    pub cap_end: bool,
    pub start_ring: Option<RingOverride>,
    pub v_start: f32,
    /// V span over the whole tube; use arc length × density for world-scaled bark
    pub v_scale: f32,
    /// Rotation of the angular origin, radians
    pub u_angle_offset: f32,
    /// Fixes the angular origin to this direction (projected onto the first ring plane)
    pub ref_normal: Option<Vec3>,
    pub frame_mode: FrameMode,
}

impl Default for TubeOptions {
    fn default() -> Self {
        Self {
            tubular_segments: 8,
            radial_segments: 10,
            taper: Taper::default(),
            collar: None,
            cap_start: true,
            cap_end: true,
            start_ring: None,
            v_start: 0.0,
            v_scale: 1.0,
            u_angle_offset: 0.0,
            ref_normal: None,
            frame_mode: FrameMode::default(),
        }
    }
}

/// Geometry and end state of one tube
#[derive(Debug, Clone, Default)]
pub struct TubeMeshResult {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
    pub end_point: Vec3,
    pub end_tangent: Vec3,
    pub end_radius: f32,
    /// Snapshot of the last ring, for welding a child tube
    pub end_ring_positions: Vec<Vec3>,
    pub end_ring_uvs: Vec<Vec2>,
    /// Curve sample at each ring
    pub ring_centers: Vec<Vec3>,
    /// Emitted radius at each ring
    pub ring_radii: Vec<f32>,
    /// Arc length through the ring centers
    pub arc_length: f32,
    /// Walls were rewound to face outward
    inverted: bool,
}

impl TubeMeshResult {
    /// End-ring snapshot as a start-ring override for a welded child
    pub fn end_ring(&self) -> RingOverride {
        RingOverride {
            positions: self.end_ring_positions.clone(),
            uvs: Some(self.end_ring_uvs.clone()),
        }
    }

    /// V coordinate of the end ring
    pub fn end_v(&self) -> f32 {
        self.end_ring_uvs.first().map_or(0.0, |uv| uv.y)
    }

    /// Close an open tube with an end cap fan.
    ///
    /// Same topology as building with `cap_end: true`; the fan takes the
    /// winding already chosen for the walls and normals are recomputed.
    pub fn close_end(&mut self) {
        let stride = self.end_ring_positions.len();
        if stride < 4 || self.ring_centers.is_empty() {
            return;
        }
        let radial = (stride - 1) as u32;
        let base = ((self.ring_centers.len() - 1) * stride) as u32;
        let center = self.positions.len() as u32;
        self.positions.push(self.end_point);
        self.uvs.push(Vec2::splat(0.5));
        for j in 0..radial {
            let (b, c) = (base + j + 1, base + j);
            if self.inverted {
                self.indices.extend_from_slice(&[center, c, b]);
            } else {
                self.indices.extend_from_slice(&[center, b, c]);
            }
        }
        self.normals = face_weighted_normals(&self.positions, &self.indices);
    }
}

/// Vertex count of a tube with the given topology
pub fn vertex_count_for(tubular_segments: u32, radial_segments: u32, cap_start: bool, cap_end: bool) -> usize {
    let rings = tubular_segments.max(1) as usize + 1;
    let caps = cap_start as usize + cap_end as usize;
    rings * (radial_segments.max(3) as usize + 1) + caps
}

/// Index count of a tube with the given topology
pub fn index_count_for(tubular_segments: u32, radial_segments: u32, cap_start: bool, cap_end: bool) -> usize {
    let radial = radial_segments.max(3) as usize;
    let caps = cap_start as usize + cap_end as usize;
    tubular_segments.max(1) as usize * radial * 6 + caps * radial * 3
}

/// Per-ring frames. Both modes start from the shared basis around the first
/// tangent, so ring angle 0 lies along `orthonormal_basis(t0).0`.
struct Frames {
    tangents: Vec<Vec3>,
    normals: Vec<Vec3>,
    binormals: Vec<Vec3>,
}

fn frenet_frames(curve: &CatmullRomCurve, segments: u32) -> Frames {
    let tangents: Vec<Vec3> = (0..=segments)
        .map(|i| curve.tangent(i as f32 / segments as f32))
        .collect();

    let mut normals = Vec::with_capacity(tangents.len());
    normals.push(orthonormal_basis(tangents[0]).0);

    for i in 1..tangents.len() {
        let mut n = normals[i - 1];
        let axis = tangents[i - 1].cross(tangents[i]);
        if axis.length() > f32::EPSILON {
            let theta = tangents[i - 1].dot(tangents[i]).clamp(-1.0, 1.0).acos();
            n = Quat::from_axis_angle(axis.normalize(), theta) * n;
        }
        normals.push(n);
    }

    let binormals = tangents.iter().zip(&normals).map(|(t, n)| t.cross(*n)).collect();
    Frames { tangents, normals, binormals }
}

fn parallel_transport_frames(curve: &CatmullRomCurve, segments: u32) -> Frames {
    let tangents: Vec<Vec3> = (0..=segments)
        .map(|i| curve.tangent(i as f32 / segments as f32))
        .collect();

    let mut normals = Vec::with_capacity(tangents.len());
    normals.push(orthonormal_basis(tangents[0]).0);

    for i in 1..tangents.len() {
        let prev = normals[i - 1];
        let axis = tangents[i - 1].cross(tangents[i]);
        let s = axis.length();
        let n = if s > 1e-8 {
            let angle = s.clamp(-1.0, 1.0).asin();
            (Quat::from_axis_angle(axis / s, angle) * prev).normalize()
        } else {
            prev
        };
        normals.push(n);
    }

    let binormals = tangents
        .iter()
        .zip(&normals)
        .map(|(t, n)| t.cross(*n).normalize_or_zero())
        .collect();
    Frames { tangents, normals, binormals }
}

/// Sweep a tapered ring along the curve through `points`.
///
/// Ring radius is `max(0.003, base_radius · max(0.05, taper(t)) · collar(t))`.
/// Normals are recomputed from the triangles, then the whole tube is flipped
/// (normals and winding) if they point inward on aggregate.
pub fn build_tube(points: &[Vec3], base_radius: f32, opts: &TubeOptions) -> TubeMeshResult {
    let tubular = opts.tubular_segments.max(1);
    let radial = opts.radial_segments.max(3);
    let curve = CatmullRomCurve::new(points.to_vec());
    let frames = match opts.frame_mode {
        FrameMode::Frenet => frenet_frames(&curve, tubular),
        FrameMode::ParallelTransport => parallel_transport_frames(&curve, tubular),
    };

    let ring_count = tubular as usize + 1;
    let ring_stride = radial as usize + 1;

    let mut ring_centers = Vec::with_capacity(ring_count);
    let mut cum_len = Vec::with_capacity(ring_count);
    let mut total_len = 0.0;
    for i in 0..ring_count {
        let c = curve.point(i as f32 / tubular as f32);
        if let Some(prev) = ring_centers.last() {
            total_len += c.distance(*prev);
        }
        cum_len.push(total_len);
        ring_centers.push(c);
    }
    let inv_total = if total_len > 1e-8 { 1.0 / total_len } else { 0.0 };

    // Angular origin pinned to the reference direction when one is given
    let origin_offset = opts
        .ref_normal
        .and_then(|r| perpendicular_to(r, frames.tangents[0]))
        .map_or(0.0, |r| r.dot(frames.binormals[0]).atan2(r.dot(frames.normals[0])));
    let u_offset = opts.u_angle_offset + origin_offset;

    let start_ring = opts
        .start_ring
        .as_ref()
        .filter(|ring| ring.positions.len() >= ring_stride);

    let cap_count = opts.cap_start as usize + opts.cap_end as usize;
    let vertex_count = ring_count * ring_stride + cap_count;
    let mut positions = Vec::with_capacity(vertex_count);
    let mut uvs = Vec::with_capacity(vertex_count);
    let mut radial_ref = Vec::with_capacity(vertex_count);
    let mut ring_radii = Vec::with_capacity(ring_count);

    for i in 0..ring_count {
        let t = i as f32 / tubular as f32;
        let center = ring_centers[i];
        let collar = opts.collar.map_or(1.0, |c| c.multiplier(t));
        let radius = (base_radius * opts.taper.eval(t).max(MIN_TAPER_SCALE) * collar).max(MIN_RING_RADIUS);
        ring_radii.push(radius);
        let v = opts.v_start + cum_len[i] * inv_total * opts.v_scale;

        match start_ring.filter(|_| i == 0) {
            Some(ring) => {
                for j in 0..ring_stride {
                    let p = ring.positions[j];
                    positions.push(p);
                    radial_ref.push((p - center) / (p - center).length().max(DEGENERATE_LENGTH));
                    let uv = ring
                        .uvs
                        .as_ref()
                        .filter(|uvs| uvs.len() >= ring_stride)
                        .map_or(Vec2::new(j as f32 / radial as f32, v), |uvs| uvs[j]);
                    uvs.push(uv);
                }
            }
            None => {
                let (n, b) = (frames.normals[i], frames.binormals[i]);
                for j in 0..ring_stride {
                    let u = j as f32 / radial as f32;
                    let angle = u * TAU + u_offset;
                    let dir = n * angle.cos() + b * angle.sin();
                    positions.push(center + dir * radius);
                    radial_ref.push(dir);
                    uvs.push(Vec2::new(u, v));
                }
            }
        }
    }

    let mut indices = Vec::with_capacity(index_count_for(tubular, radial, opts.cap_start, opts.cap_end));
    for i in 0..tubular as usize {
        for j in 0..radial as usize {
            let a = (i * ring_stride + j) as u32;
            let b = ((i + 1) * ring_stride + j) as u32;
            let c = ((i + 1) * ring_stride + j + 1) as u32;
            let d = (i * ring_stride + j + 1) as u32;
            indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
    }

    // Single-sided fans wound like the side quads; the orientation pass
    // below flips them together with the walls.
    if opts.cap_start {
        let center = positions.len() as u32;
        positions.push(curve.point(0.0));
        uvs.push(Vec2::splat(0.5));
        radial_ref.push(Vec3::ZERO);
        for j in 0..radial {
            indices.extend_from_slice(&[center, j, j + 1]);
        }
    }
    if opts.cap_end {
        let center = positions.len() as u32;
        positions.push(curve.point(1.0));
        uvs.push(Vec2::splat(0.5));
        radial_ref.push(Vec3::ZERO);
        let base = tubular * ring_stride as u32;
        for j in 0..radial {
            indices.extend_from_slice(&[center, base + j + 1, base + j]);
        }
    }

    let mut normals = face_weighted_normals(&positions, &indices);
    let dot_sum: f32 = normals.iter().zip(&radial_ref).map(|(n, r)| n.dot(*r)).sum();
    let inverted = dot_sum < 0.0;
    if inverted {
        for n in &mut normals {
            *n = -*n;
        }
        for tri in indices.chunks_exact_mut(3) {
            tri.swap(1, 2);
        }
    }

    let last = (ring_count - 1) * ring_stride;
    TubeMeshResult {
        end_point: curve.point(1.0),
        end_tangent: frames.tangents[ring_count - 1],
        end_radius: (base_radius * opts.taper.eval(1.0).max(MIN_TAPER_SCALE)).max(MIN_RING_RADIUS),
        end_ring_positions: positions[last..last + ring_stride].to_vec(),
        end_ring_uvs: uvs[last..last + ring_stride].to_vec(),
        positions,
        normals,
        uvs,
        indices,
        ring_centers,
        ring_radii,
        arc_length: total_len,
        inverted,
    }
}

/// Area-weighted vertex normals; vertices without faces get a zero normal.
fn face_weighted_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let face = (positions[c] - positions[b]).cross(positions[a] - positions[b]);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    for n in &mut normals {
        *n = n.normalize_or_zero();
    }
    normals
}
