//! Best-of-N branch direction scoring
//!
//! Each candidate branch is a straight chord `(base, dir, len, radius)`. Its
//! badness is a sum of independent penalties; the engine keeps the candidate
//! with the lowest total. Outwardness is measured in the horizontal (XZ)
//! plane, so these terms assume +Y is up.

use std::ops::Range;

use crate::core::types::Vec3;
use crate::math::segment::{nearest_on_polyline, segment_distance};

/// Direction attempts per branch slot
pub const CANDIDATE_COUNT: usize = 12;

/// Samples along a candidate for the trunk intrusion test
const TRUNK_SAMPLES: usize = 8;
/// Floor for the interpolated trunk radius
const MIN_TRUNK_RADIUS: f32 = 0.02;
/// Clearance below which neighbouring tubes are lightly penalized
const CLEARANCE_MARGIN: f32 = 0.05;
/// Closest-point parameters under which two segments count as touching at their bases
const NEAR_BASE: f32 = 0.08;

/// Trunk centerline with a radius per center
#[derive(Debug, Clone, Default)]
pub struct TrunkPath {
    pub centers: Vec<Vec3>,
    pub radii: Vec<f32>,
}

impl TrunkPath {
    pub fn new(centers: Vec<Vec3>, radii: Vec<f32>) -> Self {
        Self { centers, radii }
    }

    /// Nearest centerline point to `p` and the interpolated radius there
    pub fn nearest(&self, p: Vec3) -> Option<(Vec3, f32)> {
        if self.centers.len() < 2 {
            return None;
        }
        let hit = nearest_on_polyline(&self.centers, p);
        let r0 = self.radii.get(hit.segment).copied().unwrap_or(0.0);
        let r1 = self.radii.get(hit.segment + 1).copied().unwrap_or(r0);
        Some((hit.point, r0 + (r1 - r0) * hit.t))
    }
}

/// A straight piece of wood already placed in the tree.
///
/// Trunk chains register one segment per ring span; branches and
/// continuations register their chord.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedSegment {
    pub a: Vec3,
    pub b: Vec3,
    pub radius: f32,
    /// Branch level; 0 for trunk chains
    pub level: u32,
}

/// A branch direction under evaluation
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub base: Vec3,
    /// Unit growth direction
    pub dir: Vec3,
    pub len: f32,
    pub radius: f32,
    /// Unit azimuth of `dir` around the parent axis
    pub perp: Vec3,
}

impl Candidate {
    pub fn end(&self) -> Vec3 {
        self.base + self.dir * self.len
    }
}

/// Everything a candidate is scored against
#[derive(Debug, Clone)]
pub struct ScoreContext<'a> {
    pub trunk: &'a TrunkPath,
    pub placed: &'a [PlacedSegment],
    /// Indices into `placed` of the wood the candidate grows from; ignored
    pub parent_segments: Range<usize>,
    /// Azimuths of branches already accepted at this node
    pub siblings: &'a [Vec3],
    pub up_bias: f32,
}

/// Penalty for entering or grazing the trunk envelope.
///
/// Nine samples along the chord; each measures the horizontal distance to the
/// nearest centerline point against `trunk radius + candidate radius`.
pub fn trunk_path_penalty(trunk: &TrunkPath, base: Vec3, dir: Vec3, len: f32, radius: f32) -> f32 {
    let mut penalty = 0.0;
    for i in 0..=TRUNK_SAMPLES {
        let t = i as f32 / TRUNK_SAMPLES as f32;
        let p = base + dir * (t * len);
        let Some((q, r)) = trunk.nearest(p) else {
            return 0.0;
        };
        let r_at = r.max(MIN_TRUNK_RADIUS);
        let dist_axis = (p.x - q.x).hypot(p.z - q.z);
        let pen = (r_at + radius) - dist_axis;
        if pen > 0.0 {
            penalty += pen * 1000.0;
        } else {
            penalty += -pen * 0.1;
        }
    }
    penalty
}

/// Penalty for interpenetrating or crowding already placed segments.
///
/// Segments in `parent` are skipped; every other segment counts, including
/// the far reaches of the same trunk chain or branch.
pub fn proximity_penalty(placed: &[PlacedSegment], parent: Range<usize>, a: Vec3, b: Vec3, radius: f32) -> f32 {
    let mut penalty = 0.0;
    for (i, seg) in placed.iter().enumerate() {
        if parent.contains(&i) {
            continue;
        }
        let d = segment_distance(a, b, seg.a, seg.b);
        if d.u < NEAR_BASE && d.v < NEAR_BASE {
            continue;
        }
        let clearance = d.dist - (radius + seg.radius);
        if clearance < 0.0 {
            penalty += -clearance * 500.0;
        } else {
            penalty += (CLEARANCE_MARGIN - clearance).max(0.0) * 50.0;
        }
    }
    penalty
}

/// `(1 − max(0, cos θ)) · 2` between the horizontal direction and the
/// horizontal outward vector from the trunk; 10 for near-vertical directions.
pub fn outward_penalty(trunk: &TrunkPath, base: Vec3, dir: Vec3) -> f32 {
    let axis_point = trunk.nearest(base).map_or(Vec3::ZERO, |(q, _)| q);
    let radial = Vec3::new(base.x - axis_point.x, 0.0, base.z - axis_point.z);
    let radial_len = radial.length();
    let radial = if radial_len < 1e-6 { Vec3::X } else { radial / radial_len };

    let dir_xz = Vec3::new(dir.x, 0.0, dir.z);
    let dir_len = dir_xz.length();
    if dir_len < 1e-6 {
        return 10.0;
    }
    let cos = radial.dot(dir_xz / dir_len);
    (1.0 - cos.max(0.0)) * 2.0
}

/// Strong penalty for downward growth, mild for not growing upward.
pub fn up_bias_penalty(dir: Vec3, up_bias: f32) -> f32 {
    let up_bias = up_bias.clamp(0.0, 1.0);
    if up_bias <= 0.0 {
        return 0.0;
    }
    let mut penalty = 0.0;
    if dir.y < 0.0 {
        penalty += -dir.y * 400.0 * up_bias;
    }
    penalty + (1.0 - dir.y.max(0.0)) * 30.0 * up_bias
}

/// Fourth-power penalty on azimuths close to already accepted siblings.
pub fn sibling_penalty(perp: Vec3, siblings: &[Vec3]) -> f32 {
    siblings
        .iter()
        .map(|s| {
            let closeness = (s.dot(perp).clamp(-1.0, 1.0) + 1.0) * 0.5;
            closeness.powi(4) * 40.0
        })
        .sum()
}

/// Total badness of a candidate; lower is better.
pub fn score_candidate(c: &Candidate, ctx: &ScoreContext) -> f32 {
    trunk_path_penalty(ctx.trunk, c.base, c.dir, c.len, c.radius)
        + proximity_penalty(ctx.placed, ctx.parent_segments.clone(), c.base, c.end(), c.radius)
        + outward_penalty(ctx.trunk, c.base, c.dir) * 5.0
        + up_bias_penalty(c.dir, ctx.up_bias)
        + sibling_penalty(c.perp, ctx.siblings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertical_trunk() -> TrunkPath {
        TrunkPath::new(vec![Vec3::ZERO, Vec3::Y * 5.0], vec![0.3, 0.2])
    }

    #[test]
    fn test_branch_into_trunk_is_penalized() {
        let trunk = vertical_trunk();
        let base = Vec3::new(0.3, 2.0, 0.0);
        let outward = trunk_path_penalty(&trunk, base, Vec3::X, 1.0, 0.05);
        let inward = trunk_path_penalty(&trunk, base, Vec3::NEG_X, 1.0, 0.05);
        assert!(inward > outward * 10.0, "inward {} outward {}", inward, outward);
    }

    #[test]
    fn test_trunk_radius_is_interpolated() {
        let trunk = vertical_trunk();
        let (q, r) = trunk.nearest(Vec3::new(1.0, 2.5, 0.0)).unwrap();
        assert!((q - Vec3::Y * 2.5).length() < 1e-6);
        assert!((r - 0.25).abs() < 1e-6);
        assert!(TrunkPath::default().nearest(Vec3::ZERO).is_none());
    }

    #[test]
    fn test_proximity_skips_parent_and_base_contact() {
        let placed = [PlacedSegment { a: Vec3::ZERO, b: Vec3::X, radius: 0.1, level: 1 }];
        // Crossing through the placed segment's middle
        let a = Vec3::new(0.5, -1.0, 0.0);
        let b = Vec3::new(0.5, 1.0, 0.0);
        assert!(proximity_penalty(&placed, 0..0, a, b, 0.1) > 50.0);
        assert_eq!(proximity_penalty(&placed, 0..1, a, b, 0.1), 0.0);

        // Sharing a base point only
        let p = proximity_penalty(&placed, 0..0, Vec3::ZERO, Vec3::new(0.0, 2.0, 0.0), 0.1);
        assert_eq!(p, 0.0);
    }

    #[test]
    fn test_proximity_checks_far_segments_of_parent_chain() {
        // One trunk chain: the span the candidate grows from, and one higher up
        let placed = [
            PlacedSegment { a: Vec3::ZERO, b: Vec3::Y, radius: 0.1, level: 0 },
            PlacedSegment { a: Vec3::Y * 3.0, b: Vec3::Y * 4.0, radius: 0.1, level: 0 },
        ];
        // Leaves the lower span and cuts through the upper one
        let a = Vec3::new(0.3, 0.5, 0.0);
        let b = Vec3::new(-0.1, 4.5, 0.0);
        let own_span_only = proximity_penalty(&placed, 0..1, a, b, 0.05);
        let whole_chain = proximity_penalty(&placed, 0..2, a, b, 0.05);
        assert!((own_span_only - 75.0).abs() < 1e-2, "far segment penalty {}", own_span_only);
        assert_eq!(whole_chain, 0.0);
    }

    #[test]
    fn test_proximity_light_penalty_under_margin() {
        let placed = [PlacedSegment { a: Vec3::ZERO, b: Vec3::X, radius: 0.1, level: 1 }];
        let a = Vec3::new(0.5, 0.23, -1.0);
        let b = Vec3::new(0.5, 0.23, 1.0);
        let p = proximity_penalty(&placed, 0..0, a, b, 0.1);
        assert!((p - 0.02 * 50.0).abs() < 1e-3, "penalty {}", p);
    }

    #[test]
    fn test_outward_penalty() {
        let trunk = vertical_trunk();
        let base = Vec3::new(0.0, 2.0, 0.3);
        assert!(outward_penalty(&trunk, base, Vec3::Z) < 1e-6);
        assert!((outward_penalty(&trunk, base, Vec3::X) - 2.0).abs() < 1e-5);
        assert!((outward_penalty(&trunk, base, Vec3::NEG_Z) - 2.0).abs() < 1e-5);
        assert_eq!(outward_penalty(&trunk, base, Vec3::Y), 10.0);
    }

    #[test]
    fn test_up_bias() {
        assert_eq!(up_bias_penalty(Vec3::NEG_Y, 0.0), 0.0);
        let down = up_bias_penalty(Vec3::NEG_Y, 1.0);
        let flat = up_bias_penalty(Vec3::X, 1.0);
        let up = up_bias_penalty(Vec3::Y, 1.0);
        assert!((down - 430.0).abs() < 1e-4);
        assert!((flat - 30.0).abs() < 1e-4);
        assert_eq!(up, 0.0);
    }

    #[test]
    fn test_sibling_penalty_prefers_spread() {
        let siblings = [Vec3::X];
        let same = sibling_penalty(Vec3::X, &siblings);
        let opposite = sibling_penalty(Vec3::NEG_X, &siblings);
        let side = sibling_penalty(Vec3::Z, &siblings);
        assert!((same - 40.0).abs() < 1e-5);
        assert_eq!(opposite, 0.0);
        assert!((side - 2.5).abs() < 1e-5);
        assert_eq!(sibling_penalty(Vec3::X, &[]), 0.0);
    }

    #[test]
    fn test_score_prefers_outward_candidate() {
        let trunk = vertical_trunk();
        let ctx = ScoreContext { trunk: &trunk, placed: &[], parent_segments: 0..0, siblings: &[], up_bias: 0.0 };
        let base = Vec3::new(0.28, 2.0, 0.0);
        let out = Candidate { base, dir: Vec3::new(1.0, 0.5, 0.0).normalize(), len: 1.0, radius: 0.05, perp: Vec3::X };
        let back = Candidate { base, dir: Vec3::new(-1.0, 0.5, 0.0).normalize(), len: 1.0, radius: 0.05, perp: Vec3::NEG_X };
        assert!(score_candidate(&out, &ctx) < score_candidate(&back, &ctx));
    }
}
