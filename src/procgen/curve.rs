//! Control-point curves for trunks and branches
//!
//! Trunk and branch shapes are described by four control points and
//! interpolated with a centripetal Catmull-Rom spline. The builders draw from
//! the shared generation stream in a fixed order, so the same stream state
//! always yields the same curve.

use crate::core::types::Vec3;
use crate::math::rng::Mulberry32;
use crate::math::vector::{normalize_or_y, orthonormal_basis};

/// Below this knot spacing a span is treated as degenerate.
const MIN_KNOT_DT: f32 = 1e-4;
/// Parameter step for finite-difference tangents.
const TANGENT_DELTA: f32 = 1e-4;

/// Open centripetal Catmull-Rom spline through its control points.
///
/// The curve is parameterized by `t` in [0, 1], with equal parameter range per
/// span. End tangents use reflected phantom points (`2·p0 − p1`).
#[derive(Debug, Clone)]
pub struct CatmullRomCurve {
    points: Vec<Vec3>,
}

impl CatmullRomCurve {
    pub fn new(points: Vec<Vec3>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Position at parameter `t` (clamped to [0, 1]).
    pub fn point(&self, t: f32) -> Vec3 {
        let n = self.points.len();
        match n {
            0 => return Vec3::ZERO,
            1 => return self.points[0],
            _ => {}
        }

        let p = (n - 1) as f32 * t.clamp(0.0, 1.0);
        let mut span = p.floor() as usize;
        let mut weight = p - span as f32;
        if span >= n - 1 {
            span = n - 2;
            weight = 1.0;
        }

        let p1 = self.points[span];
        let p2 = self.points[span + 1];
        let p0 = if span > 0 {
            self.points[span - 1]
        } else {
            p1 * 2.0 - p2
        };
        let p3 = if span + 2 < n {
            self.points[span + 2]
        } else {
            p2 * 2.0 - p1
        };

        // Centripetal knot spacing: |Δ|^0.5, i.e. (|Δ|²)^0.25
        let mut dt0 = p0.distance_squared(p1).powf(0.25);
        let mut dt1 = p1.distance_squared(p2).powf(0.25);
        let mut dt2 = p2.distance_squared(p3).powf(0.25);
        if dt1 < MIN_KNOT_DT {
            dt1 = 1.0;
        }
        if dt0 < MIN_KNOT_DT {
            dt0 = dt1;
        }
        if dt2 < MIN_KNOT_DT {
            dt2 = dt1;
        }

        let m1 = ((p1 - p0) / dt0 - (p2 - p0) / (dt0 + dt1) + (p2 - p1) / dt1) * dt1;
        let m2 = ((p2 - p1) / dt1 - (p3 - p1) / (dt1 + dt2) + (p3 - p2) / dt2) * dt1;
        hermite(p1, p2, m1, m2, weight)
    }

    /// Unit tangent at `t` by central finite difference.
    ///
    /// Zero-length curves report +Y.
    pub fn tangent(&self, t: f32) -> Vec3 {
        let t0 = (t - TANGENT_DELTA).max(0.0);
        let t1 = (t + TANGENT_DELTA).min(1.0);
        normalize_or_y(self.point(t1) - self.point(t0))
    }

    /// Polyline length over `divisions` equal parameter steps.
    pub fn length(&self, divisions: u32) -> f32 {
        let divisions = divisions.max(1);
        let mut prev = self.point(0.0);
        let mut total = 0.0;
        for i in 1..=divisions {
            let p = self.point(i as f32 / divisions as f32);
            total += prev.distance(p);
            prev = p;
        }
        total
    }
}

#[inline]
fn hermite(p1: Vec3, p2: Vec3, m1: Vec3, m2: Vec3, t: f32) -> Vec3 {
    let c2 = p1 * -3.0 + p2 * 3.0 - m1 * 2.0 - m2;
    let c3 = p1 * 2.0 - p2 * 2.0 + m1 + m2;
    p1 + m1 * t + c2 * (t * t) + c3 * (t * t * t)
}

/// Main trunk control points rising from the origin along +Y.
pub fn build_trunk_curve(height: f32, shear_strength: f32, rng: &mut Mulberry32, randomness: f32) -> Vec<Vec3> {
    build_trunk_curve_along(Vec3::ZERO, Vec3::Y, height, shear_strength, rng, randomness)
}

/// Trunk control points rising from `base` along `axis`.
///
/// One azimuth is drawn first, so the whole trunk leans coherently toward a
/// single side instead of wobbling per control point. Draw order: azimuth,
/// then two values per control point.
pub fn build_trunk_curve_along(
    base: Vec3,
    axis: Vec3,
    height: f32,
    shear_strength: f32,
    rng: &mut Mulberry32,
    randomness: f32,
) -> Vec<Vec3> {
    let shear = shear_strength.clamp(0.0, 1.0);
    let rnd = randomness.clamp(0.0, 1.0);
    let axis = normalize_or_y(axis);
    let (o1, o2) = orthonormal_basis(axis);

    let phi = rng.angle();
    let side = o1 * phi.cos() + o2 * phi.sin();
    let side2 = o2 * phi.cos() - o1 * phi.sin();
    let amp = height * (0.04 + 0.08 * shear) * (0.7 + 0.6 * rnd);

    let mut jitter = |k: f32| {
        let along = amp * k * (0.6 + 0.8 * (rng.next_f32() - 0.5));
        let across = amp * k * (rng.next_f32() - 0.5) * 0.5;
        side * along + side2 * across
    };

    let p1 = base + axis * (height * 0.33) + jitter(0.4);
    let p2 = base + axis * (height * 0.66) + jitter(0.6);
    let p3 = base + axis * height + jitter(0.3);
    vec![base, p1, p2, p3]
}

/// Branch control points starting at `base` and advancing along `direction`.
///
/// Points sit at 0.32, 0.66 and 1.0 of `length`. Each gets a −Y droop that
/// grows as the direction flattens and a lateral jitter perpendicular to it.
pub fn build_branch_curve(
    base: Vec3,
    direction: Vec3,
    length: f32,
    rng: &mut Mulberry32,
    bend_base: f32,
    bend_jitter: f32,
) -> Vec<Vec3> {
    let axis = normalize_or_y(direction);
    let (o1, o2) = orthonormal_basis(axis);

    let up = axis.y.clamp(0.0, 1.0);
    let bend = bend_base.clamp(0.0, 1.0);
    let droop = (1.0 - up) * 0.12 * (0.2 + 1.8 * bend);
    let jitter_level = bend_jitter.clamp(0.0, 1.0);
    let lateral_amp = 0.04 * length * (0.2 + 1.8 * jitter_level);

    let mut point_at = |frac: f32, droop_min: f32, droop_span: f32, amp_k: f32| {
        let sag = droop * length * (droop_min + droop_span * jitter_level * rng.next_f32());
        let amp = lateral_amp * amp_k;
        let a = rng.signed() * amp;
        let b = rng.signed() * amp;
        base + axis * (frac * length) - Vec3::Y * sag + o1 * a + o2 * b
    };

    let p1 = point_at(0.32, 0.25, 0.5, 0.25);
    let p2 = point_at(0.66, 0.55, 0.7, 0.5);
    let p3 = point_at(1.0, 0.85, 0.3, 0.3);
    vec![base, p1, p2, p3]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_passes_through_control_points() {
        let pts = vec![
            Vec3::ZERO,
            Vec3::new(0.2, 1.0, 0.0),
            Vec3::new(0.1, 2.0, 0.3),
            Vec3::new(0.0, 3.0, 0.0),
        ];
        let curve = CatmullRomCurve::new(pts.clone());
        for (i, p) in pts.iter().enumerate() {
            let t = i as f32 / 3.0;
            assert!((curve.point(t) - *p).length() < 1e-4, "point {} off curve", i);
        }
    }

    #[test]
    fn test_straight_line_tangent() {
        let curve = CatmullRomCurve::new(vec![Vec3::ZERO, Vec3::Y, Vec3::Y * 2.0, Vec3::Y * 3.0]);
        for t in [0.0, 0.3, 0.5, 1.0] {
            assert!((curve.tangent(t) - Vec3::Y).length() < 1e-3);
        }
        assert!((curve.length(64) - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_degenerate_curves_do_not_panic() {
        let empty = CatmullRomCurve::new(Vec::new());
        assert_eq!(empty.point(0.5), Vec3::ZERO);

        let single = CatmullRomCurve::new(vec![Vec3::X]);
        assert_eq!(single.point(0.7), Vec3::X);
        assert_eq!(single.tangent(0.7), Vec3::Y);

        let collapsed = CatmullRomCurve::new(vec![Vec3::ONE; 4]);
        let p = collapsed.point(0.4);
        assert!(p.is_finite());
        assert!((p - Vec3::ONE).length() < 1e-5);
    }

    #[test]
    fn test_trunk_curve_shape() {
        let mut rng = Mulberry32::new(3);
        let pts = build_trunk_curve(5.0, 0.0, &mut rng, 0.3);
        assert_eq!(pts.len(), 4);
        assert_eq!(pts[0], Vec3::ZERO);
        assert!(pts[1].y < pts[2].y && pts[2].y < pts[3].y);
        assert!((pts[3].y - 5.0).abs() < 1e-4);
        // Lateral offset bounded by the amplitude
        let amp = 5.0 * 0.04 * (0.7 + 0.6 * 0.3);
        for p in &pts[1..] {
            assert!(Vec3::new(p.x, 0.0, p.z).length() <= amp);
        }
    }

    #[test]
    fn test_trunk_curve_draws_seven_values() {
        let mut a = Mulberry32::new(11);
        let mut b = Mulberry32::new(11);
        build_trunk_curve(4.0, 0.5, &mut a, 0.5);
        for _ in 0..7 {
            b.next_u32();
        }
        assert_eq!(a.next_u32(), b.next_u32());
    }

    #[test]
    fn test_branch_curve_starts_at_base_and_droops() {
        let mut rng = Mulberry32::new(8);
        let base = Vec3::new(0.0, 2.0, 0.0);
        let pts = build_branch_curve(base, Vec3::X, 1.0, &mut rng, 1.0, 0.0);
        assert_eq!(pts[0], base);
        // Horizontal branch with full bend droops below its base height
        assert!(pts[3].y < base.y);
        assert!((pts[3].x - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_vertical_branch_has_no_droop() {
        let mut rng = Mulberry32::new(8);
        let pts = build_branch_curve(Vec3::ZERO, Vec3::Y, 2.0, &mut rng, 1.0, 0.0);
        assert!((pts[3].y - 2.0).abs() < 1e-5);
        assert!(pts.iter().all(|p| p.is_finite()));
    }
}
