//! Closest-point queries between segments and polylines

use crate::core::types::Vec3;

const EPS_SQ: f32 = 1e-9;

/// Minimum distance between two segments and the parameters of the closest
/// points on each (`u` on the first segment, `v` on the second).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentDistance {
    pub dist: f32,
    pub u: f32,
    pub v: f32,
}

/// Closest points between segments `a0-a1` and `b0-b1`.
///
/// Degenerate (zero-length) segments are handled as points.
pub fn segment_distance(a0: Vec3, a1: Vec3, b0: Vec3, b1: Vec3) -> SegmentDistance {
    let d1 = a1 - a0;
    let d2 = b1 - b0;
    let r = a0 - b0;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    if a <= EPS_SQ && e <= EPS_SQ {
        return SegmentDistance { dist: (a0 - b0).length(), u: 0.0, v: 0.0 };
    }

    let (s, t) = if a <= EPS_SQ {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e <= EPS_SQ {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let mut s = if denom > 0.0 {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };

    let p = a0 + d1 * s;
    let q = b0 + d2 * t;
    SegmentDistance { dist: (p - q).length(), u: s, v: t }
}

/// Nearest point on a polyline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PolylineHit {
    /// Index of the segment `centers[segment]..centers[segment + 1]`
    pub segment: usize,
    /// Parameter along that segment (0..1)
    pub t: f32,
    pub point: Vec3,
}

/// Nearest point on the polyline through `centers` to `p`.
///
/// A single-point polyline returns that point; an empty one returns `p`.
pub fn nearest_on_polyline(centers: &[Vec3], p: Vec3) -> PolylineHit {
    match centers.len() {
        0 => return PolylineHit { segment: 0, t: 0.0, point: p },
        1 => return PolylineHit { segment: 0, t: 0.0, point: centers[0] },
        _ => {}
    }

    let mut best = PolylineHit { segment: 0, t: 0.0, point: centers[0] };
    let mut best_d2 = f32::INFINITY;
    for (i, pair) in centers.windows(2).enumerate() {
        let (a, b) = (pair[0], pair[1]);
        let ab = b - a;
        let ab2 = ab.length_squared();
        let t = if ab2 > 1e-8 {
            ((p - a).dot(ab) / ab2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let q = a + ab * t;
        let d2 = (p - q).length_squared();
        if d2 < best_d2 {
            best_d2 = d2;
            best = PolylineHit { segment: i, t, point: q };
        }
    }
    best
}
