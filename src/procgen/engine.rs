//! Tree growth: trunk chains, recursive branches, continuations and leaves
//!
//! One [`TreeBuilder`] owns every accumulator of a generation call (random
//! stream, unified mesh, placed-segment registry, leaves) and threads them
//! through the recursion by `&mut self`. Traversal is depth-first and
//! leftmost-first; the random stream is consumed in that order, which is
//! what makes a seed reproduce a tree exactly.
//!
//! Growth order:
//! 1. Main trunk tube, then optional sub-trunk chains from its tip.
//! 2. Level-1 branches at every trunk attachment point (each segment top).
//! 3. A crown continuation welded onto every terminal trunk tip.
//!
//! Each branch either grows children along its curve (biased toward the
//! tip) or, at the last level, carries leaves. A branch with fewer than two
//! children near its tip gets a continuation welded ring-to-ring onto its end.

use std::f32::consts::{FRAC_PI_2, TAU};
use std::ops::Range;

use rayon::prelude::*;
use serde::Serialize;

use crate::core::types::Vec3;
use crate::math::rng::Mulberry32;
use crate::math::vector::{normalize_or_y, orthonormal_basis, perpendicular_to, tilt_axis};

use super::curve::{build_branch_curve, build_trunk_curve_along, CatmullRomCurve};
use super::leaves::{euler_from_dir, place_along_leaves, place_end_leaves};
use super::mesh::UnifiedMesh;
use super::params::{GenerationParams, LeafPlacement, TreeMaterials};
use super::primitive::{LeafInstance, MeshPrimitive, Primitive, TrunkSegment};
use super::scoring::{score_candidate, Candidate, PlacedSegment, ScoreContext, TrunkPath, CANDIDATE_COUNT};
use super::tube::{build_tube, Collar, RingOverride, Taper, TubeMeshResult, TubeOptions, MIN_RING_RADIUS, MIN_TAPER_SCALE};

/// Tube rings per logical trunk segment
const RINGS_PER_TRUNK_SEGMENT: u32 = 3;
/// Children beyond this parameter count as sitting at the branch tip
const TIP_CHILD_T: f32 = 0.98;
/// Fewer tip children than this triggers a continuation
const MIN_TIP_CHILDREN: u32 = 2;
/// Continuation length relative to its parent branch
const CONTINUATION_LENGTH: f32 = 0.6;
/// Largest deviation of a continuation from its parent's end tangent, at full randomness
const CONTINUATION_MAX_TILT_DEG: f32 = 12.0;
/// Branch tube rings per meter of length
const BRANCH_RINGS_PER_METER: f32 = 8.0;
/// Collar at the base of sub-trunk chains
const SUB_TRUNK_COLLAR: Collar = Collar { frac: 0.22, scale: 1.25, bulge_extra: 0.0 };

/// Counters of one generation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStats {
    /// Branches placed by direction search
    pub branches: u32,
    /// Welded continuation branches (crown included)
    pub continuations: u32,
    /// Branch slots where every candidate was filtered out
    pub omitted_branches: u32,
    /// Candidates dropped by the height cutoff
    pub skipped_candidates: u32,
    pub sub_trunks: u32,
    pub leaves: u32,
    pub vertices: u32,
    pub triangles: u32,
}

/// A point on existing wood where a branch may grow
#[derive(Debug, Clone)]
struct Site {
    point: Vec3,
    axis: Vec3,
    radius: f32,
    /// Placed segments of the wood under the site, exempt from proximity scoring
    parent: Range<usize>,
    /// Bark V coordinate at the site
    v: f32,
}

#[derive(Debug, Clone)]
struct Attachment {
    site: Site,
    /// Tip of a trunk chain; grows at most one branch
    apex: bool,
}

struct ChainSpec {
    base: Vec3,
    axis: Vec3,
    height: f32,
    radius: f32,
    segments: u32,
    collar: Option<Collar>,
    v_start: f32,
    /// No sub-trunks grow from this chain
    terminal: bool,
}

struct Chain {
    tube: TubeMeshResult,
    height: f32,
    segments: u32,
    /// Tip is left open for a welded crown continuation
    crown: bool,
}

struct BranchSpec {
    points: Vec<Vec3>,
    radius: f32,
    /// Visible chord length
    length: f32,
    level: u32,
    /// Index of the branch chord in the placed registry
    segment: usize,
    radial: u32,
    collar: Option<Collar>,
    start_ring: Option<RingOverride>,
    ref_normal: Option<Vec3>,
    v_start: f32,
}

/// Arena for one tree generation call
pub struct TreeBuilder {
    params: GenerationParams,
    materials: TreeMaterials,
    rng: Mulberry32,
    mesh: UnifiedMesh,
    placed: Vec<PlacedSegment>,
    trunk_path: TrunkPath,
    attachments: Vec<Attachment>,
    leaves: Vec<LeafInstance>,
    trunk_segments: Vec<TrunkSegment>,
    stats: GenerationStats,
}

impl TreeBuilder {
    /// Create a builder over a clamped copy of `params`
    pub fn new(params: &GenerationParams, materials: &TreeMaterials) -> Self {
        let params = params.clamped();
        Self {
            rng: Mulberry32::new(params.seed),
            params,
            materials: materials.clone(),
            mesh: UnifiedMesh::new(),
            placed: Vec::new(),
            trunk_path: TrunkPath::default(),
            attachments: Vec::new(),
            leaves: Vec::new(),
            trunk_segments: Vec::new(),
            stats: GenerationStats::default(),
        }
    }

    /// Grow the whole tree and hand out its primitives
    pub fn build(mut self) -> (Vec<Primitive>, GenerationStats) {
        self.grow();
        self.finish()
    }

    fn grow(&mut self) {
        let p = self.params.clone();

        let main = self.build_chain(ChainSpec {
            base: Vec3::ZERO,
            axis: Vec3::Y,
            height: p.trunk_height,
            radius: p.trunk_radius,
            segments: p.trunk_segments,
            collar: None,
            v_start: 0.0,
            terminal: p.trunk_branch_levels == 0,
        });
        self.trunk_path = TrunkPath::new(main.tube.ring_centers.clone(), main.tube.ring_radii.clone());

        let seg_h = p.trunk_height / p.trunk_segments.max(1) as f32;
        let mut level_chains = vec![main];
        for lvl in 0..p.trunk_branch_levels {
            let terminal = lvl + 1 == p.trunk_branch_levels;
            let mut next = Vec::with_capacity(level_chains.len() * p.trunk_branches_per_level as usize);
            for node in &level_chains {
                self.grow_sub_trunks(node, seg_h, terminal, &mut next);
            }
            level_chains = next;
        }

        if p.branch_levels == 0 {
            return;
        }

        self.grow_trunk_branches();

        for chain in &level_chains {
            if chain.crown {
                let length = p.branch_length;
                self.grow_continuation(&chain.tube, p.trunk_radial_segments, length, 1);
            }
        }
    }

    fn finish(self) -> (Vec<Primitive>, GenerationStats) {
        let mut stats = self.stats;
        stats.leaves = self.leaves.len() as u32;
        stats.vertices = self.mesh.vertex_count() as u32;
        stats.triangles = self.mesh.triangle_count() as u32;

        log::debug!(
            "Generated tree seed={}: {} branches, {} continuations, {} leaves, {} vertices, {} triangles",
            self.params.seed,
            stats.branches,
            stats.continuations,
            stats.leaves,
            stats.vertices,
            stats.triangles
        );

        let mut primitives = Vec::with_capacity(self.trunk_segments.len() + 1 + self.leaves.len());
        primitives.extend(self.trunk_segments.into_iter().map(Primitive::Trunk));
        let bounds = self.mesh.bounds();
        primitives.push(Primitive::Mesh(MeshPrimitive {
            mesh: self.mesh,
            bounds,
            material: self.materials.bark.clone(),
        }));
        primitives.extend(self.leaves.into_iter().map(Primitive::Leaf));
        (primitives, stats)
    }

    // --- Trunk ---

    /// One continuous trunk tube with an attachment point per segment top.
    fn build_chain(&mut self, spec: ChainSpec) -> Chain {
        let p = &self.params;
        let segments = spec.segments.max(1);
        let points = build_trunk_curve_along(
            spec.base,
            spec.axis,
            spec.height,
            p.trunk_shear_strength,
            &mut self.rng,
            p.randomness,
        );
        let curve = CatmullRomCurve::new(points);
        let tubular = segments * RINGS_PER_TRUNK_SEGMENT;
        let crown = spec.terminal && p.branch_levels >= 1 && curve.point(1.0).y >= p.branch_height_cutoff;

        let opts = TubeOptions {
            tubular_segments: tubular,
            radial_segments: p.trunk_radial_segments,
            taper: Taper::Linear(p.trunk_taper_factor),
            collar: spec.collar,
            cap_start: true,
            cap_end: !crown,
            v_start: spec.v_start,
            v_scale: curve.length(tubular) * p.bark_tex_density_per_meter,
            ..Default::default()
        };
        let tube = build_tube(curve.points(), spec.radius, &opts);
        let emit_segments = p.emit_segment_primitives;
        let radial = p.trunk_radial_segments;

        let first = self.placed.len();
        for (pair, radii) in tube.ring_centers.windows(2).zip(tube.ring_radii.windows(2)) {
            self.placed.push(PlacedSegment {
                a: pair[0],
                b: pair[1],
                radius: radii[0].max(radii[1]),
                level: 0,
            });
        }

        let stride = radial as usize + 1;
        let per_segment = RINGS_PER_TRUNK_SEGMENT as usize;
        for i in 0..segments {
            let ring = (i as usize + 1) * per_segment;
            let t = (i + 1) as f32 / segments as f32;
            // The logical trunk segments meeting at the attachment ring
            let parent = first + ring - per_segment..first + (ring + per_segment).min(tubular as usize);
            self.attachments.push(Attachment {
                site: Site {
                    point: tube.ring_centers[ring],
                    axis: curve.tangent(t),
                    radius: tube.ring_radii[ring],
                    parent,
                    v: tube.uvs[ring * stride].y,
                },
                apex: i + 1 == segments,
            });
        }

        if emit_segments {
            for i in 0..segments {
                let lo = (i * RINGS_PER_TRUNK_SEGMENT) as usize;
                let hi = ((i + 1) * RINGS_PER_TRUNK_SEGMENT) as usize;
                let (a, b) = (tube.ring_centers[lo], tube.ring_centers[hi]);
                self.trunk_segments.push(TrunkSegment {
                    center: (a + b) * 0.5,
                    rotation: euler_from_dir(b - a),
                    radius_bottom: tube.ring_radii[lo],
                    radius_top: tube.ring_radii[hi],
                    height: a.distance(b),
                    radial_segments: radial,
                    cap_bottom: i == 0,
                    cap_top: i + 1 == segments,
                    material: self.materials.bark.clone(),
                });
            }
        }

        self.mesh.append(&tube);
        log::trace!("Trunk chain at #{}: {} segments, height {:.2}, crown={}", first, segments, spec.height, crown);
        Chain { tube, height: spec.height, segments, crown }
    }

    /// Child trunks spread around the tip of `node`.
    fn grow_sub_trunks(&mut self, node: &Chain, seg_h: f32, terminal: bool, out: &mut Vec<Chain>) {
        let p = self.params.clone();
        let rnd = p.randomness;
        let axis = normalize_or_y(node.tube.end_tangent);
        let tilt = p.trunk_branch_angle_deg.to_radians();
        let factor = p.trunk_branch_child_height_factor;
        let per_level = p.trunk_branches_per_level.max(1);
        let step = TAU / per_level as f32;

        let phase = self.rng.angle();
        for k in 0..per_level {
            let jitter = step * 0.25 * self.rng.signed() * rnd;
            let theta = phase + step * k as f32 + jitter;
            let alpha = (tilt * (1.0 + 0.3 * self.rng.signed() * rnd)).clamp(0.0, FRAC_PI_2 - 0.05);
            let child_axis = tilt_axis(axis, alpha, theta);

            let height = (node.height * factor * (1.0 + 0.25 * self.rng.signed() * rnd))
                .clamp(node.height * 0.3, node.height);
            let radius = node.tube.end_radius.max(0.02);
            let base_segments = (node.segments as f32 * factor).round() as i64;
            let seg_jitter = if self.rng.next_f32() < 0.5 { -1 } else { 1 };
            let jittered = if self.rng.next_f32() < rnd { seg_jitter } else { 0 };
            let segments = (base_segments + jittered).max(2) as u32;

            // Sink the root into the parent tip so the joint stays closed
            let embed = (radius * 0.35).min(seg_h * 0.6);
            let chain = self.build_chain(ChainSpec {
                base: node.tube.end_point - child_axis * embed,
                axis: child_axis,
                height: height + embed,
                radius,
                segments,
                collar: Some(SUB_TRUNK_COLLAR),
                v_start: node.tube.end_v(),
                terminal,
            });
            self.stats.sub_trunks += 1;
            out.push(chain);
        }
    }

    /// Level-1 branches at every trunk attachment, weighted toward the top.
    fn grow_trunk_branches(&mut self) {
        let attachments = std::mem::take(&mut self.attachments);
        let (min_y, max_y) = attachments
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), a| {
                (lo.min(a.site.point.y), hi.max(a.site.point.y))
            });
        let span = (max_y - min_y).max(1e-4);
        let bias = self.params.branch_top_bias;

        for attachment in &attachments {
            let h01 = (attachment.site.point.y - min_y) / span;
            let weight = (1.0 - bias) + bias * h01 * h01;
            self.grow_at_attachment(attachment, weight);
        }
    }

    fn grow_at_attachment(&mut self, attachment: &Attachment, count_scale: f32) {
        if attachment.site.point.y < self.params.branch_height_cutoff {
            log::trace!("Attachment at y={:.2} below cutoff", attachment.site.point.y);
            return;
        }
        let mut count = self.branch_count(count_scale);
        if attachment.apex {
            count = count.min(1);
        }
        let mut siblings = Vec::with_capacity(count as usize);
        for _ in 0..count {
            self.grow_branch(&attachment.site, 1, &mut siblings);
        }
    }

    // --- Branches ---

    /// `round(mean · scale ± jitter)`, never negative
    fn branch_count(&mut self, scale: f32) -> u32 {
        let mean = self.params.branches_per_segment * scale.max(0.0);
        let jitter = (self.rng.next_f32() - 0.5) * 2.0 * self.params.branch_count_jitter;
        (mean + jitter).round().max(0.0) as u32
    }

    fn radial_for_level(&self, level: u32) -> u32 {
        self.params
            .branch_radial_segments
            .saturating_sub(2 * level.saturating_sub(1))
            .max(3)
    }

    /// Best of [`CANDIDATE_COUNT`] random directions around `site.axis`.
    fn search_direction(&mut self, site: &Site, level: u32, siblings: &[Vec3]) -> Option<Candidate> {
        let p = &self.params;
        let axis = normalize_or_y(site.axis);
        let base_deg = p.branch_angle_for_level(level);
        let jitter = p.branch_length_jitter;
        let depth = level.saturating_sub(1) as i32;
        let radius = (p.branch_radius * p.branch_radius_falloff.powi(depth))
            .min(site.radius * 0.9)
            .max(0.01);
        let eps_inside = (site.radius * 0.03).max(0.001);

        let mut best: Option<(f32, Candidate)> = None;
        for _ in 0..CANDIDATE_COUNT {
            let alpha = (base_deg + self.rng.signed() * p.angle_spread * 0.5 * base_deg).to_radians();
            let theta = self.rng.angle();
            let dir = tilt_axis(axis, alpha, theta);
            let perp = perpendicular_to(dir, axis).unwrap_or_else(|| orthonormal_basis(axis).0);
            let len = p.branch_length * 0.75f32.powi(depth) * (1.0 - 0.3 * jitter + 0.6 * jitter * self.rng.next_f32());
            let base = site.point + perp * (site.radius - eps_inside);
            if base.y < p.branch_height_cutoff {
                self.stats.skipped_candidates += 1;
                continue;
            }

            let candidate = Candidate { base, dir, len, radius, perp };
            let ctx = ScoreContext {
                trunk: &self.trunk_path,
                placed: &self.placed,
                parent_segments: site.parent.clone(),
                siblings,
                up_bias: p.branch_up_bias,
            };
            let score = score_candidate(&candidate, &ctx);
            if best.is_none_or(|(s, _)| score < s) {
                best = Some((score, candidate));
            }
        }
        best.map(|(_, c)| c)
    }

    /// Place one branch at `site`; false when no candidate survived.
    fn grow_branch(&mut self, site: &Site, level: u32, siblings: &mut Vec<Vec3>) -> bool {
        let Some(best) = self.search_direction(site, level, siblings) else {
            self.stats.omitted_branches += 1;
            return false;
        };
        siblings.push(best.perp);

        let p = &self.params;
        let axis = normalize_or_y(site.axis);
        let dot = best.dir.dot(axis);
        let sin = (1.0 - dot * dot).max(0.0).sqrt().max(1e-4);
        let embed_min = best.radius * dot.abs() / sin + 1e-3;
        let embed_base = p.embed_factor * site.radius.min(best.radius);
        let embed = embed_base.max(embed_min).min(site.radius * 0.9);
        let collar = (p.branch_collar_size > 0.0 && p.branch_collar_frac > 0.0).then(|| Collar {
            frac: p.branch_collar_frac,
            scale: 1.0 + p.branch_collar_size,
            bulge_extra: 0.25 * p.branch_collar_size,
        });
        let (bend, bend_jitter) = (p.branch_bend_base, p.branch_bend_jitter);

        let start = best.base - best.dir * embed;
        let points = build_branch_curve(start, best.dir, best.len + embed, &mut self.rng, bend, bend_jitter);

        let segment = self.placed.len();
        self.placed.push(PlacedSegment {
            a: best.base,
            b: best.end(),
            radius: best.radius,
            level,
        });
        self.stats.branches += 1;
        log::trace!(
            "Branch #{} L{} at {:?} dir {:?} len {:.2} r {:.3}",
            segment, level, best.base, best.dir, best.len, best.radius
        );

        let radial = self.radial_for_level(level);
        self.finish_branch(BranchSpec {
            points,
            radius: best.radius,
            length: best.len,
            level,
            segment,
            radial,
            collar,
            start_ring: None,
            ref_normal: None,
            v_start: site.v,
        });
        true
    }

    /// Mesh a branch after growing what hangs off it.
    ///
    /// The tube is built open-ended; it gets its end cap only when no
    /// continuation was welded onto it.
    fn finish_branch(&mut self, spec: BranchSpec) {
        let curve = CatmullRomCurve::new(spec.points.clone());
        let tubular = ((spec.length * BRANCH_RINGS_PER_METER).round() as u32).clamp(4, 24);
        let opts = TubeOptions {
            tubular_segments: tubular,
            radial_segments: spec.radial,
            taper: Taper::Linear(self.params.branch_tip_taper),
            collar: spec.collar,
            cap_start: spec.start_ring.is_none(),
            cap_end: false,
            start_ring: spec.start_ring.clone(),
            v_start: spec.v_start,
            v_scale: curve.length(tubular) * self.params.bark_tex_density_per_meter,
            ref_normal: spec.ref_normal,
            ..Default::default()
        };
        let mut tube = build_tube(curve.points(), spec.radius, &opts);

        let continued = if spec.level < self.params.branch_levels {
            let tip_children = self.grow_children(&curve, &spec, opts.v_start, opts.v_scale);
            tip_children < MIN_TIP_CHILDREN
                && self.grow_continuation(&tube, spec.radial, spec.length * CONTINUATION_LENGTH, spec.level + 1)
        } else {
            self.place_leaves(&curve, &spec, &tube);
            false
        };

        if !continued {
            tube.close_end();
        }
        self.mesh.append(&tube);
    }

    /// Next-level branches along `curve`; returns how many landed at the tip.
    fn grow_children(&mut self, curve: &CatmullRomCurve, spec: &BranchSpec, v_start: f32, v_scale: f32) -> u32 {
        let count = self.branch_count(1.0);
        let avoid = self.params.branch_child_avoid_base_frac;
        let exponent = 1.0 / (1.0 + 2.0 * self.params.branch_child_tip_bias);
        let tip_taper = self.params.branch_tip_taper;
        let cutoff = self.params.branch_height_cutoff;

        let mut siblings = Vec::with_capacity(count as usize);
        let mut tip_children = 0;
        for _ in 0..count {
            let u = self.rng.next_f32();
            let t = avoid + (1.0 - avoid) * u.powf(exponent);
            let site = Site {
                point: curve.point(t),
                axis: curve.tangent(t),
                radius: branch_radius_at(spec.radius, tip_taper, t),
                parent: spec.segment..spec.segment + 1,
                v: v_start + t * v_scale,
            };
            if site.point.y < cutoff {
                continue;
            }
            if self.grow_branch(&site, spec.level + 1, &mut siblings) && t > TIP_CHILD_T {
                tip_children += 1;
            }
        }
        tip_children
    }

    /// Weld a branch onto the end ring of `parent`.
    ///
    /// Follows the parent's end tangent with a small random tilt and keeps its
    /// ring resolution so the first ring can be copied verbatim.
    fn grow_continuation(&mut self, parent: &TubeMeshResult, radial: u32, length: f32, level: u32) -> bool {
        let base = parent.end_point;
        if base.y < self.params.branch_height_cutoff {
            return false;
        }
        let p = &self.params;
        let tangent = normalize_or_y(parent.end_tangent);
        let theta = self.rng.angle();
        let alpha = CONTINUATION_MAX_TILT_DEG.to_radians() * p.randomness * self.rng.next_f32();
        let dir = tilt_axis(tangent, alpha, theta);
        let (bend, bend_jitter) = (p.branch_bend_base, p.branch_bend_jitter);
        let points = build_branch_curve(base, dir, length, &mut self.rng, bend, bend_jitter);

        let segment = self.placed.len();
        self.placed.push(PlacedSegment {
            a: base,
            b: base + dir * length,
            radius: parent.end_radius,
            level,
        });
        self.stats.continuations += 1;
        log::trace!("Continuation #{} L{} at {:?} len {:.2}", segment, level, base, length);

        self.finish_branch(BranchSpec {
            points,
            radius: parent.end_radius,
            length,
            level,
            segment,
            radial,
            collar: None,
            start_ring: Some(parent.end_ring()),
            ref_normal: parent.end_ring_positions.first().map(|v| *v - parent.end_point),
            v_start: parent.end_v(),
        });
        true
    }

    fn place_leaves(&mut self, curve: &CatmullRomCurve, spec: &BranchSpec, tube: &TubeMeshResult) {
        let leaves = match self.params.leaf_placement {
            LeafPlacement::End => place_end_leaves(
                &self.params,
                tube.end_point,
                tube.end_tangent,
                tube.end_radius,
                &self.materials.leaf,
                &mut self.rng,
            ),
            LeafPlacement::Along => {
                let (radius, tip_taper) = (spec.radius, self.params.branch_tip_taper);
                place_along_leaves(
                    &self.params,
                    curve,
                    spec.length,
                    |t| branch_radius_at(radius, tip_taper, t),
                    &self.materials.leaf,
                    &mut self.rng,
                )
            }
        };
        self.leaves.extend(leaves);
    }
}

/// Ring radius of a branch tube at `t`, ignoring the collar
fn branch_radius_at(radius: f32, tip_taper: f32, t: f32) -> f32 {
    (radius * (1.0 - tip_taper * t).max(MIN_TAPER_SCALE)).max(MIN_RING_RADIUS)
}

/// Generate one tree: a unified bark mesh followed by leaf primitives.
///
/// Parameters are clamped first; the call never fails.
pub fn generate_tree(params: &GenerationParams, materials: &TreeMaterials) -> Vec<Primitive> {
    TreeBuilder::new(params, materials).build().0
}

/// [`generate_tree`] plus run counters
pub fn generate_tree_with_stats(params: &GenerationParams, materials: &TreeMaterials) -> (Vec<Primitive>, GenerationStats) {
    TreeBuilder::new(params, materials).build()
}

/// One tree per seed, generated in parallel; results follow `seeds` order.
pub fn generate_batch(params: &GenerationParams, seeds: &[u32], materials: &TreeMaterials) -> Vec<Vec<Primitive>> {
    generate_batch_with_stats(params, seeds, materials)
        .into_iter()
        .map(|(primitives, _)| primitives)
        .collect()
}

/// [`generate_batch`] keeping each tree's run counters
pub fn generate_batch_with_stats(
    params: &GenerationParams,
    seeds: &[u32],
    materials: &TreeMaterials,
) -> Vec<(Vec<Primitive>, GenerationStats)> {
    seeds
        .par_iter()
        .map(|&seed| generate_tree_with_stats(&params.clone().with_seed(seed), materials))
        .collect()
}
