//! Generation parameters, presets and their clamping table
//!
//! Field names serialize in camelCase so parameter exports from the editor
//! load directly. Every field has a default, so any subset of keys is a
//! valid parameter file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;

/// Leaf geometry drawn by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeafShape {
    #[default]
    Billboard,
    Sphere,
    /// Flat textured sprite; oriented against the branch surface
    Texture,
}

/// Where leaves go on a terminal branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeafPlacement {
    /// Clustered around the tip ring
    #[default]
    End,
    /// Distributed along the distal part at a density per meter
    Along,
}

/// Global in-plane rotation bias for textured leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeafTiltMode {
    #[default]
    None,
    /// Perk toward +Y
    Up,
    /// Droop toward -Y
    Down,
}

/// Tree visual style presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TreeStyle {
    #[default]
    Broadleaf,
    Willow,
    Sapling,
    /// Winter variant: branches with no leaves
    Bare,
}

/// Opaque material identifiers attached to emitted primitives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeMaterials {
    pub bark: String,
    pub leaf: String,
}

impl Default for TreeMaterials {
    fn default() -> Self {
        Self {
            bark: "bark".to_string(),
            leaf: "leaves".to_string(),
        }
    }
}

/// Parameters for one tree generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationParams {
    pub seed: u32,

    // --- Trunk ---
    /// Trunk height in meters
    pub trunk_height: f32,
    /// Trunk radius at the base
    pub trunk_radius: f32,
    /// Logical trunk segments; each segment top is a branch attachment point
    pub trunk_segments: u32,
    /// Linear taper: radius at the top is `1 - factor` of the base
    pub trunk_taper_factor: f32,
    /// Lateral bend of the trunk curve (0..1)
    pub trunk_shear_strength: f32,
    /// Ring resolution of trunk tubes
    pub trunk_radial_segments: u32,

    // --- Trunk sub-branching (multi-trunk trees) ---
    pub trunk_branch_levels: u32,
    pub trunk_branches_per_level: u32,
    pub trunk_branch_angle_deg: f32,
    /// Child trunk height relative to its parent
    pub trunk_branch_child_height_factor: f32,

    // --- Branches ---
    /// Recursion depth; leaves grow on level `branch_levels`
    pub branch_levels: u32,
    /// Mean branch count per attachment point
    pub branches_per_segment: f32,
    pub branch_count_jitter: f32,
    /// Concentrates trunk branches toward the top (0 = uniform)
    pub branch_top_bias: f32,
    /// Penalizes downward growth during direction search
    pub branch_up_bias: f32,
    /// Biases child attachment toward the parent's tip
    pub branch_child_tip_bias: f32,
    /// Fraction of a parent branch near its base where children never attach
    pub branch_child_avoid_base_frac: f32,
    pub branch_length: f32,
    pub branch_length_jitter: f32,
    pub branch_radius: f32,
    /// Radius multiplier per level
    pub branch_radius_falloff: f32,
    pub branch_angle_deg: f32,
    /// Angle for level 1, falls back to `branch_angle_deg`
    pub branch_angle_deg_first: Option<f32>,
    /// Angle for deeper levels, falls back to `branch_angle_deg`
    pub branch_angle_deg_next: Option<f32>,
    /// Random spread of the branch angle (0..1)
    pub angle_spread: f32,
    /// General randomness of trunk shape and counts (0..1)
    pub randomness: f32,
    /// Linear taper of branch tubes
    pub branch_tip_taper: f32,
    pub branch_bend_base: f32,
    pub branch_bend_jitter: f32,
    /// Extra base radius of branch collars (0 = none)
    pub branch_collar_size: f32,
    /// Fraction of the branch length covered by the collar
    pub branch_collar_frac: f32,
    /// How deep branch bases sink into the parent (0..1 of the smaller radius)
    pub embed_factor: f32,
    /// Attachment points below this height grow no branches
    pub branch_height_cutoff: f32,
    /// Ring resolution of level-1 branch tubes; deeper levels may use fewer
    pub branch_radial_segments: u32,

    // --- Leaves ---
    pub leaves_per_branch: u32,
    pub leaves_per_meter: f32,
    pub leaf_size: f32,
    pub leaf_shape: LeafShape,
    pub leaf_placement: LeafPlacement,
    /// Tilt of textured leaves from the radial direction toward the branch tangent
    pub leaf_tilt_deg: f32,
    pub leaf_global_tilt_mode: LeafTiltMode,
    pub leaf_global_tilt_level: f32,
    pub leaf_texture_sprite_name: Option<String>,
    pub use_all_leaf_sprites: bool,
    pub leaf_sprite_names: Vec<String>,
    /// UV repeat written onto leaf instances
    pub leaf_uv_scale: f32,

    // --- Bark UV ---
    /// Bark texture repeats per meter along the wood
    pub bark_tex_density_per_meter: f32,

    /// Also emit a cylinder primitive per trunk chain link
    pub emit_segment_primitives: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            seed: 12345,
            trunk_height: 5.0,
            trunk_radius: 0.25,
            trunk_segments: 6,
            trunk_taper_factor: 0.4,
            trunk_shear_strength: 0.0,
            trunk_radial_segments: 18,
            trunk_branch_levels: 0,
            trunk_branches_per_level: 2,
            trunk_branch_angle_deg: 20.0,
            trunk_branch_child_height_factor: 0.7,
            branch_levels: 2,
            branches_per_segment: 2.0,
            branch_count_jitter: 0.3,
            branch_top_bias: 0.0,
            branch_up_bias: 0.0,
            branch_child_tip_bias: 0.5,
            branch_child_avoid_base_frac: 0.1,
            branch_length: 1.4,
            branch_length_jitter: 0.3,
            branch_radius: 0.08,
            branch_radius_falloff: 0.7,
            branch_angle_deg: 35.0,
            branch_angle_deg_first: Some(35.0),
            branch_angle_deg_next: Some(28.0),
            angle_spread: 1.0,
            randomness: 0.3,
            branch_tip_taper: 0.35,
            branch_bend_base: 0.5,
            branch_bend_jitter: 0.4,
            branch_collar_size: 0.6,
            branch_collar_frac: 0.22,
            embed_factor: 1.0,
            branch_height_cutoff: 0.0,
            branch_radial_segments: 10,
            leaves_per_branch: 3,
            leaves_per_meter: 6.0,
            leaf_size: 0.16,
            leaf_shape: LeafShape::Billboard,
            leaf_placement: LeafPlacement::End,
            leaf_tilt_deg: 25.0,
            leaf_global_tilt_mode: LeafTiltMode::None,
            leaf_global_tilt_level: 0.0,
            leaf_texture_sprite_name: None,
            use_all_leaf_sprites: false,
            leaf_sprite_names: Vec::new(),
            leaf_uv_scale: 1.0,
            bark_tex_density_per_meter: 1.0,
            emit_segment_primitives: false,
        }
    }
}

impl GenerationParams {
    /// Create broadleaf preset: the editor defaults
    pub fn broadleaf() -> Self {
        Self::default()
    }

    /// Create willow preset: long drooping branches, leaves along their length
    pub fn willow() -> Self {
        Self {
            trunk_height: 4.0,
            trunk_radius: 0.3,
            trunk_shear_strength: 0.3,
            branch_levels: 2,
            branches_per_segment: 3.0,
            branch_top_bias: 0.6,
            branch_length: 2.2,
            branch_radius: 0.06,
            branch_angle_deg_first: Some(60.0),
            branch_angle_deg_next: Some(45.0),
            branch_bend_base: 1.0,
            branch_bend_jitter: 0.6,
            leaf_placement: LeafPlacement::Along,
            leaves_per_meter: 10.0,
            leaf_size: 0.1,
            ..Self::default()
        }
    }

    /// Create sapling preset: small, single branch level
    pub fn sapling() -> Self {
        Self {
            trunk_height: 1.6,
            trunk_radius: 0.05,
            trunk_segments: 4,
            trunk_taper_factor: 0.6,
            branch_levels: 1,
            branches_per_segment: 1.0,
            branch_length: 0.5,
            branch_radius: 0.02,
            leaves_per_branch: 5,
            leaf_size: 0.08,
            ..Self::default()
        }
    }

    /// Create bare preset: broadleaf structure without leaves
    pub fn bare() -> Self {
        Self {
            branch_levels: 3,
            leaves_per_branch: 0,
            ..Self::default()
        }
    }

    /// Create params from style preset
    pub fn from_style(style: TreeStyle) -> Self {
        match style {
            TreeStyle::Broadleaf => Self::broadleaf(),
            TreeStyle::Willow => Self::willow(),
            TreeStyle::Sapling => Self::sapling(),
            TreeStyle::Bare => Self::bare(),
        }
    }

    /// Same parameters with a different seed
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Parse an editor-style JSON export
    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values clamping cannot repair
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("trunkHeight", self.trunk_height),
            ("trunkRadius", self.trunk_radius),
            ("trunkTaperFactor", self.trunk_taper_factor),
            ("trunkShearStrength", self.trunk_shear_strength),
            ("trunkBranchAngleDeg", self.trunk_branch_angle_deg),
            ("trunkBranchChildHeightFactor", self.trunk_branch_child_height_factor),
            ("branchesPerSegment", self.branches_per_segment),
            ("branchCountJitter", self.branch_count_jitter),
            ("branchTopBias", self.branch_top_bias),
            ("branchUpBias", self.branch_up_bias),
            ("branchChildTipBias", self.branch_child_tip_bias),
            ("branchChildAvoidBaseFrac", self.branch_child_avoid_base_frac),
            ("branchLength", self.branch_length),
            ("branchLengthJitter", self.branch_length_jitter),
            ("branchRadius", self.branch_radius),
            ("branchRadiusFalloff", self.branch_radius_falloff),
            ("branchAngleDeg", self.branch_angle_deg),
            ("branchAngleDegFirst", self.branch_angle_deg_first.unwrap_or(0.0)),
            ("branchAngleDegNext", self.branch_angle_deg_next.unwrap_or(0.0)),
            ("angleSpread", self.angle_spread),
            ("randomness", self.randomness),
            ("branchTipTaper", self.branch_tip_taper),
            ("branchBendBase", self.branch_bend_base),
            ("branchBendJitter", self.branch_bend_jitter),
            ("branchCollarSize", self.branch_collar_size),
            ("branchCollarFrac", self.branch_collar_frac),
            ("embedFactor", self.embed_factor),
            ("branchHeightCutoff", self.branch_height_cutoff),
            ("leavesPerMeter", self.leaves_per_meter),
            ("leafSize", self.leaf_size),
            ("leafTiltDeg", self.leaf_tilt_deg),
            ("leafGlobalTiltLevel", self.leaf_global_tilt_level),
            ("leafUvScale", self.leaf_uv_scale),
            ("barkTexDensityPerMeter", self.bark_tex_density_per_meter),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(Error::InvalidParams(format!("{} must be finite, got {}", name, value)));
            }
        }
        Ok(())
    }

    /// Copy with every knob clamped to its documented range.
    ///
    /// | field | range |
    /// |---|---|
    /// | trunkHeight | 0.1 – 100 |
    /// | trunkRadius | 0.02 – 5 |
    /// | trunkSegments | 1 – 64 |
    /// | trunkTaperFactor, trunkShearStrength | 0 – 1 |
    /// | trunkRadialSegments | 3 – 64 |
    /// | trunkBranchLevels | 0 – 4 |
    /// | trunkBranchesPerLevel | 1 – 6 |
    /// | trunkBranchAngleDeg | 0 – 85 |
    /// | trunkBranchChildHeightFactor | 0.3 – 0.95 |
    /// | branchLevels | 0 – 6 |
    /// | branchesPerSegment | 0 – 16 |
    /// | branchLength | 0.05 – 50 |
    /// | branchRadius | 0.01 – 2 |
    /// | branchRadiusFalloff | 0.3 – 1 |
    /// | branch angles | 0 – 170 |
    /// | branchTipTaper | 0 – 0.95 |
    /// | branchCollarSize | 0 – 2 |
    /// | branchCollarFrac | 0 – 0.6 |
    /// | branchChildAvoidBaseFrac | 0 – 0.9 |
    /// | branchHeightCutoff | ≥ 0 |
    /// | branchRadialSegments | 3 – 32 |
    /// | leavesPerBranch | 0 – 64 |
    /// | leavesPerMeter | 0.5 – 100 |
    /// | leafSize | 0.01 – 5 |
    /// | leafTiltDeg | 0 – 90 |
    /// | barkTexDensityPerMeter, leafUvScale | 0.01 – 100 |
    /// | all other ratios | 0 – 1 |
    pub fn clamped(&self) -> Self {
        let unit = |v: f32| v.clamp(0.0, 1.0);
        Self {
            seed: self.seed,
            trunk_height: self.trunk_height.clamp(0.1, 100.0),
            trunk_radius: self.trunk_radius.clamp(0.02, 5.0),
            trunk_segments: self.trunk_segments.clamp(1, 64),
            trunk_taper_factor: unit(self.trunk_taper_factor),
            trunk_shear_strength: unit(self.trunk_shear_strength),
            trunk_radial_segments: self.trunk_radial_segments.clamp(3, 64),
            trunk_branch_levels: self.trunk_branch_levels.min(4),
            trunk_branches_per_level: self.trunk_branches_per_level.clamp(1, 6),
            trunk_branch_angle_deg: self.trunk_branch_angle_deg.clamp(0.0, 85.0),
            trunk_branch_child_height_factor: self.trunk_branch_child_height_factor.clamp(0.3, 0.95),
            branch_levels: self.branch_levels.min(6),
            branches_per_segment: self.branches_per_segment.clamp(0.0, 16.0),
            branch_count_jitter: unit(self.branch_count_jitter),
            branch_top_bias: unit(self.branch_top_bias),
            branch_up_bias: unit(self.branch_up_bias),
            branch_child_tip_bias: unit(self.branch_child_tip_bias),
            branch_child_avoid_base_frac: self.branch_child_avoid_base_frac.clamp(0.0, 0.9),
            branch_length: self.branch_length.clamp(0.05, 50.0),
            branch_length_jitter: unit(self.branch_length_jitter),
            branch_radius: self.branch_radius.clamp(0.01, 2.0),
            branch_radius_falloff: self.branch_radius_falloff.clamp(0.3, 1.0),
            branch_angle_deg: self.branch_angle_deg.clamp(0.0, 170.0),
            branch_angle_deg_first: self.branch_angle_deg_first.map(|a| a.clamp(0.0, 170.0)),
            branch_angle_deg_next: self.branch_angle_deg_next.map(|a| a.clamp(0.0, 170.0)),
            angle_spread: unit(self.angle_spread),
            randomness: unit(self.randomness),
            branch_tip_taper: self.branch_tip_taper.clamp(0.0, 0.95),
            branch_bend_base: unit(self.branch_bend_base),
            branch_bend_jitter: unit(self.branch_bend_jitter),
            branch_collar_size: self.branch_collar_size.clamp(0.0, 2.0),
            branch_collar_frac: self.branch_collar_frac.clamp(0.0, 0.6),
            embed_factor: unit(self.embed_factor),
            branch_height_cutoff: self.branch_height_cutoff.max(0.0),
            branch_radial_segments: self.branch_radial_segments.clamp(3, 32),
            leaves_per_branch: self.leaves_per_branch.min(64),
            leaves_per_meter: self.leaves_per_meter.clamp(0.5, 100.0),
            leaf_size: self.leaf_size.clamp(0.01, 5.0),
            leaf_shape: self.leaf_shape,
            leaf_placement: self.leaf_placement,
            leaf_tilt_deg: self.leaf_tilt_deg.clamp(0.0, 90.0),
            leaf_global_tilt_mode: self.leaf_global_tilt_mode,
            leaf_global_tilt_level: unit(self.leaf_global_tilt_level),
            leaf_texture_sprite_name: self.leaf_texture_sprite_name.clone(),
            use_all_leaf_sprites: self.use_all_leaf_sprites,
            leaf_sprite_names: self.leaf_sprite_names.clone(),
            leaf_uv_scale: self.leaf_uv_scale.clamp(0.01, 100.0),
            bark_tex_density_per_meter: self.bark_tex_density_per_meter.clamp(0.01, 100.0),
            emit_segment_primitives: self.emit_segment_primitives,
        }
    }

    /// Branch angle for a recursion level (1-based)
    pub fn branch_angle_for_level(&self, level: u32) -> f32 {
        let specific = if level <= 1 {
            self.branch_angle_deg_first
        } else {
            self.branch_angle_deg_next
        };
        specific.unwrap_or(self.branch_angle_deg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_params_default() {
        let params = GenerationParams::default();
        assert!(params.trunk_height > 0.0);
        assert!(params.trunk_radius > 0.0);
        assert_eq!(params.clamped(), params);
    }

    #[test]
    fn test_presets() {
        let willow = GenerationParams::willow();
        let sapling = GenerationParams::sapling();
        let bare = GenerationParams::bare();

        assert!(willow.branch_bend_base > GenerationParams::default().branch_bend_base);
        assert_eq!(willow.leaf_placement, LeafPlacement::Along);
        assert!(sapling.trunk_height < willow.trunk_height);
        assert_eq!(bare.leaves_per_branch, 0);
        assert_eq!(GenerationParams::from_style(TreeStyle::Sapling), sapling);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let params = GenerationParams::from_json_str(r#"{ "seed": 7, "trunkHeight": 8, "leafPlacement": "along" }"#).unwrap();
        assert_eq!(params.seed, 7);
        assert_eq!(params.trunk_height, 8.0);
        assert_eq!(params.leaf_placement, LeafPlacement::Along);
        assert_eq!(params.trunk_segments, 6);
    }

    #[test]
    fn test_json_roundtrip_keeps_camel_case() {
        let json = GenerationParams::willow().to_json().unwrap();
        assert!(json.contains("\"branchesPerSegment\""));
        assert!(json.contains("\"leafShape\": \"billboard\""));
        assert_eq!(GenerationParams::from_json_str(&json).unwrap(), GenerationParams::willow());
    }

    #[test]
    fn test_malformed_json_is_error() {
        let err = GenerationParams::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_validate_rejects_nan() {
        let params = GenerationParams { branch_length: f32::NAN, ..Default::default() };
        assert!(matches!(params.validate(), Err(Error::InvalidParams(_))));
    }

    #[test]
    fn test_clamped_ranges() {
        let wild = GenerationParams {
            trunk_segments: 0,
            trunk_radius: -1.0,
            branch_levels: 40,
            trunk_branch_child_height_factor: 3.0,
            branch_tip_taper: 2.0,
            leaves_per_meter: 0.0,
            branch_height_cutoff: -5.0,
            ..Default::default()
        };
        let p = wild.clamped();
        assert_eq!(p.trunk_segments, 1);
        assert_eq!(p.trunk_radius, 0.02);
        assert_eq!(p.branch_levels, 6);
        assert_eq!(p.trunk_branch_child_height_factor, 0.95);
        assert_eq!(p.branch_tip_taper, 0.95);
        assert_eq!(p.leaves_per_meter, 0.5);
        assert_eq!(p.branch_height_cutoff, 0.0);
    }

    #[test]
    fn test_angle_for_level() {
        let mut p = GenerationParams::default();
        assert_eq!(p.branch_angle_for_level(1), 35.0);
        assert_eq!(p.branch_angle_for_level(2), 28.0);
        p.branch_angle_deg_next = None;
        assert_eq!(p.branch_angle_for_level(3), p.branch_angle_deg);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "seed": 99, "branchLevels": 1 }}"#).unwrap();
        let params = GenerationParams::load(file.path()).unwrap();
        assert_eq!(params.seed, 99);
        assert_eq!(params.branch_levels, 1);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = GenerationParams::load(Path::new("/nonexistent/arborist/params.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
