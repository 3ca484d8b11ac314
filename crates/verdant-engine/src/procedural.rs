//! Procedural growth stages.
//!
//! Stands in for captured point clouds: a seed, a sprout, a bud and a
//! blossom, each generated at a different raw scale so normalization has
//! something to do. Vertices are grouped by part (stem first) so that vertex
//! `i` lands on a comparable part of every stage.

use std::f32::consts::{PI, TAU};

use glam::Vec3;
use tracing::debug;
use verdant_common::LoadError;
use verdant_kernel::RawGeometry;

use crate::loader::StageSource;

/// Growth phases, in cycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthStage {
    /// Closed seed pod
    Seed,
    /// Stem with two leaves
    Sprout,
    /// Stem topped with a closed bud
    Bud,
    /// Open flower
    Blossom,
}

impl GrowthStage {
    /// All phases in order.
    pub const ALL: [Self; 4] = [Self::Seed, Self::Sprout, Self::Bud, Self::Blossom];

    /// Phase for a stage index, wrapping.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    /// Raw scale of the generated cloud.
    #[must_use]
    pub const fn raw_scale(self) -> f32 {
        match self {
            Self::Seed => 0.05,
            Self::Sprout => 30.0,
            Self::Bud => 1.0,
            Self::Blossom => 250.0,
        }
    }

    /// Asset-style name, used in errors.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Seed => "seed.ply",
            Self::Sprout => "sprout.ply",
            Self::Bud => "bud.ply",
            Self::Blossom => "blossom.ply",
        }
    }
}

const BARK: Vec3 = Vec3::new(0.45, 0.3, 0.18);
const STEM: Vec3 = Vec3::new(0.25, 0.55, 0.2);
const LEAF: Vec3 = Vec3::new(0.35, 0.75, 0.3);
const PETAL: Vec3 = Vec3::new(0.95, 0.55, 0.7);
const POLLEN: Vec3 = Vec3::new(1.0, 0.85, 0.25);

/// Point cloud generator.
#[derive(Debug, Clone)]
pub struct ProceduralSource {
    name: String,
    points: usize,
    seed: u64,
    stage_count: usize,
    missing: Vec<usize>,
}

impl ProceduralSource {
    /// Creates a source of `stage_count` stages with `points` vertices each.
    #[must_use]
    pub fn new(name: impl Into<String>, stage_count: usize, points: usize, seed: u64) -> Self {
        Self {
            name: name.into(),
            points,
            seed,
            stage_count,
            missing: Vec::new(),
        }
    }

    /// Treats these stage indices as absent from the asset store.
    #[must_use]
    pub fn with_missing(mut self, missing: Vec<usize>) -> Self {
        self.missing = missing;
        self
    }

    /// Generates one phase.
    #[must_use]
    pub fn generate(&self, stage: GrowthStage, index: usize) -> RawGeometry {
        let mut rng = fastrand::Rng::with_seed(self.seed.wrapping_add(index as u64));
        let mut positions = Vec::with_capacity(self.points);
        let mut colors = Vec::with_capacity(self.points);

        for i in 0..self.points {
            let t = i as f32 / self.points.max(1) as f32;
            let (position, color) = match stage {
                GrowthStage::Seed => seed_point(&mut rng),
                GrowthStage::Sprout => sprout_point(&mut rng, t),
                GrowthStage::Bud => bud_point(&mut rng, t),
                GrowthStage::Blossom => blossom_point(&mut rng, t, i),
            };
            positions.push(position * stage.raw_scale());
            colors.push(color);
        }

        RawGeometry::with_colors(positions, colors)
    }
}

impl StageSource for ProceduralSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn stage_count(&self) -> usize {
        self.stage_count
    }

    fn load_stage(&mut self, index: usize) -> Result<RawGeometry, LoadError> {
        let stage = GrowthStage::from_index(index);
        if self.missing.contains(&index) {
            return Err(LoadError::SourceMissing(stage.file_name().to_string()));
        }
        debug!("Generating {:?} stage with {} points", stage, self.points);
        Ok(self.generate(stage, index))
    }
}

/// Uniform point on a unit sphere.
fn sphere_point(rng: &mut fastrand::Rng) -> Vec3 {
    let theta = rng.f32() * TAU;
    let z = rng.f32() * 2.0 - 1.0;
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * theta.cos(), z, r * theta.sin())
}

fn stem_point(rng: &mut fastrand::Rng, height: f32) -> Vec3 {
    let angle = rng.f32() * TAU;
    let radius = 0.03 * rng.f32();
    Vec3::new(angle.cos() * radius, rng.f32() * height, angle.sin() * radius)
}

fn seed_point(rng: &mut fastrand::Rng) -> (Vec3, Vec3) {
    let p = sphere_point(rng) * Vec3::new(0.6, 1.0, 0.6);
    (p, BARK.lerp(STEM, rng.f32() * 0.2))
}

fn sprout_point(rng: &mut fastrand::Rng, t: f32) -> (Vec3, Vec3) {
    if t < 0.6 {
        return (stem_point(rng, 1.0), STEM);
    }
    // Two leaves angled out from the top of the stem
    let side = if rng.bool() { 1.0 } else { -1.0 };
    let along = rng.f32();
    let width = (PI * along).sin() * 0.15 * (rng.f32() * 2.0 - 1.0);
    let p = Vec3::new(side * along * 0.5, 0.8 + along * 0.2, width);
    (p, LEAF)
}

fn bud_point(rng: &mut fastrand::Rng, t: f32) -> (Vec3, Vec3) {
    if t < 0.5 {
        return (stem_point(rng, 1.5), STEM);
    }
    let p = sphere_point(rng) * Vec3::new(0.3, 0.4, 0.3) + Vec3::new(0.0, 1.7, 0.0);
    (p, LEAF.lerp(PETAL, rng.f32() * 0.5))
}

fn blossom_point(rng: &mut fastrand::Rng, t: f32, i: usize) -> (Vec3, Vec3) {
    const PETALS: usize = 6;
    if t < 0.35 {
        return (stem_point(rng, 2.0), STEM);
    }
    if t < 0.5 {
        let p = sphere_point(rng) * 0.2 + Vec3::new(0.0, 2.1, 0.0);
        return (p, POLLEN);
    }
    let angle = (i % PETALS) as f32 * TAU / PETALS as f32;
    let along = rng.f32();
    let across = (PI * along).sin() * 0.25 * (rng.f32() * 2.0 - 1.0);
    let radial = Vec3::new(angle.cos(), 0.0, angle.sin());
    let tangent = Vec3::new(-angle.sin(), 0.0, angle.cos());
    let p = radial * (0.2 + along * 0.9) + tangent * across + Vec3::new(0.0, 2.1 + 0.2 * along * along, 0.0);
    (p, PETAL.lerp(POLLEN, (1.0 - along) * 0.3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdant_kernel::GeometryNormalizer;

    #[test]
    fn test_stages_differ_in_raw_scale() {
        let source = ProceduralSource::new("garden", 4, 500, 1);
        let extents: Vec<f32> = GrowthStage::ALL
            .iter()
            .enumerate()
            .map(|(index, &stage)| {
                let raw = source.generate(stage, index);
                let max = raw.positions.iter().fold(Vec3::splat(f32::MIN), |a, &p| a.max(p));
                let min = raw.positions.iter().fold(Vec3::splat(f32::MAX), |a, &p| a.min(p));
                (max - min).max_element()
            })
            .collect();

        assert!(extents[0] < 1.0);
        assert!(extents[3] > 100.0);
    }

    #[test]
    fn test_normalized_stages_share_scale() {
        let mut source = ProceduralSource::new("garden", 4, 300, 9);
        let normalizer = GeometryNormalizer::new(10.0);
        for index in 0..4 {
            let raw = source.load_stage(index).expect("stage generated");
            assert_eq!(raw.len(), 300);
            let stage = normalizer.normalize(index, raw).expect("normalized");
            let max = stage.positions().iter().fold(Vec3::splat(f32::MIN), |a, &p| a.max(p));
            let min = stage.positions().iter().fold(Vec3::splat(f32::MAX), |a, &p| a.min(p));
            assert!(((max - min).max_element() - 10.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let source = ProceduralSource::new("garden", 4, 100, 42);
        assert_eq!(
            source.generate(GrowthStage::Blossom, 3),
            source.generate(GrowthStage::Blossom, 3)
        );
    }

    #[test]
    fn test_missing_stage_reports_source() {
        let mut source = ProceduralSource::new("garden", 4, 10, 0).with_missing(vec![1]);
        assert_eq!(
            source.load_stage(1),
            Err(LoadError::SourceMissing("sprout.ply".to_string()))
        );
        assert!(source.load_stage(0).is_ok());
    }

    #[test]
    fn test_index_wraps_through_phases() {
        assert_eq!(GrowthStage::from_index(0), GrowthStage::Seed);
        assert_eq!(GrowthStage::from_index(5), GrowthStage::Sprout);
    }
}
