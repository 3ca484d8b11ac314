//! Captured stage geometry.
//!
//! A stage is one fully formed snapshot (a growth phase, a bloom) that the
//! morph interpolator blends toward. Stages are immutable after
//! normalization.

use glam::Vec3;
use tracing::debug;

/// Geometry as delivered by an external mesh or point-cloud loader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGeometry {
    /// Vertex positions.
    pub positions: Vec<Vec3>,
    /// Optional per-vertex RGB colors, parallel to `positions`.
    pub colors: Option<Vec<Vec3>>,
}

impl RawGeometry {
    /// Geometry without colors.
    #[must_use]
    pub fn from_positions(positions: Vec<Vec3>) -> Self {
        Self {
            positions,
            colors: None,
        }
    }

    /// Geometry with a parallel color array.
    #[must_use]
    pub fn with_colors(positions: Vec<Vec3>, colors: Vec<Vec3>) -> Self {
        Self {
            positions,
            colors: Some(colors),
        }
    }

    /// Number of vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether there are no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// One normalized stage: ordered `(position, color)` vertex pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    positions: Vec<Vec3>,
    colors: Vec<Vec3>,
}

impl Stage {
    /// Color used for vertices the loader supplied no color for.
    pub const DEFAULT_COLOR: Vec3 = Vec3::ONE;

    /// Builds a stage, padding or truncating colors to the vertex count.
    #[must_use]
    pub fn new(positions: Vec<Vec3>, colors: Option<Vec<Vec3>>) -> Self {
        let mut colors = colors.unwrap_or_default();
        colors.resize(positions.len(), Self::DEFAULT_COLOR);
        Self { positions, colors }
    }

    /// Number of vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the stage has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Vertex positions.
    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Vertex colors, same length as positions.
    #[must_use]
    pub fn colors(&self) -> &[Vec3] {
        &self.colors
    }
}

/// Fixed-size set of stages for one experience.
///
/// Slots start empty and are filled as loading completes. A slot whose load
/// failed stays empty for good; morph segments touching it idle.
#[derive(Debug, Clone, Default)]
pub struct StageSet {
    stages: Vec<Option<Stage>>,
}

impl StageSet {
    /// Creates a set with `count` empty slots.
    #[must_use]
    pub fn with_slots(count: usize) -> Self {
        Self {
            stages: vec![None; count],
        }
    }

    /// Creates a set where every slot is filled.
    #[must_use]
    pub fn from_stages(stages: Vec<Stage>) -> Self {
        Self {
            stages: stages.into_iter().map(Some).collect(),
        }
    }

    /// Fills a slot. Out-of-range indices are ignored.
    pub fn insert(&mut self, index: usize, stage: Stage) {
        if let Some(slot) = self.stages.get_mut(index) {
            debug!("Stage {} ready with {} vertices", index, stage.len());
            *slot = Some(stage);
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the set has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Number of filled slots.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.stages.iter().filter(|stage| stage.is_some()).count()
    }

    /// Stage at `index`, if loaded.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index).and_then(Option::as_ref)
    }

    /// Smallest vertex count among loaded stages (0 if none are loaded).
    ///
    /// Blending drives only this many vertices; the excess vertices of larger
    /// stages are left out.
    #[must_use]
    pub fn min_vertex_count(&self) -> usize {
        self.stages
            .iter()
            .flatten()
            .map(Stage::len)
            .min()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_pads_missing_colors() {
        let stage = Stage::new(vec![Vec3::ZERO; 3], Some(vec![Vec3::X]));
        assert_eq!(stage.colors(), &[Vec3::X, Stage::DEFAULT_COLOR, Stage::DEFAULT_COLOR]);

        let uncolored = Stage::new(vec![Vec3::ZERO; 2], None);
        assert_eq!(uncolored.colors().len(), 2);
    }

    #[test]
    fn test_stage_truncates_extra_colors() {
        let stage = Stage::new(vec![Vec3::ZERO], Some(vec![Vec3::X, Vec3::Y]));
        assert_eq!(stage.colors(), &[Vec3::X]);
    }

    #[test]
    fn test_min_vertex_count_over_loaded() {
        let mut set = StageSet::with_slots(4);
        assert_eq!(set.min_vertex_count(), 0);

        set.insert(0, Stage::new(vec![Vec3::ZERO; 10], None));
        set.insert(2, Stage::new(vec![Vec3::ZERO; 6], None));
        set.insert(9, Stage::new(vec![Vec3::ZERO; 1], None));

        assert_eq!(set.loaded_count(), 2);
        assert_eq!(set.min_vertex_count(), 6);
        assert!(set.get(1).is_none());
        assert_eq!(set.get(2).map(Stage::len), Some(6));
    }
}
