//! One-time stage preprocessing.
//!
//! Captured stages arrive at arbitrary scale and offset. Each one is rescaled
//! so its largest bounding dimension equals a shared target size and is then
//! centered on the origin, so that stages of different raw scale morph
//! coherently. Normalizing an already normalized stage changes nothing.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;
use verdant_common::{ConfigError, LoadError};

use crate::stage::{RawGeometry, Stage};

/// Extents below this are treated as degenerate and left unscaled.
const MIN_EXTENT: f32 = 1e-6;

/// Axis-aligned bounds of a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Bounds {
    /// Bounds of `points`, or `None` when empty.
    #[must_use]
    pub fn of(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(min, max), &p| (min.min(p), max.max(p)));
        Some(Self { min, max })
    }

    /// Width, height and depth.
    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Center point.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Largest of the three dimensions.
    #[must_use]
    pub fn largest_dimension(&self) -> f32 {
        self.size().max_element()
    }
}

/// Rescales and recenters stage geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryNormalizer {
    /// Largest bounding dimension after normalization.
    pub target_size: f32,
}

impl Default for GeometryNormalizer {
    fn default() -> Self {
        Self { target_size: 10.0 }
    }
}

impl GeometryNormalizer {
    /// Creates a normalizer for a target size.
    #[must_use]
    pub const fn new(target_size: f32) -> Self {
        Self { target_size }
    }

    /// Rejects non-positive target sizes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.target_size.is_finite() {
            return Err(ConfigError::NonFinite {
                field: "normalizer.target_size",
            });
        }
        if self.target_size <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "normalizer.target_size",
                value: self.target_size,
                min: f32::MIN_POSITIVE,
                max: f32::INFINITY,
            });
        }
        Ok(())
    }

    /// Scale factor that brings `bounds` to the target size.
    #[must_use]
    pub fn scale_for(&self, bounds: &Bounds) -> f32 {
        let largest = bounds.largest_dimension();
        if largest > MIN_EXTENT {
            self.target_size / largest
        } else {
            1.0
        }
    }

    /// Normalizes positions in place. Empty input is left alone.
    pub fn normalize_positions(&self, positions: &mut [Vec3]) {
        let Some(bounds) = Bounds::of(positions) else {
            return;
        };
        let center = bounds.center();
        let scale = self.scale_for(&bounds);
        for p in positions.iter_mut() {
            *p = (*p - center) * scale;
        }
    }

    /// Turns loader output for stage `index` into a normalized stage.
    pub fn normalize(&self, index: usize, raw: RawGeometry) -> Result<Stage, LoadError> {
        if raw.is_empty() {
            return Err(LoadError::EmptyStage(index));
        }
        if raw.positions.iter().any(|p| !p.is_finite()) {
            return Err(LoadError::Corrupt {
                stage: index,
                reason: "non-finite vertex position".to_string(),
            });
        }

        let RawGeometry {
            mut positions,
            colors,
        } = raw;

        let before = Bounds::of(&positions).map(|b| b.largest_dimension());
        self.normalize_positions(&mut positions);
        debug!(
            "Normalized stage {}: {} vertices, extent {:?} -> {}",
            index,
            positions.len(),
            before,
            self.target_size
        );

        Ok(Stage::new(positions, colors))
    }
}
