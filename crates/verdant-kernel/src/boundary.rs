//! Ground-plane boundary for the fluid effect.
//!
//! The polygon is stored once and never modified. Growth is expressed as a
//! uniform scale applied to the vertices at query time, so repeated queries
//! at changing scales never accumulate drift.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use verdant_common::ConfigError;

/// Doubled areas below this are treated as a collapsed polygon.
const MIN_DOUBLE_AREA: f32 = 1e-8;

/// Closed 2D polygon in the X/Z ground plane.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryField {
    /// Vertices with the first point repeated at the end.
    points: Vec<Vec2>,
}

impl BoundaryField {
    /// Builds a field from polygon vertices (`x`, `z`).
    ///
    /// The ring is closed automatically if the last point differs from the
    /// first. At least three distinct, finite vertices enclosing a non-zero
    /// area are required.
    pub fn new(points: impl IntoIterator<Item = Vec2>) -> Result<Self, ConfigError> {
        let mut points: Vec<Vec2> = points.into_iter().collect();

        if points.iter().any(|p| !p.is_finite()) {
            return Err(ConfigError::NonFinite {
                field: "boundary.points",
            });
        }

        points.dedup();
        let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
            return Err(ConfigError::DegenerateBoundary(
                "polygon has no vertices".to_string(),
            ));
        };
        if first != last {
            points.push(first);
        }

        let distinct = points.len() - 1;
        if distinct < 3 {
            return Err(ConfigError::DegenerateBoundary(format!(
                "polygon needs at least 3 distinct vertices, got {distinct}"
            )));
        }

        let field = Self { points };
        if field.signed_double_area().abs() < MIN_DOUBLE_AREA {
            return Err(ConfigError::DegenerateBoundary(
                "polygon encloses no area".to_string(),
            ));
        }
        Ok(field)
    }

    /// Builds a field from `[x, z]` pairs, as stored in config files.
    pub fn from_pairs(pairs: &[[f32; 2]]) -> Result<Self, ConfigError> {
        Self::new(pairs.iter().map(|&[x, z]| Vec2::new(x, z)))
    }

    /// Axis-aligned square of side `side` centered on the origin.
    pub fn square(side: f32) -> Result<Self, ConfigError> {
        let h = side * 0.5;
        Self::new([
            Vec2::new(-h, -h),
            Vec2::new(h, -h),
            Vec2::new(h, h),
            Vec2::new(-h, h),
        ])
    }

    /// Closed vertex ring (last point equals first).
    #[must_use]
    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    /// Enclosed area at unit expansion.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.signed_double_area().abs() * 0.5
    }

    /// Min and max corners at unit expansion.
    #[must_use]
    pub fn bounds(&self) -> (Vec2, Vec2) {
        let first = self.points[0];
        self.points
            .iter()
            .fold((first, first), |(min, max), &p| (min.min(p), max.max(p)))
    }

    /// Whether `(x, z)` lies inside the polygon scaled by `expansion` about
    /// the origin.
    ///
    /// Standard even-odd ray crossing. Non-positive or non-finite expansion
    /// contains nothing.
    #[must_use]
    pub fn contains(&self, x: f32, z: f32, expansion: f32) -> bool {
        if !expansion.is_finite() || expansion <= 0.0 {
            return false;
        }

        let mut inside = false;
        for edge in self.points.windows(2) {
            let a = edge[0] * expansion;
            let b = edge[1] * expansion;
            if (a.y > z) != (b.y > z) {
                let crossing = (b.x - a.x) * (z - a.y) / (b.y - a.y) + a.x;
                if x < crossing {
                    inside = !inside;
                }
            }
        }
        inside
    }

    fn signed_double_area(&self) -> f32 {
        self.points
            .windows(2)
            .map(|edge| edge[0].perp_dot(edge[1]))
            .sum()
    }
}

/// Maps a rise progress to a boundary expansion factor.
///
/// `1 + progress^exponent * max_growth`; exponents above 1 give an
/// accelerating spread.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionCurve {
    /// Shape of the growth curve.
    pub exponent: f32,
    /// Added expansion at full progress.
    pub max_growth: f32,
}

impl Default for ExpansionCurve {
    fn default() -> Self {
        Self {
            exponent: 2.0,
            max_growth: 1.5,
        }
    }
}

impl ExpansionCurve {
    /// Expansion for `progress`, which is clamped to `[0, 1]`.
    #[must_use]
    pub fn expansion(&self, progress: f32) -> f32 {
        let p = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };
        1.0 + p.powf(self.exponent) * self.max_growth
    }

    /// Rejects non-positive exponents and negative growth.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.exponent.is_finite() || !self.max_growth.is_finite() {
            return Err(ConfigError::NonFinite {
                field: "expansion",
            });
        }
        if self.exponent <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "expansion.exponent",
                value: self.exponent,
                min: f32::MIN_POSITIVE,
                max: f32::INFINITY,
            });
        }
        if self.max_growth < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "expansion.max_growth",
                value: self.max_growth,
                min: 0.0,
                max: f32::INFINITY,
            });
        }
        Ok(())
    }
}
