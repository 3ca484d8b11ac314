//! World placement of an effect's output group.
//!
//! Placement is computed elsewhere (anchor resolution, geolocation). Effects
//! only carry the transform they are handed and pass it on to the renderer.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position, rotation and scale of an effect's output group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldPlacement {
    /// Translation in world space
    pub position: Vec3,
    /// Orientation
    pub rotation: Quat,
    /// Per-axis scale
    pub scale: Vec3,
}

impl Default for WorldPlacement {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl WorldPlacement {
    /// Placement at the origin with no rotation or scaling.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Creates a placement from its parts.
    #[must_use]
    pub const fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Creates a translation-only placement.
    #[must_use]
    pub const fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    /// Sets a uniform scale.
    #[must_use]
    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    /// Sets a rotation about the vertical axis, in radians.
    #[must_use]
    pub fn with_yaw(mut self, radians: f32) -> Self {
        self.rotation = Quat::from_rotation_y(radians);
        self
    }

    /// Model matrix (scale, then rotate, then translate).
    #[must_use]
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Transforms a point from local effect space into world space.
    #[must_use]
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.rotation * (local * self.scale) + self.position
    }
}
