//! Rising water gated by a ground-plane boundary.
//!
//! A square grid of particles covers the boundary's bounding box at full
//! growth. Each tick the rise progress sets the boundary expansion and the
//! water level; grid particles inside the expanded boundary are active and
//! sit on the rippling surface, the rest are hidden.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tracing::debug;
use verdant_common::ConfigError;

use super::TickContext;
use crate::boundary::{BoundaryField, ExpansionCurve};
use crate::buffer::RenderVertex;
use crate::pool::ParticlePool;
use crate::settings::SharedSettings;

/// Largest accepted grid resolution per side.
pub const MAX_GRID_RESOLUTION: u32 = 1024;

/// Runtime-adjustable water parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidTuning {
    /// Progress to boundary expansion.
    pub curve: ExpansionCurve,
    /// Water level at full progress.
    pub max_height: f32,
    /// Ripple height.
    pub ripple_amplitude: f32,
    /// Ripple waves per unit distance.
    pub ripple_frequency: f32,
    /// Ripple travel speed.
    pub ripple_speed: f32,
    /// Render size of each grid particle.
    pub particle_size: f32,
    /// Water color.
    pub color: Vec3,
    /// Water opacity.
    pub alpha: f32,
}

impl Default for FluidTuning {
    fn default() -> Self {
        Self {
            curve: ExpansionCurve::default(),
            max_height: 1.0,
            ripple_amplitude: 0.03,
            ripple_frequency: 3.0,
            ripple_speed: 1.5,
            particle_size: 0.06,
            color: Vec3::new(0.2, 0.45, 0.8),
            alpha: 0.7,
        }
    }
}

impl FluidTuning {
    /// Rejects non-finite values and an invalid curve.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.curve.validate()?;
        for (field, value) in [
            ("fluid.max_height", self.max_height),
            ("fluid.ripple_amplitude", self.ripple_amplitude),
            ("fluid.ripple_frequency", self.ripple_frequency),
            ("fluid.ripple_speed", self.ripple_speed),
            ("fluid.particle_size", self.particle_size),
            ("fluid.alpha", self.alpha),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field });
            }
        }
        if !self.color.is_finite() {
            return Err(ConfigError::NonFinite {
                field: "fluid.color",
            });
        }
        Ok(())
    }

    /// Surface height at `(x, z)` for a given water level and time.
    #[must_use]
    pub fn surface_height(&self, x: f32, z: f32, level: f32, now: f32) -> f32 {
        let travel = now * self.ripple_speed;
        let ripple = (x * self.ripple_frequency + travel).sin() * (z * self.ripple_frequency + travel * 0.8).cos();
        level + ripple * self.ripple_amplitude
    }
}

/// Structural water settings plus the initial tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidConfig {
    /// Boundary polygon as `[x, z]` pairs.
    pub boundary: Vec<[f32; 2]>,
    /// Grid particles per side.
    pub resolution: u32,
    /// Seconds from empty to full.
    pub rise_duration: f32,
    /// Restart the rise after it completes.
    pub looping: bool,
    /// Initial tuning.
    pub tuning: FluidTuning,
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            boundary: vec![[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]],
            resolution: 64,
            rise_duration: 10.0,
            looping: false,
            tuning: FluidTuning::default(),
        }
    }
}

impl FluidConfig {
    /// Replaces the boundary polygon.
    #[must_use]
    pub fn with_boundary(mut self, boundary: Vec<[f32; 2]>) -> Self {
        self.boundary = boundary;
        self
    }

    /// Sets the grid resolution.
    #[must_use]
    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution;
        self
    }

    /// Rejects degenerate boundaries, grids and durations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        BoundaryField::from_pairs(&self.boundary)?;
        if self.resolution == 0 || self.resolution > MAX_GRID_RESOLUTION {
            return Err(ConfigError::InvalidGrid {
                resolution: self.resolution,
            });
        }
        if !self.rise_duration.is_finite() {
            return Err(ConfigError::NonFinite {
                field: "fluid.rise_duration",
            });
        }
        if self.rise_duration <= 0.0 {
            return Err(ConfigError::ZeroCycleDuration);
        }
        self.tuning.validate()
    }
}

/// Lays out a `resolution x resolution` grid over the box `min..max`.
///
/// Points sit at cell centers.
#[must_use]
pub fn grid_points(min: Vec2, max: Vec2, resolution: u32) -> Vec<Vec2> {
    let n = resolution as usize;
    let cell = (max - min) / resolution as f32;
    let mut points = Vec::with_capacity(n * n);
    for row in 0..n {
        for col in 0..n {
            points.push(min + cell * Vec2::new(col as f32 + 0.5, row as f32 + 0.5));
        }
    }
    points
}

/// A live body of water.
#[derive(Debug)]
pub struct FluidEffect {
    field: BoundaryField,
    pool: ParticlePool,
    rise_duration: f32,
    looping: bool,
    progress: f32,
    tuning: SharedSettings<FluidTuning>,
}

impl FluidEffect {
    /// Validates `config` and lays out the grid.
    ///
    /// The grid covers the boundary at the expansion reached by the initial
    /// tuning's curve; raising `max_growth` later grows the water past the
    /// grid edge without adding particles.
    pub fn new(config: &FluidConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let field = BoundaryField::from_pairs(&config.boundary)?;

        let growth = config.tuning.curve.expansion(1.0);
        let (min, max) = field.bounds();
        let points = grid_points(min * growth, max * growth, config.resolution);

        let mut pool = ParticlePool::allocate(points.len())?;
        for (slot, point) in points.iter().enumerate() {
            pool.set_position(slot, Vec3::new(point.x, 0.0, point.y));
        }

        debug!(
            "Fluid effect created: {}x{} grid, boundary area {:.3}",
            config.resolution,
            config.resolution,
            field.area()
        );

        Ok(Self {
            field,
            pool,
            rise_duration: config.rise_duration,
            looping: config.looping,
            progress: 0.0,
            tuning: SharedSettings::new(config.tuning).with_validator(FluidTuning::validate),
        })
    }

    /// Handle for adjusting tuning while the effect runs.
    #[must_use]
    pub fn tuning(&self) -> &SharedSettings<FluidTuning> {
        &self.tuning
    }

    /// Grid particles; active ones are inside the boundary.
    #[must_use]
    pub const fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    /// The stored boundary.
    #[must_use]
    pub const fn field(&self) -> &BoundaryField {
        &self.field
    }

    /// Rise progress used by the most recent tick.
    #[must_use]
    pub const fn progress(&self) -> f32 {
        self.progress
    }

    /// One vertex per grid particle.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.pool.capacity()
    }

    /// Rise progress at simulation time `now`.
    #[must_use]
    pub fn progress_at(&self, now: f32) -> f32 {
        let t = now / self.rise_duration;
        if self.looping {
            t.rem_euclid(1.0)
        } else {
            t.clamp(0.0, 1.0)
        }
    }

    /// Gates the grid against the expanded boundary, then writes.
    pub fn tick(&mut self, ctx: &TickContext, out: &mut [RenderVertex]) -> bool {
        let tuning = self.tuning.snapshot();
        let progress = ctx
            .overrides
            .forced_progress_clamped()
            .unwrap_or_else(|| self.progress_at(ctx.now));
        self.progress = progress;

        let expansion = tuning.curve.expansion(progress);
        let level = progress * tuning.max_height;

        for slot in 0..self.pool.capacity() {
            let p = self.pool.position(slot);
            let inside = self.field.contains(p.x, p.z, expansion);
            self.pool.set_active(slot, inside);
            if inside {
                let y = tuning.surface_height(p.x, p.z, level, ctx.now);
                self.pool.set_position(slot, Vec3::new(p.x, y, p.z));
            }
        }

        for (slot, vertex) in out.iter_mut().enumerate().take(self.pool.capacity()) {
            *vertex = if self.pool.is_active(slot) {
                RenderVertex::new(self.pool.position(slot), tuning.particle_size, tuning.color, tuning.alpha)
            } else {
                RenderVertex::HIDDEN
            };
        }
        true
    }
}
