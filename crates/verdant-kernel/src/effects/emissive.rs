//! Emissive plumes: smoke and fire.
//!
//! Each tick runs the four passes in order: sweep expired particles, emit
//! into the freed slots, advance kinematics, write the render buffer. Vertex
//! `i` always mirrors pool slot `i`; inactive slots are written hidden.

use std::f32::consts::TAU;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;
use verdant_common::ConfigError;

use super::TickContext;
use crate::buffer::RenderVertex;
use crate::emission::{EmissionPolicy, EmissionScheduler, EmissionStats, EmitterVolume, Range};
use crate::pool::ParticlePool;
use crate::settings::SharedSettings;
use crate::sweep::LifecycleSweeper;

/// Runtime-adjustable plume parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissiveTuning {
    /// Rate and attribute distributions.
    pub emission: EmissionPolicy,
    /// Upward acceleration.
    pub buoyancy: f32,
    /// Fraction of velocity lost per second.
    pub drag: f32,
    /// Horizontal sway acceleration, scaled per particle by its aux factor.
    pub turbulence: f32,
    /// Sway oscillations per second.
    pub turbulence_frequency: f32,
    /// Size multiplier added by the end of life.
    pub size_growth: f32,
    /// Color for a color seed of 0.
    pub start_color: Vec3,
    /// Color for a color seed of 1.
    pub end_color: Vec3,
    /// Peak opacity.
    pub alpha: f32,
    /// Fraction of life spent fading in.
    pub fade_in: f32,
    /// Fraction of life spent fading out.
    pub fade_out: f32,
}

impl Default for EmissiveTuning {
    fn default() -> Self {
        Self {
            emission: EmissionPolicy::default(),
            buoyancy: 0.15,
            drag: 0.3,
            turbulence: 0.2,
            turbulence_frequency: 0.8,
            size_growth: 2.0,
            start_color: Vec3::new(0.55, 0.55, 0.55),
            end_color: Vec3::new(0.8, 0.8, 0.8),
            alpha: 0.45,
            fade_in: 0.1,
            fade_out: 0.4,
        }
    }
}

impl EmissiveTuning {
    /// Rejects invalid emission policies and out-of-range fades.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.emission.validate()?;
        for (field, value) in [
            ("emissive.buoyancy", self.buoyancy),
            ("emissive.drag", self.drag),
            ("emissive.turbulence", self.turbulence),
            ("emissive.turbulence_frequency", self.turbulence_frequency),
            ("emissive.size_growth", self.size_growth),
            ("emissive.alpha", self.alpha),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field });
            }
        }
        if !self.start_color.is_finite() || !self.end_color.is_finite() {
            return Err(ConfigError::NonFinite {
                field: "emissive.color",
            });
        }
        for (field, value) in [
            ("emissive.fade_in", self.fade_in),
            ("emissive.fade_out", self.fade_out),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    field,
                    value,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }
        if self.drag < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "emissive.drag",
                value: self.drag,
                min: 0.0,
                max: f32::INFINITY,
            });
        }
        Ok(())
    }

    /// Opacity at `life` (fraction of lifetime consumed).
    #[must_use]
    pub fn alpha_at(&self, life: f32) -> f32 {
        let fade_in = if self.fade_in > 0.0 {
            (life / self.fade_in).min(1.0)
        } else {
            1.0
        };
        let fade_out = if self.fade_out > 0.0 {
            ((1.0 - life) / self.fade_out).min(1.0)
        } else {
            1.0
        };
        self.alpha * fade_in.min(fade_out).max(0.0)
    }

    /// Render size at `life` for a particle of base size `size`.
    #[must_use]
    pub fn size_at(&self, size: f32, life: f32) -> f32 {
        size * (1.0 + self.size_growth * life)
    }

    /// Color picked by a particle's color seed.
    #[must_use]
    pub fn color_for(&self, color_seed: f32) -> Vec3 {
        self.start_color.lerp(self.end_color, color_seed)
    }
}

/// Structural plume settings plus the initial tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissiveConfig {
    /// Pool size, fixed for the life of the effect.
    pub capacity: usize,
    /// Spawn box.
    pub volume: EmitterVolume,
    /// Random seed for emission.
    pub seed: u64,
    /// Initial tuning.
    pub tuning: EmissiveTuning,
}

impl Default for EmissiveConfig {
    fn default() -> Self {
        Self::smoke()
    }
}

impl EmissiveConfig {
    /// Slow grey plume.
    #[must_use]
    pub fn smoke() -> Self {
        Self {
            capacity: 2000,
            volume: EmitterVolume::new(Vec3::ZERO, 1.0, 0.2, 1.0),
            seed: 0x5eed,
            tuning: EmissiveTuning::default(),
        }
    }

    /// Fast, short-lived orange plume.
    #[must_use]
    pub fn fire() -> Self {
        Self {
            capacity: 1500,
            volume: EmitterVolume::new(Vec3::ZERO, 0.6, 0.1, 0.6),
            seed: 0xf1e,
            tuning: EmissiveTuning {
                emission: EmissionPolicy {
                    rate: 240.0,
                    horizontal_spread: 0.15,
                    rise_speed: Range::new(0.8, 1.6),
                    lifetime_base: 0.6,
                    lifetime_extra: 0.5,
                    size: Range::new(0.08, 0.18),
                    carry_fractional: false,
                },
                buoyancy: 0.6,
                drag: 0.5,
                turbulence: 0.4,
                turbulence_frequency: 2.5,
                size_growth: -0.6,
                start_color: Vec3::new(1.0, 0.85, 0.3),
                end_color: Vec3::new(0.9, 0.25, 0.05),
                alpha: 0.9,
                fade_in: 0.05,
                fade_out: 0.5,
            },
        }
    }

    /// Sets the pool size.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the emission seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replaces the tuning.
    #[must_use]
    pub fn with_tuning(mut self, tuning: EmissiveTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Rejects zero capacity and invalid volumes or tuning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        self.volume.validate()?;
        self.tuning.validate()
    }
}

/// A live plume.
#[derive(Debug)]
pub struct EmissiveEffect {
    pool: ParticlePool,
    scheduler: EmissionScheduler,
    sweeper: LifecycleSweeper,
    volume: EmitterVolume,
    tuning: SharedSettings<EmissiveTuning>,
}

impl EmissiveEffect {
    /// Validates `config` and allocates the pool.
    pub fn new(config: &EmissiveConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let pool = ParticlePool::allocate(config.capacity)?;
        debug!(
            "Emissive effect created: {} slots, {} particles/s",
            config.capacity, config.tuning.emission.rate
        );
        Ok(Self {
            pool,
            scheduler: EmissionScheduler::new(config.seed),
            sweeper: LifecycleSweeper::new(),
            volume: config.volume,
            tuning: SharedSettings::new(config.tuning).with_validator(EmissiveTuning::validate),
        })
    }

    /// Handle for adjusting tuning while the effect runs.
    #[must_use]
    pub fn tuning(&self) -> &SharedSettings<EmissiveTuning> {
        &self.tuning
    }

    /// The particle pool.
    #[must_use]
    pub const fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    /// Emission counters.
    #[must_use]
    pub const fn emission_stats(&self) -> EmissionStats {
        self.scheduler.stats()
    }

    /// Expiry counters.
    #[must_use]
    pub const fn sweeper(&self) -> &LifecycleSweeper {
        &self.sweeper
    }

    /// One vertex per pool slot.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.pool.capacity()
    }

    /// Runs sweep, emit, advance and write.
    pub fn tick(&mut self, ctx: &TickContext, out: &mut [RenderVertex]) -> bool {
        let tuning = self.tuning.snapshot();

        self.sweeper.sweep(&mut self.pool, ctx.now);
        if !ctx.overrides.suppress_emission {
            self.scheduler
                .emit(&mut self.pool, ctx.now, ctx.dt, &self.volume, &tuning.emission);
        }
        self.advance(ctx.now, ctx.dt, &tuning);
        self.write(ctx.now, &tuning, out);
        true
    }

    fn advance(&mut self, now: f32, dt: f32, tuning: &EmissiveTuning) {
        if dt <= 0.0 {
            return;
        }
        let damping = (1.0 - tuning.drag * dt).max(0.0);
        let slices = self.pool.slices_mut();

        for slot in 0..slices.active.len() {
            if slices.active[slot] == 0 {
                continue;
            }
            let aux = slices.aux_factors[slot];
            let age = now - slices.age0[slot];
            let phase = aux * TAU + age * tuning.turbulence_frequency * TAU;
            let sway = Vec3::new(phase.sin(), 0.0, (phase * 0.7).cos()) * tuning.turbulence * aux;

            let velocity = &mut slices.velocities[slot];
            *velocity += (Vec3::Y * tuning.buoyancy + sway) * dt;
            *velocity *= damping;
            slices.positions[slot] += *velocity * dt;
        }
    }

    fn write(&self, now: f32, tuning: &EmissiveTuning, out: &mut [RenderVertex]) {
        for (slot, vertex) in out.iter_mut().enumerate().take(self.pool.capacity()) {
            if !self.pool.is_visible(slot, now) {
                *vertex = RenderVertex::HIDDEN;
                continue;
            }
            let life = self.pool.life_fraction(slot, now);
            *vertex = RenderVertex::new(
                self.pool.position(slot),
                tuning.size_at(self.pool.size(slot), life),
                tuning.color_for(self.pool.color_seed(slot)),
                tuning.alpha_at(life),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DebugOverrides;

    fn ctx(now: f32, dt: f32) -> TickContext {
        TickContext {
            now,
            dt,
            overrides: DebugOverrides::default(),
        }
    }

    #[test]
    fn test_presets_validate() {
        assert!(EmissiveConfig::smoke().validate().is_ok());
        assert!(EmissiveConfig::fire().validate().is_ok());
        assert_eq!(
            EmissiveConfig::smoke().with_capacity(0).validate(),
            Err(ConfigError::ZeroCapacity)
        );
    }

    #[test]
    fn test_alpha_fades_in_and_out() {
        let tuning = EmissiveTuning {
            alpha: 1.0,
            fade_in: 0.2,
            fade_out: 0.5,
            ..EmissiveTuning::default()
        };
        assert!(tuning.alpha_at(0.0).abs() < 1e-6);
        assert!((tuning.alpha_at(0.1) - 0.5).abs() < 1e-6);
        assert!((tuning.alpha_at(0.4) - 1.0).abs() < 1e-6);
        assert!((tuning.alpha_at(0.75) - 0.5).abs() < 1e-6);
        assert!(tuning.alpha_at(1.0).abs() < 1e-6);
    }

    #[test]
    fn test_size_grows_over_life() {
        let tuning = EmissiveTuning {
            size_growth: 2.0,
            ..EmissiveTuning::default()
        };
        assert!((tuning.size_at(0.1, 0.0) - 0.1).abs() < 1e-6);
        assert!((tuning.size_at(0.1, 1.0) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_particles_rise() {
        let mut effect = EmissiveEffect::new(&EmissiveConfig::smoke()).expect("valid config");
        let mut out = vec![RenderVertex::HIDDEN; effect.vertex_count()];

        effect.tick(&ctx(0.1, 0.1), &mut out);
        let slot = effect.pool().active_slots().next().expect("emitted");
        let start = effect.pool().position(slot);
        for i in 2..10 {
            effect.tick(&ctx(i as f32 * 0.1, 0.1), &mut out);
        }
        assert!(effect.pool().position(slot).y > start.y);
        assert_eq!(out[slot].position, effect.pool().position(slot).to_array());
    }

    #[test]
    fn test_inactive_slots_written_hidden() {
        let config = EmissiveConfig::smoke().with_capacity(50);
        let mut effect = EmissiveEffect::new(&config).expect("valid config");
        let mut out = vec![RenderVertex::new(Vec3::ONE, 1.0, Vec3::ONE, 1.0); 50];

        effect.tick(&ctx(0.05, 0.05), &mut out);
        for (slot, vertex) in out.iter().enumerate() {
            if !effect.pool().is_active(slot) {
                assert_eq!(*vertex, RenderVertex::HIDDEN);
            }
        }
    }

    #[test]
    fn test_suppressed_emission_keeps_live_particles() {
        let mut effect = EmissiveEffect::new(&EmissiveConfig::smoke()).expect("valid config");
        let mut out = vec![RenderVertex::HIDDEN; effect.vertex_count()];
        effect.tick(&ctx(0.1, 0.1), &mut out);
        let live = effect.pool().active_count();
        assert!(live > 0);

        let suppressed = TickContext {
            overrides: DebugOverrides {
                suppress_emission: true,
                ..DebugOverrides::default()
            },
            ..ctx(0.2, 0.1)
        };
        effect.tick(&suppressed, &mut out);
        assert_eq!(effect.pool().active_count(), live);
    }

    #[test]
    fn test_tuning_change_applies_next_tick() {
        let mut effect = EmissiveEffect::new(&EmissiveConfig::smoke()).expect("valid config");
        let mut out = vec![RenderVertex::HIDDEN; effect.vertex_count()];
        effect.tuning().update(|t| t.emission.rate = 0.0);

        effect.tick(&ctx(0.1, 0.1), &mut out);
        assert_eq!(effect.pool().active_count(), 0);

        effect.tuning().update(|t| t.emission.rate = 100.0);
        effect.tick(&ctx(0.2, 0.1), &mut out);
        assert_eq!(effect.pool().active_count(), 10);
    }

    #[test]
    fn test_invalid_tuning_update_rejected() {
        let config = EmissiveConfig::smoke().with_capacity(100);
        let mut effect = EmissiveEffect::new(&config).expect("valid config");
        let mut out = vec![RenderVertex::HIDDEN; effect.vertex_count()];
        assert!(effect.tuning().update(|t| t.emission.rate = 100.0));
        let before = effect.tuning().snapshot();

        let result = effect.tuning().try_update(|t| {
            t.emission.lifetime_base = -1.0;
            t.emission.lifetime_extra = 0.0;
        });
        assert_eq!(
            result,
            Err(ConfigError::InvalidLifetime {
                base: -1.0,
                extra: 0.0,
            })
        );
        assert!(!effect.tuning().update(|t| t.emission.lifetime_base = 0.0));
        assert!(!effect.tuning().update(|t| t.fade_out = 2.0));
        assert_eq!(effect.tuning().snapshot(), before);

        effect.tick(&ctx(0.1, 0.1), &mut out);
        assert_eq!(effect.pool().active_count(), 10);
        assert_eq!(effect.emission_stats().emitted, 10);
    }
}
