//! Particle emission.
//!
//! Each tick the scheduler turns an emission rate into a whole number of
//! particles, finds free pool slots for them and fills in freshly sampled
//! attributes. A saturated pool drops the excess silently; the drop is only
//! visible through [`EmissionStats`].

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;
use verdant_common::ConfigError;

use crate::pool::{ParticleInit, ParticlePool};

/// Inclusive-exclusive range sampled with a uniform draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    /// Lower bound.
    pub min: f32,
    /// Upper bound.
    pub max: f32,
}

impl Range {
    /// Creates a range.
    #[must_use]
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Maps a uniform draw `u` in `[0, 1)` into the range.
    #[must_use]
    pub fn sample(&self, u: f32) -> f32 {
        self.min + u * (self.max - self.min)
    }

    /// Rejects inverted or non-finite ranges.
    pub fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(ConfigError::NonFinite { field });
        }
        if self.min > self.max {
            return Err(ConfigError::InvalidRange {
                field,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Axis-aligned box that new particles spawn inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterVolume {
    /// Box center in effect-local space.
    pub origin: Vec3,
    /// Extent along X.
    pub width: f32,
    /// Extent along Y.
    pub height: f32,
    /// Extent along Z.
    pub depth: f32,
}

impl Default for EmitterVolume {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            width: 1.0,
            height: 0.2,
            depth: 1.0,
        }
    }
}

impl EmitterVolume {
    /// Creates a volume centered on `origin`.
    #[must_use]
    pub const fn new(origin: Vec3, width: f32, height: f32, depth: f32) -> Self {
        Self {
            origin,
            width,
            height,
            depth,
        }
    }

    /// Maps three uniform draws to a point inside the box.
    #[must_use]
    pub fn sample(&self, u: f32, v: f32, w: f32) -> Vec3 {
        self.origin
            + Vec3::new(
                (u - 0.5) * self.width,
                (v - 0.5) * self.height,
                (w - 0.5) * self.depth,
            )
    }

    /// Rejects negative or non-finite extents.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.origin.is_finite() {
            return Err(ConfigError::NonFinite {
                field: "emitter.origin",
            });
        }
        for (field, extent) in [
            ("emitter.width", self.width),
            ("emitter.height", self.height),
            ("emitter.depth", self.depth),
        ] {
            if !extent.is_finite() {
                return Err(ConfigError::NonFinite { field });
            }
            if extent < 0.0 {
                return Err(ConfigError::OutOfRange {
                    field,
                    value: extent,
                    min: 0.0,
                    max: f32::INFINITY,
                });
            }
        }
        Ok(())
    }
}

/// Rate and attribute distributions for emission.
///
/// This is a tuning value: it may change between ticks and is copied once
/// at the start of each tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionPolicy {
    /// Particles per second.
    pub rate: f32,
    /// Horizontal velocity is drawn from `[-spread, spread]` on X and Z.
    pub horizontal_spread: f32,
    /// Vertical velocity range.
    pub rise_speed: Range,
    /// Minimum lifetime in seconds.
    pub lifetime_base: f32,
    /// Random lifetime added on top of the base.
    pub lifetime_extra: f32,
    /// Base size range.
    pub size: Range,
    /// Carry the fractional part of `rate * dt` into the next tick.
    ///
    /// Off by default: each tick truncates independently.
    pub carry_fractional: bool,
}

impl Default for EmissionPolicy {
    fn default() -> Self {
        Self {
            rate: 60.0,
            horizontal_spread: 0.1,
            rise_speed: Range::new(0.4, 0.9),
            lifetime_base: 2.0,
            lifetime_extra: 1.0,
            size: Range::new(0.05, 0.15),
            carry_fractional: false,
        }
    }
}

impl EmissionPolicy {
    /// Rejects distributions that could produce invalid particles.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rate.is_finite() || !self.horizontal_spread.is_finite() {
            return Err(ConfigError::NonFinite {
                field: "emission.rate",
            });
        }
        if self.rate < 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "emission.rate",
                value: self.rate,
                min: 0.0,
                max: f32::INFINITY,
            });
        }
        let lifetime_ok = self.lifetime_base.is_finite()
            && self.lifetime_extra.is_finite()
            && self.lifetime_base > 0.0
            && self.lifetime_extra >= 0.0;
        if !lifetime_ok {
            return Err(ConfigError::InvalidLifetime {
                base: self.lifetime_base,
                extra: self.lifetime_extra,
            });
        }
        self.rise_speed.validate("emission.rise_speed")?;
        self.size.validate("emission.size")?;
        Ok(())
    }
}

/// Emission counters, cumulative since the scheduler was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmissionStats {
    /// Particles the rate asked for.
    pub attempted: u64,
    /// Particles that found a slot.
    pub emitted: u64,
    /// Particles dropped because the pool was saturated.
    pub dropped: u64,
}

impl EmissionStats {
    /// Fraction of attempted emissions that found a slot (1.0 when idle).
    #[must_use]
    pub fn fill_ratio(&self) -> f32 {
        if self.attempted == 0 {
            1.0
        } else {
            self.emitted as f32 / self.attempted as f32
        }
    }
}

/// Turns an emission rate into activated pool slots.
#[derive(Debug, Clone)]
pub struct EmissionScheduler {
    rng: fastrand::Rng,
    carry: f32,
    total: EmissionStats,
    last_tick: EmissionStats,
    warned_saturation: bool,
}

impl EmissionScheduler {
    /// Creates a scheduler with a deterministic random sequence.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
            carry: 0.0,
            total: EmissionStats::default(),
            last_tick: EmissionStats::default(),
            warned_saturation: false,
        }
    }

    /// Cumulative counters.
    #[must_use]
    pub const fn stats(&self) -> EmissionStats {
        self.total
    }

    /// Counters for the most recent tick only.
    #[must_use]
    pub const fn last_tick(&self) -> EmissionStats {
        self.last_tick
    }

    /// Number of particles to emit this tick.
    ///
    /// `floor(rate * dt)`; with `carry_fractional` the remainder is kept for
    /// the next call instead of being discarded.
    pub fn emit_count(&mut self, rate: f32, dt: f32, carry_fractional: bool) -> usize {
        let wanted = rate.max(0.0) * dt.max(0.0);
        if !wanted.is_finite() {
            return 0;
        }

        if carry_fractional {
            let total = wanted + self.carry;
            let count = total.floor();
            self.carry = total - count;
            count as usize
        } else {
            self.carry = 0.0;
            wanted.floor() as usize
        }
    }

    /// Samples a complete set of initial attributes.
    pub fn sample(&mut self, now: f32, volume: &EmitterVolume, policy: &EmissionPolicy) -> ParticleInit {
        let position = volume.sample(self.rng.f32(), self.rng.f32(), self.rng.f32());
        let spread = policy.horizontal_spread;
        let velocity = Vec3::new(
            (self.rng.f32() * 2.0 - 1.0) * spread,
            policy.rise_speed.sample(self.rng.f32()),
            (self.rng.f32() * 2.0 - 1.0) * spread,
        );
        let lifetime = policy.lifetime_base + self.rng.f32() * policy.lifetime_extra;

        ParticleInit {
            position,
            velocity,
            age0: now,
            lifetime,
            size: policy.size.sample(self.rng.f32()),
            color_seed: self.rng.f32(),
            aux_factor: self.rng.f32(),
        }
    }

    /// Emits this tick's particles into free slots.
    ///
    /// Returns the number of particles activated.
    pub fn emit(
        &mut self,
        pool: &mut ParticlePool,
        now: f32,
        dt: f32,
        volume: &EmitterVolume,
        policy: &EmissionPolicy,
    ) -> usize {
        self.last_tick = EmissionStats::default();

        let count = self.emit_count(policy.rate, dt, policy.carry_fractional);
        if count == 0 {
            return 0;
        }

        let mut emitted = 0;
        for _ in 0..count {
            let Some(slot) = pool.find_free_slot() else {
                break;
            };
            let init = self.sample(now, volume, policy);
            pool.activate(slot, init);
            emitted += 1;
        }

        let dropped = count - emitted;
        if dropped > 0 && !self.warned_saturation {
            debug!(
                "Particle pool saturated at {} slots, dropping {} emissions",
                pool.capacity(),
                dropped
            );
            self.warned_saturation = true;
        }

        self.last_tick = EmissionStats {
            attempted: count as u64,
            emitted: emitted as u64,
            dropped: dropped as u64,
        };
        self.total.attempted = self.total.attempted.saturating_add(count as u64);
        self.total.emitted = self.total.emitted.saturating_add(emitted as u64);
        self.total.dropped = self.total.dropped.saturating_add(dropped as u64);

        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(capacity: usize) -> ParticlePool {
        ParticlePool::allocate(capacity).expect("pool allocation")
    }

    #[test]
    fn test_emit_count_truncates() {
        let mut scheduler = EmissionScheduler::new(1);
        assert_eq!(scheduler.emit_count(50.0, 0.1, false), 5);
        assert_eq!(scheduler.emit_count(30.0, 1.0 / 60.0, false), 0);
        assert_eq!(scheduler.emit_count(30.0, 1.0 / 60.0, false), 0);
    }

    #[test]
    fn test_emit_count_carries_fraction() {
        let mut scheduler = EmissionScheduler::new(1);
        let total: usize = (0..60)
            .map(|_| scheduler.emit_count(30.0, 1.0 / 60.0, true))
            .sum();
        assert!((29..=30).contains(&total));
    }

    #[test]
    fn test_emit_count_ignores_negative_input() {
        let mut scheduler = EmissionScheduler::new(1);
        assert_eq!(scheduler.emit_count(-10.0, 1.0, false), 0);
        assert_eq!(scheduler.emit_count(10.0, -1.0, false), 0);
    }

    #[test]
    fn test_sample_respects_bounds() {
        let mut scheduler = EmissionScheduler::new(7);
        let volume = EmitterVolume::new(Vec3::new(1.0, 2.0, 3.0), 2.0, 1.0, 4.0);
        let policy = EmissionPolicy::default();

        for _ in 0..500 {
            let init = scheduler.sample(10.0, &volume, &policy);
            assert!((init.position.x - 1.0).abs() <= 1.0);
            assert!((init.position.y - 2.0).abs() <= 0.5);
            assert!((init.position.z - 3.0).abs() <= 2.0);
            assert!(init.velocity.x.abs() <= policy.horizontal_spread);
            assert!(init.velocity.y >= policy.rise_speed.min);
            assert!(init.velocity.y <= policy.rise_speed.max);
            assert!(init.lifetime >= policy.lifetime_base);
            assert!(init.lifetime <= policy.lifetime_base + policy.lifetime_extra);
            assert!((0.0..1.0).contains(&init.color_seed));
            assert!((0.0..1.0).contains(&init.aux_factor));
            assert!((init.age0 - 10.0).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let volume = EmitterVolume::default();
        let policy = EmissionPolicy::default();
        let mut a = EmissionScheduler::new(42);
        let mut b = EmissionScheduler::new(42);
        for _ in 0..10 {
            assert_eq!(a.sample(0.0, &volume, &policy), b.sample(0.0, &volume, &policy));
        }
    }

    #[test]
    fn test_saturated_pool_drops_silently() {
        let mut scheduler = EmissionScheduler::new(3);
        let mut pool = pool(4);
        let policy = EmissionPolicy {
            rate: 100.0,
            ..EmissionPolicy::default()
        };

        let emitted = scheduler.emit(&mut pool, 0.0, 0.1, &EmitterVolume::default(), &policy);
        assert_eq!(emitted, 4);
        assert_eq!(pool.active_count(), 4);

        let tick = scheduler.last_tick();
        assert_eq!(tick.attempted, 10);
        assert_eq!(tick.emitted, 4);
        assert_eq!(tick.dropped, 6);
        assert!((scheduler.stats().fill_ratio() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_zero_rate_is_noop() {
        let mut scheduler = EmissionScheduler::new(3);
        let mut pool = pool(4);
        let policy = EmissionPolicy {
            rate: 0.0,
            ..EmissionPolicy::default()
        };
        assert_eq!(
            scheduler.emit(&mut pool, 0.0, 1.0, &EmitterVolume::default(), &policy),
            0
        );
        assert_eq!(pool.active_count(), 0);
        assert_eq!(scheduler.stats(), EmissionStats::default());
    }

    #[test]
    fn test_huge_rate_saturates_counters() {
        let mut scheduler = EmissionScheduler::new(5);
        let mut pool = pool(8);
        let policy = EmissionPolicy {
            rate: 1e30,
            ..EmissionPolicy::default()
        };
        assert!(policy.validate().is_ok());

        let volume = EmitterVolume::default();
        assert_eq!(scheduler.emit(&mut pool, 0.0, 1.0 / 60.0, &volume, &policy), 8);
        assert_eq!(scheduler.emit(&mut pool, 0.1, 1.0 / 60.0, &volume, &policy), 0);

        let stats = scheduler.stats();
        assert_eq!(stats.emitted, 8);
        assert!(stats.attempted >= stats.dropped);
        assert!(stats.attempted > u64::from(u32::MAX));
        assert_eq!(pool.active_count(), 8);
    }

    #[test]
    fn test_policy_validation() {
        assert!(EmissionPolicy::default().validate().is_ok());

        let negative_rate = EmissionPolicy {
            rate: -2.0,
            ..EmissionPolicy::default()
        };
        assert_eq!(
            negative_rate.validate(),
            Err(ConfigError::OutOfRange {
                field: "emission.rate",
                value: -2.0,
                min: 0.0,
                max: f32::INFINITY,
            })
        );

        let zero_life = EmissionPolicy {
            lifetime_base: 0.0,
            lifetime_extra: 0.0,
            ..EmissionPolicy::default()
        };
        assert!(matches!(
            zero_life.validate(),
            Err(ConfigError::InvalidLifetime { .. })
        ));

        let inverted = EmissionPolicy {
            size: Range::new(1.0, 0.5),
            ..EmissionPolicy::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(ConfigError::InvalidRange {
                field: "emission.size",
                ..
            })
        ));

        let nan_life = EmissionPolicy {
            lifetime_base: f32::NAN,
            ..EmissionPolicy::default()
        };
        assert!(nan_life.validate().is_err());
    }

    #[test]
    fn test_volume_validation() {
        assert!(EmitterVolume::default().validate().is_ok());
        let negative = EmitterVolume {
            width: -1.0,
            ..EmitterVolume::default()
        };
        assert!(matches!(
            negative.validate(),
            Err(ConfigError::OutOfRange {
                field: "emitter.width",
                ..
            })
        ));
    }
}
