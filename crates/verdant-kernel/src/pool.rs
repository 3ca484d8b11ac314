//! Fixed-capacity particle storage.
//!
//! Particles live in a struct-of-arrays pool sized once at construction.
//! Slots are reused in place: a slot index is stable for the whole life of the
//! particle occupying it, so render buffers can be updated without compaction.

use glam::Vec3;
use tracing::debug;
use verdant_common::ConfigError;

/// Initial attributes for a particle being activated.
///
/// Emission fills one of these completely before handing it to
/// [`ParticlePool::activate`], so a slot never goes live with stale values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleInit {
    /// Spawn position in effect-local space.
    pub position: Vec3,
    /// Initial velocity.
    pub velocity: Vec3,
    /// Absolute simulation time of activation.
    pub age0: f32,
    /// Seconds until the particle expires. Must be positive.
    pub lifetime: f32,
    /// Base render size.
    pub size: f32,
    /// Uniform draw in `[0, 1)` used to pick a color.
    pub color_seed: f32,
    /// Uniform draw in `[0, 1)` used for per-particle behavior variation.
    pub aux_factor: f32,
}

/// Mutable views over the pool's attribute arrays, used by kinematic passes.
#[derive(Debug)]
pub struct PoolSlicesMut<'a> {
    /// Per-slot positions.
    pub positions: &'a mut [Vec3],
    /// Per-slot velocities.
    pub velocities: &'a mut [Vec3],
    /// Per-slot activation times.
    pub age0: &'a [f32],
    /// Per-slot lifetimes.
    pub lifetimes: &'a [f32],
    /// Per-slot auxiliary factors.
    pub aux_factors: &'a [f32],
    /// Per-slot active flags (0 or 1).
    pub active: &'a [u8],
}

/// Fixed-capacity, slot-indexed particle storage.
#[derive(Debug, Clone)]
pub struct ParticlePool {
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    age0: Vec<f32>,
    lifetimes: Vec<f32>,
    sizes: Vec<f32>,
    color_seeds: Vec<f32>,
    aux_factors: Vec<f32>,
    active: Vec<u8>,
    active_count: usize,
}

impl ParticlePool {
    /// Allocates a pool with every slot inactive and zeroed.
    ///
    /// No further allocation happens for the lifetime of the pool.
    pub fn allocate(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        debug!("Allocated particle pool with {} slots", capacity);

        Ok(Self {
            positions: vec![Vec3::ZERO; capacity],
            velocities: vec![Vec3::ZERO; capacity],
            age0: vec![0.0; capacity],
            lifetimes: vec![0.0; capacity],
            sizes: vec![0.0; capacity],
            color_seeds: vec![0.0; capacity],
            aux_factors: vec![0.0; capacity],
            active: vec![0; capacity],
            active_count: 0,
        })
    }

    /// Total number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.active.len()
    }

    /// Number of slots currently flagged active.
    #[must_use]
    pub const fn active_count(&self) -> usize {
        self.active_count
    }

    /// Returns true when every slot is in use.
    #[must_use]
    pub fn is_saturated(&self) -> bool {
        self.active_count >= self.capacity()
    }

    /// Whether the slot is flagged active.
    #[must_use]
    pub fn is_active(&self, slot: usize) -> bool {
        self.active.get(slot).is_some_and(|&flag| flag == 1)
    }

    /// Returns the first inactive slot, or `None` if the pool is saturated.
    #[must_use]
    pub fn find_free_slot(&self) -> Option<usize> {
        if self.is_saturated() {
            return None;
        }
        self.active.iter().position(|&flag| flag == 0)
    }

    /// Writes every attribute of `slot`, then flags it active.
    ///
    /// Any residual values from a previous occupant are overwritten.
    pub fn activate(&mut self, slot: usize, init: ParticleInit) {
        debug_assert!(
            init.lifetime > 0.0,
            "activated particle must have a positive lifetime"
        );
        if slot >= self.capacity() {
            return;
        }

        self.positions[slot] = init.position;
        self.velocities[slot] = init.velocity;
        self.age0[slot] = init.age0;
        self.lifetimes[slot] = init.lifetime;
        self.sizes[slot] = init.size;
        self.color_seeds[slot] = init.color_seed;
        self.aux_factors[slot] = init.aux_factor;

        if self.active[slot] == 0 {
            self.active[slot] = 1;
            self.active_count += 1;
        }
    }

    /// Flags a slot inactive. Attribute values are left in place.
    ///
    /// Returns true if the slot was active.
    pub fn deactivate(&mut self, slot: usize) -> bool {
        match self.active.get_mut(slot) {
            Some(flag) if *flag == 1 => {
                *flag = 0;
                self.active_count -= 1;
                true
            },
            _ => false,
        }
    }

    /// Flags the slot active or inactive without touching its attributes.
    ///
    /// Used by effects whose particles are positioned every frame (the fluid
    /// grid) rather than emitted with a lifetime.
    pub fn set_active(&mut self, slot: usize, active: bool) {
        if active {
            if let Some(flag) = self.active.get_mut(slot) {
                if *flag == 0 {
                    *flag = 1;
                    self.active_count += 1;
                }
            }
        } else {
            self.deactivate(slot);
        }
    }

    /// Elapsed time since activation.
    #[must_use]
    pub fn age(&self, slot: usize, now: f32) -> f32 {
        now - self.age0[slot]
    }

    /// Fraction of lifetime consumed, clamped to `[0, 1]`.
    #[must_use]
    pub fn life_fraction(&self, slot: usize, now: f32) -> f32 {
        let lifetime = self.lifetimes[slot];
        if lifetime <= 0.0 {
            return 1.0;
        }
        (self.age(slot, now) / lifetime).clamp(0.0, 1.0)
    }

    /// A slot is renderable iff it is active and `0 <= age < lifetime`.
    #[must_use]
    pub fn is_visible(&self, slot: usize, now: f32) -> bool {
        if !self.is_active(slot) {
            return false;
        }
        let age = self.age(slot, now);
        age >= 0.0 && age < self.lifetimes[slot]
    }

    /// Iterates the indices of active slots.
    pub fn active_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.active
            .iter()
            .enumerate()
            .filter_map(|(slot, &flag)| (flag == 1).then_some(slot))
    }

    /// Position of a slot.
    #[must_use]
    pub fn position(&self, slot: usize) -> Vec3 {
        self.positions[slot]
    }

    /// Sets the position of a slot.
    pub fn set_position(&mut self, slot: usize, position: Vec3) {
        self.positions[slot] = position;
    }

    /// Velocity of a slot.
    #[must_use]
    pub fn velocity(&self, slot: usize) -> Vec3 {
        self.velocities[slot]
    }

    /// Activation time of a slot.
    #[must_use]
    pub fn age0(&self, slot: usize) -> f32 {
        self.age0[slot]
    }

    /// Lifetime of a slot.
    #[must_use]
    pub fn lifetime(&self, slot: usize) -> f32 {
        self.lifetimes[slot]
    }

    /// Base size of a slot.
    #[must_use]
    pub fn size(&self, slot: usize) -> f32 {
        self.sizes[slot]
    }

    /// Color seed of a slot.
    #[must_use]
    pub fn color_seed(&self, slot: usize) -> f32 {
        self.color_seeds[slot]
    }

    /// Auxiliary factor of a slot.
    #[must_use]
    pub fn aux_factor(&self, slot: usize) -> f32 {
        self.aux_factors[slot]
    }

    /// Split borrows over the arrays that kinematic passes read and write.
    pub fn slices_mut(&mut self) -> PoolSlicesMut<'_> {
        PoolSlicesMut {
            positions: &mut self.positions,
            velocities: &mut self.velocities,
            age0: &self.age0,
            lifetimes: &self.lifetimes,
            aux_factors: &self.aux_factors,
            active: &self.active,
        }
    }
}
