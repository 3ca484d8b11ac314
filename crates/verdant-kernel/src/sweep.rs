//! Lifetime expiry.

use crate::pool::ParticlePool;

/// Deactivates particles whose lifetime has elapsed.
///
/// Only the active flag is cleared; emission overwrites every attribute on
/// reactivation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleSweeper {
    expired_total: u64,
    expired_last: usize,
}

impl LifecycleSweeper {
    /// Creates a sweeper.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            expired_total: 0,
            expired_last: 0,
        }
    }

    /// Deactivates every active slot with `now - age0 >= lifetime`.
    ///
    /// Returns the number of slots freed.
    pub fn sweep(&mut self, pool: &mut ParticlePool, now: f32) -> usize {
        let mut expired = 0;
        for slot in 0..pool.capacity() {
            if pool.is_active(slot) && pool.age(slot, now) >= pool.lifetime(slot) {
                pool.deactivate(slot);
                expired += 1;
            }
        }
        self.expired_last = expired;
        self.expired_total += expired as u64;
        expired
    }

    /// Slots freed by the most recent sweep.
    #[must_use]
    pub const fn expired_last(&self) -> usize {
        self.expired_last
    }

    /// Slots freed since creation.
    #[must_use]
    pub const fn expired_total(&self) -> u64 {
        self.expired_total
    }
}
