//! ID types for experiences and subscriptions.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for experience IDs.
static EXPERIENCE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a running AR experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExperienceId(u64);

impl ExperienceId {
    /// Creates a new unique experience ID.
    #[must_use]
    pub fn new() -> Self {
        Self(EXPERIENCE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Null/invalid experience ID.
    pub const NULL: Self = Self(0);

    /// Checks if this is a valid (non-null) experience ID.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Default for ExperienceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExperienceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exp-{}", self.0)
    }
}

/// Handle returned when subscribing to setting changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u32);

impl SubscriptionId {
    /// Creates a subscription ID from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_null_experience_id() {
        assert!(!ExperienceId::NULL.is_valid());
        assert_eq!(ExperienceId::NULL.raw(), 0);
        assert!(ExperienceId::new().is_valid());
    }

    #[test]
    fn test_experience_id_display() {
        let id = ExperienceId::new();
        assert_eq!(id.to_string(), format!("exp-{}", id.raw()));
    }

    proptest! {
        #[test]
        fn prop_experience_ids_unique_across_threads(
            threads in 1usize..6,
            per_thread in 1usize..200,
        ) {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    std::thread::spawn(move || {
                        (0..per_thread).map(|_| ExperienceId::new()).collect::<Vec<_>>()
                    })
                })
                .collect();

            let mut seen = HashSet::new();
            for handle in handles {
                for id in handle.join().expect("id thread") {
                    prop_assert!(id.is_valid());
                    prop_assert!(seen.insert(id), "duplicate id {}", id);
                }
            }
            prop_assert_eq!(seen.len(), threads * per_thread);
        }
    }
}
